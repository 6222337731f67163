use crate::wire::{Progress, TaskLifecycle, TransferTask};

pub const HISTORY_DISPLAY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Paused,
    Complete,
    Waiting,
    InProgress,
}

impl RowStatus {
    pub fn label(self) -> &'static str {
        match self {
            RowStatus::Paused => "paused",
            RowStatus::Complete => "complete",
            RowStatus::Waiting => "waiting",
            RowStatus::InProgress => "in-progress",
        }
    }
}

/// True when the formatted speed carries no forward motion. The numeric
/// prefix is authoritative: "0.00 B/s" is stalled, "0.98 MB/s" is not. A
/// string without a parsable number also reads as stalled.
pub fn speed_is_zero(speed: &str) -> bool {
    let trimmed = speed.trim();
    let numeric: String = trimmed
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();
    match numeric.parse::<f64>() {
        Ok(value) => value == 0.0,
        Err(_) => true,
    }
}

/// With dual progress the row is only as far along as its slower bar.
pub fn effective_progress(download: f64, upload: Option<f64>) -> f64 {
    match upload {
        Some(up) => download.min(up),
        None => download,
    }
}

/// Badge precedence: stalled speed wins, then complete, then waiting,
/// everything else is in-progress.
pub fn row_status(download: f64, upload: Option<f64>, speed_is_zero: bool) -> RowStatus {
    if speed_is_zero {
        return RowStatus::Paused;
    }
    let progress = effective_progress(download, upload);
    if progress >= 100.0 {
        return RowStatus::Complete;
    }
    if progress <= 0.0 {
        return RowStatus::Waiting;
    }
    RowStatus::InProgress
}

pub fn task_row_status(task: &TransferTask) -> RowStatus {
    let stalled = speed_is_zero(&task.download_speed) || task.state == TaskLifecycle::Paused;
    row_status(
        task.download_progress.value(),
        task.upload_progress.map(Progress::value),
        stalled,
    )
}

/// Trailing `HISTORY_DISPLAY_LIMIT` entries of the server's
/// most-recent-last list, reversed to newest-first.
pub fn project_history(entries: &[TransferTask]) -> Vec<&TransferTask> {
    let start = entries.len().saturating_sub(HISTORY_DISPLAY_LIMIT);
    entries[start..].iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u32, download: f64, upload: Option<f64>, speed: &str) -> TransferTask {
        TransferTask {
            chat: "1001".to_string(),
            id: id.to_string(),
            filename: format!("file-{id}.mp4"),
            total_size: "1.0 GB".to_string(),
            download_progress: Progress(download),
            upload_progress: upload.map(Progress),
            download_speed: speed.to_string(),
            upload_speed: None,
            state: TaskLifecycle::Active,
            save_path: None,
            created_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn speed_zero_detection_uses_numeric_prefix() {
        assert!(speed_is_zero("0 B/s"));
        assert!(speed_is_zero("0.00 B/s"));
        assert!(speed_is_zero(""));
        assert!(speed_is_zero("n/a"));
        assert!(!speed_is_zero("0.98 MB/s"));
        assert!(!speed_is_zero("3.5MB/s"));
    }

    #[test]
    fn badge_precedence_ladder() {
        assert_eq!(row_status(50.0, None, true), RowStatus::Paused);
        assert_eq!(row_status(100.0, None, false), RowStatus::Complete);
        assert_eq!(row_status(0.0, None, false), RowStatus::Waiting);
        assert_eq!(row_status(50.0, None, false), RowStatus::InProgress);
    }

    #[test]
    fn stalled_speed_outranks_every_progress_value() {
        assert_eq!(row_status(100.0, None, true), RowStatus::Paused);
        assert_eq!(row_status(0.0, None, true), RowStatus::Paused);
    }

    #[test]
    fn dual_progress_row_is_not_complete_until_both_bars_finish() {
        // download done, upload halfway, still moving
        assert_eq!(row_status(100.0, Some(50.0), false), RowStatus::InProgress);
        assert_eq!(row_status(100.0, Some(100.0), false), RowStatus::Complete);
        assert_eq!(row_status(0.0, Some(0.0), false), RowStatus::Waiting);
    }

    #[test]
    fn paused_lifecycle_forces_paused_badge() {
        let mut t = task(1, 40.0, None, "2.0 MB/s");
        assert_eq!(task_row_status(&t), RowStatus::InProgress);
        t.state = TaskLifecycle::Paused;
        assert_eq!(task_row_status(&t), RowStatus::Paused);
    }

    #[test]
    fn history_projection_caps_at_fifty_newest_first() {
        let entries: Vec<TransferTask> =
            (0..120).map(|i| task(i, 100.0, None, "0 B/s")).collect();
        let projected = project_history(&entries);
        assert_eq!(projected.len(), HISTORY_DISPLAY_LIMIT);
        assert_eq!(projected[0].id, "119");
        assert_eq!(projected[HISTORY_DISPLAY_LIMIT - 1].id, "70");
    }

    #[test]
    fn history_projection_of_short_list_keeps_everything() {
        let entries: Vec<TransferTask> =
            (0..3).map(|i| task(i, 100.0, None, "0 B/s")).collect();
        let projected = project_history(&entries);
        assert_eq!(projected.len(), 3);
        assert_eq!(projected[0].id, "2");
        assert_eq!(projected[2].id, "0");
    }

    #[test]
    fn history_projection_of_empty_list_is_empty() {
        assert!(project_history(&[]).is_empty());
    }
}
