use crate::wire::TransferTask;
use serde::{Deserialize, Serialize};

pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "avi", "mov", "webm"];
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
pub const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "wav", "flac", "aac", "m4a"];
pub const ARCHIVE_EXTENSIONS: [&str; 5] = ["zip", "rar", "7z", "tar", "gz"];

/// Lowercased substring after the final '.'. A name without a dot classifies
/// by the whole name, which lands in `Other` unless it happens to collide.
pub fn file_ext(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_ascii_lowercase()
}

fn known_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&ext)
        || IMAGE_EXTENSIONS.contains(&ext)
        || AUDIO_EXTENSIONS.contains(&ext)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    All,
    Video,
    Image,
    Audio,
    Other,
}

pub const CATEGORY_CHIPS: [CategoryFilter; 5] = [
    CategoryFilter::All,
    CategoryFilter::Video,
    CategoryFilter::Image,
    CategoryFilter::Audio,
    CategoryFilter::Other,
];

impl CategoryFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Video => "video",
            CategoryFilter::Image => "image",
            CategoryFilter::Audio => "audio",
            CategoryFilter::Other => "other",
        }
    }

    pub fn next(self) -> Self {
        match self {
            CategoryFilter::All => CategoryFilter::Video,
            CategoryFilter::Video => CategoryFilter::Image,
            CategoryFilter::Image => CategoryFilter::Audio,
            CategoryFilter::Audio => CategoryFilter::Other,
            CategoryFilter::Other => CategoryFilter::All,
        }
    }

    pub fn matches(self, filename: &str) -> bool {
        let ext = file_ext(filename);
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Video => VIDEO_EXTENSIONS.contains(&ext.as_str()),
            CategoryFilter::Image => IMAGE_EXTENSIONS.contains(&ext.as_str()),
            CategoryFilter::Audio => AUDIO_EXTENSIONS.contains(&ext.as_str()),
            CategoryFilter::Other => !known_extension(&ext),
        }
    }

    /// Pure subsequence filter over a snapshot. Order-preserving and
    /// idempotent; `All` is the identity.
    pub fn apply<'a>(self, tasks: &'a [TransferTask]) -> Vec<&'a TransferTask> {
        tasks
            .iter()
            .filter(|task| self.matches(&task.filename))
            .collect()
    }
}

/// Coarser classification used for the row glyph; unlike the category
/// filter it also recognizes archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Image,
    Audio,
    Archive,
    Document,
}

impl FileKind {
    pub fn of(filename: &str) -> Self {
        let ext = file_ext(filename);
        let ext = ext.as_str();
        if VIDEO_EXTENSIONS.contains(&ext) {
            FileKind::Video
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            FileKind::Image
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            FileKind::Audio
        } else if ARCHIVE_EXTENSIONS.contains(&ext) {
            FileKind::Archive
        } else {
            FileKind::Document
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Progress;

    fn task(filename: &str) -> TransferTask {
        TransferTask {
            chat: "1001".to_string(),
            id: filename.to_string(),
            filename: filename.to_string(),
            total_size: "1.0 MB".to_string(),
            download_progress: Progress(50.0),
            upload_progress: None,
            download_speed: "1.0 MB/s".to_string(),
            upload_speed: None,
            state: Default::default(),
            save_path: None,
            created_at: None,
            completed_at: None,
        }
    }

    fn snapshot() -> Vec<TransferTask> {
        vec![
            task("movie.mp4"),
            task("SHOW.MKV"),
            task("cover.jpg"),
            task("track.m4a"),
            task("bundle.tar.gz"),
            task("README"),
            task("notes.txt"),
        ]
    }

    #[test]
    fn all_filter_is_identity() {
        let tasks = snapshot();
        let filtered = CategoryFilter::All.apply(&tasks);
        assert_eq!(filtered.len(), tasks.len());
        for (kept, original) in filtered.iter().zip(tasks.iter()) {
            assert_eq!(*kept, original);
        }
    }

    #[test]
    fn filtering_is_idempotent_for_every_category() {
        let tasks = snapshot();
        for chip in CATEGORY_CHIPS {
            let once: Vec<TransferTask> =
                chip.apply(&tasks).into_iter().cloned().collect();
            let twice: Vec<TransferTask> =
                chip.apply(&once).into_iter().cloned().collect();
            assert_eq!(once, twice, "filter {chip:?} not idempotent");
        }
    }

    #[test]
    fn other_is_complement_of_known_categories() {
        let tasks = snapshot();
        let video = CategoryFilter::Video.apply(&tasks).len();
        let image = CategoryFilter::Image.apply(&tasks).len();
        let audio = CategoryFilter::Audio.apply(&tasks).len();
        let other = CategoryFilter::Other.apply(&tasks).len();
        assert_eq!(video + image + audio + other, tasks.len());

        for t in &tasks {
            let known = CategoryFilter::Video.matches(&t.filename)
                || CategoryFilter::Image.matches(&t.filename)
                || CategoryFilter::Audio.matches(&t.filename);
            assert_ne!(known, CategoryFilter::Other.matches(&t.filename));
        }
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(CategoryFilter::Video.matches("SHOW.MKV"));
        assert!(CategoryFilter::Image.matches("photo.JPeG"));
    }

    #[test]
    fn extension_is_substring_after_final_dot() {
        assert_eq!(file_ext("bundle.tar.gz"), "gz");
        assert_eq!(file_ext("README"), "readme");
        assert!(CategoryFilter::Other.matches("bundle.tar.gz"));
        assert!(CategoryFilter::Other.matches("README"));
    }

    #[test]
    fn archives_are_other_for_filtering_but_archive_for_glyphs() {
        assert!(CategoryFilter::Other.matches("bundle.tar.gz"));
        assert_eq!(FileKind::of("bundle.tar.gz"), FileKind::Archive);
        assert_eq!(FileKind::of("movie.mp4"), FileKind::Video);
        assert_eq!(FileKind::of("notes.txt"), FileKind::Document);
    }
}
