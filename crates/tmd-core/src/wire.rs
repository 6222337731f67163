use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

pub const DEFAULT_MAX_EVENT_BYTES: usize = 512 * 1024;

/// Percentage in [0, 100]. The backend emits it either as a JSON number or as
/// a numeric string ("45.0"), depending on which code path produced the task.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress(pub f64);

impl Progress {
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_complete(self) -> bool {
        self.0 >= 100.0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

impl Serialize for Progress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:.1}", self.0))
    }
}

impl<'de> Deserialize<'de> for Progress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ProgressVisitor;

        impl<'de> Visitor<'de> for ProgressVisitor {
            type Value = Progress;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a progress percentage as number or numeric string")
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Progress(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Progress(value as f64))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Progress(value as f64))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let parsed = value.trim().parse::<f64>().map_err(|err| {
                    E::custom(format!("invalid progress value '{value}': {err}"))
                })?;
                Ok(Progress(parsed))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_str(&value)
            }
        }

        deserializer.deserialize_any(ProgressVisitor)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskLifecycle {
    #[default]
    Active,
    Paused,
}

/// Identity of a task: (chat, message) pair, globally unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub chat: String,
    pub id: String,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat, self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferTask {
    pub chat: String,
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub total_size: String,
    pub download_progress: Progress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_progress: Option<Progress>,
    #[serde(default)]
    pub download_speed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_speed: Option<String>,
    #[serde(default)]
    pub state: TaskLifecycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<f64>,
}

impl TransferTask {
    pub fn key(&self) -> TaskKey {
        TaskKey {
            chat: self.chat.clone(),
            id: self.id.clone(),
        }
    }

    /// Overall completion requires every tracked progress bar at 100%.
    pub fn is_complete(&self) -> bool {
        self.download_progress.is_complete()
            && self.upload_progress.map_or(true, Progress::is_complete)
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at.and_then(epoch_to_utc)
    }

    pub fn completed_at_utc(&self) -> Option<DateTime<Utc>> {
        self.completed_at.and_then(epoch_to_utc)
    }
}

fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Update,
    #[serde(other)]
    Other,
}

/// One server push event. All payload fields are optional; a field that is
/// present fully replaces the client's copy of that state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StreamEnvelope {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EnvelopeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GlobalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TransferTask>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<TransferTask>>,
}

impl StreamEnvelope {
    pub fn is_update(&self) -> bool {
        matches!(self.kind, Some(EnvelopeKind::Update))
    }
}

/// Aggregate throughput. Decoded for wire tolerance; the cockpit does not
/// render it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GlobalStatus {
    #[serde(default)]
    pub download_speed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_speed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskControlAction {
    Pause,
    Resume,
    Delete,
}

impl TaskControlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskControlAction::Pause => "pause",
            TaskControlAction::Resume => "resume",
            TaskControlAction::Delete => "delete",
        }
    }
}

impl fmt::Display for TaskControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskControlRequest {
    pub action: TaskControlAction,
    pub chat_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoveTaskRequest {
    pub chat_id: String,
    pub message_id: String,
}

/// Global transfer toggle as the server reports it. `set_download_state`
/// answers with the NEXT action label: "pause" means transfers are running
/// (pausing is what a client could do next), "continue" means stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Running,
    Stopped,
}

impl TransferState {
    pub fn from_next_action(label: &str) -> Option<Self> {
        match label.trim() {
            "pause" => Some(TransferState::Running),
            "continue" => Some(TransferState::Stopped),
            _ => None,
        }
    }

    /// The state label to send when toggling out of this state.
    pub fn request_label(self) -> &'static str {
        match self {
            TransferState::Running => "pause",
            TransferState::Stopped => "continue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("event exceeds max size: {size} > {max}")]
    OversizedEvent { size: usize, max: usize },
    #[error("buffer exceeds max size without line break: {size} > {max}")]
    OversizedBuffer { size: usize, max: usize },
    #[error("event decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct DecodeReport<T> {
    pub frames: Vec<T>,
    pub errors: Vec<FrameError>,
}

impl<T> Default for DecodeReport<T> {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> DecodeReport<T> {
    fn push_frame(&mut self, frame: T) {
        self.frames.push(frame);
    }

    fn push_error(&mut self, error: FrameError) {
        self.errors.push(error);
    }
}

/// Incremental decoder for a server-sent-event byte stream. Events are
/// delimited by blank lines; the JSON payload is the concatenation of the
/// event's `data:` lines. Comment lines and non-data fields are skipped. A
/// malformed payload is reported without losing subsequent events.
pub struct SseFrameDecoder<T> {
    max_event_bytes: usize,
    pending: Vec<u8>,
    data: Vec<u8>,
    has_data: bool,
    marker: PhantomData<T>,
}

impl<T> SseFrameDecoder<T> {
    pub fn new(max_event_bytes: usize) -> Self {
        Self {
            max_event_bytes,
            pending: Vec::new(),
            data: Vec::new(),
            has_data: false,
            marker: PhantomData,
        }
    }
}

impl<T> Default for SseFrameDecoder<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENT_BYTES)
    }
}

impl<T: DeserializeOwned> SseFrameDecoder<T> {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> DecodeReport<T> {
        let mut report = DecodeReport::default();
        if !chunk.is_empty() {
            self.pending.extend_from_slice(chunk);
        }

        while let Some(newline_idx) = self.pending.iter().position(|byte| *byte == b'\n') {
            let mut line = self.pending.drain(..=newline_idx).collect::<Vec<u8>>();
            if line.ends_with(b"\n") {
                line.pop();
            }
            if line.ends_with(b"\r") {
                line.pop();
            }
            self.consume_line(&line, &mut report);
        }

        if !self.pending.is_empty() && self.pending.len() > self.max_event_bytes {
            report.push_error(FrameError::OversizedBuffer {
                size: self.pending.len(),
                max: self.max_event_bytes,
            });
            self.pending.clear();
        }

        report
    }

    /// Flush state at end of stream. A partial trailing line is treated as
    /// complete; any accumulated payload is decoded.
    pub fn finish(&mut self) -> DecodeReport<T> {
        let mut report = DecodeReport::default();
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.consume_line(&line, &mut report);
        }
        if self.has_data {
            self.dispatch(&mut report);
        }
        report
    }

    fn consume_line(&mut self, line: &[u8], report: &mut DecodeReport<T>) {
        if line.is_empty() {
            if self.has_data {
                self.dispatch(report);
            }
            return;
        }
        if line[0] == b':' {
            return;
        }

        let (field, value) = match line.iter().position(|byte| *byte == b':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                let value = value.strip_prefix(b" ").unwrap_or(value);
                (&line[..idx], value)
            }
            None => (line, &[] as &[u8]),
        };

        if field != b"data" {
            return;
        }
        if self.has_data {
            self.data.push(b'\n');
        }
        self.data.extend_from_slice(value);
        self.has_data = true;

        if self.data.len() > self.max_event_bytes {
            report.push_error(FrameError::OversizedEvent {
                size: self.data.len(),
                max: self.max_event_bytes,
            });
            self.data.clear();
            self.has_data = false;
        }
    }

    fn dispatch(&mut self, report: &mut DecodeReport<T>) {
        let payload = std::mem::take(&mut self.data);
        self.has_data = false;
        match serde_json::from_slice(&payload) {
            Ok(parsed) => report.push_frame(parsed),
            Err(err) => report.push_error(FrameError::Decode(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task_json(progress: &str) -> String {
        format!(
            r#"{{"chat":"1001","id":"42","filename":"clip.mp4","total_size":"1.2 GB","download_progress":{progress},"download_speed":"3.5 MB/s"}}"#
        )
    }

    #[test]
    fn task_decodes_string_and_numeric_progress() {
        let from_string: TransferTask =
            serde_json::from_str(&sample_task_json("\"45.0\"")).expect("string progress");
        assert_eq!(from_string.download_progress, Progress(45.0));

        let from_number: TransferTask =
            serde_json::from_str(&sample_task_json("45")).expect("numeric progress");
        assert_eq!(from_number.download_progress, Progress(45.0));

        assert_eq!(from_string.state, TaskLifecycle::Active);
        assert_eq!(from_string.upload_progress, None);
    }

    #[test]
    fn task_rejects_non_numeric_progress_string() {
        let result = serde_json::from_str::<TransferTask>(&sample_task_json("\"half\""));
        assert!(result.is_err());
    }

    #[test]
    fn envelope_update_with_tasks_and_history() {
        let envelope: StreamEnvelope = serde_json::from_str(&format!(
            r#"{{"type":"update","status":{{"download_speed":"4.0 MB/s"}},"tasks":[{}],"history":[]}}"#,
            sample_task_json("\"45.0\"")
        ))
        .expect("decode envelope");

        assert!(envelope.is_update());
        assert_eq!(envelope.tasks.as_ref().map(Vec::len), Some(1));
        assert_eq!(envelope.history.as_ref().map(Vec::len), Some(0));
        assert_eq!(
            envelope.status.as_ref().map(|s| s.download_speed.as_str()),
            Some("4.0 MB/s")
        );
    }

    #[test]
    fn envelope_unknown_kind_is_not_update() {
        let envelope: StreamEnvelope =
            serde_json::from_str(r#"{"type":"heartbeat"}"#).expect("decode envelope");
        assert!(!envelope.is_update());
        assert_eq!(envelope.kind, Some(EnvelopeKind::Other));

        let untagged: StreamEnvelope = serde_json::from_str("{}").expect("decode envelope");
        assert!(!untagged.is_update());
    }

    #[test]
    fn dual_progress_completion_requires_both_bars() {
        let mut task: TransferTask =
            serde_json::from_str(&sample_task_json("\"100.0\"")).expect("decode");
        assert!(task.is_complete());

        task.upload_progress = Some(Progress(50.0));
        assert!(!task.is_complete());

        task.upload_progress = Some(Progress(100.0));
        assert!(task.is_complete());
    }

    #[test]
    fn transfer_state_follows_next_action_label() {
        assert_eq!(
            TransferState::from_next_action("pause"),
            Some(TransferState::Running)
        );
        assert_eq!(
            TransferState::from_next_action("continue\n"),
            Some(TransferState::Stopped)
        );
        assert_eq!(TransferState::from_next_action("bogus"), None);
        assert_eq!(TransferState::Running.request_label(), "pause");
        assert_eq!(TransferState::Stopped.request_label(), "continue");
    }

    #[test]
    fn task_control_request_serializes_action_lowercase() {
        let body = TaskControlRequest {
            action: TaskControlAction::Resume,
            chat_id: "1001".to_string(),
            message_id: "42".to_string(),
        };
        let json = serde_json::to_string(&body).expect("encode");
        assert!(json.contains(r#""action":"resume""#));
        assert!(json.contains(r#""chat_id":"1001""#));
    }

    #[test]
    fn decoder_splits_events_on_blank_lines() {
        let mut decoder = SseFrameDecoder::<StreamEnvelope>::default();
        let chunk = format!(
            "data: {{\"type\":\"update\",\"tasks\":[{}]}}\n\ndata: {{\"type\":\"update\",\"history\":[]}}\n\n",
            sample_task_json("\"45.0\"")
        );
        let report = decoder.push_chunk(chunk.as_bytes());
        assert_eq!(report.frames.len(), 2);
        assert!(report.errors.is_empty());
        assert_eq!(report.frames[0].tasks.as_ref().map(Vec::len), Some(1));
        assert_eq!(report.frames[1].history.as_ref().map(Vec::len), Some(0));
    }

    #[test]
    fn decoder_handles_chunks_split_mid_line() {
        let mut decoder = SseFrameDecoder::<StreamEnvelope>::default();
        let report = decoder.push_chunk(b"data: {\"type\":\"upd");
        assert!(report.frames.is_empty());
        let report = decoder.push_chunk(b"ate\"}\n\n");
        assert_eq!(report.frames.len(), 1);
        assert!(report.frames[0].is_update());
    }

    #[test]
    fn decoder_joins_multiline_data() {
        let mut decoder = SseFrameDecoder::<serde_json::Value>::default();
        let report = decoder.push_chunk(b"data: [1,\ndata: 2]\n\n");
        assert_eq!(report.frames.len(), 1);
        assert_eq!(report.frames[0], serde_json::json!([1, 2]));
    }

    #[test]
    fn decoder_ignores_comments_and_non_data_fields() {
        let mut decoder = SseFrameDecoder::<StreamEnvelope>::default();
        let report = decoder
            .push_chunk(b": keep-alive\nevent: update\nid: 7\nretry: 3000\ndata: {\"type\":\"update\"}\n\n");
        assert_eq!(report.frames.len(), 1);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn decoder_recovers_after_malformed_event() {
        let mut decoder = SseFrameDecoder::<StreamEnvelope>::default();
        let report = decoder
            .push_chunk(b"data: {\"type\":\ndata: {\"type\":\"update\"}\n\n");
        // both lines belong to one event, so the joined payload is garbage
        assert_eq!(report.frames.len(), 0);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], FrameError::Decode(_)));

        let report = decoder.push_chunk(b"data: {\"type\":\"update\"}\n\n");
        assert_eq!(report.frames.len(), 1);
    }

    #[test]
    fn decoder_rejects_oversized_event_and_continues() {
        let mut decoder = SseFrameDecoder::<serde_json::Value>::new(64);
        let oversized = format!("data: \"{}\"\n\n", "x".repeat(200));
        let report = decoder.push_chunk(oversized.as_bytes());
        assert!(report.frames.is_empty());
        assert!(matches!(
            report.errors[0],
            FrameError::OversizedEvent { .. }
        ));

        let report = decoder.push_chunk(b"data: 1\n\n");
        assert_eq!(report.frames.len(), 1);
    }

    #[test]
    fn decoder_finish_flushes_unterminated_event() {
        let mut decoder = SseFrameDecoder::<StreamEnvelope>::default();
        let report = decoder.push_chunk(b"data: {\"type\":\"update\"}");
        assert!(report.frames.is_empty());
        let report = decoder.finish();
        assert_eq!(report.frames.len(), 1);
    }

    #[test]
    fn epoch_timestamps_convert_to_utc() {
        let task: TransferTask = serde_json::from_str(&format!(
            r#"{{"chat":"1","id":"2","filename":"a.mp3","download_progress":"100.0","completed_at":{}}}"#,
            1_754_000_000.5f64
        ))
        .expect("decode");
        let utc = task.completed_at_utc().expect("timestamp");
        assert_eq!(utc.timestamp(), 1_754_000_000);
        assert!(task.created_at_utc().is_none());
    }
}
