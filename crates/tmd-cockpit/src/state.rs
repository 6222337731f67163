use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::TableState;
use tmd_core::category::CategoryFilter;
use tmd_core::view;
use tmd_core::wire::{
    ControlAck, StreamEnvelope, TaskControlAction, TaskKey, TransferState, TransferTask,
};
use tracing::warn;

/// Everything the background tasks can tell the main loop.
#[derive(Debug)]
pub enum DashEvent {
    Connected,
    Disconnected,
    Update(StreamEnvelope),
    Version(String),
    Polled {
        already_down: bool,
        tasks: Vec<TransferTask>,
    },
    PollFailed {
        already_down: bool,
        error: String,
    },
    ActionResult {
        request_id: u64,
        outcome: Result<ControlAck, String>,
    },
    StateToggled {
        outcome: Result<TransferState, String>,
    },
}

/// What the main loop should dispatch over HTTP in response to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TaskControl {
        request_id: u64,
        action: TaskControlAction,
        key: TaskKey,
    },
    RemoveEntry {
        request_id: u64,
        key: TaskKey,
    },
    ClearHistory {
        request_id: u64,
    },
    ToggleState {
        state: &'static str,
    },
    Refresh,
}

#[derive(Debug, Clone)]
enum ActionKind {
    TaskControl(TaskControlAction),
    RemoveEntry(TaskKey),
    ClearHistory,
}

#[derive(Debug, Clone)]
struct PendingAction {
    kind: ActionKind,
    label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Active,
    History,
}

impl Tab {
    pub fn title(self) -> &'static str {
        match self {
            Tab::Active => "Active",
            Tab::History => "History",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Tab::Active => Tab::History,
            Tab::History => Tab::Active,
        }
    }
}

pub struct App {
    pub tasks: Vec<TransferTask>,
    pub history: Vec<TransferTask>,
    pub filter: CategoryFilter,
    pub tab: Tab,
    pub active_table: TableState,
    pub history_table: TableState,
    pub connected: bool,
    pub version: Option<String>,
    pub transfer_state: TransferState,
    pub status_note: Option<String>,
    pub show_help: bool,
    pending: HashMap<u64, PendingAction>,
    next_request_id: u64,
    should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            history: Vec::new(),
            filter: CategoryFilter::All,
            tab: Tab::Active,
            active_table: TableState::default(),
            history_table: TableState::default(),
            connected: false,
            // assumed until the first toggle response teaches us the truth
            transfer_state: TransferState::Running,
            version: None,
            status_note: None,
            show_help: false,
            pending: HashMap::new(),
            next_request_id: 0,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Filtered snapshot; its length is the active count badge.
    pub fn visible_tasks(&self) -> Vec<&TransferTask> {
        self.filter.apply(&self.tasks)
    }

    /// Capped, newest-first history; the count badge stays unfiltered.
    pub fn visible_history(&self) -> Vec<&TransferTask> {
        view::project_history(&self.history)
    }

    pub fn active_count(&self) -> usize {
        self.visible_tasks().len()
    }

    pub fn history_count(&self) -> usize {
        self.history.len()
    }

    pub fn apply_event(&mut self, event: DashEvent) {
        match event {
            DashEvent::Connected => {
                self.connected = true;
                self.status_note = Some("stream connected".to_string());
            }
            DashEvent::Disconnected => {
                self.connected = false;
                self.status_note =
                    Some("stream lost; reconnecting (poll fallback active)".to_string());
            }
            DashEvent::Update(envelope) => {
                if !envelope.is_update() {
                    return;
                }
                if let Some(tasks) = envelope.tasks {
                    self.tasks = tasks;
                    self.ensure_active_selection();
                }
                if let Some(history) = envelope.history {
                    self.history = history;
                    self.ensure_history_selection();
                }
                // envelope.status is decoded for tolerance but not rendered
            }
            DashEvent::Version(version) => {
                self.version = Some(version);
            }
            DashEvent::Polled { already_down, tasks } => {
                // stream data supersedes any poll result that raced it
                if self.connected {
                    return;
                }
                if already_down {
                    self.history = tasks
                        .into_iter()
                        .filter(|task| task.download_progress.is_complete())
                        .collect();
                    self.ensure_history_selection();
                } else {
                    self.tasks = tasks;
                    self.ensure_active_selection();
                }
            }
            DashEvent::PollFailed {
                already_down,
                error,
            } => {
                warn!(already_down, error = %error, "poll_error");
            }
            DashEvent::ActionResult {
                request_id,
                outcome,
            } => {
                self.apply_action_result(request_id, outcome);
            }
            DashEvent::StateToggled { outcome } => match outcome {
                Ok(state) => {
                    self.transfer_state = state;
                    self.status_note = Some(match state {
                        TransferState::Running => "transfers running".to_string(),
                        TransferState::Stopped => "transfers stopped".to_string(),
                    });
                }
                Err(err) => {
                    self.status_note = Some(format!("state toggle failed: {err}"));
                }
            },
        }
    }

    fn apply_action_result(&mut self, request_id: u64, outcome: Result<ControlAck, String>) {
        let pending = self.pending.remove(&request_id);
        let label = pending
            .as_ref()
            .map(|action| action.label.clone())
            .unwrap_or_else(|| "action".to_string());

        match outcome {
            Err(err) => {
                self.status_note = Some(format!("{label} failed: {err}"));
            }
            Ok(ack) if !ack.success => {
                let message = ack
                    .message
                    .unwrap_or_else(|| "server refused".to_string());
                self.status_note = Some(format!("{label} failed: {message}"));
            }
            Ok(ack) => {
                if let Some(PendingAction { kind, .. }) = pending {
                    match kind {
                        // the next stream tick reflects pause/resume/delete
                        ActionKind::TaskControl(_) => {}
                        ActionKind::RemoveEntry(key) => {
                            self.history.retain(|entry| entry.key() != key);
                            self.ensure_history_selection();
                        }
                        ActionKind::ClearHistory => {
                            self.history.clear();
                            self.ensure_history_selection();
                        }
                    }
                }
                let message = ack.message.unwrap_or_else(|| "ok".to_string());
                self.status_note = Some(format!("{label}: {message}"));
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                None
            }
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                None
            }
            KeyCode::Esc => {
                self.show_help = false;
                None
            }
            KeyCode::Tab | KeyCode::Char('t') => {
                self.tab = self.tab.next();
                None
            }
            KeyCode::Char('f') => {
                self.filter = self.filter.next();
                self.ensure_active_selection();
                None
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection(1);
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection(-1);
                None
            }
            KeyCode::Char('R') => Some(Command::Refresh),
            KeyCode::Char('s') => Some(Command::ToggleState {
                state: self.transfer_state.request_label(),
            }),
            KeyCode::Char('p') => self.begin_task_control(TaskControlAction::Pause),
            KeyCode::Char('r') => self.begin_task_control(TaskControlAction::Resume),
            KeyCode::Char('d') => self.begin_task_control(TaskControlAction::Delete),
            KeyCode::Char('x') => self.begin_remove_entry(),
            KeyCode::Char('c') => {
                if self.tab != Tab::History {
                    self.status_note = Some("switch to history to clear it".to_string());
                    return None;
                }
                let request_id = self.begin_action(ActionKind::ClearHistory, "clear history");
                Some(Command::ClearHistory { request_id })
            }
            _ => None,
        }
    }

    fn begin_task_control(&mut self, action: TaskControlAction) -> Option<Command> {
        if self.tab != Tab::Active {
            self.status_note = Some("switch to active transfers first".to_string());
            return None;
        }
        let Some((key, filename)) = self.selected_active() else {
            self.status_note = Some("no transfer selected".to_string());
            return None;
        };
        let request_id = self.begin_action(
            ActionKind::TaskControl(action),
            &format!("{action} {filename}"),
        );
        Some(Command::TaskControl {
            request_id,
            action,
            key,
        })
    }

    fn begin_remove_entry(&mut self) -> Option<Command> {
        if self.tab != Tab::History {
            self.status_note = Some("switch to history first".to_string());
            return None;
        }
        let Some((key, filename)) = self.selected_history() else {
            self.status_note = Some("no history entry selected".to_string());
            return None;
        };
        let request_id = self.begin_action(
            ActionKind::RemoveEntry(key.clone()),
            &format!("remove {filename}"),
        );
        Some(Command::RemoveEntry { request_id, key })
    }

    fn begin_action(&mut self, kind: ActionKind, label: &str) -> u64 {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.pending.insert(
            request_id,
            PendingAction {
                kind,
                label: label.to_string(),
            },
        );
        self.status_note = Some(format!("{label} sent"));
        request_id
    }

    fn selected_active(&self) -> Option<(TaskKey, String)> {
        let visible = self.visible_tasks();
        let idx = self.active_table.selected()?;
        let task = visible.get(idx)?;
        Some((task.key(), task.filename.clone()))
    }

    fn selected_history(&self) -> Option<(TaskKey, String)> {
        let visible = self.visible_history();
        let idx = self.history_table.selected()?;
        let entry = visible.get(idx)?;
        Some((entry.key(), entry.filename.clone()))
    }

    fn move_selection(&mut self, delta: i64) {
        let (len, table) = match self.tab {
            Tab::Active => (self.filter.apply(&self.tasks).len(), &mut self.active_table),
            Tab::History => (
                view::project_history(&self.history).len(),
                &mut self.history_table,
            ),
        };
        if len == 0 {
            table.select(None);
            return;
        }
        let current = table.selected().unwrap_or(0) as i64;
        let next = (current + delta).clamp(0, len as i64 - 1);
        table.select(Some(next as usize));
    }

    fn ensure_active_selection(&mut self) {
        let len = self.filter.apply(&self.tasks).len();
        clamp_selection(&mut self.active_table, len);
    }

    fn ensure_history_selection(&mut self) {
        let len = view::project_history(&self.history).len();
        clamp_selection(&mut self.history_table, len);
    }
}

fn clamp_selection(table: &mut TableState, len: usize) {
    if len == 0 {
        table.select(None);
        return;
    }
    let selected = table.selected().unwrap_or(0).min(len - 1);
    table.select(Some(selected));
}
