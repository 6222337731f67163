mod api;
mod state;
mod theme;
mod ui;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use reqwest::Url;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use api::ApiClient;
use state::{App, Command, DashEvent};
use tmd_core::wire::TransferState;

const EVENT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000/";

#[derive(Parser, Debug)]
#[command(
    name = "tmd-cockpit",
    version,
    about = "Terminal cockpit for a media transfer manager server"
)]
struct Cli {
    /// Server base URL; falls back to TMD_SERVER_URL, then localhost:5000
    #[arg(long)]
    url: Option<String>,
    /// Poll interval in seconds while the stream is down
    #[arg(long, default_value_t = 2)]
    poll_secs: u64,
    /// Timeout in seconds for control and poll requests
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let base = resolve_server_url(cli.url.as_deref())?;
    let api = ApiClient::new(base, Duration::from_secs(cli.timeout_secs.max(1)))?;

    let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

    {
        let api = api.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            api::stream_loop(api, tx).await;
        });
    }
    spawn_version_fetch(&api, &tx);
    spawn_poll(&api, &tx, false);
    spawn_poll(&api, &tx, true);

    let mut terminal = setup_terminal()?;
    let result = run_loop(
        &mut terminal,
        &api,
        &tx,
        &mut rx,
        Duration::from_secs(cli.poll_secs.max(1)),
    )
    .await;
    restore_terminal(&mut terminal)?;
    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    api: &ApiClient,
    tx: &mpsc::Sender<DashEvent>,
    rx: &mut mpsc::Receiver<DashEvent>,
    poll_interval: Duration,
) -> Result<()> {
    let mut app = App::new();
    let mut events = EventStream::new();
    let mut poll_ticker = tokio::time::interval(poll_interval);

    loop {
        terminal.draw(|frame| ui::render(frame, &mut app))?;

        tokio::select! {
            _ = poll_ticker.tick() => {
                if !app.connected {
                    spawn_poll(api, tx, false);
                    spawn_poll(api, tx, true);
                }
            }
            Some(event) = rx.recv() => {
                app.apply_event(event);
            }
            maybe_event = events.next() => {
                if let Some(Ok(Event::Key(key))) = maybe_event {
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                        if let Some(command) = app.handle_key(key) {
                            dispatch(api, tx, command);
                        }
                    }
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

fn dispatch(api: &ApiClient, tx: &mpsc::Sender<DashEvent>, command: Command) {
    match command {
        Command::TaskControl {
            request_id,
            action,
            key,
        } => {
            let api = api.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = api
                    .task_control(action, &key)
                    .await
                    .map_err(|err| err.to_string());
                let _ = tx
                    .send(DashEvent::ActionResult {
                        request_id,
                        outcome,
                    })
                    .await;
            });
        }
        Command::RemoveEntry { request_id, key } => {
            let api = api.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = api.remove_task(&key).await.map_err(|err| err.to_string());
                let _ = tx
                    .send(DashEvent::ActionResult {
                        request_id,
                        outcome,
                    })
                    .await;
            });
        }
        Command::ClearHistory { request_id } => {
            let api = api.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = api.clear_history().await.map_err(|err| err.to_string());
                let _ = tx
                    .send(DashEvent::ActionResult {
                        request_id,
                        outcome,
                    })
                    .await;
            });
        }
        Command::ToggleState { state } => {
            let api = api.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = match api.set_download_state(state).await {
                    Ok(label) => TransferState::from_next_action(&label)
                        .ok_or_else(|| format!("unexpected state label '{}'", label.trim())),
                    Err(err) => Err(err.to_string()),
                };
                let _ = tx.send(DashEvent::StateToggled { outcome }).await;
            });
        }
        Command::Refresh => {
            spawn_poll(api, tx, false);
            spawn_poll(api, tx, true);
        }
    }
}

fn spawn_poll(api: &ApiClient, tx: &mpsc::Sender<DashEvent>, already_down: bool) {
    let api = api.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        match api.download_list(already_down).await {
            Ok(tasks) => {
                let _ = tx
                    .send(DashEvent::Polled {
                        already_down,
                        tasks,
                    })
                    .await;
            }
            Err(err) => {
                let _ = tx
                    .send(DashEvent::PollFailed {
                        already_down,
                        error: err.to_string(),
                    })
                    .await;
            }
        }
    });
}

fn spawn_version_fetch(api: &ApiClient, tx: &mpsc::Sender<DashEvent>) {
    let api = api.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        match api.app_version().await {
            Ok(version) => {
                let _ = tx.send(DashEvent::Version(version)).await;
            }
            Err(err) => {
                warn!("version_fetch_error: {err}");
            }
        }
    });
}

fn resolve_server_url(arg: Option<&str>) -> Result<Url> {
    let raw = match arg {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => match std::env::var("TMD_SERVER_URL") {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => DEFAULT_SERVER_URL.to_string(),
        },
    };
    // endpoint paths join against the base, so it has to end with '/'
    let raw = if raw.ends_with('/') {
        raw
    } else {
        format!("{raw}/")
    };
    Url::parse(&raw).with_context(|| format!("invalid server url '{raw}'"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = matches!(
        std::env::var("TMD_LOG_STDOUT").ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES")
    );
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        // stdout belongs to the terminal UI
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_url_gains_trailing_slash() {
        let url = resolve_server_url(Some("http://media-box:5000")).expect("parse");
        assert_eq!(url.as_str(), "http://media-box:5000/");
        assert_eq!(
            url.join("get_app_version").unwrap().as_str(),
            "http://media-box:5000/get_app_version"
        );
    }

    #[test]
    fn blank_argument_falls_back_to_default() {
        std::env::remove_var("TMD_SERVER_URL");
        let url = resolve_server_url(Some("  ")).expect("parse");
        assert_eq!(url.as_str(), DEFAULT_SERVER_URL);
    }
}
