// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! fanctl-daemon: system service that owns hwmon writes, runs the fan
//! control loop, and serves the profile store to UI clients over a Unix
//! domain socket.

use clap::Parser;
use handheld_fanctl::config::{self, ChannelConfig, Config, DaemonConfig};
use handheld_fanctl::control::{self, ControlLoop, LoopExit, ModeChange, Sample};
use handheld_fanctl::hwmon::{self, HwmonBackend};
use handheld_fanctl::profile::ProfileStore;
use handheld_fanctl::protocol::{self, ChannelInfo, Request, Response};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::time::Duration;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "fanctl-daemon", about = "Handheld fan curve daemon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override the socket path.
    #[arg(short, long)]
    socket: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared daemon state
// ---------------------------------------------------------------------------

struct DaemonState {
    daemon: DaemonConfig,
    /// Channels as written in the config file (empty when auto-discovered)
    channel_configs: Vec<ChannelConfig>,
    channels: Vec<ChannelInfo>,
    config_path: PathBuf,
    store: watch::Sender<ProfileStore>,
    app: watch::Sender<Option<String>>,
    samples: watch::Receiver<Vec<Sample>>,
    modes: broadcast::Receiver<ModeChange>,
}

type SharedState = Arc<Mutex<DaemonState>>;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if !nix::unistd::geteuid().is_root() {
        log::warn!("Not running as root, fan writes will probably fail");
    }

    let config_path = config::resolve_config_path(Some(&cli.config));
    let cfg = config::load_config(&config_path).unwrap_or_else(|e| {
        log::warn!("Could not load config: {e}, using defaults");
        Config::default()
    });

    let socket_path = cli
        .socket
        .clone()
        .unwrap_or_else(|| cfg.daemon.socket_path.clone());

    // Discover hardware
    let hwmon_root = Path::new(hwmon::HWMON_ROOT);
    let channel_configs = if cfg.channels.is_empty() {
        hwmon::discover_channels(hwmon_root).unwrap_or_else(|e| {
            log::error!("Failed to discover fans: {e}");
            Vec::new()
        })
    } else {
        cfg.channels.clone()
    };
    let hw_channels = hwmon::resolve_channels(hwmon_root, &channel_configs);
    let channels: Vec<ChannelInfo> = hw_channels
        .iter()
        .enumerate()
        .map(|(channel, ch)| ChannelInfo {
            channel,
            name: ch.name.clone(),
        })
        .collect();
    log::info!("Using {} fan channel(s)", channels.len());

    let backend = Arc::new(HwmonBackend::new(hw_channels));

    // Control loop
    let (store_tx, store_rx) = watch::channel(cfg.store.clone());
    let (app_tx, app_rx) = watch::channel(None);
    let control = ControlLoop::new(
        backend.clone(),
        store_rx,
        app_rx,
        Duration::from_millis(cfg.daemon.poll_interval_ms),
    );
    let samples = control.subscribe_samples();
    let modes = control.subscribe_modes();
    let (stop_tx, stop_rx) = watch::channel(false);
    let control_task = tokio::spawn(control.run(stop_rx));

    let restore_on_exit = cfg.daemon.restore_on_exit;
    let state: SharedState = Arc::new(Mutex::new(DaemonState {
        daemon: cfg.daemon,
        channel_configs: cfg.channels,
        channels,
        config_path,
        store: store_tx,
        app: app_tx,
        samples,
        modes,
    }));

    // Clean up old socket file
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path)?;

    // Make socket accessible to the (unprivileged) UI
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o666);
        std::fs::set_permissions(&socket_path, perms)?;
    }

    log::info!("Listening on {socket_path}");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // Accept client connections
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        tokio::spawn(handle_client(stream, state.clone()));
                    }
                    Err(e) => {
                        log::error!("Failed to accept connection: {e}");
                    }
                }
            }
            _ = &mut shutdown => {
                log::info!("Received shutdown signal");
                break;
            }
        }
    }

    stop_tx.send_replace(true);
    match control_task.await {
        Ok(LoopExit::Stopped) | Ok(LoopExit::Unsupported) => {}
        Err(e) => log::error!("Control loop task failed: {e}"),
    }

    if restore_on_exit {
        control::restore_automatic(backend.as_ref()).await;
        log::info!("Restored all fans to automatic control");
    }

    // Cleanup socket
    let _ = std::fs::remove_file(&socket_path);
    log::info!("Daemon shut down");
    Ok(())
}

async fn shutdown_signal() {
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {e}");
            tokio::signal::ctrl_c().await.ok();
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

// ---------------------------------------------------------------------------
// Client connection handler
// ---------------------------------------------------------------------------

struct Subscription {
    samples: watch::Receiver<Vec<Sample>>,
    modes: broadcast::Receiver<ModeChange>,
    store: watch::Receiver<ProfileStore>,
}

enum Push {
    Status,
    Mode(ModeChange),
    Profiles,
}

enum ClientEvent {
    Line(io::Result<Option<String>>),
    Push(Option<Push>),
}

async fn handle_client(stream: UnixStream, state: SharedState) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut subscription: Option<Subscription> = None;

    loop {
        let event = tokio::select! {
            line = lines.next_line() => ClientEvent::Line(line),
            push = next_push(&mut subscription) => ClientEvent::Push(push),
        };

        let response = match event {
            ClientEvent::Line(Ok(Some(line))) => match protocol::decode::<Request>(&line) {
                Ok(Request::Subscribe) => {
                    let st = state.lock().await;
                    subscription = Some(Subscription {
                        samples: st.samples.clone(),
                        modes: st.modes.resubscribe(),
                        store: st.store.subscribe(),
                    });
                    Response::Ok {
                        message: "Subscribed".to_string(),
                    }
                }
                Ok(req) => process_request(req, &state).await,
                Err(e) => Response::Error {
                    message: format!("Invalid request: {e}"),
                },
            },
            // Client disconnected
            ClientEvent::Line(_) => break,
            ClientEvent::Push(Some(Push::Status)) => status(&*state.lock().await),
            ClientEvent::Push(Some(Push::Mode(ModeChange { channel, mode }))) => {
                Response::Mode { channel, mode }
            }
            ClientEvent::Push(Some(Push::Profiles)) => profiles(&*state.lock().await),
            ClientEvent::Push(None) => {
                subscription = None;
                continue;
            }
        };

        let encoded = match protocol::encode(&response) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to encode response: {e}");
                continue;
            }
        };

        if writer.write_all(encoded.as_bytes()).await.is_err() {
            break; // Client disconnected
        }
    }
}

/// Wait for the next update a subscribed client should see. Never resolves
/// without a subscription; `None` means the sources are gone.
async fn next_push(subscription: &mut Option<Subscription>) -> Option<Push> {
    let Some(sub) = subscription else {
        return std::future::pending().await;
    };

    tokio::select! {
        changed = sub.samples.changed() => changed.ok().map(|_| Push::Status),
        mode = sub.modes.recv() => match mode {
            Ok(change) => Some(Push::Mode(change)),
            Err(RecvError::Lagged(n)) => {
                log::debug!("Subscriber missed {n} mode change(s)");
                Some(Push::Status)
            }
            Err(RecvError::Closed) => None,
        },
        changed = sub.store.changed() => changed.ok().map(|_| Push::Profiles),
    }
}

async fn process_request(req: Request, state: &SharedState) -> Response {
    let st = state.lock().await;

    match req {
        Request::GetStatus => status(&st),

        Request::ListProfiles => profiles(&st),

        Request::UpsertProfile { name, profile } => {
            if !st.store.send_if_modified(|store| store.add(&name, profile)) {
                return Response::Error {
                    message: "Profile name must not be empty".to_string(),
                };
            }
            persisted(&st, format!("Profile '{name}' saved"))
        }

        Request::DeleteProfile { name } => {
            if !st.store.send_if_modified(|store| store.remove(&name)) {
                return Response::Error {
                    message: format!("Profile '{name}' not found"),
                };
            }
            persisted(&st, format!("Deleted profile '{name}'"))
        }

        Request::Assign {
            channel,
            app,
            profile,
        } => {
            if channel >= st.channels.len() {
                return Response::Error {
                    message: format!("Unknown channel: {channel}"),
                };
            }
            let assigned = st
                .store
                .send_if_modified(|store| store.assign(channel, app.as_deref(), profile.as_deref()));
            if !assigned {
                return Response::Error {
                    message: format!("Unknown profile: {}", profile.unwrap_or_default()),
                };
            }
            let message = match profile {
                Some(name) => format!("Channel {channel} now uses '{name}'"),
                None => format!("Channel {channel} unassigned"),
            };
            persisted(&st, message)
        }

        Request::SetApp { app } => {
            let message = match &app {
                Some(app) => format!("Application context set to {app}"),
                None => "Application context cleared".to_string(),
            };
            st.app.send_replace(app);
            Response::Ok { message }
        }

        // Handled per connection.
        Request::Subscribe => Response::Ok {
            message: "Subscribed".to_string(),
        },
    }
}

fn status(st: &DaemonState) -> Response {
    Response::Status {
        channels: st.channels.clone(),
        samples: st.samples.borrow().clone(),
        assignments: st.store.borrow().assignments().to_vec(),
        app: st.app.borrow().clone(),
    }
}

fn profiles(st: &DaemonState) -> Response {
    Response::Profiles {
        profiles: st.store.borrow().list().clone(),
    }
}

/// Write the store back to the config file after a mutation.
fn persisted(st: &DaemonState, message: String) -> Response {
    let cfg = Config {
        daemon: st.daemon.clone(),
        channels: st.channel_configs.clone(),
        store: st.store.borrow().clone(),
    };
    match config::save_config(&st.config_path, &cfg) {
        Ok(()) => Response::Ok { message },
        Err(e) => {
            log::error!("Failed to save config: {e}");
            Response::Error {
                message: format!("{message}, but saving the config failed: {e}"),
            }
        }
    }
}
