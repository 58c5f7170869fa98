//! maze3d daemon - runs one maze episode after another in the background.
//!
//! The daemon owns a single [`Controller`]. A frame loop steps it at the
//! configured rate; policy inference runs on the blocking pool and reports
//! back with its decision ticket. Clients talk newline-delimited JSON over
//! TCP (127.0.0.1:9877) to fetch frames, stats and settings, or to steer the
//! run.
//!
//! Settings location:
//! - Linux: ~/.local/share/maze3d/config.json
//! - Windows: %APPDATA%\maze3d\config.json
//! - MacOS: ~/Library/Application Support/maze3d/config.json

use maze3d::controller::{next_seed, Controller, Decision, DecisionTicket, NavigationMode};
use maze3d::observation::Observation;
use maze3d::observer::{FrameAdapter, FrameSnapshot, StatsSummary};
use maze3d::policy::{GoalSeekingPolicy, PolicyError, PolicyPort, QNetworkPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time;
use tracing::{debug, error, info, warn};

mod paths;
mod settings;

use paths::AppPaths;
use settings::{Settings, MAX_FPS, MIN_FPS};

const LISTEN_ADDR: &str = "127.0.0.1:9877";

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetFrame {
        #[serde(default)]
        include_path: bool,
    },
    GetStats,
    CfgGet,
    CfgSet {
        settings: Settings,
    },
    Start,
    Stop,
    NewMaze {
        #[serde(default)]
        seed: Option<u64>,
    },
    SetMode {
        mode: String,
    },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    Frame(FrameSnapshot),
    Stats {
        running: bool,
        frame: u64,
        generation: u64,
        policy: String,
        summary: StatsSummary,
    },
    Config(Settings),
    Success { message: String },
    Error { message: String },
}

// ═══════════════════════════════════════════════════════════════════════════
// Daemon State
// ═══════════════════════════════════════════════════════════════════════════

struct DaemonState {
    controller: Controller,
    policy: Arc<dyn PolicyPort>,
    settings: Settings,
    paths: AppPaths,
    running: bool,
    frame: u64,
}

/// Inference handed off the frame loop.
struct InferenceJob {
    ticket: DecisionTicket,
    observation: Observation,
    policy: Arc<dyn PolicyPort>,
}

fn load_policy(settings: &Settings, paths: &AppPaths) -> Arc<dyn PolicyPort> {
    let candidate = settings.policy_weights.clone().or_else(|| {
        let p = paths.default_weights_file();
        p.exists().then_some(p)
    });
    let Some(path) = candidate else {
        info!("No policy weights configured; using goal-seeking policy");
        return Arc::new(GoalSeekingPolicy);
    };
    match QNetworkPolicy::load(&path) {
        Ok(net) => {
            info!("Loaded policy {:?} from {:?}", net.name(), path);
            Arc::new(net)
        }
        Err(e) => {
            warn!("Could not load policy weights {:?}: {}", path, e);
            info!("Falling back to goal-seeking policy");
            Arc::new(GoalSeekingPolicy)
        }
    }
}

impl DaemonState {
    fn new(settings: Settings, paths: AppPaths) -> Self {
        let policy = load_policy(&settings, &paths);
        let controller = Controller::new(settings.run.clone());
        info!(
            "Maze {} seed={} mode={}",
            controller.episode().grid.dims(),
            controller.seed(),
            controller.mode().name()
        );
        Self {
            controller,
            policy,
            settings,
            paths,
            running: false,
            frame: 0,
        }
    }

    /// One frame. Steps directly when the route supplies the move; otherwise
    /// returns the inference to run. Nothing happens while stopped or while a
    /// previous inference is still out.
    fn tick(&mut self) -> Option<InferenceJob> {
        if !self.running {
            return None;
        }
        self.frame += 1;
        self.controller.roll_over();

        match self.controller.begin_decision()? {
            Decision::Immediate(action) => {
                self.controller.apply_action(action);
                None
            }
            Decision::Infer {
                ticket,
                observation,
            } => Some(InferenceJob {
                ticket,
                observation,
                policy: Arc::clone(&self.policy),
            }),
        }
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
        if self.controller.cancel_in_flight().is_some() {
            debug!("Stop cancelled an outstanding inference");
        }
    }

    fn new_maze(&mut self, seed: Option<u64>) {
        let seed = seed.unwrap_or_else(|| next_seed(self.controller.seed()));
        self.controller.regenerate(seed);
        info!(
            "New maze generation={} seed={}",
            self.controller.generation(),
            seed
        );
    }

    fn set_mode(&mut self, mode: &str) -> Result<NavigationMode, String> {
        let mode = NavigationMode::parse(mode)
            .ok_or_else(|| format!("mode must be 'path_follow' or 'policy', got '{mode}'"))?;
        self.controller.set_mode(mode);
        self.settings.run.mode = mode;
        Ok(mode)
    }

    fn apply_settings(&mut self, mut settings: Settings) -> Result<(), String> {
        settings.validate().map_err(|e| e.to_string())?;
        settings.target_fps = settings.target_fps.clamp(MIN_FPS, MAX_FPS);

        if settings.policy_weights != self.settings.policy_weights {
            self.policy = load_policy(&settings, &self.paths);
        }
        if settings.run != self.settings.run {
            self.controller.reconfigure(settings.run.clone());
            info!(
                "Reconfigured: maze {} generation={}",
                self.controller.episode().grid.dims(),
                self.controller.generation()
            );
        }
        self.settings = settings;
        Ok(())
    }

    fn save_settings(&self) -> Result<(), String> {
        let path = self.paths.config_file();
        self.settings.save(&path).map_err(|e| e.to_string())?;
        info!("Settings saved to {:?}", path);
        Ok(())
    }

    fn frame_snapshot(&self, include_path: bool) -> FrameSnapshot {
        FrameAdapter::new(&self.controller).snapshot(include_path)
    }

    fn stats(&self) -> Response {
        Response::Stats {
            running: self.running,
            frame: self.frame,
            generation: self.controller.generation(),
            policy: self.policy.name().to_string(),
            summary: StatsSummary::from(self.controller.stats()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Frame Loop
// ═══════════════════════════════════════════════════════════════════════════

async fn run_frame(state: &Arc<RwLock<DaemonState>>) {
    let job = {
        let mut s = state.write().await;
        s.tick()
    };
    if let Some(job) = job {
        let state = Arc::clone(state);
        tokio::spawn(async move { run_inference(state, job).await });
    }
}

async fn run_inference(state: Arc<RwLock<DaemonState>>, job: InferenceJob) {
    let InferenceJob {
        ticket,
        observation,
        policy,
    } = job;

    let result = match tokio::task::spawn_blocking(move || policy.choose_action(&observation)).await
    {
        Ok(r) => r,
        Err(e) => Err(PolicyError::Runtime(format!("inference task failed: {e}"))),
    };

    let mut s = state.write().await;
    if s.controller.complete_decision(ticket, result).is_none() {
        debug!("Discarded late inference result (serial {})", ticket.serial);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_request(request: Request, state: &Arc<RwLock<DaemonState>>) -> Response {
    match request {
        Request::GetFrame { include_path } => {
            let s = state.read().await;
            Response::Frame(s.frame_snapshot(include_path))
        }
        Request::GetStats => {
            let s = state.read().await;
            s.stats()
        }
        Request::CfgGet => {
            let s = state.read().await;
            Response::Config(s.settings.clone())
        }
        Request::CfgSet { settings } => {
            let mut s = state.write().await;
            match s.apply_settings(settings) {
                Ok(()) => Response::Config(s.settings.clone()),
                Err(message) => Response::Error { message },
            }
        }
        Request::Start => {
            let mut s = state.write().await;
            s.start();
            Response::Success {
                message: "Started".to_string(),
            }
        }
        Request::Stop => {
            let mut s = state.write().await;
            s.stop();
            Response::Success {
                message: "Stopped".to_string(),
            }
        }
        Request::NewMaze { seed } => {
            let mut s = state.write().await;
            s.new_maze(seed);
            Response::Success {
                message: format!(
                    "New maze (generation {}, seed {})",
                    s.controller.generation(),
                    s.controller.seed()
                ),
            }
        }
        Request::SetMode { mode } => {
            let mut s = state.write().await;
            match s.set_mode(&mode) {
                Ok(m) => Response::Success {
                    message: format!("Mode set to {}", m.name()),
                },
                Err(message) => Response::Error { message },
            }
        }
        Request::Shutdown => {
            let mut s = state.write().await;
            s.stop();
            match s.save_settings() {
                Ok(_) => {
                    info!("Shutdown requested; settings saved");
                    tokio::spawn(async {
                        // Give the response a moment to flush before exiting.
                        time::sleep(Duration::from_millis(50)).await;
                        std::process::exit(0);
                    });
                    Response::Success {
                        message: "Shutting down".to_string(),
                    }
                }
                Err(e) => Response::Error {
                    message: format!("Save failed, aborting shutdown: {}", e),
                },
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    state: Arc<RwLock<DaemonState>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(req) => handle_request(req, &state).await,
            Err(e) => Response::Error {
                message: format!("Invalid request: {}", e),
            },
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Setup application paths
    let paths = AppPaths::new()?;
    info!("Data directory: {:?}", paths.data_dir());

    let mut settings = match Settings::load(&paths.config_file()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Could not load settings: {}", e);
            info!("Starting with default settings");
            Settings::default()
        }
    };
    settings.apply_env();

    let state = Arc::new(RwLock::new(DaemonState::new(settings, paths)));

    // Save settings on Ctrl-C so runtime changes survive an abrupt stop.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let mut s = state.write().await;
                s.stop();
                if let Err(e) = s.save_settings() {
                    error!("Ctrl-C save failed: {}", e);
                } else {
                    info!("Ctrl-C: settings saved");
                }
                std::process::exit(0);
            }
        });
    }

    // Start IPC server
    let listener = TcpListener::bind(LISTEN_ADDR).await?;
    info!("maze3d daemon listening on {}", LISTEN_ADDR);

    // Frame loop task
    let state_clone = Arc::clone(&state);
    tokio::spawn(async move {
        loop {
            let target_fps = {
                let s = state_clone.read().await;
                s.settings.target_fps.max(MIN_FPS)
            };
            let frame_millis = (1000 / target_fps).max(1) as u64;
            time::sleep(Duration::from_millis(frame_millis)).await;

            run_frame(&state_clone).await;
        }
    });

    // Accept client connections
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}
