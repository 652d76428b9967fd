//! Filter Wizard Server
//! - Equation, prediction, and parts JSON API
//! - Remote simulation orchestration
//! - WebSocket binary Bode streaming

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use clap::Parser;
use filter_wizard::{
    PartsClient, PartsConfig, PollPolicy, PredictorClient, PredictorConfig, SimulationBackend, SimulationConfig,
    Simulator, SystemVisionClient, WizardConfig,
};
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;

pub struct AppState {
    simulator: Simulator<dyn SimulationBackend>,
    predictor: PredictorClient,
    parts: PartsClient,
    bode_tx: broadcast::Sender<Vec<u8>>,
    current_bode: RwLock<Option<Vec<u8>>>,
    /// Cancelled on shutdown; every simulation polls under a child token
    shutdown: CancellationToken,
}

impl AppState {
    fn new(
        simulator: Simulator<dyn SimulationBackend>,
        predictor: PredictorClient,
        parts: PartsClient,
        shutdown: CancellationToken,
    ) -> Self {
        let (bode_tx, _) = broadcast::channel::<Vec<u8>>(16);
        Self {
            simulator,
            predictor,
            parts,
            bode_tx,
            current_bode: RwLock::new(None),
            shutdown,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "filter-wizard-server")]
#[command(about = "Lowpass filter design wizard backend")]
#[command(version)]
struct Args {
    /// Listen address
    #[arg(long, env = "FILTER_WIZARD_BIND", default_value = "0.0.0.0:3001")]
    bind: SocketAddr,

    /// Simulation API root
    #[arg(long, env = "FILTER_WIZARD_SIM_URL", default_value = filter_wizard::config::DEFAULT_SIMULATION_URL)]
    sim_url: String,

    /// Simulation API bearer token
    #[arg(long, env = "FILTER_WIZARD_SIM_TOKEN", default_value = "", hide_env_values = true)]
    sim_token: String,

    /// Restrict the design listing to this user
    #[arg(long, env = "FILTER_WIZARD_SIM_USER")]
    sim_user: Option<String>,

    /// Samples requested per waveform
    #[arg(long, env = "FILTER_WIZARD_DIVISIONS", default_value = "1500")]
    divisions: u32,

    /// Seconds to wait for a run before giving up
    #[arg(long, env = "FILTER_WIZARD_MAX_WAIT", default_value = "600")]
    max_wait: u64,

    /// Regression scoring URL
    #[arg(long, env = "FILTER_WIZARD_PREDICTOR_URL", default_value = filter_wizard::config::DEFAULT_PREDICTOR_URL)]
    predictor_url: String,

    /// Regression scoring API key
    #[arg(long, env = "FILTER_WIZARD_PREDICTOR_KEY", default_value = "", hide_env_values = true)]
    predictor_key: String,

    /// Parts catalog search URL
    #[arg(long, env = "FILTER_WIZARD_PARTS_URL", default_value = filter_wizard::config::DEFAULT_PARTS_URL)]
    parts_url: String,

    /// Parts catalog API key
    #[arg(long, env = "FILTER_WIZARD_PARTS_KEY", default_value = "", hide_env_values = true)]
    parts_key: String,

    /// Parts listings returned per search
    #[arg(long, env = "FILTER_WIZARD_PARTS_LIMIT", default_value = "5")]
    parts_limit: usize,

    /// Pre-built dashboard to serve at /
    #[arg(long, env = "FILTER_WIZARD_STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

impl Args {
    fn wizard_config(&self) -> WizardConfig {
        WizardConfig {
            simulation: SimulationConfig {
                base_url: self.sim_url.clone(),
                token: self.sim_token.clone(),
                user_id: self.sim_user.clone(),
                divisions: self.divisions,
                ..SimulationConfig::default()
            },
            predictor: PredictorConfig {
                url: self.predictor_url.clone(),
                api_key: self.predictor_key.clone(),
            },
            parts: PartsConfig {
                url: self.parts_url.clone(),
                api_key: self.parts_key.clone(),
                limit: self.parts_limit,
            },
            poll: PollPolicy {
                max_wait: Duration::from_secs(self.max_wait),
                ..PollPolicy::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = args.wizard_config();
    let http = reqwest::Client::builder()
        .timeout(config.simulation.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let backend: Arc<dyn SimulationBackend> =
        Arc::new(SystemVisionClient::with_client(http.clone(), &config.simulation));
    let predictor = PredictorClient::new(http.clone(), &config.predictor);
    let parts = PartsClient::new(http, &config.parts);

    info!("Simulation API: {}", config.simulation.base_url);

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(
        Simulator::new(backend, config.poll, config.simulation.divisions),
        predictor,
        parts,
        shutdown.clone(),
    ));

    let app = router(state, args.static_dir.clone());

    info!("Server: http://{}", args.bind);
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

fn router(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/api/topologies", get(api::topologies))
        .route("/api/designs", get(api::designs))
        .route("/api/design", post(api::design))
        .route("/api/predict", post(api::predict))
        .route("/api/simulate", post(api::simulate))
        .route("/api/parts", get(api::parts))
        .route("/ws", get(ws_handler));

    if let Some(dir) = static_dir {
        info!("Serving dashboard from {:?}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler; run until the token is cancelled elsewhere
        shutdown.cancelled().await;
        return;
    }
    info!("Shutting down, cancelling in-flight simulations");
    shutdown.cancel();
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.bode_tx.subscribe();

    // Late joiners get the most recent result
    if let Some(frame) = state.current_bode.read().await.clone() {
        let _ = sender.send(Message::Binary(frame)).await;
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            Ok(frame) = rx.recv() => {
                if sender.send(Message::Binary(frame)).await.is_err() {
                    break;
                }
            }
            Some(msg) = receiver.next() => {
                match msg {
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            else => break,
        }
    }
}
