//! Read-only HTTP feed of simulation frames for an external viewer.
//!
//! The simulation runs on a blocking task that owns the world outright, so
//! every tick is one exclusive section. Handlers only ever see cloned frames.

use std::{
    collections::VecDeque,
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info};

use crate::{
    engine::{EngineBuilder, EngineSettings, Frame, GameSpeed},
    events::TracingPresenter,
    scenario::Scenario,
};

/// Frames kept for `/api/frames`. Older ones are dropped.
const FRAME_HISTORY: usize = 600;

#[derive(Clone, Serialize)]
pub struct UiFrame {
    #[serde(flatten)]
    pub frame: Frame,
    pub completed: bool,
}

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub total_ticks: u64,
    pub frame: Option<UiFrame>,
    pub completed: bool,
}

#[derive(Clone)]
struct AppState {
    broadcaster: broadcast::Sender<String>,
    latest_frame: Arc<Mutex<Option<UiFrame>>>,
    frames: Arc<Mutex<VecDeque<UiFrame>>>,
    total_ticks: u64,
    scenario_name: String,
    simulation_done: Arc<AtomicBool>,
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub ticks: u64,
    pub speed: GameSpeed,
    pub snapshot_interval: u64,
    pub snapshot_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn publish(state: &AppState, frame: UiFrame) {
    *lock(&state.latest_frame) = Some(frame.clone());
    {
        let mut frames = lock(&state.frames);
        if frames.len() == FRAME_HISTORY {
            frames.pop_front();
        }
        frames.push_back(frame.clone());
    }
    if let Ok(payload) = serde_json::to_string(&frame) {
        let _ = state.broadcaster.send(payload);
    }
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        ticks,
        speed,
        snapshot_interval,
        snapshot_dir,
        host,
        port,
    } = config;

    let scenario_name = scenario.name.clone();
    let mut world = scenario.build_world()?;
    let settings = EngineSettings {
        scenario_name: scenario_name.clone(),
        snapshot_interval_ticks: snapshot_interval,
        snapshot_dir,
        speed,
    };
    let mut engine = EngineBuilder::new(settings)
        .with_standard_systems()
        .with_presenter(TracingPresenter)
        .build();

    let (tx, _) = broadcast::channel::<String>(512);
    let state = AppState {
        broadcaster: tx,
        latest_frame: Arc::new(Mutex::new(None)),
        frames: Arc::new(Mutex::new(VecDeque::new())),
        total_ticks: ticks,
        scenario_name: scenario_name.clone(),
        simulation_done: Arc::new(AtomicBool::new(false)),
    };

    let sim_state = state.clone();
    let sim_handle = tokio::task::spawn_blocking(move || -> Result<()> {
        engine.run_with_hook(&mut world, ticks, |frame| {
            publish(
                &sim_state,
                UiFrame {
                    frame,
                    completed: false,
                },
            );
        })?;
        sim_state.simulation_done.store(true, Ordering::SeqCst);

        let last = lock(&sim_state.latest_frame).clone();
        if let Some(mut frame) = last {
            frame.completed = true;
            *lock(&sim_state.latest_frame) = Some(frame.clone());
            if let Some(back) = lock(&sim_state.frames).back_mut() {
                *back = frame.clone();
            }
            if let Ok(payload) = serde_json::to_string(&frame) {
                let _ = sim_state.broadcaster.send(payload);
            }
        }
        Ok(())
    });

    let label = scenario_name.clone();
    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(())) => info!(scenario = %label, "simulation completed"),
            Ok(Err(err)) => error!(scenario = %label, "simulation error: {err:?}"),
            Err(err) => error!(scenario = %label, "simulation task failed: {err:?}"),
        }
    });

    let router = Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/frames", get(all_frames))
        .route("/api/events", get(stream_events))
        .with_state(Arc::new(state));

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, scenario = %scenario_name, "frame feed live (Ctrl+C to stop)");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down frame feed");
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    let frame = lock(&state.latest_frame).clone();
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        total_ticks: state.total_ticks,
        frame,
        completed: state.simulation_done.load(Ordering::SeqCst),
    })
}

#[derive(Serialize)]
struct FramesResponse {
    scenario: String,
    total_ticks: u64,
    completed: bool,
    frames: Vec<UiFrame>,
}

async fn all_frames(State(state): State<Arc<AppState>>) -> Json<FramesResponse> {
    let frames = lock(&state.frames).iter().cloned().collect();
    Json(FramesResponse {
        scenario: state.scenario_name.clone(),
        total_ticks: state.total_ticks,
        completed: state.simulation_done.load(Ordering::SeqCst),
        frames,
    })
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
