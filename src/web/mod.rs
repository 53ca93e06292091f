use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    goals::ClaimOutcome,
    grid::BuildingType,
    oracle::TemplateOracle,
    scenario::Scenario,
    session::{Session, SessionError, SessionHandle},
    systems::StrikeOutcome,
    transactions::TransactionOutcome,
    world::WorldSnapshot,
};

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub snapshot: WorldSnapshot,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ActRequest {
    pub x: i32,
    pub y: i32,
    pub tool: BuildingType,
}

#[derive(Clone)]
struct AppState {
    session: SessionHandle,
    scenario_name: String,
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub ai_enabled: bool,
    pub host: String,
    pub port: u16,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response()
    }
}

pub fn router(session: SessionHandle, scenario_name: impl Into<String>) -> Router {
    let state = Arc::new(AppState {
        session,
        scenario_name: scenario_name.into(),
    });
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/events", get(stream_events))
        .route("/api/act", post(act))
        .route("/api/agents/:id/click", post(click_agent))
        .route("/api/goal/claim", post(claim_goal))
        .with_state(state)
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        ai_enabled,
        host,
        port,
    } = config;

    let oracle = Arc::new(TemplateOracle::new(scenario.seed));
    let session = Session::start(&scenario, ai_enabled, oracle);
    let app = router(session.clone(), scenario.name.clone());

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, scenario = %scenario.name, "serving session (Ctrl+C to stop)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = session.shutdown().await {
        warn!(error = %err, "session already stopped");
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        snapshot: state.session.snapshot(),
    })
}

async fn act(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActRequest>,
) -> Result<Json<TransactionOutcome>, SessionError> {
    let outcome = state
        .session
        .act(request.x, request.y, request.tool)
        .await?;
    Ok(Json(outcome))
}

async fn click_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<StrikeOutcome>, SessionError> {
    Ok(Json(state.session.click_agent(id).await?))
}

async fn claim_goal(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClaimOutcome>, SessionError> {
    Ok(Json(state.session.claim_goal().await?))
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.session.subscribe_events();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(event) => serde_json::to_string(&event)
            .ok()
            .map(|payload| Ok(Event::default().event("game_event").data(payload))),
        // Lagged receivers skip ahead.
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::NullOracle;

    fn state() -> Arc<AppState> {
        let scenario = Scenario::from_yaml("name: web\nseed: 2\ngrid_size: 8\n").unwrap();
        Arc::new(AppState {
            session: Session::start(&scenario, false, Arc::new(NullOracle)),
            scenario_name: scenario.name,
        })
    }

    #[tokio::test]
    async fn act_then_state_round_trip() {
        let state = state();
        let Json(outcome) = act(
            State(state.clone()),
            Json(ActRequest {
                x: 3,
                y: 3,
                tool: BuildingType::Park,
            }),
        )
        .await
        .unwrap();
        assert!(outcome.is_applied());

        let Json(envelope) = latest_state(State(state.clone())).await;
        assert_eq!(envelope.scenario, "web");
        let tile = envelope.snapshot.grid.get(3, 3).unwrap();
        assert_eq!(tile.building, BuildingType::Park);
        state.session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn closed_session_maps_to_503() {
        let state = state();
        state.session.shutdown().await.unwrap();
        let err = claim_goal(State(state)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn act_request_uses_snake_case_tools() {
        let request: ActRequest =
            serde_json::from_str(r#"{"x": 1, "y": 2, "tool": "residential"}"#).unwrap();
        assert_eq!(request.tool, BuildingType::Residential);
    }
}
