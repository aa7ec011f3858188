use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use eq_core::equilibrium::{pressure_effect, temperature_effect};
use eq_core::{AbilityKind, ActionKey, Actor, DifficultyTier, EventEnvelope, Intervention};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, HeaderValue::from_static("http://localhost:5173"))
}

pub fn make_router_with_cors(state: AppState, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/reactions", get(reactions_handler))
        .route("/api/v1/hint", get(hint_handler))
        .route("/api/v1/stream", get(stream_handler))
        .route("/api/v1/match", post(start_handler))
        .route("/api/v1/action", post(action_handler))
        .route("/api/v1/ability", post(ability_handler))
        .route("/api/v1/pause", post(pause_handler))
        .route("/api/v1/resume", post(resume_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_body(status: StatusCode, message: String) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message })))
}

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let host = app_state.host.lock();
    Json(serde_json::json!({
        "reaction_id": host.game.def.id,
        "seed": host.seed,
        "content_version": host.content.content_version,
        "clock_ms": host.game.clock_ms,
        "phase": host.game.phase,
        "paused": host.game.is_paused(),
        "tick_ms": app_state.tick_ms,
    }))
}

pub async fn snapshot_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let snapshot = app_state.host.lock().game.snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(json) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            json,
        ),
        Err(err) => {
            tracing::error!("snapshot serialization failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"serialization failed"}"#.to_string(),
            )
        }
    }
}

pub async fn reactions_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let host = app_state.host.lock();
    let reactions: Vec<serde_json::Value> = host
        .content
        .reactions
        .iter()
        .map(|def| {
            serde_json::json!({
                "id": def.id,
                "name": def.name,
                "equation": def.equation,
                "gas_phase": def.is_gas_phase(),
                "heating_favours": temperature_effect(def).favours_on_increase,
                "pressurizing_favours": def
                    .is_gas_phase()
                    .then(|| pressure_effect(def).favours_on_increase)
                    .flatten(),
            })
        })
        .collect();
    Json(serde_json::json!({ "reactions": reactions }))
}

pub async fn hint_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let host = app_state.host.lock();
    Json(serde_json::json!({ "hint": eq_control::hint(&host.game, Actor::Player) }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    pub reaction_id: Option<String>,
    /// Opponent tier 1-4; 0 disables the opponent.
    pub difficulty: Option<u8>,
    pub max_rounds: Option<u32>,
    pub round_seconds: Option<u64>,
    pub seed: Option<u64>,
}

pub async fn start_handler(
    State(app_state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut host = app_state.host.lock();
    let mut config = host.content.settings.to_match_config();
    if let Some(level) = request.difficulty {
        config.difficulty = (level > 0).then(|| DifficultyTier::new(level));
    }
    if let Some(rounds) = request.max_rounds {
        config.max_rounds = rounds.max(1);
    }
    if let Some(seconds) = request.round_seconds {
        config.round_ms = seconds.max(1) * 1_000;
    }
    let reaction_id = request
        .reaction_id
        .unwrap_or_else(|| host.game.def.id.0.clone());
    let seed = request.seed.unwrap_or_else(rand::random);

    match host.restart(&reaction_id, config, seed) {
        Ok(events) => {
            tracing::info!(%reaction_id, seed, "match started");
            let snapshot = host.game.snapshot();
            drop(host);
            let _ = app_state.event_tx.send(events);
            (StatusCode::OK, Json(serde_json::json!(snapshot)))
        }
        Err(err) => {
            tracing::debug!("match start rejected: {err:#}");
            error_body(StatusCode::BAD_REQUEST, format!("{err:#}"))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    /// `addSpecies:<id>`, `heat`, `cool`, `pressurize` or `depressurize`.
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct AbilityRequest {
    pub ability: String,
}

fn submit_player(
    app_state: &AppState,
    intervention: &Intervention,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut host = app_state.host.lock();
    let (outcome, events) = host.submit_player(intervention);
    let report = host.game.reaction.report();
    drop(host);
    let _ = app_state.event_tx.send(events);

    match outcome {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "accepted": true, "report": report })),
        ),
        Err(rejection) => {
            tracing::debug!(%intervention, %rejection, "player intervention rejected");
            (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "accepted": false, "rejection": rejection })),
            )
        }
    }
}

pub async fn action_handler(
    State(app_state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match request.action.parse::<ActionKey>() {
        Ok(key) => submit_player(&app_state, &Intervention::Act(key)),
        Err(err) => error_body(StatusCode::BAD_REQUEST, err.to_string()),
    }
}

pub async fn ability_handler(
    State(app_state): State<AppState>,
    Json(request): Json<AbilityRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match request.ability.parse::<AbilityKind>() {
        Ok(kind) => submit_player(&app_state, &Intervention::UseAbility(kind)),
        Err(err) => error_body(StatusCode::BAD_REQUEST, err),
    }
}

pub async fn pause_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let mut events = Vec::new();
    let mut host = app_state.host.lock();
    let changed = host.game.pause(&mut events);
    let paused = host.game.is_paused();
    drop(host);
    let _ = app_state.event_tx.send(events);
    Json(serde_json::json!({ "paused": paused, "changed": changed }))
}

pub async fn resume_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let mut events = Vec::new();
    let mut host = app_state.host.lock();
    let changed = host.game.resume(&mut events);
    let paused = host.game.is_paused();
    drop(host);
    let _ = app_state.event_tx.send(events);
    Json(serde_json::json!({ "paused": paused, "changed": changed }))
}

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let host = app_state.host.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_millis(500));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(50));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let snapshot = host.lock().game.snapshot();
                    let hb = serde_json::json!({"heartbeat": true, "snapshot": snapshot});
                    yield Ok(Event::default().data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MatchHost;
    use axum::{body::Body, http::Request};
    use eq_core::test_fixtures::{config, gas_reaction, simple_reaction};
    use eq_core::Constants;
    use eq_world::{Content, Settings};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn make_test_state() -> AppState {
        let content = Content {
            content_version: "test".to_string(),
            reactions: vec![simple_reaction(), gas_reaction()],
            settings: Settings {
                difficulty: None,
                ..Settings::default()
            },
            constants: Constants::default(),
            fixes: vec![],
        };
        let (host, _) = MatchHost::start(content, "test_abc", config(None), 0).unwrap();
        let (event_tx, _) = tokio::sync::broadcast::channel(64);
        AppState {
            host: std::sync::Arc::new(parking_lot::Mutex::new(host)),
            event_tx,
            tick_ms: 100,
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_meta_contains_reaction() {
        let (status, json) = get_json(make_router(make_test_state()), "/api/v1/meta").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reaction_id"], "test_abc");
        assert_eq!(json["phase"], "round_active");
    }

    #[tokio::test]
    async fn test_snapshot_is_balanced_at_start() {
        let (status, json) = get_json(make_router(make_test_state()), "/api/v1/snapshot").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["round"], 1);
        assert!(json["shift"].as_f64().unwrap().abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_reactions_lists_catalog() {
        let (_, json) = get_json(make_router(make_test_state()), "/api/v1/reactions").await;
        let reactions = json["reactions"].as_array().unwrap();
        assert_eq!(reactions.len(), 2);
        assert_eq!(reactions[1]["gas_phase"], true);
        assert_eq!(reactions[1]["pressurizing_favours"], "forward");
    }

    #[tokio::test]
    async fn test_action_then_cooldown() {
        let state = make_test_state();
        let body = serde_json::json!({ "action": "heat" });
        let (status, json) = post_json(make_router(state.clone()), "/api/v1/action", body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["accepted"], true);

        let (status, json) = post_json(make_router(state), "/api/v1/action", body).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["rejection"]["reason"], "cooling_down");
    }

    #[tokio::test]
    async fn test_pressure_rejected_for_solution_reaction() {
        let body = serde_json::json!({ "action": "pressurize" });
        let (status, json) = post_json(make_router(make_test_state()), "/api/v1/action", body).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["rejection"]["reason"], "not_gas_phase");
    }

    #[tokio::test]
    async fn test_unknown_action_is_bad_request() {
        let body = serde_json::json!({ "action": "stir" });
        let (status, json) = post_json(make_router(make_test_state()), "/api/v1/action", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_ability_accepted_once() {
        let state = make_test_state();
        let body = serde_json::json!({ "ability": "catalyst" });
        let (status, _) = post_json(make_router(state.clone()), "/api/v1/ability", body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, json) = post_json(make_router(state), "/api/v1/ability", body).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["rejection"]["reason"], "ability_recharging");
    }

    #[tokio::test]
    async fn test_pause_blocks_actions_until_resume() {
        let state = make_test_state();
        let (_, json) = post_json(make_router(state.clone()), "/api/v1/pause", serde_json::json!({})).await;
        assert_eq!(json["paused"], true);
        assert_eq!(json["changed"], true);

        let body = serde_json::json!({ "action": "addSpecies:A" });
        let (status, json) = post_json(make_router(state.clone()), "/api/v1/action", body.clone()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["rejection"]["reason"], "paused");

        let (_, json) = post_json(make_router(state.clone()), "/api/v1/resume", serde_json::json!({})).await;
        assert_eq!(json["paused"], false);
        let (status, _) = post_json(make_router(state), "/api/v1/action", body).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_switches_reaction() {
        let state = make_test_state();
        let body = serde_json::json!({ "reaction_id": "test_haber", "max_rounds": 2, "seed": 5 });
        let (status, json) = post_json(make_router(state.clone()), "/api/v1/match", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reaction_id"], "test_haber");
        assert_eq!(json["max_rounds"], 2);

        let body = serde_json::json!({ "reaction_id": "missing" });
        let (status, _) = post_json(make_router(state), "/api/v1/match", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
