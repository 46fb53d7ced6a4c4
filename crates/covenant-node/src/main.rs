//! # Covenant Node
//!
//! Host process for the contract engine: loads blueprints, restores the last
//! save, advances the simulation clock and serves the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use covenant_state::{BlueprintStore, InMemorySaveStore, JsonFileStore, Registry, SaveStore};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod engine;
mod state;

use config::{NodeConfig, LOG_ENV};
use engine::Engine;
use state::{AppState, SimClock};

/// Build the session state from config: blueprints first, then the last save.
fn load_state(config: &NodeConfig) -> anyhow::Result<AppState> {
    let mut store = BlueprintStore::new();
    if let Some(path) = &config.blueprint_path {
        let report = store.load_file(path)?;
        info!(
            "📚 Loaded {} blueprints from {}",
            report.registered.len(),
            path.display()
        );
    }

    let saves: Arc<dyn SaveStore> = match &config.save_path {
        Some(path) => Arc::new(JsonFileStore::new(path)),
        None => Arc::new(InMemorySaveStore::new()),
    };

    let (registry, clock) = match saves.load()? {
        Some(save) => {
            let (registry, report) = Registry::restore(store, &save)?;
            if !report.failed.is_empty() {
                warn!("⚠️ {} contracts could not be restored", report.failed.len());
            }
            (registry, SimClock::starting_at(save.universal_time))
        }
        None => (Registry::new(store), SimClock::default()),
    };

    Ok(AppState::new(registry, clock, saves))
}

/// Run the Covenant node server.
pub async fn run_server(config: NodeConfig) -> anyhow::Result<()> {
    info!("🚀 Covenant Node starting...");

    let state = load_state(&config)?;
    let addr = config.bind_address;

    let engine = Arc::new(Engine::new(state.clone(), config));
    let engine_clone = engine.clone();
    tokio::spawn(async move {
        engine_clone.run().await;
    });

    let app = create_router(state);

    info!("🌐 Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router.
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health::health_check))
        // Contracts
        .route("/api/v1/contracts", get(api::contracts::list_contracts))
        .route("/api/v1/contracts/:id", get(api::contracts::get_contract))
        .route("/api/v1/contracts/:id/accept", post(api::contracts::accept_contract))
        .route("/api/v1/contracts/:id/reject", post(api::contracts::reject_contract))
        .route("/api/v1/contracts/:id/bind", post(api::contracts::bind_vessel))
        .route("/api/v1/offers", post(api::contracts::create_offer))
        .route("/api/v1/blueprints", get(api::blueprints::list_blueprints))
        // Simulation
        .route("/api/v1/telemetry", post(api::telemetry::post_telemetry))
        .route(
            "/api/v1/notifications",
            get(api::notifications::list_notifications)
                .delete(api::notifications::drain_notifications),
        )
        .route("/api/v1/clock", get(api::session::get_clock))
        .route("/api/v1/save", post(api::session::save))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = NodeConfig::load(config_path.as_deref())?;
    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use covenant_core::{
        Action, ContractBlueprint, ContractStatus, OrbitBounds, Requirement, Trigger,
    };
    use covenant_engine::{ContractSnapshot, Notification};
    use serde_json::json;

    fn registry() -> Registry {
        let mut store = BlueprintStore::new();
        store
            .register(
                ContractBlueprint::builder("first_orbit")
                    .title("First Orbit")
                    .rejectable(false)
                    .requirement(Requirement::orbit(
                        "orbit",
                        OrbitBounds::default().around("kerbin").periapsis(Some(70_000.0), None),
                    ))
                    .action(Action::message("go", Trigger::OnContractAccepted, "Go", "Launch!").blocking())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Registry::new(store)
    }

    fn server() -> (TestServer, AppState) {
        let state = AppState::in_memory(registry());
        let server = TestServer::new(create_router(state.clone())).unwrap();
        (server, state)
    }

    async fn offer(server: &TestServer) -> ContractSnapshot {
        let response = server
            .post("/api/v1/offers")
            .json(&json!({ "blueprint_id": "first_orbit" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<ContractSnapshot>()
    }

    #[tokio::test]
    async fn test_health() {
        let (server, _) = server();
        let response = server.get("/health").await;
        response.assert_status_ok();
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["blueprints"], 1);
    }

    #[tokio::test]
    async fn test_offer_accept_and_list() {
        let (server, _) = server();
        let offered = offer(&server).await;
        assert_eq!(offered.status, ContractStatus::Offered);
        assert_eq!(offered.title, "First Orbit");

        let listed = server
            .get("/api/v1/contracts")
            .add_query_param("status", "offered")
            .await
            .json::<Vec<ContractSnapshot>>();
        assert_eq!(listed.len(), 1);

        let accepted = server
            .post(&format!("/api/v1/contracts/{}/accept", offered.id))
            .await;
        accepted.assert_status_ok();
        assert_eq!(accepted.json::<ContractSnapshot>().status, ContractStatus::Accepted);

        let active = server
            .get("/api/v1/contracts")
            .add_query_param("status", "active")
            .await
            .json::<Vec<ContractSnapshot>>();
        assert_eq!(active[0].id, offered.id);

        let notes = server
            .get("/api/v1/notifications")
            .await
            .json::<Vec<Notification>>();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].blocking);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (server, state) = server();

        server
            .get(&format!("/api/v1/contracts/{}", uuid::Uuid::new_v4()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/v1/offers")
            .json(&json!({ "blueprint_id": "nope" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let offered = offer(&server).await;
        let accept = format!("/api/v1/contracts/{}/accept", offered.id);
        server.post(&accept).await.assert_status_ok();
        server.post(&accept).await.assert_status(StatusCode::CONFLICT);

        server
            .post("/api/v1/offers")
            .json(&json!({ "blueprint_id": "first_orbit" }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let finished = {
            let mut registry = state.registry.write().await;
            let mut sink = covenant_engine::RecordingSink::new();
            let id = registry.offer("first_orbit", 99.0, &mut sink).unwrap();
            registry.reject(id, 99.0, &mut sink).unwrap();
            id
        };
        server
            .post(&format!("/api/v1/contracts/{}/bind", finished))
            .json(&json!({ "vessel_id": "late" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_non_rejectable_reject_is_noop() {
        let (server, _) = server();
        let offered = offer(&server).await;
        server
            .post(&format!("/api/v1/contracts/{}/accept", offered.id))
            .await
            .assert_status_ok();

        let rejected = server
            .post(&format!("/api/v1/contracts/{}/reject", offered.id))
            .await;
        rejected.assert_status_ok();
        assert_eq!(rejected.json::<ContractSnapshot>().status, ContractStatus::Accepted);
    }

    #[tokio::test]
    async fn test_telemetry_is_queued() {
        let (server, state) = server();
        server
            .post("/api/v1/telemetry")
            .json(&json!({
                "vessel_id": "kx-1",
                "body_id": "kerbin",
                "apoapsis": 700000.0,
                "periapsis": 680000.0,
                "body_radius": 600000.0
            }))
            .await
            .assert_status(StatusCode::ACCEPTED);

        assert!(state.telemetry.read().await.contains_key("kx-1"));
    }

    #[tokio::test]
    async fn test_save_and_clock() {
        let (server, state) = server();
        offer(&server).await;
        state.clock.write().await.advance(25.0);

        let clock = server.get("/api/v1/clock").await.json::<serde_json::Value>();
        assert_eq!(clock["universal_time"], 25.0);

        let saved = server.post("/api/v1/save").await;
        saved.assert_status_ok();
        let body = saved.json::<serde_json::Value>();
        assert_eq!(body["contracts"], 1);
        assert_eq!(body["universal_time"], 25.0);
        assert!(state.saves.load().unwrap().is_some());
    }

    #[test]
    fn test_load_state_restores_save() {
        let dir = tempfile::tempdir().unwrap();
        let blueprints = dir.path().join("blueprints.json");
        std::fs::write(
            &blueprints,
            r#"[{ "id": "first_orbit", "requirements": [
                { "id": "orbit", "kind": { "type": "criterion", "criterion": { "type": "orbit", "target_body": "kerbin" } } }
            ] }]"#,
        )
        .unwrap();
        let config = NodeConfig {
            blueprint_path: Some(blueprints),
            save_path: Some(dir.path().join("career.json")),
            ..NodeConfig::default()
        };

        let state = load_state(&config).unwrap();
        let save = {
            let mut registry = state.registry.try_write().unwrap();
            let mut sink = covenant_engine::RecordingSink::new();
            registry.offer("first_orbit", 40.0, &mut sink).unwrap();
            registry.to_save(40.0)
        };
        state.saves.save(&save).unwrap();

        let reloaded = load_state(&config).unwrap();
        assert_eq!(reloaded.registry.try_read().unwrap().offered().len(), 1);
        assert_eq!(reloaded.clock.try_read().unwrap().universal_time, 40.0);
    }
}
