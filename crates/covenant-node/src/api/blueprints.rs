//! Blueprint listing.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

/// Summary of a registered blueprint.
#[derive(Debug, Serialize)]
pub struct BlueprintSummary {
    pub id: String,
    pub title: String,
    pub synopsis: String,
    pub requirements: usize,
    pub expiration: Option<f64>,
    pub deadline: Option<f64>,
    pub is_rejectable: bool,
    pub is_auto_accepted: bool,
}

/// List every registered blueprint, ordered by id.
pub async fn list_blueprints(State(state): State<AppState>) -> Json<Vec<BlueprintSummary>> {
    let registry = state.registry.read().await;
    let summaries = registry
        .store()
        .iter()
        .map(|blueprint| {
            let mut requirements = 0;
            blueprint.walk_requirements(&mut |_| requirements += 1);
            BlueprintSummary {
                id: blueprint.id.clone(),
                title: blueprint.title.clone(),
                synopsis: blueprint.synopsis.clone(),
                requirements,
                expiration: blueprint.expiration,
                deadline: blueprint.deadline,
                is_rejectable: blueprint.is_rejectable,
                is_auto_accepted: blueprint.is_auto_accepted,
            }
        })
        .collect();
    Json(summaries)
}
