//! Delivered notifications.

use axum::{extract::State, Json};
use covenant_engine::Notification;

use crate::state::AppState;

/// Every notification delivered so far.
pub async fn list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    let inbox = state.inbox.read().await;
    Json(inbox.notifications().to_vec())
}

/// Remove and return every delivered notification.
pub async fn drain_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    let mut inbox = state.inbox.write().await;
    Json(inbox.drain())
}
