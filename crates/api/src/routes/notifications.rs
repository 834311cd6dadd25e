//! Notification Routes

use alerting::Notification;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{ApiError, AppState};

/// Response for notifications endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    /// Most recent first
    pub data: Vec<Notification>,
    pub count: usize,
    pub unread_count: usize,
}

/// List notifications
pub async fn list(State(state): State<Arc<AppState>>) -> Json<NotificationResponse> {
    let data = state.notifications.list();
    let unread_count = data.iter().filter(|n| !n.read).count();

    Json(NotificationResponse {
        count: data.len(),
        unread_count,
        data,
    })
}

/// Mark one notification read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.notifications.mark_read(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotificationNotFound(id))
    }
}

/// Dismiss one notification
pub async fn dismiss(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.notifications.dismiss(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotificationNotFound(id))
    }
}

/// Dismiss everything
pub async fn clear_all(State(state): State<Arc<AppState>>) -> StatusCode {
    state.notifications.clear_all();
    StatusCode::NO_CONTENT
}
