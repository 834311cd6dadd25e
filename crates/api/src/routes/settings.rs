//! Settings Routes

use alerting::UserSettings;
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::info;

use crate::{ApiError, AppState};

/// Current settings
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<UserSettings> {
    Json(state.settings.borrow().clone())
}

/// Replace the settings. Omitted fields take their defaults.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<UserSettings>,
) -> Result<Json<UserSettings>, ApiError> {
    settings.validate()?;
    info!(
        "Settings updated: full {}%, empty {}%, notifications {}",
        settings.full_threshold, settings.empty_threshold, settings.notifications_enabled
    );
    state.settings.send_replace(settings.clone());
    Ok(Json(settings))
}
