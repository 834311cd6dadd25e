//! Bin Routes

use alerting::DistanceUnit;
use axum::{
    extract::{Path, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::stream::{self, Stream};
use insights::{analyze_bin, bullet_lines};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use telemetry::{export_file_name, export_history_csv, Bin, Snapshot, StoreError};
use tracing::{debug, info};

use crate::{ApiError, AppState};

/// A bin with its derived display fields
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinView {
    #[serde(flatten)]
    pub bin: Bin,
    pub fill_percentage: u8,
    /// Current distance in the user's unit
    pub display_distance: f64,
    pub distance_unit: &'static str,
}

impl BinView {
    fn new(bin: &Bin, unit: DistanceUnit) -> Self {
        Self {
            bin: bin.clone(),
            fill_percentage: bin.fill_percentage(),
            display_distance: unit.display_value(bin.current_distance_cm),
            distance_unit: unit.suffix(),
        }
    }
}

/// Response for the bin list and stream
#[derive(Debug, Serialize)]
pub struct SnapshotView {
    pub version: u64,
    pub bins: Vec<BinView>,
}

impl SnapshotView {
    fn new(snapshot: &Snapshot, unit: DistanceUnit) -> Self {
        Self {
            version: snapshot.version(),
            bins: snapshot.bins().iter().map(|bin| BinView::new(bin, unit)).collect(),
        }
    }
}

/// Body of a location update
#[derive(Debug, Deserialize)]
pub struct LocationUpdate {
    pub location: String,
}

/// Response for analysis endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub bin_id: String,
    pub summary: String,
    pub bullets: Vec<String>,
}

fn find<'a>(snapshot: &'a Snapshot, id: &str) -> Result<&'a Bin, ApiError> {
    snapshot
        .get(id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()).into())
}

fn unit(state: &AppState) -> DistanceUnit {
    state.settings.borrow().unit
}

/// Get every bin
pub async fn list_bins(State(state): State<Arc<AppState>>) -> Json<SnapshotView> {
    let snapshot = state.hub.store().snapshot();
    Json(SnapshotView::new(&snapshot, unit(&state)))
}

/// Get one bin with its history
pub async fn get_bin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BinView>, ApiError> {
    let snapshot = state.hub.store().snapshot();
    let bin = find(&snapshot, &id)?;
    Ok(Json(BinView::new(bin, unit(&state))))
}

/// Stream snapshots as server-sent events, starting with the current one
pub async fn stream_bins(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.hub.subscribe();
    info!("Stream client attached as subscriber {}", subscription.id());

    let events = stream::unfold((subscription, state), |(mut subscription, state)| async move {
        let snapshot = subscription.recv().await?;
        debug!("Streaming snapshot v{} to {}", snapshot.version(), subscription.id());
        let event = Event::default()
            .event("snapshot")
            .id(snapshot.version().to_string())
            .json_data(SnapshotView::new(&snapshot, unit(&state)));
        Some((event, (subscription, state)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Rename a bin's location
pub async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<LocationUpdate>,
) -> Result<Json<BinView>, ApiError> {
    let snapshot = state.hub.update_bin_location(&id, &update.location).await?;
    let bin = find(&snapshot, &id)?;
    Ok(Json(BinView::new(bin, unit(&state))))
}

/// Download a bin's history as CSV
pub async fn export_bin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.hub.store().snapshot();
    let bin = find(&snapshot, &id)?;
    let body = export_history_csv(bin)?;
    let disposition = format!("attachment; filename=\"{}\"", export_file_name(bin));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// Ask the summarizer about a bin's usage
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let snapshot = state.hub.store().snapshot();
    let bin = find(&snapshot, &id)?;
    let summary = analyze_bin(&state.summarizer, bin).await;

    Ok(Json(AnalysisResponse {
        bin_id: id,
        bullets: bullet_lines(&summary),
        summary,
    }))
}
