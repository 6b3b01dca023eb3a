use super::PageError;
use crate::server::SharedState;
use axum::{extract::State, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};

pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, PageError> {
    let metric_families = state.metrics.registry.gather();

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| PageError::Metrics(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| PageError::Metrics(e.to_string()))
}
