use super::PageError;
use crate::{
    page::{DetectedView, Page, LOAD_FAILED_ERROR, NO_UPLOAD_ERROR},
    server::SharedState,
    telemetry::DetectionOutcome,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::instrument;

#[instrument(skip(state))]
pub async fn detect_sign(State(state): State<SharedState>) -> Result<Response, PageError> {
    let Some(upload) = state.upload_store.last_upload() else {
        state.metrics.record_detection(DetectionOutcome::NoUpload);
        let page = Page::default().with_error(NO_UPLOAD_ERROR);
        return Ok((StatusCode::BAD_REQUEST, Html(page.render())).into_response());
    };

    let run = state
        .detector
        .detect(state.upload_store.upload_path())
        .await?;
    state
        .metrics
        .record_detection_duration(run.elapsed.as_millis() as u64);

    let mut page = Page {
        upload: Some(upload),
        show_original: true,
        ..Page::default()
    };

    // The tool rewrites the same file on every run, so never trust a
    // previous decode of it.
    let loader = state.image_loader.clone();
    let result_path = run.result_path.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        loader.invalidate(&result_path);
        loader.load(&result_path)
    })
    .await?;

    match loaded {
        Some(image) => {
            state.metrics.record_detection(DetectionOutcome::Displayed);
            page.detected = Some(DetectedView {
                width: image.width,
                height: image.height,
                version: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis(),
            });
            *state.displayed.lock() = Some(image);
            Ok(Html(page.render()).into_response())
        }
        None => {
            state.metrics.record_detection(DetectionOutcome::LoadFailed);
            tracing::warn!(
                "No readable detection result at {} (exit code {:?})",
                run.result_path.display(),
                run.exit_code
            );
            let page = page.with_error(LOAD_FAILED_ERROR);
            Ok((StatusCode::BAD_GATEWAY, Html(page.render())).into_response())
        }
    }
}
