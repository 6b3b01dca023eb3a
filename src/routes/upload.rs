use super::PageError;
use crate::{
    page::{Page, NO_UPLOAD_ERROR},
    server::SharedState,
    storage::StorageError,
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::instrument;

const UPLOAD_FIELD: &str = "image";

#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Response, PageError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;

        // Browsers send an empty part when the file input was left blank.
        if file_name.is_empty() && data.is_empty() {
            break;
        }

        return match state
            .upload_store
            .save(&file_name, content_type, &data)
            .await
        {
            Ok(record) => {
                state.metrics.record_upload();
                let page = Page {
                    upload: Some(record),
                    ..Page::default()
                };
                Ok(Html(page.render()).into_response())
            }
            Err(e @ StorageError::UnsupportedFileType(_)) => {
                tracing::warn!("Rejected upload `{}`: {}", file_name, e);
                let page = Page {
                    upload: state.upload_store.last_upload(),
                    ..Page::default()
                }
                .with_error(e.to_string());
                Ok((StatusCode::UNSUPPORTED_MEDIA_TYPE, Html(page.render())).into_response())
            }
            Err(e) => Err(PageError::from(e)),
        };
    }

    let page = Page {
        upload: state.upload_store.last_upload(),
        ..Page::default()
    }
    .with_error(NO_UPLOAD_ERROR);
    Ok((StatusCode::BAD_REQUEST, Html(page.render())).into_response())
}
