use crate::server::SharedState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use image::ImageFormat;

pub async fn uploaded_image(State(state): State<SharedState>) -> Response {
    let Some(data) = state.upload_store.read().await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let content_type = image::guess_format(&data)
        .map(|format| format.to_mime_type().to_string())
        .ok()
        .or_else(|| {
            state
                .upload_store
                .last_upload()
                .and_then(|record| record.content_type)
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        data,
    )
        .into_response()
}

pub async fn detected_image(State(state): State<SharedState>) -> Response {
    let Some(image) = state.displayed.lock().clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    (
        [(header::CONTENT_TYPE, ImageFormat::Png.to_mime_type())],
        image.png.clone(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{png_bytes, TestApp};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };

    #[tokio::test]
    async fn test_images_missing_before_upload() {
        let app = TestApp::new(true);

        for uri in ["/images/uploaded", "/images/detected"] {
            let request = Request::get(uri).body(Body::empty()).unwrap();
            let (status, _) = app.send(request).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_uploaded_image_is_served_back() {
        let app = TestApp::new(true);
        let data = png_bytes();
        app.upload("stop.png", &data).await;

        let request = Request::get("/images/uploaded").body(Body::empty()).unwrap();
        let response = tower::ServiceExt::oneshot(app.router.clone(), request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), data.as_slice());
    }
}
