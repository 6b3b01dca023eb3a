mod detect;
mod health;
mod images;
mod index;
mod metrics;
mod upload;

use crate::{detector::DetectorError, server::SharedState, storage::StorageError};
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use thiserror::Error;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route("/upload", post(upload::upload_image))
        .route("/detect", post(detect::detect_sign))
        .route("/images/uploaded", get(images::uploaded_image))
        .route("/images/detected", get(images::detected_image))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Upload could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Upload could not be stored: {0}")]
    Storage(#[from] StorageError),
    #[error("Detection could not be started: {0}")]
    Detector(#[from] DetectorError),
    #[error("Metrics encoding failed: {0}")]
    Metrics(String),
    #[error("Loading the detection result panicked: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = match &self {
            PageError::Multipart(e) => e.status(),
            PageError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PageError::Detector(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PageError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PageError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!("{}", self);
        (status, format!("Something went wrong: {}", self)).into_response()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{
        detector::{DetectionRun, Detector, DetectorError},
        image_loader::ImageLoader,
        server::{build_router, SharedState},
        storage::UploadStore,
        telemetry::Metrics,
        config::StorageConfig,
    };
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use image::{ImageBuffer, ImageFormat, Rgb};
    use parking_lot::Mutex;
    use std::{
        path::{Path, PathBuf},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    pub const BOUNDARY: &str = "X-TRAFFIC-SIGNS-BOUNDARY";

    /// Stands in for the detection script: optionally drops an image at the
    /// expected result path, 20px wider on every call, and counts invocations.
    pub struct MockDetector {
        pub calls: AtomicUsize,
        pub sources: Mutex<Vec<PathBuf>>,
        pub result_path: PathBuf,
        pub produce_output: bool,
    }

    #[async_trait]
    impl Detector for MockDetector {
        async fn detect(&self, source: &Path) -> Result<DetectionRun, DetectorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as u32 + 1;
            self.sources.lock().push(source.to_path_buf());

            if self.produce_output {
                std::fs::create_dir_all(self.result_path.parent().unwrap()).unwrap();
                ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(20 * call, 10, Rgb([0, 255, 0]))
                    .save_with_format(&self.result_path, ImageFormat::Png)
                    .unwrap();
            }

            Ok(DetectionRun {
                exit_code: Some(if self.produce_output { 0 } else { 1 }),
                elapsed: Duration::from_millis(5),
                result_path: self.result_path.clone(),
            })
        }
    }

    pub struct TestApp {
        pub router: Router,
        pub detector: Arc<MockDetector>,
        pub store: Arc<UploadStore>,
        _tmp: TempDir,
    }

    impl TestApp {
        pub fn new(produce_output: bool) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let store = Arc::new(UploadStore::new(&StorageConfig {
                upload_dir: tmp.path().join("uploaded_images"),
                upload_filename: "image_to_predict.png".to_string(),
            }));
            let detector = Arc::new(MockDetector {
                calls: AtomicUsize::new(0),
                sources: Mutex::new(Vec::new()),
                result_path: tmp.path().join("runs/detect/exp/image_to_predict.png"),
                produce_output,
            });

            let state = SharedState {
                upload_store: store.clone(),
                detector: detector.clone(),
                image_loader: Arc::new(ImageLoader::new()),
                displayed: Arc::new(Mutex::new(None)),
                metrics: Arc::new(Metrics::new().unwrap()),
            };

            Self {
                router: build_router(state, 1024 * 1024),
                detector,
                store,
                _tmp: tmp,
            }
        }

        pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, body.to_vec())
        }

        pub async fn upload(&self, file_name: &str, data: &[u8]) -> (StatusCode, String) {
            let (status, body) = self.send(upload_request(file_name, data)).await;
            (status, String::from_utf8(body).unwrap())
        }

        pub async fn detect(&self) -> (StatusCode, String) {
            let request = Request::post("/detect").body(Body::empty()).unwrap();
            let (status, body) = self.send(request).await;
            (status, String::from_utf8(body).unwrap())
        }
    }

    pub fn upload_request(file_name: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    pub fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(12, 12, Rgb([255, 0, 0]));
        let mut data = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        data
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new(true);
        let request = Request::get("/health").body(Body::empty()).unwrap();

        let (status, body) = app.send(request).await;

        assert_eq!(status, StatusCode::OK);
        let body = String::from_utf8(body).unwrap();
        assert!(body.contains(r#""status":"Available""#));
    }
}
