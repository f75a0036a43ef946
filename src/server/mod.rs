mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::search_handler, api::index_handler, api::status_handler, api::metrics_handler),
    components(schemas(
        types::SearchForm,
        types::SearchResponse,
        types::SearchMatch,
        types::IndexForm,
        types::IndexResponse,
        types::StatusResponse,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(api::search_handler))
        .route("/index", post(api::index_handler))
        .route("/status", get(api::status_handler))
        .route("/metrics", get(api::metrics_handler))
        .nest_service("/images", ServeDir::new(&state.images_dir))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use opencv::core::{CV_8UC3, Mat, Scalar, Vector};
    use opencv::imgcodecs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::types::*;
    use super::*;
    use crate::config::ConfDir;
    use crate::detector::{FaceDetector, Region, WholeImageDetector};

    const BOUNDARY: &str = "facesearch-test-boundary";

    struct NoFaces;

    impl FaceDetector for NoFaces {
        fn detect(&self, _image: &Mat) -> crate::Result<Vec<Region>> {
            Ok(vec![])
        }
    }

    fn test_state(dir: &TempDir, detector: Box<dyn FaceDetector>) -> Arc<AppState> {
        let conf_dir: ConfDir = dir.path().to_str().unwrap().parse().unwrap();
        AppState::new(detector, &conf_dir)
    }

    fn png() -> Vec<u8> {
        let img =
            Mat::new_rows_cols_with_default(8, 8, CV_8UC3, Scalar::new(0., 0., 255., 0.)).unwrap();
        let mut buf = Vector::<u8>::new();
        imgcodecs::imencode(".png", &img, &mut buf, &Vector::new()).unwrap();
        buf.to_vec()
    }

    /// 构造 multipart 请求，每个部分为 (字段名, 文件名, 内容)
    fn multipart(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, file_name, contents) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match file_name {
                Some(file_name) => {
                    format!("form-data; name=\"{name}\"; filename=\"{file_name}\"")
                }
                None => format!("form-data; name=\"{name}\""),
            };
            let line = format!("Content-Disposition: {disposition}\r\n\r\n");
            body.extend_from_slice(line.as_bytes());
            body.extend_from_slice(contents);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_index_then_search() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, Box::new(WholeImageDetector));
        let image = png();

        let resp = create_app(state.clone())
            .oneshot(multipart("/index", &[("files", Some("my face.png"), image.as_slice())]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let index: IndexResponse = read_json(resp).await;
        assert_eq!(index.saved_files, 1);
        assert_eq!(index.faces_indexed, 1);

        let resp = create_app(state)
            .oneshot(multipart("/search", &[("file", Some("probe.png"), image.as_slice())]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let search: SearchResponse = read_json(resp).await;
        assert_eq!(search.results.len(), 1);
        assert_eq!(search.results[0].source_id, "my face.png");
        assert_eq!(search.results[0].url, "/images/my%20face.png");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_index_missing_file_name() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, Box::new(WholeImageDetector));
        let image = png();

        let parts = [("files", Some("ok.png"), image.as_slice()), ("files", None, image.as_slice())];
        let resp = create_app(state.clone()).oneshot(multipart("/index", &parts)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        // 合法的文件也不会被写入
        assert!(!state.images_dir.join("ok.png").exists());
        assert!(!state.store_path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_without_face() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, Box::new(NoFaces));
        let image = png();

        let resp = create_app(state)
            .oneshot(multipart("/search", &[("file", Some("probe.png"), image.as_slice())]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_invalid_image() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, Box::new(WholeImageDetector));

        let resp = create_app(state)
            .oneshot(multipart("/search", &[("file", Some("probe.png"), b"garbage".as_slice())]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = read_json(resp).await;
        assert!(body["detail"].is_string());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upload_too_large() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, Box::new(WholeImageDetector));
        let image = vec![0u8; 1024 * 1024 * 11];

        let resp = create_app(state)
            .oneshot(multipart("/search", &[("file", Some("big.png"), image.as_slice())]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
