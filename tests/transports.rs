//! The real image transports and URL downloads against a local HTTP server.

#![cfg(feature = "server")]

mod common;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use common::png_bytes;
use edgequake_text2pptx::pipeline::image::{
    BackgroundRenderer, ImagePayload, ImageTransport, RawHttpTransport, StructuredTransport,
    TransportOutcome,
};
use edgequake_text2pptx::pipeline::persist::{ImageStore, PersistError};
use edgequake_text2pptx::ImageModelConfig;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const JPEG: [u8; 6] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

impl Seen {
    fn record(&self, headers: &HeaderMap, body: Value) {
        self.bodies.lock().unwrap().push(body);
        if let Some(v) = headers.get(header::AUTHORIZATION) {
            self.auth.lock().unwrap().push(v.to_str().unwrap().to_string());
        }
    }
}

/// Image API stand-in. Each path prefix behaves differently:
/// `/fail` answers 500, `/url` answers with a file URL, `/image` with an
/// inline `image` field.
async fn start_server() -> (SocketAddr, Seen) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Seen::default();

    let app = Router::new()
        .route(
            "/fail/images/generations",
            post(|State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                seen.record(&headers, body);
                (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded")
            }),
        )
        .route(
            "/url/images/generations",
            post(move |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                seen.record(&headers, body);
                Json(json!({"data": [{"url": format!("http://{addr}/files/bg.png")}]}))
            }),
        )
        .route(
            "/image/images/generations",
            post(|State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                seen.record(&headers, body);
                let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes());
                Json(json!({"data": [{"image": b64}]}))
            }),
        )
        .route(
            "/files/bg.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], png_bytes()).into_response() }),
        )
        .route(
            "/files/bg.jpg",
            get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], JPEG.to_vec()).into_response() }),
        )
        .with_state(seen.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}

fn image_config(addr: SocketAddr, prefix: &str) -> ImageModelConfig {
    ImageModelConfig {
        base_url: format!("http://{addr}/{prefix}"),
        api_key: Some("test-key".to_string()),
        ..ImageModelConfig::default()
    }
}

fn store(dir: &std::path::Path) -> ImageStore {
    ImageStore::new(dir.join("images"), Duration::from_secs(5))
}

#[tokio::test]
async fn server_error_is_a_miss_for_both_transports() {
    let (addr, seen) = start_server().await;
    let config = image_config(addr, "fail");

    let structured = StructuredTransport::new(config.clone());
    let raw = RawHttpTransport::new(config, Duration::from_secs(5));

    assert!(matches!(
        structured.generate("waves").await,
        TransportOutcome::Miss(_)
    ));
    match raw.generate("waves").await {
        TransportOutcome::Miss(reason) => assert!(reason.contains("500"), "{reason}"),
        other => panic!("expected a miss, got {other:?}"),
    }
    assert_eq!(seen.bodies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn structured_transport_returns_url_payload() {
    let (addr, seen) = start_server().await;
    let transport = StructuredTransport::new(image_config(addr, "url"));

    let outcome = transport.generate("soft gradient").await;
    assert_eq!(
        outcome,
        TransportOutcome::Image(ImagePayload::Url(format!("http://{addr}/files/bg.png")))
    );

    let body = seen.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["prompt"], "soft gradient");
    assert_eq!(body["n"], 1);
    assert_eq!(body["response_format"], "b64_json");
    assert_eq!(body["size"], ImageModelConfig::default().size);
    assert_eq!(seen.auth.lock().unwrap()[0], "Bearer test-key");
}

#[tokio::test]
async fn raw_transport_reads_image_field() {
    let (addr, _) = start_server().await;
    let raw = RawHttpTransport::new(image_config(addr, "image"), Duration::from_secs(5));

    match raw.generate("waves").await {
        TransportOutcome::Image(ImagePayload::Base64(data)) => {
            let bytes = base64::engine::general_purpose::STANDARD.decode(data).unwrap();
            assert_eq!(bytes, png_bytes());
        }
        other => panic!("expected base64 image, got {other:?}"),
    }

    // the typed client only knows b64_json and url
    let structured = StructuredTransport::new(image_config(addr, "image"));
    assert!(matches!(
        structured.generate("waves").await,
        TransportOutcome::Miss(_)
    ));
}

#[tokio::test]
async fn renderer_falls_back_to_raw_transport() {
    let (addr, seen) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let config = image_config(addr, "image");
    let transports: Vec<Arc<dyn ImageTransport>> = vec![
        Arc::new(StructuredTransport::new(config.clone())),
        Arc::new(RawHttpTransport::new(config, Duration::from_secs(5))),
    ];
    let renderer = BackgroundRenderer::new(transports, store(dir.path()));

    let path = renderer.render("waves", "t_slide_01").await.unwrap();
    assert_eq!(path, dir.path().join("images/t_slide_01.png"));
    assert_eq!(std::fs::read(&path).unwrap(), png_bytes());
    assert_eq!(seen.bodies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn url_payload_is_downloaded() {
    let (addr, _) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let transports: Vec<Arc<dyn ImageTransport>> =
        vec![Arc::new(StructuredTransport::new(image_config(addr, "url")))];
    let renderer = BackgroundRenderer::new(transports, store(dir.path()));

    let path = renderer.render("waves", "u_slide_02").await.unwrap();
    assert!(path.ends_with("images/u_slide_02.png"));
    assert_eq!(std::fs::read(&path).unwrap(), png_bytes());
}

#[tokio::test]
async fn download_extension_follows_content_type() {
    let (addr, _) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let jpg = store
        .download(&format!("http://{addr}/files/bg.jpg"), "d_slide_01")
        .await
        .unwrap();
    assert!(jpg.ends_with("images/d_slide_01.jpg"));
    assert_eq!(std::fs::read(&jpg).unwrap(), JPEG);

    let png = store
        .download(&format!("http://{addr}/files/bg.png"), "d_slide_02")
        .await
        .unwrap();
    assert!(png.ends_with("images/d_slide_02.png"));
}

#[tokio::test]
async fn missing_file_is_a_download_error() {
    let (addr, _) = start_server().await;
    let dir = tempfile::tempdir().unwrap();

    let err = store(dir.path())
        .download(&format!("http://{addr}/files/gone.png"), "x")
        .await
        .unwrap_err();
    match err {
        PersistError::Download { reason, .. } => assert!(reason.contains("404"), "{reason}"),
        other => panic!("expected a download error, got {other}"),
    }
    assert!(!dir.path().join("images/x.jpg").exists());
}
