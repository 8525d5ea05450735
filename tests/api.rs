//! End-to-end tests driving the router in-process.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use photomap_core::StoreConfig;

fn app(root: &Path) -> Router {
    let cfg = Arc::new(StoreConfig::new(root.to_path_buf()));
    cfg.ensure_layout().unwrap();
    photomap::router(cfg)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Multipart form body: `(field name, optional filename, content)` parts.
fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn upload_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let boundary = "photomap-test-boundary";
    Request::builder()
        .method("POST")
        .uri("/api/upload-images")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body(boundary, parts)))
        .unwrap()
}

#[tokio::test]
async fn health_check_reports_running() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());

    let response = app.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Photo Map Organizer API is running");
}

#[tokio::test]
async fn create_folder_then_list_is_empty() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/create-folder",
            serde_json::json!({"country": "France", "city": "Paris", "year": 2023}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(temp.path().join("2023/France/Paris").is_dir());

    let response = app
        .oneshot(get("/api/get-images/2023/France/Paris"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn create_folder_rejects_traversal_segments() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/create-folder",
            serde_json::json!({"country": "France", "city": "..", "year": 2023}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("city"));
}

#[tokio::test]
async fn create_folder_rejects_malformed_body() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/create-folder")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"country\": \"France\""))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn upload_list_and_serve_round_trip() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());
    let payload = b"\x89PNG\r\n\x1a\nfake png payload";

    let response = app
        .clone()
        .oneshot(upload_request(&[
            ("country", None, b"France"),
            ("city", None, b"Paris"),
            ("year", None, b"2023"),
            ("files", Some("holiday.png"), payload),
            ("files", Some("beach.png"), b"other bytes"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let uploaded = body["uploaded_files"].as_array().unwrap();
    assert_eq!(uploaded.len(), 2);
    assert_eq!(uploaded[0]["original_name"], "holiday.png");
    let saved_as = uploaded[0]["saved_as"].as_str().unwrap().to_string();
    assert!(saved_as.ends_with(".png"));
    assert_ne!(saved_as, uploaded[1]["saved_as"].as_str().unwrap());

    // Listing returns both files with the uploaded byte counts.
    let response = app
        .clone()
        .oneshot(get("/api/get-images/2023/France/Paris"))
        .await
        .unwrap();
    let images = body_json(response).await;
    let images = images.as_array().unwrap();
    assert_eq!(images.len(), 2);
    let entry = images
        .iter()
        .find(|img| img["name"] == saved_as.as_str())
        .unwrap();
    assert_eq!(entry["file_size"], payload.len());
    assert_eq!(entry["location"], "Paris");
    assert_eq!(entry["year"], 2023);

    // The listed URL serves back the identical bytes.
    let url = entry["url"].as_str().unwrap().to_string();
    let response = app.oneshot(get(&url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/png"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], payload);
}

#[tokio::test]
async fn upload_accepts_multi_megabyte_files() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());
    // Well past axum's 2 MB default body limit.
    let payload = vec![0xABu8; 3 * 1024 * 1024];

    let response = app
        .clone()
        .oneshot(upload_request(&[
            ("country", None, b"France"),
            ("city", None, b"Paris"),
            ("year", None, b"2023"),
            ("files", Some("big.jpg"), &payload),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let saved_as = body["uploaded_files"][0]["saved_as"].as_str().unwrap();
    let stored = temp.path().join("2023/France/Paris").join(saved_as);
    assert_eq!(fs::metadata(stored).unwrap().len(), payload.len() as u64);
}

#[tokio::test]
async fn upload_without_year_is_rejected() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());

    let response = app
        .oneshot(upload_request(&[
            ("country", None, b"France"),
            ("city", None, b"Paris"),
            ("files", Some("a.png"), b"bytes"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn move_image_reports_final_name_on_conflict() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());

    let source_dir = temp.path().join("2022/Italy/Rome");
    let dest_dir = temp.path().join("2023/France/Paris");
    fs::create_dir_all(&source_dir).unwrap();
    fs::create_dir_all(&dest_dir).unwrap();
    fs::write(source_dir.join("photo.jpg"), b"new").unwrap();
    fs::write(dest_dir.join("photo.jpg"), b"old").unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/move-image",
            serde_json::json!({
                "imageId": "photo.jpg",
                "country": "France",
                "city": "Paris",
                "year": 2023,
                "sourceFolder": source_dir.to_str().unwrap(),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("photo_1.jpg"));
    assert!(!source_dir.join("photo.jpg").exists());
    assert!(dest_dir.join("photo.jpg").is_file());
    assert!(dest_dir.join("photo_1.jpg").is_file());
}

#[tokio::test]
async fn move_missing_image_is_404() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());
    let source_dir = temp.path().join("2022/Italy/Rome");
    fs::create_dir_all(&source_dir).unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/move-image",
            serde_json::json!({
                "imageId": "absent.jpg",
                "country": "France",
                "city": "Paris",
                "year": 2023,
                "sourceFolder": source_dir.to_str().unwrap(),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("absent.jpg"));
}

#[tokio::test]
async fn sort_missing_folder_is_404() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/sort-folder",
            serde_json::json!({"country": "Spain", "city": "Madrid", "year": 2020}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sort_folder_prefixes_files() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());
    let dir = temp.path().join("2023/France/Paris");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("a.jpg"), b"a").unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/sort-folder",
            serde_json::json!({"country": "France", "city": "Paris", "year": 2023}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(dir.join("001_a.jpg").is_file());
}

#[tokio::test]
async fn pins_reflect_the_tree() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());
    let dir = temp.path().join("2023/France/Paris");
    fs::create_dir_all(&dir).unwrap();
    for i in 0..5 {
        fs::write(dir.join(format!("photo{i}.jpg")), b"x").unwrap();
    }

    let response = app.oneshot(get("/api/get-all-pins")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let pins = body_json(response).await;
    let pins = pins.as_array().unwrap();
    // The static/ subtree is present but non-numeric, so exactly one pin.
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0]["id"], "2023/France/Paris");
    assert_eq!(pins[0]["imageCount"], 5);
    assert_eq!(pins[0]["country"], "France");
    assert_eq!(pins[0]["city"], "Paris");
    assert_eq!(pins[0]["year"], 2023);
    assert_eq!(pins[0]["lat"], 0.0);
    assert_eq!(pins[0]["lng"], 0.0);
}

#[tokio::test]
async fn pins_on_empty_root_is_empty_array() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());

    let response = app.oneshot(get("/api/get-all-pins")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn serve_missing_image_is_404() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());

    let response = app
        .oneshot(get("/api/serve-image/2023/France/Paris/absent.jpg"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("absent.jpg"));
}

#[tokio::test]
async fn static_subtree_is_served() {
    let temp = TempDir::new().unwrap();
    let app = app(temp.path());
    fs::write(temp.path().join("static/logo.txt"), b"logo bytes").unwrap();

    let response = app.oneshot(get("/static/logo.txt")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"logo bytes");
}
