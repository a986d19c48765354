//! End-to-end tests for the HTTP surface, run against the in-memory
//! backend and a manual clock.

use std::io::Cursor;
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use chrono::{Duration, TimeZone, Utc};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;

use design_fill_server::build_router;
use design_fill_server::clock::ManualClock;
use design_fill_server::config::Config;
use design_fill_server::state::AppState;
use design_fill_server::storage::{MemoryStorage, UploadStorage};

struct Harness {
    server: TestServer,
    storage: MemoryStorage,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ));
    let storage = MemoryStorage::new(clock.clone());
    let state = AppState::new(Config::default(), Arc::new(storage.clone()), clock.clone());
    let server = TestServer::new(build_router(state)).unwrap();
    Harness {
        server,
        storage,
        clock,
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn image_form(bytes: Vec<u8>, file_name: &str, mime: &str) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(bytes).file_name(file_name).mime_type(mime))
}

// ============================================================================
// Service info
// ============================================================================

#[tokio::test]
async fn test_banner_and_health() {
    let h = harness();

    let banner: Value = h.server.get("/").await.json();
    assert_eq!(banner["message"], "Design Fill Pro local backend running!");

    let health = h.server.get("/health").await;
    health.assert_status_ok();
    let body: Value = health.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "design-fill-server");
}

// ============================================================================
// Preview upload
// ============================================================================

#[tokio::test]
async fn test_preview_of_square_png() {
    let h = harness();
    let form = image_form(png_bytes(256, 256), "sample.png", "image/png")
        .add_text("complexity", "0.7")
        .add_text("depth", "5");

    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status_ok();
    let body: Value = resp.json();

    assert_eq!(body["file_url"], "/uploads/sample.png");
    assert_eq!(body["preview_url"], "/uploads/preview_sample.png");
    assert_eq!(body["original_width"], 256);
    assert_eq!(body["original_height"], 256);
    assert!(body["preview_width"].as_u64().unwrap() <= 614);
    assert!(body["preview_height"].as_u64().unwrap() <= 614);
    assert_eq!(body["tokens_charged"], 0);
    assert_eq!(body["complexity"], 0.7);
    assert_eq!(body["depth"], 5.0);
    assert!(body["file_size_bytes"].as_u64().unwrap() > 0);

    assert!(h.storage.contains("sample.png"));
    assert!(h.storage.contains("preview_sample.png"));
}

#[tokio::test]
async fn test_defaults_apply_when_fields_missing() {
    let h = harness();
    let form = image_form(png_bytes(8, 8), "tiny.png", "image/png");

    let body: Value = h.server.post("/preview-only").multipart(form).await.json();
    assert_eq!(body["complexity"], 0.5);
    assert_eq!(body["depth"], 5.0);
    assert_eq!(body["preview_width"], 8);
}

#[tokio::test]
async fn test_undecodable_image_is_stored_without_preview() {
    let h = harness();
    let form = image_form(b"definitely not a png".to_vec(), "broken.png", "image/png");

    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status_ok();
    let body: Value = resp.json();

    assert_eq!(body["file_url"], "/uploads/broken.png");
    assert!(body["preview_url"].is_null());
    assert!(body["preview_width"].is_null());
    assert!(body["original_width"].is_null());
    assert_eq!(body["file_size_bytes"], 20);
    assert_eq!(h.storage.file_names(), vec!["broken.png".to_string()]);
}

#[tokio::test]
async fn test_rejects_non_image_content_type() {
    let h = harness();
    let form = image_form(b"hello".to_vec(), "notes.txt", "text/plain");

    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = resp.json();
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert!(h.storage.file_names().is_empty());
}

#[tokio::test]
async fn test_rejects_missing_file() {
    let h = harness();
    let form = MultipartForm::new().add_text("complexity", "0.5");

    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn test_rejects_out_of_range_numbers() {
    let h = harness();

    let form = image_form(png_bytes(4, 4), "a.png", "image/png").add_text("complexity", "1.5");
    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"], "complexity must be between 0.0 and 1.0");

    let form = image_form(png_bytes(4, 4), "a.png", "image/png").add_text("depth", "0");
    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"], "depth must be > 0 and <= 1000");

    let form = image_form(png_bytes(4, 4), "a.png", "image/png").add_text("depth", "deep");
    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    // Nothing from the rejected uploads is left behind
    assert!(h.storage.file_names().is_empty());
}

#[tokio::test]
async fn test_oversized_upload_leaves_nothing_behind() {
    let h = harness();
    let max = Config::default().uploads.max_bytes as usize;
    let form = image_form(vec![0u8; max + 1], "huge.png", "image/png");

    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = resp.json();
    assert_eq!(body["error"], "File too large. Max 20 MB.");
    assert!(h.storage.file_names().is_empty());
}

/// Larger than the route body limit (cap plus multipart overhead)
fn past_body_limit() -> Vec<u8> {
    vec![0u8; Config::default().uploads.max_bytes as usize + 2 * 1024 * 1024]
}

#[tokio::test]
async fn test_huge_non_image_still_reports_media_type() {
    let h = harness();
    let form = image_form(past_body_limit(), "notes.txt", "text/plain").add_text("depth", "5");

    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(h.storage.file_names().is_empty());
}

#[tokio::test]
async fn test_huge_unnamed_file_still_reports_no_file() {
    let h = harness();
    let form = MultipartForm::new()
        .add_part("file", Part::bytes(past_body_limit()).mime_type("image/png"))
        .add_text("complexity", "0.5");

    let resp = h.server.post("/preview-only").multipart(form).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"], "No file uploaded");
    assert!(h.storage.file_names().is_empty());
}

#[tokio::test]
async fn test_path_components_are_stripped_from_file_name() {
    let h = harness();
    let form = image_form(png_bytes(4, 4), "../../etc/evil.png", "image/png");

    let body: Value = h.server.post("/preview-only").multipart(form).await.json();
    assert_eq!(body["file_url"], "/uploads/evil.png");
    assert!(h.storage.contains("evil.png"));
}

// ============================================================================
// Stored files
// ============================================================================

#[tokio::test]
async fn test_uploaded_file_is_served() {
    let h = harness();
    let png = png_bytes(16, 16);
    let form = image_form(png.clone(), "served.png", "image/png");
    h.server.post("/preview-only").multipart(form).await.assert_status_ok();

    let resp = h.server.get("/uploads/served.png").await;
    resp.assert_status_ok();
    assert_eq!(resp.header("content-type"), "image/png");
    assert_eq!(resp.as_bytes().to_vec(), png);

    h.server
        .get("/uploads/missing.png")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_recent_lists_newest_first() {
    let h = harness();
    for name in ["a.png", "b.png", "c.png", "d.png", "e.png"] {
        h.storage.write(name, b"data").await.unwrap();
        h.clock.advance(Duration::minutes(1));
    }

    let resp = h.server.get("/admin/uploads/recent").add_query_param("limit", 2).await;
    resp.assert_status_ok();
    let body: Value = resp.json();

    assert_eq!(body["count"], 2);
    assert_eq!(body["items"][0]["name"], "e.png");
    assert_eq!(body["items"][1]["name"], "d.png");
    assert_eq!(body["items"][0]["url"], "/uploads/e.png");
    assert_eq!(body["items"][0]["size_bytes"], 4);
    assert_eq!(body["items"][0]["modified"], "2024-05-01T12:04:00.000000Z");
}

#[tokio::test]
async fn test_recent_rejects_bad_limit() {
    let h = harness();
    for limit in ["0", "501", "many"] {
        h.server
            .get("/admin/uploads/recent")
            .add_query_param("limit", limit)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_purge_deletes_old_files_once() {
    let h = harness();
    h.storage.write("old-1.png", b"12345").await.unwrap();
    h.storage.write("old-2.png", b"123").await.unwrap();
    h.clock.advance(Duration::hours(1));

    let resp = h
        .server
        .post("/admin/uploads/purge")
        .add_query_param("hours", "0.0001")
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["hours"], 0.0001);
    assert_eq!(body["deleted"], 2);
    assert_eq!(body["bytes_freed"], 8);
    assert!(h.storage.file_names().is_empty());

    let body: Value = h
        .server
        .post("/admin/uploads/purge")
        .add_query_param("hours", "0.0001")
        .await
        .json();
    assert_eq!(body["deleted"], 0);
    assert_eq!(body["bytes_freed"], 0);
}

#[tokio::test]
async fn test_purge_keeps_recent_files_and_validates_hours() {
    let h = harness();
    h.storage.write("fresh.png", b"data").await.unwrap();
    h.clock.advance(Duration::hours(2));

    let body: Value = h.server.post("/admin/uploads/purge").await.json();
    assert_eq!(body["hours"], 24.0);
    assert_eq!(body["deleted"], 0);
    assert!(h.storage.contains("fresh.png"));

    for hours in ["0", "721", "later"] {
        h.server
            .post("/admin/uploads/purge")
            .add_query_param("hours", hours)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
