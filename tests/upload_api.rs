mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{empty_request, json_request, multipart_request, TestApp};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-bytes";

async fn upload_one(app: &TestApp, file_name: &str, title: &str, tags: &str) -> serde_json::Value {
    let (status, _, body) = app
        .send(multipart_request(
            "/api/upload/upload",
            &[(file_name, PNG)],
            &[("title", title), ("tags", tags)],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn temp_files(app: &TestApp) -> usize {
    std::fs::read_dir(app.temp_dir())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn partial_batch_failure_keeps_successes() {
    let app = TestApp::new().await;
    let (status, _, body) = app
        .send(multipart_request(
            "/api/upload/upload",
            &[("a.png", PNG), ("fail.png", PNG), ("c.png", PNG)],
            &[],
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
    let failed = body["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].as_str().unwrap().contains("fail.png"));

    assert_eq!(app.count("media").await, 2);
    assert_eq!(temp_files(&app), 0);
}

#[tokio::test]
async fn full_success_omits_failed() {
    let app = TestApp::new().await;
    let body = upload_one(&app, "a.png", "Sunset", "beach, sky").await;

    assert!(body.get("failed").is_none());
    let file = &body["files"][0];
    assert_eq!(file["public_id"], "media-gallery/asset-0");
    assert_eq!(file["bytes"], PNG.len());
    assert_eq!(temp_files(&app), 0);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let app = TestApp::new().await;
    let (status, _, body) = app
        .send(multipart_request("/api/upload/upload", &[], &[("title", "x")]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No files were uploaded");
    assert_eq!(app.count("media").await, 0);
}

#[tokio::test]
async fn oversized_file_is_reported_as_failed() {
    let app = TestApp::with_config(|config| config.upload.max_file_bytes = 8).await;
    let (status, _, body) = app
        .send(multipart_request(
            "/api/upload/upload",
            &[("big.png", PNG), ("tiny.png", b"1234")],
            &[],
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"].as_array().unwrap().len(), 1);
    assert!(body["failed"][0].as_str().unwrap().starts_with("big.png"));
    assert_eq!(temp_files(&app), 0);
}

#[tokio::test]
async fn failed_persistence_takes_hosted_copies_down() {
    let app = TestApp::new().await;
    sqlx::query("DROP TABLE media")
        .execute(app.state.db.pool())
        .await
        .unwrap();

    let (status, _, body) = app
        .send(multipart_request(
            "/api/upload/upload",
            &[("a.png", PNG), ("b.png", PNG)],
            &[],
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["files"].as_array().unwrap().is_empty());
    assert_eq!(body["failed"].as_array().unwrap().len(), 2);
    let mut destroyed = app.host.destroyed();
    destroyed.sort();
    assert_eq!(destroyed, vec!["media-gallery/asset-0", "media-gallery/asset-1"]);
}

#[tokio::test]
async fn listing_is_newest_first_and_bounded() {
    let app = TestApp::new().await;
    for i in 0..7 {
        upload_one(&app, &format!("p{}.png", i), &format!("photo {}", i), "").await;
    }

    let (status, _, body) = app
        .send(empty_request(Method::GET, "/api/upload/all?limit=5"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["photo 6", "photo 5", "photo 4", "photo 3", "photo 2"]);
    assert_eq!(
        body["pagination"],
        json!({ "page": 1, "limit": 5, "total": 7, "totalPages": 2 })
    );

    let (_, _, body) = app
        .send(empty_request(Method::GET, "/api/upload/all?limit=5&page=2"))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][1]["title"], "photo 0");

    let (_, _, body) = app
        .send(empty_request(Method::GET, "/api/upload/all?limit=abc"))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["pagination"]["limit"], 5);
}

#[tokio::test]
async fn listing_filters_by_search_and_tags() {
    let app = TestApp::new().await;
    upload_one(&app, "a.png", "Beach sunset", "beach,sky").await;
    upload_one(&app, "b.png", "Mountain", "snow").await;
    upload_one(&app, "c.png", "100%_real", "").await;

    let (_, _, body) = app
        .send(empty_request(Method::GET, "/api/upload/all?search=SUNSET"))
        .await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["title"], "Beach sunset");
    assert_eq!(body["data"][0]["tags"], json!(["beach", "sky"]));

    let (_, _, body) = app
        .send(empty_request(Method::GET, "/api/upload/all?tags=snow,sky"))
        .await;
    assert_eq!(body["pagination"]["total"], 2);

    let (_, _, body) = app
        .send(empty_request(Method::GET, "/api/upload/all?search=%25_"))
        .await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["title"], "100%_real");
}

#[tokio::test]
async fn untitled_items_and_dates() {
    let app = TestApp::new().await;
    app.send(multipart_request("/api/upload/upload", &[("a.png", PNG)], &[]))
        .await;

    let (_, _, body) = app.send(empty_request(Method::GET, "/api/upload/all")).await;
    let item = &body["data"][0];
    assert_eq!(item["title"], "Untitled");
    assert_eq!(item["tags"], json!([]));
    assert_eq!(item["date"].as_str().unwrap().len(), 10);
}

#[tokio::test]
async fn detail_and_metadata_update() {
    let app = TestApp::new().await;
    upload_one(&app, "a.png", "Old", "one").await;
    let (_, _, list) = app.send(empty_request(Method::GET, "/api/upload/all")).await;
    let id = list["data"][0]["id"].as_str().unwrap().to_string();

    let (status, _, body) = app
        .send(empty_request(Method::GET, &format!("/api/upload/{}", id)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["public_id"], "media-gallery/asset-0");
    assert_eq!(body["data"]["title"], "Old");

    let (status, _, body) = app
        .send(json_request(
            Method::PATCH,
            &format!("/api/upload/{}", id),
            json!({ "title": "New", "tags": ["two", " two ", "three"] }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "New");
    assert_eq!(body["data"]["tags"], json!(["two", "three"]));

    let (status, _, body) = app
        .send(empty_request(Method::GET, "/api/upload/does-not-exist"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Media not found");

    let (status, _, _) = app
        .send(json_request(
            Method::PATCH,
            "/api/upload/does-not-exist",
            json!({ "title": "x" }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_host_object_then_record() {
    let app = TestApp::new().await;
    upload_one(&app, "a.png", "Doomed", "").await;

    let (status, _, body) = app
        .send(empty_request(
            Method::DELETE,
            "/api/upload/delete/media-gallery/asset-0",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "File deleted successfully" }));
    assert_eq!(app.host.destroyed(), vec!["media-gallery/asset-0"]);
    assert_eq!(app.count("media").await, 0);
}

#[tokio::test]
async fn deleting_unknown_public_id_succeeds() {
    let app = TestApp::new().await;
    let (status, _, body) = app
        .send(empty_request(Method::DELETE, "/api/upload/delete/nothing-here"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.host.destroyed(), vec!["nothing-here"]);
}

#[tokio::test]
async fn dashboard_counts_and_contact() {
    let app = TestApp::new().await;
    app.signed_in("ana", "ana@x.com").await;
    upload_one(&app, "a.png", "One", "").await;
    upload_one(&app, "b.png", "Two", "").await;

    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/api/contact",
            json!({ "name": "Ana", "email": "ana@x.com", "message": "Hello" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Message sent successfully");

    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/api/contact",
            json!({ "name": "Ana", "email": "nope", "message": "Hello" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid email format!");

    let (status, _, body) = app
        .send(empty_request(Method::GET, "/api/dashboard/stats"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "totalMedia": 2, "totalUsers": 1, "unreadMessages": 1 })
    );
}
