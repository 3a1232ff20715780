//! End-to-end tests over real sockets.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::{error_log, out_log, read_lines, wait_for_lines, TestServer};

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[tokio::test]
async fn test_lines_are_routed_by_status() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let ok = client
        .get(server.url("/health"))
        .header("user-agent", CHROME_UA)
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    ok.bytes().await.unwrap();

    let missing = client.get(server.url("/missing")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    missing.bytes().await.unwrap();

    let root = server.stop().await;

    let out = read_lines(&out_log(root.path()));
    let err = read_lines(&error_log(root.path()));
    assert_eq!(out.len(), 1, "{:?}", out);
    assert_eq!(err.len(), 1, "{:?}", err);
    assert!(out[0].contains("  GET  /health  200 ("));
    assert!(out[0].contains("| IP:127.0.0.1 | Client:Windows/Chrome v120"), "{}", out[0]);
    assert!(err[0].contains("  GET  /missing  404 ("));
}

#[tokio::test]
async fn test_production_format() {
    let server = TestServer::start_with(|config| {
        config.environment = starter_backend::config::Environment::Production;
    })
    .await;

    let response = reqwest::get(server.url("/health")).await.unwrap();
    response.bytes().await.unwrap();

    let lines = wait_for_lines(&out_log(server.root()), 1).await;
    // `YYYY-MM-DD HH:MM:SS GET /health <green>200<reset> Nms 0.01KB COMPLETE - Unknown`
    let rest = &lines[0][20..];
    assert!(rest.starts_with("GET /health \u{1b}[32m200\u{1b}[0m "), "{}", rest);
    assert!(rest.ends_with("ms 0.01KB COMPLETE - Unknown"), "{}", rest);

    server.stop().await;
}

#[tokio::test]
async fn test_forwarded_for_is_used_behind_proxy() {
    let server = TestServer::start_with(|config| config.server.trust_proxy = Some(true)).await;

    let response = reqwest::Client::new()
        .get(server.url("/health"))
        .header("x-forwarded-for", "198.51.100.1, 203.0.113.50")
        .send()
        .await
        .unwrap();
    response.bytes().await.unwrap();

    let lines = wait_for_lines(&out_log(server.root()), 1).await;
    assert!(lines[0].contains("IP:203.0.113.50"), "{}", lines[0]);
    server.stop().await;
}

#[tokio::test]
async fn test_streamed_download_reports_file_size() {
    let server = TestServer::start().await;
    server.write_public("a.js", &vec![b'x'; 5 * 1024]);

    let response = reqwest::get(server.url("/download/a.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("content-length").is_none());
    assert_eq!(response.bytes().await.unwrap().len(), 5 * 1024);

    let lines = wait_for_lines(&out_log(server.root()), 1).await;
    assert!(lines[0].contains("Size:5.00KB COMPLETE"), "{}", lines[0]);
    server.stop().await;
}

#[tokio::test]
async fn test_client_abort_is_logged_partial() {
    let server = TestServer::start().await;
    server.write_public("huge.bin", &vec![0u8; 64 * 1024 * 1024]);

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /download/huge.bin HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut buf = vec![0u8; 16 * 1024];
    let read = stream.read(&mut buf).await.unwrap();
    assert!(read > 0);
    drop(stream);

    let lines = wait_for_lines(&out_log(server.root()), 1).await;
    assert!(lines[0].contains("/download/huge.bin  200"), "{}", lines[0]);
    assert!(lines[0].contains("PARTIAL"), "{}", lines[0]);
    server.stop().await;
}

#[tokio::test]
async fn test_head_request_is_complete() {
    let server = TestServer::start().await;
    server.write_public("page.html", b"<p>hello</p>");

    let response = reqwest::Client::new()
        .head(server.url("/page.html"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let lines = wait_for_lines(&out_log(server.root()), 1).await;
    assert!(lines[0].contains("  HEAD  /page.html  200"), "{}", lines[0]);
    assert!(lines[0].contains("COMPLETE"), "{}", lines[0]);
    server.stop().await;
}

#[tokio::test]
async fn test_strict_limit_rejections_go_to_error_log() {
    let server = TestServer::start_with(|config| {
        config.rate_limit.strict.max_requests = 2;
    })
    .await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = client
            .post(server.url("/auth/getToken"))
            .json(&serde_json::json!({ "id": 1 }))
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            assert!(response.headers().get("retry-after").is_some());
            assert_eq!(response.headers()["ratelimit-limit"], "2");
            assert_eq!(response.headers()["ratelimit-remaining"], "0");
        }
        response.bytes().await.unwrap();
    }
    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
    );

    let root = server.stop().await;
    assert_eq!(read_lines(&out_log(root.path())).len(), 2);
    let errors = read_lines(&error_log(root.path()));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("/auth/getToken  429"));
}

#[tokio::test]
async fn test_global_limit_headers() {
    let server = TestServer::start().await;

    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.headers()["ratelimit-limit"], "200");
    assert_eq!(response.headers()["ratelimit-remaining"], "199");
    assert!(response.headers().get("x-ratelimit-limit").is_none());
    response.bytes().await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_upload_single_file() {
    let server = TestServer::start().await;

    let form = Form::new().part(
        "file",
        Part::bytes(b"hello upload".to_vec()).file_name("../notes.txt"),
    );
    let response = reqwest::Client::new()
        .post(server.url("/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"][0]["fileName"], "notes.txt");
    assert_eq!(body["data"][0]["size"], 12);

    let stored = server.root().join("public/upload/notes.txt");
    assert_eq!(std::fs::read(&stored).unwrap(), b"hello upload");
    server.stop().await;
}

#[tokio::test]
async fn test_upload_too_large_is_rejected_and_removed() {
    let server = TestServer::start_with(|config| config.upload.max_file_size = 1024).await;

    let form = Form::new().part(
        "file",
        Part::bytes(vec![7u8; 4096]).file_name("big.bin"),
    );
    let response = reqwest::Client::new()
        .post(server.url("/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["errorCode"], 10000);
    assert!(body["msg"].as_str().unwrap().starts_with("LIMIT_FILE_SIZE"));

    assert!(!server.root().join("public/upload/big.bin").exists());
    let errors = wait_for_lines(&error_log(server.root()), 1).await;
    assert!(errors[0].contains("/upload  400"));
    server.stop().await;
}

#[tokio::test]
async fn test_upload_mix_rejects_extra_files() {
    let server = TestServer::start().await;

    let form = Form::new()
        .part("idCards", Part::bytes(b"1".to_vec()).file_name("front.png"))
        .part("idCards", Part::bytes(b"2".to_vec()).file_name("back.png"))
        .part("idCards", Part::bytes(b"3".to_vec()).file_name("extra.png"));
    let response = reqwest::Client::new()
        .post(server.url("/upload/mix"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["msg"].as_str().unwrap().starts_with("LIMIT_UNEXPECTED_FILE"));

    // Files written before the violation are cleaned up too.
    assert!(!server.root().join("public/upload/front.png").exists());
    assert!(!server.root().join("public/upload/back.png").exists());
    server.stop().await;
}

#[tokio::test]
async fn test_upload_without_file() {
    let server = TestServer::start().await;

    let form = Form::new().text("note", "no files here");
    let response = reqwest::Client::new()
        .post(server.url("/upload/multiple"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["msg"].as_str().unwrap().starts_with("NO_FILE"));
    server.stop().await;
}
