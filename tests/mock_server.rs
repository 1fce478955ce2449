mod common;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use rustycontract::http::router::RouteTable;
use serde_json::{json, Value};

fn books(name: &str, author: &str) -> serde_json::Value {
    json!({
        "name": name,
        "serveOnly": true,
        "request": { "method": "GET", "serveEndpoint": "/api/books/*" },
        "response": {
            "code": 200,
            "serveBody": { "ISBN": "9780141187761", "author": author }
        }
    })
}

#[tokio::test]
async fn wildcard_route_serves_body_and_other_methods_get_404() {
    let server = common::start(&[common::resource(books("Get book", "George Orwell"))]).await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/api/books/123")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"ISBN": "9780141187761", "author": "George Orwell"}));

    let resp = client.post(server.url("/api/books/123")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let text = resp.text().await.unwrap();
    assert!(text.contains("/api/books/123"), "{text}");

    server.shutdown.shutdown();
}

#[tokio::test]
async fn duplicate_registration_always_resolves_to_the_first() {
    let server = common::start(&[
        common::resource(books("First", "George Orwell")),
        common::resource(books("Second", "Aldous Huxley")),
    ])
    .await;
    let client = reqwest::Client::new();

    for id in ["1", "2", "3"] {
        let body: Value = client
            .get(server.url(&format!("/api/books/{id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["author"], "George Orwell");
    }
    server.shutdown.shutdown();
}

#[tokio::test]
async fn declared_headers_and_status_are_served() {
    let server = common::start(&[common::resource(json!({
        "name": "Create",
        "request": { "method": "POST", "endpoints": ["/api/books"] },
        "response": {
            "code": 201,
            "headers": { "Location": "/api/books/42" },
            "type": "Book",
            "serveBody": "created"
        }
    }))])
    .await;

    let resp = reqwest::Client::new()
        .post(server.url("/api/books"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    assert_eq!(resp.headers()["location"], "/api/books/42");
    assert!(resp.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));
    assert_eq!(resp.text().await.unwrap(), "created");
    server.shutdown.shutdown();
}

#[tokio::test]
async fn resource_without_serve_body_serves_empty_body() {
    let server = common::start(&[common::resource(json!({
        "name": "Literal",
        "request": { "method": "GET", "endpoints": ["/greeting"] },
        "response": { "code": 200, "body": { "greeting": "hello" } }
    }))])
    .await;

    let resp = reqwest::get(server.url("/greeting")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "");
    server.shutdown.shutdown();
}

#[tokio::test]
async fn route_swap_is_seen_by_new_requests() {
    let server = common::start(&[common::resource(books("Old", "George Orwell"))]).await;
    let new_table = RouteTable::build(
        &[common::resource(books("New", "Aldous Huxley"))],
        &server.base_url(),
    );
    server.routes.replace(new_table);

    let body: Value = reqwest::get(server.url("/api/books/1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["author"], "Aldous Huxley");
    server.shutdown.shutdown();
}

#[tokio::test]
async fn shutdown_is_idempotent_and_releases_the_socket() {
    let server = common::start(&[common::resource(books("Get book", "George Orwell"))]).await;
    let addr = server.addr;

    server.shutdown.shutdown();
    server.shutdown.shutdown();
    assert!(server.shutdown.is_shutdown());

    let finished = tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .expect("server stops")
        .expect("task joins");
    assert!(finished.is_ok());

    // The port is free again.
    tokio::net::TcpListener::bind(addr).await.unwrap();
}

#[tokio::test]
async fn oversized_request_is_rejected_and_the_server_keeps_serving() {
    let server = common::start(&[common::resource(books("Get book", "George Orwell"))]).await;

    let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"POST /g HTTP/1.1\r\nContent-Length: 1000000000000000\r\n\r\n")
        .await
        .unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    let reply = String::from_utf8_lossy(&reply);
    assert!(reply.starts_with("HTTP/1.1 413 "), "{reply}");

    let resp = reqwest::get(server.url("/api/books/1")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    server.shutdown.shutdown();
}
