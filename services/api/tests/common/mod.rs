//! Shared harness for the router tests: in-memory stores, a one-user allow-list
//! and small request/response helpers.
#![allow(dead_code)]

use api_lib::adapters::allow_list::{hash_secret_with, AllowListEntry};
use api_lib::adapters::{AllowListIdentity, MemoryAttachmentStore, MemoryRecordStore, MemorySessionStore};
use api_lib::web::{build_router, state::AppState};
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use backoffice_core::ports::SessionStore;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "correct horse";
pub const CODE: &str = "123456";

pub const BOUNDARY: &str = "backoffice-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn new(identity: AllowListIdentity) -> Self {
        Self::with_sessions(identity, Arc::new(MemorySessionStore::new()))
    }

    pub fn with_sessions(identity: AllowListIdentity, sessions: Arc<dyn SessionStore>) -> Self {
        let state = Arc::new(AppState::new(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemoryAttachmentStore::new()),
            sessions,
            Arc::new(identity),
        ));
        state.spawn_background_tasks();
        let router = build_router(
            state.clone(),
            HeaderValue::from_static("http://localhost:3000"),
        );
        Self { router, state }
    }

    /// An app whose session is already established.
    pub async fn signed_in() -> Self {
        let app = Self::new(AllowListIdentity::new(Vec::new()));
        app.state.sessions.establish().await.unwrap();
        app
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(empty(Method::GET, uri)).await
    }

    pub async fn post(&self, uri: &str) -> Response {
        self.send(empty(Method::POST, uri)).await
    }

    pub async fn delete(&self, uri: &str) -> Response {
        self.send(empty(Method::DELETE, uri)).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn multipart(&self, method: Method, uri: &str, parts: &[Part<'_>]) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }
}

/// The allow-list entry for [`USERNAME`]. Hashed at the smallest argon2 cost so the
/// suite stays fast; verification reads the cost from the hash.
pub fn allow_list_entry() -> AllowListEntry {
    let quick = |secret: &str| {
        hash_secret_with(secret, argon2::Params::new(8, 1, 1, None).unwrap()).unwrap()
    };
    AllowListEntry {
        username: USERNAME.to_string(),
        password_hash: quick(PASSWORD),
        code_hash: quick(CODE),
    }
}

fn empty(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status for response");
}

//=========================================================================================
// Multipart
//=========================================================================================

pub enum Part<'a> {
    Field(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub fn pdf<'a>(name: &'a str, file_name: &'a str) -> Part<'a> {
    Part::File {
        name,
        file_name,
        content_type: "application/pdf",
        data: b"%PDF-1.4\n% test\n%%EOF\n",
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
