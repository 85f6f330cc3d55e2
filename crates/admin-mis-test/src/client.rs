//! HTTP test client for the admin API.
//!
//! [`TestClient`] sends simulated requests through an Axum router without
//! opening a socket, attaching the token credentials it was given.
//! [`TestResponse`] holds the collected result.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use admin_mis_test::client::TestClient;
//! use axum::routing::get;
//! use axum::Router;
//!
//! async fn example() {
//!     let app = Router::new().route("/hello", get(|| async { "Hello" }));
//!     let client = TestClient::new(app).token("secret");
//!
//!     let response = client.get("/hello").await;
//!     assert_eq!(response.status_code(), 200);
//!     assert_eq!(response.text(), "Hello");
//! }
//! ```

use admin_mis_core::{MisError, MisResult};
use axum::body::Body;
use axum::Router;
use bytes::Bytes;
use http::{header, HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use url::form_urlencoded;

const BOUNDARY: &str = "admin-mis-test-boundary";

/// Sends requests to an Axum router.
#[derive(Debug, Clone)]
pub struct TestClient {
    app: Router,
    authorization: Option<String>,
    host: String,
}

impl TestClient {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            authorization: None,
            host: "testserver".to_string(),
        }
    }

    /// Authenticates every request with `Authorization: Token <key>`.
    #[must_use]
    pub fn token(mut self, key: &str) -> Self {
        self.authorization = Some(format!("Token {key}"));
        self
    }

    /// Sends requests without credentials.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.authorization = None;
        self
    }

    /// The `Host` header sent with every request.
    #[must_use]
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, Body::empty(), None).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, Body::empty(), None).await
    }

    /// Sends a JSON body with `POST`.
    pub async fn post_json(&self, path: &str, body: &Value) -> TestResponse {
        self.json(Method::POST, path, body).await
    }

    /// Sends a JSON body with `PATCH`.
    pub async fn patch_json(&self, path: &str, body: &Value) -> TestResponse {
        self.json(Method::PATCH, path, body).await
    }

    /// Sends `pairs` urlencoded with `POST`.
    pub async fn post_form(&self, path: &str, pairs: &[(&str, &str)]) -> TestResponse {
        let body = encode_form_data(pairs);
        self.send(
            Method::POST,
            path,
            Body::from(body),
            Some("application/x-www-form-urlencoded"),
        )
        .await
    }

    /// Sends a `multipart/form-data` body built with [`MultipartBody`].
    pub async fn multipart(&self, method: Method, path: &str, body: MultipartBody) -> TestResponse {
        let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
        self.send(method, path, Body::from(body.finish()), Some(&content_type))
            .await
    }

    /// Sends any method with an arbitrary body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Body,
        content_type: Option<&str>,
    ) -> TestResponse {
        self.send(method, path, body, content_type).await
    }

    async fn json(&self, method: Method, path: &str, body: &Value) -> TestResponse {
        self.send(method, path, Body::from(body.to_string()), Some("application/json"))
            .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Body,
        content_type: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::HOST, &self.host);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(authorization) = &self.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        let req = builder.body(body).expect("request builder should not fail");

        let response = self
            .app
            .clone()
            .oneshot(req)
            .await
            .expect("router should not error");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .map_or_else(|_| Bytes::new(), http_body_util::Collected::to_bytes);

        TestResponse {
            status,
            headers,
            body: body.to_vec(),
        }
    }
}

fn encode_form_data(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Builds a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct MultipartBody {
    parts: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, content: &[u8]) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.parts.extend_from_slice(content);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.parts
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.parts
    }
}

/// A collected response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> MisResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| MisError::SerializationError(e.to_string()))
    }

    /// The body as a JSON value, `null` when it is not JSON.
    pub fn value(&self) -> Value {
        self.json().unwrap_or(Value::Null)
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
