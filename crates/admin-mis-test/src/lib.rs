//! # admin-mis-test
//!
//! Test helpers for admin-mis: a [`TestClient`](client::TestClient) that
//! drives an Axum router in-process with token credentials, and a
//! [`MultipartBody`](client::MultipartBody) builder for upload requests.

pub mod client;

pub use client::{MultipartBody, TestClient, TestResponse};
