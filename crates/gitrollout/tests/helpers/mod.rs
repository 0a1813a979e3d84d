//! Test helpers for the gitrollout binary crate.

#![allow(dead_code, unused_imports)]

pub mod client;

pub use client::{TestClient, TestResponse, app_state};
