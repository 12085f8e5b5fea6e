//! Scriptgate - A reverse proxy that serves remote scripts under short paths
//!
//! This library provides a small dispatcher that:
//! - Maps fixed request paths to upstream file URLs from static configuration
//! - Streams upstream bodies back unmodified, without buffering them
//! - Serves a generated listing page of every configured path at `/`
//! - Answers unknown paths with 404 and upstream failures with 502

pub mod config;
pub mod error;
pub mod page;
pub mod proxy;
pub mod router;
pub mod routes;
pub mod tls;
pub mod upstream;
