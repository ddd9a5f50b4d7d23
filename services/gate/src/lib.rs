//! Back-office session gate library crate.
//!
//! # Purpose
//! Exposes the session gate decision logic, the refresh client, the Axum
//! middleware and router wiring, and configuration for use by the binary and
//! tests.
//!
//! # Notes
//! [`gate::SessionGate`] owns the per-request decision; everything else either
//! feeds it (config, routes, cookies, refresh) or applies its verdict
//! (middleware, proxy).
pub mod app;
pub mod config;
pub mod cookies;
pub mod gate;
pub mod middleware;
pub mod observability;
pub mod proxy;
pub mod refresh;
pub mod routes;
