//! Kiosk dashboard library
//!
//! Exposes the cache, the data clients and the HTTP server for the binary and
//! for integration tests.

pub mod cache;
pub mod cli;
pub mod dashboard;
pub mod data;
pub mod pages;
pub mod server;
pub mod sweeper;
