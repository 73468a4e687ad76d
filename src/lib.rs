//! tabhost: tab navigation and embedded view lifecycle engine for a tabbed
//! desktop client.
//!
//! The library exposes every module for the binary and the integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod services;
pub mod types;

#[cfg(feature = "gui")]
pub mod ui;
