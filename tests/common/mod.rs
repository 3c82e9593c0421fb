//! Common test infrastructure
//!
//! Spawns a fake notification backend that the real `HttpNotificationApi`
//! talks to. Tests should only import from this module.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, test_settings};
//!
//! #[tokio::test]
//! async fn test_badge() {
//!     let server = TestServer::spawn().await;
//!     let api = notification_sync::HttpNotificationApi::new(&server.http_settings()).unwrap();
//! }
//! ```

mod constants;
mod fixtures;
mod server;

pub use constants::*;
pub use fixtures::{notification, seeded_notifications, test_settings};
pub use server::{BackendState, TestServer};
