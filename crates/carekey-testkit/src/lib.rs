//! # CareKey Testkit
//!
//! Testing utilities for CareKey.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a fully wired broker deployment (owner, linked
//!   professional, facility) on an in-memory store and a manual clock.
//! - **Generators**: proptest strategies for scopes, categories,
//!   durations, and grants.
//!
//! ## Fixtures
//!
//! ```rust,no_run
//! use carekey_testkit::fixtures::{read_scope, TestDeployment};
//!
//! async fn example() {
//!     let deployment = TestDeployment::new(true).await;
//!     let request = deployment.handshake(Some(read_scope(600, "EMERGENCY triage")));
//!     let session = deployment.broker.establish_session(&request).await.unwrap();
//!     assert!(session.grant.is_some());
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust
//! use carekey_testkit::generators;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn scopes_are_valid(scope in generators::scope()) {
//!         prop_assert!(!scope.categories().is_empty());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{read_scope, read_write_scope, TestDeployment};
