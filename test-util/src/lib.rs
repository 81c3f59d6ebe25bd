//! Utilities for integration tests.
//!
//! The `test-util` crate provides throwaway migrated databases, seeded
//! forum fixtures, an in-process daemon bound to an ephemeral port and a
//! JSON-lines client for talking to it. It is used by the integration tests
//! in the main crate.

mod client;
mod database;
mod fixtures;
mod server;

pub use client::TestClient;
pub use database::TempDatabase;
pub use fixtures::{
    QUALITY,
    SAFETY,
    admin,
    draft,
    member,
    seed_categories,
    seeded_forum,
    uncached,
};
pub use server::TestServer;

/// Boxed error used by fallible helpers.
pub type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;
