//! Core library for the forumd discussion engine.
//!
//! Topics, threaded replies, likes and bookmarks, denormalised counters and
//! platform statistics, backed by Diesel. The [`forum::Forum`] façade is the
//! entry point for embedding; [`server`] wraps it in a line-delimited JSON
//! daemon. Only one database backend (either `sqlite` or `postgres`) should
//! be enabled at a time.

pub mod commands;
pub mod db;
pub mod error;
pub mod forum;
pub mod handler;
pub mod models;
pub mod privileges;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod thread;

pub use error::{ForumError, ForumResult};
pub use forum::{Forum, ForumConfig};
pub use privileges::{Actor, Role};
