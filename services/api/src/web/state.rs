//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use courseforge_core::ports::{CourseGenerator, CourseStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// The background generation task receives a clone of the same `Arc`; the
/// store hands out a fresh pooled connection per query, so the task never
/// reuses a resource tied to the request that spawned it.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CourseStore>,
    pub generator: Arc<dyn CourseGenerator>,
    pub config: Arc<Config>,
}
