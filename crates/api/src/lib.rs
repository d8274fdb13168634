//! HTTP API for the group membership service.
//!
//! Exposes group, membership, invitation, and invite link endpoints, the
//! identity event webhook, and the background status sweeper.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod middleware;
pub mod routes;
