//! Persistence layer for the Circles backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations holding the transactional state machines

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
