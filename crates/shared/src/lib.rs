//! Shared utilities and common types for the Circles backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Session token (JWT) validation
//! - Offset pagination helpers
//! - Common validation logic

pub mod jwt;
pub mod pagination;
pub mod validation;
