//! Domain layer for the Circles backend.
//!
//! This crate contains:
//! - Domain models (Group, Member, Invitation, InviteLink, User)
//! - The group role hierarchy and its authorization rules
//! - Request/response DTOs with validation

pub mod models;
