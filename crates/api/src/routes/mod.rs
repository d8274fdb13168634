//! HTTP route handlers.

pub mod groups;
pub mod health;
pub mod identity;
pub mod invitations;
pub mod invite_links;
pub mod members;
