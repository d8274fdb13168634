//! User status constants.
//!
//! A user carries one global status plus, independently, one status per
//! group; both live as columns rather than domain aggregates since this
//! service only maintains their expiry. A status whose expiry has passed is
//! stale: the sweeper resets global statuses to the default and deletes
//! per-group records outright.

/// Status a user falls back to once an expiring status is swept.
pub const DEFAULT_STATUS_ID: &str = "available";
