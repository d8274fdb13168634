//! Group role hierarchy and the authorization rules over it.
//!
//! Every permission check in the service goes through these functions
//! instead of re-encoding level thresholds at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role within a group, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Member,
    Moderator,
    Admin,
    Owner,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Member => "member",
            GroupRole::Moderator => "moderator",
            GroupRole::Admin => "admin",
            GroupRole::Owner => "owner",
        }
    }

    /// Numeric privilege level: member=0, moderator=1, admin=2, owner=3.
    pub fn level(&self) -> u8 {
        match self {
            GroupRole::Member => 0,
            GroupRole::Moderator => 1,
            GroupRole::Admin => 2,
            GroupRole::Owner => 3,
        }
    }

    /// Whether this role may remove a member holding `target`.
    ///
    /// Owners may remove anyone; everyone else needs a strictly higher level
    /// than the target.
    pub fn can_remove(&self, target: GroupRole) -> bool {
        matches!(self, GroupRole::Owner) || self.level() > target.level()
    }

    /// Whether this role may promote (or demote) a member to `new_role`.
    ///
    /// Owners may assign any role; admins may assign roles below admin.
    pub fn can_promote_to(&self, new_role: GroupRole) -> bool {
        match self {
            GroupRole::Owner => true,
            GroupRole::Admin => new_role.level() < GroupRole::Admin.level(),
            _ => false,
        }
    }

    /// Whether this role may change group settings, issue invitations, and
    /// manage invite links.
    pub fn can_manage_settings(&self) -> bool {
        matches!(self, GroupRole::Admin | GroupRole::Owner)
    }

    /// Whether this role may be granted through an invitation or invite
    /// link. Ownership is only ever reached through ownership transfer.
    pub fn is_grantable(&self) -> bool {
        !matches!(self, GroupRole::Owner)
    }
}

impl FromStr for GroupRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member" => Ok(GroupRole::Member),
            "moderator" => Ok(GroupRole::Moderator),
            "admin" => Ok(GroupRole::Admin),
            "owner" => Ok(GroupRole::Owner),
            _ => Err(format!("Invalid group role: {}", s)),
        }
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(GroupRole::Member.level() < GroupRole::Moderator.level());
        assert!(GroupRole::Moderator.level() < GroupRole::Admin.level());
        assert!(GroupRole::Admin.level() < GroupRole::Owner.level());
    }

    #[test]
    fn test_can_remove() {
        // Owner removes anyone, including another hypothetical owner row.
        assert!(GroupRole::Owner.can_remove(GroupRole::Owner));
        assert!(GroupRole::Owner.can_remove(GroupRole::Admin));

        // Strictly-higher-level rule for everyone else.
        assert!(GroupRole::Admin.can_remove(GroupRole::Moderator));
        assert!(GroupRole::Admin.can_remove(GroupRole::Member));
        assert!(!GroupRole::Admin.can_remove(GroupRole::Admin));
        assert!(!GroupRole::Admin.can_remove(GroupRole::Owner));
        assert!(GroupRole::Moderator.can_remove(GroupRole::Member));
        assert!(!GroupRole::Moderator.can_remove(GroupRole::Moderator));
        assert!(!GroupRole::Member.can_remove(GroupRole::Member));
    }

    #[test]
    fn test_can_promote_to() {
        assert!(GroupRole::Owner.can_promote_to(GroupRole::Admin));
        assert!(GroupRole::Owner.can_promote_to(GroupRole::Owner));

        assert!(GroupRole::Admin.can_promote_to(GroupRole::Moderator));
        assert!(GroupRole::Admin.can_promote_to(GroupRole::Member));
        assert!(!GroupRole::Admin.can_promote_to(GroupRole::Admin));
        assert!(!GroupRole::Admin.can_promote_to(GroupRole::Owner));

        assert!(!GroupRole::Moderator.can_promote_to(GroupRole::Member));
        assert!(!GroupRole::Member.can_promote_to(GroupRole::Member));
    }

    #[test]
    fn test_can_manage_settings() {
        assert!(GroupRole::Owner.can_manage_settings());
        assert!(GroupRole::Admin.can_manage_settings());
        assert!(!GroupRole::Moderator.can_manage_settings());
        assert!(!GroupRole::Member.can_manage_settings());
    }

    #[test]
    fn test_owner_never_grantable() {
        assert!(!GroupRole::Owner.is_grantable());
        assert!(GroupRole::Admin.is_grantable());
        assert!(GroupRole::Moderator.is_grantable());
        assert!(GroupRole::Member.is_grantable());
    }

    #[test]
    fn test_from_str_roundtrip() {
        for role in [
            GroupRole::Member,
            GroupRole::Moderator,
            GroupRole::Admin,
            GroupRole::Owner,
        ] {
            assert_eq!(role.as_str().parse::<GroupRole>().unwrap(), role);
        }
        assert!("superuser".parse::<GroupRole>().is_err());
    }
}
