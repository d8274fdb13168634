//! Entity definitions (database row mappings).

pub mod group;
pub mod invitation;
pub mod invite_link;
pub mod user;

pub use group::{GroupEntity, GroupRoleDb, GroupWithRoleEntity, MemberEntity};
pub use invitation::{InvitationEntity, InvitationStatusDb};
pub use invite_link::InviteLinkEntity;
pub use user::UserEntity;
