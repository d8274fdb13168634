//! Domain models for the Circles backend.

pub mod group;
pub mod invitation;
pub mod invite_link;
pub mod member;
pub mod role;
pub mod user;
pub mod user_status;

pub use group::Group;
pub use invitation::{Invitation, InvitationStatus, InviteTarget};
pub use invite_link::InviteLink;
pub use member::Member;
pub use role::GroupRole;
pub use user::User;
