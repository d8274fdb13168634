//! Repository implementations for database operations.

pub mod group;
pub mod invitation;
pub mod invite_link;
pub mod status;
pub mod user;

pub use group::{GroupRepository, JoinOutcome, LeaveOutcome};
pub use invitation::{
    AcceptOutcome, Addressee, DeclineOutcome, InvitationRepository, RevokeOutcome, SendOutcome,
};
pub use invite_link::{InviteLinkRepository, RedeemOutcome};
pub use status::StatusRepository;
pub use user::UserRepository;

use rand::Rng;

/// Alphabet for invite codes. Excludes ambiguous characters (0/O, 1/l/I)
/// so codes survive being read aloud or retyped.
const INVITE_CODE_CHARSET: &[u8] = b"abcdefghjkmnpqrstuvwxyzABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of generated invite codes.
pub const INVITE_CODE_LENGTH: usize = 10;

/// Generate a random invite code.
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LENGTH)
        .map(|_| INVITE_CODE_CHARSET[rng.gen_range(0..INVITE_CODE_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_code_length_and_charset() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LENGTH);
        for c in code.bytes() {
            assert!(INVITE_CODE_CHARSET.contains(&c));
        }
    }

    #[test]
    fn test_invite_code_excludes_ambiguous_characters() {
        for c in [b'0', b'O', b'1', b'l', b'I'] {
            assert!(!INVITE_CODE_CHARSET.contains(&c));
        }
    }

    #[test]
    fn test_invite_codes_vary() {
        let a = generate_invite_code();
        let b = generate_invite_code();
        // 54^10 possibilities; a collision here means the generator is broken.
        assert_ne!(a, b);
    }
}
