pub mod user_auth;
