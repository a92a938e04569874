use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use regex::Regex;

/// 64 alphanumerics is ~380 bits of entropy.
pub const TOKEN_LEN: usize = 64;

pub fn generate_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Cheap shape check so obviously malformed bearer values never reach the
/// database.
pub fn is_well_formed(token: &str) -> bool {
    lazy_static! {
        static ref TOKEN_RE: Regex = Regex::new(r"^[A-Za-z0-9]{1,128}$").unwrap();
    }
    TOKEN_RE.is_match(token)
}
