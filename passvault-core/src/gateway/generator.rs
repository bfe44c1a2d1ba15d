//! Random password generation backing the `generate_password` command.

use super::{GatewayError, GatewayResult};
use rand::seq::SliceRandom;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Generate a random password of `length` characters.
///
/// Letters and digits are always drawn from; symbols only when requested.
/// Every enabled character class appears at least once when the length
/// allows it.
pub fn generate_password(length: usize, include_symbols: bool) -> GatewayResult<String> {
    if length == 0 {
        return Err(GatewayError::Validation(
            "Password length must be at least 1".to_string(),
        ));
    }

    let mut classes: Vec<&[u8]> = vec![LOWERCASE, UPPERCASE, DIGITS];
    if include_symbols {
        classes.push(SYMBOLS);
    }
    let pool: Vec<u8> = classes.iter().flat_map(|class| class.iter().copied()).collect();

    let mut rng = rand::thread_rng();
    let mut password = Vec::with_capacity(length);

    for class in classes.iter().take(length) {
        if let Some(&c) = class.choose(&mut rng) {
            password.push(c);
        }
    }
    while password.len() < length {
        if let Some(&c) = pool.choose(&mut rng) {
            password.push(c);
        }
    }

    // Required characters were placed first
    password.shuffle(&mut rng);

    Ok(password.into_iter().map(char::from).collect())
}
