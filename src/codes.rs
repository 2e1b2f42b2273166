//! Short code generation and validation.

use rand::Rng;

/// Length of generated codes.
pub const GENERATED_CODE_LENGTH: usize = 6;

/// Longest code a user may choose.
pub const MAX_CODE_LENGTH: usize = 32;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a random alphabetic code, e.g. "qTxbRa".
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_CODE_LENGTH)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// True if `code` is 1 to [`MAX_CODE_LENGTH`] ASCII letters.
pub fn is_valid_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CODE_LENGTH
        && code.bytes().all(|b| b.is_ascii_alphabetic())
}
