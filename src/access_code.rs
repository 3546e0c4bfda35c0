//! Human-readable access codes and their lookup digests.
//!
//! A code is two words drawn with replacement from [`WORDS`] followed by a number in
//! `100..=999`, e.g. `ocean-maple-482`. That is roughly 20.5 bits of entropy and the
//! digest is unsalted, so collisions are expected to happen eventually and are handled
//! by the store as a uniqueness failure.

use rand::{seq::SliceRandom as _, Rng};
use sha2::{Digest as _, Sha256};

/// Separator between the parts of a code.
pub const SEPARATOR: char = '-';

/// The vocabulary codes are built from.
pub const WORDS: [&str; 40] = [
    "ocean", "river", "breeze", "mountain", "meadow", "forest", "sun", "moon", "star", "cloud",
    "apple", "maple", "willow", "pine", "oak", "cedar", "rose", "lily", "iris", "tulip",
    "blue", "green", "red", "gold", "silver", "aqua", "coral", "plum", "ivory", "amber",
    "lion", "tiger", "eagle", "horse", "dolphin", "raven", "falcon", "koala", "panda", "otter",
];

/// Generate a new access code using the thread-local RNG.
pub fn generate_access_code() -> String {
    generate_with(&mut rand::thread_rng())
}

/// Generate an access code from the provided RNG.
pub fn generate_with<R: Rng>(rng: &mut R) -> String {
    // N.B: `WORDS` is a non-empty constant, so `choose` always yields.
    let first = WORDS.choose(rng).copied().unwrap_or(WORDS[0]);
    let second = WORDS.choose(rng).copied().unwrap_or(WORDS[0]);
    let number: u16 = rng.gen_range(100..=999);

    format!("{first}{SEPARATOR}{second}{SEPARATOR}{number}")
}

/// Compute the lookup digest of a code: SHA-256 over the trimmed code, hex encoded.
///
/// No case folding is applied. `Ocean-maple-482` and `ocean-maple-482` are different codes.
pub fn hash_access_code(code: &str) -> String {
    format!("{:x}", Sha256::digest(code.trim().as_bytes()))
}
