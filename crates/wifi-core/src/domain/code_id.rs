//! Access-code string generation.
//!
//! Codes are short enough to type on a phone keyboard and avoid lowercase so
//! they can be read aloud.  Uniqueness is not enforced here: a freshly
//! generated id that collides with an active code is simply treated as that
//! code by [`CodeManager::bind`](super::code_manager::CodeManager::bind).

use rand::seq::IndexedRandom;
use rand::Rng;

use super::code::CodeId;

/// Characters a generated code may contain.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of every generated code.
pub const CODE_LENGTH: usize = 11;

/// Generates a code using the thread-local RNG.
pub fn generate_code_id() -> CodeId {
    generate_code_id_with(&mut rand::rng())
}

/// Generates a code from the supplied RNG.
///
/// Tests pass a seeded `StdRng` to get reproducible output.
pub fn generate_code_id_with<R: Rng + ?Sized>(rng: &mut R) -> CodeId {
    let code: String = (0..CODE_LENGTH)
        .filter_map(|_| CODE_ALPHABET.choose(rng).map(|&b| b as char))
        .collect();
    CodeId::from(code)
}
