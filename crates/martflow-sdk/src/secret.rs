//! Backend-managed secret generation.

use rand::distr::Alphanumeric;
use rand::Rng;

/// Length of every generated secret key.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Generate an alphanumeric secret key from `rng`.
///
/// Callers pass the random source explicitly; production code uses
/// `rand::rng()`, tests a seeded generator.
pub fn generate_secret_key<R: Rng>(rng: &mut R) -> String {
    (0..SECRET_KEY_LENGTH)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}
