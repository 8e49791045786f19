use base64::prelude::*;
use pbkdf2::pbkdf2_hmac;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rand::RngCore;
use sha2::Sha256;

use super::hash::Algorithm;
use super::hash::PasswordHash;

/// Password hashing implementation.
///
/// PBKDF2-HMAC-SHA256 with a 12 character alphanumeric salt and a 32 byte
/// derived key.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub const MIN_ITERATIONS: u32 = 120_000;
    pub const SALT_LENGTH: usize = 12;
    pub const KEY_LENGTH: usize = 32;

    /// Create a hasher with the minimum iteration count.
    pub fn new() -> Self {
        Self {
            iterations: Self::MIN_ITERATIONS,
        }
    }

    /// Create a hasher with a custom iteration count.
    ///
    /// Counts below `MIN_ITERATIONS` are raised to the minimum.
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(Self::MIN_ITERATIONS),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a plaintext password with a salt drawn from the thread-local RNG.
    pub fn hash(&self, password: &str) -> PasswordHash {
        self.hash_with_rng(password, &mut rand::thread_rng())
    }

    /// Hash a plaintext password with a salt drawn from `rng`.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to hash
    /// * `rng` - Random source for the salt
    ///
    /// # Returns
    /// Structured hash; its `Display` form is the storage encoding
    pub fn hash_with_rng<R: RngCore + ?Sized>(&self, password: &str, rng: &mut R) -> PasswordHash {
        let salt: String = (0..Self::SALT_LENGTH)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();
        let digest = derive(password, &salt, self.iterations);

        PasswordHash {
            algorithm: Algorithm::Pbkdf2Sha256,
            iterations: self.iterations,
            salt,
            digest,
        }
    }

    /// Verify a password against a stored hash.
    ///
    /// A stored value that cannot be parsed is treated as a mismatch and
    /// logged. The key is always fully derived before comparing.
    pub fn verify(&self, encoded: &str, password: &str) -> bool {
        let stored = match encoded.parse::<PasswordHash>() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash has an invalid format");
                return false;
            }
        };

        let candidate = match stored.algorithm {
            Algorithm::Pbkdf2Sha256 => derive(password, &stored.salt, stored.iterations),
        };

        constant_time_eq(candidate.as_bytes(), stored.digest.as_bytes())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn derive(password: &str, salt: &str, iterations: u32) -> String {
    let mut key = [0u8; PasswordHasher::KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    BASE64_STANDARD.encode(key)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.iter().zip(b.iter()) {
        result |= byte_a ^ byte_b;
    }
    result == 0
}
