use std::fmt;
use std::str::FromStr;

use super::errors::PasswordError;

const FIELD_SEPARATOR: char = '$';
const FIELD_COUNT: usize = 4;

/// Key derivation algorithm recorded in an encoded hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Pbkdf2Sha256,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Pbkdf2Sha256 => "pbkdf2_sha256",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = PasswordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pbkdf2_sha256" => Ok(Algorithm::Pbkdf2Sha256),
            other => Err(PasswordError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Self-describing password hash.
///
/// Stored as `algorithm$iterations$salt$digest`, where `digest` is the
/// standard base64 encoding of the derived key. Keeping the parameters next
/// to the digest lets the iteration count change without touching stored
/// records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub algorithm: Algorithm,
    pub iterations: u32,
    pub salt: String,
    pub digest: String,
}

impl fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.algorithm,
            self.iterations,
            self.salt,
            self.digest,
            sep = FIELD_SEPARATOR
        )
    }
}

impl FromStr for PasswordHash {
    type Err = PasswordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(FIELD_SEPARATOR).collect();
        if fields.len() != FIELD_COUNT {
            return Err(PasswordError::MalformedHash(format!(
                "expected {} fields, found {}",
                FIELD_COUNT,
                fields.len()
            )));
        }

        let algorithm = fields[0].parse::<Algorithm>()?;
        let iterations = fields[1]
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                PasswordError::MalformedHash(format!("invalid iteration count: {}", fields[1]))
            })?;

        if fields[2].is_empty() || fields[3].is_empty() {
            return Err(PasswordError::MalformedHash(
                "salt and digest must not be empty".to_string(),
            ));
        }

        Ok(Self {
            algorithm,
            iterations,
            salt: fields[2].to_string(),
            digest: fields[3].to_string(),
        })
    }
}
