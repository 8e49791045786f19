//! Authentication utilities library
//!
//! Provides reusable authentication infrastructure for services:
//! - Password hashing (PBKDF2-HMAC-SHA256, self-describing encoding)
//! - JWT token generation and validation (HS256)
//! - Injectable clock for time-dependent checks
//!
//! Each service defines its own authentication traits and adapts these implementations.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").to_string();
//! assert!(hasher.verify(&hash, "my_password"));
//! assert!(!hasher.verify(&hash, "not_my_password"));
//! ```
//!
//! ## JWT Tokens
//! ```
//! use chrono::{Duration, Utc};
//! use auth::{Claims, JwtHandler};
//!
//! let handler = JwtHandler::new(b"secret_key_at_least_32_bytes_long!");
//! let now = Utc::now();
//! let claims = Claims::issue("user123", now + Duration::days(28), now);
//! let token = handler.encode(&claims).unwrap();
//! let decoded = handler.decode(&token).unwrap();
//! assert_eq!(decoded.sub.as_deref(), Some("user123"));
//! ```

pub mod clock;
pub mod jwt;
pub mod password;

// Re-export commonly used items
pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use password::PasswordError;
pub use password::PasswordHash;
pub use password::PasswordHasher;
