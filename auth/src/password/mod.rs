pub mod errors;
pub mod hash;
pub mod pbkdf2;

pub use errors::PasswordError;
pub use hash::Algorithm;
pub use hash::PasswordHash;
pub use pbkdf2::PasswordHasher;
