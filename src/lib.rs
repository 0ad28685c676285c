//! pwcrypt - Password-based encryption using scrypt and AES-256-CBC
//!
//! ```no_run
//! use pwcrypt::{EnvelopeCipher, Password};
//!
//! # fn main() -> pwcrypt::Result<()> {
//! let cipher = EnvelopeCipher::new();
//! let password = Password::new("aTestPassword");
//! let text = cipher.encrypt_text("attack at dawn", &password)?;
//! assert_eq!(cipher.decrypt_text(&text, &password)?, "attack at dawn");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod encoding;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod password;

pub use envelope::{EnvelopeCipher, EnvelopeParts, decrypt, encrypt};
pub use error::{ErrorCategory, ErrorKind, PwcryptError, Result};
pub use kdf::KdfParams;
pub use password::Password;
