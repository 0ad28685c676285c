//! Text form of envelopes and text plaintexts
//!
//! Envelopes travel as RFC 4648 standard base64 with `=` padding. There is
//! no prefix or version marker, and no whitespace is emitted or accepted.
//! Text plaintexts are exchanged as their UTF-8 bytes.

use crate::error::{ErrorCategory, ErrorKind, PwcryptError, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use zeroize::Zeroize;

/// Encode a binary envelope as text.
pub fn to_text(envelope: &[u8]) -> String {
    STANDARD.encode(envelope)
}

/// Decode the text form back into the binary envelope.
pub fn from_text(text: &str) -> Result<Vec<u8>> {
    STANDARD.decode(text).map_err(|e| {
        PwcryptError::with_kind_and_source(
            ErrorCategory::InvalidInput,
            ErrorKind::TextDecode,
            "base64 decoding failed",
            e,
        )
    })
}

/// UTF-8 bytes of a text plaintext.
pub fn text_to_bytes(text: &str) -> &[u8] {
    text.as_bytes()
}

/// Reinterpret decrypted bytes as text.
///
/// Text plaintexts always come back as valid UTF-8, so a failure here means
/// a wrong password got past the padding check. The rejected bytes are
/// wiped before returning.
pub fn bytes_to_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        let utf8_error = e.utf8_error();
        let mut rejected = e.into_bytes();
        rejected.zeroize();
        PwcryptError::with_kind_and_source(
            ErrorCategory::DecryptionFailure,
            ErrorKind::PlaintextNotUtf8,
            "could not decrypt: result is not text (wrong password or corrupt data)",
            utf8_error,
        )
    })
}
