use std::error::Error as StdError;

use thiserror::Error;

/// Broad classification of a failure, stable enough for callers to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// The envelope or its text form failed structural validation before
    /// any cryptographic work was attempted.
    InvalidInput,

    /// The cryptographic operation ran, but its output was rejected. In
    /// practice this means a wrong password, or a corrupted or tampered-with
    /// envelope; the two cannot be told apart.
    DecryptionFailure,

    /// The KDF cost parameters were rejected. This is a configuration bug,
    /// never something a user can trigger with normal input.
    KdfParameters,

    /// Interaction with the filesystem, terminal or stdin failed.
    Environment,

    /// Unexpected state reached within pwcrypt logic.
    Internal,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Input ended before salt, IV and one cipher block could be read.
    TruncatedEnvelope,
    /// Ciphertext length is not a multiple of the cipher block size.
    MisalignedCiphertext,
    /// Text form is not valid base64 (alphabet or padding).
    TextDecode,
    /// PKCS#7 padding did not validate after decryption.
    BadPadding,
    /// Decrypted bytes were expected to be text but are not UTF-8.
    PlaintextNotUtf8,
    /// A password source produced bytes that are not UTF-8.
    PasswordNotUtf8,
    /// scrypt cost parameters rejected by scrypt itself or by our memory ceiling.
    InvalidCostParameters,
    /// Low-level scrypt key derivation failed.
    KeyDerivation,
    /// Password could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
    /// Unexpected state reached within pwcrypt logic.
    InternalInvariant,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct PwcryptError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl PwcryptError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Environment failure wrapping an I/O error. The message should say
    /// what was being done; the I/O error itself is kept as the source.
    pub fn io(msg: impl Into<String>, source: std::io::Error) -> Self {
        Self::with_kind_and_source(ErrorCategory::Environment, ErrorKind::Io, msg, source)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// True for a wrong password or a corrupted envelope.
    pub fn is_decryption_failure(&self) -> bool {
        self.category == ErrorCategory::DecryptionFailure
    }

    /// True when input was rejected before any cryptographic work.
    pub fn is_invalid_input(&self) -> bool {
        self.category == ErrorCategory::InvalidInput
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PwcryptError>;
