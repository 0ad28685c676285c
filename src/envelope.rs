//! Encryption/decryption using scrypt + AES-256-CBC
//!
//! This module implements password-based encryption using:
//! - scrypt for key derivation from the password
//! - AES-256 in CBC mode with PKCS#7 padding
//!
//! The binary format (the "envelope") is:
//! - salt: 8 bytes
//! - iv: 16 bytes
//! - ciphertext: a non-zero multiple of 16 bytes
//!
//! The envelope is versionless and carries no MAC. A wrong password is
//! detected through the padding check, which lets a small fraction of wrong
//! passwords through (roughly 1 in 256); callers decrypting text get a second
//! check in the form of UTF-8 validation.

use crate::encoding;
use crate::error::{ErrorCategory, ErrorKind, PwcryptError, Result};
use crate::kdf::{self, KdfParams, SALT_LEN};
use crate::password::Password;
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use log::debug;
use rand::RngCore;
use rand::rngs::OsRng;

/// Length of the AES block, and so of the IV, in bytes
pub const BLOCK_LEN: usize = 16;

/// Length of IV in bytes
pub const IV_LEN: usize = BLOCK_LEN;

/// Smallest well-formed envelope: salt, IV and one block of ciphertext.
pub const MIN_ENVELOPE_LEN: usize = SALT_LEN + IV_LEN + BLOCK_LEN;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Borrowed view of an envelope split into its three fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeParts<'a> {
    pub salt: &'a [u8; SALT_LEN],
    pub iv: &'a [u8; IV_LEN],
    pub ciphertext: &'a [u8],
}

impl<'a> EnvelopeParts<'a> {
    /// Split an envelope by fixed-length slicing. No cryptographic work is
    /// done; only the structure is checked.
    pub fn parse(envelope: &'a [u8]) -> Result<Self> {
        let (salt, rest) = envelope
            .split_first_chunk::<SALT_LEN>()
            .ok_or_else(|| truncated("input likely truncated while reading salt"))?;
        let (iv, ciphertext) = rest
            .split_first_chunk::<IV_LEN>()
            .ok_or_else(|| truncated("input likely truncated while reading iv"))?;

        if ciphertext.is_empty() {
            return Err(truncated(
                "input likely truncated while reading ciphertext; at least one block is required",
            ));
        }
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(PwcryptError::with_kind(
                ErrorCategory::InvalidInput,
                ErrorKind::MisalignedCiphertext,
                format!(
                    "invalid input: ciphertext length {} is not a multiple of {}",
                    ciphertext.len(),
                    BLOCK_LEN
                ),
            ));
        }

        Ok(Self {
            salt,
            iv,
            ciphertext,
        })
    }
}

fn truncated(msg: &str) -> PwcryptError {
    PwcryptError::with_kind(ErrorCategory::InvalidInput, ErrorKind::TruncatedEnvelope, msg)
}

/// Stateless encryption engine.
///
/// Holds nothing but the KDF cost parameters, so a value can be built per
/// call or shared freely between threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeCipher {
    params: KdfParams,
}

impl EnvelopeCipher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Encrypt plaintext with a password using random salt and IV
    ///
    /// Returns the envelope: salt(8) + iv(16) + ciphertext(16 * k)
    pub fn encrypt(&self, plaintext: &[u8], password: &Password) -> Result<Vec<u8>> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        self.encrypt_with_salt_and_iv(plaintext, password, &salt, &iv)
    }

    /// Encrypt plaintext with a password using provided salt and IV
    ///
    /// This function is ONLY for testing purposes to generate deterministic output.
    /// NEVER use this in production - always use `encrypt()` which generates random salt/IV.
    pub fn encrypt_with_salt_and_iv(
        &self,
        plaintext: &[u8],
        password: &Password,
        salt: &[u8; SALT_LEN],
        iv: &[u8; IV_LEN],
    ) -> Result<Vec<u8>> {
        let key = kdf::derive_key(password, salt, &self.params)?;

        let cipher = Aes256CbcEnc::new_from_slices(&key[..], iv).map_err(|_| {
            PwcryptError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "failed to initialize cipher",
            )
        })?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut output = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
        output.extend_from_slice(salt);
        output.extend_from_slice(iv);
        output.extend_from_slice(&ciphertext);

        debug!(
            "encrypted {} plaintext bytes into {} byte envelope",
            plaintext.len(),
            output.len()
        );
        Ok(output)
    }

    /// Decrypt an envelope with a password
    pub fn decrypt(&self, envelope: &[u8], password: &Password) -> Result<Vec<u8>> {
        let parts = EnvelopeParts::parse(envelope)?;

        let key = kdf::derive_key(password, parts.salt, &self.params)?;
        let cipher = Aes256CbcDec::new_from_slices(&key[..], parts.iv).map_err(|_| {
            PwcryptError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "failed to initialize cipher",
            )
        })?;

        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(parts.ciphertext)
            .map_err(|_| {
                debug!("padding check failed on {} byte envelope", envelope.len());
                PwcryptError::with_kind(
                    ErrorCategory::DecryptionFailure,
                    ErrorKind::BadPadding,
                    "could not decrypt: wrong password or corrupt data",
                )
            })?;

        Ok(plaintext)
    }

    /// Encrypt text, returning the base64 text form of the envelope.
    pub fn encrypt_text(&self, plaintext: &str, password: &Password) -> Result<String> {
        let envelope = self.encrypt(encoding::text_to_bytes(plaintext), password)?;
        Ok(encoding::to_text(&envelope))
    }

    /// Decrypt the base64 text form of an envelope back into text.
    pub fn decrypt_text(&self, text: &str, password: &Password) -> Result<String> {
        let envelope = encoding::from_text(text)?;
        let plaintext = self.decrypt(&envelope, password)?;
        encoding::bytes_to_text(plaintext)
    }
}

/// Encrypt with the default cost parameters.
pub fn encrypt(plaintext: &[u8], password: &Password) -> Result<Vec<u8>> {
    EnvelopeCipher::new().encrypt(plaintext, password)
}

/// Decrypt with the default cost parameters.
pub fn decrypt(envelope: &[u8], password: &Password) -> Result<Vec<u8>> {
    EnvelopeCipher::new().decrypt(envelope, password)
}

/// Deterministic encryption with the default cost parameters; tests and
/// test-vector generation only.
pub fn encrypt_with_salt_and_iv(
    plaintext: &[u8],
    password: &Password,
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>> {
    EnvelopeCipher::new().encrypt_with_salt_and_iv(plaintext, password, salt, iv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const TEST_STRING1: &str =
        "The quick brown fox jumps over the lazy dog. 01234567890 !@#$%^&*()-=[]{};':|`~,./<>?";

    // "The fee cannot be smaller than the minimum fee", in Chinese.
    const TEST_STRING2: &str = "\u{4ea4}\u{6613}\u{8d39}\u{7528}\u{5fc5}\u{987b}\u{81f3}\u{5c11} 0.0001 BTC\u{3002}\u{4fdd}\u{6301}\u{539f}\u{6709}\u{8d39}\u{7528}\u{8bbe}\u{7f6e}\u{3002}";

    #[rustfmt::skip]
    const TEST_BYTES1: [u8; 32] = [
        0, 155, 2, 103, 252, 105, 6, 107, 8, 147, 10, 111, 244, 113, 14, 141,
        16, 117, 238, 119, 20, 121, 22, 123, 232, 125, 26, 127, 228, 29, 226, 31,
    ];

    fn password1() -> Password {
        Password::new("aTestPassword")
    }

    fn password2() -> Password {
        Password::new("0123456789")
    }

    fn wrong_password() -> Password {
        Password::new("thisIsTheWrongPassword")
    }

    fn long_text() -> String {
        (0..100).map(|i| format!("{} {}", i, TEST_STRING1)).collect()
    }

    #[test]
    fn test_empty_plaintext() {
        let ciphertext = encrypt(b"", &password1()).unwrap();
        assert_eq!(ciphertext.len(), MIN_ENVELOPE_LEN);

        let decrypted = decrypt(&ciphertext, &password1()).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_text_roundtrip() {
        let cipher = EnvelopeCipher::new();
        let text = cipher.encrypt_text(TEST_STRING1, &password1()).unwrap();
        assert_eq!(cipher.decrypt_text(&text, &password1()).unwrap(), TEST_STRING1);
    }

    #[test]
    fn test_long_text_roundtrip() {
        let cipher = EnvelopeCipher::new();
        let plaintext = long_text();
        let text = cipher.encrypt_text(&plaintext, &password2()).unwrap();
        assert_eq!(cipher.decrypt_text(&text, &password2()).unwrap(), plaintext);
    }

    #[test]
    fn test_international_roundtrip() {
        let cipher = EnvelopeCipher::new();
        let moscow = Password::from_chars(&[
            '\u{041c}', '\u{043e}', '\u{0441}', '\u{043a}', '\u{0432}', '\u{0430}',
        ]);
        let text = cipher.encrypt_text(TEST_STRING2, &moscow).unwrap();
        assert_eq!(cipher.decrypt_text(&text, &moscow).unwrap(), TEST_STRING2);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let ciphertext = encrypt(&TEST_BYTES1, &password1()).unwrap();
        // 32 bytes of plaintext gain a full block of padding.
        assert_eq!(ciphertext.len(), SALT_LEN + IV_LEN + 48);
        assert_eq!(decrypt(&ciphertext, &password1()).unwrap(), TEST_BYTES1);
    }

    #[test]
    fn test_all_byte_values() {
        let plaintext: Vec<u8> = (0..=255).collect();
        let ciphertext = encrypt(&plaintext, &password1()).unwrap();
        assert_eq!(decrypt(&ciphertext, &password1()).unwrap(), plaintext);
    }

    /// Cost parameters cheap enough for loops over many random cases.
    fn fast_cipher() -> EnvelopeCipher {
        EnvelopeCipher::with_params(KdfParams::new(10, 8, 1))
    }

    /// Up to 24 arbitrary Unicode scalar values, possibly none.
    fn random_password(rng: &mut impl Rng) -> Password {
        let len = rng.gen_range(0..=24);
        let chars: Vec<char> = (0..len).map(|_| rng.r#gen::<char>()).collect();
        Password::from_chars(&chars)
    }

    #[test]
    fn test_random_bytes_every_length_up_to_fifty() {
        let mut rng = rand::thread_rng();
        let cipher = fast_cipher();
        for len in 0..=50usize {
            let mut plaintext = vec![0u8; len];
            rng.fill_bytes(&mut plaintext);
            let password = random_password(&mut rng);

            let envelope = cipher.encrypt(&plaintext, &password).unwrap();
            let padded = (len / BLOCK_LEN + 1) * BLOCK_LEN;
            assert_eq!(envelope.len(), SALT_LEN + IV_LEN + padded, "length {}", len);
            assert_eq!(
                cipher.decrypt(&envelope, &password).unwrap(),
                plaintext,
                "length {}",
                len
            );
        }
    }

    #[test]
    fn test_random_text_roundtrip() {
        let mut rng = rand::thread_rng();
        let cipher = fast_cipher();
        for _ in 0..16 {
            let len = rng.gen_range(0..200);
            let plaintext: String = (0..len).map(|_| rng.r#gen::<char>()).collect();
            let password = random_password(&mut rng);

            let text = cipher.encrypt_text(&plaintext, &password).unwrap();
            assert_eq!(cipher.decrypt_text(&text, &password).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_random_wrong_passwords_rejected() {
        const TRIALS: usize = 256;

        let mut rng = rand::thread_rng();
        let cipher = fast_cipher();
        let mut accepted = 0;
        for _ in 0..TRIALS {
            let right = random_password(&mut rng);
            let wrong = loop {
                let candidate = random_password(&mut rng);
                if candidate.as_bytes() != right.as_bytes() {
                    break candidate;
                }
            };
            let mut plaintext = vec![0u8; rng.gen_range(0..64)];
            rng.fill_bytes(&mut plaintext);

            let envelope = cipher.encrypt(&plaintext, &right).unwrap();
            match cipher.decrypt(&envelope, &wrong) {
                Ok(garbage) => {
                    assert_ne!(garbage, plaintext);
                    accepted += 1;
                }
                Err(err) => {
                    assert!(err.is_decryption_failure());
                    assert_eq!(err.kind, Some(ErrorKind::BadPadding));
                }
            }
        }
        // The padding check passes for roughly 1 wrong key in 256; allow a
        // wide margin so the test does not flake.
        assert!(accepted <= TRIALS / 20, "{} of {} wrong passwords accepted", accepted, TRIALS);
    }

    #[test]
    fn test_encryption_is_randomized() {
        let ct1 = encrypt(&TEST_BYTES1, &password1()).unwrap();
        let ct2 = encrypt(&TEST_BYTES1, &password1()).unwrap();

        assert_ne!(ct1, ct2);
        assert_ne!(ct1[..SALT_LEN], ct2[..SALT_LEN]);
        assert_ne!(
            ct1[SALT_LEN..SALT_LEN + IV_LEN],
            ct2[SALT_LEN..SALT_LEN + IV_LEN]
        );
    }

    #[test]
    fn test_deterministic_encryption() {
        let salt = [1u8; SALT_LEN];
        let iv = [2u8; IV_LEN];

        let ct1 = encrypt_with_salt_and_iv(b"hello world", &password1(), &salt, &iv).unwrap();
        let ct2 = encrypt_with_salt_and_iv(b"hello world", &password1(), &salt, &iv).unwrap();
        assert_eq!(ct1, ct2);
        assert_eq!(&ct1[..SALT_LEN], &salt);
        assert_eq!(&ct1[SALT_LEN..SALT_LEN + IV_LEN], &iv);
    }

    #[test]
    fn test_different_iv_different_ciphertext() {
        let salt = [1u8; SALT_LEN];

        let ct1 = encrypt_with_salt_and_iv(b"hello world", &password1(), &salt, &[2u8; IV_LEN])
            .unwrap();
        let ct2 = encrypt_with_salt_and_iv(b"hello world", &password1(), &salt, &[3u8; IV_LEN])
            .unwrap();
        assert_ne!(ct1, ct2);

        assert_eq!(decrypt(&ct1, &password1()).unwrap(), b"hello world");
        assert_eq!(decrypt(&ct2, &password1()).unwrap(), b"hello world");
    }

    // Wrong-password tests use fixed salt/IV: with a random envelope there
    // is a ~1/256 chance the padding happens to validate.

    #[test]
    fn test_wrong_password_bytes() {
        let ciphertext =
            encrypt_with_salt_and_iv(&TEST_BYTES1, &password1(), &[0x10; SALT_LEN], &[0x20; IV_LEN])
                .unwrap();
        let err = decrypt(&ciphertext, &wrong_password()).unwrap_err();

        assert!(err.is_decryption_failure());
        assert_eq!(err.kind, Some(ErrorKind::BadPadding));
        assert!(err.message().contains("could not decrypt"));
    }

    #[test]
    fn test_wrong_password_text() {
        let plaintext = long_text();
        let envelope = encrypt_with_salt_and_iv(
            plaintext.as_bytes(),
            &password2(),
            &[0x42; SALT_LEN],
            &[0x24; IV_LEN],
        )
        .unwrap();
        let text = encoding::to_text(&envelope);

        let err = EnvelopeCipher::new()
            .decrypt_text(&text, &wrong_password())
            .unwrap_err();
        assert!(err.is_decryption_failure());
        assert!(err.message().contains("could not decrypt"));
    }

    #[test]
    fn test_empty_envelope() {
        let err = decrypt(b"", &password1()).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(err.kind, Some(ErrorKind::TruncatedEnvelope));
        assert!(err.message().contains("while reading salt"));
    }

    #[test]
    fn test_truncated_iv() {
        let err = decrypt(&[0u8; SALT_LEN + 3], &password1()).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedEnvelope));
        assert!(err.message().contains("while reading iv"));
    }

    #[test]
    fn test_missing_ciphertext() {
        let err = decrypt(&[0u8; SALT_LEN + IV_LEN], &password1()).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedEnvelope));
        assert!(err.message().contains("while reading ciphertext"));
    }

    #[test]
    fn test_truncated_envelope() {
        let mut ciphertext = encrypt(b"hello", &password1()).unwrap();
        ciphertext.pop();

        let err = decrypt(&ciphertext, &password1()).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(err.kind, Some(ErrorKind::MisalignedCiphertext));
    }

    #[test]
    fn test_trailing_byte_rejected() {
        let mut ciphertext = encrypt(b"hello", &password1()).unwrap();
        ciphertext.push(0xFF);

        let err = decrypt(&ciphertext, &password1()).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::MisalignedCiphertext));
    }

    #[test]
    fn test_parse_borrows_fields() {
        let salt = [7u8; SALT_LEN];
        let iv = [9u8; IV_LEN];
        let envelope =
            encrypt_with_salt_and_iv(b"0123456789abcdef", &password1(), &salt, &iv).unwrap();

        let parts = EnvelopeParts::parse(&envelope).unwrap();
        assert_eq!(parts.salt, &salt);
        assert_eq!(parts.iv, &iv);
        assert_eq!(parts.ciphertext.len(), 2 * BLOCK_LEN);
    }

    #[test]
    fn test_bad_params_surface_before_work() {
        let cipher = EnvelopeCipher::with_params(KdfParams::new(30, 8, 1));
        let err = cipher.encrypt(b"data", &password1()).unwrap_err();
        assert_eq!(err.category, ErrorCategory::KdfParameters);

        // Structural checks run before the KDF.
        let err = cipher.decrypt(b"short", &password1()).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_cross_implementation_compatibility() {
        // Fixed salt and IV; expected bytes computed independently with
        // scrypt(N=16384, r=8, p=1) and AES-256-CBC/PKCS#7.
        let ciphertext = encrypt_with_salt_and_iv(
            b"test payload",
            &Password::new("test"),
            &[0x42; SALT_LEN],
            &[0x24; IV_LEN],
        )
        .unwrap();

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42,
            0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24,
            0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24,
            0x9d, 0xc3, 0x52, 0xf2, 0x13, 0x21, 0x91, 0x9c,
            0x19, 0xf1, 0x1c, 0xa9, 0x24, 0x6e, 0x01, 0x9d,
        ];
        assert_eq!(ciphertext, expected);

        let decrypted = decrypt(&ciphertext, &Password::new("test")).unwrap();
        assert_eq!(decrypted, b"test payload");
    }

    #[test]
    fn test_parallel_calls() {
        let cipher = fast_cipher();
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                std::thread::spawn(move || {
                    let password = Password::new(format!("password-{}", i));
                    let plaintext = vec![i; 100 + usize::from(i)];
                    let envelope = cipher.encrypt(&plaintext, &password).unwrap();
                    assert_eq!(cipher.decrypt(&envelope, &password).unwrap(), plaintext);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
