//! USM privacy: DES-CBC (RFC 3414 §8) and AES-CFB (RFC 3826) encrypt/decrypt.

use aes::{Aes128, Aes192, Aes256};
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use des::Des;
use getrandom::fill as getrandom_fill;

use crate::error::{CryptoErrorKind, Error, Result};

use super::{AuthProtocol, KeyExtension, PrivProtocol};

type DesCbcEnc = cbc::Encryptor<Des>;
type DesCbcDec = cbc::Decryptor<Des>;
type Aes128Cfb = cfb_mode::Encryptor<Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;
type Aes192Cfb = cfb_mode::Encryptor<Aes192>;
type Aes192CfbDec = cfb_mode::Decryptor<Aes192>;
type Aes256Cfb = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

/// A derived privacy key (16, 24, or 32 bytes depending on protocol).
///
/// For DES, the first 8 bytes are the DES key and the last 8 bytes are the
/// pre-IV XORed with the salt to form the actual IV (RFC 3414 §8.1.1.1).
#[derive(Clone)]
pub struct PrivKey {
    bytes: Vec<u8>,
}

impl PrivKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        PrivKey { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivKey({} bytes, redacted)", self.bytes.len())
    }
}

/// Errors specific to privacy (encryption/decryption) operations.
pub type PrivacyError = Error;

/// Result type for privacy operations.
pub type PrivacyResult<T> = Result<T>;

/// A monotonically increasing per-engine-boot counter used to build the
/// 8-byte salt (`privParameters`) that, combined with the engine boots
/// counter, must never repeat for a given localized key (RFC 3414 §8.1.1.1,
/// RFC 3826 §3.1.2).
#[derive(Debug)]
pub struct SaltCounter {
    local: u32,
}

impl SaltCounter {
    /// Seed the counter from the OS random source so restarts don't reuse
    /// the same salt sequence within the same engine-boots epoch.
    pub fn new() -> Self {
        let mut seed = [0u8; 4];
        let _ = getrandom_fill(&mut seed);
        SaltCounter {
            local: u32::from_be_bytes(seed),
        }
    }

    /// Produce the next 8-byte salt: `engine_boots (4 bytes BE) || local counter (4 bytes BE)`.
    pub fn next(&mut self, engine_boots: i32) -> [u8; 8] {
        let counter = self.local;
        self.local = self.local.wrapping_add(1);
        let mut salt = [0u8; 8];
        salt[..4].copy_from_slice(&(engine_boots as u32).to_be_bytes());
        salt[4..].copy_from_slice(&counter.to_be_bytes());
        salt
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Encrypt `plaintext` under `protocol` using `key`, producing the
/// ciphertext and the 8-byte `privParameters` salt to carry alongside it.
pub fn encrypt(
    protocol: PrivProtocol,
    key: &PrivKey,
    engine_boots: i32,
    engine_time: i32,
    salt: [u8; 8],
    plaintext: &[u8],
) -> PrivacyResult<Vec<u8>> {
    match protocol {
        PrivProtocol::Des => des_encrypt(key, &salt, plaintext),
        PrivProtocol::Des3 => Err(Error::encrypt(None, CryptoErrorKind::UnsupportedProtocol)),
        PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
            aes_cfb_apply(protocol, key, engine_boots, engine_time, &salt, plaintext, true)
        }
    }
}

/// Decrypt `ciphertext` under `protocol` using `key` and the
/// `privParameters` salt that accompanied it.
pub fn decrypt(
    protocol: PrivProtocol,
    key: &PrivKey,
    engine_boots: i32,
    engine_time: i32,
    priv_parameters: &[u8],
    ciphertext: &[u8],
) -> PrivacyResult<Vec<u8>> {
    if priv_parameters.len() != 8 {
        return Err(Error::decrypt(
            None,
            CryptoErrorKind::InvalidPrivParamsLength {
                expected: 8,
                actual: priv_parameters.len(),
            },
        ));
    }
    let mut salt = [0u8; 8];
    salt.copy_from_slice(priv_parameters);

    match protocol {
        PrivProtocol::Des => des_decrypt(key, &salt, ciphertext),
        PrivProtocol::Des3 => Err(Error::decrypt(None, CryptoErrorKind::UnsupportedProtocol)),
        PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
            aes_cfb_apply(protocol, key, engine_boots, engine_time, &salt, ciphertext, false)
        }
    }
}

fn des_encrypt(key: &PrivKey, salt: &[u8; 8], plaintext: &[u8]) -> PrivacyResult<Vec<u8>> {
    let (des_key, iv) = des_key_and_iv(key, salt)?;

    let padded_len = plaintext.len().div_ceil(8) * 8;
    let mut buf = vec![0u8; padded_len];
    buf[..plaintext.len()].copy_from_slice(plaintext);

    let enc = DesCbcEnc::new_from_slices(&des_key, &iv)
        .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
    enc.encrypt_padded_mut::<cipher::block_padding::NoPadding>(&mut buf, plaintext.len())
        .map_err(|_| Error::encrypt(None, CryptoErrorKind::CipherError))?;
    Ok(buf)
}

fn des_decrypt(key: &PrivKey, salt: &[u8; 8], ciphertext: &[u8]) -> PrivacyResult<Vec<u8>> {
    if ciphertext.len() % 8 != 0 {
        return Err(Error::decrypt(
            None,
            CryptoErrorKind::InvalidCiphertextLength {
                length: ciphertext.len(),
                block_size: 8,
            },
        ));
    }
    let (des_key, iv) = des_key_and_iv(key, salt)?;

    let mut buf = ciphertext.to_vec();
    let dec = DesCbcDec::new_from_slices(&des_key, &iv)
        .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
    let plain = dec
        .decrypt_padded_mut::<cipher::block_padding::NoPadding>(&mut buf)
        .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidPadding))?;
    let len = plain.len();
    buf.truncate(len);
    Ok(buf)
}

fn des_key_and_iv(key: &PrivKey, salt: &[u8; 8]) -> PrivacyResult<([u8; 8], [u8; 8])> {
    let bytes = key.as_bytes();
    if bytes.len() < 16 {
        return Err(Error::encrypt(None, CryptoErrorKind::InvalidKeyLength));
    }
    let mut des_key = [0u8; 8];
    des_key.copy_from_slice(&bytes[..8]);
    let mut pre_iv = [0u8; 8];
    pre_iv.copy_from_slice(&bytes[8..16]);
    let mut iv = [0u8; 8];
    for i in 0..8 {
        iv[i] = pre_iv[i] ^ salt[i];
    }
    Ok((des_key, iv))
}

#[allow(clippy::too_many_arguments)]
fn aes_cfb_apply(
    protocol: PrivProtocol,
    key: &PrivKey,
    engine_boots: i32,
    engine_time: i32,
    salt: &[u8; 8],
    data: &[u8],
    encrypting: bool,
) -> PrivacyResult<Vec<u8>> {
    let bytes = key.as_bytes();
    let key_len = protocol.key_len();
    if bytes.len() < key_len {
        return Err(Error::encrypt(None, CryptoErrorKind::InvalidKeyLength));
    }

    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&(engine_boots as u32).to_be_bytes());
    iv[4..8].copy_from_slice(&(engine_time as u32).to_be_bytes());
    iv[8..].copy_from_slice(salt);

    let mut buf = data.to_vec();
    macro_rules! run {
        ($Enc:ty, $Dec:ty) => {{
            if encrypting {
                let mut stream = <$Enc>::new_from_slices(&bytes[..key_len], &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                stream.apply_keystream(&mut buf);
            } else {
                let mut stream = <$Dec>::new_from_slices(&bytes[..key_len], &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                stream.apply_keystream(&mut buf);
            }
        }};
    }
    match protocol {
        PrivProtocol::Aes128 => run!(Aes128Cfb, Aes128CfbDec),
        PrivProtocol::Aes192 => run!(Aes192Cfb, Aes192CfbDec),
        PrivProtocol::Aes256 => run!(Aes256Cfb, Aes256CfbDec),
        PrivProtocol::Des | PrivProtocol::Des3 => unreachable!("only called for AES variants"),
    }
    Ok(buf)
}

/// Extend a localized authentication key to the byte length a privacy
/// protocol requires, for auth-digest/privacy-key combinations where the
/// digest is shorter than the required key (AES-192/256, 3DES).
///
/// This follows the chained-relocalization construction described for
/// AES in draft-blumenthal-aes-usm-04 §3.1.2.1 and, by the same principle,
/// applied here to 3DES: repeatedly re-hash the growing key material with
/// the auth protocol's digest until there is enough, then truncate. This
/// is not bit-for-bit validated against any single vendor's implementation
/// of the draft; it is a faithful reading of the algorithm's description
/// rather than a port of a reference implementation.
pub(crate) fn extend_key(
    extension: KeyExtension,
    auth_protocol: AuthProtocol,
    localized_auth_key: &[u8],
    engine_id: &[u8],
    needed_len: usize,
) -> Vec<u8> {
    if extension == KeyExtension::None {
        return localized_auth_key[..needed_len.min(localized_auth_key.len())].to_vec();
    }

    let mut material = localized_auth_key.to_vec();
    while material.len() < needed_len {
        let extra = super::auth::localize_for_extension(auth_protocol, &material, engine_id);
        material.extend_from_slice(&extra);
    }
    material.truncate(needed_len);
    material
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn des_cbc_roundtrip() {
        let key = PrivKey::from_bytes(vec![1u8; 16]);
        let salt = [0u8, 0, 0, 1, 0, 0, 0, 7];
        let plaintext = b"hello snmp privacy!!!!!"; // 23 bytes, needs padding
        let ct = encrypt(PrivProtocol::Des, &key, 1, 0, salt, plaintext).unwrap();
        assert_eq!(ct.len() % 8, 0);
        let pt = decrypt(PrivProtocol::Des, &key, 1, 0, &salt, &ct).unwrap();
        assert_eq!(&pt[..plaintext.len()], plaintext);
    }

    #[test]
    fn aes128_cfb_roundtrip() {
        let key = PrivKey::from_bytes(vec![2u8; 16]);
        let salt = [0, 0, 0, 1, 0, 0, 0, 1];
        let plaintext = b"arbitrary length payload, not block aligned";
        let ct = encrypt(PrivProtocol::Aes128, &key, 1, 100, salt, plaintext).unwrap();
        assert_eq!(ct.len(), plaintext.len());
        let pt = decrypt(PrivProtocol::Aes128, &key, 1, 100, &salt, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn aes256_cfb_roundtrip() {
        let key = PrivKey::from_bytes(vec![3u8; 32]);
        let salt = [0, 0, 0, 2, 0, 0, 0, 9];
        let plaintext = b"another payload";
        let ct = encrypt(PrivProtocol::Aes256, &key, 2, 50, salt, plaintext).unwrap();
        let pt = decrypt(PrivProtocol::Aes256, &key, 2, 50, &salt, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn salt_counter_increments_and_varies() {
        let mut counter = SaltCounter::new();
        let a = counter.next(5);
        let b = counter.next(5);
        assert_eq!(&a[..4], &5u32.to_be_bytes()[..]);
        assert_ne!(a, b);
    }

    #[test]
    fn des_rejects_bad_priv_params_length() {
        let key = PrivKey::from_bytes(vec![1u8; 16]);
        let err = decrypt(PrivProtocol::Des, &key, 1, 0, &[0u8; 4], &[0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            Error::DecryptionFailed {
                kind: CryptoErrorKind::InvalidPrivParamsLength { .. },
                ..
            }
        ));
    }
}
