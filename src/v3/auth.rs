//! USM authentication: key derivation and HMAC (RFC 3414 §2.6, RFC 7860).

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{AuthErrorKind, Error, Result};

use super::AuthProtocol;

/// Length of the `msgAuthenticationParameters` placeholder written during
/// encoding and overwritten with the real HMAC once the message is
/// otherwise complete (RFC 3414 §6.3.1).
pub const AUTH_PARAMS_PLACEHOLDER_LEN: usize = 12;

const ONE_MEGABYTE: usize = 1_048_576;

/// A password-derived master key, not yet localized to a specific engine.
#[derive(Clone)]
pub struct MasterKey(Vec<u8>);

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl MasterKey {
    /// Derive a master key from a password using the RFC 3414 Appendix A.2
    /// password-to-key algorithm: the password is cycled to fill a
    /// 1 MiB buffer, which is then digested.
    pub fn from_password(protocol: AuthProtocol, password: &[u8]) -> Result<Self> {
        if password.is_empty() {
            return Err(Error::auth(None, AuthErrorKind::NoCredentials));
        }
        Ok(MasterKey(password_to_key(protocol, password)))
    }

    /// Localize this master key to a specific SNMP engine (RFC 3414
    /// Appendix A.2): `Kul = H(Ku || engineID || Ku)`.
    pub fn localize(&self, protocol: AuthProtocol, engine_id: &[u8]) -> LocalizedKey {
        LocalizedKey(localize_key(protocol, &self.0, engine_id))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A master key localized to a specific authoritative engine.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalizedKey(Vec<u8>);

impl Drop for LocalizedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl LocalizedKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wrap raw key bytes directly (used by the Blumenthal/Reeder privacy
    /// key extension algorithms, which derive extra key material from an
    /// already-localized auth key rather than from a password).
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        LocalizedKey(bytes)
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalizedKey({} bytes, redacted)", self.0.len())
    }
}

/// Localized authentication and privacy keys for one USM user, derived
/// together from their respective passwords.
pub struct MasterKeys {
    pub auth: Option<LocalizedKey>,
    pub priv_key: Option<LocalizedKey>,
}

impl MasterKeys {
    /// Derive the localized auth and privacy keys for a USM user.
    ///
    /// RFC 3414 requires the privacy password to be hashed with the *auth*
    /// protocol's digest algorithm, even though the two may differ
    /// conceptually; there is no separate "privacy hash algorithm".
    pub fn derive(
        auth_protocol: Option<AuthProtocol>,
        auth_password: Option<&[u8]>,
        priv_protocol: Option<super::PrivProtocol>,
        priv_password: Option<&[u8]>,
        engine_id: &[u8],
    ) -> Result<Self> {
        let auth = match (auth_protocol, auth_password) {
            (Some(protocol), Some(password)) => {
                let master = MasterKey::from_password(protocol, password)?;
                Some(master.localize(protocol, engine_id))
            }
            _ => None,
        };

        let priv_key = match (priv_protocol, priv_password, auth_protocol) {
            (Some(priv_protocol), Some(password), Some(auth_protocol)) => {
                let master = MasterKey::from_password(auth_protocol, password)?;
                let localized = master.localize(auth_protocol, engine_id);
                let needed = priv_protocol.key_len();
                let extension = priv_protocol.key_extension_for(auth_protocol);
                let extended = super::privacy::extend_key(
                    extension,
                    auth_protocol,
                    localized.as_bytes(),
                    engine_id,
                    needed,
                );
                Some(LocalizedKey::from_raw(extended))
            }
            _ => None,
        };

        Ok(MasterKeys { auth, priv_key })
    }
}

/// Compute the HMAC over `data` using `key`, truncated to the protocol's
/// `mac_len()`.
pub(crate) fn compute_hmac(protocol: AuthProtocol, key: &[u8], data: &[u8]) -> Vec<u8> {
    macro_rules! hmac_digest {
        ($H:ty) => {{
            let mut mac = <Hmac<$H>>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }};
    }
    let full = match protocol {
        AuthProtocol::Md5 => hmac_digest!(Md5),
        AuthProtocol::Sha1 => hmac_digest!(Sha1),
        AuthProtocol::Sha224 => hmac_digest!(Sha224),
        AuthProtocol::Sha256 => hmac_digest!(Sha256),
        AuthProtocol::Sha384 => hmac_digest!(Sha384),
        AuthProtocol::Sha512 => hmac_digest!(Sha512),
    };
    full[..protocol.mac_len()].to_vec()
}

/// Verify a received `msgAuthenticationParameters` value against the
/// expected HMAC of `data` (the whole message with the auth-params span
/// zeroed out), using constant-time comparison.
pub(crate) fn verify_hmac(protocol: AuthProtocol, key: &[u8], data: &[u8], received: &[u8]) -> bool {
    if received.len() != protocol.mac_len() {
        return false;
    }
    let expected = compute_hmac(protocol, key, data);
    expected.ct_eq(received).into()
}

fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    macro_rules! expand {
        ($H:ty) => {{
            use digest::Digest;
            let mut hasher = <$H>::new();
            let mut count = 0usize;
            let mut chunk = [0u8; 64];
            while count < ONE_MEGABYTE {
                for (i, slot) in chunk.iter_mut().enumerate() {
                    *slot = password[(count + i) % password.len()];
                }
                let take = chunk.len().min(ONE_MEGABYTE - count);
                hasher.update(&chunk[..take]);
                count += take;
            }
            hasher.finalize().to_vec()
        }};
    }
    match protocol {
        AuthProtocol::Md5 => expand!(Md5),
        AuthProtocol::Sha1 => expand!(Sha1),
        AuthProtocol::Sha224 => expand!(Sha224),
        AuthProtocol::Sha256 => expand!(Sha256),
        AuthProtocol::Sha384 => expand!(Sha384),
        AuthProtocol::Sha512 => expand!(Sha512),
    }
}

/// Re-localize arbitrary key material against an engine ID, used by the
/// privacy key extension algorithms to grow key material past the auth
/// digest's natural length.
pub(crate) fn localize_for_extension(protocol: AuthProtocol, key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    localize_key(protocol, key, engine_id)
}

fn localize_key(protocol: AuthProtocol, key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    macro_rules! localize {
        ($H:ty) => {{
            use digest::Digest;
            let mut hasher = <$H>::new();
            hasher.update(key);
            hasher.update(engine_id);
            hasher.update(key);
            hasher.finalize().to_vec()
        }};
    }
    match protocol {
        AuthProtocol::Md5 => localize!(Md5),
        AuthProtocol::Sha1 => localize!(Sha1),
        AuthProtocol::Sha224 => localize!(Sha224),
        AuthProtocol::Sha256 => localize!(Sha256),
        AuthProtocol::Sha384 => localize!(Sha384),
        AuthProtocol::Sha512 => localize!(Sha512),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 3414 Appendix A.3.1: password "maplesyrup" with MD5 localizes to
    /// engineID `00 00 00 00 00 00 00 00 00 00 00 02` to the well-known key
    /// below.
    #[test]
    fn rfc3414_md5_password_to_key_vector() {
        let master = MasterKey::from_password(AuthProtocol::Md5, b"maplesyrup").unwrap();
        let expected = [
            0x9f, 0x9f, 0x58, 0x80, 0x10, 0xca, 0x68, 0xa1, 0xcd, 0xcf, 0x97, 0xc6, 0xa1, 0x3f,
            0xb3, 0xaf,
        ];
        assert_eq!(master.as_bytes(), &expected);
    }

    #[test]
    fn rfc3414_md5_localized_key_vector() {
        let master = MasterKey::from_password(AuthProtocol::Md5, b"maplesyrup").unwrap();
        let engine_id = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2];
        let localized = master.localize(AuthProtocol::Md5, &engine_id);
        let expected = [
            0x52, 0x6f, 0x5e, 0xed, 0x9f, 0xcc, 0xe2, 0x6f, 0x89, 0x64, 0xc2, 0x93, 0x07, 0x87,
            0xd8, 0x2b,
        ];
        assert_eq!(localized.as_bytes(), &expected);
    }

    #[test]
    fn hmac_roundtrip_verifies() {
        let key = b"0123456789abcdef0123456789abcdef";
        let data = b"hello snmp message";
        let mac = compute_hmac(AuthProtocol::Sha256, key, data);
        assert_eq!(mac.len(), AuthProtocol::Sha256.mac_len());
        assert!(verify_hmac(AuthProtocol::Sha256, key, data, &mac));
    }

    #[test]
    fn hmac_rejects_tampered_data() {
        let key = b"0123456789abcdef0123456789abcdef";
        let mac = compute_hmac(AuthProtocol::Sha1, key, b"original");
        assert!(!verify_hmac(AuthProtocol::Sha1, key, b"tampered", &mac));
    }

    #[test]
    fn empty_password_rejected() {
        assert!(MasterKey::from_password(AuthProtocol::Sha256, b"").is_err());
    }

    #[test]
    fn derive_auth_only() {
        let keys = MasterKeys::derive(
            Some(AuthProtocol::Sha256),
            Some(b"authpassword"),
            None,
            None,
            b"engine-id-bytes",
        )
        .unwrap();
        assert!(keys.auth.is_some());
        assert!(keys.priv_key.is_none());
        assert_eq!(keys.auth.unwrap().len(), AuthProtocol::Sha256.digest_len());
    }

    #[test]
    fn derive_auth_and_priv_extends_key_for_aes256() {
        let keys = MasterKeys::derive(
            Some(AuthProtocol::Sha1),
            Some(b"authpassword"),
            Some(crate::v3::PrivProtocol::Aes256),
            Some(b"privpassword"),
            b"engine-id-bytes",
        )
        .unwrap();
        let priv_key = keys.priv_key.unwrap();
        assert_eq!(priv_key.len(), 32);
    }
}
