//! Single-target SNMP client.
//!
//! Speaks v1/v2c (RFC 1157, RFC 1905, RFC 3416) and v3 with USM
//! authentication and privacy (RFC 3414, RFC 3826, RFC 7860). One [`Client`]
//! owns one [`Transport`] and one correlation counter; [`crate::multi`] fans
//! requests out across many of them.

pub mod builder;
mod options;
mod walk;

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::ber::Decoder;
use crate::error::{AuthErrorKind, CryptoErrorKind, Error, ErrorStatus, Result};
use crate::message::{MessageData, ScopedPdu, SecurityLevel, SnmpMessage};
use crate::oid::Oid;
use crate::pdu::{ErrorInfo, Pdu, PduType};
use crate::transport::Transport;
use crate::v3::auth::{AUTH_PARAMS_PLACEHOLDER_LEN, compute_hmac, verify_hmac};
use crate::v3::usm::UsmSecurityParams;
use crate::v3::{self, AuthProtocol, EngineCache, EngineState, MasterKeys, PrivKey, PrivProtocol, SaltCounter};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

pub use options::RequestOptions;
pub use walk::{BulkWalk, Walk};

/// USM security configuration for one v3 user: a username plus optional
/// auth and privacy protocol/password pairs.
///
/// Built via [`V3SecurityConfig::new`] and the consuming `.auth()`/
/// `.privacy()` methods; the resulting security level is derived from which
/// of the two are present.
#[derive(Clone)]
pub struct V3SecurityConfig {
    pub(crate) username: Bytes,
    pub(crate) auth: Option<(AuthProtocol, Vec<u8>)>,
    pub(crate) priv_: Option<(PrivProtocol, Vec<u8>)>,
}

impl V3SecurityConfig {
    pub fn new(username: impl Into<Bytes>) -> Self {
        V3SecurityConfig { username: username.into(), auth: None, priv_: None }
    }

    /// Add authentication. Security level becomes authNoPriv unless
    /// [`.privacy()`](Self::privacy) is also called.
    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    /// Add privacy. Only meaningful once [`.auth()`](Self::auth) has been
    /// called; privacy without authentication isn't a valid USM security
    /// level and is silently treated as authPriv once both are present.
    pub fn privacy(mut self, protocol: PrivProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.priv_ = Some((protocol, password.into()));
        self
    }

    fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.priv_) {
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (None, _) => SecurityLevel::NoAuthNoPriv,
        }
    }
}

impl fmt::Debug for V3SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("V3SecurityConfig")
            .field("username", &self.username)
            .field("auth_protocol", &self.auth.as_ref().map(|(p, _)| p))
            .field("priv_protocol", &self.priv_.as_ref().map(|(p, _)| p))
            .finish_non_exhaustive()
    }
}

/// Configuration for a [`Client`].
#[derive(Clone)]
pub struct ClientConfig {
    pub version: Version,
    pub community: Bytes,
    pub timeout: Duration,
    pub retries: u32,
    pub max_oids_per_request: usize,
    pub v3_security: Option<V3SecurityConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(5),
            retries: 3,
            max_oids_per_request: 10,
            v3_security: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("version", &self.version)
            .field("community", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("max_oids_per_request", &self.max_oids_per_request)
            .field("v3_security", &self.v3_security)
            .finish()
    }
}

/// Localized keys and privacy salt state for one v3 user, derived lazily the
/// first time engine discovery completes.
struct V3State {
    security: V3SecurityConfig,
    keys: Mutex<Option<MasterKeys>>,
    salt: Mutex<SaltCounter>,
}

struct Inner<T> {
    transport: T,
    config: ClientConfig,
    request_id: AtomicI32,
    engine_cache: Arc<EngineCache>,
    v3_state: Option<V3State>,
}

/// A single-target SNMP client.
///
/// Cheaply `Clone`-able: clones share the same transport, configuration, and
/// engine cache through an inner `Arc`. Construct one via the typestate
/// builders in [`builder`] (`Client::v1()` / `Client::v2c()` / `Client::v3()`),
/// or directly with [`Client::new`] for a pre-built [`Transport`] and
/// [`ClientConfig`].
pub struct Client<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Client { inner: Arc::clone(&self.inner) }
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("version", &self.inner.config.version)
            .field("timeout", &self.inner.config.timeout)
            .field("retries", &self.inner.config.retries)
            .finish()
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self::with_engine_cache(transport, config, Arc::new(EngineCache::new()))
    }

    /// Construct a client that shares `engine_cache` with other clients —
    /// useful when polling many v3 targets so discovered engine state
    /// doesn't have to be rediscovered per client.
    pub fn with_engine_cache(transport: T, config: ClientConfig, engine_cache: Arc<EngineCache>) -> Self {
        let v3_state = config.v3_security.clone().map(|security| V3State {
            security,
            keys: Mutex::new(None),
            salt: Mutex::new(SaltCounter::new()),
        });
        Client { inner: Arc::new(Inner { transport, config, request_id: AtomicI32::new(1), engine_cache, v3_state }) }
    }

    /// The address this client talks to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.transport.peer_addr()
    }

    /// The SNMP version this client is configured for.
    pub fn version(&self) -> Version {
        self.inner.config.version
    }

    /// Cancel an outstanding request by its request ID.
    ///
    /// A waiter blocked in the corresponding `get`/`get_next`/`get_bulk`/`set`
    /// call resolves with [`Error::Cancelled`] instead of a response or
    /// timeout. Only meaningful on transports with a persistent waiter
    /// registry (e.g. [`SharedUdpHandle`](crate::transport::SharedUdpHandle));
    /// see [`Transport::cancel`]. Returns `false` if no request with that ID
    /// is currently outstanding.
    pub fn cancel(&self, request_id: i32) -> bool {
        self.inner.transport.cancel(request_id)
    }

    /// Build a client reflecting `opts` layered on top of this client's base
    /// configuration, sharing the same transport and engine cache. Used by
    /// the multi-target executor to apply per-operation overrides without
    /// reconnecting.
    pub fn with_options(&self, opts: &RequestOptions) -> Client<T> {
        let mut config = self.inner.config.clone();
        if let Some(version) = opts.version {
            config.version = version;
        }
        if let Some(community) = &opts.community {
            config.community = community.clone();
        }
        if let Some(timeout) = opts.timeout {
            config.timeout = timeout;
        }
        if let Some(retries) = opts.retries {
            config.retries = retries;
        }
        if opts.user.is_some() || opts.auth_protocol.is_some() || opts.priv_protocol.is_some() {
            let username = opts
                .user
                .clone()
                .or_else(|| config.v3_security.as_ref().map(|s| s.username.clone()))
                .unwrap_or_default();
            let mut security = V3SecurityConfig::new(username);
            if let (Some(protocol), Some(password)) = (opts.auth_protocol, opts.auth_password.clone()) {
                security = security.auth(protocol, password);
            }
            if let (Some(protocol), Some(password)) = (opts.priv_protocol, opts.priv_password.clone()) {
                security = security.privacy(protocol, password);
            }
            config.v3_security = Some(security);
        }
        Client::with_engine_cache(self.inner.transport.clone(), config, Arc::clone(&self.inner.engine_cache))
    }

    fn next_request_id(&self) -> i32 {
        self.inner.transport.alloc_request_id().unwrap_or_else(|| self.inner.request_id.fetch_add(1, Ordering::Relaxed))
    }

    /// GET one or more OIDs.
    pub async fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        let varbinds = oids.iter().cloned().map(VarBind::null).collect();
        let request_id = self.next_request_id();
        let pdu = Pdu::request(PduType::GetRequest, request_id, varbinds);
        let response = self.roundtrip(pdu).await?;
        self.check_error_status(&response)?;
        Ok(response.varbinds)
    }

    /// GETNEXT a single OID; used internally by [`Walk`] but also useful
    /// standalone.
    pub async fn get_next(&self, oid: &Oid) -> Result<VarBind> {
        let request_id = self.next_request_id();
        let pdu = Pdu::request(PduType::GetNextRequest, request_id, vec![VarBind::null(oid.clone())]);
        let response = self.roundtrip(pdu).await?;
        self.check_error_status(&response)?;
        response.varbinds.into_iter().next().ok_or_else(|| Error::MalformedResponse {
            target: Some(self.peer_addr()),
            reason: "GETNEXT response carried no varbinds".into(),
        })
    }

    /// GETBULK; rejected outright on v1 targets, which have no such PDU.
    pub async fn get_bulk(&self, oids: &[Oid], non_repeaters: i32, max_repetitions: i32) -> Result<Vec<VarBind>> {
        if self.inner.config.version == Version::V1 {
            return Err(Error::InvalidVersionForBulk { version: Version::V1 });
        }
        let varbinds = oids.iter().cloned().map(VarBind::null).collect();
        let request_id = self.next_request_id();
        let pdu = Pdu::get_bulk(request_id, non_repeaters, max_repetitions, varbinds);
        let response = self.roundtrip(pdu).await?;
        self.check_error_status(&response)?;
        Ok(response.varbinds)
    }

    /// SET one or more varbinds.
    pub async fn set(&self, varbinds: Vec<VarBind>) -> Result<Vec<VarBind>> {
        let request_id = self.next_request_id();
        let pdu = Pdu::request(PduType::SetRequest, request_id, varbinds);
        let response = self.roundtrip(pdu).await?;
        self.check_error_status(&response)?;
        Ok(response.varbinds)
    }

    /// Walk the subtree rooted at `oid` using repeated GETNEXT.
    pub fn walk(&self, oid: Oid) -> Walk<T> {
        Walk::new(self.clone(), oid)
    }

    /// Walk the subtree rooted at `oid` using GETBULK batches of
    /// `max_repetitions` varbinds per round trip.
    pub fn bulk_walk(&self, oid: Oid, max_repetitions: i32) -> BulkWalk<T> {
        BulkWalk::new(self.clone(), oid, max_repetitions)
    }

    fn check_error_status(&self, pdu: &Pdu) -> Result<()> {
        if let ErrorInfo::Standard { error_status, error_index } = pdu.error_info {
            if error_status != ErrorStatus::NoError {
                let oid = if error_index > 0 {
                    pdu.varbinds.get((error_index - 1) as usize).map(|vb| vb.oid.clone())
                } else {
                    None
                };
                return Err(Error::Snmp {
                    target: Some(self.peer_addr()),
                    status: error_status,
                    index: error_index.max(0) as u32,
                    oid,
                });
            }
        }
        Ok(())
    }

    async fn roundtrip(&self, pdu: Pdu) -> Result<Pdu> {
        match self.inner.config.version {
            Version::V1 | Version::V2c => self.roundtrip_community(pdu).await,
            Version::V3 => self.roundtrip_v3(pdu).await,
        }
    }

    async fn roundtrip_community(&self, pdu: Pdu) -> Result<Pdu> {
        let request_id = pdu.request_id;
        let msg = SnmpMessage::community(self.inner.config.version, self.inner.config.community.clone(), pdu);
        let encoded = msg.encode();
        let response_bytes = self.send_with_retries(&encoded.bytes, request_id).await?;
        let response = SnmpMessage::decode(&response_bytes)?;
        self.extract_response_pdu(response, request_id)
    }

    fn extract_response_pdu(&self, message: SnmpMessage, request_id: i32) -> Result<Pdu> {
        if message.version != self.inner.config.version {
            return Err(Error::VersionMismatch { expected: self.inner.config.version, actual: message.version });
        }
        let pdu = message.pdu().ok_or_else(|| Error::MalformedResponse {
            target: Some(self.peer_addr()),
            reason: "response had no decodable PDU".into(),
        })?;
        if pdu.pdu_type != PduType::Response {
            return Err(Error::MalformedResponse {
                target: Some(self.peer_addr()),
                reason: format!("expected Response PDU, got {:?}", pdu.pdu_type),
            });
        }
        if pdu.request_id != request_id {
            return Err(Error::RequestIdMismatch { expected: request_id, actual: pdu.request_id });
        }
        Ok(pdu.clone())
    }

    /// Send `bytes` and await a matching response, retrying on timeout up to
    /// `config.retries` times. Stream transports ([`Transport::is_stream`])
    /// never retry: a broken TCP connection surfaces as an I/O error, not a
    /// timeout, so one attempt is always enough.
    async fn send_with_retries(&self, bytes: &Bytes, request_id: i32) -> Result<Bytes> {
        let transport = &self.inner.transport;
        let max_attempts = if transport.is_stream() { 1 } else { self.inner.config.retries + 1 };
        let mut last_err = None;
        for attempt in 0..max_attempts {
            transport.send(bytes).await?;
            match transport.recv(request_id, self.inner.config.timeout).await {
                Ok((data, _addr)) => return Ok(data),
                Err(Error::Timeout { target, elapsed, request_id: rid, .. }) => {
                    tracing::debug!(snmp.request_id = request_id, attempt, "retrying after timeout");
                    last_err = Some(Error::Timeout { target, elapsed, request_id: rid, retries: attempt });
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(Error::SocketUnavailable { target: Some(transport.peer_addr()) }))
    }

    async fn ensure_engine(&self, target: SocketAddr) -> Result<EngineState> {
        if let Some(state) = self.inner.engine_cache.get(target) {
            return Ok(state);
        }
        self.discover_engine(target).await
    }

    /// RFC 3414 §4 engine discovery: an empty-engine-id, noAuthNoPriv,
    /// reportable GET whose sole purpose is to provoke a Report PDU
    /// carrying the agent's authoritative engine ID/boots/time.
    async fn discover_engine(&self, target: SocketAddr) -> Result<EngineState> {
        let v3_state = self.inner.v3_state.as_ref().expect("discover_engine only called on v3 clients");
        let msg_id = self.next_request_id();
        let pdu = Pdu::request(PduType::GetRequest, msg_id, Vec::new());
        let scoped_pdu = ScopedPdu::Plaintext { context_engine_id: Bytes::new(), context_name: Bytes::new(), pdu };
        let security_params =
            UsmSecurityParams { user_name: v3_state.security.username.clone(), ..UsmSecurityParams::discovery() };
        let message = SnmpMessage {
            version: Version::V3,
            data: MessageData::V3 {
                msg_id,
                msg_max_size: v3::DEFAULT_MSG_MAX_SIZE,
                security_level: SecurityLevel::NoAuthNoPriv,
                reportable: true,
                security_params,
                scoped_pdu,
            },
        };
        let encoded = message.encode();
        let response_bytes = match self.send_with_retries(&encoded.bytes, msg_id).await {
            Ok(bytes) => bytes,
            Err(Error::Timeout { .. }) => return Err(Error::DiscoveryTimeout { target }),
            Err(e) => return Err(e),
        };
        let (engine_id, engine_boots, engine_time) =
            v3::parse_discovery_response(&response_bytes).map_err(|_| Error::DiscoveryRejected { target })?;
        let state = EngineState::new(engine_id, engine_boots, engine_time);
        self.inner.engine_cache.insert(target, state.clone());
        Ok(state)
    }

    fn ensure_keys(&self, v3_state: &V3State, engine_id: &Bytes) -> Result<()> {
        let mut guard = v3_state.keys.lock().unwrap();
        if guard.is_some() {
            return Ok(());
        }
        let security = &v3_state.security;
        let auth_protocol = security.auth.as_ref().map(|(p, _)| *p);
        let auth_password = security.auth.as_ref().map(|(_, pw)| pw.as_slice());
        let priv_protocol = security.priv_.as_ref().map(|(p, _)| *p);
        let priv_password = security.priv_.as_ref().map(|(_, pw)| pw.as_slice());
        let keys = MasterKeys::derive(auth_protocol, auth_password, priv_protocol, priv_password, engine_id)?;
        *guard = Some(keys);
        Ok(())
    }

    async fn roundtrip_v3(&self, pdu: Pdu) -> Result<Pdu> {
        let v3_state = self.inner.v3_state.as_ref().ok_or_else(|| Error::auth(None, AuthErrorKind::NoCredentials))?;
        let target = self.peer_addr();

        let engine = self.ensure_engine(target).await?;
        self.ensure_keys(v3_state, &engine.engine_id)?;

        match self.send_v3(pdu.clone(), v3_state, &engine).await {
            Err(Error::NotInTimeWindow { .. }) => {
                self.inner.engine_cache.remove(target);
                let engine = self.ensure_engine(target).await?;
                self.send_v3(pdu, v3_state, &engine).await
            }
            other => other,
        }
    }

    async fn send_v3(&self, pdu: Pdu, v3_state: &V3State, engine: &EngineState) -> Result<Pdu> {
        let target = self.peer_addr();
        let security_level = v3_state.security.security_level();
        let request_id = pdu.request_id;

        let (auth_key, priv_key) = {
            let guard = v3_state.keys.lock().unwrap();
            let keys = guard.as_ref().expect("ensure_keys runs before send_v3");
            (keys.auth.clone(), keys.priv_key.clone())
        };

        if security_level.requires_auth() && auth_key.is_none() {
            return Err(Error::auth(Some(target), AuthErrorKind::NoAuthKey));
        }
        if security_level.requires_priv() && priv_key.is_none() {
            return Err(Error::encrypt(Some(target), CryptoErrorKind::NoPrivKey));
        }

        let plaintext_scoped =
            ScopedPdu::Plaintext { context_engine_id: engine.engine_id.clone(), context_name: Bytes::new(), pdu };

        let (scoped_pdu, priv_parameters) = if security_level.requires_priv() {
            let priv_protocol = v3_state.security.priv_.as_ref().unwrap().0;
            let salt = v3_state.salt.lock().unwrap().next(engine.engine_boots);
            let plaintext_bytes = plaintext_scoped.encode_plaintext_bytes();
            let priv_key_bytes = PrivKey::from_bytes(priv_key.as_ref().unwrap().as_bytes().to_vec());
            let ciphertext = v3::encrypt(
                priv_protocol,
                &priv_key_bytes,
                engine.engine_boots,
                engine.estimated_time(),
                salt,
                &plaintext_bytes,
            )?;
            (ScopedPdu::Encrypted(Bytes::from(ciphertext)), Bytes::copy_from_slice(&salt))
        } else {
            (plaintext_scoped, Bytes::new())
        };

        let auth_protocol = v3_state.security.auth.as_ref().map(|(p, _)| *p);
        let auth_parameters = if security_level.requires_auth() {
            Bytes::copy_from_slice(&[0u8; AUTH_PARAMS_PLACEHOLDER_LEN])
        } else {
            Bytes::new()
        };

        let security_params = UsmSecurityParams {
            authoritative_engine_id: engine.engine_id.clone(),
            authoritative_engine_boots: engine.engine_boots,
            authoritative_engine_time: engine.estimated_time(),
            user_name: v3_state.security.username.clone(),
            auth_parameters,
            priv_parameters,
        };

        let message = SnmpMessage {
            version: Version::V3,
            data: MessageData::V3 {
                msg_id: request_id,
                msg_max_size: v3::DEFAULT_MSG_MAX_SIZE,
                security_level,
                reportable: true,
                security_params,
                scoped_pdu,
            },
        };

        let mut encoded = message.encode();
        if let Some(protocol) = auth_protocol {
            if security_level.requires_auth() {
                let mac = compute_hmac(protocol, auth_key.as_ref().unwrap().as_bytes(), &encoded.bytes);
                let range = encoded
                    .auth_params_range
                    .clone()
                    .expect("auth_params_range present whenever auth_parameters is non-empty");
                let mut bytes = encoded.bytes.to_vec();
                bytes[range].copy_from_slice(&mac);
                encoded.bytes = Bytes::from(bytes);
            }
        }

        let response_bytes = self.send_with_retries(&encoded.bytes, request_id).await?;
        let response = SnmpMessage::decode(&response_bytes)?;

        let (resp_security_level, resp_reportable, resp_security_params, resp_scoped_pdu, resp_msg_id) =
            match response.data.clone() {
                MessageData::V3 { security_level, reportable, security_params, scoped_pdu, msg_id } => {
                    (security_level, reportable, security_params, scoped_pdu, msg_id)
                }
                MessageData::Community { .. } => {
                    return Err(Error::VersionMismatch { expected: Version::V3, actual: response.version });
                }
            };

        if resp_msg_id != request_id {
            return Err(Error::RequestIdMismatch { expected: request_id, actual: resp_msg_id });
        }

        if security_level.requires_auth() {
            let received_mac = resp_security_params.auth_parameters.clone();
            let zeroed_params = UsmSecurityParams {
                auth_parameters: Bytes::from(vec![0u8; received_mac.len()]),
                ..resp_security_params.clone()
            };
            let zeroed_message = SnmpMessage {
                version: Version::V3,
                data: MessageData::V3 {
                    msg_id: resp_msg_id,
                    msg_max_size: v3::DEFAULT_MSG_MAX_SIZE,
                    security_level: resp_security_level,
                    reportable: resp_reportable,
                    security_params: zeroed_params,
                    scoped_pdu: resp_scoped_pdu.clone(),
                },
            };
            let reencoded = zeroed_message.encode();
            let protocol = auth_protocol.expect("security_level.requires_auth() implies an auth protocol");
            if !verify_hmac(protocol, auth_key.as_ref().unwrap().as_bytes(), &reencoded.bytes, &received_mac) {
                return Err(Error::auth(Some(target), AuthErrorKind::HmacMismatch));
            }
        }

        self.inner.engine_cache.observe(
            target,
            resp_security_params.authoritative_engine_boots,
            resp_security_params.authoritative_engine_time,
        );

        if v3::is_not_in_time_window_report(&response) {
            return Err(Error::NotInTimeWindow { target: Some(target) });
        }
        if v3::is_unknown_engine_id_report(&response) {
            return Err(Error::UnknownEngineId { target: Some(target) });
        }
        if v3::is_unknown_user_name_report(&response) {
            return Err(Error::auth(Some(target), AuthErrorKind::NoUser));
        }
        if v3::is_unsupported_sec_level_report(&response) {
            return Err(Error::auth(Some(target), AuthErrorKind::UnsupportedSecurityLevel));
        }
        if v3::is_wrong_digest_report(&response) {
            return Err(Error::auth(Some(target), AuthErrorKind::HmacMismatch));
        }
        if v3::is_decryption_error_report(&response) {
            return Err(Error::decrypt(Some(target), CryptoErrorKind::CipherError));
        }

        let pdu = match resp_scoped_pdu {
            ScopedPdu::Plaintext { pdu, .. } => pdu,
            ScopedPdu::Encrypted(ciphertext) => {
                let priv_protocol = v3_state
                    .security
                    .priv_
                    .as_ref()
                    .ok_or_else(|| Error::decrypt(Some(target), CryptoErrorKind::NoPrivKey))?
                    .0;
                let priv_key = priv_key.as_ref().ok_or_else(|| Error::decrypt(Some(target), CryptoErrorKind::NoPrivKey))?;
                let priv_key_bytes = PrivKey::from_bytes(priv_key.as_bytes().to_vec());
                let plaintext = v3::decrypt(
                    priv_protocol,
                    &priv_key_bytes,
                    resp_security_params.authoritative_engine_boots,
                    resp_security_params.authoritative_engine_time,
                    &resp_security_params.priv_parameters,
                    &ciphertext,
                )?;
                let (_context_engine_id, _context_name, pdu) = decode_scoped_pdu_plaintext(&plaintext)?;
                pdu
            }
        };

        if pdu.request_id != request_id {
            return Err(Error::RequestIdMismatch { expected: request_id, actual: pdu.request_id });
        }

        Ok(pdu)
    }
}

/// Decode a decrypted ScopedPDU's plaintext SEQUENCE (contextEngineID,
/// contextName, PDU) — the counterpart of `ScopedPdu::encode_plaintext_bytes`
/// for the half of the roundtrip that never goes through `ScopedPdu::decode`,
/// since the ciphertext case is the only one this client ever constructs
/// directly from wire bytes.
fn decode_scoped_pdu_plaintext(bytes: &[u8]) -> Result<(Bytes, Bytes, Pdu)> {
    let mut decoder = Decoder::new(bytes);
    let mut seq = decoder.read_sequence()?;
    let context_engine_id = Bytes::copy_from_slice(seq.read_octet_string()?);
    let context_name = Bytes::copy_from_slice(seq.read_octet_string()?);
    let pdu = Pdu::decode(&mut seq)?;
    Ok((context_engine_id, context_name, pdu))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, ResponseBuilder};

    fn mock_client(mock: MockTransport) -> Client<MockTransport> {
        let config = ClientConfig {
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(1),
            retries: 0,
            max_oids_per_request: 10,
            v3_security: None,
        };
        Client::new(mock, config)
    }

    #[tokio::test]
    async fn get_returns_requested_varbinds() {
        let mut mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        let oid = Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        mock.queue_response(
            ResponseBuilder::new(1).varbind(oid.clone(), Value::Integer(42)).build_v2c(b"public"),
        );
        let client = mock_client(mock);
        let result = client.get(&[oid.clone()]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].oid, oid);
        assert_eq!(result[0].value, Value::Integer(42));
    }

    #[tokio::test]
    async fn get_bulk_on_v1_is_rejected_without_a_round_trip() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        let config = ClientConfig { version: Version::V1, ..ClientConfig::default() };
        let client = Client::new(mock, config);
        let oid = Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1]);
        let err = client.get_bulk(&[oid], 0, 10).await.unwrap_err();
        assert!(matches!(err, Error::InvalidVersionForBulk { version: Version::V1 }));
    }

    #[tokio::test]
    async fn timeout_retries_configured_number_of_times() {
        let mut mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_timeout();
        mock.queue_timeout();
        let oid = Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        mock.queue_response(ResponseBuilder::new(1).varbind(oid.clone(), Value::Integer(1)).build_v2c(b"public"));
        let config = ClientConfig { retries: 2, ..ClientConfig::default() };
        let client = Client::new(mock, config);
        let result = client.get(&[oid]).await.unwrap();
        assert_eq!(result[0].value, Value::Integer(1));
    }

    #[tokio::test]
    async fn exhausted_retries_surfaces_timeout() {
        let mut mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_timeout();
        mock.queue_timeout();
        let config = ClientConfig { retries: 1, ..ClientConfig::default() };
        let client = Client::new(mock, config);
        let oid = Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        let err = client.get(&[oid]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn error_status_surfaces_as_snmp_error() {
        let mut mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        let oid = Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        let pdu = Pdu::new(
            PduType::Response,
            1,
            ErrorInfo::Standard { error_status: ErrorStatus::NoSuchName, error_index: 1 },
            vec![VarBind::null(oid.clone())],
        );
        let msg = SnmpMessage::community(Version::V2c, Bytes::from_static(b"public"), pdu);
        mock.queue_response(msg.encode().bytes);
        let client = mock_client(mock);
        let err = client.get(&[oid.clone()]).await.unwrap_err();
        match err {
            Error::Snmp { status, oid: err_oid, .. } => {
                assert_eq!(status, ErrorStatus::NoSuchName);
                assert_eq!(err_oid, Some(oid));
            }
            other => panic!("expected Error::Snmp, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn with_options_overrides_timeout_and_retries() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        let client = mock_client(mock);
        let opts = RequestOptions { timeout: Some(Duration::from_millis(10)), retries: Some(5), ..Default::default() };
        let overridden = client.with_options(&opts);
        assert_eq!(overridden.inner.config.timeout, Duration::from_millis(10));
        assert_eq!(overridden.inner.config.retries, 5);
        assert_eq!(overridden.inner.config.version, client.inner.config.version);
    }
}
