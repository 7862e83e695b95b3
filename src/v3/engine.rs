//! SNMPv3 engine discovery and boots/time tracking (RFC 3414 §4, §2.3).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::message::{MessageData, ScopedPdu, SnmpMessage};
use crate::oid;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};

/// `msgMaxSize` value this crate advertises in outgoing messages.
pub const DEFAULT_MSG_MAX_SIZE: i32 = 65507;

/// Maximum legal value of `snmpEngineTime` before it wraps (RFC 3414 §2.3).
pub const MAX_ENGINE_TIME: i32 = i32::MAX;

/// Acceptable clock skew for the `notInTimeWindow` check (RFC 3414 §2.3):
/// a message is valid if the authoritative engine's time, extrapolated to
/// now, is within this many seconds of the time it claims.
pub const TIME_WINDOW: i64 = 150;

/// Maximum accepted `snmpEngineID` length (RFC 3411 §5, 1..=32 octets).
const MAX_ENGINE_ID_LEN: usize = 32;

/// What we know about a remote engine, learned through discovery and kept
/// current from subsequent authenticated exchanges.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub engine_id: Bytes,
    pub engine_boots: i32,
    pub engine_time: i32,
    /// Local instant at which `engine_time` was last observed, used to
    /// extrapolate the authoritative engine's current time without a
    /// round trip.
    recorded_at: Instant,
}

impl EngineState {
    pub fn new(engine_id: Bytes, engine_boots: i32, engine_time: i32) -> Self {
        EngineState { engine_id, engine_boots, engine_time, recorded_at: Instant::now() }
    }

    /// Best estimate of the authoritative engine's current `snmpEngineTime`,
    /// extrapolated from the last observation.
    pub fn estimated_time(&self) -> i32 {
        let elapsed = self.recorded_at.elapsed().as_secs() as i64;
        self.engine_time.saturating_add(elapsed.min(i32::MAX as i64) as i32)
    }

    /// Update boots/time from a freshly authenticated message, per RFC 3414
    /// §2.3: advance only if boots increased, or boots equal and time
    /// increased.
    pub fn observe(&mut self, engine_boots: i32, engine_time: i32) {
        if engine_boots > self.engine_boots
            || (engine_boots == self.engine_boots && engine_time > self.engine_time)
        {
            self.engine_boots = engine_boots;
            self.engine_time = engine_time;
            self.recorded_at = Instant::now();
        }
    }

    /// Whether this entry hasn't been refreshed (by a usable report or a
    /// fresh discovery) within `idle`.
    fn is_stale(&self, idle: Duration) -> bool {
        self.recorded_at.elapsed() >= idle
    }
}

/// Default idle eviction/refresh interval, matching
/// [`TopLevelConfig::engine_cache_idle_ms`](crate::config::TopLevelConfig)'s
/// documented default.
pub const DEFAULT_IDLE: Duration = Duration::from_secs(300);

/// A shared cache of discovered engine state, keyed by target address.
///
/// Sharing one cache across many [`Client`](crate::Client)s polling the same
/// fleet of devices avoids repeating engine discovery (an extra round trip)
/// for every client. Backed by an `RwLock` rather than a `Mutex` so that
/// concurrent `get` calls on the hot path never block each other; only
/// `insert`/`observe`/`remove` take the exclusive write lock.
pub struct EngineCache {
    states: RwLock<HashMap<SocketAddr, EngineState>>,
    idle: Duration,
}

impl Default for EngineCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineCache {
    pub fn new() -> Self {
        Self::with_idle(DEFAULT_IDLE)
    }

    /// Build a cache that treats an entry as gone once it hasn't been
    /// refreshed for longer than `idle`, forcing the next `get` to miss and
    /// the caller to rediscover.
    pub fn with_idle(idle: Duration) -> Self {
        EngineCache { states: RwLock::new(HashMap::new()), idle }
    }

    /// Returns the cached state for `target`, or `None` if absent or stale.
    /// A stale hit is evicted so a concurrent reader doesn't resurrect it.
    pub fn get(&self, target: SocketAddr) -> Option<EngineState> {
        {
            let states = self.states.read().unwrap();
            match states.get(&target) {
                Some(state) if !state.is_stale(self.idle) => return Some(state.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.states.write().unwrap().remove(&target);
        None
    }

    pub fn insert(&self, target: SocketAddr, state: EngineState) {
        self.states.write().unwrap().insert(target, state);
    }

    pub fn observe(&self, target: SocketAddr, engine_boots: i32, engine_time: i32) {
        if let Some(state) = self.states.write().unwrap().get_mut(&target) {
            state.observe(engine_boots, engine_time);
        }
    }

    pub fn remove(&self, target: SocketAddr) {
        self.states.write().unwrap().remove(&target);
    }
}

/// Parse a discovery Report/Response into the engine triple, with the
/// default engine ID length limit.
pub fn parse_discovery_response(bytes: &[u8]) -> Result<(Bytes, i32, i32)> {
    parse_discovery_response_with_limits(bytes, MAX_ENGINE_ID_LEN)
}

/// Parse a discovery Report/Response into `(engine_id, engine_boots,
/// engine_time)`, rejecting an oversized engine ID (a malicious or broken
/// agent could otherwise make a caller buffer an arbitrarily large value).
pub fn parse_discovery_response_with_limits(bytes: &[u8], max_engine_id_len: usize) -> Result<(Bytes, i32, i32)> {
    let message = SnmpMessage::decode(bytes)?;
    match message.data {
        MessageData::V3 { security_params, .. } => {
            if security_params.authoritative_engine_id.len() > max_engine_id_len {
                return Err(Error::UnknownEngineId { target: None });
            }
            Ok((
                security_params.authoritative_engine_id,
                security_params.authoritative_engine_boots,
                security_params.authoritative_engine_time,
            ))
        }
        MessageData::Community { .. } => Err(Error::UnknownEngineId { target: None }),
    }
}

fn report_pdu(message: &SnmpMessage) -> Option<&Pdu> {
    match &message.data {
        MessageData::V3 { scoped_pdu: ScopedPdu::Plaintext { pdu, .. }, .. }
            if pdu.pdu_type == PduType::Report =>
        {
            Some(pdu)
        }
        _ => None,
    }
}

fn report_carries_oid(pdu: &Pdu, prefix: &Oid) -> bool {
    pdu.varbinds.iter().any(|vb| vb.oid.starts_with(prefix))
}

macro_rules! report_check {
    ($name:ident, $oid:expr) => {
        #[doc = concat!("Whether `pdu` is a REPORT carrying the `", stringify!($oid), "` counter.")]
        pub fn $name(message: &SnmpMessage) -> bool {
            let Some(pdu) = report_pdu(message) else { return false };
            report_carries_oid(pdu, &$oid)
        }
    };
}

report_check!(is_unsupported_sec_level_report, oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 1]);
report_check!(is_not_in_time_window_report, oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 2]);
report_check!(is_unknown_user_name_report, oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 3]);
report_check!(is_unknown_engine_id_report, oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 4]);
report_check!(is_wrong_digest_report, oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 5]);
report_check!(is_decryption_error_report, oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 6]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SecurityLevel;
    use crate::pdu::ErrorInfo;
    use crate::v3::usm::UsmSecurityParams;
    use crate::value::Value;
    use crate::varbind::VarBind;
    use crate::version::Version;

    fn discovery_report(oid_suffix: Oid) -> SnmpMessage {
        let pdu = Pdu::new(
            PduType::Report,
            1,
            ErrorInfo::success(),
            vec![VarBind::new(oid_suffix, Value::Counter32(1))],
        );
        SnmpMessage {
            version: Version::V3,
            data: MessageData::V3 {
                msg_id: 1,
                msg_max_size: DEFAULT_MSG_MAX_SIZE,
                security_level: SecurityLevel::NoAuthNoPriv,
                reportable: false,
                security_params: UsmSecurityParams {
                    authoritative_engine_id: Bytes::from_static(b"\x80\x00\x1f\x88\x80"),
                    authoritative_engine_boots: 3,
                    authoritative_engine_time: 100,
                    ..UsmSecurityParams::discovery()
                },
                scoped_pdu: ScopedPdu::Plaintext {
                    context_engine_id: Bytes::new(),
                    context_name: Bytes::new(),
                    pdu,
                },
            },
        }
    }

    #[test]
    fn parses_discovery_triple() {
        let msg = discovery_report(oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0]);
        let encoded = msg.encode();
        let (engine_id, boots, time) = parse_discovery_response(&encoded.bytes).unwrap();
        assert_eq!(engine_id, Bytes::from_static(b"\x80\x00\x1f\x88\x80"));
        assert_eq!(boots, 3);
        assert_eq!(time, 100);
    }

    #[test]
    fn rejects_oversized_engine_id() {
        let mut msg = discovery_report(oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0]);
        if let MessageData::V3 { security_params, .. } = &mut msg.data {
            security_params.authoritative_engine_id = Bytes::from(vec![0u8; 64]);
        }
        let encoded = msg.encode();
        assert!(parse_discovery_response(&encoded.bytes).is_err());
    }

    #[test]
    fn identifies_unknown_engine_id_report() {
        let msg = discovery_report(oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0]);
        assert!(is_unknown_engine_id_report(&msg));
        assert!(!is_not_in_time_window_report(&msg));
    }

    #[test]
    fn identifies_not_in_time_window_report() {
        let msg = discovery_report(oid![1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0]);
        assert!(is_not_in_time_window_report(&msg));
        assert!(!is_unknown_engine_id_report(&msg));
    }

    #[test]
    fn engine_state_observe_advances_monotonically() {
        let mut state = EngineState::new(Bytes::from_static(b"eng"), 1, 100);
        state.observe(1, 50); // stale, ignored
        assert_eq!(state.engine_time, 100);
        state.observe(1, 150);
        assert_eq!(state.engine_time, 150);
        state.observe(2, 1);
        assert_eq!(state.engine_boots, 2);
        assert_eq!(state.engine_time, 1);
    }

    #[test]
    fn cache_round_trips_state() {
        let cache = EngineCache::new();
        let target: SocketAddr = "127.0.0.1:161".parse().unwrap();
        assert!(cache.get(target).is_none());
        cache.insert(target, EngineState::new(Bytes::from_static(b"eng"), 1, 0));
        assert!(cache.get(target).is_some());
        cache.observe(target, 1, 42);
        assert_eq!(cache.get(target).unwrap().engine_time, 42);
    }

    #[test]
    fn cache_evicts_an_entry_past_the_idle_interval() {
        let cache = EngineCache::with_idle(Duration::from_millis(5));
        let target: SocketAddr = "127.0.0.1:161".parse().unwrap();
        cache.insert(target, EngineState::new(Bytes::from_static(b"eng"), 1, 0));
        assert!(cache.get(target).is_some());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(target).is_none(), "stale entry should be evicted, forcing rediscovery");
    }
}
