//! Contract for the (external, out-of-scope) MIB/name resolver.
//!
//! Nothing in this crate implements symbolic-name lookup or MIB text
//! parsing; [`Resolver`] only pins down the shape a sibling crate must
//! expose so the walk/multi layers can optionally hand a name to it
//! instead of a raw [`Oid`]. A resolver failure never aborts an SNMP
//! operation — it only means the result carries no symbolic name.

use crate::oid::Oid;

/// What a resolver hands back for a successfully reverse-looked-up OID:
/// the table/scalar's base name plus whatever instance suffix
/// distinguishes this particular row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseLookup {
    pub base_name: String,
    pub instance_suffix: Vec<u32>,
}

/// A name or OID a resolver failed to turn into a concrete OID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub input: String,
    pub reason: String,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not resolve {:?}: {}", self.input, self.reason)
    }
}

impl std::error::Error for ResolveError {}

/// Implemented by a sibling MIB/name-resolution crate, not by anything
/// here. `resolve` turns a symbolic name (or an OID already in dotted
/// form) into a concrete [`Oid`]; `reverse_lookup` is the inverse, used
/// only for enrichment (§6.3) and never on the hot request path.
pub trait Resolver: Send + Sync {
    fn resolve(&self, name_or_oid: &str) -> Result<Oid, ResolveError>;

    fn reverse_lookup(&self, oid: &Oid) -> Option<ReverseLookup>;
}

/// A resolver that never resolves anything. Useful as a default when no
/// MIB resolver is wired in, so callers asking for symbolic names degrade
/// to raw OIDs instead of needing an `Option<Box<dyn Resolver>>` at every
/// call site.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl Resolver for NullResolver {
    fn resolve(&self, name_or_oid: &str) -> Result<Oid, ResolveError> {
        Err(ResolveError { input: name_or_oid.to_string(), reason: "no resolver configured".to_string() })
    }

    fn reverse_lookup(&self, _oid: &Oid) -> Option<ReverseLookup> {
        None
    }
}
