//! Contract for (external, out-of-scope) output enrichment.
//!
//! The core always produces a varbind's `{oid_list, type, value}`; turning
//! that into a display-ready record with a symbolic name and/or a
//! formatted value string is a pure function a sibling crate owns. This
//! module only defines the record shape ([`EnrichedVarBind`]) and the knobs
//! that gate it ([`EnrichOptions`]) so that crate has something concrete to
//! implement against.

use crate::oid::Oid;
use crate::resolve::Resolver;
use crate::value::Value;
use crate::varbind::VarBind;

/// `include_names`/`include_formatted` both default to `true` per §6.3;
/// either can be toggled per call or carried as a standing default.
#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    pub include_names: bool,
    pub include_formatted: bool,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self { include_names: true, include_formatted: true }
    }
}

/// A varbind enriched for display. `name` and `formatted` are `None` when
/// their corresponding [`EnrichOptions`] flag is off, or when the flag is
/// on but a resolver/formatter couldn't produce one.
#[derive(Debug, Clone)]
pub struct EnrichedVarBind {
    pub oid: Oid,
    pub oid_list: Vec<u32>,
    pub name: Option<String>,
    pub r#type: &'static str,
    pub value: Value,
    pub formatted: Option<String>,
}

/// Turn a core [`VarBind`] into a display-ready [`EnrichedVarBind`].
///
/// This is the pure-function seam §6.3 describes: no formatting or
/// name-resolution logic lives in this crate, only the call into whatever
/// `resolver` the caller supplied (name resolution) and the closed
/// `type` tag the value already carries (`Value::type_name`-equivalent via
/// `Value`'s own `Debug`/variant name — actual human-readable formatting is
/// a sibling crate's job, invoked here only if `opts.include_formatted` and
/// a formatter were wired in).
pub fn enrich(varbind: &VarBind, resolver: &dyn Resolver, opts: EnrichOptions) -> EnrichedVarBind {
    let name = if opts.include_names { resolver.reverse_lookup(&varbind.oid).map(|r| r.base_name) } else { None };

    EnrichedVarBind {
        oid: varbind.oid.clone(),
        oid_list: varbind.oid.arcs().to_vec(),
        name,
        r#type: value_type_name(&varbind.value),
        value: varbind.value.clone(),
        // No formatter is part of this crate; formatting is entirely a
        // sibling crate's responsibility (§6.3), so this stays `None`
        // until one is wired in through a future extension point.
        formatted: None,
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "Integer",
        Value::OctetString(_) => "OctetString",
        Value::Null => "Null",
        Value::ObjectIdentifier(_) => "ObjectIdentifier",
        Value::IpAddress(_) => "IpAddress",
        Value::Counter32(_) => "Counter32",
        Value::Gauge32(_) => "Gauge32",
        Value::TimeTicks(_) => "TimeTicks",
        Value::Opaque(_) => "Opaque",
        Value::Counter64(_) => "Counter64",
        Value::NoSuchObject => "NoSuchObject",
        Value::NoSuchInstance => "NoSuchInstance",
        Value::EndOfMibView => "EndOfMibView",
    }
}
