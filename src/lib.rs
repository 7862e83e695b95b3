//! Async SNMP v1/v2c/v3 protocol core: BER/SMIv2 codec, message/PDU codec,
//! the v3 User Security Model, a UDP transport mux, and the walk/bulk
//! traversal and multi-target fan-out engines built on top of it.
//!
//! This crate is deliberately scoped to the wire protocol and its
//! traversal algorithms. MIB text parsing, symbolic-name resolution,
//! device simulation, CLIs, configuration loading, and pretty-printing are
//! treated as external collaborators — see [`resolve`], [`enrich`], and
//! [`config`] for the contracts this crate exposes to them.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use snmp_core::{Client, oid};
//!
//! # async fn example() -> snmp_core::Result<()> {
//! let client = Client::v2c("192.168.1.1:161")
//!     .community(b"public")
//!     .connect()
//!     .await?;
//!
//! let sys_descr = client.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await?;
//! println!("{:?}", sys_descr);
//! # Ok(())
//! # }
//! ```
//!
//! # Walking a subtree
//!
//! ```rust,no_run
//! use snmp_core::{Client, oid};
//! use snmp_core::walk_engine::{walk, WalkOptions};
//!
//! # async fn example() -> snmp_core::Result<()> {
//! let client = Client::v2c("192.168.1.1:161").connect().await?;
//! let varbinds = walk(&client, oid!(1, 3, 6, 1, 2, 1, 1), WalkOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod ber;
pub mod client;
pub mod config;
pub mod enrich;
pub mod error;
pub mod message;
pub mod multi;
pub mod oid;
pub mod pdu;
pub mod prelude;
pub mod resolve;
pub mod transport;
pub(crate) mod util;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;
pub mod walk_engine;

pub use client::{Client, ClientConfig, V3SecurityConfig};
pub use error::{Error, Result};
pub use oid::Oid;
pub use v3::{AuthProtocol, PrivProtocol};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
