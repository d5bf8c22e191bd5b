//! Structured edits for pfSense and OPNsense `config.xml`.
//!
//! This library replaces text substitution on the firewall configuration
//! file with a parse → mutate → serialize cycle. Two operations exist:
//!
//! - [`ops::register_vlan`]: ensure a VLAN (and optionally an interface
//!   assignment) is defined, then run a full configuration reload
//! - [`ops::clone_rule`]: copy a filter rule N times onto a new interface,
//!   then run a filter-only reload
//!
//! # Architecture
//!
//! - [`vlan`] / [`rule_clone`]: document-level edits, no I/O
//! - [`store`]: the document on disk: load, atomic commit, [`snapshot`]
//! - [`reload`]: the [`reload::Reloader`] seam and the command-based default
//! - [`settings`]: optional TOML overrides for paths and reload programs
//! - [`report`]: terminal rendering of operation results
//!
//! Unrelated bytes of the document are preserved exactly; see
//! `xml_edit_core::Document`.
//!
//! # Concurrency
//!
//! Everything is synchronous and nothing locks the document. Callers must
//! serialize mutating operations against the same file.
//!
//! # Examples
//!
//! ```ignore
//! use fwcfg::ops::{register_vlan, RunOptions};
//! use fwcfg::reload::CommandReloader;
//! use fwcfg::store::ConfigStore;
//! use fwcfg::vlan::VlanRequest;
//!
//! let store = ConfigStore::new("/conf/config.xml");
//! let request = VlanRequest {
//!     parent_interface: Some("igb1".into()),
//!     vlan_id: Some(20),
//!     ip_address: Some("10.0.20.1".into()),
//!     ..VlanRequest::default()
//! };
//! let report = register_vlan(&store, &request, &CommandReloader::default(), RunOptions::default())?;
//! println!("{:?}", report.status);
//! ```

pub mod detect;
pub mod error;
pub mod ops;
pub mod reload;
pub mod report;
pub mod rule_clone;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod vlan;

pub use error::OpError;
