//! # admin-mis-db
//!
//! The model layer the admin API introspects. Models are declared at startup
//! as [`ModelMeta`](model::ModelMeta) values and collected in a
//! [`ModelRegistry`](model::ModelRegistry); records live in an in-memory
//! [`Store`](store::Store) whose writes go through all-or-nothing
//! transactions.
//!
//! ## Module Overview
//!
//! - [`fields`] - Field definitions ([`FieldDef`](fields::FieldDef)) and types
//! - [`validators`] - Field validators and their JSON descriptors
//! - [`model`] - Model metadata and the registry
//! - [`store`] - Tables, snapshots and transactions
//! - [`query`] - Lookups, search and ordering
//! - [`deletion`] - Cascade collection for deletes

// - struct_excessive_bools: FieldDef carries the usual field flags as booleans
// - module_name_repetitions: ModelMeta / ModelRegistry read better than Meta / Registry
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::module_name_repetitions)]

pub mod deletion;
pub mod fields;
pub mod model;
pub mod query;
pub mod store;
pub mod validators;

pub use deletion::{Collector, DeletionPlan};
pub use fields::{FieldDef, FieldType, GeometryType, OnDelete};
pub use model::{ModelMeta, ModelRegistry};
pub use query::{Lookup, LookupKind, QueryContext};
pub use store::{Record, Store, Tables, Transaction};
