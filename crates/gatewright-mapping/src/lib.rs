//! The mapping table: which target construct each source policy type
//! migrates to, and under what conditions.
//!
//! The table is configuration, not logic. A builtin default covers the
//! common policy catalog; deployments extend or override it by merging
//! TOML fragments. Lookups never mutate, so one table can be shared across
//! concurrent runs behind an `Arc`.

pub mod compat;
pub mod table;

pub use compat::ConstructCompat;
pub use table::{
    Effort, MappingError, MappingTable, TableHit, TableSpec, TargetMapping,
};
