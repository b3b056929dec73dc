#![doc = include_str!("../README.md")]
//!
//! # Architecture
//!
//! - [`SnapshotStore`] holds the current document and notifies on
//!   whole-document replacement.
//! - [`CalcDefinition`] declares one named calculation: an ordered dependency
//!   list and a body (native closure or textual expression).
//! - [`wire`] turns an ordered list of definitions into a live graph of
//!   [`CalcNode`]s, seeds a per-pass [`ResultRegistry`], and returns teardown
//!   handles.
//! - Replacing the snapshot walks the wired nodes in dependency order and
//!   recomputes exactly the calculations whose inputs changed.

mod definition;
mod error;
mod expr;
mod node;
mod path;
mod registry;
mod snapshot;
mod wire;

pub mod formulas;
pub mod units;

pub use definition::{CalcBody, CalcDefinition, CompiledBody, Dependency, NativeFn};
pub use error::{CalcError, ExprError, QuantityError};
pub use expr::CompiledExpr;
pub use node::{BoundSource, CalcNode};
pub use path::{resolve, FieldPath};
pub use registry::{RegistrySubscription, ResultRegistry};
pub use snapshot::{SnapshotStore, SnapshotSubscription};
pub use wire::{wire, TeardownHandle, WiredGraph};
