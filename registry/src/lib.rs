//! Namespace-scoped capability registry.
//!
//! Tracks the tools, resources and data stores available to an agent
//! runtime, grouped into a fixed pool of namespace slots (`ns-0`..`ns-9`
//! plus the always-present `default`).
//!
//! ## Modules
//!
//! - [`namespace`]: Slot allocation and per-namespace locking
//! - [`store`]: Generic per-kind reference storage
//! - [`labels`]: Label selectors for filtered listing and bulk removal
//! - [`validate`]: Structural descriptor validation
//! - [`facade`]: [`CapabilityRegistry`], the single entry point

// Shared types
pub mod config;
pub mod error;
pub mod types;

// Components
pub mod facade;
pub mod labels;
pub mod namespace;
pub mod store;
pub mod validate;

pub use config::{DefaultNamespaceConfig, RegistryConfig};
pub use error::{ConfigError, ErrorKind, RegistryError, RegistryResult};
pub use facade::{CapabilityRegistry, DeletedNamespace, RegistryStats};
pub use labels::{LabelRequirement, LabelSelector, Labeled};
pub use namespace::NamespaceManager;
pub use store::{CapabilityCounts, CapabilityStore, Reference, ReferenceStore};
pub use types::{
    BackendConfig, BackendKind, Capability, CapabilityKind, DataStore, InputSchema, Namespace,
    Property, ResourceReference, SlotId, ToolReference, NUMBERED_SLOT_LIMIT,
};
pub use validate::ReferenceValidator;
