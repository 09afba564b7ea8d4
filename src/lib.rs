//! Core library for the `rsw-infra` stack.
//!
//! The crate declares a small AWS environment for RStudio Workbench: a
//! security group, an SSH key pair, a compute instance and a PostgreSQL
//! database, then publishes their connection endpoints. Declarations flow
//! through an injected [`Engine`]; the bundled [`ManifestEngine`] records
//! them as a desired-state manifest for an external provisioning tool.

pub mod config;
pub mod engine;
pub mod manifest;
pub mod resources;
pub mod stack;
pub mod tags;
pub mod test_support;

pub use config::{ConfigError, Configuration, StackSettings};
pub use engine::{
    DatabaseHandle, Engine, EngineFuture, InstanceHandle, KeyPairHandle, Output, ResourceKind,
    ResourceRef, SecurityGroupHandle,
};
pub use manifest::{ManifestEngine, ManifestError, StackManifest};
pub use resources::ValidationError;
pub use stack::{StackError, StackOrchestrator, StackOutcome};
pub use tags::TagSet;
