//! Desired-state declarations for the stack's resources.
//!
//! Each submodule builds one resource spec from configuration and tags,
//! validates it locally, and declares it through an [`Engine`](crate::Engine).
//! Validation only catches malformed declarations; failures while applying
//! them belong to the engine and are propagated unchanged.

pub mod compute;
pub mod credential;
pub mod database;
pub mod network;

use std::net::IpAddr;

use thiserror::Error;

pub use compute::InstanceSpec;
pub use credential::KeyPairSpec;
pub use database::DatabaseSpec;
pub use network::{Protocol, SecurityGroupSpec, TrafficRule};

/// Errors raised when a declaration is malformed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    /// A required string attribute is empty.
    #[error("{resource}: missing or empty field: {field}")]
    EmptyField {
        /// Logical name of the resource.
        resource: String,
        /// Attribute that was empty.
        field: String,
    },
    /// A rule uses ports outside `0..=65535` or with `from > to`.
    #[error("{resource}: rule `{rule}` has invalid port range {from_port}..{to_port}")]
    PortRange {
        /// Logical name of the resource.
        resource: String,
        /// Description of the offending rule.
        rule: String,
        /// Lower bound as declared.
        from_port: i32,
        /// Upper bound as declared.
        to_port: i32,
    },
    /// An all-protocol rule was given a concrete port range.
    #[error("{resource}: rule `{rule}` allows all protocols and must span ports -1..-1")]
    ProtocolPorts {
        /// Logical name of the resource.
        resource: String,
        /// Description of the offending rule.
        rule: String,
    },
    /// A rule carries an unparsable CIDR block, or none at all.
    #[error("{resource}: rule `{rule}` has invalid CIDR block `{cidr}`")]
    Cidr {
        /// Logical name of the resource.
        resource: String,
        /// Description of the offending rule.
        rule: String,
        /// Block as declared.
        cidr: String,
    },
    /// The SSH public key material is malformed.
    #[error("{resource}: malformed public key: {reason}")]
    PublicKey {
        /// Logical name of the resource.
        resource: String,
        /// What is wrong with the key.
        reason: String,
    },
    /// A resource that must join a security group was given none.
    #[error("{resource}: at least one security group is required")]
    MissingSecurityGroup {
        /// Logical name of the resource.
        resource: String,
    },
    /// A numeric attribute must be greater than zero.
    #[error("{resource}: {field} must be greater than zero")]
    NonPositive {
        /// Logical name of the resource.
        resource: String,
        /// Attribute that was zero.
        field: String,
    },
}

pub(crate) fn require_field(
    resource: &str,
    field: &str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            resource: resource.to_owned(),
            field: field.to_owned(),
        });
    }
    Ok(())
}

/// Returns whether `block` is an IPv4 or IPv6 CIDR such as `0.0.0.0/0`.
#[must_use]
pub fn is_valid_cidr(block: &str) -> bool {
    let Some((address, prefix)) = block.split_once('/') else {
        return false;
    };
    let Ok(ip) = address.parse::<IpAddr>() else {
        return false;
    };
    let Ok(bits) = prefix.parse::<u8>() else {
        return false;
    };
    match ip {
        IpAddr::V4(_) => bits <= 32,
        IpAddr::V6(_) => bits <= 128,
    }
}

#[cfg(test)]
mod tests;
