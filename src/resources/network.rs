//! Security group guarding the server and the database.
//!
//! The rule set is fixed: SSH, RStudio Workbench, Package Manager, HTTP and
//! PostgreSQL are reachable from anywhere, and all outbound traffic is
//! allowed.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use super::{ValidationError, is_valid_cidr, require_field};
use crate::engine::{Engine, ResourceKind, ResourceRef, SecurityGroupHandle};
use crate::stack::StackError;
use crate::tags::TagSet;

/// Logical name of the security group.
pub const SECURITY_GROUP_NAME: &str = "pulumi-security-group";
/// Description attached to the security group.
pub const SECURITY_GROUP_DESCRIPTION: &str = "Sam security group for Pulumi deployment";
/// CIDR block matching every IPv4 address.
pub const ANYWHERE: &str = "0.0.0.0/0";
/// Inbound TCP ports and their rule descriptions.
pub const INGRESS_PORTS: [(u16, &str); 5] = [
    (22, "SSH"),
    (8787, "RSW"),
    (4242, "RSPM"),
    (80, "HTTP"),
    (5432, "POSTGRESQL"),
];

const ALL_PORTS: i32 = -1;
const MAX_PORT: i32 = 65_535;

/// Transport protocol matched by a rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Protocol {
    /// TCP only.
    #[serde(rename = "tcp")]
    Tcp,
    /// Every protocol.
    #[serde(rename = "-1")]
    All,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("TCP"),
            Self::All => f.write_str("All"),
        }
    }
}

/// One ingress or egress rule.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRule {
    /// Matched protocol.
    pub protocol: Protocol,
    /// First port of the range, `-1` for all.
    pub from_port: i32,
    /// Last port of the range, `-1` for all.
    pub to_port: i32,
    /// Source (ingress) or destination (egress) CIDR blocks.
    pub cidr_blocks: BTreeSet<String>,
    /// Human readable label.
    pub description: String,
}

impl TrafficRule {
    /// A single TCP port open to every IPv4 address.
    #[must_use]
    pub fn tcp_from_anywhere(port: u16, description: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::Tcp,
            from_port: i32::from(port),
            to_port: i32::from(port),
            cidr_blocks: BTreeSet::from([ANYWHERE.to_owned()]),
            description: description.into(),
        }
    }

    /// Every protocol and port to every IPv4 address.
    #[must_use]
    pub fn allow_all(description: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::All,
            from_port: ALL_PORTS,
            to_port: ALL_PORTS,
            cidr_blocks: BTreeSet::from([ANYWHERE.to_owned()]),
            description: description.into(),
        }
    }

    /// Whether the rule matches every port.
    #[must_use]
    pub const fn covers_all_ports(&self) -> bool {
        matches!(self.protocol, Protocol::All)
            && self.from_port == ALL_PORTS
            && self.to_port == ALL_PORTS
    }

    /// Whether any of the rule's blocks is `0.0.0.0/0`.
    #[must_use]
    pub fn is_world_open(&self) -> bool {
        self.cidr_blocks.contains(ANYWHERE)
    }

    fn validate(&self, resource: &str) -> Result<(), ValidationError> {
        require_field(resource, "rule description", &self.description)?;
        match self.protocol {
            Protocol::All if !self.covers_all_ports() => {
                return Err(ValidationError::ProtocolPorts {
                    resource: resource.to_owned(),
                    rule: self.description.clone(),
                });
            }
            Protocol::Tcp
                if !(0..=MAX_PORT).contains(&self.from_port)
                    || !(0..=MAX_PORT).contains(&self.to_port)
                    || self.from_port > self.to_port =>
            {
                return Err(ValidationError::PortRange {
                    resource: resource.to_owned(),
                    rule: self.description.clone(),
                    from_port: self.from_port,
                    to_port: self.to_port,
                });
            }
            Protocol::All | Protocol::Tcp => {}
        }

        if self.cidr_blocks.is_empty() {
            return Err(ValidationError::Cidr {
                resource: resource.to_owned(),
                rule: self.description.clone(),
                cidr: String::new(),
            });
        }
        if let Some(bad) = self.cidr_blocks.iter().find(|block| !is_valid_cidr(block)) {
            return Err(ValidationError::Cidr {
                resource: resource.to_owned(),
                rule: self.description.clone(),
                cidr: bad.clone(),
            });
        }
        Ok(())
    }
}

/// Desired state of the security group.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupSpec {
    /// Logical name.
    #[serde(skip)]
    pub name: String,
    /// Provider-side description.
    pub description: String,
    /// Inbound rules.
    pub ingress: Vec<TrafficRule>,
    /// Outbound rules.
    pub egress: Vec<TrafficRule>,
    /// Attached tags.
    pub tags: TagSet,
}

impl SecurityGroupSpec {
    /// The stack's fixed rule set with the given tags.
    #[must_use]
    pub fn standard(tags: &TagSet) -> Self {
        Self {
            name: SECURITY_GROUP_NAME.to_owned(),
            description: SECURITY_GROUP_DESCRIPTION.to_owned(),
            ingress: INGRESS_PORTS
                .iter()
                .map(|(port, label)| TrafficRule::tcp_from_anywhere(*port, *label))
                .collect(),
            egress: vec![TrafficRule::allow_all("Allow all outbound traffic")],
            tags: tags.clone(),
        }
    }

    /// Graph reference for this group.
    #[must_use]
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(ResourceKind::SecurityGroup, self.name.clone())
    }

    /// Rejects malformed rules.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty name or description, a bad
    /// port range, a protocol/port mismatch, or an invalid CIDR block.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_field(&self.name, "name", &self.name)?;
        require_field(&self.name, "description", &self.description)?;
        self.ingress
            .iter()
            .chain(&self.egress)
            .try_for_each(|rule| rule.validate(&self.name))
    }
}

/// Declares the security group.
///
/// # Errors
///
/// Returns [`StackError::Validation`] when the rule set is malformed and
/// [`StackError::Provisioning`] when the engine rejects the declaration.
pub async fn create<E: Engine>(
    engine: &E,
    tags: &TagSet,
) -> Result<SecurityGroupHandle, StackError<E::Error>> {
    let spec = SecurityGroupSpec::standard(tags);
    spec.validate()?;

    for rule in spec.ingress.iter().filter(|rule| rule.is_world_open()) {
        warn!(
            group = %spec.name,
            rule = %rule.description,
            port = rule.from_port,
            "ingress open to {ANYWHERE}"
        );
    }

    let handle = engine
        .create_security_group(&spec)
        .await
        .map_err(|source| StackError::Provisioning {
            resource: spec.resource(),
            source,
        })?;
    info!(
        group = %spec.name,
        ingress = spec.ingress.len(),
        egress = spec.egress.len(),
        "declared security group"
    );
    Ok(handle)
}
