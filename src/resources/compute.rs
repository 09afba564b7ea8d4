//! The RStudio Workbench server.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use super::{ValidationError, require_field};
use crate::engine::{Engine, InstanceHandle, KeyPairHandle, Output, ResourceKind, ResourceRef};
use crate::stack::StackError;
use crate::tags::TagSet;

/// Logical name of the server.
pub const SERVER_NAME: &str = "server";
/// EC2 instance type.
pub const INSTANCE_TYPE: &str = "t3.medium";
/// Ubuntu Server 20.04 LTS (HVM), SSD volume type.
pub const SERVER_AMI: &str = "ami-0fb653ca2d3203ac1";

/// Output carrying the server's public IPv4 address.
pub const SERVER_PUBLIC_IP: &str = "server_public_ip";
/// Output carrying the server's public DNS name.
pub const SERVER_PUBLIC_DNS: &str = "server_public_dns";
/// Output carrying the server's subnet.
pub const SERVER_SUBNET_ID: &str = "server_subnet_id";
/// Every output published for the server.
pub const SERVER_OUTPUTS: [&str; 3] = [SERVER_PUBLIC_IP, SERVER_PUBLIC_DNS, SERVER_SUBNET_ID];

/// Desired state of the server.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    /// Logical name.
    #[serde(skip)]
    pub name: String,
    /// EC2 instance type.
    pub instance_type: String,
    /// Machine image identifier.
    pub ami: String,
    /// Security groups the instance joins.
    pub vpc_security_group_ids: Vec<Output>,
    /// Name of the key pair installed for SSH.
    pub key_name: String,
    /// Graph reference to the key pair behind `key_name`.
    #[serde(skip)]
    pub key_pair: ResourceRef,
    /// Attached tags.
    pub tags: TagSet,
}

impl InstanceSpec {
    /// Builds the server spec bound to `key_pair` and `security_group_ids`.
    #[must_use]
    pub fn new(tags: &TagSet, key_pair: &KeyPairHandle, security_group_ids: &[Output]) -> Self {
        Self {
            name: SERVER_NAME.to_owned(),
            instance_type: INSTANCE_TYPE.to_owned(),
            ami: SERVER_AMI.to_owned(),
            vpc_security_group_ids: security_group_ids.to_vec(),
            key_name: key_pair.key_name.clone(),
            key_pair: key_pair.resource.clone(),
            tags: tags.clone(),
        }
    }

    /// Graph reference for this instance.
    #[must_use]
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(ResourceKind::Instance, self.name.clone())
    }

    /// Resources that must exist before this instance.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<ResourceRef> {
        self.vpc_security_group_ids
            .iter()
            .map(|id| id.resource.clone())
            .chain(std::iter::once(self.key_pair.clone()))
            .collect()
    }

    /// Rejects empty attributes and an instance with no security group.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the offending attribute.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_field(&self.name, "instance_type", &self.instance_type)?;
        require_field(&self.name, "ami", &self.ami)?;
        require_field(&self.name, "key_name", &self.key_name)?;
        if self.vpc_security_group_ids.is_empty() {
            return Err(ValidationError::MissingSecurityGroup {
                resource: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Declares the server and publishes its three outputs.
///
/// # Errors
///
/// Returns [`StackError::Validation`] for a malformed spec,
/// [`StackError::Provisioning`] when the engine rejects the instance and
/// [`StackError::Export`] when an output cannot be published.
pub async fn create<E: Engine>(
    engine: &E,
    tags: &TagSet,
    credential: &KeyPairHandle,
    security_group_ids: &[Output],
) -> Result<InstanceHandle, StackError<E::Error>> {
    let spec = InstanceSpec::new(tags, credential, security_group_ids);
    spec.validate()?;
    debug!(instance = %spec.name, depends_on = ?spec.dependencies(), "instance dependencies");

    let handle = engine
        .create_instance(&spec)
        .await
        .map_err(|source| StackError::Provisioning {
            resource: spec.resource(),
            source,
        })?;
    info!(
        instance = %spec.name,
        instance_type = %spec.instance_type,
        key_name = %spec.key_name,
        "declared compute instance"
    );

    let outputs = [
        (SERVER_PUBLIC_IP, &handle.public_ip),
        (SERVER_PUBLIC_DNS, &handle.public_dns),
        (SERVER_SUBNET_ID, &handle.subnet_id),
    ];
    for (name, value) in outputs {
        crate::stack::publish(engine, name, value).await?;
    }
    Ok(handle)
}
