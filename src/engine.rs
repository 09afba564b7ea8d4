//! Engine abstraction for declaring desired-state resources.
//!
//! Components never talk to a cloud provider directly. They describe what
//! they want through an [`Engine`], which hands back lightweight handles whose
//! attributes are [`Output`] references resolved later by whoever applies the
//! declarations.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Serialize, Serializer};

use crate::resources::{DatabaseSpec, InstanceSpec, KeyPairSpec, SecurityGroupSpec};

/// Provider resource types declared by the stack.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResourceKind {
    /// EC2 security group.
    SecurityGroup,
    /// EC2 key pair.
    KeyPair,
    /// EC2 virtual machine.
    Instance,
    /// RDS database instance.
    DatabaseInstance,
}

impl ResourceKind {
    /// Provider type token for this kind.
    #[must_use]
    pub const fn type_token(self) -> &'static str {
        match self {
            Self::SecurityGroup => "aws:ec2/securityGroup:SecurityGroup",
            Self::KeyPair => "aws:ec2/keyPair:KeyPair",
            Self::Instance => "aws:ec2/instance:Instance",
            Self::DatabaseInstance => "aws:rds/instance:Instance",
        }
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_token())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_token())
    }
}

/// Identifies a declared resource by kind and logical name.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ResourceRef {
    /// Provider resource type.
    pub kind: ResourceKind,
    /// Logical name, unique per kind within a stack.
    pub name: String,
}

impl ResourceRef {
    /// Creates a reference to the named resource.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Returns a lazily resolved attribute of this resource.
    #[must_use]
    pub fn output(&self, attribute: impl Into<String>) -> Output {
        Output {
            resource: self.clone(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.kind, self.name)
    }
}

/// Attribute of a declared resource whose value is only known once the
/// engine has applied the declaration.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Output {
    /// Resource that produces the value.
    pub resource: ResourceRef,
    /// Attribute name on that resource (for example `public_ip`).
    pub attribute: String,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.resource.name, self.attribute)
    }
}

/// Handle returned once a security group has been declared.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityGroupHandle {
    /// Graph reference to the declared group.
    pub resource: ResourceRef,
    /// Provider identifier, resolved on apply.
    pub id: Output,
}

/// Handle returned once a key pair has been declared.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPairHandle {
    /// Graph reference to the declared key pair.
    pub resource: ResourceRef,
    /// Key name other resources use to refer to the credential.
    pub key_name: String,
}

/// Handle returned once a compute instance has been declared.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceHandle {
    /// Graph reference to the declared instance.
    pub resource: ResourceRef,
    /// Public IPv4 address.
    pub public_ip: Output,
    /// Public DNS name.
    pub public_dns: Output,
    /// Subnet the instance was placed in.
    pub subnet_id: Output,
}

/// Handle returned once a database instance has been declared.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DatabaseHandle {
    /// Graph reference to the declared database.
    pub resource: ResourceRef,
    /// Listening port.
    pub port: Output,
    /// Host name of the instance.
    pub address: Output,
    /// `address:port` connection endpoint.
    pub endpoint: Output,
    /// Database name.
    pub name: Output,
    /// Directory domain, when the instance joins one.
    pub domain: Output,
}

impl SecurityGroupHandle {
    /// Handle whose attributes resolve against `resource`.
    #[must_use]
    pub fn for_resource(resource: ResourceRef) -> Self {
        Self {
            id: resource.output("id"),
            resource,
        }
    }
}

impl KeyPairHandle {
    /// Handle for a key pair registered under `key_name`.
    #[must_use]
    pub fn new(resource: ResourceRef, key_name: impl Into<String>) -> Self {
        Self {
            resource,
            key_name: key_name.into(),
        }
    }
}

impl InstanceHandle {
    /// Handle whose attributes resolve against `resource`.
    #[must_use]
    pub fn for_resource(resource: ResourceRef) -> Self {
        Self {
            public_ip: resource.output("public_ip"),
            public_dns: resource.output("public_dns"),
            subnet_id: resource.output("subnet_id"),
            resource,
        }
    }
}

impl DatabaseHandle {
    /// Handle whose attributes resolve against `resource`.
    #[must_use]
    pub fn for_resource(resource: ResourceRef) -> Self {
        Self {
            port: resource.output("port"),
            address: resource.output("address"),
            endpoint: resource.output("endpoint"),
            name: resource.output("name"),
            domain: resource.output("domain"),
            resource,
        }
    }
}

/// Future returned by engine operations.
pub type EngineFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Interface implemented by provisioning engines.
///
/// Each `create_*` call records one desired-state resource and returns its
/// handle. Implementations must resolve the cross-references carried by a
/// spec before creating the resource that holds them, and must report
/// failures instead of continuing silently.
pub trait Engine {
    /// Engine specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Declares a security group.
    fn create_security_group<'a>(
        &'a self,
        spec: &'a SecurityGroupSpec,
    ) -> EngineFuture<'a, SecurityGroupHandle, Self::Error>;

    /// Declares an SSH key pair.
    fn create_key_pair<'a>(
        &'a self,
        spec: &'a KeyPairSpec,
    ) -> EngineFuture<'a, KeyPairHandle, Self::Error>;

    /// Declares a compute instance.
    fn create_instance<'a>(
        &'a self,
        spec: &'a InstanceSpec,
    ) -> EngineFuture<'a, InstanceHandle, Self::Error>;

    /// Declares a managed database instance.
    fn create_database<'a>(
        &'a self,
        spec: &'a DatabaseSpec,
    ) -> EngineFuture<'a, DatabaseHandle, Self::Error>;

    /// Publishes a named stack output bound to a resource attribute.
    fn export<'a>(&'a self, name: &'a str, value: &'a Output) -> EngineFuture<'a, (), Self::Error>;
}
