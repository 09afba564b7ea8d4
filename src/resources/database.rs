//! Managed PostgreSQL instance backing RStudio Package Manager.
//!
//! The instance is declared with a static admin password, public access and
//! no final snapshot on destroy. These settings are kept as declared and are
//! logged as warnings every time the database is declared.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use super::{ValidationError, require_field};
use crate::engine::{DatabaseHandle, Engine, Output, ResourceKind, ResourceRef};
use crate::stack::StackError;
use crate::tags::TagSet;

/// Logical name of the database instance.
pub const DATABASE_NAME: &str = "pg-db";
/// `Name` tag applied to the database.
pub const DATABASE_TAG_NAME: &str = "rsw-db";
/// RDS instance class.
pub const INSTANCE_CLASS: &str = "db.t3.micro";
/// Allocated storage in gigabytes.
pub const ALLOCATED_STORAGE_GB: u32 = 5;
/// Administrative user.
pub const ADMIN_USERNAME: &str = "rsw_db_admin";
/// Administrative password.
pub const ADMIN_PASSWORD: &str = "password";
/// Initial database.
pub const DB_NAME: &str = "rstudio_pm";
/// Database engine.
pub const DB_ENGINE: &str = "postgres";

/// Output carrying the listening port.
pub const DB_PORT: &str = "db_port";
/// Output carrying the host name.
pub const DB_ADDRESS: &str = "db_address";
/// Output carrying the `address:port` endpoint.
pub const DB_ENDPOINT: &str = "db_endpoint";
/// Output carrying the database name.
pub const DB_NAME_OUTPUT: &str = "db_name";
/// Output carrying the directory domain.
pub const DB_DOMAIN: &str = "db_domain";
/// Every output published for the database.
pub const DATABASE_OUTPUTS: [&str; 5] = [DB_PORT, DB_ADDRESS, DB_ENDPOINT, DB_NAME_OUTPUT, DB_DOMAIN];

/// Desired state of the database instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// Logical name.
    #[serde(skip)]
    pub name: String,
    /// RDS instance class.
    pub instance_class: String,
    /// Storage in gigabytes.
    pub allocated_storage: u32,
    /// Administrative user.
    pub username: String,
    /// Administrative password.
    pub password: String,
    /// Initial database name.
    pub db_name: String,
    /// Database engine.
    pub engine: String,
    /// Whether the instance gets a public address.
    pub publicly_accessible: bool,
    /// Whether destroy skips the final snapshot.
    pub skip_final_snapshot: bool,
    /// Attached tags.
    pub tags: TagSet,
    /// Security groups the instance joins.
    pub vpc_security_group_ids: Vec<Output>,
}

impl DatabaseSpec {
    /// Builds the database spec. `tags` are overlaid with `Name = rsw-db`.
    #[must_use]
    pub fn new(tags: &TagSet, security_group_id: &Output) -> Self {
        Self {
            name: DATABASE_NAME.to_owned(),
            instance_class: INSTANCE_CLASS.to_owned(),
            allocated_storage: ALLOCATED_STORAGE_GB,
            username: ADMIN_USERNAME.to_owned(),
            password: ADMIN_PASSWORD.to_owned(),
            db_name: DB_NAME.to_owned(),
            engine: DB_ENGINE.to_owned(),
            publicly_accessible: true,
            skip_final_snapshot: true,
            tags: tags.with_name(DATABASE_TAG_NAME),
            vpc_security_group_ids: vec![security_group_id.clone()],
        }
    }

    /// Graph reference for this database.
    #[must_use]
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(ResourceKind::DatabaseInstance, self.name.clone())
    }

    /// Resources that must exist before this database.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<ResourceRef> {
        self.vpc_security_group_ids
            .iter()
            .map(|id| id.resource.clone())
            .collect()
    }

    /// Rejects empty attributes, zero storage and a missing security group.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the offending attribute.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("instance_class", &self.instance_class),
            ("username", &self.username),
            ("password", &self.password),
            ("db_name", &self.db_name),
            ("engine", &self.engine),
        ] {
            require_field(&self.name, field, value)?;
        }
        if self.allocated_storage == 0 {
            return Err(ValidationError::NonPositive {
                resource: self.name.clone(),
                field: String::from("allocated_storage"),
            });
        }
        if self.vpc_security_group_ids.is_empty() {
            return Err(ValidationError::MissingSecurityGroup {
                resource: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Insecure settings carried by this declaration. The admin password is
    /// always a literal baked into the declaration.
    #[must_use]
    pub fn exposures(&self) -> Vec<&'static str> {
        let mut found = vec!["admin password is a static literal"];
        if self.publicly_accessible {
            found.push("database is publicly accessible");
        }
        if self.skip_final_snapshot {
            found.push("no final snapshot is taken on destroy");
        }
        found
    }
}

/// Declares the database and publishes its five outputs.
///
/// # Errors
///
/// Returns [`StackError::Validation`] for a malformed spec,
/// [`StackError::Provisioning`] when the engine rejects the instance and
/// [`StackError::Export`] when an output cannot be published.
pub async fn create<E: Engine>(
    engine: &E,
    tags: &TagSet,
    security_group_id: &Output,
) -> Result<DatabaseHandle, StackError<E::Error>> {
    let spec = DatabaseSpec::new(tags, security_group_id);
    spec.validate()?;
    for exposure in spec.exposures() {
        warn!(database = %spec.name, "{exposure}");
    }

    let handle = engine
        .create_database(&spec)
        .await
        .map_err(|source| StackError::Provisioning {
            resource: spec.resource(),
            source,
        })?;
    info!(
        database = %spec.name,
        instance_class = %spec.instance_class,
        db_name = %spec.db_name,
        "declared database instance"
    );

    let outputs = [
        (DB_PORT, &handle.port),
        (DB_ADDRESS, &handle.address),
        (DB_ENDPOINT, &handle.endpoint),
        (DB_NAME_OUTPUT, &handle.name),
        (DB_DOMAIN, &handle.domain),
    ];
    for (name, value) in outputs {
        crate::stack::publish(engine, name, value).await?;
    }
    Ok(handle)
}
