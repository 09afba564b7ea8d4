//! Stack orchestration.
//!
//! The orchestrator loads configuration and declares every resource in
//! dependency order: security group, key pair, server, database. The first
//! failure stops the run, so nothing after it is declared.

use tracing::{debug, info, instrument};

use crate::config::{Configuration, StackSettings};
use crate::engine::{
    DatabaseHandle, Engine, InstanceHandle, KeyPairHandle, Output, SecurityGroupHandle,
};
use crate::resources::compute::{self, SERVER_NAME, SERVER_OUTPUTS};
use crate::resources::database::{self, DATABASE_OUTPUTS};
use crate::resources::{credential, network};
use crate::tags::TagSet;

mod error;

pub use error::StackError;

/// `Name` tag handed to the database provisioner, which replaces it with its
/// own.
const DATABASE_REQUEST_NAME: &str = "pgdatabase";

/// Handles for every declared resource plus the published output names.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackOutcome {
    /// Security group guarding both instances.
    pub security_group: SecurityGroupHandle,
    /// Operator key pair.
    pub key_pair: KeyPairHandle,
    /// Compute instance.
    pub server: InstanceHandle,
    /// Database instance.
    pub database: DatabaseHandle,
    /// Output names in publication order.
    pub outputs: Vec<&'static str>,
}

/// Declares the whole stack through an engine.
#[derive(Debug)]
pub struct StackOrchestrator<E> {
    engine: E,
}

impl<E> StackOrchestrator<E>
where
    E: Engine,
{
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Borrows the engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the engine, for example to extract what it recorded.
    #[must_use]
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Validates `settings` and declares the stack.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::Config`] before any declaration when a required
    /// value is missing, otherwise whatever [`Self::declare`] returns.
    pub async fn execute(
        &self,
        settings: &StackSettings,
    ) -> Result<StackOutcome, StackError<E::Error>> {
        let config = Configuration::from_settings(settings)?;
        self.declare(&config).await
    }

    /// Declares every resource in dependency order and publishes outputs.
    ///
    /// # Errors
    ///
    /// Returns [`StackError`] from the first step that fails; later steps are
    /// not attempted.
    #[instrument(skip_all, fields(owner = %config.email()))]
    pub async fn declare(
        &self,
        config: &Configuration,
    ) -> Result<StackOutcome, StackError<E::Error>> {
        let tags = TagSet::base(config);
        debug!(?tags, "composed base tags");

        let security_group = network::create(&self.engine, &tags).await?;
        let key_pair = credential::create(&self.engine, config, &tags).await?;
        let server = compute::create(
            &self.engine,
            &tags.with_name(SERVER_NAME),
            &key_pair,
            std::slice::from_ref(&security_group.id),
        )
        .await?;
        let database = database::create(
            &self.engine,
            &tags.with_name(DATABASE_REQUEST_NAME),
            &security_group.id,
        )
        .await?;

        let outputs = SERVER_OUTPUTS
            .iter()
            .chain(DATABASE_OUTPUTS.iter())
            .copied()
            .collect::<Vec<_>>();
        info!(outputs = outputs.len(), "stack declared");

        Ok(StackOutcome {
            security_group,
            key_pair,
            server,
            database,
            outputs,
        })
    }
}

/// Publishes one output, wrapping engine failures with the output name.
pub(crate) async fn publish<E: Engine>(
    engine: &E,
    name: &str,
    value: &Output,
) -> Result<(), StackError<E::Error>> {
    engine
        .export(name, value)
        .await
        .map_err(|source| StackError::Export {
            output: name.to_owned(),
            source,
        })?;
    info!(output = name, value = %value, "published output");
    Ok(())
}
