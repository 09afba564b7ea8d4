//! Test support utilities shared across unit and integration tests.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::engine::{
    DatabaseHandle, Engine, EngineFuture, InstanceHandle, KeyPairHandle, Output,
    SecurityGroupHandle,
};
use crate::resources::{DatabaseSpec, InstanceSpec, KeyPairSpec, SecurityGroupSpec};

/// Engine operations a [`RecordingEngine`] can be told to fail.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineOperation {
    /// `create_security_group`.
    SecurityGroup,
    /// `create_key_pair`.
    KeyPair,
    /// `create_instance`.
    Instance,
    /// `create_database`.
    Database,
    /// `export`.
    Export,
}

/// A single call made through [`RecordingEngine`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EngineCall {
    /// Security group declaration.
    SecurityGroup(SecurityGroupSpec),
    /// Key pair declaration.
    KeyPair(KeyPairSpec),
    /// Instance declaration.
    Instance(InstanceSpec),
    /// Database declaration.
    Database(DatabaseSpec),
    /// Output publication.
    Export {
        /// Output name.
        name: String,
        /// Bound attribute.
        value: Output,
    },
}

impl EngineCall {
    /// Operation this call exercised.
    #[must_use]
    pub const fn operation(&self) -> EngineOperation {
        match self {
            Self::SecurityGroup(_) => EngineOperation::SecurityGroup,
            Self::KeyPair(_) => EngineOperation::KeyPair,
            Self::Instance(_) => EngineOperation::Instance,
            Self::Database(_) => EngineOperation::Database,
            Self::Export { .. } => EngineOperation::Export,
        }
    }
}

/// Error returned by a [`RecordingEngine`] scripted to fail.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted {0:?} failure")]
pub struct RecordingEngineError(pub EngineOperation);

#[derive(Debug, Default)]
struct State {
    calls: Vec<EngineCall>,
    fail_on: Option<EngineOperation>,
}

/// Fake engine that records every call in order and can fail on demand.
///
/// Calls are recorded even when they fail, so tests can assert on exactly
/// which declarations were attempted.
#[derive(Clone, Debug, Default)]
pub struct RecordingEngine {
    state: Arc<Mutex<State>>,
}

impl RecordingEngine {
    /// Creates an engine that accepts every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call of `operation` fail from now on.
    pub fn fail_on(&self, operation: EngineOperation) {
        self.state().fail_on = Some(operation);
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls of `operation`.
    #[must_use]
    pub fn count(&self, operation: EngineOperation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Names of published outputs in publication order.
    #[must_use]
    pub fn exported_names(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Export { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("recording engine lock poisoned: {err}"))
    }

    fn record(&self, call: EngineCall) -> Result<(), RecordingEngineError> {
        let operation = call.operation();
        let mut state = self.state();
        state.calls.push(call);
        if state.fail_on == Some(operation) {
            return Err(RecordingEngineError(operation));
        }
        Ok(())
    }
}

impl Engine for RecordingEngine {
    type Error = RecordingEngineError;

    fn create_security_group<'a>(
        &'a self,
        spec: &'a SecurityGroupSpec,
    ) -> EngineFuture<'a, SecurityGroupHandle, Self::Error> {
        Box::pin(async move {
            self.record(EngineCall::SecurityGroup(spec.clone()))?;
            Ok(SecurityGroupHandle::for_resource(spec.resource()))
        })
    }

    fn create_key_pair<'a>(
        &'a self,
        spec: &'a KeyPairSpec,
    ) -> EngineFuture<'a, KeyPairHandle, Self::Error> {
        Box::pin(async move {
            self.record(EngineCall::KeyPair(spec.clone()))?;
            Ok(KeyPairHandle::new(spec.resource(), spec.key_name.clone()))
        })
    }

    fn create_instance<'a>(
        &'a self,
        spec: &'a InstanceSpec,
    ) -> EngineFuture<'a, InstanceHandle, Self::Error> {
        Box::pin(async move {
            self.record(EngineCall::Instance(spec.clone()))?;
            Ok(InstanceHandle::for_resource(spec.resource()))
        })
    }

    fn create_database<'a>(
        &'a self,
        spec: &'a DatabaseSpec,
    ) -> EngineFuture<'a, DatabaseHandle, Self::Error> {
        Box::pin(async move {
            self.record(EngineCall::Database(spec.clone()))?;
            Ok(DatabaseHandle::for_resource(spec.resource()))
        })
    }

    fn export<'a>(&'a self, name: &'a str, value: &'a Output) -> EngineFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.record(EngineCall::Export {
                name: name.to_owned(),
                value: value.clone(),
            })
        })
    }
}
