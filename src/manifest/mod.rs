//! Desired-state manifest engine.
//!
//! [`ManifestEngine`] does not talk to a cloud provider. It records every
//! declaration, the dependency edges implied by its cross-references, and
//! the published outputs into a [`StackManifest`] that an external
//! provisioning tool can apply.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::engine::{
    DatabaseHandle, Engine, EngineFuture, InstanceHandle, KeyPairHandle, Output, ResourceKind,
    ResourceRef, SecurityGroupHandle,
};
use crate::resources::{DatabaseSpec, InstanceSpec, KeyPairSpec, SecurityGroupSpec};

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Errors raised while recording or rendering a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Raised when a resource is declared twice.
    #[error("resource {0} is already declared")]
    DuplicateResource(ResourceRef),
    /// Raised when an output name is published twice.
    #[error("output {0} is already published")]
    DuplicateOutput(String),
    /// Raised when a declaration or output refers to an undeclared resource.
    #[error("{referrer} refers to undeclared resource {missing}")]
    UnknownResource {
        /// What holds the reference.
        referrer: String,
        /// The resource that was not found.
        missing: ResourceRef,
    },
    /// Raised when the dependency graph contains a cycle.
    #[error("dependency cycle between: {0}")]
    Cycle(String),
    /// Raised when a spec cannot be converted to JSON.
    #[error("failed to serialise manifest: {0}")]
    Serialise(#[from] serde_json::Error),
    /// Raised when the manifest cannot be written.
    #[error("failed to write {path}: {message}")]
    Io {
        /// Path being written.
        path: String,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a previous panic poisoned the recorder.
    #[error("manifest recorder is poisoned")]
    Poisoned,
}

/// One declared resource.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResource {
    /// Provider resource type.
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Logical name.
    pub name: String,
    /// Resources that must be applied first.
    pub depends_on: Vec<ResourceRef>,
    /// Provider inputs.
    pub properties: serde_json::Value,
}

impl ManifestResource {
    /// Graph reference for this resource.
    #[must_use]
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(self.kind, self.name.clone())
    }
}

/// Desired state of a whole stack.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackManifest {
    /// Format version.
    pub version: u32,
    /// Identifier of the run that produced the manifest.
    pub run_id: Uuid,
    /// Project the stack belongs to.
    pub project: String,
    /// Resources in declaration order.
    pub resources: Vec<ManifestResource>,
    /// Published outputs by name.
    pub outputs: BTreeMap<String, Output>,
}

impl StackManifest {
    /// Creates an empty manifest with a fresh run identifier.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            run_id: Uuid::new_v4(),
            project: project.into(),
            resources: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Looks up a declared resource.
    #[must_use]
    pub fn resource(&self, reference: &ResourceRef) -> Option<&ManifestResource> {
        self.resources
            .iter()
            .find(|entry| entry.kind == reference.kind && entry.name == reference.name)
    }

    /// Returns resources ordered so that every dependency comes before its
    /// dependents. Ties keep declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnknownResource`] when an edge points outside
    /// the manifest and [`ManifestError::Cycle`] when no order exists.
    pub fn apply_order(&self) -> Result<Vec<ResourceRef>, ManifestError> {
        let declared: BTreeSet<ResourceRef> =
            self.resources.iter().map(ManifestResource::resource).collect();
        for entry in &self.resources {
            if let Some(missing) = entry
                .depends_on
                .iter()
                .find(|dependency| !declared.contains(*dependency))
            {
                return Err(ManifestError::UnknownResource {
                    referrer: entry.resource().to_string(),
                    missing: missing.clone(),
                });
            }
        }

        let mut placed = BTreeSet::new();
        let mut order = Vec::with_capacity(self.resources.len());
        while order.len() < self.resources.len() {
            let next = self.resources.iter().find(|entry| {
                !placed.contains(&entry.resource())
                    && entry.depends_on.iter().all(|dep| placed.contains(dep))
            });
            let Some(entry) = next else {
                let stuck = self
                    .resources
                    .iter()
                    .map(ManifestResource::resource)
                    .filter(|resource| !placed.contains(resource))
                    .map(|resource| resource.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ManifestError::Cycle(stuck));
            };
            placed.insert(entry.resource());
            order.push(entry.resource());
        }
        Ok(order)
    }

    /// Renders the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Serialise`] when rendering fails.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the manifest as JSON to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] when the file cannot be written.
    pub fn write_to(&self, path: &Utf8Path) -> Result<(), ManifestError> {
        let rendered = self.to_json()?;
        let parent = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let io_error = |target: &Utf8Path, err: &std::io::Error| ManifestError::Io {
            path: target.to_string(),
            message: err.to_string(),
        };

        Dir::create_ambient_dir_all(parent, ambient_authority())
            .map_err(|err| io_error(parent, &err))?;
        let file_name = path.file_name().ok_or_else(|| ManifestError::Io {
            path: path.to_string(),
            message: String::from("manifest path is missing a filename"),
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| io_error(parent, &err))?;
        dir.write(file_name, rendered)
            .map_err(|err| io_error(path, &err))
    }
}

/// Engine that records declarations into a [`StackManifest`].
#[derive(Debug)]
pub struct ManifestEngine {
    manifest: Mutex<StackManifest>,
}

impl ManifestEngine {
    /// Creates an engine recording into an empty manifest for `project`.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            manifest: Mutex::new(StackManifest::new(project)),
        }
    }

    /// Returns a copy of everything recorded so far.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Poisoned`] when the recorder is poisoned.
    pub fn snapshot(&self) -> Result<StackManifest, ManifestError> {
        Ok(self.lock()?.clone())
    }

    /// Consumes the engine and returns the recorded manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Poisoned`] when the recorder is poisoned.
    pub fn into_manifest(self) -> Result<StackManifest, ManifestError> {
        self.manifest
            .into_inner()
            .map_err(|_| ManifestError::Poisoned)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StackManifest>, ManifestError> {
        self.manifest.lock().map_err(|_| ManifestError::Poisoned)
    }

    fn record<S: Serialize>(
        &self,
        resource: &ResourceRef,
        depends_on: BTreeSet<ResourceRef>,
        spec: &S,
    ) -> Result<(), ManifestError> {
        let properties = serde_json::to_value(spec)?;
        let mut manifest = self.lock()?;
        if manifest.resource(resource).is_some() {
            return Err(ManifestError::DuplicateResource(resource.clone()));
        }
        if let Some(missing) = depends_on
            .iter()
            .find(|dependency| manifest.resource(dependency).is_none())
        {
            return Err(ManifestError::UnknownResource {
                referrer: resource.to_string(),
                missing: missing.clone(),
            });
        }

        debug!(%resource, depends_on = ?depends_on, "recording resource");
        manifest.resources.push(ManifestResource {
            kind: resource.kind,
            name: resource.name.clone(),
            depends_on: depends_on.into_iter().collect(),
            properties,
        });
        Ok(())
    }
}

impl Engine for ManifestEngine {
    type Error = ManifestError;

    fn create_security_group<'a>(
        &'a self,
        spec: &'a SecurityGroupSpec,
    ) -> EngineFuture<'a, SecurityGroupHandle, Self::Error> {
        Box::pin(async move {
            let resource = spec.resource();
            self.record(&resource, BTreeSet::new(), spec)?;
            Ok(SecurityGroupHandle::for_resource(resource))
        })
    }

    fn create_key_pair<'a>(
        &'a self,
        spec: &'a KeyPairSpec,
    ) -> EngineFuture<'a, KeyPairHandle, Self::Error> {
        Box::pin(async move {
            let resource = spec.resource();
            self.record(&resource, BTreeSet::new(), spec)?;
            Ok(KeyPairHandle::new(resource, spec.key_name.clone()))
        })
    }

    fn create_instance<'a>(
        &'a self,
        spec: &'a InstanceSpec,
    ) -> EngineFuture<'a, InstanceHandle, Self::Error> {
        Box::pin(async move {
            let resource = spec.resource();
            self.record(&resource, spec.dependencies(), spec)?;
            Ok(InstanceHandle::for_resource(resource))
        })
    }

    fn create_database<'a>(
        &'a self,
        spec: &'a DatabaseSpec,
    ) -> EngineFuture<'a, DatabaseHandle, Self::Error> {
        Box::pin(async move {
            let resource = spec.resource();
            self.record(&resource, spec.dependencies(), spec)?;
            Ok(DatabaseHandle::for_resource(resource))
        })
    }

    fn export<'a>(&'a self, name: &'a str, value: &'a Output) -> EngineFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut manifest = self.lock()?;
            if manifest.outputs.contains_key(name) {
                return Err(ManifestError::DuplicateOutput(name.to_owned()));
            }
            if manifest.resource(&value.resource).is_none() {
                return Err(ManifestError::UnknownResource {
                    referrer: format!("output {name}"),
                    missing: value.resource.clone(),
                });
            }
            manifest.outputs.insert(name.to_owned(), value.clone());
            Ok(())
        })
    }
}
