//! SSH key pair bound to the operator's public key.

use serde::Serialize;
use tracing::info;

use super::{ValidationError, require_field};
use crate::config::Configuration;
use crate::engine::{Engine, KeyPairHandle, ResourceKind, ResourceRef};
use crate::stack::StackError;
use crate::tags::TagSet;

/// Logical name of the key pair.
pub const KEY_PAIR_NAME: &str = "ec2 key pair";

const KEY_NAME_SUFFIX: &str = "-keypair-for-pulumi";
const NAME_TAG_SUFFIX: &str = "-key-pair";
const KEY_TYPE_PREFIXES: [&str; 3] = ["ssh-", "ecdsa-sha2-", "sk-"];

/// Provider-side key name derived from the operator email.
#[must_use]
pub fn key_name_for(email: &str) -> String {
    format!("{email}{KEY_NAME_SUFFIX}")
}

/// Desired state of the key pair.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairSpec {
    /// Logical name.
    #[serde(skip)]
    pub name: String,
    /// Provider-side key name.
    pub key_name: String,
    /// OpenSSH public key, exactly as configured.
    pub public_key: String,
    /// Attached tags.
    pub tags: TagSet,
}

impl KeyPairSpec {
    /// Builds the operator's key pair. `tags` gain a `Name` of
    /// `<email>-key-pair`.
    #[must_use]
    pub fn for_operator(config: &Configuration, tags: &TagSet) -> Self {
        Self {
            name: KEY_PAIR_NAME.to_owned(),
            key_name: key_name_for(config.email()),
            public_key: config.public_key().to_owned(),
            tags: tags.with_name(format!("{}{NAME_TAG_SUFFIX}", config.email())),
        }
    }

    /// Graph reference for this key pair.
    #[must_use]
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(ResourceKind::KeyPair, self.name.clone())
    }

    /// Checks the key name and the shape of the public key.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyField`] for an empty key name and
    /// [`ValidationError::PublicKey`] when the key is not of the form
    /// `<type> <body> [comment]` with a known type prefix.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_field(&self.name, "key_name", &self.key_name)?;
        check_public_key(&self.public_key).map_err(|reason| ValidationError::PublicKey {
            resource: self.name.clone(),
            reason: reason.to_owned(),
        })
    }
}

fn check_public_key(key: &str) -> Result<(), &'static str> {
    let mut fields = key.split_whitespace();
    let Some(key_type) = fields.next() else {
        return Err("key material is empty");
    };
    if !KEY_TYPE_PREFIXES
        .iter()
        .any(|prefix| key_type.starts_with(prefix))
    {
        return Err("unrecognised key type");
    }
    if fields.next().is_none() {
        return Err("missing key body");
    }
    Ok(())
}

/// Declares the key pair.
///
/// # Errors
///
/// Returns [`StackError::Validation`] when the public key is malformed and
/// [`StackError::Provisioning`] when the engine rejects the declaration.
pub async fn create<E: Engine>(
    engine: &E,
    config: &Configuration,
    tags: &TagSet,
) -> Result<KeyPairHandle, StackError<E::Error>> {
    let spec = KeyPairSpec::for_operator(config, tags);
    spec.validate()?;

    let handle = engine
        .create_key_pair(&spec)
        .await
        .map_err(|source| StackError::Provisioning {
            resource: spec.resource(),
            source,
        })?;
    info!(key_name = %spec.key_name, "declared key pair");
    Ok(handle)
}
