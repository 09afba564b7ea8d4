//! Configuration loading via `ortho-config`.
//!
//! Two values drive the whole stack: the operator's `email` and the SSH
//! `public_key` installed on the server. Both are required; the rest of the
//! crate only ever sees them through an immutable [`Configuration`].

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

const APP_NAME: &str = "rsw-infra";
const CONFIG_FILE_NAME: &str = "rsw-infra.toml";

/// Raw settings layered from configuration files and environment variables.
///
/// Fields stay optional so that an absent value can be reported by name
/// instead of surfacing as an opaque merge failure.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "RSW",
    discovery(
        app_name = "rsw-infra",
        env_var = "RSW_INFRA_CONFIG_PATH",
        config_file_name = "rsw-infra.toml",
        dotfile_name = ".rsw-infra.toml",
        project_file_name = "rsw-infra.toml"
    )
)]
pub struct StackSettings {
    /// Operator email. Used as the owner tag and to name the key pair.
    pub email: Option<String>,
    /// OpenSSH public key installed on the server.
    pub public_key: Option<String>,
}

impl StackSettings {
    /// Builds settings from explicit values, bypassing discovery.
    #[must_use]
    pub fn new(email: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            public_key: Some(public_key.into()),
        }
    }

    /// Loads settings without attempting to parse CLI arguments. Values merge
    /// configuration files and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

/// Metadata for a required key, used to generate actionable error messages.
struct RequiredKey {
    key: &'static str,
    env_var: &'static str,
}

const EMAIL: RequiredKey = RequiredKey {
    key: "email",
    env_var: "RSW_EMAIL",
};

const PUBLIC_KEY: RequiredKey = RequiredKey {
    key: "public_key",
    env_var: "RSW_PUBLIC_KEY",
};

impl RequiredKey {
    fn require(&self, value: Option<&String>) -> Result<String, ConfigError> {
        match value {
            Some(present) if !present.trim().is_empty() => Ok(present.clone()),
            _ => Err(ConfigError::MissingConfiguration {
                key: self.key.to_owned(),
                hint: format!(
                    "set {} or add {} to {CONFIG_FILE_NAME}",
                    self.env_var, self.key
                ),
            }),
        }
    }
}

/// Validated, immutable configuration shared by every component.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Configuration {
    email: String,
    public_key: String,
}

impl Configuration {
    /// Loads settings from the environment and configuration files and
    /// checks that both required keys are present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the sources cannot be merged and
    /// [`ConfigError::MissingConfiguration`] when a key is absent or empty.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = StackSettings::load_without_cli_args()?;
        Self::from_settings(&settings)
    }

    /// Validates already-loaded settings. Values are kept exactly as read.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingConfiguration`] naming the first absent
    /// or empty key (`email` is checked before `public_key`).
    pub fn from_settings(settings: &StackSettings) -> Result<Self, ConfigError> {
        let email = EMAIL.require(settings.email.as_ref())?;
        let public_key = PUBLIC_KEY.require(settings.public_key.as_ref())?;
        Ok(Self { email, public_key })
    }

    /// Operator email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// SSH public key material, unmodified.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A required key is absent or empty.
    #[error("missing required configuration value `{key}`: {hint}")]
    MissingConfiguration {
        /// Name of the missing key.
        key: String,
        /// How to supply the value.
        hint: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error(
        "configuration parsing failed: {0} (quote values that look like numbers or booleans in rsw-infra.toml)"
    )]
    Parse(String),
}

impl ConfigError {
    /// Returns the missing key when this is a missing-value error.
    #[must_use]
    pub fn missing_key(&self) -> Option<&str> {
        match self {
            Self::MissingConfiguration { key, .. } => Some(key),
            Self::Parse(_) => None,
        }
    }
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
