//! Shared constants for integration tests.

/// Operator email used across tests.
pub const EMAIL: &str = "alice@example.com";

/// Well-formed OpenSSH public key.
pub const PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIG alice@laptop";
