//! Workflow configuration.
//!
//! Values come from a TOML file and `WARDEN_*` environment variables, with the
//! environment taking precedence. Required values are optional here and are
//! only checked when an action first needs them, so a partially configured
//! session can still sign in.

use crate::{WardenError, WardenResult};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "WARDEN_";

/// Default session signature lifetime (one hour).
pub const DEFAULT_SESSION_EXPIRATION_SECS: u64 = 60 * 60;

/// Default nominal inclusion wait.
pub const DEFAULT_INCLUSION_TIMEOUT_MS: u64 = 120_000;

/// Default bundler poll interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Hex-encoded owner private key. Wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct OwnerKey(String);

impl OwnerKey {
    /// Wrap a hex-encoded key.
    pub fn new(hex_key: impl Into<String>) -> Self {
        Self(hex_key.into())
    }

    /// Decoded key bytes, wiped when the returned buffer is dropped.
    pub fn to_bytes(&self) -> WardenResult<Zeroizing<Vec<u8>>> {
        let trimmed = self.0.trim().trim_start_matches("0x");
        let bytes = hex::decode(trimmed)
            .map(Zeroizing::new)
            .map_err(|e| WardenError::config(format!("owner_private_key is not hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(WardenError::config(format!(
                "owner_private_key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OwnerKey(<redacted>)")
    }
}

/// Configuration for one recovery session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Owner of the protected account
    pub owner_address: Option<Address>,
    /// Owner installed by recovery
    pub new_owner_address: Option<Address>,
    /// JSON-RPC node endpoint
    pub rpc_url: Option<String>,
    /// ERC-4337 bundler endpoint
    pub bundler_url: Option<String>,
    /// Paymaster endpoint
    pub paymaster_url: Option<String>,
    /// Chain id for signatures
    pub chain_id: Option<u64>,
    /// Key-network relay API key used for minting
    pub relay_api_key: Option<String>,
    /// Owner private key, used only for the owner-signed step of add-guardian
    pub owner_private_key: Option<OwnerKey>,
    /// Identity provider name expected in the redirect marker
    pub identity_provider: String,
    /// Where the identity provider sends the user back
    pub redirect_uri: String,
    /// Guardian approvals needed for recovery
    pub guardian_threshold: u64,
    /// Owner threshold after recovery
    pub new_threshold: u64,
    /// Start recovery immediately when the threshold is met
    pub auto_execute: bool,
    /// Salt of the protected account
    pub protected_salt: U256,
    /// Salt of the guardian's own account
    pub guardian_salt: U256,
    /// Lifetime of each signing session
    pub session_expiration_secs: u64,
    /// Nominal wait for inclusion
    pub inclusion_timeout_ms: u64,
    /// Delay between receipt polls
    pub poll_interval_ms: u64,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            owner_address: None,
            new_owner_address: None,
            rpc_url: None,
            bundler_url: None,
            paymaster_url: None,
            chain_id: None,
            relay_api_key: None,
            owner_private_key: None,
            identity_provider: "google".to_string(),
            redirect_uri: "http://localhost:5173/".to_string(),
            guardian_threshold: 1,
            new_threshold: 1,
            auto_execute: true,
            protected_salt: U256::ZERO,
            guardian_salt: U256::ZERO,
            session_expiration_secs: DEFAULT_SESSION_EXPIRATION_SECS,
            inclusion_timeout_ms: DEFAULT_INCLUSION_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn missing(key: &str) -> WardenError {
    WardenError::config(format!(
        "missing {key} (set it in the config file or {ENV_PREFIX}{})",
        key.to_uppercase()
    ))
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> WardenResult<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| WardenError::config(format!("{ENV_PREFIX}{key}: {e}")))
}

impl WardenConfig {
    /// Load from a TOML file.
    pub fn load_from_file(path: &Path) -> WardenResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WardenError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML text.
    pub fn from_toml_str(content: &str) -> WardenResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a file if it exists, then apply the process environment.
    pub fn load(path: Option<&Path>) -> WardenResult<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::load_from_file(path)?,
            Some(path) => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.merge_with_env_vars(std::env::vars())?;
        Ok(config)
    }

    /// Apply `WARDEN_*` overrides from an iterator of variables.
    pub fn merge_with_env_vars<I>(&mut self, vars: I) -> WardenResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                self.set_from_string(&key.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Set one value by key. Unknown keys are ignored with a debug log.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> WardenResult<()> {
        match key {
            "owner_address" => self.owner_address = Some(parse_env(key, value)?),
            "new_owner_address" => self.new_owner_address = Some(parse_env(key, value)?),
            "rpc_url" => self.rpc_url = Some(value.to_string()),
            "bundler_url" => self.bundler_url = Some(value.to_string()),
            "paymaster_url" => self.paymaster_url = Some(value.to_string()),
            "chain_id" => self.chain_id = Some(parse_env(key, value)?),
            "relay_api_key" => self.relay_api_key = Some(value.to_string()),
            "owner_private_key" => self.owner_private_key = Some(OwnerKey::new(value)),
            "identity_provider" => self.identity_provider = value.to_string(),
            "redirect_uri" => self.redirect_uri = value.to_string(),
            "guardian_threshold" => self.guardian_threshold = parse_env(key, value)?,
            "new_threshold" => self.new_threshold = parse_env(key, value)?,
            "auto_execute" => self.auto_execute = parse_env(key, value)?,
            "protected_salt" => self.protected_salt = parse_env(key, value)?,
            "guardian_salt" => self.guardian_salt = parse_env(key, value)?,
            "session_expiration_secs" => self.session_expiration_secs = parse_env(key, value)?,
            "inclusion_timeout_ms" => self.inclusion_timeout_ms = parse_env(key, value)?,
            "poll_interval_ms" => self.poll_interval_ms = parse_env(key, value)?,
            other => tracing::debug!(key = other, "ignoring unknown config override"),
        }
        Ok(())
    }

    pub fn require_owner_address(&self) -> WardenResult<Address> {
        self.owner_address.ok_or_else(|| missing("owner_address"))
    }

    pub fn require_new_owner_address(&self) -> WardenResult<Address> {
        self.new_owner_address
            .ok_or_else(|| missing("new_owner_address"))
    }

    pub fn require_rpc_url(&self) -> WardenResult<&str> {
        self.rpc_url.as_deref().ok_or_else(|| missing("rpc_url"))
    }

    pub fn require_bundler_url(&self) -> WardenResult<&str> {
        self.bundler_url
            .as_deref()
            .ok_or_else(|| missing("bundler_url"))
    }

    pub fn require_paymaster_url(&self) -> WardenResult<&str> {
        self.paymaster_url
            .as_deref()
            .ok_or_else(|| missing("paymaster_url"))
    }

    pub fn require_chain_id(&self) -> WardenResult<u64> {
        self.chain_id.ok_or_else(|| missing("chain_id"))
    }

    pub fn require_relay_api_key(&self) -> WardenResult<&str> {
        self.relay_api_key
            .as_deref()
            .ok_or_else(|| missing("relay_api_key"))
    }

    pub fn require_owner_private_key(&self) -> WardenResult<&OwnerKey> {
        self.owner_private_key
            .as_ref()
            .ok_or_else(|| missing("owner_private_key"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn defaults_leave_required_values_unset() {
        let config = WardenConfig::default();
        assert_matches!(
            config.require_owner_address(),
            Err(WardenError::Config { message }) if message.contains("WARDEN_OWNER_ADDRESS")
        );
        assert_eq!(config.guardian_threshold, 1);
        assert!(config.auto_execute);
    }

    #[test]
    fn toml_file_then_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
owner_address = "0xE4c711d31fe110bC4AD3A964d06088c2723de88E"
chain_id = 11155111
bundler_url = "https://bundler.example/rpc"
"#
        )
        .unwrap();

        let mut config = WardenConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.require_chain_id().unwrap(), 11_155_111);

        config
            .merge_with_env_vars([
                ("WARDEN_CHAIN_ID".to_string(), "1".to_string()),
                ("WARDEN_PAYMASTER_URL".to_string(), "https://pm".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ])
            .unwrap();
        assert_eq!(config.require_chain_id().unwrap(), 1);
        assert_eq!(config.require_paymaster_url().unwrap(), "https://pm");
        assert_eq!(
            config.require_bundler_url().unwrap(),
            "https://bundler.example/rpc"
        );
    }

    #[test]
    fn malformed_override_is_a_config_error() {
        let mut config = WardenConfig::default();
        let result =
            config.merge_with_env_vars([("WARDEN_CHAIN_ID".to_string(), "sepolia".to_string())]);
        assert_matches!(result, Err(WardenError::Config { .. }));
    }

    #[test]
    fn owner_key_is_redacted_and_validated() {
        let key = OwnerKey::new(format!("0x{}", "11".repeat(32)));
        let bytes: Zeroizing<Vec<u8>> = key.to_bytes().unwrap();
        assert_eq!(bytes.as_slice(), &[0x11; 32]);
        assert_eq!(format!("{key:?}"), "OwnerKey(<redacted>)");
        assert!(OwnerKey::new("0x1234").to_bytes().is_err());
    }
}
