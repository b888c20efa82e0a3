//! Ready-made configuration for running against the simulator.

use crate::keys;
use crate::network::SimulatedNetwork;
use alloy_primitives::Address;
use warden_core::{OwnerKey, WardenConfig, WardenResult};

pub const SANDBOX_RPC_URL: &str = "sim://rpc";
pub const SANDBOX_BUNDLER_URL: &str = "sim://bundler";
pub const SANDBOX_PAYMASTER_URL: &str = "sim://paymaster";
pub const SANDBOX_RELAY_API_KEY: &str = "sim-relay-key";

/// Owner key of the protected account in the sandbox.
pub fn owner_key() -> OwnerKey {
    OwnerKey::new(format!("0x{}", "4c".repeat(32)))
}

/// Owner installed by a sandbox recovery.
pub fn new_owner_address() -> Address {
    keys::address(keys::derive_secret("sandbox/new-owner", 0))
}

/// Fill every unset value needed to talk to `network`.
///
/// The owner address follows from the owner key when only the key is set,
/// and the key is registered so the simulator can verify its signatures.
pub fn fill_sandbox_defaults(
    config: &mut WardenConfig,
    network: &SimulatedNetwork,
) -> WardenResult<()> {
    let key = config.owner_private_key.get_or_insert_with(owner_key).clone();
    let owner = network.register_owner_key(&key)?;
    config.owner_address.get_or_insert(owner);
    config
        .new_owner_address
        .get_or_insert_with(new_owner_address);
    config
        .rpc_url
        .get_or_insert_with(|| SANDBOX_RPC_URL.to_string());
    config
        .bundler_url
        .get_or_insert_with(|| SANDBOX_BUNDLER_URL.to_string());
    config
        .paymaster_url
        .get_or_insert_with(|| SANDBOX_PAYMASTER_URL.to_string());
    config.chain_id.get_or_insert(network.chain_id());
    config
        .relay_api_key
        .get_or_insert_with(|| SANDBOX_RELAY_API_KEY.to_string());
    Ok(())
}

/// A complete configuration for `network`.
pub fn sandbox_config(network: &SimulatedNetwork) -> WardenResult<WardenConfig> {
    let mut config = WardenConfig::default();
    fill_sandbox_defaults(&mut config, network)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_config_is_complete() {
        let network = SimulatedNetwork::new();
        let config = sandbox_config(&network).unwrap();
        assert_eq!(
            config.require_owner_address().unwrap(),
            keys::owner_address(&owner_key()).unwrap()
        );
        assert_eq!(config.require_chain_id().unwrap(), network.chain_id());
        assert!(config.require_paymaster_url().is_ok());
        assert!(config.require_relay_api_key().is_ok());
    }

    #[test]
    fn explicit_values_are_kept() {
        let network = SimulatedNetwork::new();
        let mut config = WardenConfig {
            chain_id: Some(1),
            owner_address: Some(Address::repeat_byte(9)),
            ..WardenConfig::default()
        };
        fill_sandbox_defaults(&mut config, &network).unwrap();
        assert_eq!(config.chain_id, Some(1));
        assert_eq!(config.owner_address, Some(Address::repeat_byte(9)));
    }
}
