//! Calldata for the social recovery module and the Safe account.
//!
//! Only the four calls the recovery workflow issues are covered. The contract
//! interfaces are declared with `sol!`; [`ModuleCall`] is the decoded view the
//! workflow and the simulator match on.

use crate::account::MetaTransaction;
use crate::{WardenError, WardenResult};
use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use serde::{Deserialize, Serialize};
use std::fmt;

sol! {
    /// Module management on the Safe account
    #[derive(Debug, PartialEq, Eq)]
    interface ISafe {
        function enableModule(address module) external;
    }

    /// Candide social recovery module
    #[derive(Debug, PartialEq, Eq)]
    interface ISocialRecoveryModule {
        function addGuardianWithThreshold(address wallet, address guardian, uint256 threshold) external;
        function confirmRecovery(address wallet, address[] newOwners, uint256 newThreshold, bool execute) external;
        function finalizeRecovery(address wallet) external;
    }

    /// Batch executor the account delegates multi-call operations to
    #[derive(Debug, PartialEq, Eq)]
    interface IMultiSend {
        function multiSend(bytes transactions) external payable;
    }
}

/// A decoded module or account call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleCall {
    /// Activate a module on the calling account
    EnableModule { module: Address },
    /// Register a guardian and set the approval threshold
    AddGuardianWithThreshold {
        wallet: Address,
        guardian: Address,
        threshold: U256,
    },
    /// Guardian confirmation of a recovery proposal
    ConfirmRecovery {
        wallet: Address,
        new_owners: Vec<Address>,
        new_threshold: U256,
        execute: bool,
    },
    /// Finalize a pending recovery once the grace period is over
    FinalizeRecovery { wallet: Address },
}

impl ModuleCall {
    /// ABI-encode the call.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::EnableModule { module } => ISafe::enableModuleCall { module: *module }.abi_encode(),
            Self::AddGuardianWithThreshold {
                wallet,
                guardian,
                threshold,
            } => ISocialRecoveryModule::addGuardianWithThresholdCall {
                wallet: *wallet,
                guardian: *guardian,
                threshold: *threshold,
            }
            .abi_encode(),
            Self::ConfirmRecovery {
                wallet,
                new_owners,
                new_threshold,
                execute,
            } => ISocialRecoveryModule::confirmRecoveryCall {
                wallet: *wallet,
                newOwners: new_owners.clone(),
                newThreshold: *new_threshold,
                execute: *execute,
            }
            .abi_encode(),
            Self::FinalizeRecovery { wallet } => {
                ISocialRecoveryModule::finalizeRecoveryCall { wallet: *wallet }.abi_encode()
            }
        }
    }

    /// Decode calldata for one of the four supported calls.
    ///
    /// Decoding validates padding, so dirty address words are rejected.
    pub fn decode(data: &[u8]) -> WardenResult<Self> {
        let sel: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| WardenError::invalid("calldata shorter than a selector"))?;

        if sel == ISafe::enableModuleCall::SELECTOR {
            let call = ISafe::enableModuleCall::abi_decode(data, true)?;
            Ok(Self::EnableModule {
                module: call.module,
            })
        } else if sel == ISocialRecoveryModule::addGuardianWithThresholdCall::SELECTOR {
            let call = ISocialRecoveryModule::addGuardianWithThresholdCall::abi_decode(data, true)?;
            Ok(Self::AddGuardianWithThreshold {
                wallet: call.wallet,
                guardian: call.guardian,
                threshold: call.threshold,
            })
        } else if sel == ISocialRecoveryModule::confirmRecoveryCall::SELECTOR {
            let call = ISocialRecoveryModule::confirmRecoveryCall::abi_decode(data, true)?;
            Ok(Self::ConfirmRecovery {
                wallet: call.wallet,
                new_owners: call.newOwners,
                new_threshold: call.newThreshold,
                execute: call.execute,
            })
        } else if sel == ISocialRecoveryModule::finalizeRecoveryCall::SELECTOR {
            let call = ISocialRecoveryModule::finalizeRecoveryCall::abi_decode(data, true)?;
            Ok(Self::FinalizeRecovery {
                wallet: call.wallet,
            })
        } else {
            Err(WardenError::invalid(format!(
                "unknown selector 0x{}",
                hex::encode(sel)
            )))
        }
    }

    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EnableModule { .. } => "enable-module",
            Self::AddGuardianWithThreshold { .. } => "add-guardian",
            Self::ConfirmRecovery { .. } => "confirm-recovery",
            Self::FinalizeRecovery { .. } => "finalize-recovery",
        }
    }
}

impl fmt::Display for ModuleCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnableModule { module } => write!(f, "enableModule({module})"),
            Self::AddGuardianWithThreshold {
                wallet,
                guardian,
                threshold,
            } => write!(
                f,
                "addGuardianWithThreshold({wallet}, {guardian}, {threshold})"
            ),
            Self::ConfirmRecovery {
                wallet,
                new_owners,
                new_threshold,
                execute,
            } => write!(
                f,
                "confirmRecovery({wallet}, {new_owners:?}, {new_threshold}, {execute})"
            ),
            Self::FinalizeRecovery { wallet } => write!(f, "finalizeRecovery({wallet})"),
        }
    }
}

/// Builder for the meta-transactions of one deployed recovery module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocialRecoveryCalls {
    module: Address,
}

impl SocialRecoveryCalls {
    /// Calls against the module deployed at `module`.
    pub fn new(module: Address) -> Self {
        Self { module }
    }

    /// Module address.
    pub fn module(&self) -> Address {
        self.module
    }

    /// Enable the module on `account`. Targets the account itself.
    pub fn enable_module(&self, account: Address) -> MetaTransaction {
        MetaTransaction::call(
            account,
            ModuleCall::EnableModule {
                module: self.module,
            }
            .encode(),
        )
    }

    /// Add `guardian` to `account` and set the threshold.
    pub fn add_guardian_with_threshold(
        &self,
        account: Address,
        guardian: Address,
        threshold: u64,
    ) -> MetaTransaction {
        MetaTransaction::call(
            self.module,
            ModuleCall::AddGuardianWithThreshold {
                wallet: account,
                guardian,
                threshold: U256::from(threshold),
            }
            .encode(),
        )
    }

    /// Confirm (and optionally start) recovery of `account` to `new_owners`.
    pub fn confirm_recovery(
        &self,
        account: Address,
        new_owners: &[Address],
        new_threshold: u64,
        execute: bool,
    ) -> MetaTransaction {
        MetaTransaction::call(
            self.module,
            ModuleCall::ConfirmRecovery {
                wallet: account,
                new_owners: new_owners.to_vec(),
                new_threshold: U256::from(new_threshold),
                execute,
            }
            .encode(),
        )
    }

    /// Finalize the pending recovery of `account`.
    pub fn finalize_recovery(&self, account: Address) -> MetaTransaction {
        MetaTransaction::call(
            self.module,
            ModuleCall::FinalizeRecovery { wallet: account }.encode(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn known_selectors() {
        // enableModule(address) is 0x610b5925 on every Safe
        assert_eq!(ISafe::enableModuleCall::SELECTOR, [0x61, 0x0b, 0x59, 0x25]);
    }

    #[test]
    fn confirm_recovery_layout() {
        let owner = Address::repeat_byte(0xb0);
        let call = ModuleCall::ConfirmRecovery {
            wallet: Address::repeat_byte(0xaa),
            new_owners: vec![owner],
            new_threshold: U256::from(1),
            execute: true,
        };
        let data = call.encode();
        // selector + 4 head words + length word + one element
        assert_eq!(data.len(), 4 + 6 * 32);
        assert_eq!(data[4 + 2 * 32 - 1], 128);
        assert_eq!(ModuleCall::decode(&data).unwrap(), call);
    }

    #[test]
    fn calls_target_the_right_contract() {
        let module = Address::repeat_byte(0x11);
        let account = Address::repeat_byte(0x22);
        let calls = SocialRecoveryCalls::new(module);

        assert_eq!(calls.enable_module(account).to, account);
        assert_eq!(
            calls
                .add_guardian_with_threshold(account, Address::repeat_byte(0x33), 1)
                .to,
            module
        );
        assert_eq!(calls.finalize_recovery(account).to, module);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        assert_matches!(
            ModuleCall::decode(&[0xde, 0xad, 0xbe, 0xef]),
            Err(WardenError::Invalid { .. })
        );
    }

    #[test]
    fn dirty_address_padding_is_rejected() {
        let mut data = ModuleCall::FinalizeRecovery {
            wallet: Address::repeat_byte(1),
        }
        .encode();
        data[4] = 0xff;
        assert!(ModuleCall::decode(&data).is_err());
    }
}
