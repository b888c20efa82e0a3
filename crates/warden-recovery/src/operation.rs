//! Typestate wrappers for a user operation moving through the pipeline.
//!
//! `UnsignedOperation -> SponsoredOperation -> SignedOperation`. Only the
//! pipeline can construct each stage, so a signature is always computed over
//! an operation that already carries its paymaster fields.

use warden_core::{MetaTransaction, SmartAccountRef, UserOperation};

/// Built by the account client, not yet sponsored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedOperation {
    account: SmartAccountRef,
    transactions: Vec<MetaTransaction>,
    user_op: UserOperation,
}

/// Paymaster fields filled in, still unsigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsoredOperation {
    account: SmartAccountRef,
    transactions: Vec<MetaTransaction>,
    user_op: UserOperation,
}

/// Sponsored and signed, ready for the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOperation {
    account: SmartAccountRef,
    transactions: Vec<MetaTransaction>,
    user_op: UserOperation,
}

macro_rules! stage_accessors {
    ($stage:ident) => {
        impl $stage {
            /// Account the operation acts for.
            pub fn account(&self) -> &SmartAccountRef {
                &self.account
            }

            /// Batch in execution order.
            pub fn transactions(&self) -> &[MetaTransaction] {
                &self.transactions
            }

            pub fn user_operation(&self) -> &UserOperation {
                &self.user_op
            }
        }
    };
}

stage_accessors!(UnsignedOperation);
stage_accessors!(SponsoredOperation);
stage_accessors!(SignedOperation);

impl UnsignedOperation {
    pub(crate) fn new(
        account: SmartAccountRef,
        transactions: Vec<MetaTransaction>,
        user_op: UserOperation,
    ) -> Self {
        Self {
            account,
            transactions,
            user_op,
        }
    }

    pub(crate) fn into_sponsored(self, user_op: UserOperation) -> SponsoredOperation {
        SponsoredOperation {
            account: self.account,
            transactions: self.transactions,
            user_op,
        }
    }
}

impl SponsoredOperation {
    pub(crate) fn into_signed(mut self, signature: warden_core::Bytes) -> SignedOperation {
        self.user_op.signature = signature;
        SignedOperation {
            account: self.account,
            transactions: self.transactions,
            user_op: self.user_op,
        }
    }
}

impl SignedOperation {
    pub(crate) fn into_parts(self) -> (SmartAccountRef, Vec<MetaTransaction>, UserOperation) {
        (self.account, self.transactions, self.user_op)
    }
}
