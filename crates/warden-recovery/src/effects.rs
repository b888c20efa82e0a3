//! Effect composition for the recovery workflow.
//!
//! The workflow needs every collaborator at once, so a single composed trait
//! bounds the workflow, the pipeline and the guardian signer. Any handler that
//! implements all six effect traits gets it for free.
//!
//! # Included Effects
//!
//! - **IdentityEffects**: sign-in redirect and assertions
//! - **KeyNetworkEffects**: signer keys and session-gated signing
//! - **SmartAccountEffects**: derivation, user operations, submission
//! - **RecoveryModuleEffects**: module calls and guardian queries
//! - **PaymasterEffects**: sponsorship
//! - **ClockEffects**: timestamps and inclusion polling

use warden_core::effects::{
    ClockEffects, IdentityEffects, KeyNetworkEffects, PaymasterEffects, RecoveryModuleEffects,
    SmartAccountEffects,
};

/// Composed effects required by the guardian recovery workflow.
///
/// # Example
///
/// ```ignore
/// use warden_recovery::effects::WorkflowEffects;
///
/// struct MyDriver<E: WorkflowEffects> {
///     effects: Arc<E>,
/// }
/// ```
pub trait WorkflowEffects:
    IdentityEffects
    + KeyNetworkEffects
    + SmartAccountEffects
    + RecoveryModuleEffects
    + PaymasterEffects
    + ClockEffects
    + Send
    + Sync
    + 'static
{
}

/// Blanket implementation for any type that implements all required traits.
impl<T> WorkflowEffects for T where
    T: IdentityEffects
        + KeyNetworkEffects
        + SmartAccountEffects
        + RecoveryModuleEffects
        + PaymasterEffects
        + ClockEffects
        + Send
        + Sync
        + 'static
{
}

/// Effects a guardian signer needs: session issuance, signing and a clock.
pub trait SignerEffects: KeyNetworkEffects + ClockEffects + Send + Sync + 'static {}

impl<T> SignerEffects for T where T: KeyNetworkEffects + ClockEffects + Send + Sync + 'static {}
