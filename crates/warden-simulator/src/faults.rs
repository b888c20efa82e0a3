//! Fault injection switches.

/// How the key network misbehaves when asked to mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintFault {
    /// Mint reports success but no key is bound to the assertion
    NoKey,
    /// Mint binds a compressed (unusable) key
    MalformedKey,
}

/// Failures the simulator injects. All default to off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Faults {
    /// Identity provider returns no assertion
    pub withhold_assertion: bool,
    pub mint: Option<MintFault>,
    /// Paymaster rejects every request with this message
    pub paymaster_error: Option<String>,
    /// Next included operation reverts with this reason
    pub inclusion_failure: Option<String>,
    /// Membership queries answer this instead of reading module state
    pub membership_override: Option<bool>,
    /// Membership queries fail with this message
    pub membership_error: Option<String>,
    /// Submitted operations are never included
    pub never_include: bool,
    /// Receipt polls that return nothing before an operation is mined
    pub inclusion_delay_polls: u32,
}
