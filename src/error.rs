//! Error types for structured-data transaction validation.
//!
//! Every consensus failure carries a machine-readable reject-reason code and
//! a DoS score. The codes are stable wire-adjacent strings consumed by the
//! mempool/peer layer; the scores feed peer banning upstream.

use std::fmt;

use thiserror::Error;

/// A consensus rule violation.
///
/// Structural (non-contextual) and contextual failures share this type;
/// the distinction is which check function produced them, not the error
/// shape. There is no recoverable-vs-fatal split: every variant means
/// "this transaction is invalid". Displays as the reject-reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleError {
    // structured-data script layer
    InvalidScriptSize,
    InvalidScriptVersion,
    InvalidScriptClass,
    InvalidScriptHeader,
    InvalidInputCount,
    InvalidOutputCount,
    NullInput,
    InvalidStakeOutput,
    InvalidChangeCount,
    NotPouwClass,

    // buy ticket script
    NotBuyTicketTx,
    InvalidBuyTicketVersion,
    InvalidActorType,
    InvalidRewardAddress,
    InvalidRewardAddressType,

    // revoke ticket script
    NotRevokeTicketTx,
    InvalidRevokeTicketVersion,

    // pay for task script
    NotPayForTaskTx,
    InvalidPayForTaskVersion,
    InvalidTask,

    // join task script
    NotJoinTaskTx,
    InvalidJoinTaskVersion,
    InvalidTaskId,

    // buy ticket checks
    BadTicketInputCount,
    BadPrevoutNull,
    BadTicketOutputCount,
    InvalidSdsFirstOutput,
    BadStakeAmount,
    BadStakeAddress,
    IllegalStakeOutput,
    BadChangeAmount,
    BadChangeAddress,
    NonzeroSdsSubsequentOutput,
    BadTxinMissingOrSpent,
    IllegalTxin,

    // revoke ticket checks
    BadRevokeTicketInputCount,
    BadRevokeTicketOutputCount,
    BadTicketReference,
    BadRefundAmount,
    BadRefundAddress,
    BadTicketInput,
    BadActorForRevokeTicket,
    TicketNotExpiredYet,
    TicketStakeMissingOrSpent,
    IncorrectRefundAddressType,
    IncorrectRefundAddress,

    // pay for task checks
    BadPayForTaskInputCount,
    BadPayForTaskOutputCount,
    BadActorForTaskSubmission,
    ImmatureTicket,
    ExpiredTicket,

    // join task checks
    BadJoinTaskInputCount,
    BadJoinTaskOutputCount,
    BadActorForJoinTask,
}

impl RuleError {
    /// The machine-readable reject-reason code.
    pub fn code(&self) -> &'static str {
        use RuleError::*;
        match self {
            InvalidScriptSize => "invalid-script-size",
            InvalidScriptVersion => "invalid-script-version",
            InvalidScriptClass => "invalid-script-class",
            InvalidScriptHeader => "invalid-script-header",
            InvalidInputCount => "invalid-input-count",
            InvalidOutputCount => "invalid-output-count",
            NullInput => "null-input",
            InvalidStakeOutput => "invalid-stake-output",
            InvalidChangeCount => "invalid-change-count",
            NotPouwClass => "not-pouw-class",
            NotBuyTicketTx => "not-byt-tx",
            InvalidBuyTicketVersion => "invalid-byt-version",
            InvalidActorType => "invalid-actor-type",
            InvalidRewardAddress => "invalid-reward-address",
            InvalidRewardAddressType => "invalid-reward-address-type",
            NotRevokeTicketTx => "not-revoketicket-tx",
            InvalidRevokeTicketVersion => "invalid-revoketicket-version",
            NotPayForTaskTx => "not-pft-tx",
            InvalidPayForTaskVersion => "invalid-pft-version",
            InvalidTask => "invalid-task",
            NotJoinTaskTx => "not-jointask-tx",
            InvalidJoinTaskVersion => "invalid-jointask-version",
            InvalidTaskId => "invalid-task-id",
            BadTicketInputCount => "bad-ticket-input-count",
            BadPrevoutNull => "bad-txns-prevout-null",
            BadTicketOutputCount => "bad-ticket-output-count",
            InvalidSdsFirstOutput => "invalid-sds-first-output",
            BadStakeAmount => "bad-stake-amount",
            BadStakeAddress => "bad-stake-address",
            IllegalStakeOutput => "illegal-stake-output",
            BadChangeAmount => "bad-change-amount",
            BadChangeAddress => "bad-change-address",
            NonzeroSdsSubsequentOutput => "nonzero-sds-subsequent-output",
            BadTxinMissingOrSpent => "bad-txin-missingorspent",
            IllegalTxin => "illegal-txin",
            BadRevokeTicketInputCount => "bad-revoketicket-input-count",
            BadRevokeTicketOutputCount => "bad-revoketicket-output-count",
            BadTicketReference => "bad-ticket-reference",
            BadRefundAmount => "bad-refund-amount",
            BadRefundAddress => "bad-refund-address",
            BadTicketInput => "bad-ticket-input",
            BadActorForRevokeTicket => "bad-actor-for-revoketicket",
            TicketNotExpiredYet => "ticket-not-expired-yet",
            TicketStakeMissingOrSpent => "ticket-stake-missingorspent",
            IncorrectRefundAddressType => "incorrect-refund-address-type",
            IncorrectRefundAddress => "incorrect-refund-address",
            BadPayForTaskInputCount => "bad-payfortask-input-count",
            BadPayForTaskOutputCount => "bad-payfortask-output-count",
            BadActorForTaskSubmission => "bad-actor-for-task-submission",
            ImmatureTicket => "immature-ticket",
            ExpiredTicket => "expired-ticket",
            BadJoinTaskInputCount => "bad-jointask-input-count",
            BadJoinTaskOutputCount => "bad-jointask-output-count",
            BadActorForJoinTask => "bad-actor-for-jointask",
        }
    }

    /// DoS score attached to the rejection, consumed by peer banning.
    pub fn dos_score(&self) -> u32 {
        match self {
            RuleError::BadPrevoutNull | RuleError::NullInput => 10,
            _ => 100,
        }
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::error::Error for RuleError {}

/// Failure to assemble a transaction from builder parameters.
///
/// Builders validate atomically: either every parameter is acceptable and a
/// fully formed transaction comes back, or nothing does.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("at least one funding input is required")]
    NoFundingInputs,

    #[error("funding input references the null outpoint")]
    NullFundingInput,

    #[error("script version {0} is newer than the current version")]
    UnsupportedVersion(u32),

    #[error("stake output is not a payable output with a legal amount")]
    BadStakeOutput,

    #[error("change destination and change amount must both be set or both be absent")]
    InconsistentChange,

    #[error("task document is empty or not encodable")]
    InvalidTask,

    #[error("task id must not be null")]
    NullTaskId,

    #[error("ticket input does not reference the ticket stake output")]
    BadTicketReference,

    #[error("referenced ticket is not a valid buy ticket transaction: {0}")]
    BadTicket(RuleError),

    #[error("assembled transaction failed validation: {0}")]
    Rule(#[from] RuleError),
}

pub type Result<T, E = RuleError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_match_display() {
        assert_eq!(RuleError::BadStakeAmount.to_string(), "bad-stake-amount");
        assert_eq!(
            RuleError::TicketNotExpiredYet.to_string(),
            "ticket-not-expired-yet"
        );
        assert_eq!(RuleError::ImmatureTicket.code(), "immature-ticket");
    }

    #[test]
    fn test_dos_scores() {
        assert_eq!(RuleError::BadPrevoutNull.dos_score(), 10);
        assert_eq!(RuleError::NullInput.dos_score(), 10);
        assert_eq!(RuleError::IllegalTxin.dos_score(), 100);
        assert_eq!(RuleError::ExpiredTicket.dos_score(), 100);
    }

    #[test]
    fn test_build_error_from_rule_error() {
        let err: BuildError = RuleError::BadStakeAmount.into();
        assert!(matches!(err, BuildError::Rule(RuleError::BadStakeAmount)));
    }
}
