//! # PoUW Consensus
//!
//! Consensus rules for the proof-of-useful-work (PoUW) transaction
//! protocol: structured-data scripts spread over transaction outputs, and
//! the four machine-learning transaction types built on them.
//!
//! ## Architecture
//!
//! The protocol has two layers:
//! - Structured-data scripts (SDS): a versioned, classed data container
//!   that can span multiple zero-value outputs of a transaction
//! - ML transactions: buy ticket, revoke ticket, pay for task, and join
//!   task, each a fixed layout of SDS, stake and change outputs
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: All checks are deterministic and side-effect-free
//! 2. **Explicit Context**: Contextual checks take the UTXO view, chain
//!    parameters and spend height as arguments; nothing is global
//! 3. **Exact Version Pinning**: All consensus-critical dependencies pinned
//!    to exact versions
//! 4. **Total Classification**: Any transaction that does not parse as an
//!    ML transaction is simply regular; classification never fails
//!
//! ## Usage
//!
//! ```rust
//! use pouw_consensus::PouwConsensus;
//! use pouw_consensus::buy_ticket::byt_tx_from_amounts;
//! use pouw_consensus::mltx::{ActorType, MLTxType};
//! use pouw_consensus::types::*;
//!
//! let consensus = PouwConsensus::new();
//!
//! let ticket = byt_tx_from_amounts(
//!     vec![TransactionInput::from_outpoint(OutPoint::new([9u8; 32], 0))],
//!     &Destination::PubKeyHash([0x11; 20]),
//!     50_000,
//!     None,
//!     ActorType::Client,
//!     &Destination::PubKeyHash([0x22; 20]),
//!     0,
//! ).unwrap();
//!
//! assert_eq!(consensus.classify(&ticket), MLTxType::BuyTicket);
//! consensus.check_buy_ticket(&ticket).unwrap();
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod script;
pub mod structured_data;
pub mod mltx;
pub mod buy_ticket;
pub mod revoke_ticket;
pub mod pay_for_task;
pub mod join_task;
pub mod size;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{BuildError, Result, RuleError};
pub use mltx::{ActorType, MLTxType};

/// Main entry point for PoUW consensus validation.
///
/// Bundles the chain parameters so callers validate against one consistent
/// parameter set.
///
/// # Examples
///
/// ```
/// use pouw_consensus::{ChainParams, PouwConsensus};
///
/// let consensus = PouwConsensus::new();
/// assert_eq!(consensus.params().ticket_maturity, 100);
///
/// let custom = PouwConsensus::with_params(ChainParams {
///     ticket_maturity: 256,
///     ticket_expiry: 1280,
///     ..ChainParams::default()
/// });
/// assert_eq!(custom.params().ticket_expiry, 1280);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PouwConsensus {
    params: ChainParams,
}

impl PouwConsensus {
    /// Consensus validation with the default chain parameters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: ChainParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Classify a transaction. Total; anything unparseable is regular.
    pub fn classify(&self, tx: &Transaction) -> MLTxType {
        mltx::mltx_type(tx)
    }

    /// Non-contextual validation of a buy ticket transaction.
    pub fn check_buy_ticket(&self, tx: &Transaction) -> Result<()> {
        buy_ticket::byt_tx_valid(tx)
    }

    /// Contextual input validation of a buy ticket transaction.
    pub fn check_buy_ticket_inputs(&self, tx: &Transaction, view: &impl CoinsView) -> Result<()> {
        buy_ticket::byt_check_inputs(tx, view)
    }

    /// Non-contextual validation of a revoke ticket transaction.
    pub fn check_revoke_ticket(&self, tx: &Transaction) -> Result<()> {
        revoke_ticket::rvt_tx_valid(tx)
    }

    /// Contextual input validation of a revoke ticket transaction at the
    /// given spend height.
    pub fn check_revoke_ticket_inputs(
        &self,
        tx: &Transaction,
        view: &impl CoinsView,
        spend_height: Natural,
    ) -> Result<()> {
        revoke_ticket::rvt_check_inputs(tx, view, &self.params, spend_height)
    }

    /// Contextual output validation of a revoke ticket transaction against
    /// the ticket it revokes.
    pub fn check_revoke_ticket_outputs(&self, tx: &Transaction, ticket: &Transaction) -> Result<()> {
        revoke_ticket::rvt_check_outputs(tx, ticket)
    }

    /// Non-contextual validation of a pay for task transaction.
    pub fn check_pay_for_task(&self, tx: &Transaction) -> Result<()> {
        pay_for_task::pft_tx_valid(tx)
    }

    /// Contextual input validation of a pay for task transaction at the
    /// given spend height.
    pub fn check_pay_for_task_inputs(
        &self,
        tx: &Transaction,
        view: &impl CoinsView,
        spend_height: Natural,
    ) -> Result<()> {
        pay_for_task::pft_check_inputs(tx, view, &self.params, spend_height)
    }

    /// Non-contextual validation of a join task transaction.
    pub fn check_join_task(&self, tx: &Transaction) -> Result<()> {
        join_task::jnt_tx_valid(tx)
    }

    /// Contextual input validation of a join task transaction.
    pub fn check_join_task_inputs(&self, tx: &Transaction, view: &impl CoinsView) -> Result<()> {
        join_task::jnt_check_inputs(tx, view)
    }
}
