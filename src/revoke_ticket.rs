//! Revoke ticket (RvT) transactions.
//!
//! A revoke ticket transaction returns the stake of a ticket that was never
//! used for a task. It spends exactly the ticket's stake output and pays a
//! refund, which must go to the reward address declared in the ticket, plus
//! an optional change output. Revocation only becomes legal once the ticket
//! has passed both its maturity and its expiry window.

use crate::constants::{
    CHANGE_TXOUT_INDEX, REFUND_TXOUT_INDEX, SDS_FIRST_OUTPUT_INDEX, STAKE_TXOUT_INDEX,
    TICKET_TXIN_INDEX,
};
use crate::error::{BuildError, Result, RuleError};
use crate::mltx::{mltx_is_legal_stake_txout, mltx_is_payment_txout, MLTxType};
use crate::script;
use crate::structured_data::{
    sds_class, sds_create, sds_from_tx, sds_script_items, sds_tx_outputs, sds_valid, DataClass,
    SDS_CURRENT_VERSION,
};
use crate::buy_ticket::{validate_change, BuyTicketTx};
use crate::types::{
    money_range, Amount, ByteString, ChainParams, Coin, CoinsView, Destination, Natural,
    Transaction, TransactionInput, TransactionOutput,
};

/// Current revocation script version. Monotonic.
pub const RVT_CURRENT_VERSION: u32 = 0;

/// Build the revocation structured-data script.
pub fn rvt_script(version: u32) -> Result<ByteString, BuildError> {
    if version > RVT_CURRENT_VERSION {
        return Err(BuildError::UnsupportedVersion(version));
    }

    let mut s = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
    script::push_int(&mut s, MLTxType::RevokeTicket.ordinal());
    script::push_int(&mut s, version as i64);

    Ok(s)
}

/// Parse and validate the revocation script items, yielding the version.
pub fn rvt_parse_items(items: &[ByteString]) -> Result<u32> {
    if items.len() < 4 {
        return Err(RuleError::InvalidScriptSize);
    }

    sds_valid(items)?;

    if sds_class(items) != Some(DataClass::PoUW) {
        return Err(RuleError::NotPouwClass);
    }

    if script::scriptnum_decode(&items[2]).and_then(MLTxType::from_ordinal)
        != Some(MLTxType::RevokeTicket)
    {
        return Err(RuleError::NotRevokeTicketTx);
    }

    match script::scriptnum_decode(&items[3]) {
        Some(v) if (0..=RVT_CURRENT_VERSION as i64).contains(&v) => Ok(v as u32),
        _ => Err(RuleError::InvalidRevokeTicketVersion),
    }
}

/// Parse and validate a revocation script.
pub fn rvt_parse_script(sds: &[u8]) -> Result<u32> {
    rvt_parse_items(&sds_script_items(sds))
}

pub fn rvt_script_valid(sds: &[u8]) -> Result<()> {
    rvt_parse_script(sds).map(|_| ())
}

/// Non-contextual input checks: exactly one input, referencing a stake
/// output index, not null.
pub fn rvt_check_inputs_nc(tx: &Transaction) -> Result<()> {
    if tx.inputs.len() != TICKET_TXIN_INDEX + 1 {
        return Err(RuleError::BadRevokeTicketInputCount);
    }

    let ticket = &tx.inputs[TICKET_TXIN_INDEX];
    if ticket.prevout.index != STAKE_TXOUT_INDEX {
        return Err(RuleError::BadTicketReference);
    }

    if ticket.prevout.is_null() {
        return Err(RuleError::BadPrevoutNull);
    }

    Ok(())
}

/// Non-contextual output checks: the script output, the refund, and an
/// optional change output.
pub fn rvt_check_outputs_nc(tx: &Transaction) -> Result<()> {
    if tx.outputs.len() < REFUND_TXOUT_INDEX as usize + 1
        || tx.outputs.len() > CHANGE_TXOUT_INDEX as usize + 1
    {
        return Err(RuleError::BadRevokeTicketOutputCount);
    }

    rvt_script_valid(&tx.outputs[SDS_FIRST_OUTPUT_INDEX as usize].script_pubkey)?;

    let refund = &tx.outputs[REFUND_TXOUT_INDEX as usize];
    if refund.value == 0 || !money_range(refund.value) {
        return Err(RuleError::BadRefundAmount);
    }

    if !mltx_is_payment_txout(refund) {
        return Err(RuleError::BadRefundAddress);
    }

    if let Some(change) = tx.outputs.get(CHANGE_TXOUT_INDEX as usize) {
        if !money_range(change.value) || change.value == 0 {
            return Err(RuleError::BadChangeAmount);
        }

        if script::extract_destination(&change.script_pubkey).is_none() {
            return Err(RuleError::BadChangeAddress);
        }
    }

    Ok(())
}

/// Contextual input checks: the spent coin must be the stake of a valid,
/// expired ticket.
pub fn rvt_check_inputs(
    tx: &Transaction,
    view: &impl CoinsView,
    params: &ChainParams,
    spend_height: Natural,
) -> Result<()> {
    rvt_check_inputs_nc(tx)?;

    let coin = view
        .access_coin(&tx.inputs[TICKET_TXIN_INDEX].prevout)
        .ok_or(RuleError::TicketStakeMissingOrSpent)?;

    if coin.tx_type != MLTxType::BuyTicket {
        return Err(RuleError::BadTicketInput);
    }

    if coin.actor.is_none() {
        return Err(RuleError::BadActorForRevokeTicket);
    }

    if spend_height.saturating_sub(coin.height) < params.ticket_maturity + params.ticket_expiry {
        return Err(RuleError::TicketNotExpiredYet);
    }

    let out = TransactionOutput::new(coin.value, coin.script_pubkey.clone());
    if !mltx_is_legal_stake_txout(&out) {
        return Err(RuleError::IllegalStakeOutput);
    }

    Ok(())
}

/// Contextual output checks against the referenced ticket transaction: the
/// refund must go to the exact reward address the ticket declared.
pub fn rvt_check_outputs(tx: &Transaction, ticket: &Transaction) -> Result<()> {
    rvt_check_inputs_nc(tx)?;
    rvt_check_outputs_nc(tx)?;

    let refund_destination =
        script::extract_destination(&tx.outputs[REFUND_TXOUT_INDEX as usize].script_pubkey)
            .ok_or(RuleError::BadRefundAddress)?;

    if ticket.txid() != tx.inputs[TICKET_TXIN_INDEX].prevout.hash {
        return Err(RuleError::BadTicketReference);
    }

    let parsed = BuyTicketTx::from_tx(ticket)?;

    if refund_destination.address_type() != parsed.reward_address.address_type() {
        return Err(RuleError::IncorrectRefundAddressType);
    }

    if refund_destination.hash() != parsed.reward_address.hash() {
        return Err(RuleError::IncorrectRefundAddress);
    }

    Ok(())
}

/// True for the refund output created by a revocation.
pub fn rvt_is_refund_output(coin: &Coin, txout_index: u32) -> bool {
    coin.tx_type == MLTxType::RevokeTicket && txout_index == REFUND_TXOUT_INDEX
}

/// Full non-contextual validation.
pub fn rvt_tx_valid(tx: &Transaction) -> Result<()> {
    rvt_check_inputs_nc(tx)?;
    rvt_check_outputs_nc(tx)?;
    rvt_parse_script(&sds_from_tx(tx)?).map(|_| ())
}

/// Assemble a revoke ticket transaction.
pub fn rvt_tx(
    ticket_txin: TransactionInput,
    refund_txout: TransactionOutput,
    change_txout: Option<TransactionOutput>,
    version: u32,
) -> Result<Transaction, BuildError> {
    let has_change = validate_change(&change_txout)?;

    let sds = rvt_script(version)?;

    // the script always fits a single carrier output
    let mut script_txouts = sds_tx_outputs(&sds, crate::constants::MAX_STRUCT_DATA_CARRIER_BYTES);
    if script_txouts.len() != 1 {
        return Err(BuildError::Rule(RuleError::InvalidScriptSize));
    }

    let mut outputs = vec![script_txouts.remove(0), refund_txout];
    if has_change {
        outputs.push(change_txout.unwrap_or_default());
    }

    let tx = Transaction {
        version: 1,
        inputs: vec![ticket_txin],
        outputs,
        lock_time: 0,
    };

    rvt_tx_valid(&tx)?;

    Ok(tx)
}

/// Assemble a revoke ticket transaction from addresses and amounts.
pub fn rvt_tx_from_amount(
    ticket_txin: TransactionInput,
    refund_address: &Destination,
    refund: Amount,
    change: Option<(Destination, Amount)>,
    version: u32,
) -> Result<Transaction, BuildError> {
    rvt_tx(
        ticket_txin,
        TransactionOutput::new(refund, script::script_for_destination(refund_address)),
        change.map(|(address, amount)| {
            TransactionOutput::new(amount, script::script_for_destination(&address))
        }),
        version,
    )
}

/// Materialized view over a parsed revoke ticket transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeTicketTx {
    pub version: u32,
    pub ticket_txin: TransactionInput,
    pub refund_txout: TransactionOutput,
    pub change_txout: Option<TransactionOutput>,
}

impl RevokeTicketTx {
    pub fn name() -> &'static str {
        MLTxType::RevokeTicket.name()
    }

    pub fn from_tx(tx: &Transaction) -> Result<Self> {
        rvt_check_inputs_nc(tx)?;
        rvt_check_outputs_nc(tx)?;

        let version = rvt_parse_script(&sds_from_tx(tx)?)?;

        Ok(Self {
            version,
            ticket_txin: tx.inputs[TICKET_TXIN_INDEX].clone(),
            refund_txout: tx.outputs[REFUND_TXOUT_INDEX as usize].clone(),
            change_txout: tx.outputs.get(CHANGE_TXOUT_INDEX as usize).cloned(),
        })
    }

    pub fn refund_amount(&self) -> Amount {
        self.refund_txout.value
    }

    pub fn structured_data_script(&self) -> Result<ByteString, BuildError> {
        rvt_script(self.version)
    }

    pub fn to_tx(&self) -> Result<Transaction, BuildError> {
        rvt_tx(
            self.ticket_txin.clone(),
            self.refund_txout.clone(),
            self.change_txout.clone(),
            self.version,
        )
    }
}
