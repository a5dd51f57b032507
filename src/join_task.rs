//! Join task (JnT) transactions.
//!
//! A join task transaction spends a miner ticket to commit that miner to an
//! announced task. It moves the ticket stake, minus the fee, to a fresh
//! stake output and names the task by its 32-byte id. Unlike task
//! submission, joining carries no height gate; the miner window is policed
//! by the task protocol itself.

use crate::constants::{
    SDS_FIRST_OUTPUT_INDEX, STAKE_TXOUT_INDEX, TICKET_TXIN_INDEX,
};
use crate::error::{BuildError, Result, RuleError};
use crate::mltx::{mltx_is_legal_stake_txout, ActorType, MLTxType};
use crate::script;
use crate::size::{jnt_fee, FeeRate};
use crate::structured_data::{
    sds_class, sds_create, sds_from_tx, sds_script_items, sds_tx_outputs, sds_valid, DataClass,
    SDS_CURRENT_VERSION,
};
use crate::buy_ticket::BuyTicketTx;
use crate::types::{
    money_range, Amount, ByteString, Coin, CoinsView, Destination, Hash, Transaction,
    TransactionInput, TransactionOutput, OutPoint,
};

/// Current join script version. Monotonic.
pub const JNT_CURRENT_VERSION: u32 = 0;

/// Build the join structured-data script.
pub fn jnt_script(task_id: &Hash, version: u32) -> Result<ByteString, BuildError> {
    if version > JNT_CURRENT_VERSION {
        return Err(BuildError::UnsupportedVersion(version));
    }

    if *task_id == [0u8; 32] {
        return Err(BuildError::NullTaskId);
    }

    let mut s = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
    script::push_int(&mut s, MLTxType::JoinTask.ordinal());
    script::push_int(&mut s, version as i64);
    script::push_data(&mut s, task_id);

    Ok(s)
}

/// Parse and validate the join script items, yielding version and task id.
pub fn jnt_parse_items(items: &[ByteString]) -> Result<(u32, Hash)> {
    if items.len() < 5 {
        return Err(RuleError::InvalidScriptSize);
    }

    sds_valid(items)?;

    if sds_class(items) != Some(DataClass::PoUW) {
        return Err(RuleError::NotPouwClass);
    }

    if script::scriptnum_decode(&items[2]).and_then(MLTxType::from_ordinal)
        != Some(MLTxType::JoinTask)
    {
        return Err(RuleError::NotJoinTaskTx);
    }

    let version = match script::scriptnum_decode(&items[3]) {
        Some(v) if (0..=JNT_CURRENT_VERSION as i64).contains(&v) => v as u32,
        _ => return Err(RuleError::InvalidJoinTaskVersion),
    };

    let task_id: Hash = items[4]
        .as_slice()
        .try_into()
        .map_err(|_| RuleError::InvalidTaskId)?;
    if task_id == [0u8; 32] {
        return Err(RuleError::InvalidTaskId);
    }

    Ok((version, task_id))
}

/// Parse and validate a join script.
pub fn jnt_parse_script(sds: &[u8]) -> Result<(u32, Hash)> {
    jnt_parse_items(&sds_script_items(sds))
}

pub fn jnt_script_valid(sds: &[u8]) -> Result<()> {
    jnt_parse_script(sds).map(|_| ())
}

/// Non-contextual input checks: exactly the ticket stake input.
pub fn jnt_check_inputs_nc(tx: &Transaction) -> Result<()> {
    if tx.inputs.len() != TICKET_TXIN_INDEX + 1 {
        return Err(RuleError::BadJoinTaskInputCount);
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

/// Non-contextual output checks: exactly the script output and a legal
/// stake.
pub fn jnt_check_outputs_nc(tx: &Transaction) -> Result<()> {
    if tx.outputs.len() != STAKE_TXOUT_INDEX as usize + 1 {
        return Err(RuleError::BadJoinTaskOutputCount);
    }

    jnt_script_valid(&tx.outputs[SDS_FIRST_OUTPUT_INDEX as usize].script_pubkey)?;

    let stake = &tx.outputs[STAKE_TXOUT_INDEX as usize];
    if stake.value == 0 || !money_range(stake.value) {
        return Err(RuleError::BadStakeAmount);
    }

    if !mltx_is_legal_stake_txout(stake) {
        return Err(RuleError::IllegalStakeOutput);
    }

    Ok(())
}

/// Contextual input checks: the spent coin must be the stake of a miner
/// ticket. No maturity gate applies.
pub fn jnt_check_inputs(tx: &Transaction, view: &impl CoinsView) -> Result<()> {
    jnt_check_inputs_nc(tx)?;

    let coin = view
        .access_coin(&tx.inputs[TICKET_TXIN_INDEX].prevout)
        .ok_or(RuleError::TicketStakeMissingOrSpent)?;

    if coin.tx_type != MLTxType::BuyTicket {
        return Err(RuleError::BadTicketInput);
    }

    if coin.actor != Some(ActorType::Miner) {
        return Err(RuleError::BadActorForJoinTask);
    }

    let out = TransactionOutput::new(coin.value, coin.script_pubkey.clone());
    if !mltx_is_legal_stake_txout(&out) {
        return Err(RuleError::IllegalStakeOutput);
    }

    Ok(())
}

/// True for the stake output created by a join.
pub fn jnt_is_stake_output(coin: &Coin, txout_index: u32) -> bool {
    coin.tx_type == MLTxType::JoinTask && txout_index == STAKE_TXOUT_INDEX
}

/// Full non-contextual validation.
pub fn jnt_tx_valid(tx: &Transaction) -> Result<()> {
    jnt_check_inputs_nc(tx)?;
    jnt_check_outputs_nc(tx)?;
    jnt_parse_script(&sds_from_tx(tx)?).map(|_| ())
}

/// Assemble a join task transaction.
pub fn jnt_tx(
    ticket_txin: TransactionInput,
    stake_txout: TransactionOutput,
    task_id: &Hash,
    version: u32,
) -> Result<Transaction, BuildError> {
    let sds = jnt_script(task_id, version)?;

    // the script always fits a single carrier output
    let mut script_txouts = sds_tx_outputs(&sds, crate::constants::MAX_STRUCT_DATA_CARRIER_BYTES);
    if script_txouts.len() != 1 {
        return Err(BuildError::Rule(RuleError::InvalidScriptSize));
    }

    let tx = Transaction {
        version: 1,
        inputs: vec![ticket_txin],
        outputs: vec![script_txouts.remove(0), stake_txout],
        lock_time: 0,
    };

    jnt_tx_valid(&tx)?;

    Ok(tx)
}

/// Assemble a join task transaction from an address and amount.
pub fn jnt_tx_from_amount(
    ticket_txin: TransactionInput,
    stake_address: &Destination,
    stake: Amount,
    task_id: &Hash,
    version: u32,
) -> Result<Transaction, BuildError> {
    jnt_tx(
        ticket_txin,
        TransactionOutput::new(stake, script::script_for_destination(stake_address)),
        task_id,
        version,
    )
}

/// Stake carried over from a ticket into a join: the ticket stake minus
/// the join fee.
pub fn jnt_stake_amount(ticket: &Transaction, fee_rate: FeeRate) -> Result<Amount, BuildError> {
    let parsed = BuyTicketTx::from_tx(ticket).map_err(BuildError::BadTicket)?;
    Ok(parsed.stake_amount() - jnt_fee(fee_rate))
}

/// Assemble a join task transaction directly from the ticket it spends.
pub fn jnt_tx_from_ticket(
    ticket: &Transaction,
    stake_address: &Destination,
    fee_rate: FeeRate,
    task_id: &Hash,
    version: u32,
) -> Result<Transaction, BuildError> {
    let stake = jnt_stake_amount(ticket, fee_rate)?;

    jnt_tx_from_amount(
        TransactionInput::from_outpoint(OutPoint::new(ticket.txid(), STAKE_TXOUT_INDEX)),
        stake_address,
        stake,
        task_id,
        version,
    )
}

/// Materialized view over a parsed join task transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTaskTx {
    pub version: u32,
    pub task_id: Hash,
    pub ticket_txin: TransactionInput,
    pub stake_txout: TransactionOutput,
}

impl JoinTaskTx {
    pub fn name() -> &'static str {
        MLTxType::JoinTask.name()
    }

    pub fn from_tx(tx: &Transaction) -> Result<Self> {
        jnt_check_inputs_nc(tx)?;
        jnt_check_outputs_nc(tx)?;

        let (version, task_id) = jnt_parse_script(&sds_from_tx(tx)?)?;

        Ok(Self {
            version,
            task_id,
            ticket_txin: tx.inputs[TICKET_TXIN_INDEX].clone(),
            stake_txout: tx.outputs[STAKE_TXOUT_INDEX as usize].clone(),
        })
    }

    pub fn stake_amount(&self) -> Amount {
        self.stake_txout.value
    }

    pub fn structured_data_script(&self) -> Result<ByteString, BuildError> {
        jnt_script(&self.task_id, self.version)
    }

    pub fn to_tx(&self) -> Result<Transaction, BuildError> {
        jnt_tx(
            self.ticket_txin.clone(),
            self.stake_txout.clone(),
            &self.task_id,
            self.version,
        )
    }
}
