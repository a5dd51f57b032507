//! Pay for task (PfT) transactions.
//!
//! A pay for task transaction spends a matured client ticket to submit an
//! ML task and escrow its payment. The task document is a JSON value
//! carried as MessagePack in the structured-data script, which may spill
//! into continuation outputs after the stake and change. The stake output
//! is value-only: its script is empty because the escrow is resolved by
//! the task protocol, not by a spender.

use serde_json::Value;

use crate::buy_ticket::validate_change;
use crate::constants::{
    CHANGE_TXOUT_INDEX, REFUND_TXOUT_INDEX, SDS_FIRST_OUTPUT_INDEX, STAKE_TXOUT_INDEX,
    TICKET_TXIN_INDEX,
};
use crate::error::{BuildError, Result, RuleError};
use crate::mltx::{mltx_is_legal_stake_txout, ActorType, MLTxType};
use crate::script::{self, OP_RETURN};
use crate::structured_data::{
    sds_class, sds_create, sds_from_tx, sds_from_txouts, sds_is_first_output,
    sds_is_subsequent_output, sds_script_items, sds_tx_outputs, sds_valid, DataClass,
    SDS_CURRENT_VERSION,
};
use crate::types::{
    money_range, Amount, ByteString, ChainParams, Coin, CoinsView, Destination, Natural,
    Transaction, TransactionInput, TransactionOutput,
};

/// Current task script version. Monotonic.
pub const PFT_CURRENT_VERSION: u32 = 0;

/// A task document is valid when it actually says something: not null and
/// not an empty collection.
pub fn pft_task_valid(task: &Value) -> bool {
    match task {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        _ => true,
    }
}

/// Render a task document as JSON text.
pub fn pft_task_string(task: &Value, pretty: bool) -> Result<String, BuildError> {
    if !pft_task_valid(task) {
        return Err(BuildError::InvalidTask);
    }

    let text = if pretty {
        serde_json::to_string_pretty(task)
    } else {
        serde_json::to_string(task)
    };

    text.map_err(|_| BuildError::InvalidTask)
}

/// Parse a task document from JSON text.
pub fn pft_task_json(text: &str) -> Result<Value, BuildError> {
    if text.is_empty() {
        return Err(BuildError::InvalidTask);
    }

    serde_json::from_str(text).map_err(|_| BuildError::InvalidTask)
}

/// Build the task structured-data script. The task is embedded as
/// MessagePack.
pub fn pft_script(task: &Value, version: u32) -> Result<ByteString, BuildError> {
    if version > PFT_CURRENT_VERSION {
        return Err(BuildError::UnsupportedVersion(version));
    }

    if !pft_task_valid(task) {
        return Err(BuildError::InvalidTask);
    }

    let msg_pack = rmp_serde::to_vec(task).map_err(|_| BuildError::InvalidTask)?;

    let mut s = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
    script::push_int(&mut s, MLTxType::PayForTask.ordinal());
    script::push_int(&mut s, version as i64);
    script::push_data(&mut s, &msg_pack);

    Ok(s)
}

/// Parse and validate the task script items, yielding version and task.
pub fn pft_parse_items(items: &[ByteString]) -> Result<(u32, Value)> {
    if items.len() < 5 {
        return Err(RuleError::InvalidScriptSize);
    }

    sds_valid(items)?;

    if sds_class(items) != Some(DataClass::PoUW) {
        return Err(RuleError::NotPouwClass);
    }

    if script::scriptnum_decode(&items[2]).and_then(MLTxType::from_ordinal)
        != Some(MLTxType::PayForTask)
    {
        return Err(RuleError::NotPayForTaskTx);
    }

    let version = match script::scriptnum_decode(&items[3]) {
        Some(v) if (0..=PFT_CURRENT_VERSION as i64).contains(&v) => v as u32,
        _ => return Err(RuleError::InvalidPayForTaskVersion),
    };

    let task: Value = rmp_serde::from_slice(&items[4]).map_err(|_| RuleError::InvalidTask)?;

    Ok((version, task))
}

/// Parse and validate a task script.
pub fn pft_parse_script(sds: &[u8]) -> Result<(u32, Value)> {
    pft_parse_items(&sds_script_items(sds))
}

pub fn pft_script_valid(sds: &[u8]) -> Result<()> {
    pft_parse_script(sds).map(|_| ())
}

/// Non-contextual input checks: the ticket stake at input 0, optional extra
/// funding after it, no null prevouts.
pub fn pft_check_inputs_nc(tx: &Transaction) -> Result<()> {
    if tx.inputs.len() < TICKET_TXIN_INDEX + 1 {
        return Err(RuleError::BadPayForTaskInputCount);
    }

    if tx.inputs[TICKET_TXIN_INDEX].prevout.index != STAKE_TXOUT_INDEX {
        return Err(RuleError::BadTicketReference);
    }

    for input in &tx.inputs {
        if input.prevout.is_null() {
            return Err(RuleError::BadPrevoutNull);
        }
    }

    Ok(())
}

/// Non-contextual output checks, including full reassembly and validation
/// of the possibly multi-output task script.
pub fn pft_check_outputs_nc(tx: &Transaction) -> Result<()> {
    if tx.outputs.len() < STAKE_TXOUT_INDEX as usize + 1 {
        return Err(RuleError::BadPayForTaskOutputCount);
    }

    if !sds_is_first_output(&tx.outputs[SDS_FIRST_OUTPUT_INDEX as usize]) {
        return Err(RuleError::InvalidSdsFirstOutput);
    }

    let stake = &tx.outputs[STAKE_TXOUT_INDEX as usize];
    if stake.value == 0 || !money_range(stake.value) {
        return Err(RuleError::BadStakeAmount);
    }

    // the escrowed stake is value-only
    if !stake.script_pubkey.is_empty() {
        return Err(RuleError::BadStakeAddress);
    }

    let mut has_change = false;
    if let Some(change) = tx.outputs.get(CHANGE_TXOUT_INDEX as usize) {
        has_change = change.value > 0
            && !change.script_pubkey.is_empty()
            && change.script_pubkey[0] != OP_RETURN;

        if has_change {
            if !money_range(change.value) {
                return Err(RuleError::BadChangeAmount);
            }

            if script::extract_destination(&change.script_pubkey).is_none() {
                return Err(RuleError::BadChangeAddress);
            }
        }
    }

    let first_trailing = if has_change {
        CHANGE_TXOUT_INDEX + 1
    } else {
        STAKE_TXOUT_INDEX + 1
    };
    for output in &tx.outputs[first_trailing as usize..] {
        if !sds_is_subsequent_output(output) {
            return Err(RuleError::NonzeroSdsSubsequentOutput);
        }
    }

    pft_script_valid(&sds_from_txouts(&tx.outputs)?)
}

fn legal_extra_input(coin: &Coin, index: u32) -> bool {
    if coin.is_coinbase {
        return true;
    }

    let legal_coin_tx = coin.tx_type == MLTxType::Regular
        || (coin.tx_type == MLTxType::BuyTicket && index == CHANGE_TXOUT_INDEX)
        || (coin.tx_type == MLTxType::RevokeTicket && index == REFUND_TXOUT_INDEX)
        || (coin.tx_type == MLTxType::PayForTask && index == CHANGE_TXOUT_INDEX);
    if !legal_coin_tx {
        return false;
    }

    script::extract_destination(&coin.script_pubkey).is_some()
}

/// Contextual input checks: the spent ticket must be a matured, unexpired
/// client ticket; extra funding inputs must be ordinary spendable coins.
pub fn pft_check_inputs(
    tx: &Transaction,
    view: &impl CoinsView,
    params: &ChainParams,
    spend_height: Natural,
) -> Result<()> {
    pft_check_inputs_nc(tx)?;

    for (i, input) in tx.inputs.iter().enumerate() {
        let coin = view
            .access_coin(&input.prevout)
            .ok_or(RuleError::BadTxinMissingOrSpent)?;

        if i == TICKET_TXIN_INDEX {
            if coin.tx_type != MLTxType::BuyTicket {
                return Err(RuleError::BadTicketInput);
            }

            if coin.actor != Some(ActorType::Client) {
                return Err(RuleError::BadActorForTaskSubmission);
            }

            let delta = spend_height.saturating_sub(coin.height);
            if delta < params.ticket_maturity {
                return Err(RuleError::ImmatureTicket);
            }

            if delta >= params.ticket_maturity + params.ticket_expiry {
                return Err(RuleError::ExpiredTicket);
            }

            let out = TransactionOutput::new(coin.value, coin.script_pubkey.clone());
            if !mltx_is_legal_stake_txout(&out) {
                return Err(RuleError::IllegalStakeOutput);
            }
        } else if !legal_extra_input(coin, input.prevout.index) {
            return Err(RuleError::IllegalTxin);
        }
    }

    Ok(())
}

/// True for the escrow output created by a task payment.
pub fn pft_is_stake_output(coin: &Coin, txout_index: u32) -> bool {
    coin.tx_type == MLTxType::PayForTask && txout_index == STAKE_TXOUT_INDEX
}

/// Full non-contextual validation.
pub fn pft_tx_valid(tx: &Transaction) -> Result<()> {
    pft_check_inputs_nc(tx)?;
    pft_check_outputs_nc(tx)?;
    pft_parse_script(&sds_from_tx(tx)?).map(|_| ())
}

/// Assemble a pay for task transaction. Script continuations, if any, are
/// appended after the stake and change outputs.
pub fn pft_tx(
    ticket_txin: TransactionInput,
    extra_funding_txins: Vec<TransactionInput>,
    stake: Amount,
    change_txout: Option<TransactionOutput>,
    task: &Value,
    version: u32,
    params: &ChainParams,
) -> Result<Transaction, BuildError> {
    let has_change = validate_change(&change_txout)?;

    let sds = pft_script(task, version)?;
    let mut script_txouts = sds_tx_outputs(&sds, params.max_struct_data_carrier_bytes);
    if script_txouts.is_empty() {
        return Err(BuildError::InvalidTask);
    }

    let mut inputs = vec![ticket_txin];
    inputs.extend(extra_funding_txins);

    let mut outputs = vec![script_txouts.remove(0), TransactionOutput::new(stake, vec![])];
    if has_change {
        outputs.push(change_txout.unwrap_or_default());
    }
    outputs.extend(script_txouts);

    let tx = Transaction {
        version: 1,
        inputs,
        outputs,
        lock_time: 0,
    };

    pft_tx_valid(&tx)?;

    Ok(tx)
}

/// Assemble a pay for task transaction with change given as address and
/// amount.
pub fn pft_tx_from_amounts(
    ticket_txin: TransactionInput,
    extra_funding_txins: Vec<TransactionInput>,
    stake: Amount,
    change: Option<(Destination, Amount)>,
    task: &Value,
    version: u32,
    params: &ChainParams,
) -> Result<Transaction, BuildError> {
    pft_tx(
        ticket_txin,
        extra_funding_txins,
        stake,
        change.map(|(address, amount)| {
            TransactionOutput::new(amount, script::script_for_destination(&address))
        }),
        task,
        version,
        params,
    )
}

/// Materialized view over a parsed pay for task transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PayForTaskTx {
    pub version: u32,
    pub task: Value,
    pub ticket_txin: TransactionInput,
    pub extra_funding_txins: Vec<TransactionInput>,
    pub stake: Amount,
    pub change_txout: Option<TransactionOutput>,
}

impl PayForTaskTx {
    pub fn name() -> &'static str {
        MLTxType::PayForTask.name()
    }

    pub fn from_tx(tx: &Transaction) -> Result<Self> {
        pft_check_inputs_nc(tx)?;
        pft_check_outputs_nc(tx)?;

        let (version, task) = pft_parse_script(&sds_from_tx(tx)?)?;

        let change_txout = tx
            .outputs
            .get(CHANGE_TXOUT_INDEX as usize)
            .filter(|out| out.value > 0)
            .cloned();

        Ok(Self {
            version,
            task,
            ticket_txin: tx.inputs[TICKET_TXIN_INDEX].clone(),
            extra_funding_txins: tx.inputs[TICKET_TXIN_INDEX + 1..].to_vec(),
            stake: tx.outputs[STAKE_TXOUT_INDEX as usize].value,
            change_txout,
        })
    }

    pub fn structured_data_script(&self) -> Result<ByteString, BuildError> {
        pft_script(&self.task, self.version)
    }

    pub fn to_tx(&self, params: &ChainParams) -> Result<Transaction, BuildError> {
        pft_tx(
            self.ticket_txin.clone(),
            self.extra_funding_txins.clone(),
            self.stake,
            self.change_txout.clone(),
            &self.task,
            self.version,
            params,
        )
    }
}
