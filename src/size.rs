//! Transaction size estimation and fees.
//!
//! The ML transaction formats are fixed, so their serialized sizes can be
//! estimated precisely; only the task payload of a pay for task transaction
//! makes its size variable. Inputs are assumed to be P2PKH with compressed
//! keys unless stated otherwise.

use serde_json::Value;

use crate::buy_ticket::byt_script;
use crate::error::BuildError;
use crate::join_task::jnt_script;
use crate::mltx::ActorType;
use crate::pay_for_task::pft_script;
use crate::revoke_ticket::rvt_script;
use crate::structured_data::sds_tx_outputs;
use crate::types::{encode_varint, Amount, ChainParams, Destination, TransactionOutput};

/// Fee rate in base units per kilobyte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeeRate {
    sat_per_kb: Amount,
}

impl FeeRate {
    pub fn new(sat_per_kb: Amount) -> Self {
        Self { sat_per_kb }
    }

    /// Fee for a transaction of the given size. A nonzero rate never
    /// produces a zero fee for a nonzero size.
    pub fn get_fee(&self, size: usize) -> Amount {
        let fee = self.sat_per_kb * size as Amount / 1000;
        if fee == 0 && size != 0 && self.sat_per_kb > 0 {
            return 1;
        }
        fee
    }
}

/// Serialized size of a P2PKH input: outpoint, script length, push of a
/// 72-byte signature, push of the public key, sequence.
pub fn p2pkh_txin_estimated_size(compressed: bool) -> usize {
    32 + 4 + 1 + 1 + 72 + 1 + (if compressed { 33 } else { 65 }) + 4
}

/// Serialized size of a P2PKH output: value, script length, and the
/// 25-byte script.
pub fn p2pkh_txout_estimated_size() -> usize {
    8 + 1 + 1 + 1 + 1 + 20 + 1 + 1
}

/// Serialized size of an output: value, script length varint, script.
pub fn serialized_txout_size(txout: &TransactionOutput) -> usize {
    8 + encode_varint(txout.script_pubkey.len() as u64).len() + txout.script_pubkey.len()
}

fn script_txout_size(sds: &[u8]) -> usize {
    serialized_txout_size(&TransactionOutput::new(0, sds.to_vec()))
}

/// Serialized size of the ticket script output. The layout is independent
/// of the actual actor and address.
pub fn byt_txout_estimated_size() -> usize {
    match byt_script(ActorType::Client, &Destination::PubKeyHash([1; 20]), 0) {
        Ok(sds) => script_txout_size(&sds),
        Err(_) => 0,
    }
}

/// Serialized size of the revocation script output.
pub fn rvt_txout_estimated_size() -> usize {
    match rvt_script(0) {
        Ok(sds) => script_txout_size(&sds),
        Err(_) => 0,
    }
}

/// Serialized size of the join script output.
pub fn jnt_txout_estimated_size() -> usize {
    match jnt_script(&[1; 32], 0) {
        Ok(sds) => script_txout_size(&sds),
        Err(_) => 0,
    }
}

/// Serialized sizes of the carrier outputs of a task script.
pub fn pft_txout_estimated_sizes(task: &Value) -> Result<Vec<usize>, BuildError> {
    let sds = pft_script(task, 0)?;
    let max = ChainParams::default().max_struct_data_carrier_bytes;
    Ok(sds_tx_outputs(&sds, max)
        .iter()
        .map(serialized_txout_size)
        .collect())
}

/// Estimated size of a buy ticket transaction: version, counts, inputs,
/// script output, stake output, optional change, locktime.
pub fn byt_estimated_size(txin_count: usize, has_change: bool) -> usize {
    4 + 1
        + txin_count * p2pkh_txin_estimated_size(true)
        + 1
        + byt_txout_estimated_size()
        + p2pkh_txout_estimated_size()
        + (if has_change { p2pkh_txout_estimated_size() } else { 0 })
        + 4
}

/// Estimated size of a revoke ticket transaction.
pub fn rvt_estimated_size() -> usize {
    4 + 1
        + p2pkh_txin_estimated_size(true)
        + 1
        + rvt_txout_estimated_size()
        + p2pkh_txout_estimated_size()
        + 4
}

/// Estimated size of a pay for task transaction. The task payload makes
/// this an estimate rather than an exact figure.
pub fn pft_estimated_size(
    extra_funding_count: usize,
    task: &Value,
    has_change: bool,
) -> Result<usize, BuildError> {
    let sizes = pft_txout_estimated_sizes(task)?;
    if sizes.is_empty() {
        return Err(BuildError::InvalidTask);
    }

    // value-only stake output: value plus an empty script length
    let stake_txout_size = 8 + 1;

    Ok(4 + 1
        + (1 + extra_funding_count) * p2pkh_txin_estimated_size(true)
        + 1
        + sizes[0]
        + stake_txout_size
        + (if has_change { p2pkh_txout_estimated_size() } else { 0 })
        + sizes[1..].iter().sum::<usize>()
        + 4)
}

/// Estimated size of a join task transaction.
pub fn jnt_estimated_size() -> usize {
    4 + 1
        + p2pkh_txin_estimated_size(true)
        + 1
        + jnt_txout_estimated_size()
        + p2pkh_txout_estimated_size()
        + 4
}

/// Fee for a buy ticket transaction, assuming a change output is present.
pub fn byt_fee(txin_count: usize, fee_rate: FeeRate) -> Amount {
    fee_rate.get_fee(byt_estimated_size(txin_count, true))
}

pub fn rvt_fee(fee_rate: FeeRate) -> Amount {
    fee_rate.get_fee(rvt_estimated_size())
}

/// Fee for a pay for task transaction, assuming a change output is
/// present. Zero when the task cannot be encoded.
pub fn pft_fee(extra_funding_count: usize, task: &Value, fee_rate: FeeRate) -> Amount {
    match pft_estimated_size(extra_funding_count, task, true) {
        Ok(size) => fee_rate.get_fee(size),
        Err(_) => 0,
    }
}

pub fn jnt_fee(fee_rate: FeeRate) -> Amount {
    fee_rate.get_fee(jnt_estimated_size())
}
