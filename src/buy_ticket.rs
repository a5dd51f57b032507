//! Buy ticket (ByT) transactions.
//!
//! A buy ticket transaction stakes funds to declare an actor's intent to
//! participate in the ML workflow. Output 0 carries the structured-data
//! script, output 1 the stake, output 2 the optional change. The script
//! items are, in order: structured-data version, data class, transaction
//! type, ticket version, actor, 20-byte reward address hash, address type.

use crate::constants::{CHANGE_TXOUT_INDEX, SDS_FIRST_OUTPUT_INDEX, STAKE_TXOUT_INDEX};
use crate::error::{BuildError, Result, RuleError};
use crate::mltx::{
    mltx_is_legal_stake_txout, mltx_is_payment_txout, ActorType, MLTxType,
};
use crate::script::{self, OP_RETURN};
use crate::structured_data::{
    sds_class, sds_create, sds_from_tx, sds_is_first_output, sds_is_subsequent_output,
    sds_script_items, sds_valid, DataClass, SDS_CURRENT_VERSION,
};
use crate::types::{
    money_range, Amount, ByteString, CoinsView, Destination, Transaction, TransactionInput,
    TransactionOutput,
};

/// Current ticket script version. Monotonic.
pub const BYT_CURRENT_VERSION: u32 = 0;

/// Build the ticket structured-data script.
pub fn byt_script(
    actor: ActorType,
    reward_address: &Destination,
    version: u32,
) -> Result<ByteString, BuildError> {
    if version > BYT_CURRENT_VERSION {
        return Err(BuildError::UnsupportedVersion(version));
    }

    let mut s = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
    script::push_int(&mut s, MLTxType::BuyTicket.ordinal());
    script::push_int(&mut s, version as i64);
    script::push_int(&mut s, actor.ordinal());
    script::push_data(&mut s, reward_address.hash());
    script::push_int(&mut s, reward_address.address_type());

    Ok(s)
}

/// Parse and validate the ticket script items. Exactly seven items are
/// required.
pub fn byt_parse_items(items: &[ByteString]) -> Result<(u32, ActorType, Destination)> {
    if items.len() != 7 {
        return Err(RuleError::InvalidScriptSize);
    }

    sds_valid(items)?;

    if sds_class(items) != Some(DataClass::PoUW) {
        return Err(RuleError::NotPouwClass);
    }

    if script::scriptnum_decode(&items[2]).and_then(MLTxType::from_ordinal)
        != Some(MLTxType::BuyTicket)
    {
        return Err(RuleError::NotBuyTicketTx);
    }

    let version = match script::scriptnum_decode(&items[3]) {
        Some(v) if (0..=BYT_CURRENT_VERSION as i64).contains(&v) => v as u32,
        _ => return Err(RuleError::InvalidBuyTicketVersion),
    };

    let actor = script::scriptnum_decode(&items[4])
        .and_then(ActorType::from_ordinal)
        .ok_or(RuleError::InvalidActorType)?;

    let hash: [u8; 20] = items[5]
        .as_slice()
        .try_into()
        .map_err(|_| RuleError::InvalidRewardAddress)?;
    if hash == [0u8; 20] {
        return Err(RuleError::InvalidRewardAddress);
    }

    let reward_address = script::scriptnum_decode(&items[6])
        .and_then(|t| Destination::from_type_and_hash(t, hash))
        .ok_or(RuleError::InvalidRewardAddressType)?;

    Ok((version, actor, reward_address))
}

/// Parse and validate a ticket script.
pub fn byt_parse_script(sds: &[u8]) -> Result<(u32, ActorType, Destination)> {
    byt_parse_items(&sds_script_items(sds))
}

pub fn byt_script_valid(sds: &[u8]) -> Result<()> {
    byt_parse_script(sds).map(|_| ())
}

/// Non-contextual input checks: at least one input, none referencing the
/// null outpoint.
pub fn byt_check_inputs_nc(tx: &Transaction) -> Result<()> {
    if tx.inputs.is_empty() {
        return Err(RuleError::BadTicketInputCount);
    }

    for input in &tx.inputs {
        if input.prevout.is_null() {
            return Err(RuleError::BadPrevoutNull);
        }
    }

    Ok(())
}

/// Non-contextual output checks: structured-data header at output 0, a
/// legal stake at output 1, optional change at output 2, and only carrier
/// continuations past that.
pub fn byt_check_outputs_nc(tx: &Transaction) -> Result<()> {
    if tx.outputs.len() < STAKE_TXOUT_INDEX as usize + 1 {
        return Err(RuleError::BadTicketOutputCount);
    }

    if !sds_is_first_output(&tx.outputs[SDS_FIRST_OUTPUT_INDEX as usize]) {
        return Err(RuleError::InvalidSdsFirstOutput);
    }

    let stake = &tx.outputs[STAKE_TXOUT_INDEX as usize];
    if stake.value == 0 || !money_range(stake.value) {
        return Err(RuleError::BadStakeAmount);
    }

    if stake.script_pubkey.is_empty() || stake.script_pubkey[0] == OP_RETURN {
        return Err(RuleError::BadStakeAddress);
    }

    if !mltx_is_legal_stake_txout(stake) {
        return Err(RuleError::IllegalStakeOutput);
    }

    let change = tx.outputs.get(CHANGE_TXOUT_INDEX as usize);
    let has_change = change.is_some_and(|out| {
        out.value != 0 && !out.script_pubkey.is_empty() && out.script_pubkey[0] != OP_RETURN
    });

    if has_change && !money_range(tx.outputs[CHANGE_TXOUT_INDEX as usize].value) {
        return Err(RuleError::BadChangeAmount);
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

    Ok(())
}

/// Contextual input checks against a UTXO snapshot. Every input must be
/// unspent and fund-able: a coinbase output, a regular payment, or the
/// change output of an earlier ticket or task payment.
pub fn byt_check_inputs(tx: &Transaction, view: &impl CoinsView) -> Result<()> {
    byt_check_inputs_nc(tx)?;

    for input in &tx.inputs {
        let coin = view
            .access_coin(&input.prevout)
            .ok_or(RuleError::BadTxinMissingOrSpent)?;

        if coin.is_coinbase {
            continue;
        }

        let legal_coin_tx = coin.tx_type == MLTxType::Regular
            || (coin.tx_type == MLTxType::BuyTicket && input.prevout.index == CHANGE_TXOUT_INDEX)
            || (coin.tx_type == MLTxType::PayForTask && input.prevout.index == CHANGE_TXOUT_INDEX);

        let out = TransactionOutput::new(coin.value, coin.script_pubkey.clone());
        if !legal_coin_tx || !mltx_is_payment_txout(&out) {
            return Err(RuleError::IllegalTxin);
        }
    }

    Ok(())
}

/// Full non-contextual validation.
pub fn byt_tx_valid(tx: &Transaction) -> Result<()> {
    byt_check_inputs_nc(tx)?;
    byt_check_outputs_nc(tx)?;
    byt_parse_script(&sds_from_tx(tx)?).map(|_| ())
}

/// Change is all-or-nothing: a provided output needs both a standard
/// destination and a nonzero in-range amount.
pub(crate) fn validate_change(change: &Option<TransactionOutput>) -> Result<bool, BuildError> {
    match change {
        None => Ok(false),
        Some(out) if out.is_empty() => Ok(false),
        Some(out) => {
            let destination_ok =
                mltx_is_payment_txout(out) && script::extract_destination(&out.script_pubkey).is_some();
            let value_ok = out.value != 0 && money_range(out.value);
            if !destination_ok || !value_ok {
                return Err(BuildError::InconsistentChange);
            }
            Ok(true)
        }
    }
}

/// Assemble a buy ticket transaction.
pub fn byt_tx(
    funding_txins: Vec<TransactionInput>,
    stake_txout: TransactionOutput,
    change_txout: Option<TransactionOutput>,
    actor: ActorType,
    reward_address: &Destination,
    version: u32,
) -> Result<Transaction, BuildError> {
    if funding_txins.is_empty() {
        return Err(BuildError::NoFundingInputs);
    }
    for txin in &funding_txins {
        if txin.prevout.is_null() {
            return Err(BuildError::NullFundingInput);
        }
    }

    if stake_txout.value == 0 || !money_range(stake_txout.value) || !mltx_is_payment_txout(&stake_txout)
    {
        return Err(BuildError::BadStakeOutput);
    }

    let has_change = validate_change(&change_txout)?;

    let sds = byt_script(actor, reward_address, version)?;

    let mut outputs = vec![TransactionOutput::new(0, sds), stake_txout];
    if has_change {
        outputs.push(change_txout.unwrap_or_default());
    }

    Ok(Transaction {
        version: 1,
        inputs: funding_txins,
        outputs,
        lock_time: 0,
    })
}

/// Assemble a buy ticket transaction from addresses and amounts.
#[allow(clippy::too_many_arguments)]
pub fn byt_tx_from_amounts(
    funding_txins: Vec<TransactionInput>,
    stake_address: &Destination,
    stake: Amount,
    change: Option<(Destination, Amount)>,
    actor: ActorType,
    reward_address: &Destination,
    version: u32,
) -> Result<Transaction, BuildError> {
    byt_tx(
        funding_txins,
        TransactionOutput::new(stake, script::script_for_destination(stake_address)),
        change.map(|(address, amount)| {
            TransactionOutput::new(amount, script::script_for_destination(&address))
        }),
        actor,
        reward_address,
        version,
    )
}

/// Materialized view over a parsed buy ticket transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyTicketTx {
    pub version: u32,
    pub actor: ActorType,
    pub reward_address: Destination,
    pub funding_txins: Vec<TransactionInput>,
    pub stake_txout: TransactionOutput,
    pub change_txout: Option<TransactionOutput>,
}

impl BuyTicketTx {
    pub fn name() -> &'static str {
        MLTxType::BuyTicket.name()
    }

    /// Parse a full transaction, validating both layout and script.
    pub fn from_tx(tx: &Transaction) -> Result<Self> {
        if tx.inputs.is_empty() {
            return Err(RuleError::InvalidInputCount);
        }

        if tx.outputs.len() <= STAKE_TXOUT_INDEX as usize
            || tx.outputs.len() > CHANGE_TXOUT_INDEX as usize + 1
        {
            return Err(RuleError::InvalidOutputCount);
        }

        for input in &tx.inputs {
            if input.prevout.hash == [0u8; 32] {
                return Err(RuleError::NullInput);
            }
        }

        let stake_txout = tx.outputs[STAKE_TXOUT_INDEX as usize].clone();
        if stake_txout.value == 0
            || !money_range(stake_txout.value)
            || script::extract_destination(&stake_txout.script_pubkey).is_none()
        {
            return Err(RuleError::InvalidStakeOutput);
        }

        let change_txout = match tx.outputs.get(CHANGE_TXOUT_INDEX as usize) {
            None => None,
            Some(out) => {
                let destination_ok = script::extract_destination(&out.script_pubkey).is_some();
                let value_ok = out.value != 0 && money_range(out.value);
                if destination_ok != value_ok {
                    return Err(RuleError::InvalidChangeCount);
                }
                if destination_ok {
                    Some(out.clone())
                } else {
                    None
                }
            }
        };

        let (version, actor, reward_address) = byt_parse_script(&sds_from_tx(tx)?)?;

        Ok(Self {
            version,
            actor,
            reward_address,
            funding_txins: tx.inputs.clone(),
            stake_txout,
            change_txout,
        })
    }

    pub fn structured_data_script(&self) -> Result<ByteString, BuildError> {
        byt_script(self.actor, &self.reward_address, self.version)
    }

    pub fn stake_amount(&self) -> Amount {
        self.stake_txout.value
    }

    /// Reassemble the transaction.
    pub fn to_tx(&self) -> Result<Transaction, BuildError> {
        byt_tx(
            self.funding_txins.clone(),
            self.stake_txout.clone(),
            self.change_txout.clone(),
            self.actor,
            &self.reward_address,
            self.version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coin, OutPoint, UtxoSet};

    fn destination(byte: u8) -> Destination {
        Destination::PubKeyHash([byte; 20])
    }

    fn funding_input() -> TransactionInput {
        TransactionInput::from_outpoint(OutPoint::new([9; 32], 0))
    }

    fn build_ticket(change: Option<(Destination, Amount)>) -> Transaction {
        byt_tx_from_amounts(
            vec![funding_input()],
            &destination(0x11),
            50_000,
            change,
            ActorType::Client,
            &destination(0x22),
            BYT_CURRENT_VERSION,
        )
        .unwrap()
    }

    #[test]
    fn test_script_round_trip() {
        let sds = byt_script(ActorType::Miner, &destination(0x33), BYT_CURRENT_VERSION).unwrap();
        let (version, actor, reward) = byt_parse_script(&sds).unwrap();
        assert_eq!(version, BYT_CURRENT_VERSION);
        assert_eq!(actor, ActorType::Miner);
        assert_eq!(reward, destination(0x33));

        let script_hash = Destination::ScriptHash([0x44; 20]);
        let sds = byt_script(ActorType::Client, &script_hash, BYT_CURRENT_VERSION).unwrap();
        assert_eq!(byt_parse_script(&sds).unwrap().2, script_hash);
    }

    #[test]
    fn test_script_rejects_future_version() {
        assert_eq!(
            byt_script(ActorType::Client, &destination(1), BYT_CURRENT_VERSION + 1),
            Err(BuildError::UnsupportedVersion(BYT_CURRENT_VERSION + 1))
        );
    }

    #[test]
    fn test_parse_rejects_malformed_items() {
        let sds = byt_script(ActorType::Client, &destination(1), 0).unwrap();
        let mut items = sds_script_items(&sds);

        let mut short = items.clone();
        short.pop();
        assert_eq!(byt_parse_items(&short), Err(RuleError::InvalidScriptSize));

        items[2] = script::scriptnum_encode(MLTxType::PayForTask.ordinal());
        assert_eq!(byt_parse_items(&items), Err(RuleError::NotBuyTicketTx));

        let mut items = sds_script_items(&sds);
        items[4] = script::scriptnum_encode(9);
        assert_eq!(byt_parse_items(&items), Err(RuleError::InvalidActorType));

        let mut items = sds_script_items(&sds);
        items[5] = vec![0u8; 20];
        assert_eq!(byt_parse_items(&items), Err(RuleError::InvalidRewardAddress));

        let mut items = sds_script_items(&sds);
        items[6] = script::scriptnum_encode(3);
        assert_eq!(
            byt_parse_items(&items),
            Err(RuleError::InvalidRewardAddressType)
        );
    }

    #[test]
    fn test_happy_path_two_outputs() {
        let tx = build_ticket(None);
        assert_eq!(tx.outputs.len(), 2);
        assert!(byt_tx_valid(&tx).is_ok());

        let view = BuyTicketTx::from_tx(&tx).unwrap();
        assert_eq!(view.actor, ActorType::Client);
        assert_eq!(view.stake_amount(), 50_000);
        assert_eq!(view.change_txout, None);
        assert_eq!(view.to_tx().unwrap(), tx);
    }

    #[test]
    fn test_happy_path_with_change() {
        let tx = build_ticket(Some((destination(0x55), 7_000)));
        assert_eq!(tx.outputs.len(), 3);
        assert!(byt_tx_valid(&tx).is_ok());

        let view = BuyTicketTx::from_tx(&tx).unwrap();
        assert_eq!(view.change_txout.as_ref().unwrap().value, 7_000);
    }

    #[test]
    fn test_builder_rejections() {
        assert_eq!(
            byt_tx_from_amounts(
                vec![],
                &destination(1),
                1000,
                None,
                ActorType::Client,
                &destination(2),
                0,
            ),
            Err(BuildError::NoFundingInputs)
        );

        assert_eq!(
            byt_tx_from_amounts(
                vec![TransactionInput::from_outpoint(OutPoint::null())],
                &destination(1),
                1000,
                None,
                ActorType::Client,
                &destination(2),
                0,
            ),
            Err(BuildError::NullFundingInput)
        );

        // zero stake
        assert_eq!(
            byt_tx_from_amounts(
                vec![funding_input()],
                &destination(1),
                0,
                None,
                ActorType::Client,
                &destination(2),
                0,
            ),
            Err(BuildError::BadStakeOutput)
        );

        // change output with destination but zero amount
        assert_eq!(
            byt_tx_from_amounts(
                vec![funding_input()],
                &destination(1),
                1000,
                Some((destination(3), 0)),
                ActorType::Client,
                &destination(2),
                0,
            ),
            Err(BuildError::InconsistentChange)
        );
    }

    #[test]
    fn test_check_outputs_nc_rejections() {
        let mut tx = build_ticket(None);
        tx.outputs[STAKE_TXOUT_INDEX as usize].value = 0;
        assert_eq!(byt_check_outputs_nc(&tx), Err(RuleError::BadStakeAmount));

        let mut tx = build_ticket(None);
        tx.outputs[STAKE_TXOUT_INDEX as usize].script_pubkey = vec![OP_RETURN];
        assert_eq!(byt_check_outputs_nc(&tx), Err(RuleError::BadStakeAddress));

        let mut tx = build_ticket(None);
        tx.outputs[STAKE_TXOUT_INDEX as usize].script_pubkey = vec![0x51];
        assert_eq!(byt_check_outputs_nc(&tx), Err(RuleError::IllegalStakeOutput));

        let mut tx = build_ticket(None);
        tx.outputs.swap(0, 1);
        assert_eq!(
            byt_check_outputs_nc(&tx),
            Err(RuleError::InvalidSdsFirstOutput)
        );

        // a trailing output that is not a carrier continuation
        let mut tx = build_ticket(Some((destination(5), 500)));
        tx.outputs.push(TransactionOutput::new(
            1,
            script::script_for_destination(&destination(6)),
        ));
        assert_eq!(
            byt_check_outputs_nc(&tx),
            Err(RuleError::NonzeroSdsSubsequentOutput)
        );
    }

    #[test]
    fn test_check_inputs_contextual() {
        let tx = build_ticket(None);
        let prevout = tx.inputs[0].prevout.clone();

        let mut utxos = UtxoSet::new();
        assert_eq!(
            byt_check_inputs(&tx, &utxos),
            Err(RuleError::BadTxinMissingOrSpent)
        );

        // regular payment coin funds the ticket
        utxos.insert(
            prevout.clone(),
            Coin::regular(100_000, script::script_for_destination(&destination(9)), 5),
        );
        assert!(byt_check_inputs(&tx, &utxos).is_ok());

        // ticket stake coins may not fund further tickets
        let mut stake_coin =
            Coin::regular(100_000, script::script_for_destination(&destination(9)), 5);
        stake_coin.tx_type = MLTxType::BuyTicket;
        utxos.insert(prevout.clone(), stake_coin.clone());
        assert_eq!(byt_check_inputs(&tx, &utxos), Err(RuleError::IllegalTxin));

        // but ticket change outputs may
        let mut tx_from_change = tx.clone();
        tx_from_change.inputs[0].prevout.index = CHANGE_TXOUT_INDEX;
        let mut change_prevout = prevout.clone();
        change_prevout.index = CHANGE_TXOUT_INDEX;
        utxos.insert(change_prevout, stake_coin);
        assert!(byt_check_inputs(&tx_from_change, &utxos).is_ok());
    }

    #[test]
    fn test_from_tx_change_consistency() {
        // third output with destination but zero value is inconsistent
        let mut tx = build_ticket(None);
        tx.outputs.push(TransactionOutput::new(
            0,
            script::script_for_destination(&destination(5)),
        ));
        assert_eq!(
            BuyTicketTx::from_tx(&tx),
            Err(RuleError::InvalidChangeCount)
        );
    }
}
