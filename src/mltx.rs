//! Machine-learning transaction classification.
//!
//! The ML workflow spans four special transaction types carried in the PoUW
//! structured-data class, plus the `Regular` sentinel for everything else.
//! Classification is total: any transaction that does not parse as a
//! well-formed PoUW script is simply `Regular`.

use serde::{Deserialize, Serialize};

use crate::buy_ticket::BYT_CURRENT_VERSION;
use crate::script;
use crate::structured_data::{sds_class, sds_from_tx, sds_script_items, DataClass};
use crate::types::{Transaction, TransactionOutput};

/// The actors in the machine-learning process. Stored ordinals must not be
/// renumbered; only appending is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorType {
    Client,
    Miner,
    Supervisor,
    Evaluator,
    Verifier,
}

impl ActorType {
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(ActorType::Client),
            1 => Some(ActorType::Miner),
            2 => Some(ActorType::Supervisor),
            3 => Some(ActorType::Evaluator),
            4 => Some(ActorType::Verifier),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> i64 {
        match self {
            ActorType::Client => 0,
            ActorType::Miner => 1,
            ActorType::Supervisor => 2,
            ActorType::Evaluator => 3,
            ActorType::Verifier => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActorType::Client => "client",
            ActorType::Miner => "miner",
            ActorType::Supervisor => "supervisor",
            ActorType::Evaluator => "evaluator",
            ActorType::Verifier => "verifier",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "client" => Some(ActorType::Client),
            "miner" => Some(ActorType::Miner),
            "supervisor" => Some(ActorType::Supervisor),
            "evaluator" => Some(ActorType::Evaluator),
            "verifier" => Some(ActorType::Verifier),
            _ => None,
        }
    }
}

/// The special transaction types of the ML workflow. `Regular` is the
/// sentinel for any transaction outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MLTxType {
    BuyTicket,
    RevokeTicket,
    PayForTask,
    JoinTask,
    Regular,
}

impl MLTxType {
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(MLTxType::BuyTicket),
            1 => Some(MLTxType::RevokeTicket),
            2 => Some(MLTxType::PayForTask),
            3 => Some(MLTxType::JoinTask),
            4 => Some(MLTxType::Regular),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> i64 {
        match self {
            MLTxType::BuyTicket => 0,
            MLTxType::RevokeTicket => 1,
            MLTxType::PayForTask => 2,
            MLTxType::JoinTask => 3,
            MLTxType::Regular => 4,
        }
    }

    /// True for the four special types, false for `Regular`.
    pub fn is_ml(&self) -> bool {
        *self != MLTxType::Regular
    }

    pub fn name(&self) -> &'static str {
        match self {
            MLTxType::BuyTicket => "buy_ticket",
            MLTxType::RevokeTicket => "revoke_ticket",
            MLTxType::PayForTask => "pay_for_task",
            MLTxType::JoinTask => "join_task",
            MLTxType::Regular => "regular",
        }
    }
}

/// Classify a transaction by the type item of its PoUW structured-data
/// script. Anything that fails to parse is `Regular`.
pub fn mltx_type(tx: &Transaction) -> MLTxType {
    let Ok(sds) = sds_from_tx(tx) else {
        return MLTxType::Regular;
    };

    let items = sds_script_items(&sds);
    if items.len() < 3 {
        return MLTxType::Regular;
    }

    if sds_class(&items) != Some(DataClass::PoUW) {
        return MLTxType::Regular;
    }

    match script::scriptnum_decode(&items[2]).and_then(MLTxType::from_ordinal) {
        Some(t) => t,
        None => MLTxType::Regular,
    }
}

pub fn mltx_is_ml(tx: &Transaction) -> bool {
    mltx_type(tx).is_ml()
}

/// Actor declared by a buy ticket transaction. `None` for any other
/// transaction, or when the declared version or actor is out of range.
pub fn at_actor(tx: &Transaction) -> Option<ActorType> {
    let sds = sds_from_tx(tx).ok()?;
    let items = sds_script_items(&sds);
    if items.len() < 5 {
        return None;
    }

    if sds_class(&items) != Some(DataClass::PoUW) {
        return None;
    }

    if script::scriptnum_decode(&items[2]).and_then(MLTxType::from_ordinal)
        != Some(MLTxType::BuyTicket)
    {
        return None;
    }

    let version = script::scriptnum_decode(&items[3])?;
    if !(0..=BYT_CURRENT_VERSION as i64).contains(&version) {
        return None;
    }

    ActorType::from_ordinal(script::scriptnum_decode(&items[4])?)
}

/// True for any data output, structured or not.
pub fn mltx_is_data_txout(txout: &TransactionOutput) -> bool {
    !txout.script_pubkey.is_empty() && txout.script_pubkey[0] == script::OP_RETURN
}

/// True when the output carries a structurally valid structured-data script.
pub fn mltx_is_structured_data_txout(txout: &TransactionOutput) -> bool {
    crate::structured_data::sds_is_structured_data_txout(txout)
}

/// A spendable, non-data output.
pub fn mltx_is_payment_txout(txout: &TransactionOutput) -> bool {
    if txout.script_pubkey.is_empty() {
        return false;
    }

    if mltx_is_data_txout(txout) {
        return false;
    }

    !script::is_unspendable(&txout.script_pubkey)
}

/// A payment output to a standard single-hash destination, the only shape
/// allowed for ticket stakes.
pub fn mltx_is_legal_stake_txout(txout: &TransactionOutput) -> bool {
    mltx_is_payment_txout(txout) && script::extract_destination(&txout.script_pubkey).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{OP_RETURN, OP_STRUCT};
    use crate::structured_data::{sds_create, SDS_CURRENT_VERSION};
    use crate::types::Destination;

    fn pouw_tx(tx_type_ordinal: i64) -> Transaction {
        let mut sds = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
        script::push_int(&mut sds, tx_type_ordinal);
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TransactionOutput::new(0, sds)],
            lock_time: 0,
        }
    }

    #[test]
    fn test_actor_ordinal_round_trip() {
        for actor in [
            ActorType::Client,
            ActorType::Miner,
            ActorType::Supervisor,
            ActorType::Evaluator,
            ActorType::Verifier,
        ] {
            assert_eq!(ActorType::from_ordinal(actor.ordinal()), Some(actor));
            assert_eq!(ActorType::from_name(actor.name()), Some(actor));
        }
        assert_eq!(ActorType::from_ordinal(5), None);
        assert_eq!(ActorType::from_name("oracle"), None);
        assert_eq!(ActorType::from_name("MINER"), Some(ActorType::Miner));
    }

    #[test]
    fn test_mltx_ordinal_round_trip() {
        for t in [
            MLTxType::BuyTicket,
            MLTxType::RevokeTicket,
            MLTxType::PayForTask,
            MLTxType::JoinTask,
            MLTxType::Regular,
        ] {
            assert_eq!(MLTxType::from_ordinal(t.ordinal()), Some(t));
        }
        assert_eq!(MLTxType::from_ordinal(5), None);
        assert!(MLTxType::BuyTicket.is_ml());
        assert!(!MLTxType::Regular.is_ml());
    }

    #[test]
    fn test_classify_by_type_item() {
        assert_eq!(mltx_type(&pouw_tx(0)), MLTxType::BuyTicket);
        assert_eq!(mltx_type(&pouw_tx(1)), MLTxType::RevokeTicket);
        assert_eq!(mltx_type(&pouw_tx(2)), MLTxType::PayForTask);
        assert_eq!(mltx_type(&pouw_tx(3)), MLTxType::JoinTask);
        // out-of-range ordinal degrades to regular
        assert_eq!(mltx_type(&pouw_tx(17)), MLTxType::Regular);
    }

    #[test]
    fn test_classify_non_sds_is_regular() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TransactionOutput::new(
                1000,
                script::script_for_destination(&Destination::PubKeyHash([1; 20])),
            )],
            lock_time: 0,
        };
        assert_eq!(mltx_type(&tx), MLTxType::Regular);
        assert!(!mltx_is_ml(&tx));

        let empty = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![],
            lock_time: 0,
        };
        assert_eq!(mltx_type(&empty), MLTxType::Regular);
    }

    #[test]
    fn test_at_actor_requires_buy_ticket() {
        // a pay-for-task script has no declared actor
        assert_eq!(at_actor(&pouw_tx(2)), None);

        let mut sds = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
        script::push_int(&mut sds, MLTxType::BuyTicket.ordinal());
        script::push_int(&mut sds, 0);
        script::push_int(&mut sds, ActorType::Miner.ordinal());
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TransactionOutput::new(0, sds)],
            lock_time: 0,
        };
        assert_eq!(at_actor(&tx), Some(ActorType::Miner));
    }

    #[test]
    fn test_txout_predicates() {
        let payment = TransactionOutput::new(
            1000,
            script::script_for_destination(&Destination::PubKeyHash([1; 20])),
        );
        assert!(mltx_is_payment_txout(&payment));
        assert!(mltx_is_legal_stake_txout(&payment));
        assert!(!mltx_is_data_txout(&payment));

        let data = TransactionOutput::new(0, vec![OP_RETURN, 0x01, 0xaa]);
        assert!(mltx_is_data_txout(&data));
        assert!(!mltx_is_payment_txout(&data));
        assert!(!mltx_is_legal_stake_txout(&data));

        let structured =
            TransactionOutput::new(0, sds_create(DataClass::PoUW, SDS_CURRENT_VERSION));
        assert!(mltx_is_data_txout(&structured));
        assert!(mltx_is_structured_data_txout(&structured));
        assert_eq!(structured.script_pubkey[1], OP_STRUCT);

        // empty-script outputs are neither data nor payment
        let empty = TransactionOutput::new(500, vec![]);
        assert!(!mltx_is_data_txout(&empty));
        assert!(!mltx_is_payment_txout(&empty));

        // nonstandard but spendable script is payment, not legal stake
        let odd = TransactionOutput::new(500, vec![0x51]);
        assert!(mltx_is_payment_txout(&odd));
        assert!(!mltx_is_legal_stake_txout(&odd));
    }
}
