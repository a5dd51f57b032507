//! Core ledger types shared by the structured-data transaction protocol.

use bitcoin_hashes::{sha256d, Hash as HashTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::*;
use crate::mltx::{ActorType, MLTxType};

/// 256-bit hash
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Monetary amount in base units
pub type Amount = i64;

/// Block height
pub type Natural = u64;

/// Check that an amount is within the legal monetary range.
pub fn money_range(value: Amount) -> bool {
    (0..=MAX_MONEY).contains(&value)
}

/// Reference to a transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }

    /// The null outpoint, only legal in coinbase inputs.
    pub fn null() -> Self {
        Self {
            hash: [0u8; 32],
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.hash == [0u8; 32] && self.index == u32::MAX
    }
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: ByteString,
    pub sequence: u32,
}

impl TransactionInput {
    /// An input spending `prevout` with an empty signature script.
    pub fn from_outpoint(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: vec![],
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: Amount,
    pub script_pubkey: ByteString,
}

impl TransactionOutput {
    pub fn new(value: Amount, script_pubkey: ByteString) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    /// True when both value and script are unset. Used to detect the
    /// "no change" placeholder in builders.
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Transaction id: double-SHA256 of the serialized transaction.
    pub fn txid(&self) -> Hash {
        let hash = sha256d::Hash::hash(&self.serialize());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hash[..]);
        out
    }

    /// Bitcoin-style wire serialization, used for hashing and size
    /// accounting.
    pub fn serialize(&self) -> ByteString {
        let mut data = Vec::new();

        data.extend_from_slice(&self.version.to_le_bytes());

        data.extend_from_slice(&encode_varint(self.inputs.len() as u64));
        for input in &self.inputs {
            data.extend_from_slice(&input.prevout.hash);
            data.extend_from_slice(&input.prevout.index.to_le_bytes());
            data.extend_from_slice(&encode_varint(input.script_sig.len() as u64));
            data.extend_from_slice(&input.script_sig);
            data.extend_from_slice(&input.sequence.to_le_bytes());
        }

        data.extend_from_slice(&encode_varint(self.outputs.len() as u64));
        for output in &self.outputs {
            data.extend_from_slice(&(output.value as u64).to_le_bytes());
            data.extend_from_slice(&encode_varint(output.script_pubkey.len() as u64));
            data.extend_from_slice(&output.script_pubkey);
        }

        data.extend_from_slice(&self.lock_time.to_le_bytes());

        data
    }
}

/// Encode a number as a Bitcoin varint
pub fn encode_varint(value: u64) -> Vec<u8> {
    if value < 0xfd {
        vec![value as u8]
    } else if value <= 0xffff {
        let mut v = vec![0xfd];
        v.extend_from_slice(&(value as u16).to_le_bytes());
        v
    } else if value <= 0xffff_ffff {
        let mut v = vec![0xfe];
        v.extend_from_slice(&(value as u32).to_le_bytes());
        v
    } else {
        let mut v = vec![0xff];
        v.extend_from_slice(&value.to_le_bytes());
        v
    }
}

/// Payment destination: a 160-bit hash plus a discriminant separating
/// pay-to-pubkey-hash from pay-to-script-hash. The discriminant ordinals
/// (1 and 2) are stored in scripts and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    PubKeyHash([u8; 20]),
    ScriptHash([u8; 20]),
}

impl Destination {
    /// The wire discriminant (0 is reserved for "no destination").
    pub fn address_type(&self) -> i64 {
        match self {
            Destination::PubKeyHash(_) => 1,
            Destination::ScriptHash(_) => 2,
        }
    }

    pub fn from_type_and_hash(address_type: i64, hash: [u8; 20]) -> Option<Self> {
        match address_type {
            1 => Some(Destination::PubKeyHash(hash)),
            2 => Some(Destination::ScriptHash(hash)),
            _ => None,
        }
    }

    pub fn hash(&self) -> &[u8; 20] {
        match self {
            Destination::PubKeyHash(h) | Destination::ScriptHash(h) => h,
        }
    }
}

/// An unspent output together with the metadata recorded by the storage
/// engine at creation time. `tx_type` and `actor` are the only channel
/// through which contextual validation learns about a referenced ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub value: Amount,
    pub script_pubkey: ByteString,
    pub height: Natural,
    pub is_coinbase: bool,
    pub tx_type: MLTxType,
    pub actor: Option<ActorType>,
}

impl Coin {
    /// A plain payment coin with no ML provenance.
    pub fn regular(value: Amount, script_pubkey: ByteString, height: Natural) -> Self {
        Self {
            value,
            script_pubkey,
            height,
            is_coinbase: false,
            tx_type: MLTxType::Regular,
            actor: None,
        }
    }
}

/// Read-only access to a UTXO-set snapshot. The caller must guarantee the
/// snapshot is not mutated for the duration of a contextual check.
pub trait CoinsView {
    /// Look up an unspent coin. Spent and unknown outpoints return `None`.
    fn access_coin(&self, outpoint: &OutPoint) -> Option<&Coin>;
}

/// In-memory UTXO set
pub type UtxoSet = HashMap<OutPoint, Coin>;

impl CoinsView for UtxoSet {
    fn access_coin(&self, outpoint: &OutPoint) -> Option<&Coin> {
        self.get(outpoint)
    }
}

/// The subset of consensus parameters the ticket protocol reads. Passed
/// explicitly into contextual checks instead of a global parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    /// Blocks before a purchased ticket may be spent by PfT/JnT.
    pub ticket_maturity: Natural,
    /// Blocks after maturity during which the ticket is spendable; once
    /// elapsed, only revocation remains.
    pub ticket_expiry: Natural,
    /// Ceiling on a single structured-data carrier output.
    pub max_struct_data_carrier_bytes: usize,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            ticket_maturity: TICKET_MATURITY,
            ticket_expiry: TICKET_EXPIRY,
            max_struct_data_carrier_bytes: MAX_STRUCT_DATA_CARRIER_BYTES,
        }
    }
}
