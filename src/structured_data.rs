//! Structured data scripts (SDS).
//!
//! A structured-data script is a versioned, classed sequence of data items
//! that can span multiple transaction outputs. The first output must sit at
//! [`SDS_FIRST_OUTPUT_INDEX`](crate::constants::SDS_FIRST_OUTPUT_INDEX) and
//! starts with `OP_RETURN OP_STRUCT version class`; continuation outputs may
//! sit at any later index and start with a bare `OP_RETURN`. Reassembly
//! concatenates continuations in index order.
//!
//! Item 0 is the script version, item 1 the data class; items 2.. are the
//! payload. The helper functions here do no implicit validation beyond what
//! each one documents.

use crate::constants::SDS_FIRST_OUTPUT_INDEX;
use crate::error::{Result, RuleError};
use crate::script::{self, OP_RETURN, OP_STRUCT};
use crate::types::{ByteString, Transaction, TransactionOutput};

/// Structured-data script version. Monotonic; new scripts use
/// [`SDS_CURRENT_VERSION`].
pub type SdsVersion = u32;

pub const SDS_CURRENT_VERSION: SdsVersion = 0;

/// Placeholder for an undecodable version.
pub const SDS_INVALID_VERSION: SdsVersion = 0xffff_ffff;

pub fn sdv_valid(version: SdsVersion) -> bool {
    version != SDS_INVALID_VERSION && version <= SDS_CURRENT_VERSION
}

/// Classes of data carried in structured scripts. Stored ordinals must not
/// be renumbered; only appending is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DataClass {
    PoUW,
}

impl DataClass {
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(DataClass::PoUW),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> i64 {
        match self {
            DataClass::PoUW => 0,
        }
    }
}

/// Start a new structured-data script: `OP_RETURN OP_STRUCT version class`.
/// Payload items are appended with [`script::push_data`] / [`script::push_int`].
pub fn sds_create(class: DataClass, version: SdsVersion) -> ByteString {
    let mut s = vec![OP_RETURN, OP_STRUCT];
    script::push_int(&mut s, version as i64);
    script::push_int(&mut s, class.ordinal());
    s
}

/// Recover the pushed items of a structured-data script, without the two
/// header opcodes. Returns an empty vector when the script is not a
/// structured-data script at all.
pub fn sds_script_items(sds: &[u8]) -> Vec<ByteString> {
    if sds.len() < 2 || sds[0] != OP_RETURN || sds[1] != OP_STRUCT {
        return Vec::new();
    }

    script::parse_pushes(&sds[2..]).unwrap_or_default()
}

/// Version of the script, [`SDS_INVALID_VERSION`] when absent or undecodable.
pub fn sds_version(items: &[ByteString]) -> SdsVersion {
    let Some(item) = items.first() else {
        return SDS_INVALID_VERSION;
    };

    match script::scriptnum_decode(item) {
        Some(v) if (0..=u32::MAX as i64).contains(&v) => v as SdsVersion,
        _ => SDS_INVALID_VERSION,
    }
}

/// Data class of the script, `None` when absent or out of range.
pub fn sds_class(items: &[ByteString]) -> Option<DataClass> {
    let item = items.get(1)?;
    DataClass::from_ordinal(script::scriptnum_decode(item)?)
}

/// Payload items (everything after version and class).
pub fn sds_payload(items: &[ByteString]) -> &[ByteString] {
    if items.len() < 3 {
        return &[];
    }
    &items[2..]
}

/// Structural validity of the item list: at least version + class, both
/// decodable and in range.
pub fn sds_valid(items: &[ByteString]) -> Result<()> {
    if items.len() < 2 {
        return Err(RuleError::InvalidScriptSize);
    }

    if !sdv_valid(sds_version(items)) {
        return Err(RuleError::InvalidScriptVersion);
    }

    if sds_class(items).is_none() {
        return Err(RuleError::InvalidScriptClass);
    }

    Ok(())
}

/// True when the output carries a structurally valid SDS header script.
pub fn sds_is_structured_data_txout(txout: &TransactionOutput) -> bool {
    sds_valid(&sds_script_items(&txout.script_pubkey)).is_ok()
}

/// True for the leading output of a structured-data script.
pub fn sds_is_first_output(txout: &TransactionOutput) -> bool {
    txout.value == 0
        && txout.script_pubkey.len() > 1
        && txout.script_pubkey[0] == OP_RETURN
        && txout.script_pubkey[1] == OP_STRUCT
}

/// True for a continuation output: zero value, `OP_RETURN`, and not a fresh
/// structured-data header.
pub fn sds_is_subsequent_output(txout: &TransactionOutput) -> bool {
    txout.value == 0
        && !txout.script_pubkey.is_empty()
        && txout.script_pubkey[0] == OP_RETURN
        && (txout.script_pubkey.len() == 1 || txout.script_pubkey[1] != OP_STRUCT)
}

/// Reassemble the structured-data script spread over a transaction's outputs.
pub fn sds_from_tx(tx: &Transaction) -> Result<ByteString> {
    sds_from_txouts(&tx.outputs)
}

/// Reassemble from an output list: output 0 must carry the header; every
/// later output starting with `OP_RETURN` (but not a fresh header) is
/// appended in index order with its marker byte dropped.
pub fn sds_from_txouts(txouts: &[TransactionOutput]) -> Result<ByteString> {
    if txouts.len() < SDS_FIRST_OUTPUT_INDEX as usize + 1 {
        return Err(RuleError::InvalidInputCount);
    }

    let first = &txouts[SDS_FIRST_OUTPUT_INDEX as usize].script_pubkey;
    if first.len() < 2 || first[0] != OP_RETURN || first[1] != OP_STRUCT {
        return Err(RuleError::InvalidScriptHeader);
    }

    let mut sds = first.clone();

    for txout in &txouts[SDS_FIRST_OUTPUT_INDEX as usize + 1..] {
        let s = &txout.script_pubkey;
        if s.len() > 1 && s[0] == OP_RETURN && s[1] != OP_STRUCT {
            sds.extend_from_slice(&s[1..]);
        }
    }

    sds_valid(&sds_script_items(&sds))?;

    Ok(sds)
}

/// Split an arbitrary-length structured-data script into zero-value carrier
/// outputs, each at most `max_carrier_bytes` once the per-output overhead is
/// accounted for. Greedy first-fit in script order: chunks are filled to
/// capacity, so a payload of `k * capacity + r` bytes (`0 < r < capacity`)
/// yields `k + 1` outputs.
pub fn sds_tx_outputs(sds: &[u8], max_carrier_bytes: usize) -> Vec<TransactionOutput> {
    let mut outputs = Vec::new();

    let mut processed = 0usize;
    while processed < sds.len() {
        // OP_RETURN + (OP_STRUCT) + length prefix
        let reserved = if processed == 0 { 4 } else { 3 };
        let capacity = max_carrier_bytes.saturating_sub(reserved);
        if capacity == 0 {
            break;
        }
        let chunk_size = capacity.min(sds.len() - processed);

        let mut script_pubkey = Vec::with_capacity(chunk_size + 1);
        if processed > 0 {
            script_pubkey.push(OP_RETURN);
        }
        script_pubkey.extend_from_slice(&sds[processed..processed + chunk_size]);

        outputs.push(TransactionOutput::new(0, script_pubkey));

        processed += chunk_size;
    }

    outputs
}

/// Materialized view over a parsed structured-data script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredData {
    version: SdsVersion,
    data_class: DataClass,
    script: ByteString,
}

impl StructuredData {
    /// Parse the structured-data script out of a transaction's outputs.
    pub fn parse_tx(tx: &Transaction) -> Option<Self> {
        Self::from_script(&sds_from_tx(tx).ok()?)
    }

    pub fn from_script(sds: &[u8]) -> Option<Self> {
        let items = sds_script_items(sds);
        if items.len() < 2 {
            return None;
        }

        let version = sds_version(&items);
        if !sdv_valid(version) {
            return None;
        }

        Some(Self {
            version,
            data_class: sds_class(&items)?,
            script: sds.to_vec(),
        })
    }

    pub fn version(&self) -> SdsVersion {
        self.version
    }

    pub fn data_class(&self) -> DataClass {
        self.data_class
    }

    pub fn script(&self) -> &ByteString {
        &self.script
    }

    /// Items without the two header opcodes.
    pub fn script_items(&self) -> Vec<ByteString> {
        sds_script_items(&self.script)
    }

    pub fn tx_outputs(&self, max_carrier_bytes: usize) -> Vec<TransactionOutput> {
        sds_tx_outputs(&self.script, max_carrier_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_STRUCT_DATA_CARRIER_BYTES;

    fn sample_script() -> ByteString {
        let mut s = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
        script::push_int(&mut s, 7);
        script::push_data(&mut s, b"payload");
        s
    }

    #[test]
    fn test_create_header_bytes() {
        let s = sds_create(DataClass::PoUW, 0);
        // OP_RETURN OP_STRUCT push(0) push(0)
        assert_eq!(s, vec![OP_RETURN, OP_STRUCT, 0x00, 0x00]);
    }

    #[test]
    fn test_script_items() {
        let items = sds_script_items(&sample_script());
        assert_eq!(items.len(), 4);
        assert_eq!(sds_version(&items), SDS_CURRENT_VERSION);
        assert_eq!(sds_class(&items), Some(DataClass::PoUW));
        assert_eq!(sds_payload(&items), &[vec![7u8], b"payload".to_vec()]);
    }

    #[test]
    fn test_script_items_non_sds() {
        assert!(sds_script_items(&[OP_RETURN, 0x01, 0xaa]).is_empty());
        assert!(sds_script_items(&[]).is_empty());
        assert!(sds_script_items(&[0x51]).is_empty());
    }

    #[test]
    fn test_valid() {
        let items = sds_script_items(&sample_script());
        assert!(sds_valid(&items).is_ok());

        assert_eq!(sds_valid(&[vec![0u8]]), Err(RuleError::InvalidScriptSize));

        // version above current
        let mut s = vec![OP_RETURN, OP_STRUCT];
        script::push_int(&mut s, 99);
        script::push_int(&mut s, 0);
        assert_eq!(
            sds_valid(&sds_script_items(&s)),
            Err(RuleError::InvalidScriptVersion)
        );

        // unknown class
        let mut s = vec![OP_RETURN, OP_STRUCT];
        script::push_int(&mut s, 0);
        script::push_int(&mut s, 5);
        assert_eq!(
            sds_valid(&sds_script_items(&s)),
            Err(RuleError::InvalidScriptClass)
        );
    }

    #[test]
    fn test_output_predicates() {
        let first = TransactionOutput::new(0, sample_script());
        assert!(sds_is_first_output(&first));
        assert!(!sds_is_subsequent_output(&first));

        let subsequent = TransactionOutput::new(0, vec![OP_RETURN, 0xaa, 0xbb]);
        assert!(sds_is_subsequent_output(&subsequent));
        assert!(!sds_is_first_output(&subsequent));

        // nonzero value disqualifies both
        let paid = TransactionOutput::new(1, sample_script());
        assert!(!sds_is_first_output(&paid));
        assert!(!sds_is_subsequent_output(&paid));
    }

    #[test]
    fn test_single_output_round_trip() {
        let sds = sample_script();
        let outputs = sds_tx_outputs(&sds, MAX_STRUCT_DATA_CARRIER_BYTES);
        assert_eq!(outputs.len(), 1);
        assert_eq!(sds_from_txouts(&outputs).unwrap(), sds);
    }

    #[test]
    fn test_chunked_round_trip() {
        let mut sds = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
        script::push_data(&mut sds, &vec![0x5a; 700]);

        let outputs = sds_tx_outputs(&sds, MAX_STRUCT_DATA_CARRIER_BYTES);
        assert!(outputs.len() > 1);
        for (i, out) in outputs.iter().enumerate() {
            assert_eq!(out.value, 0);
            assert!(out.script_pubkey.len() <= MAX_STRUCT_DATA_CARRIER_BYTES);
            if i > 0 {
                assert_eq!(out.script_pubkey[0], OP_RETURN);
            }
        }

        assert_eq!(sds_from_txouts(&outputs).unwrap(), sds);
    }

    #[test]
    fn test_chunk_count_exact() {
        // capacity of the first chunk is cap-4, of the others cap-3
        let cap = 64usize;
        let header = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
        let first_capacity = cap - 4;
        let later_capacity = cap - 3;

        // total = first chunk full + one partial continuation
        let total = first_capacity + later_capacity / 2;
        let mut sds = header.clone();
        sds.extend_from_slice(&vec![0u8; total - header.len()]);

        let outputs = sds_tx_outputs(&sds, cap);
        assert_eq!(outputs.len(), 2);

        // exactly k full chunks produce k outputs
        let total = first_capacity + 2 * later_capacity;
        let mut sds = header.clone();
        sds.extend_from_slice(&vec![0u8; total - header.len()]);
        assert_eq!(sds_tx_outputs(&sds, cap).len(), 3);
    }

    #[test]
    fn test_empty_script_produces_no_outputs() {
        assert!(sds_tx_outputs(&[], MAX_STRUCT_DATA_CARRIER_BYTES).is_empty());
    }

    #[test]
    fn test_from_txouts_errors() {
        assert_eq!(sds_from_txouts(&[]), Err(RuleError::InvalidInputCount));

        let bad = TransactionOutput::new(0, vec![OP_RETURN, 0x00]);
        assert_eq!(
            sds_from_txouts(std::slice::from_ref(&bad)),
            Err(RuleError::InvalidScriptHeader)
        );
    }

    #[test]
    fn test_from_txouts_skips_payment_outputs() {
        let sds = sample_script();
        let mut outputs = sds_tx_outputs(&sds, MAX_STRUCT_DATA_CARRIER_BYTES);
        // stake/change style outputs between header and continuations are ignored
        outputs.push(TransactionOutput::new(
            500,
            script::script_for_destination(&crate::types::Destination::PubKeyHash([1; 20])),
        ));
        assert_eq!(sds_from_txouts(&outputs).unwrap(), sds);
    }

    #[test]
    fn test_structured_data_view() {
        let sds = sample_script();
        let view = StructuredData::from_script(&sds).unwrap();
        assert_eq!(view.version(), SDS_CURRENT_VERSION);
        assert_eq!(view.data_class(), DataClass::PoUW);
        assert_eq!(view.script(), &sds);
        assert_eq!(view.script_items().len(), 4);

        assert!(StructuredData::from_script(&[OP_RETURN, 0x00]).is_none());
    }
}
