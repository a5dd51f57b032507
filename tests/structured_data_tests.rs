//! Integration tests for structured-data scripts spread over transaction
//! outputs.

use pouw_consensus::script::{push_data, push_int, OP_RETURN, OP_STRUCT};
use pouw_consensus::structured_data::*;
use pouw_consensus::*;

fn pouw_script_with_payload(payload: &[u8]) -> Vec<u8> {
    let mut sds = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
    push_data(&mut sds, payload);
    sds
}

#[test]
fn test_header_layout() {
    let sds = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
    assert_eq!(sds[0], OP_RETURN);
    assert_eq!(sds[1], OP_STRUCT);

    let items = sds_script_items(&sds);
    assert_eq!(sds_version(&items), SDS_CURRENT_VERSION);
    assert_eq!(sds_class(&items), Some(DataClass::PoUW));
    assert!(sds_valid(&items).is_ok());
}

#[test]
fn test_chunk_counts_across_boundaries() {
    let cap = MAX_STRUCT_DATA_CARRIER_BYTES;
    let first_capacity = cap - 4;
    let later_capacity = cap - 3;

    // exactly one full first chunk
    let sds = pouw_script_with_payload(&vec![0x42; 180]);
    let padded: Vec<u8> = sds
        .iter()
        .cloned()
        .chain(std::iter::repeat(0).take(first_capacity - sds.len()))
        .collect();
    assert_eq!(sds_tx_outputs(&padded, cap).len(), 1);

    // one extra byte forces a continuation output
    let mut overflow = padded.clone();
    overflow.push(0x99);
    let outputs = sds_tx_outputs(&overflow, cap);
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[1].script_pubkey, vec![OP_RETURN, 0x99]);

    // k full chunks plus a remainder yield k + 1 outputs
    let total = first_capacity + 3 * later_capacity + 17;
    let mut large = sds.clone();
    large.extend(std::iter::repeat(0x5a).take(total - sds.len()));
    assert_eq!(sds_tx_outputs(&large, cap).len(), 5);
}

#[test]
fn test_round_trip_through_outputs() {
    let mut sds = sds_create(DataClass::PoUW, SDS_CURRENT_VERSION);
    push_int(&mut sds, 42);
    push_data(&mut sds, &vec![0xcd; 900]);

    let outputs = sds_tx_outputs(&sds, MAX_STRUCT_DATA_CARRIER_BYTES);
    assert!(outputs.len() > 1);

    for output in &outputs {
        assert_eq!(output.value, 0);
        assert!(output.script_pubkey.len() <= MAX_STRUCT_DATA_CARRIER_BYTES);
    }
    assert!(sds_is_first_output(&outputs[0]));
    for output in &outputs[1..] {
        assert!(sds_is_subsequent_output(output));
    }

    assert_eq!(sds_from_txouts(&outputs).unwrap(), sds);

    // embedded in a transaction
    let tx = Transaction {
        version: 1,
        inputs: vec![],
        outputs,
        lock_time: 0,
    };
    assert_eq!(sds_from_tx(&tx).unwrap(), sds);

    let view = StructuredData::parse_tx(&tx).unwrap();
    assert_eq!(view.data_class(), DataClass::PoUW);
    assert_eq!(view.script(), &sds);
}

#[test]
fn test_payment_outputs_do_not_disturb_reassembly() {
    let sds = pouw_script_with_payload(&vec![0x11; 600]);
    let mut outputs = sds_tx_outputs(&sds, MAX_STRUCT_DATA_CARRIER_BYTES);

    // interleave a payment between header and continuations
    let payment = TransactionOutput::new(
        10_000,
        pouw_consensus::script::script_for_destination(&Destination::PubKeyHash([5; 20])),
    );
    outputs.insert(1, payment);

    assert_eq!(sds_from_txouts(&outputs).unwrap(), sds);
}

#[test]
fn test_reassembly_rejects_bad_headers() {
    assert_eq!(sds_from_txouts(&[]), Err(RuleError::InvalidInputCount));

    // a first output without the structure marker
    let outputs = vec![TransactionOutput::new(0, vec![OP_RETURN, 0x02, 0xaa, 0xbb])];
    assert_eq!(
        sds_from_txouts(&outputs),
        Err(RuleError::InvalidScriptHeader)
    );

    // a structurally complete header with an unknown class
    let mut bad_class = vec![OP_RETURN, OP_STRUCT];
    push_int(&mut bad_class, 0);
    push_int(&mut bad_class, 9);
    let outputs = vec![TransactionOutput::new(0, bad_class)];
    assert_eq!(sds_from_txouts(&outputs), Err(RuleError::InvalidScriptClass));
}

#[test]
fn test_version_gate() {
    let mut future = vec![OP_RETURN, OP_STRUCT];
    push_int(&mut future, SDS_CURRENT_VERSION as i64 + 1);
    push_int(&mut future, 0);
    assert_eq!(
        sds_valid(&sds_script_items(&future)),
        Err(RuleError::InvalidScriptVersion)
    );
    assert!(StructuredData::from_script(&future).is_none());
}
