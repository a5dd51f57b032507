//! Minimal script layer: data pushes, script numbers, output classification.
//!
//! The general script interpreter is out of scope here; this module only
//! provides what the structured-data codec and the "is this a payable
//! output" predicates need. Output classification is a single explicit
//! parser producing a tagged [`ScriptKind`], matched exhaustively by the
//! callers.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::constants::MAX_SCRIPT_SIZE;
use crate::types::{ByteString, Destination};

pub const OP_RETURN: u8 = 0x6a;
/// Marker for structured-data scripts, directly after OP_RETURN.
pub const OP_STRUCT: u8 = 0xc0;

pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;

/// The shape of an output script, as far as this protocol cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptKind {
    PayToPubKeyHash([u8; 20]),
    PayToScriptHash([u8; 20]),
    /// First output of a structured-data script (OP_RETURN + OP_STRUCT).
    StructuredData,
    /// Plain data output (OP_RETURN without the structure marker).
    DataCarrier,
    Unknown,
}

/// Classify an output script.
pub fn classify_script(script: &[u8]) -> ScriptKind {
    if script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[3..23]);
        return ScriptKind::PayToPubKeyHash(hash);
    }

    if script.len() == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[2..22]);
        return ScriptKind::PayToScriptHash(hash);
    }

    if script.len() >= 2 && script[0] == OP_RETURN && script[1] == OP_STRUCT {
        return ScriptKind::StructuredData;
    }

    if !script.is_empty() && script[0] == OP_RETURN {
        return ScriptKind::DataCarrier;
    }

    ScriptKind::Unknown
}

/// Recover the payment destination of a script, if it has one.
pub fn extract_destination(script: &[u8]) -> Option<Destination> {
    match classify_script(script) {
        ScriptKind::PayToPubKeyHash(hash) => Some(Destination::PubKeyHash(hash)),
        ScriptKind::PayToScriptHash(hash) => Some(Destination::ScriptHash(hash)),
        _ => None,
    }
}

/// Standard output script paying to a destination.
pub fn script_for_destination(destination: &Destination) -> ByteString {
    match destination {
        Destination::PubKeyHash(hash) => {
            let mut script = vec![OP_DUP, OP_HASH160, 0x14];
            script.extend_from_slice(hash);
            script.push(OP_EQUALVERIFY);
            script.push(OP_CHECKSIG);
            script
        }
        Destination::ScriptHash(hash) => {
            let mut script = vec![OP_HASH160, 0x14];
            script.extend_from_slice(hash);
            script.push(OP_EQUAL);
            script
        }
    }
}

/// A provably unspendable script (data output or oversized).
pub fn is_unspendable(script: &[u8]) -> bool {
    (!script.is_empty() && script[0] == OP_RETURN) || script.len() > MAX_SCRIPT_SIZE
}

/// RIPEMD160(SHA256(data)), the standard address hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd);
    out
}

/// Append a data push to a script.
pub fn push_data(script: &mut ByteString, data: &[u8]) {
    let len = data.len();
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// Append an integer as a script-number data push.
pub fn push_int(script: &mut ByteString, value: i64) {
    let encoded = scriptnum_encode(value);
    push_data(script, &encoded);
}

/// Script-number serialization: little-endian, sign bit in the top bit of
/// the last byte, zero encodes as the empty vector.
pub fn scriptnum_encode(value: i64) -> ByteString {
    if value == 0 {
        return vec![];
    }

    let negative = value < 0;
    let mut abs = value.unsigned_abs();

    let mut result = Vec::new();
    while abs > 0 {
        result.push((abs & 0xff) as u8);
        abs >>= 8;
    }

    let last = *result.last().unwrap();
    if last & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        *result.last_mut().unwrap() = last | 0x80;
    }

    result
}

/// Decode a script number of at most four bytes.
pub fn scriptnum_decode(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return Some(0);
    }
    if bytes.len() > 4 {
        return None;
    }

    let mut result: i64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        result |= (*byte as i64) << (8 * i);
    }

    if bytes[bytes.len() - 1] & 0x80 != 0 {
        let mask = !(0x80i64 << (8 * (bytes.len() - 1)));
        return Some(-(result & mask));
    }

    Some(result)
}

/// Parse a script consisting purely of data pushes. Any non-push opcode
/// fails the whole parse.
pub fn parse_pushes(script: &[u8]) -> Option<Vec<ByteString>> {
    let mut items = Vec::new();
    let mut pos = 0usize;

    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;

        let len = match opcode {
            n if n < OP_PUSHDATA1 => n as usize,
            OP_PUSHDATA1 => {
                let len = *script.get(pos)? as usize;
                pos += 1;
                len
            }
            OP_PUSHDATA2 => {
                let bytes = script.get(pos..pos + 2)?;
                pos += 2;
                u16::from_le_bytes([bytes[0], bytes[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let bytes = script.get(pos..pos + 4)?;
                pos += 4;
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
            }
            _ => return None,
        };

        let data = script.get(pos..pos + len)?;
        pos += len;
        items.push(data.to_vec());
    }

    Some(items)
}
