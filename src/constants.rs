//! Consensus constants for the PoUW structured-data protocol.

/// Maximum money supply in base units
pub const MAX_MONEY: i64 = 21_000_000 * 100_000_000;

/// Maximum script length
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Output index that must carry the first structured-data output
pub const SDS_FIRST_OUTPUT_INDEX: u32 = 0;

/// Output index of the stake output in ByT, PfT and JnT transactions
pub const STAKE_TXOUT_INDEX: u32 = SDS_FIRST_OUTPUT_INDEX + 1;

/// Output index of the refund output in RvT transactions (alias of the
/// stake index; the two never coexist in one transaction type)
pub const REFUND_TXOUT_INDEX: u32 = SDS_FIRST_OUTPUT_INDEX + 1;

/// Output index of the optional change output
pub const CHANGE_TXOUT_INDEX: u32 = STAKE_TXOUT_INDEX + 1;

/// Input index of the spent ticket stake in RvT, PfT and JnT transactions
pub const TICKET_TXIN_INDEX: usize = 0;

/// Ceiling on the size of a single structured-data carrier output
pub const MAX_STRUCT_DATA_CARRIER_BYTES: usize = 256;

/// Blocks before a purchased ticket matures
pub const TICKET_MATURITY: u64 = 100;

/// Blocks after maturity before an unused ticket becomes revocable
pub const TICKET_EXPIRY: u64 = 1000;

/// Sequence number for final transaction
pub const SEQUENCE_FINAL: u32 = 0xffffffff;
