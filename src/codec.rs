//! Byte layout of the wear-leveling metadata inside the security
//! registers. Pure translation, no policy: register 1 holds the
//! big-endian erase counters for blocks 0-63, register 2 the counters
//! for blocks 64-127, register 3 the block map at one byte per logical
//! block.

use num_integer::Integer;

use crate::config::*;

/// Decodes the full erase-count table from the raw contents of
/// registers 1 and 2.
pub fn decode_erase_counts(
    lo: &[u8; REGISTER_SIZE],
    hi: &[u8; REGISTER_SIZE],
) -> [EraseCount; TOTAL_BLOCKS] {
    let mut counts = [0; TOTAL_BLOCKS];
    for slot in 0..SLOTS_PER_REGISTER {
        let at = slot * COUNTER_BYTES;
        counts[slot] = EraseCount::from_be_bytes([lo[at], lo[at + 1], lo[at + 2], lo[at + 3]]);
        counts[slot + SLOTS_PER_REGISTER] =
            EraseCount::from_be_bytes([hi[at], hi[at + 1], hi[at + 2], hi[at + 3]]);
    }
    counts
}

/// Encodes one counter as (register, byte offset, payload).
pub fn encode_erase_count(
    block: BlockId,
    value: EraseCount,
) -> (u8, usize, [u8; COUNTER_BYTES]) {
    let (register, slot) = (block as usize).div_mod_floor(&SLOTS_PER_REGISTER);
    (
        ERASE_COUNT_LO_REGISTER + register as u8,
        slot * COUNTER_BYTES,
        value.to_be_bytes(),
    )
}

pub fn decode_block_map(raw: &[u8; BLOCK_MAP_LEN]) -> [BlockId; TOTAL_BLOCKS] {
    *raw
}

/// Encodes one block-map entry as (byte offset, payload). The register
/// is always `BLOCK_MAP_REGISTER`; entries are packed at one byte per
/// logical block on both the read and the write path.
pub fn encode_block_map_entry(logical: BlockId, physical: BlockId) -> (usize, [u8; 1]) {
    (logical as usize, [physical])
}
