pub type EraseCount = u32;
pub type BlockId = u8;

pub const TOTAL_BLOCKS: usize = 128;
pub const BLOCK_SIZE: usize = 65536;

pub const REGISTER_COUNT: usize = 3;
pub const REGISTER_SIZE: usize = 256;

pub const SLOTS_PER_REGISTER: usize = 64;
pub const COUNTER_BYTES: usize = 4;

pub const ERASE_COUNT_LO_REGISTER: u8 = 1;
pub const ERASE_COUNT_HI_REGISTER: u8 = 2;
pub const BLOCK_MAP_REGISTER: u8 = 3;

pub const BLOCK_MAP_LEN: usize = TOTAL_BLOCKS;

pub const CAPACITY: usize = TOTAL_BLOCKS * BLOCK_SIZE;

pub const ERASED_BYTE: u8 = 0xFF;
