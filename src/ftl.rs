#[cfg(test)]
use std::{println as debug, println as info, println as trace};

#[cfg(not(test))]
use log::*;

use crate::codec;
use crate::config::*;
use crate::flash::FlashDevice;

/// Wear-leveling engine. Owns the working copies of the erase-count
/// table and the logical-to-physical block map; every mutation is
/// persisted back to the security registers through the codec.
pub struct Ftl<F: FlashDevice> {
    flash: F,
    erase_counts: [EraseCount; TOTAL_BLOCKS],
    block_map: [BlockId; TOTAL_BLOCKS],
    initialized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Formatted,
    AlreadyInitialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// The underlying flash driver reported a failure.
    Driver(E),
    /// Logical block number, or a persisted map entry, outside [0, 127].
    InvalidBlockNumber(BlockId),
    /// Payload longer than one block's data capacity.
    InvalidLength(usize),
}

const METADATA_REGISTERS: [u8; REGISTER_COUNT] = [
    ERASE_COUNT_LO_REGISTER,
    ERASE_COUNT_HI_REGISTER,
    BLOCK_MAP_REGISTER,
];

impl<F: FlashDevice> Ftl<F> {
    pub fn new(flash: F) -> Self {
        let mut block_map = [0; TOTAL_BLOCKS];
        for (logical, entry) in block_map.iter_mut().enumerate() {
            *entry = logical as BlockId;
        }

        Ftl {
            flash,
            erase_counts: [0; TOTAL_BLOCKS],
            block_map,
            initialized: false,
        }
    }

    /// One-time bootstrap of the metadata registers. The first call
    /// blanks all three registers and programs a zeroed counter table
    /// plus an identity block map; later calls on the same engine are
    /// no-ops. Data blocks are never touched.
    pub fn initialize(&mut self) -> Result<InitStatus, Error<F::Error>> {
        if self.initialized {
            info!("filesystem already initialized");
            return Ok(InitStatus::AlreadyInitialized);
        }

        for register in METADATA_REGISTERS {
            self.flash
                .erase_security_register(register)
                .map_err(Error::Driver)?;
        }

        let zeroed = [0u8; REGISTER_SIZE];
        self.flash
            .write_security_register(ERASE_COUNT_LO_REGISTER, 0, &zeroed)
            .map_err(Error::Driver)?;
        self.flash
            .write_security_register(ERASE_COUNT_HI_REGISTER, 0, &zeroed)
            .map_err(Error::Driver)?;

        let mut identity = [0u8; BLOCK_MAP_LEN];
        for (logical, entry) in identity.iter_mut().enumerate() {
            *entry = logical as BlockId;
        }
        self.flash
            .write_security_register(BLOCK_MAP_REGISTER, 0, &identity)
            .map_err(Error::Driver)?;

        self.initialized = true;
        info!("filesystem initialized for the first time");
        Ok(InitStatus::Formatted)
    }

    /// Hydrates both in-memory tables from the registers. The tables
    /// are only replaced once the persisted block map passed range
    /// validation.
    pub fn load(&mut self) -> Result<(), Error<F::Error>> {
        let mut lo = [0u8; REGISTER_SIZE];
        let mut hi = [0u8; REGISTER_SIZE];
        self.flash
            .read_security_register(ERASE_COUNT_LO_REGISTER, 0, &mut lo)
            .map_err(Error::Driver)?;
        self.flash
            .read_security_register(ERASE_COUNT_HI_REGISTER, 0, &mut hi)
            .map_err(Error::Driver)?;

        let mut raw_map = [0u8; BLOCK_MAP_LEN];
        self.flash
            .read_security_register(BLOCK_MAP_REGISTER, 0, &mut raw_map)
            .map_err(Error::Driver)?;

        let block_map = codec::decode_block_map(&raw_map);
        if let Some(&bad) = block_map.iter().find(|&&e| e as usize >= TOTAL_BLOCKS) {
            return Err(Error::InvalidBlockNumber(bad));
        }

        self.erase_counts = codec::decode_erase_counts(&lo, &hi);
        self.block_map = block_map;
        self.initialized = true;

        debug!("loaded metadata, total erase count {}", self.total_erase_count());
        Ok(())
    }

    /// Picks the physical block that should absorb the next write to
    /// `logical`: the least-worn block overall, ties to the lowest
    /// index, except that the currently mapped block is kept whenever
    /// it is already at the minimum. `logical` must be below
    /// `TOTAL_BLOCKS`.
    pub fn select_physical_block(&self, logical: BlockId) -> BlockId {
        debug_assert!((logical as usize) < TOTAL_BLOCKS);

        let mut lowest = 0;
        for block in 1..TOTAL_BLOCKS {
            if self.erase_counts[block] < self.erase_counts[lowest] {
                lowest = block;
            }
        }

        // Relocate only when a strictly less-worn block exists.
        let current = self.block_map[logical as usize];
        if self.erase_counts[current as usize] <= self.erase_counts[lowest] {
            current
        } else {
            lowest as BlockId
        }
    }

    /// One wear-leveled write: data first, then the in-memory tables,
    /// then the two metadata entries that changed. Driver failures
    /// surface to the caller; nothing is retried here.
    pub fn write(&mut self, logical: BlockId, data: &[u8]) -> Result<(), Error<F::Error>> {
        if logical as usize >= TOTAL_BLOCKS {
            return Err(Error::InvalidBlockNumber(logical));
        }
        if data.len() > BLOCK_SIZE {
            return Err(Error::InvalidLength(data.len()));
        }

        let target = self.select_physical_block(logical);
        self.flash
            .write_data(target as u32 * BLOCK_SIZE as u32, 0, data)
            .map_err(Error::Driver)?;

        // Counters saturate instead of wrapping at the 32-bit boundary.
        let count = self.erase_counts[target as usize].saturating_add(1);
        self.erase_counts[target as usize] = count;
        self.block_map[logical as usize] = target;

        let (register, offset, bytes) = codec::encode_erase_count(target, count);
        self.flash
            .write_security_register(register, offset, &bytes)
            .map_err(Error::Driver)?;

        let (offset, byte) = codec::encode_block_map_entry(logical, target);
        self.flash
            .write_security_register(BLOCK_MAP_REGISTER, offset, &byte)
            .map_err(Error::Driver)?;

        trace!("logical {} -> physical {}, erase count {}", logical, target, count);
        Ok(())
    }

    /// Snapshot for diagnostics. Only meaningful between operations.
    pub fn erase_counts(&self) -> &[EraseCount; TOTAL_BLOCKS] {
        &self.erase_counts
    }

    pub fn block_map(&self) -> &[BlockId; TOTAL_BLOCKS] {
        &self.block_map
    }

    pub fn total_erase_count(&self) -> u64 {
        self.erase_counts.iter().map(|&c| c as u64).sum()
    }

    pub fn into_flash(self) -> F {
        self.flash
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::flash::{FlashError, MemFlash};

    fn fresh() -> Ftl<MemFlash> {
        let mut fs = Ftl::new(MemFlash::new());
        assert_eq!(fs.initialize().unwrap(), InitStatus::Formatted);
        fs.load().unwrap();
        fs
    }

    #[test]
    fn fresh_device_has_zero_counts_and_identity_map() {
        let fs = fresh();
        assert!(fs.erase_counts().iter().all(|&c| c == 0));
        for logical in 0..TOTAL_BLOCKS {
            assert_eq!(fs.block_map()[logical], logical as BlockId);
        }
    }

    #[test]
    fn second_initialize_is_a_noop() {
        let mut fs = fresh();
        fs.write(9, b"payload").unwrap();

        assert_eq!(fs.initialize().unwrap(), InitStatus::AlreadyInitialized);

        // The registers were not re-blanked.
        fs.load().unwrap();
        assert_eq!(fs.erase_counts()[9], 1);
    }

    #[test]
    fn first_write_stays_on_identity_block() {
        let mut fs = fresh();
        fs.write(5, b"abc").unwrap();

        assert_eq!(fs.block_map()[5], 5);
        assert_eq!(fs.erase_counts()[5], 1);
    }

    #[test]
    fn repeated_write_relocates_to_least_worn_block() {
        let mut fs = fresh();
        fs.write(5, b"abc").unwrap();

        // Block 5 now has count 1; block 0 holds the global minimum.
        fs.write(5, b"abc").unwrap();
        assert_eq!(fs.block_map()[5], 0);
        assert_eq!(fs.erase_counts()[0], 1);
        assert_eq!(fs.erase_counts()[5], 1);
    }

    #[test]
    fn relocates_to_unique_minimum() {
        let mut fs = fresh();
        fs.erase_counts = [3; TOTAL_BLOCKS];
        fs.erase_counts[77] = 1;

        assert_eq!(fs.select_physical_block(5), 77);
    }

    #[test]
    fn keeps_current_block_when_already_at_minimum() {
        let mut fs = fresh();
        fs.erase_counts = [3; TOTAL_BLOCKS];
        fs.erase_counts[42] = 1;
        fs.block_map[5] = 42;

        assert_eq!(fs.select_physical_block(5), 42);
    }

    #[test]
    fn selection_is_always_in_range() {
        let mut fs = fresh();
        fs.erase_counts = [EraseCount::MAX; TOTAL_BLOCKS];
        for logical in 0..TOTAL_BLOCKS {
            assert!((fs.select_physical_block(logical as BlockId) as usize) < TOTAL_BLOCKS);
        }
    }

    #[test]
    fn counter_counts_selections() {
        let mut fs = fresh();
        // Pin every write to block 0 by making everything else worn.
        fs.erase_counts = [100; TOTAL_BLOCKS];
        fs.erase_counts[0] = 0;
        fs.block_map[7] = 0;

        for n in 1..=5 {
            fs.write(7, b"x").unwrap();
            assert_eq!(fs.erase_counts()[0], n);
        }
    }

    #[test]
    fn counter_saturates_at_max() {
        let mut fs = fresh();
        fs.erase_counts = [EraseCount::MAX; TOTAL_BLOCKS];

        fs.write(3, b"x").unwrap();
        assert_eq!(fs.erase_counts()[3], EraseCount::MAX);
    }

    #[test]
    fn write_persists_counter_and_map_entry() {
        let mut fs = fresh();
        fs.write(70, b"abc").unwrap();
        fs.write(70, b"abc").unwrap(); // relocates to block 0

        let mut reloaded = Ftl::new(fs.into_flash());
        reloaded.load().unwrap();
        assert_eq!(reloaded.block_map()[70], 0);
        assert_eq!(reloaded.erase_counts()[70], 1);
        assert_eq!(reloaded.erase_counts()[0], 1);
    }

    #[test]
    fn write_lands_in_target_block() {
        let mut fs = fresh();
        fs.write(5, b"hello").unwrap();

        let flash = fs.into_flash();
        let at = 5 * BLOCK_SIZE;
        assert_eq!(&flash.data()[at..at + 5], b"hello");
    }

    #[test]
    fn rejects_out_of_range_logical_block() {
        let mut fs = fresh();
        let result = fs.write(128, b"x");
        assert_eq!(result, Err(Error::InvalidBlockNumber(128)));
    }

    #[test]
    fn rejects_oversized_payload_before_any_io() {
        let mut fs = fresh();
        let data = vec![0u8; BLOCK_SIZE + 1];
        let result = fs.write(0, &data);
        assert_eq!(result, Err(Error::InvalidLength(BLOCK_SIZE + 1)));

        // No data write and no metadata update happened.
        assert_eq!(fs.erase_counts()[0], 0);
        let flash = fs.into_flash();
        assert!(flash.data().iter().all(|&b| b == ERASED_BYTE));
    }

    #[test]
    fn rejects_corrupt_persisted_block_map() {
        let fs = fresh();
        let mut flash = fs.into_flash();
        flash
            .write_security_register(BLOCK_MAP_REGISTER, 5, &[200])
            .unwrap();

        let mut fs = Ftl::new(flash);
        assert_eq!(fs.load(), Err(Error::InvalidBlockNumber(200)));
    }

    struct BrokenFlash;

    impl FlashDevice for BrokenFlash {
        type Error = FlashError;

        fn read_security_register(
            &mut self,
            _: u8,
            _: usize,
            _: &mut [u8],
        ) -> Result<(), FlashError> {
            Err(FlashError::OutOfBounds)
        }
        fn write_security_register(&mut self, _: u8, _: usize, _: &[u8]) -> Result<(), FlashError> {
            Err(FlashError::OutOfBounds)
        }
        fn erase_security_register(&mut self, _: u8) -> Result<(), FlashError> {
            Err(FlashError::OutOfBounds)
        }
        fn write_data(&mut self, _: u32, _: u32, _: &[u8]) -> Result<(), FlashError> {
            Err(FlashError::OutOfBounds)
        }
    }

    #[test]
    fn driver_failures_surface_to_the_caller() {
        let mut fs = Ftl::new(BrokenFlash);
        assert_eq!(fs.initialize(), Err(Error::Driver(FlashError::OutOfBounds)));
        assert_eq!(fs.load(), Err(Error::Driver(FlashError::OutOfBounds)));
        assert_eq!(fs.write(0, b"x"), Err(Error::Driver(FlashError::OutOfBounds)));
    }
}
