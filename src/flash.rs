use crate::config::*;

/// Boundary to the NOR device. The wear-leveling core only ever touches
/// the three security registers plus the data address space, so that is
/// the whole surface.
pub trait FlashDevice {
    type Error;

    /// Reads `buf.len()` bytes from security register `register`
    /// (1-based), starting at `offset`.
    fn read_security_register(
        &mut self,
        register: u8,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), Self::Error>;

    /// Programs `data` into security register `register` at `offset`.
    fn write_security_register(
        &mut self,
        register: u8,
        offset: usize,
        data: &[u8],
    ) -> Result<(), Self::Error>;

    /// Erases one whole security register back to `ERASED_BYTE`.
    fn erase_security_register(&mut self, register: u8) -> Result<(), Self::Error>;

    /// Programs payload data at byte `address` + `page_offset` of the
    /// data address space. Distinct from the register address space.
    fn write_data(
        &mut self,
        address: u32,
        page_offset: u32,
        data: &[u8],
    ) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    BadRegister(u8),
    OutOfBounds,
}

/// In-memory stand-in for the real chip. Backs the demo driver and the
/// tests with the same geometry as a W25Q64-class part: three 256-byte
/// security registers and 128 blocks of 64 KiB data.
pub struct MemFlash {
    registers: [[u8; REGISTER_SIZE]; REGISTER_COUNT],
    data: Vec<u8>,
}

impl MemFlash {
    pub fn new() -> Self {
        MemFlash {
            registers: [[ERASED_BYTE; REGISTER_SIZE]; REGISTER_COUNT],
            data: vec![ERASED_BYTE; CAPACITY],
        }
    }

    fn register_index(register: u8) -> Result<usize, FlashError> {
        if register == 0 || register as usize > REGISTER_COUNT {
            return Err(FlashError::BadRegister(register));
        }
        Ok(register as usize - 1)
    }

    #[cfg(test)]
    pub fn register(&self, register: u8) -> &[u8; REGISTER_SIZE] {
        &self.registers[register as usize - 1]
    }

    #[cfg(test)]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl FlashDevice for MemFlash {
    type Error = FlashError;

    fn read_security_register(
        &mut self,
        register: u8,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), FlashError> {
        let reg = Self::register_index(register)?;
        let end = offset.checked_add(buf.len()).ok_or(FlashError::OutOfBounds)?;
        if end > REGISTER_SIZE {
            return Err(FlashError::OutOfBounds);
        }
        buf.copy_from_slice(&self.registers[reg][offset..end]);
        Ok(())
    }

    fn write_security_register(
        &mut self,
        register: u8,
        offset: usize,
        data: &[u8],
    ) -> Result<(), FlashError> {
        let reg = Self::register_index(register)?;
        let end = offset.checked_add(data.len()).ok_or(FlashError::OutOfBounds)?;
        if end > REGISTER_SIZE {
            return Err(FlashError::OutOfBounds);
        }
        self.registers[reg][offset..end].copy_from_slice(data);
        Ok(())
    }

    fn erase_security_register(&mut self, register: u8) -> Result<(), FlashError> {
        let reg = Self::register_index(register)?;
        self.registers[reg] = [ERASED_BYTE; REGISTER_SIZE];
        Ok(())
    }

    fn write_data(
        &mut self,
        address: u32,
        page_offset: u32,
        data: &[u8],
    ) -> Result<(), FlashError> {
        let start = (address as usize)
            .checked_add(page_offset as usize)
            .ok_or(FlashError::OutOfBounds)?;
        let end = start.checked_add(data.len()).ok_or(FlashError::OutOfBounds)?;
        if end > self.data.len() {
            return Err(FlashError::OutOfBounds);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }
}
