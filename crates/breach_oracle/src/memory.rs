//! The oracle input region.

use breach_core::{BreachError, BreachResult};
use serde::{Deserialize, Serialize};

/// Window of linear memory the oracle reads its candidate from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRegion {
    /// Region start offset
    pub offset: usize,
    /// Region size in bytes, terminator included
    pub capacity: usize,
}

impl InputRegion {
    /// Create a new input region
    #[must_use]
    pub fn new(offset: usize, capacity: usize) -> Self {
        Self { offset, capacity }
    }

    /// Region end offset (exclusive)
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.capacity
    }

    /// Check that a candidate of `len` bytes fits
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if `len >= capacity`
    pub fn check_fits(&self, len: usize) -> BreachResult<()> {
        if len >= self.capacity {
            return Err(BreachError::CapacityExceeded {
                len,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Check that the region lies inside a memory of `memory_size` bytes
    ///
    /// # Errors
    ///
    /// Returns `LoadFailure` if the region runs past the end of memory
    pub fn check_within(&self, memory_size: usize) -> BreachResult<()> {
        if self.end() > memory_size {
            return Err(BreachError::load(format!(
                "input region 0x{:X}..0x{:X} lies outside {} bytes of memory",
                self.offset,
                self.end(),
                memory_size
            )));
        }
        Ok(())
    }

    /// Zero-fill the region
    pub fn clear(&self, memory: &mut [u8]) {
        memory[self.offset..self.end()].fill(0);
    }

    /// Write `bytes` and one terminator at the start of the region
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if the candidate does not fit
    pub fn write(&self, memory: &mut [u8], bytes: &[u8]) -> BreachResult<()> {
        self.check_fits(bytes.len())?;
        let start = self.offset;
        memory[start..start + bytes.len()].copy_from_slice(bytes);
        memory[start + bytes.len()] = 0;
        Ok(())
    }

    /// Region contents
    #[must_use]
    pub fn view<'m>(&self, memory: &'m [u8]) -> &'m [u8] {
        &memory[self.offset..self.end()]
    }
}
