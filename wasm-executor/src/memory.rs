//! Bounds-checked access to the linear memory of a sandboxed instance.
//!
//! All data that flows between host functions and contract memory goes
//! through [mem_load], [mem_load_multiple] and [mem_store]. They take the raw
//! (signed) pointers and lengths passed by contract code and never access
//! bytes outside of the memory, whatever the values.
use crate::constants::PAGE_SIZE;
use thiserror::Error;

/// A pointer into contract memory, as passed by contract code.
pub type MemPtr = i32;

/// A length of a region of contract memory, as passed by contract code.
pub type MemLength = i32;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
/// Failures of memory access.
pub enum MemoryError {
    #[error("Bad bounds.")]
    OutOfBounds,
    #[error("Bad bounds (lower).")]
    OutOfBoundsLower,
    #[error("Bad bounds (upper).")]
    OutOfBoundsUpper,
    #[error("Negative length.")]
    NegativeLength,
    #[error("Memory growth of {requested} pages exceeds the allowed limit.")]
    LimitExceeded {
        requested: u32,
    },
    #[error("Memory growth failed.")]
    GrowFailed,
}

/// A growable, contiguous byte region owned by a single instance.
pub trait Memory {
    /// Current length of the memory in bytes.
    fn length(&self) -> u32;

    /// Fill `buf` with the bytes starting at `offset`. Fails if the region
    /// does not lie entirely in memory.
    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Write `data` starting at `offset`. Fails if the region does not lie
    /// entirely in memory.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), MemoryError>;

    /// Grow the memory by the given number of pages. Memory never shrinks.
    fn grow(&mut self, pages: u32) -> Result<(), MemoryError>;
}

/// Host-side memory, used for buffers that are not backed by an instance.
impl Memory for Vec<u8> {
    fn length(&self) -> u32 { u32::try_from(self.len()).unwrap_or(u32::MAX) }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        let start = offset as usize;
        let end = start.checked_add(buf.len()).ok_or(MemoryError::OutOfBounds)?;
        let src = self.get(start..end).ok_or(MemoryError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), MemoryError> {
        let start = offset as usize;
        let end = start.checked_add(data.len()).ok_or(MemoryError::OutOfBounds)?;
        let dest = self.get_mut(start..end).ok_or(MemoryError::OutOfBounds)?;
        dest.copy_from_slice(data);
        Ok(())
    }

    fn grow(&mut self, pages: u32) -> Result<(), MemoryError> {
        let new_len = u64::from(pages) * u64::from(PAGE_SIZE) + self.len() as u64;
        if new_len > u64::from(u32::MAX) {
            return Err(MemoryError::GrowFailed);
        }
        self.resize(new_len as usize, 0u8);
        Ok(())
    }
}

/// Load `length` bytes starting at `offset`.
///
/// The offset must lie in `[0, memory.length()]`. A region that extends past
/// the end of memory is not an error: the part beyond the end reads as zeros,
/// so the result always has exactly `length` bytes.
#[cfg_attr(not(feature = "fuzz-coverage"), inline)]
pub fn mem_load<M: Memory + ?Sized>(
    memory: &M,
    offset: MemPtr,
    length: MemLength,
) -> Result<Vec<u8>, MemoryError> {
    if length == 0 {
        return Ok(Vec::new());
    }
    let memory_length = memory.length();
    if offset < 0 || offset as u32 > memory_length {
        return Err(MemoryError::OutOfBounds);
    }
    if length < 0 {
        return Err(MemoryError::NegativeLength);
    }
    let offset = offset as u32;
    let mut result = vec![0u8; length as usize];
    let available = std::cmp::min(length as u32, memory_length - offset) as usize;
    if available > 0 {
        memory.read(offset, &mut result[..available])?;
    }
    Ok(result)
}

/// Load consecutive regions starting at `offset`, one per entry of
/// `lengths`. Stops at the first failing load.
pub fn mem_load_multiple<M: Memory + ?Sized>(
    memory: &M,
    offset: MemPtr,
    lengths: &[MemLength],
) -> Result<Vec<Vec<u8>>, MemoryError> {
    let mut out = Vec::with_capacity(lengths.len());
    let mut current = i64::from(offset);
    for &length in lengths {
        let ptr = MemPtr::try_from(current).map_err(|_| MemoryError::OutOfBounds)?;
        out.push(mem_load(memory, ptr, length)?);
        current += i64::from(length);
    }
    Ok(out)
}

/// Store `data` starting at `offset`.
///
/// If the write does not fit in the current memory, memory is grown by a
/// single page. Writes that would need more than one additional page are
/// rejected without growing.
#[cfg_attr(not(feature = "fuzz-coverage"), inline)]
pub fn mem_store<M: Memory + ?Sized>(
    memory: &mut M,
    offset: MemPtr,
    data: &[u8],
) -> Result<(), MemoryError> {
    if data.is_empty() {
        return Ok(());
    }
    if offset < 0 {
        return Err(MemoryError::OutOfBoundsLower);
    }
    let requested_end = offset as u64 + data.len() as u64;
    let memory_length = u64::from(memory.length());
    if requested_end > memory_length {
        if requested_end > memory_length + u64::from(PAGE_SIZE) {
            return Err(MemoryError::OutOfBoundsUpper);
        }
        memory.grow(1).map_err(|_| MemoryError::OutOfBoundsUpper)?;
        if requested_end > u64::from(memory.length()) {
            return Err(MemoryError::OutOfBoundsUpper);
        }
    }
    memory.write(offset as u32, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::*;

    const NUM_TESTS: u64 = 10000;

    fn ten_bytes() -> Vec<u8> { (0u8..10).collect() }

    #[test]
    fn load_zero_length_is_empty() {
        let prop = |memory: Vec<u8>, offset: usize| -> bool {
            let offset = offset % (memory.len() + 1);
            matches!(mem_load(&memory, offset as MemPtr, 0), Ok(v) if v.is_empty())
        };
        QuickCheck::new().tests(NUM_TESTS).quickcheck(prop as fn(Vec<u8>, usize) -> bool);
    }

    #[test]
    fn load_pads_with_zeros_past_the_end() {
        let memory = ten_bytes();
        assert_eq!(mem_load(&memory, 8, 5), Ok(vec![8, 9, 0, 0, 0]));
        assert_eq!(mem_load(&memory, 10, 3), Ok(vec![0, 0, 0]));
        assert_eq!(mem_load(&memory, 2, 3), Ok(vec![2, 3, 4]));
    }

    #[test]
    fn load_result_has_requested_length() {
        let prop = |memory: Vec<u8>, offset: usize, length: u16| -> bool {
            let offset = offset % (memory.len() + 1);
            match mem_load(&memory, offset as MemPtr, MemLength::from(length)) {
                Ok(v) => {
                    v.len() == usize::from(length)
                        && v.iter().enumerate().all(|(i, b)| {
                            memory.get(offset + i).copied().unwrap_or(0) == *b
                        })
                }
                Err(_) => false,
            }
        };
        QuickCheck::new().tests(NUM_TESTS).quickcheck(prop as fn(Vec<u8>, usize, u16) -> bool);
    }

    #[test]
    fn load_bad_bounds() {
        let memory = ten_bytes();
        assert_eq!(mem_load(&memory, -1, 1), Err(MemoryError::OutOfBounds));
        assert_eq!(mem_load(&memory, 11, 1), Err(MemoryError::OutOfBounds));
        assert_eq!(mem_load(&memory, 0, -1), Err(MemoryError::NegativeLength));
        // The length check comes first.
        assert_eq!(mem_load(&memory, -1, 0), Ok(Vec::new()));
    }

    #[test]
    fn load_multiple_advances_offset() {
        let memory = ten_bytes();
        let loaded = mem_load_multiple(&memory, 1, &[2, 0, 3]).expect("Loads are in bounds.");
        assert_eq!(loaded, vec![vec![1, 2], vec![], vec![3, 4, 5]]);
        let loaded = mem_load_multiple(&memory, 7, &[2, 3]).expect("Second load is padded.");
        assert_eq!(loaded, vec![vec![7, 8], vec![9, 0, 0]]);
    }

    #[test]
    fn load_multiple_propagates_first_error() {
        let memory = ten_bytes();
        assert_eq!(mem_load_multiple(&memory, 5, &[3, -1, 2]), Err(MemoryError::NegativeLength));
        assert_eq!(mem_load_multiple(&memory, 8, &[4, 1]), Err(MemoryError::OutOfBounds));
    }

    #[test]
    fn store_empty_is_noop() {
        let mut memory = ten_bytes();
        assert_eq!(mem_store(&mut memory, -5, &[]), Ok(()));
        assert_eq!(memory, ten_bytes());
    }

    #[test]
    fn store_negative_offset() {
        let mut memory = ten_bytes();
        assert_eq!(mem_store(&mut memory, -1, &[1]), Err(MemoryError::OutOfBoundsLower));
    }

    #[test]
    fn store_grows_one_page() {
        let mut memory = vec![0u8; PAGE_SIZE as usize];
        let data = vec![7u8; 100];
        let offset = PAGE_SIZE as MemPtr + 10;
        mem_store(&mut memory, offset, &data).expect("Fits after one page of growth.");
        assert_eq!(memory.len(), 2 * PAGE_SIZE as usize);
        assert_eq!(mem_load(&memory, offset, 100), Ok(data));
    }

    #[test]
    fn store_rejects_growth_beyond_one_page() {
        let mut memory = vec![0u8; PAGE_SIZE as usize];
        let data = vec![1u8; 16];
        let offset = 2 * PAGE_SIZE as MemPtr;
        assert_eq!(mem_store(&mut memory, offset, &data), Err(MemoryError::OutOfBoundsUpper));
        assert_eq!(memory.len(), PAGE_SIZE as usize);
    }

    #[test]
    fn store_then_load() {
        let prop = |offset: u16, data: Vec<u8>| -> bool {
            let mut memory = vec![0u8; PAGE_SIZE as usize];
            let offset = MemPtr::from(offset);
            mem_store(&mut memory, offset, &data).is_ok()
                && mem_load(&memory, offset, data.len() as MemLength) == Ok(data)
        };
        QuickCheck::new().tests(NUM_TESTS).quickcheck(prop as fn(u16, Vec<u8>) -> bool);
    }
}
