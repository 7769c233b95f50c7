//! Bit-level streaming over little-endian 32-bit words.
//!
//! Bits are packed LSB-first: the first bit written is the lowest bit of the first word.
//! Both [Writer] and [Reader] stage bits in a 64-bit scratch register so that runs which
//! straddle a word boundary need no special casing.

use crate::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Number of bits in a wire word.
pub const WORD_BITS: u32 = 32;

/// Number of bytes in a wire word.
const WORD_BYTES: usize = 4;

/// Returns a mask selecting the low `bits` bits of a scratch register.
#[inline]
fn low_mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

#[inline]
fn check_bit_count(bits: u32) -> Result<(), Error> {
    if bits == 0 || bits > WORD_BITS {
        return Err(Error::InvalidBitRange(bits));
    }
    Ok(())
}

/// Accumulates runs of 1 to 32 bits into a word-aligned byte buffer.
///
/// Words are emitted to the buffer as soon as 32 bits are staged. Any trailing partial word
/// stays in scratch until [Writer::finalize] is called, after which no more writes are accepted.
#[derive(Debug, Default)]
pub struct Writer {
    scratch: u64,
    scratch_bits: u32,
    buffer: BytesMut,
    bits_written: usize,
    finalized: bool,
}

impl Writer {
    /// Creates a writer with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer that appends words after the existing content of `buffer`.
    pub fn with_buffer(buffer: BytesMut) -> Self {
        Self {
            buffer,
            ..Self::default()
        }
    }

    /// Writes the low `bits` bits of `value`.
    pub fn write(&mut self, value: u32, bits: u32) -> Result<(), Error> {
        check_bit_count(bits)?;
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }

        // Scratch holds fewer than 32 bits here, so the shift cannot overflow 64 bits.
        self.scratch |= (u64::from(value) & low_mask(bits)) << self.scratch_bits;
        self.scratch_bits += bits;
        while self.scratch_bits >= WORD_BITS {
            self.buffer.put_u32_le(self.scratch as u32);
            self.scratch >>= WORD_BITS;
            self.scratch_bits -= WORD_BITS;
        }

        self.bits_written += bits as usize;
        Ok(())
    }

    /// Flushes any staged bits as a final zero-padded word.
    ///
    /// Must be called exactly once, after the last write.
    pub fn finalize(&mut self) -> Result<(), Error> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        if self.scratch_bits != 0 {
            self.buffer.put_u32_le(self.scratch as u32);
            self.scratch = 0;
            self.scratch_bits = 0;
        }
        self.finalized = true;
        Ok(())
    }

    /// Returns the flushed words. Bits still in scratch are not included.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning the flushed words.
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Returns the number of bits requested through [Writer::write].
    pub fn bits_written(&self) -> usize {
        self.bits_written
    }

    /// Returns true once [Writer::finalize] has succeeded.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

/// Extracts runs of 1 to 32 bits from a word-aligned source, never past a fixed bit budget.
#[derive(Debug)]
pub struct Reader<B: Buf> {
    source: B,
    scratch: u64,
    scratch_bits: u32,
    total_bits: usize,
    bits_read: usize,
}

impl<B: Buf> Reader<B> {
    /// Creates a reader that yields at most `total_bits` bits from `source`.
    ///
    /// # Panics
    ///
    /// Panics if `source` does not hold a whole number of 32-bit words, or if `total_bits`
    /// exceeds the number of bits it holds.
    pub fn new(source: B, total_bits: usize) -> Self {
        let available = source.remaining();
        assert!(
            available % WORD_BYTES == 0,
            "source length {available} is not a multiple of {WORD_BYTES} bytes"
        );
        assert!(
            total_bits <= available * 8,
            "bit budget {total_bits} exceeds source of {available} bytes"
        );
        Self {
            source,
            scratch: 0,
            scratch_bits: 0,
            total_bits,
            bits_read: 0,
        }
    }

    /// Reads the next `bits` bits.
    pub fn read(&mut self, bits: u32) -> Result<u32, Error> {
        check_bit_count(bits)?;
        let requested = self.bits_read + bits as usize;
        if requested > self.total_bits {
            return Err(Error::BudgetExceeded {
                requested,
                budget: self.total_bits,
            });
        }

        // A single word always suffices: scratch holds fewer than `bits` <= 32 bits.
        if self.scratch_bits < bits {
            let word = self.source.get_u32_le();
            self.scratch |= u64::from(word) << self.scratch_bits;
            self.scratch_bits += WORD_BITS;
        }

        let value = (self.scratch & low_mask(bits)) as u32;
        self.scratch >>= bits;
        self.scratch_bits -= bits;
        self.bits_read += bits as usize;
        Ok(value)
    }

    /// Returns the number of bits consumed so far.
    pub fn bits_read(&self) -> usize {
        self.bits_read
    }

    /// Returns the number of bits left in the budget.
    pub fn remaining_bits(&self) -> usize {
        self.total_bits - self.bits_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_within_word() {
        let mut writer = Writer::new();
        writer.write(u32::MAX, 30).unwrap();
        writer.finalize().unwrap();
        assert_eq!(writer.bytes(), &[255, 255, 255, 63]);
        assert_eq!(writer.bits_written(), 30);
    }

    #[test]
    fn test_write_across_words() {
        let mut writer = Writer::new();
        writer.write(u32::MAX, 30).unwrap();
        writer.write(0xFFFF_FFFE, 30).unwrap();
        writer.finalize().unwrap();
        assert_eq!(writer.bytes(), &[255, 255, 255, 191, 255, 255, 255, 15]);
        assert_eq!(writer.bits_written(), 60);
    }

    #[test]
    fn test_unflushed_bits_hidden() {
        let mut writer = Writer::new();
        writer.write(u32::MAX, 30).unwrap();
        writer.write(0xFFFF_FFFE, 30).unwrap();
        assert_eq!(writer.bytes(), &[255, 255, 255, 191]);
        assert_eq!(writer.bits_written(), 60);
    }

    #[test]
    fn test_write_masks_high_bits() {
        let mut writer = Writer::new();
        writer.write(0b1111_0101, 4).unwrap();
        writer.finalize().unwrap();
        assert_eq!(writer.bytes(), &[0b0101, 0, 0, 0]);
    }

    #[test]
    fn test_write_full_word() {
        let mut writer = Writer::new();
        writer.write(0x0403_0201, 32).unwrap();
        assert_eq!(writer.bytes(), &[1, 2, 3, 4]);
        writer.finalize().unwrap();
        assert_eq!(writer.bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_write_invalid_bit_count() {
        let mut writer = Writer::new();
        assert_eq!(writer.write(0, 33), Err(Error::InvalidBitRange(33)));
        assert_eq!(writer.write(0, 0), Err(Error::InvalidBitRange(0)));
        assert_eq!(writer.bits_written(), 0);
    }

    #[test]
    fn test_finalize_twice() {
        let mut writer = Writer::new();
        writer.write(7, 3).unwrap();
        writer.finalize().unwrap();
        let flushed = writer.bytes().to_vec();
        assert_eq!(writer.finalize(), Err(Error::AlreadyFinalized));
        assert_eq!(writer.bytes(), &flushed[..]);
        assert!(writer.is_finalized());
    }

    #[test]
    fn test_write_after_finalize() {
        let mut writer = Writer::new();
        writer.write(0, 32).unwrap();
        writer.finalize().unwrap();
        assert_eq!(writer.write(0, 32), Err(Error::AlreadyFinalized));
    }

    #[test]
    fn test_finalize_empty() {
        let mut writer = Writer::new();
        writer.finalize().unwrap();
        assert!(writer.bytes().is_empty());
        assert!(writer.into_bytes().is_empty());
    }

    #[test]
    fn test_with_buffer_appends() {
        let mut prefix = BytesMut::new();
        prefix.put_u32_le(0xDEAD_BEEF);
        let mut writer = Writer::with_buffer(prefix);
        writer.write(1, 1).unwrap();
        writer.finalize().unwrap();
        assert_eq!(writer.bytes(), &[0xEF, 0xBE, 0xAD, 0xDE, 1, 0, 0, 0]);
        assert_eq!(writer.bits_written(), 1);
    }

    #[test]
    fn test_read_within_word() {
        let mut reader = Reader::new(&[255u8, 100, 255, 1][..], 32);
        assert_eq!(reader.read(16).unwrap(), 25855);
        assert_eq!(reader.bits_read(), 16);
        assert_eq!(reader.remaining_bits(), 16);
    }

    #[test]
    fn test_read_across_words() {
        let data = [255u8, 100, 255, 1, 100, 234, 90, 0];
        let mut reader = Reader::new(&data[..], 64);
        assert_eq!(reader.read(26).unwrap(), 0b01111111110110010011111111);
        assert_eq!(reader.read(13).unwrap(), 0b1100100000000);
    }

    #[test]
    fn test_read_invalid_bit_count() {
        let mut reader = Reader::new(&[255u8; 8][..], 64);
        assert_eq!(reader.read(40), Err(Error::InvalidBitRange(40)));
        assert_eq!(reader.read(0), Err(Error::InvalidBitRange(0)));
    }

    #[test]
    fn test_read_budget_exceeded() {
        let mut reader = Reader::new(&[255u8; 4][..], 32);
        reader.read(32).unwrap();
        assert_eq!(
            reader.read(10),
            Err(Error::BudgetExceeded {
                requested: 42,
                budget: 32
            })
        );
    }

    #[test]
    fn test_read_partial_budget_exceeded() {
        let mut reader = Reader::new(&[255u8; 4][..], 8);
        assert_eq!(reader.read(3).unwrap(), 0b111);
        assert_eq!(reader.read(5).unwrap(), 0b11111);
        assert_eq!(
            reader.read(10),
            Err(Error::BudgetExceeded {
                requested: 18,
                budget: 8
            })
        );
        assert_eq!(reader.remaining_bits(), 0);
    }

    #[test]
    #[should_panic(expected = "not a multiple of 4 bytes")]
    fn test_reader_unaligned_source() {
        Reader::new(&[0u8; 3][..], 8);
    }

    #[test]
    #[should_panic(expected = "exceeds source")]
    fn test_reader_budget_too_large() {
        Reader::new(&[0u8; 4][..], 33);
    }

    #[test]
    fn test_write_then_read() {
        let runs: [(u32, u32); 6] = [
            (1, 1),
            (0x7F, 7),
            (0xDEAD_BEEF, 32),
            (0, 5),
            (0x1_FFFF, 17),
            (0xABC, 12),
        ];
        let mut writer = Writer::new();
        for (value, bits) in runs {
            writer.write(value, bits).unwrap();
        }
        writer.finalize().unwrap();
        let total = writer.bits_written();
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len() % 4, 0);

        let mut reader = Reader::new(bytes, total);
        for (value, bits) in runs {
            assert_eq!(reader.read(bits).unwrap(), value);
        }
        assert_eq!(reader.remaining_bits(), 0);
    }
}
