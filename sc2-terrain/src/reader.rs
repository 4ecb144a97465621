use byteorder::{ByteOrder, LittleEndian};

use crate::error::{DecodeError, TerrainFormat};

/// Cursor over a terrain blob that reports short reads as `Truncated`.
pub struct GridReader<'a> {
    data: &'a [u8],
    pos: usize,
    format: TerrainFormat,
}

impl<'a> GridReader<'a> {
    pub fn new(data: &'a [u8], format: TerrainFormat) -> Self {
        Self { data, pos: 0, format }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Fail unless `n` more bytes are available, without consuming them.
    pub fn require(&self, n: usize) -> Result<(), DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                format: self.format,
                need: self.pos.saturating_add(n),
                have: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.require(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.require(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array4(&mut self) -> Result<[u8; 4], DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// Read `count` little-endian u16 samples in one go.
    pub fn read_u16_samples(&mut self, count: usize) -> Result<Vec<u16>, DecodeError> {
        let len = count.checked_mul(2).ok_or(DecodeError::Truncated {
            format: self.format,
            need: usize::MAX,
            have: self.data.len(),
        })?;
        let bytes = self.read_bytes(len)?;
        let mut samples = vec![0u16; count];
        LittleEndian::read_u16_into(bytes, &mut samples);
        Ok(samples)
    }
}
