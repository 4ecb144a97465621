//! Binary height and walkability grids.
//!
//! Both blobs start with a 16-byte header and carry row-major samples:
//!
//! ```text
//! height:       magic[4] version:u32 width:u32 height:u32 | u16 * width * height
//! walkability:  width:u32 height:u32 reserved[8]          | u8  * width * height
//! ```
//!
//! All integers are little-endian. Bytes past the payload are ignored.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::{DecodeError, TerrainFormat};
use crate::reader::GridReader;

/// Size of the fixed header shared by both formats.
pub const HEADER_SIZE: usize = 16;

/// Elevation samples for the map plane.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    magic: [u8; 4],
    version: u32,
    width: u32,
    height: u32,
    samples: Vec<u16>,
    min: u16,
    max: u16,
    scale: f64,
}

impl HeightGrid {
    /// Build a grid from raw samples. `samples.len()` must equal `width * height`.
    pub fn new(width: u32, height: u32, samples: Vec<u16>) -> Result<Self, DecodeError> {
        Self::with_header(*b"HMAP", 0, width, height, samples)
    }

    pub fn with_header(
        magic: [u8; 4],
        version: u32,
        width: u32,
        height: u32,
        samples: Vec<u16>,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyGrid { format: TerrainFormat::Height, width, height });
        }
        let expected = cell_count(width, height);
        if expected != Some(samples.len()) {
            return Err(DecodeError::Truncated {
                format: TerrainFormat::Height,
                need: expected.map_or(usize::MAX, |n| HEADER_SIZE + n * 2),
                have: HEADER_SIZE + samples.len() * 2,
            });
        }

        let min = samples.iter().copied().min().unwrap_or(0);
        let max = samples.iter().copied().max().unwrap_or(0);
        let scale = if max > min {
            (max - min) as f64 / 65535.0
        } else {
            1.0
        };

        Ok(Self { magic, version, width, height, samples, min, max, scale })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Lowest and highest raw sample.
    pub fn range(&self) -> (u16, u16) {
        (self.min, self.max)
    }

    /// Multiplier from raw samples to world height.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Raw sample at a cell, `None` outside the grid.
    pub fn sample(&self, x: usize, y: usize) -> Option<u16> {
        if x >= self.width as usize || y >= self.height as usize {
            return None;
        }
        self.samples.get(y * self.width as usize + x).copied()
    }
}

/// Passability flags for the map plane. Nonzero means walkable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkabilityGrid {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl WalkabilityGrid {
    pub fn new(width: u32, height: u32, cells: Vec<u8>) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyGrid {
                format: TerrainFormat::Walkability,
                width,
                height,
            });
        }
        let expected = cell_count(width, height);
        if expected != Some(cells.len()) {
            return Err(DecodeError::Truncated {
                format: TerrainFormat::Walkability,
                need: expected.map_or(usize::MAX, |n| HEADER_SIZE + n),
                have: HEADER_SIZE + cells.len(),
            });
        }
        Ok(Self { width, height, cells })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Walkability of a cell, `None` outside the grid.
    pub fn walkable(&self, x: usize, y: usize) -> Option<bool> {
        if x >= self.width as usize || y >= self.height as usize {
            return None;
        }
        self.cells.get(y * self.width as usize + x).map(|&v| v != 0)
    }

    pub fn walkable_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }
}

fn cell_count(width: u32, height: u32) -> Option<usize> {
    (width as usize).checked_mul(height as usize)
}

fn overflow(format: TerrainFormat, have: usize) -> DecodeError {
    DecodeError::Truncated { format, need: usize::MAX, have }
}

/// Decode a height blob.
pub fn decode_height(data: &[u8]) -> Result<HeightGrid, DecodeError> {
    let mut reader = GridReader::new(data, TerrainFormat::Height);
    reader.require(HEADER_SIZE)?;

    let magic = reader.read_array4()?;
    let version = reader.read_u32_le()?;
    let width = reader.read_u32_le()?;
    let height = reader.read_u32_le()?;

    let count = cell_count(width, height).ok_or_else(|| overflow(TerrainFormat::Height, data.len()))?;
    let samples = reader.read_u16_samples(count)?;
    let grid = HeightGrid::with_header(magic, version, width, height, samples)?;

    debug!(
        width,
        height,
        min = grid.min,
        max = grid.max,
        "decoded height map"
    );
    Ok(grid)
}

/// Decode a walkability blob.
pub fn decode_walkability(data: &[u8]) -> Result<WalkabilityGrid, DecodeError> {
    let mut reader = GridReader::new(data, TerrainFormat::Walkability);
    reader.require(HEADER_SIZE)?;

    let width = reader.read_u32_le()?;
    let height = reader.read_u32_le()?;
    reader.skip(HEADER_SIZE - 8)?;

    let count =
        cell_count(width, height).ok_or_else(|| overflow(TerrainFormat::Walkability, data.len()))?;
    let cells = reader.read_bytes(count)?.to_vec();
    let grid = WalkabilityGrid::new(width, height, cells)?;

    debug!(
        width,
        height,
        walkable = grid.walkable_count(),
        "decoded walkability map"
    );
    Ok(grid)
}

/// Encode a height grid back into its binary form.
pub fn encode_height(grid: &HeightGrid) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE + grid.samples.len() * 2];
    out[0..4].copy_from_slice(&grid.magic);
    LittleEndian::write_u32(&mut out[4..8], grid.version);
    LittleEndian::write_u32(&mut out[8..12], grid.width);
    LittleEndian::write_u32(&mut out[12..16], grid.height);
    LittleEndian::write_u16_into(&grid.samples, &mut out[HEADER_SIZE..]);
    out
}

/// Encode a walkability grid back into its binary form. Reserved bytes are zero.
pub fn encode_walkability(grid: &WalkabilityGrid) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + grid.cells.len());
    let mut header = [0u8; HEADER_SIZE];
    LittleEndian::write_u32(&mut header[0..4], grid.width);
    LittleEndian::write_u32(&mut header[4..8], grid.height);
    out.extend_from_slice(&header);
    out.extend_from_slice(&grid.cells);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn height_blob(width: u32, height: u32, samples: &[u16]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"HMAP");
        out.extend_from_slice(&3u32.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_decode_height() {
        let data = height_blob(3, 2, &[0, 100, 200, 300, 400, 65535]);
        let grid = decode_height(&data).unwrap();

        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.version(), 3);
        assert_eq!(grid.magic(), *b"HMAP");
        assert_eq!(grid.sample(2, 0), Some(200));
        assert_eq!(grid.sample(0, 1), Some(300));
        assert_eq!(grid.sample(3, 0), None);
        assert_eq!(grid.range(), (0, 65535));
        assert!((grid.scale() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_height_round_trip() {
        let samples: Vec<u16> = (0..12u16).map(|i| i * 1000 + 7).collect();
        let grid = HeightGrid::new(4, 3, samples.clone()).unwrap();

        let decoded = decode_height(&encode_height(&grid)).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
        assert_eq!(decoded.samples(), samples.as_slice());
        assert_eq!(decoded.scale(), grid.scale());
        assert!((decoded.scale() - 11000.0 / 65535.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_height_scale_is_one() {
        let grid = HeightGrid::new(2, 2, vec![500; 4]).unwrap();
        assert_eq!(grid.scale(), 1.0);
    }

    #[test]
    fn test_height_truncated() {
        let full = height_blob(4, 4, &[1; 16]);
        for len in [0, 10, 15, 16, 17, full.len() - 1] {
            match decode_height(&full[..len]) {
                Err(DecodeError::Truncated { format, have, .. }) => {
                    assert_eq!(format, TerrainFormat::Height);
                    assert_eq!(have, len);
                }
                other => panic!("expected Truncated for len {len}, got {other:?}"),
            }
        }
        assert!(decode_height(&full).is_ok());
    }

    #[test]
    fn test_height_trailing_bytes_ignored() {
        let mut data = height_blob(2, 1, &[5, 6]);
        data.extend_from_slice(&[0xAA; 9]);
        let grid = decode_height(&data).unwrap();
        assert_eq!(grid.samples(), &[5, 6]);
    }

    #[test]
    fn test_height_empty_grid() {
        let data = height_blob(0, 5, &[]);
        assert!(matches!(decode_height(&data), Err(DecodeError::EmptyGrid { .. })));
    }

    #[test]
    fn test_height_huge_dimensions_do_not_panic() {
        let data = height_blob(u32::MAX, u32::MAX, &[]);
        assert!(matches!(decode_height(&data), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_decode_walkability() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[0xFF; 8]);
        data.extend_from_slice(&[1, 0, 0, 7]);

        let grid = decode_walkability(&data).unwrap();
        assert_eq!(grid.walkable(0, 0), Some(true));
        assert_eq!(grid.walkable(1, 0), Some(false));
        assert_eq!(grid.walkable(1, 1), Some(true));
        assert_eq!(grid.walkable(2, 1), None);
        assert_eq!(grid.walkable_count(), 2);

        let reencoded = encode_walkability(&grid);
        assert_eq!(&reencoded[HEADER_SIZE..], &[1, 0, 0, 7]);
        assert_eq!(decode_walkability(&reencoded).unwrap(), grid);
    }

    #[test]
    fn test_walkability_truncated() {
        let grid = WalkabilityGrid::new(3, 3, vec![1; 9]).unwrap();
        let full = encode_walkability(&grid);
        for len in [0, 8, 15, 16, full.len() - 1] {
            assert!(
                matches!(decode_walkability(&full[..len]), Err(DecodeError::Truncated { .. })),
                "len {len}"
            );
        }
    }
}
