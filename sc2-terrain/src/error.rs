use std::fmt;

/// Which of the two terrain blobs a decode error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainFormat {
    Height,
    Walkability,
}

impl fmt::Display for TerrainFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Height => f.write_str("height map"),
            Self::Walkability => f.write_str("walkability map"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{format} truncated: need {need} bytes, have {have}")]
    Truncated { format: TerrainFormat, need: usize, have: usize },

    #[error("{format} has an empty grid ({width}x{height})")]
    EmptyGrid { format: TerrainFormat, width: u32, height: u32 },
}
