use sc2_terrain::DecodeError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("malformed object list: {0}")]
    Parse(String),

    #[error("missing source: {0}")]
    MissingSource(String),

    #[error("archive error: {0}")]
    ArchiveIo(String),

    #[error("invalid scene: {0}")]
    InvalidScene(String),
}

impl Error {
    pub(crate) fn archive(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::ArchiveIo(format!("{context}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
