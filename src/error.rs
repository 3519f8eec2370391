use thiserror::Error;

/// Errors that stop a TMX load.
///
/// Most malformed map data degrades instead of failing (missing attributes become
/// sentinels, bad tile payloads become empty layers). Only broken XML, I/O failures and
/// unsupported compression end up here.
#[derive(Debug, Error)]
pub enum TmxError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Failed to parse attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("Failed to read TMX document: {0}")]
    Io(#[from] std::io::Error),

    /// Tile data uses a compression this loader refuses to decode (zstd).
    #[error("Unsupported tile data compression '{0}'")]
    UnsupportedCompression(String),
}

pub type TmxResult<T> = Result<T, TmxError>;
