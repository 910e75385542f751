use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid xlsx: {0}")]
    InvalidXlsx(String),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid config: {0}")]
    Config(String),

    /// A single block is taller than a page's content area and cannot be placed.
    #[error("block of height {height:.1}pt does not fit in a {available:.1}pt content area")]
    LayoutImpossible { height: f32, available: f32 },

    #[error("record {} ({name}): {source}", .index + 1)]
    Record {
        index: usize,
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("render error: {0}")]
    Render(String),
}

impl Error {
    pub(crate) fn in_record(self, index: usize, name: impl fmt::Display) -> Self {
        Error::Record {
            index,
            name: name.to_string(),
            source: Box::new(self),
        }
    }
}
