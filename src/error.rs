use thiserror::Error;

/// Failures while reading catalog, name and cross-index files.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A fixed-size binary stream ended in the middle of a record.
    #[error("data truncated in record {record} (expected {expected} bytes, got {actual})")]
    Truncated {
        record: usize,
        expected: usize,
        actual: usize,
    },

    /// A text record is missing a required field or has an unparsable value.
    #[error("malformed field `{field}` in {record}: {reason}")]
    MalformedField {
        record: String,
        field: &'static str,
        reason: String,
    },

    #[error("bad header: {0}")]
    BadHeader(String),

    #[error("bad spectral class {packed:#06x} for star {catalog_number}")]
    BadSpectralClass { catalog_number: u32, packed: u16 },

    /// The text stream is structurally broken and parsing cannot resume.
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A deserialized structure violates its own indexing invariants.
    #[error("inconsistent data: {0}")]
    Inconsistent(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;
