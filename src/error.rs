#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    #[error("unexpected end of data at offset {offset} (wanted {wanted} more bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error("unrecognized opcode {opcode:#04x} at offset {offset}")]
    UnrecognizedOpcode { opcode: u8, offset: usize },

    #[error("failed to decode section {section}: {source}")]
    SectionDecode {
        section: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("node {node:?} is missing required field {field:?}")]
    MissingField { node: String, field: String },

    #[error("node not found: {name:?}")]
    MissingNode { name: String },

    #[error("field {field:?} on node {node:?} has the wrong type (expected {expected})")]
    WrongLeafType {
        node: String,
        field: String,
        expected: &'static str,
    },

    #[error("string too long: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },

    #[error("string {value:?} contains a NUL byte")]
    NulInString { value: String },

    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidString { offset: usize },

    #[error("mismatched lock scope at offset {offset}")]
    ScopeMismatch { offset: usize },

    #[error("no opcode mapping for node {name:?}")]
    UnencodableNode { name: String },

    #[error("patch out of range: offset {offset}, buffer length {len}")]
    PatchOutOfRange { offset: usize, len: usize },

    #[error("malformed data: {reason}")]
    Malformed { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
