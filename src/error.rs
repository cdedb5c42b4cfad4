#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("InvalidHeader => {0}")]
    OleInvalidHeader(HeaderErrorType),
    #[error("InvalidCfb => {0}")]
    InvalidCfb(String),
    #[error("InvalidDirectoryEntry => {0}")]
    OleInvalidDirectoryEntry(DirectoryErrorType),
    #[error("OutOfRange => {0}")]
    OutOfRange(String),
    #[error("Cycle => {0}")]
    Cycle(String),
    #[error("NotFound => {0}")]
    NotFound(String),
    #[error("NotAStream => {0}")]
    NotAStream(String),
    #[error("Unsupported => {0}")]
    Unsupported(String),

    #[error("Io => {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum HeaderErrorType {
    #[error("the magic number was expected but not found, found {0:?} instead")]
    WrongMagicBytes(Vec<u8>),
    #[error("ParsingLocation => {0} UnderlyingError => {1}")]
    Parsing(&'static str, String),
}

#[derive(thiserror::Error, Debug)]
pub enum DirectoryErrorType {
    #[error("entry {0} has an invalid object type byte {1}")]
    InvalidObjectType(u32, u8),
    #[error("entry {0} has an invalid color byte {1}")]
    InvalidColor(u32, u8),
    #[error("entry {0} has a name longer than the maximum of 31 UTF-16 code units")]
    NameTooLong(u32),
    #[error("entry {0}: {1}")]
    Malformed(u32, String),
}
