/// Errors produced by the folder store and pin aggregator.
///
/// `InvalidInput` covers request validation failures, `NotFound` a missing
/// source file or folder; the remaining variants wrap the underlying
/// `std::io::Error` of the filesystem call that failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to create folder: {0}")]
    FolderCreation(std::io::Error),
    #[error("failed to read directory: {0}")]
    DirRead(std::io::Error),
    #[error("failed to stat file: {0}")]
    FileStat(std::io::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to move file: {0}")]
    FileMove(std::io::Error),
    #[error("failed to rename file: {0}")]
    FileRename(std::io::Error),
    #[error("failed to resolve path: {0}")]
    PathResolve(std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
