use thiserror::Error;

#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    IO(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self { AppError::IO(format!("{}", e)) }
}

/// Failures reported by a `StationStore`. All of them are recoverable; the
/// caller decides whether to surface or retry.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("store csv: {0}")]
    Csv(String),
    #[error("mask {0} for {1} does not fit in 4 bits")]
    InvalidMask(u8, String),
    #[error("no station {0}")]
    UnknownCallsign(String),
    #[error("empty callsign")]
    EmptyCallsign,
}

impl From<csv::Error> for StoreError {
    fn from(e: csv::Error) -> Self { StoreError::Csv(format!("{}", e)) }
}
