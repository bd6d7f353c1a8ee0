use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("cannot recover: {0}")]
    Recovery(String),

    #[error("worker interrupted: {0}")]
    Interrupted(String),

    #[error("experiment aborted")]
    Aborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
