use std::path::PathBuf;

use crate::table::TableError;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error(
        "Master table {} not found: run the `combine` stage (after `extract` and `normalize`) to build it",
        path.display()
    )]
    MissingArtifact { path: PathBuf, stage: &'static str },

    #[error("Master table is missing required column {0}")]
    MissingColumn(String),

    #[error("Invalid financial year {value:?} at line {line}")]
    InvalidFinancialYear { value: String, line: usize },

    #[error("Unknown metric column {0}")]
    UnknownColumn(String),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
