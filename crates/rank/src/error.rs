use thiserror::Error;

pub type Result<T> = std::result::Result<T, RankError>;

#[derive(Error, Debug)]
pub enum RankError {
    #[error("Invalid ranking config: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] relgraph_store::StoreError),
}
