use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("playbook not found: {0}")]
  PlaybookNotFound(String),

  #[error("action not found: {0}")]
  ActionNotFound(String),

  #[error("invalid identifier '{0}'")]
  InvalidId(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("store backend error: {0}")]
  Backend(String),
}
