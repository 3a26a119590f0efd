use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AlmonerError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(almoner::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(almoner::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(almoner::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(almoner::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Invalid upload: {0}")]
    #[diagnostic(code(almoner::validation))]
    Validation(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(almoner::not_found))]
    NotFound(String),

    #[error("Invalid state: {0}")]
    #[diagnostic(code(almoner::invalid_state))]
    InvalidState(String),

    #[error("Bad request: {0}")]
    #[diagnostic(code(almoner::bad_request))]
    BadRequest(String),

    #[error("{0}")]
    #[diagnostic(code(almoner::other))]
    Other(String),
}
