use thiserror::Error;

#[derive(Error, Debug)]
pub enum HoopError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SQL syntax error: {0}")]
    Syntax(String),

    #[error("Unsafe query rejected: {0}")]
    Unsafe(String),

    #[error("Query too expensive: estimated cost {cost:.0} exceeds ceiling {ceiling:.0}")]
    TooExpensive { cost: f64, ceiling: f64 },

    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Generation unavailable: {0}")]
    Generation(String),

    #[error("Max repair attempts ({0}) exceeded")]
    MaxRepairAttempts(u8),

    #[error("Query returned an empty result set")]
    EmptyResult,

    #[error("No data available to analyze")]
    NoData,

    #[error("Unsupported chart shape: {0}")]
    ShapeInvalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HoopError>;
