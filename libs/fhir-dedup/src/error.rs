use ferrum_models::ResourceType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("no deduplication strategy for resource type {0}")]
    UnsupportedResourceType(String),

    #[error("resource type mismatch: expected {expected}, found {found}")]
    ResourceTypeMismatch {
        expected: ResourceType,
        found: ResourceType,
    },

    #[error("resource lists share ids: {}", .0.join(", "))]
    OverlappingIds(Vec<String>),

    #[error("{0} resource has no id")]
    MissingId(ResourceType),

    #[error("status ranking for {0} must define exactly one rank-0 status")]
    InvalidStatusRanking(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ferrum_models::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Patient resources cannot be excluded from the output")]
    PatientExcluded,

    #[error("missing author display must not be empty")]
    EmptyAuthorDisplay,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
