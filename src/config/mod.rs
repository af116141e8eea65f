mod collection_config;
mod env_vars;

pub use collection_config::{
    CollectorConfig,
    FailurePolicy,
    IdentityConfig,
    load_or_create_config,
};

pub use env_vars::parse_unix_env_vars;
