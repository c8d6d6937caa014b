//! Core types shared across Quarry.
//!
//! Configuration lives here; every other module receives the sections it
//! needs from [`Config`].

mod config;

pub use config::{
    Config, DatabaseConfig, EmbedderKind, IndexConfig, LlmConfig, ProviderKind, ReplConfig,
    RetrievalPolicy, DATABASE_URL_ENV,
};
