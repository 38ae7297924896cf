pub mod config;
pub mod rpc;
pub mod schema;

pub use config::ConfigError;
pub use rpc::CommunicationError;
pub use schema::SchemaError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Communication(#[from] rpc::CommunicationError),

    #[error(transparent)]
    Schema(#[from] schema::SchemaError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
