pub mod config;
pub mod error;
pub mod types;

pub use config::RpcConfig;
pub use error::{codes, ApiError, ApiResult, RpcError};
pub use types::*;
