pub mod api;
pub mod config;
pub mod logging;
pub mod mcp;

pub use api::{ApiClient, ApiError};
pub use config::{ConfigError, RuntimeConfig};
pub use mcp::{OpenApiMcpServer, ToolCatalog};
