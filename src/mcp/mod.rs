pub mod server;
pub mod tools;

pub use server::OpenApiMcpServer;
pub use tools::{BindError, BoundRequest, CatalogError, ToolCatalog, ToolSpec};
