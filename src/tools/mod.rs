//! 工具层：工具描述与注册表、MCP 工具发现

pub mod mcp;
pub mod registry;

pub use mcp::{ToolConnectError, ToolConnection, ToolConnector, ToolSource};
pub use registry::{ToolDescriptor, ToolRef, ToolRegistry};
