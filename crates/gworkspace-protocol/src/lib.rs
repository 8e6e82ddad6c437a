pub mod error;
pub mod jsonrpc;
pub mod mcp;

pub use error::ErrorCode;
pub use jsonrpc::{error, success, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use mcp::*;
