//! 核心层：应用上下文（启动 / 关闭生命周期）、错误类型、优雅关闭

pub mod context;
pub mod error;
pub mod shutdown;

pub use context::AppContext;
pub use error::PipelineError;
pub use shutdown::{
    release_context, run_with_graceful_shutdown, ShutdownManager, ShutdownReason, RELEASE_TIMEOUT,
};
