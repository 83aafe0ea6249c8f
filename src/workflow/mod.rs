//! 顺序流水线：构建器、运行引擎与事件类型

pub mod builder;
pub mod engine;
pub mod types;

pub use builder::SequentialBuilder;
pub use engine::{Pipeline, PipelineStage};
pub use types::{EventStream, PipelineEvent, WorkflowError};
