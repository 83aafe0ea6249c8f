//! LLM 层：客户端抽象与实现（Azure OpenAI / OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{MockBehavior, MockLlmClient};
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError, TextStream};
