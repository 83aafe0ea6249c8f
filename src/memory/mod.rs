//! 记忆：单次运行的对话上下文 + 可选的托管记忆库句柄

pub mod conversation;
pub mod store;

pub use conversation::{Conversation, Message, Role};
pub use store::{ensure_memory_store, MemoryRef};
