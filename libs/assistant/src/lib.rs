mod client;
mod session;
mod sse;

pub use client::{
    ChatClient, ChatRequest, DEFAULT_BASE_API, DEFAULT_MODEL, DEFAULT_TEMPERATURE, Message,
    ReplyStream,
};
pub use session::{ChatSession, ChatTurn, DEFAULT_IDLE, PendingReply, Role, SessionStore};
pub use sse::SseDecoder;
