pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiClient;
pub use provider::LanguageModel;
pub use types::{ChatMessage, ChatRequest};
