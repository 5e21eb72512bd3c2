pub mod chat;
pub mod completion;
pub mod constants;
pub mod gateway;
pub mod parser;
pub mod widget;

pub use completion::{CompletionClient, CompletionConfig, CompletionError};
pub use gateway::{answer_question, router, AppState, GatewayError};
pub use parser::{parse_assistant_response, ParsedResponse};
pub use widget::{ChatController, Conversation, Message, Sender};
