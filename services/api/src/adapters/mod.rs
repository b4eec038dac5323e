pub mod db;
pub mod message_llm;

pub use db::DbAdapter;
pub use message_llm::OpenAiMessageAdapter;
