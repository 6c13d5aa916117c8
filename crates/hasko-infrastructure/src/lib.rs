pub mod config_service;
pub mod json_chat_store;
pub mod paths;
pub mod storage;

pub use config_service::AppConfig;
pub use json_chat_store::JsonChatStore;
pub use paths::HaskoPaths;
