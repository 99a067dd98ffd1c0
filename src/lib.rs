pub mod config;
pub mod control;
pub mod dispatcher;
pub mod fetcher;
pub mod models;
pub mod page_analyzer;
pub mod plugins;
pub mod scheduler;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
