pub mod bot;
pub mod config;
pub mod error;
pub mod whisper;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
