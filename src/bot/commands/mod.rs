pub mod maintenance;
pub mod manage;
pub mod start;
pub mod whisper;

pub use maintenance::{checkpoint, reset};
pub use manage::{deletemine, mywhispers};
pub use start::start;
pub use whisper::whisper;

use crate::bot::Data;

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Get all registered commands
pub fn all_commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        start(),
        whisper(),
        mywhispers(),
        deletemine(),
        checkpoint(),
        reset(),
    ]
}
