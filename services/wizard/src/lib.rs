pub mod config;
pub mod espeak;
pub mod terminal;
pub mod whisper;
