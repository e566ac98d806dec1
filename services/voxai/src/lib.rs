pub mod config;
pub mod console_input;
pub mod console_speaker;
pub mod console_view;
pub mod prompt_loader;
