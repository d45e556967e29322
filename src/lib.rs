pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod orchestration;
pub mod submit;
