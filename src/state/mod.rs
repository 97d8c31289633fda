//! State module for tracking per-file pipeline progress

mod file_state;

pub use file_state::FileState;
