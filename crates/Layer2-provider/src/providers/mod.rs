//! Model client implementations

pub mod openai;
pub mod scripted;
