//! Process-level context tying the registry and the engine together.

mod builder;
mod push_service;


pub use builder::*;
pub use push_service::*;
