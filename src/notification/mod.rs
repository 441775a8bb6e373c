//! Notification composition and delivery orchestration.

mod composer;
mod document;
mod engine;


pub use composer::*;
pub use document::*;
pub use engine::*;
