//! the test_utils folder here will share utils or test components between
//! unit tests
mod common;
mod recording;

pub use common::*;
pub use recording::*;
