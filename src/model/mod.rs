//! Domain types: subscriptions, notifications and the data tree.

mod data;
mod notification;
mod subscription;


pub use data::*;
pub use notification::*;
pub use subscription::*;
