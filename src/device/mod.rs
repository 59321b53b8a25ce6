//! Device access: connection discipline and the read operations built on it.

pub mod link;
pub mod reader;

pub use link::{DeviceLink, SessionFuture};
pub use reader::{DeviceReader, DeviceSnapshot, StatusBundle};
