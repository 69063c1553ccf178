mod file;
mod lines;

pub use file::{FileTailer, TailOptions, DEFAULT_MAX_LINE_BYTES, DEFAULT_POLL_INTERVAL};
