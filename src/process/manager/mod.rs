//! Process management module exports

pub mod attacher;

pub use attacher::{attach, AttachBackoff, ProcessAttacher};
