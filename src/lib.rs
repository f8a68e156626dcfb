//! ModelScope node for workflow-automation hosts
//!
//! Exposes ModelScope API-Inference chat completion, vision chat and
//! text-to-image generation as host operations. Image generation runs as an
//! asynchronous remote task that is submitted and then polled to completion.

pub mod ai;
pub mod constants;
pub mod error;
pub mod models;
pub mod operations;
pub mod poller;
pub mod response;
pub mod validation;

pub use error::{Error, Result};
