//! # Application Layer
//!
//! The bridge logic: decoding the console stream, classifying lines,
//! fanning them out, routing chat commands and running confirmation votes.

pub mod classifier;
pub mod confirm;
pub mod deaths;
pub mod dispatch;
pub mod executor;
pub mod frame;
pub mod markers;
pub mod presence;
pub mod relay;
pub mod router;
pub mod session;
