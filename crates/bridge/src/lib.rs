//! Provider clients and the job bridge.
//!
//! Submits generation and fine-tuning jobs to the external image APIs and
//! waits for them to settle, either by polling a status URL under a fixed
//! attempt budget ([`poll`]) or by delegating to a subscribe cycle
//! ([`fal::FalClient::subscribe`]). Both paths are exposed through the
//! [`bridge::JobBridge`] trait. [`staging`] and [`upload`] implement the
//! zip-and-upload pipeline used to hand training images to the trainer.

pub mod bfl;
pub mod bridge;
pub mod error;
pub mod fal;
pub mod poll;
pub mod staging;
pub mod upload;

pub use bridge::JobBridge;
pub use error::BridgeError;
