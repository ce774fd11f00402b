//! Domain types and pure logic for the headshot job bridge.
//!
//! Nothing in this crate performs I/O. Provider clients and the HTTP layer
//! live in `headshot-bridge` and `headshot-api` and build on the types,
//! validation rules and polling decisions defined here.

pub mod error;
pub mod finetune;
pub mod generation;
pub mod job;
pub mod polling;
