//! Domain types shared by every genjob crate.
//!
//! Holds the validated [`job::Job`] model, the input validator, the
//! result shapes returned to the host runtime, and the injected
//! [`env::Environment`] snapshot used for prefix-selected credentials.

pub mod env;
pub mod error;
pub mod job;
pub mod result;
pub mod validation;
