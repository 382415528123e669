//! Core types for rulebook
//!
//! This crate provides the fundamental types shared by every other crate:
//! the [`Event`] envelope, the per-evaluation [`EventContext`] and the
//! boolean coercion used for automation options and templates.

mod context;
mod event;
mod truthy;

pub use context::{EventContext, Metadata, EVENT_VAR};
pub use event::{Event, EventError, EventType};
pub use truthy::{is_truthy, is_truthy_opt, is_truthy_str};
