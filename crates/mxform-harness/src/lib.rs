#![forbid(unsafe_code)]

//! Test harness for mxform.
//!
//! - [`MemoryFormControl`]: a reference form engine with validation rules,
//!   dirty/touched tracking and a submit cycle.
//! - [`init_test_logging`] and [`capture_events`]: tracing setup for tests.
//! - [`ReactionProbe`]: counts how often a tracked expression changes.

pub mod engine;
pub mod logging;
pub mod probe;

pub use engine::{CustomCheck, MemoryFormControl, Rule};
pub use logging::{capture_events, init_test_logging};
pub use probe::ReactionProbe;
