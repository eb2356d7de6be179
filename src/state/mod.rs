//! State machine module for the hyper key
//!
//! Three states:
//! - Idle: no hyper key interaction
//! - Held: hyper key down, nothing else pressed yet
//! - Modified: hyper key down and used as a modifier

mod machine;

pub use machine::{KeyStateMachine, State, TapPolicy};
