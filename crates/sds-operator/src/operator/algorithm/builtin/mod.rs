//! Bindings for the engine's builtin functions.
//!
//! A binding only records the builtin's name and arguments; the function
//! itself runs inside the engine.

mod mice_apply;

pub use mice_apply::{MICE_APPLY, MICE_APPLY_ARGUMENTS, MiceApply, MiceApplyBuilder, Threshold, mice_apply};
