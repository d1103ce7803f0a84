//! Algorithm bindings.

pub mod builtin;

pub use builtin::{MICE_APPLY, MICE_APPLY_ARGUMENTS, MiceApply, MiceApplyBuilder, Threshold, mice_apply};
