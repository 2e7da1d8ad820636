//! Input recording for deterministic replay

mod dirty;
mod shadow;

pub use dirty::DirtyInputTracker;
pub use shadow::{InputListElement, InputShadow};
