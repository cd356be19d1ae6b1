pub mod handle;
pub mod types;

pub use handle::ForkHandle;
pub use types::{Fork, ForkSummary, UpdateFrequency};
