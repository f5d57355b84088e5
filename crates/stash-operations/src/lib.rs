pub mod bulk;
pub mod cache;
pub mod context;
pub mod index;
pub mod types;
pub mod warm;

pub use context::StashContext;
pub use types::*;

#[cfg(test)]
pub(crate) mod test_utils;
