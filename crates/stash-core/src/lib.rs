pub mod archive;
pub mod error;
pub mod guard;
pub mod index;
pub mod package;
pub mod packument;
pub mod store;

pub use error::{ErrorContext, StashError, StashResult};
pub use guard::{IndexGuard, IndexPermit};
pub use index::{index, reconcile, Reconciliation};
pub use package::{Package, Tarball};
pub use packument::Packument;
pub use store::{FileStore, Store};

#[cfg(test)]
pub(crate) mod test_utils;
