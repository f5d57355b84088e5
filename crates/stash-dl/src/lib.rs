pub mod error;
pub mod http_client;
pub mod origin;

pub use error::OriginError;
pub use origin::{Fetch, HttpOrigin};
