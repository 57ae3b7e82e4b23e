pub mod crypto;
pub mod error;
pub mod logger;
pub mod node_utils;

pub use crypto::{KeyHasher, Sha256KeyHasher};
pub use error::{DhtError, Result};
pub use logger::setup_logging;
pub use node_utils::NodeUtils;
