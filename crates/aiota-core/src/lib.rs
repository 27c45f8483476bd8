pub mod config;
pub mod error;
pub mod store_uri;
pub mod types;

pub use config::LauncherConfig;
pub use error::{CoreError, CoreResult};
pub use store_uri::StoreUri;
pub use types::*;
