pub mod config;
pub mod device;
pub mod error;
pub mod service_tag;

pub use config::{Config, DatabasePath, DriverType};
pub use device::{Device, Warranty};
pub use error::{Error, Result};
pub use service_tag::ServiceTag;
