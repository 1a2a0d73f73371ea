//! Browser-driven warranty lookups.
//!
//! - `webdriver`: minimal W3C WebDriver client over HTTP
//! - `driver`: launches the WebDriver executable for the configured engine
//! - `lookuper`: walks the Dell support site for one service tag at a time

pub mod driver;
#[cfg(test)]
mod fake_driver;
pub mod lookuper;
pub mod wait;
pub mod webdriver;

use async_trait::async_trait;
use dell_lookup_core::{Device, Result, ServiceTag};

pub use lookuper::{DellLookuper, PageTimeouts, SupportSite};

/// Something that can turn service tags into devices, one at a time.
///
/// `start` is called once before the first `resolve`; `stop` once after the
/// last, including when a `resolve` failed.
#[async_trait]
pub trait DeviceSource: Send {
    async fn start(&mut self) -> Result<()>;

    /// `Ok(None)` means the site has no device for this tag.
    async fn resolve(&mut self, service_tag: &ServiceTag) -> Result<Option<Device>>;

    async fn stop(&mut self) -> Result<()>;
}
