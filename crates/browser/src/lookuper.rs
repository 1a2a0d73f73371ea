//! Dell support site scraper.
//!
//! One browser session is opened per run and reused for every service tag.
//! The site answers a search with a full page transition, so each lookup
//! waits for the `<html>` element to be replaced before reading results.

use async_trait::async_trait;
use chrono::NaiveDate;
use dell_lookup_core::device::parse_date;
use dell_lookup_core::{Config, Device, DriverType, Error, Result, ServiceTag, Warranty};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::{self, DriverProcess};
use crate::wait::BoundedWait;
use crate::webdriver::{ElementRef, Locator, WebDriverClient};
use crate::DeviceSource;

pub const HOMEPAGE: &str = "https://www.dell.com/support/home/en-uk?lwp=rt";

mod selectors {
    pub const CONSENT_DISMISS: &str = "a.cc-dismiss";
    pub const SEARCH_INPUT: &str = "#mh-search-input";
    pub const SEARCH_SUBMIT: &str = "button.mh-search-submit";
    pub const RESULT_OR_EMPTY: &str = "#hiddenValues, #null-result-text";
    pub const NO_RESULTS: &str = "#null-result-text";
    pub const PRODUCT_META: &str = "meta[name=supportproductselected]";
    pub const SYSTEM_DESCRIPTION: &str = "h1[aria-label=SystemDescription]";
    pub const SERVICE_TAG_LABEL: &str = ".service-tag";
    pub const WARRANTY_TYPE: &str = "#WarrantyType";
    pub const WARRANTY_EXPIRY: &str = "p.warrantyExpiringLabel";
}

/// Bounded waits used while walking the support site.
#[derive(Debug, Clone, Copy)]
pub struct PageTimeouts {
    pub consent: Duration,
    pub search_input: Duration,
    pub page_transition: Duration,
    pub result: Duration,
    pub poll_interval: Duration,
}

impl Default for PageTimeouts {
    fn default() -> Self {
        Self {
            consent: Duration::from_secs(10),
            search_input: Duration::from_secs(10),
            page_transition: Duration::from_secs(30),
            result: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// The support site as seen through one WebDriver session.
pub struct SupportSite<'a> {
    client: &'a WebDriverClient,
    timeouts: PageTimeouts,
}

impl<'a> SupportSite<'a> {
    pub fn new(client: &'a WebDriverClient, timeouts: PageTimeouts) -> Self {
        Self { client, timeouts }
    }

    fn wait(&self, timeout: Duration) -> BoundedWait {
        BoundedWait::new(timeout).poll_every(self.timeouts.poll_interval)
    }

    /// Load the homepage and get the cookie banner out of the way.
    pub async fn open(&self) -> Result<()> {
        self.client.navigate(HOMEPAGE).await?;
        self.dismiss_consent().await
    }

    /// Search for one tag. `Ok(None)` when the site reports no such device.
    pub async fn lookup(&self, service_tag: &ServiceTag) -> Result<Option<Device>> {
        let client = self.client;
        debug!(service_tag = %service_tag, "Searching support site");

        let old_token = page_token(client).await?;
        self.submit_search(service_tag).await?;
        self.wait_for_page_transition(old_token).await?;

        self.wait(self.timeouts.result)
            .until("warranty details or empty result", || async move {
                client.find_element(Locator::Css(selectors::RESULT_OR_EMPTY)).await
            })
            .await?;

        if client
            .find_element(Locator::Css(selectors::NO_RESULTS))
            .await?
            .is_some()
        {
            debug!(service_tag = %service_tag, "No device found");
            return Ok(None);
        }

        self.extract_device(service_tag).await.map(Some)
    }

    async fn dismiss_consent(&self) -> Result<()> {
        let client = self.client;
        let button = self
            .wait(self.timeouts.consent)
            .until("cookie consent button clickable", || async move {
                let Some(el) = client.find_element(Locator::Css(selectors::CONSENT_DISMISS)).await? else {
                    return Ok(None);
                };
                let clickable = client.is_displayed(&el).await? && client.is_enabled(&el).await?;
                Ok(clickable.then_some(el))
            })
            .await?;
        client.click(&button).await?;
        debug!("Cookie consent dismissed");
        Ok(())
    }

    async fn submit_search(&self, service_tag: &ServiceTag) -> Result<()> {
        let client = self.client;
        let search_bar = self
            .wait(self.timeouts.search_input)
            .until("search input present", || async move {
                client.find_element(Locator::Css(selectors::SEARCH_INPUT)).await
            })
            .await?;
        let search_button = required(client, selectors::SEARCH_SUBMIT).await?;

        client.send_keys(&search_bar, service_tag.as_str()).await?;
        client.click(&search_button).await
    }

    async fn wait_for_page_transition(&self, old_token: Option<String>) -> Result<()> {
        let client = self.client;
        let old_token = &old_token;
        self.wait(self.timeouts.page_transition)
            .until("search results page load", || async move {
                let token = page_token(client).await?;
                Ok((token != *old_token).then_some(()))
            })
            .await
    }

    async fn extract_device(&self, requested: &ServiceTag) -> Result<Device> {
        let client = self.client;

        let meta = required(client, selectors::PRODUCT_META).await?;
        let content = client.attribute(&meta, "content").await?.unwrap_or_default();
        let device_type = device_type_from_meta(&content).to_string();

        let heading = required(client, selectors::SYSTEM_DESCRIPTION).await?;
        let name = client.text(&heading).await?.trim().to_string();

        let tag_label = required(client, selectors::SERVICE_TAG_LABEL).await?;
        let service_tag = service_tag_from_label(&client.text(&tag_label).await?, requested);

        let warranty_field = required(client, selectors::WARRANTY_TYPE).await?;
        let warranty_type = client
            .property(&warranty_field, "value")
            .await?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let warranty = match warranty_type {
            Some(kind) => {
                let label = required(client, selectors::WARRANTY_EXPIRY).await?;
                let expires_on = expiration_from_label(&client.text(&label).await?)?;
                Some(Warranty::new(kind, expires_on))
            }
            None => {
                warn!(service_tag = %service_tag, "Result page has no warranty type");
                None
            }
        };

        Device::new(device_type, name, service_tag, warranty)
    }
}

struct ActiveSession {
    driver: DriverProcess,
    client: WebDriverClient,
}

/// Looks up service tags on the Dell support site.
pub struct DellLookuper {
    driver_type: DriverType,
    driver_executable: PathBuf,
    driver_options: Vec<String>,
    timeouts: PageTimeouts,
    session: Option<ActiveSession>,
}

impl DellLookuper {
    pub fn new(config: &Config) -> Self {
        Self {
            driver_type: config.driver_type,
            driver_executable: config.driver_executable.clone(),
            driver_options: config.driver_options.clone(),
            timeouts: PageTimeouts::default(),
            session: None,
        }
    }

    fn site(&self) -> Result<SupportSite<'_>> {
        self.session
            .as_ref()
            .map(|s| SupportSite::new(&s.client, self.timeouts))
            .ok_or_else(|| Error::Browser("Lookup session not started".to_string()))
    }
}

/// Reference of the current `<html>` element, used to detect page transitions.
async fn page_token(client: &WebDriverClient) -> Result<Option<String>> {
    Ok(client
        .find_element(Locator::TagName("html"))
        .await?
        .map(|el| el.id().to_string()))
}

async fn required(client: &WebDriverClient, css: &str) -> Result<ElementRef> {
    client
        .find_element(Locator::Css(css))
        .await?
        .ok_or_else(|| Error::Browser(format!("Expected element '{}' not found on page", css)))
}

/// Category from the product meta tag, e.g. `...-laptop` gives `laptop`.
pub fn device_type_from_meta(content: &str) -> &str {
    content.rsplit('-').next().unwrap_or_default().trim()
}

/// The site's own rendering of the tag (`Service Tag: ABC1234`).
///
/// Falls back to the requested tag if the label does not end in a valid one.
pub fn service_tag_from_label(text: &str, requested: &ServiceTag) -> ServiceTag {
    match text.split_whitespace().last().map(ServiceTag::parse) {
        Some(Ok(tag)) => tag,
        _ => {
            warn!(label = text, requested = %requested, "Unrecognized service tag label, using requested tag");
            requested.clone()
        }
    }
}

/// Expiration date from the last three words of the label (`Expires 08 Jan 2025`).
pub fn expiration_from_label(text: &str) -> Result<NaiveDate> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(3);
    parse_date(&words[start..].join(" "))
}

#[async_trait]
impl DeviceSource for DellLookuper {
    async fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let mut driver = DriverProcess::launch(self.driver_type, &self.driver_executable).await?;
        let caps = driver::capabilities(self.driver_type, &self.driver_options);
        let client = match WebDriverClient::new_session(&driver.base_url(), caps).await {
            Ok(client) => client,
            Err(e) => {
                driver.kill().await.ok();
                return Err(e);
            }
        };

        info!(
            driver = self.driver_type.name(),
            session_id = client.session_id(),
            "Browser session started"
        );
        self.session = Some(ActiveSession { driver, client });

        self.site()?.open().await
    }

    async fn resolve(&mut self, service_tag: &ServiceTag) -> Result<Option<Device>> {
        self.site()?.lookup(service_tag).await
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        session.client.delete_session().await.ok();
        session.driver.kill().await?;
        info!("Browser session stopped");
        Ok(())
    }
}
