//! Resolved Dell devices and their warranty state.

use chrono::{Local, NaiveDate};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::service_tag::ServiceTag;

/// Date format used by the support site, the cache and exports (`08 Jan 2025`).
pub const DATE_FORMAT: &str = "%d %b %Y";

/// Device type the site reports when it has no better category.
pub const GENERIC_DEVICE_TYPE: &str = "other";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| Error::Validation(format!("invalid date '{}': {}", text, e)))
}

/// Support plan attached to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warranty {
    pub kind: String,
    pub expires_on: NaiveDate,
}

impl Warranty {
    pub fn new(kind: impl Into<String>, expires_on: NaiveDate) -> Self {
        Self {
            kind: kind.into(),
            expires_on,
        }
    }
}

/// A device looked up by service tag.
///
/// Identity is the service tag alone: a cached record and a freshly scraped
/// one for the same tag compare equal even if the site changed its details.
#[derive(Debug, Clone)]
pub struct Device {
    device_type: String,
    name: String,
    service_tag: ServiceTag,
    warranty: Option<Warranty>,
}

impl Device {
    pub fn new(
        device_type: impl Into<String>,
        name: impl Into<String>,
        service_tag: ServiceTag,
        warranty: Option<Warranty>,
    ) -> Result<Self> {
        let device_type = device_type.into();
        let name = name.into();

        if device_type.trim().is_empty() {
            return Err(Error::Validation(format!(
                "device {} has an empty device type",
                service_tag
            )));
        }
        if name.trim().is_empty() {
            return Err(Error::Validation(format!(
                "device {} has an empty name",
                service_tag
            )));
        }
        if let Some(w) = &warranty {
            if w.kind.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "device {} has an empty warranty type",
                    service_tag
                )));
            }
        }

        Ok(Self {
            device_type,
            name,
            service_tag,
            warranty,
        })
    }

    /// Build from the flat, nullable warranty columns used by storage and export.
    pub fn from_parts(
        device_type: impl Into<String>,
        name: impl Into<String>,
        service_tag: ServiceTag,
        warranty_type: Option<String>,
        warranty_expiration_date: Option<NaiveDate>,
    ) -> Result<Self> {
        let warranty = match (warranty_type, warranty_expiration_date) {
            (Some(kind), Some(expires_on)) => Some(Warranty::new(kind, expires_on)),
            (None, None) => None,
            (kind, date) => {
                return Err(Error::Validation(format!(
                    "device {}: warranty type ({:?}) and expiration date ({:?}) must be both set or both empty",
                    service_tag, kind, date
                )))
            }
        };
        Self::new(device_type, name, service_tag, warranty)
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_tag(&self) -> &ServiceTag {
        &self.service_tag
    }

    pub fn warranty(&self) -> Option<&Warranty> {
        self.warranty.as_ref()
    }

    pub fn warranty_type(&self) -> Option<&str> {
        self.warranty.as_ref().map(|w| w.kind.as_str())
    }

    pub fn warranty_expiration_date(&self) -> Option<NaiveDate> {
        self.warranty.as_ref().map(|w| w.expires_on)
    }

    /// No warranty info counts as expired.
    pub fn has_warranty_expired_at(&self, today: NaiveDate) -> bool {
        match &self.warranty {
            Some(w) => w.expires_on < today,
            None => true,
        }
    }

    /// Signed day count until expiry; negative once expired, zero without warranty info.
    pub fn days_until_warranty_expires_at(&self, today: NaiveDate) -> i64 {
        self.warranty
            .as_ref()
            .map(|w| (w.expires_on - today).num_days())
            .unwrap_or(0)
    }

    pub fn has_warranty_expired(&self) -> bool {
        self.has_warranty_expired_at(Local::now().date_naive())
    }

    pub fn days_until_warranty_expires(&self) -> i64 {
        self.days_until_warranty_expires_at(Local::now().date_naive())
    }

    /// One-line summary evaluated against `today`.
    pub fn render_at(&self, today: NaiveDate) -> String {
        let warranty_text = match &self.warranty {
            None => "no warranty information".to_string(),
            Some(w) => {
                let days = self.days_until_warranty_expires_at(today).abs();
                let date = format_date(w.expires_on);
                if self.has_warranty_expired_at(today) {
                    format!("warranty expired {} days ago - {}", days, date)
                } else {
                    format!("under warranty for {} more days - {}", days, date)
                }
            }
        };

        if self.device_type.eq_ignore_ascii_case(GENERIC_DEVICE_TYPE) {
            format!("{} [{}] ({})", self.name, self.service_tag, warranty_text)
        } else {
            format!(
                "{} {} [{}] ({})",
                capitalize(&self.device_type),
                self.name,
                self.service_tag,
                warranty_text
            )
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.service_tag == other.service_tag
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service_tag.hash(state);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_at(Local::now().date_naive()))
    }
}
