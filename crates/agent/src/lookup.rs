//! Batch lookup: cache first, then one browser session for every miss.

use dell_lookup_browser::DeviceSource;
use dell_lookup_core::{Device, Error, Result, ServiceTag};
use dell_lookup_storage::DeviceCache;
use std::fmt;
use tracing::{debug, info, warn};

/// Per-tag progress, reported while the batch runs.
#[derive(Debug, Clone, Copy)]
pub enum LookupEvent<'a> {
    CacheHit {
        service_tag: &'a ServiceTag,
        device: &'a Device,
    },
    Scraped {
        service_tag: &'a ServiceTag,
        device: &'a Device,
    },
    NotFound {
        service_tag: &'a ServiceTag,
    },
}

/// Devices resolved so far (cache hits first, then scraped) and tags the site did not know.
#[derive(Debug, Default, Clone)]
pub struct LookupReport {
    pub devices: Vec<Device>,
    pub not_found: Vec<ServiceTag>,
}

/// A fatal error together with whatever was resolved before it.
#[derive(Debug)]
pub struct LookupFailure {
    pub error: Error,
    pub partial: LookupReport,
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lookup aborted after resolving {} device(s)",
            self.partial.devices.len()
        )
    }
}

impl std::error::Error for LookupFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Resolves a batch of service tags.
///
/// The source is only built when the cache cannot answer every tag.
pub struct Lookup<F> {
    make_source: F,
}

impl<F, S> Lookup<F>
where
    F: FnOnce() -> Result<S>,
    S: DeviceSource,
{
    pub fn new(make_source: F) -> Self {
        Self { make_source }
    }

    /// Open `cache`, resolve `tags`, and release everything.
    ///
    /// The source (if one was built) is stopped and the cache closed exactly
    /// once, whether the batch succeeds or not. Misses are resolved in the
    /// order they appear in `tags`.
    pub async fn run<E>(
        self,
        tags: &[ServiceTag],
        cache: &mut dyn DeviceCache,
        mut on_event: E,
    ) -> std::result::Result<LookupReport, LookupFailure>
    where
        E: FnMut(LookupEvent<'_>),
    {
        let mut report = LookupReport::default();
        let mut source: Option<S> = None;

        let outcome = Self::execute(
            self.make_source,
            tags,
            cache,
            &mut source,
            &mut report,
            &mut on_event,
        )
        .await;
        let released = release(source, cache).await;

        match outcome.and(released) {
            Ok(()) => {
                info!(
                    resolved = report.devices.len(),
                    not_found = report.not_found.len(),
                    "Lookup finished"
                );
                Ok(report)
            }
            Err(error) => Err(LookupFailure {
                error,
                partial: report,
            }),
        }
    }

    async fn execute<E>(
        make_source: F,
        tags: &[ServiceTag],
        cache: &mut dyn DeviceCache,
        source: &mut Option<S>,
        report: &mut LookupReport,
        on_event: &mut E,
    ) -> Result<()>
    where
        E: FnMut(LookupEvent<'_>),
    {
        cache.open()?;

        let mut misses = Vec::new();
        for tag in tags {
            match cache.get(tag)? {
                Some(device) => {
                    on_event(LookupEvent::CacheHit {
                        service_tag: tag,
                        device: &device,
                    });
                    report.devices.push(device);
                }
                None => misses.push(tag),
            }
        }

        if misses.is_empty() {
            debug!(hits = report.devices.len(), "All service tags cached");
            return Ok(());
        }

        info!(
            hits = report.devices.len(),
            misses = misses.len(),
            "Looking up uncached service tags"
        );
        let source = source.insert(make_source()?);
        source.start().await?;

        for tag in misses {
            match source.resolve(tag).await? {
                Some(device) => {
                    cache.put(&device)?;
                    on_event(LookupEvent::Scraped {
                        service_tag: tag,
                        device: &device,
                    });
                    report.devices.push(device);
                }
                None => {
                    on_event(LookupEvent::NotFound { service_tag: tag });
                    report.not_found.push(tag.clone());
                }
            }
        }

        Ok(())
    }
}

async fn release<S: DeviceSource>(source: Option<S>, cache: &mut dyn DeviceCache) -> Result<()> {
    let mut first_error = None;

    if let Some(mut source) = source {
        if let Err(e) = source.stop().await {
            warn!(error = %e, "Failed to stop lookup session");
            first_error.get_or_insert(e);
        }
    }
    if let Err(e) = cache.close() {
        warn!(error = %e, "Failed to close device cache");
        first_error.get_or_insert(e);
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
