use dell_lookup_agent::{Lookup, LookupEvent};
use dell_lookup_browser::DellLookuper;
use dell_lookup_core::{Config, ServiceTag};
use dell_lookup_storage::select_cache;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::export::{self, OutputFileType};

/// Everything the lookup command needs, already validated by the CLI.
#[derive(Debug, Clone)]
pub struct LookupOptions {
    pub config_file: PathBuf,
    pub service_tags: Vec<String>,
    pub input_file: Option<PathBuf>,
    pub separator: Option<String>,
    pub use_cache: bool,
    pub output_file: Option<PathBuf>,
    pub output_file_type: OutputFileType,
    pub include_header: bool,
}

/// Merge tags from the command line and the input file into a deduplicated list.
pub fn collect_service_tags(
    cli_tags: &[String],
    input_file: Option<&Path>,
    separator: Option<&str>,
) -> anyhow::Result<Vec<ServiceTag>> {
    let mut raw: Vec<String> = cli_tags.to_vec();

    if let Some(path) = input_file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read input file {}: {}", path.display(), e))?;
        match separator {
            Some(sep) => raw.extend(content.split(sep).map(str::to_string)),
            None => raw.extend(content.split_whitespace().map(str::to_string)),
        }
    }

    Ok(ServiceTag::collect(raw))
}

fn print_event(event: LookupEvent<'_>) {
    match event {
        LookupEvent::CacheHit {
            service_tag,
            device,
        } => println!("[CACHE] For service tag {} got: {}", service_tag, device),
        LookupEvent::Scraped {
            service_tag,
            device,
        } => println!("For service tag {} got: {}", service_tag, device),
        LookupEvent::NotFound { service_tag } => println!("No such device: {}", service_tag),
    }
}

pub async fn run(opts: LookupOptions) -> anyhow::Result<()> {
    let config = Config::load(&opts.config_file)?;
    let tags = collect_service_tags(
        &opts.service_tags,
        opts.input_file.as_deref(),
        opts.separator.as_deref(),
    )?;

    if tags.is_empty() {
        warn!("No valid service tags to look up");
    }
    info!(
        tags = tags.len(),
        driver = config.driver_type.name(),
        database = %config.database_path,
        cache = opts.use_cache,
        "Starting lookup"
    );

    let mut cache = select_cache(&config, opts.use_cache);
    let report = match Lookup::new(|| Ok(DellLookuper::new(&config)))
        .run(&tags, cache.as_mut(), print_event)
        .await
    {
        Ok(report) => report,
        Err(failure) => {
            error!(
                error = %failure.error,
                resolved = failure.partial.devices.len(),
                "Lookup aborted, partial results discarded"
            );
            return Err(failure.into());
        }
    };

    if let Some(path) = &opts.output_file {
        export::save_devices(path, &report.devices, opts.output_file_type, opts.include_header)?;
        info!(path = %path.display(), rows = report.devices.len(), "Results written");
    }

    Ok(())
}
