use clap::ValueEnum;
use dell_lookup_core::device::format_date;
use dell_lookup_core::Device;
use std::io::Write;
use std::path::Path;

const HEADER: [&str; 5] = [
    "Type",
    "Name",
    "Service tag",
    "Warranty type",
    "Warranty expiration date",
];

/// Delimited text flavours for the results file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFileType {
    /// Comma separated
    #[default]
    Csv,
    /// Tab separated
    Tsv,
    /// Semicolon separated
    Ssv,
}

impl OutputFileType {
    pub fn delimiter(self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
            Self::Ssv => b';',
        }
    }
}

/// One row per device; missing warranty info leaves the last two cells empty.
pub fn write_devices<W: Write>(
    out: W,
    devices: &[Device],
    file_type: OutputFileType,
    include_header: bool,
) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(file_type.delimiter())
        .from_writer(out);

    if include_header {
        writer.write_record(HEADER)?;
    }

    for d in devices {
        let expiration = d
            .warranty_expiration_date()
            .map(format_date)
            .unwrap_or_default();
        writer.write_record([
            d.device_type(),
            d.name(),
            d.service_tag().as_str(),
            d.warranty_type().unwrap_or_default(),
            expiration.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_devices(
    path: &Path,
    devices: &[Device],
    file_type: OutputFileType,
    include_header: bool,
) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| anyhow::anyhow!("Failed to create output file {}: {}", path.display(), e))?;
    write_devices(file, devices, file_type, include_header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dell_lookup_core::{ServiceTag, Warranty};
    use tempfile::TempDir;

    fn devices() -> Vec<Device> {
        vec![
            Device::new(
                "laptop",
                "Latitude 5490, i7",
                ServiceTag::parse("ABC1234").unwrap(),
                Some(Warranty::new(
                    "ProSupport",
                    NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
                )),
            )
            .unwrap(),
            Device::new("other", "Dock WD19", ServiceTag::parse("XYZ9876").unwrap(), None).unwrap(),
        ]
    }

    fn render(file_type: OutputFileType, header: bool) -> String {
        let mut out = Vec::new();
        write_devices(&mut out, &devices(), file_type, header).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_csv_with_header_quotes_delimiters() {
        assert_eq!(
            render(OutputFileType::Csv, true),
            "Type,Name,Service tag,Warranty type,Warranty expiration date\n\
             laptop,\"Latitude 5490, i7\",ABC1234,ProSupport,08 Jan 2025\n\
             other,Dock WD19,XYZ9876,,\n"
        );
    }

    #[test]
    fn test_tsv_and_ssv_without_header() {
        assert_eq!(
            render(OutputFileType::Tsv, false),
            "laptop\tLatitude 5490, i7\tABC1234\tProSupport\t08 Jan 2025\n\
             other\tDock WD19\tXYZ9876\t\t\n"
        );
        assert_eq!(
            render(OutputFileType::Ssv, false),
            "laptop;Latitude 5490, i7;ABC1234;ProSupport;08 Jan 2025\n\
             other;Dock WD19;XYZ9876;;\n"
        );
    }

    #[test]
    fn test_save_devices_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        save_devices(&path, &devices(), OutputFileType::Csv, false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
