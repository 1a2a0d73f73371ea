use clap::Parser;
use std::path::PathBuf;

use crate::commands::export::OutputFileType;
use crate::commands::lookup::LookupOptions;

#[derive(Parser, Debug)]
#[command(name = "dell-lookup")]
#[command(about = "Look up Dell warranty information by service tag", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file path
    #[arg(short, long)]
    pub config_file: PathBuf,

    /// Service tags to process
    #[arg(short = 't', long, num_args = 1..)]
    pub service_tags: Vec<String>,

    /// File containing separated service tags to process
    #[arg(short, long)]
    pub input_file: Option<PathBuf>,

    /// Separator used in input file to separate service tags (default is whitespace)
    #[arg(short, long)]
    pub separator: Option<String>,

    /// Do not use previously cached results
    #[arg(long)]
    pub no_cache: bool,

    /// Path to output file
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,

    /// Type of the output file (csv - comma, tsv - tab, ssv - semicolon)
    #[arg(long, value_enum, default_value_t = OutputFileType::Csv)]
    pub output_file_type: OutputFileType,

    /// Include header in output file
    #[arg(long)]
    pub output_file_include_header: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Checks that only clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !self.config_file.is_file() {
            return Err(format!("invalid config file: {}", self.config_file.display()));
        }
        if let Some(input) = &self.input_file {
            if !input.is_file() {
                return Err(format!("invalid input file: {}", input.display()));
            }
        }
        if self.service_tags.is_empty() && self.input_file.is_none() {
            return Err("no service tags provided".to_string());
        }
        if matches!(self.separator.as_deref(), Some("")) {
            return Err("separator must not be empty".to_string());
        }
        Ok(())
    }

    pub fn into_options(self) -> LookupOptions {
        LookupOptions {
            config_file: self.config_file,
            service_tags: self.service_tags,
            input_file: self.input_file,
            separator: self.separator,
            use_cache: !self.no_cache,
            output_file: self.output_file,
            output_file_type: self.output_file_type,
            include_header: self.output_file_include_header,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, String) {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yml");
        std::fs::write(&config, "driver_type: chrome\n").unwrap();
        let config = config.display().to_string();
        (dir, config)
    }

    #[test]
    fn test_parses_full_command_line() {
        let (_dir, config) = fixture();
        let cli = Cli::try_parse_from([
            "dell-lookup",
            "-c",
            &config,
            "-t",
            "ABC1234",
            "xyz9876",
            "--no-cache",
            "-o",
            "out.tsv",
            "--output-file-type",
            "tsv",
            "--output-file-include-header",
        ])
        .unwrap();

        assert_eq!(cli.service_tags, vec!["ABC1234", "xyz9876"]);
        assert!(cli.no_cache);
        assert_eq!(cli.output_file_type, OutputFileType::Tsv);
        assert!(cli.validate().is_ok());

        let opts = cli.into_options();
        assert!(!opts.use_cache);
        assert!(opts.include_header);
    }

    #[test]
    fn test_defaults() {
        let (_dir, config) = fixture();
        let cli = Cli::try_parse_from(["dell-lookup", "-c", &config, "-t", "ABC1234"]).unwrap();
        assert_eq!(cli.output_file_type, OutputFileType::Csv);
        assert!(!cli.no_cache);
        assert!(!cli.output_file_include_header);
    }

    #[test]
    fn test_config_file_is_required() {
        assert!(Cli::try_parse_from(["dell-lookup", "-t", "ABC1234"]).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_inputs() {
        let (dir, config) = fixture();

        let cli = Cli::try_parse_from(["dell-lookup", "-c", &config]).unwrap();
        assert_eq!(cli.validate().unwrap_err(), "no service tags provided");

        let missing = dir.path().join("tags.txt").display().to_string();
        let cli = Cli::try_parse_from(["dell-lookup", "-c", &config, "-i", &missing]).unwrap();
        assert!(cli.validate().unwrap_err().starts_with("invalid input file"));

        let cli =
            Cli::try_parse_from(["dell-lookup", "-c", "/definitely/not.yml", "-t", "ABC1234"])
                .unwrap();
        assert!(cli.validate().unwrap_err().starts_with("invalid config file"));
    }
}
