use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Sentinel for an in-memory cache database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Browser engines a WebDriver executable can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverType {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl DriverType {
    pub const ALL: [DriverType; 4] = [
        DriverType::Chrome,
        DriverType::Edge,
        DriverType::Firefox,
        DriverType::Safari,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
        }
    }
}

impl FromStr for DriverType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DriverType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = DriverType::ALL.iter().map(|t| t.name()).collect();
                Error::Config(format!(
                    "driver_type should be one of the following: {}",
                    names.join(", ")
                ))
            })
    }
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the device cache lives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DatabasePath {
    #[default]
    InMemory,
    File(PathBuf),
}

impl fmt::Display for DatabasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => f.write_str(IN_MEMORY_DATABASE),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Validated tool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub driver_type: DriverType,
    pub driver_executable: PathBuf,
    pub driver_options: Vec<String>,
    pub database_path: DatabasePath,
}

/// Config file as written by the user, before validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    driver_type: Option<serde_yaml::Value>,
    driver_executable: Option<serde_yaml::Value>,
    #[serde(default)]
    driver_options: Option<serde_yaml::Value>,
    #[serde(default)]
    database_path: Option<serde_yaml::Value>,
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|h| h.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "Config path is not a valid file: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if !value.is_mapping() {
            return Err(Error::Config(
                "Invalid config file: expected a mapping of settings".to_string(),
            ));
        }
        let raw: RawConfig = serde_yaml::from_value(value)?;

        let (driver_type, driver_executable) = match (raw.driver_type, raw.driver_executable) {
            (Some(t), Some(e)) => (t, e),
            _ => {
                return Err(Error::Config(
                    "Config file does not include some of required values: driver_type, driver_executable"
                        .to_string(),
                ))
            }
        };

        Ok(Self {
            driver_type: parse_driver_type(&driver_type)?,
            driver_executable: parse_driver_executable(&driver_executable)?,
            driver_options: parse_driver_options(raw.driver_options.as_ref())?,
            database_path: parse_database_path(raw.database_path.as_ref())?,
        })
    }
}

fn parse_driver_type(value: &serde_yaml::Value) -> Result<DriverType> {
    let s = value
        .as_str()
        .ok_or_else(|| Error::Config("driver_type should be a string value".to_string()))?;
    s.parse()
}

fn parse_driver_executable(value: &serde_yaml::Value) -> Result<PathBuf> {
    let invalid = || Error::Config("driver_executable should be a valid file path".to_string());
    let path = expand_home(value.as_str().ok_or_else(invalid)?);
    if !path.is_file() {
        return Err(invalid());
    }
    Ok(path)
}

fn parse_driver_options(value: Option<&serde_yaml::Value>) -> Result<Vec<String>> {
    let seq = match value {
        None | Some(serde_yaml::Value::Null) => return Ok(Vec::new()),
        Some(serde_yaml::Value::Sequence(seq)) => seq,
        Some(_) => return Err(Error::Config("driver_options should be a list".to_string())),
    };

    seq.iter()
        .map(|v| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                Error::Config("driver_options should contain string values only".to_string())
            })
        })
        .collect()
}

fn parse_database_path(value: Option<&serde_yaml::Value>) -> Result<DatabasePath> {
    let s = match value {
        None | Some(serde_yaml::Value::Null) => return Ok(DatabasePath::InMemory),
        Some(v) => v
            .as_str()
            .ok_or_else(|| Error::Config("database_path should be a valid file path".to_string()))?,
    };
    if s == IN_MEMORY_DATABASE {
        return Ok(DatabasePath::InMemory);
    }

    let path = expand_home(s);
    if path.exists() && !path.is_file() {
        return Err(Error::Config(
            "database_path should be a valid file path".to_string(),
        ));
    }
    Ok(DatabasePath::File(path))
}
