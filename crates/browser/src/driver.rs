//! WebDriver executable lifecycle.
//!
//! Spawns the driver for the configured engine on a free local port and
//! builds the capabilities that carry the user's browser flags.

use dell_lookup_core::{DriverType, Error, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::wait::BoundedWait;
use crate::webdriver;

const DRIVER_READY_TIMEOUT: Duration = Duration::from_secs(15);

/// A running driver executable. Killed on drop if not stopped explicitly.
pub struct DriverProcess {
    child: Child,
    port: u16,
    driver_type: DriverType,
}

impl DriverProcess {
    pub async fn launch(driver_type: DriverType, executable: &Path) -> Result<Self> {
        let port = find_free_port().await?;
        let args = port_args(driver_type, port);

        info!(
            driver = driver_type.name(),
            executable = %executable.display(),
            port,
            "Launching WebDriver"
        );

        let child = Command::new(executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Browser(format!(
                    "Failed to launch {} driver {}: {}",
                    driver_type,
                    executable.display(),
                    e
                ))
            })?;

        let process = Self {
            child,
            port,
            driver_type,
        };
        let base_url = process.base_url();

        BoundedWait::new(DRIVER_READY_TIMEOUT)
            .poll_every(Duration::from_millis(200))
            .until("WebDriver ready", || {
                let base_url = base_url.clone();
                async move { Ok(webdriver::driver_ready(&base_url).await.then_some(())) }
            })
            .await?;

        debug!(driver = driver_type.name(), port, "WebDriver ready");
        Ok(process)
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .map_err(|e| Error::Browser(format!("Failed to stop {} driver: {}", self.driver_type, e)))?;
        debug!(driver = self.driver_type.name(), "WebDriver stopped");
        Ok(())
    }
}

fn port_args(driver_type: DriverType, port: u16) -> Vec<String> {
    match driver_type {
        DriverType::Chrome | DriverType::Edge => vec![format!("--port={}", port)],
        DriverType::Firefox | DriverType::Safari => vec!["--port".to_string(), port.to_string()],
    }
}

/// W3C capabilities for `driver_type`, carrying the configured browser flags.
pub fn capabilities(driver_type: DriverType, options: &[String]) -> Value {
    match driver_type {
        DriverType::Chrome => json!({
            "browserName": "chrome",
            "goog:chromeOptions": { "args": options },
        }),
        DriverType::Edge => json!({
            "browserName": "MicrosoftEdge",
            "ms:edgeOptions": { "args": options },
        }),
        DriverType::Firefox => json!({
            "browserName": "firefox",
            "moz:firefoxOptions": { "args": options },
        }),
        DriverType::Safari => {
            if !options.is_empty() {
                warn!(count = options.len(), "Safari accepts no launch flags, ignoring driver_options");
            }
            json!({ "browserName": "safari" })
        }
    }
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| Error::Browser(format!("Failed to bind to find free port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::Browser(format!("Failed to get local addr: {}", e)))?
        .port();
    drop(listener);
    Ok(port)
}
