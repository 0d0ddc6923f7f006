use crate::adb::tracker::ServerRestartHook;
use crate::adb::transport::Endpoint;
use crate::error::{AdbError, Result};
use log::*;
use std::net::{TcpStream, ToSocketAddrs};
use std::process::Command;
use std::thread;
use std::time::Duration;

const SERVER_START_DELAY: Duration = Duration::from_secs(1);
const SERVER_STOP_DELAY: Duration = Duration::from_millis(500);
const SERVER_CHECK_TIMEOUT: Duration = Duration::from_millis(500);

/// Local `adb` server process management, through the `adb` executable
#[derive(Debug, Clone)]
pub struct AdbServer {
    adb_path: String,
    endpoint: Endpoint,
}

impl AdbServer {
    pub fn new(adb_path: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            adb_path: adb_path.into(),
            endpoint,
        }
    }

    pub fn adb_path(&self) -> &str {
        &self.adb_path
    }

    fn run(&self, action: &str) -> Result<()> {
        let port = self.endpoint.port.to_string();
        debug!("Running {} -P {} {}", self.adb_path, port, action);

        let output = Command::new(&self.adb_path)
            .args(["-P", &port, action])
            .output()
            .map_err(|e| AdbError::Server(format!("Failed to execute adb command: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::Server(format!(
                "adb {} failed: {}",
                action,
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Start the ADB server
    pub fn start(&self) -> Result<()> {
        info!("Starting ADB server on port {}", self.endpoint.port);
        self.run("start-server")?;
        info!("ADB server started successfully");

        // Give the server time to fully start
        thread::sleep(SERVER_START_DELAY);
        Ok(())
    }

    /// Stop the ADB server
    pub fn stop(&self) -> Result<()> {
        info!("Stopping ADB server on port {}", self.endpoint.port);
        self.run("kill-server")?;
        info!("ADB server stopped successfully");
        Ok(())
    }

    pub fn restart(&self) -> Result<()> {
        // kill-server fails when nothing is running; that is fine here.
        if let Err(e) = self.stop() {
            debug!("Ignoring stop failure during restart: {}", e);
        }
        thread::sleep(SERVER_STOP_DELAY);
        self.start()
    }

    /// Check if something accepts connections on the server endpoint
    pub fn is_running(&self) -> bool {
        let address = self.endpoint.to_string();
        let reachable = address
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .map(|addr| TcpStream::connect_timeout(&addr, SERVER_CHECK_TIMEOUT).is_ok())
            .unwrap_or(false);

        if reachable {
            debug!("ADB server is running at {}", address);
        } else {
            debug!("ADB server is not running at {}", address);
        }
        reachable
    }
}

impl ServerRestartHook for AdbServer {
    fn restart_server(&self) -> bool {
        match self.restart() {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_is_running_probes_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = AdbServer::new("adb", Endpoint::new("127.0.0.1", port));
        assert!(server.is_running());

        drop(listener);
        assert!(!server.is_running());
    }

    #[test]
    fn test_missing_executable_is_server_error() {
        let server = AdbServer::new("/nonexistent/adb-binary", Endpoint::default());
        assert!(matches!(server.start(), Err(AdbError::Server(_))));
        assert!(!server.restart_server());
    }
}
