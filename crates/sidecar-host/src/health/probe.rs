//! HTTP reachability probe against the child's advertised port.

use std::time::Duration;

use thiserror::Error;

/// Errors raised when nothing answered the probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// Connecting or reading the response failed.
    #[error("'{url}' unreachable: {message}")]
    Unreachable {
        /// Probed URL.
        url: String,
        /// Transport failure description.
        message: String,
    },
}

/// Checks that something answers on the child's port.
#[cfg_attr(test, mockall::automock)]
pub trait ReadinessProbe: Send + Sync {
    /// Issues one probe and returns the HTTP status received.
    ///
    /// Any status, including 4xx and 5xx, means the child is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Unreachable`] when no HTTP response arrives.
    fn probe(&self) -> Result<u16, ProbeError>;
}

/// Blocking HTTP `GET` probe.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    /// Probes `http://{host}:{port}{path}`, bounding the request by `timeout`.
    #[must_use]
    pub fn new(host: &str, port: u16, path: &str, timeout: Duration) -> Self {
        Self {
            url: format!("http://{host}:{port}{path}"),
            timeout,
        }
    }

    /// URL requested by the probe.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl ReadinessProbe for HttpProbe {
    fn probe(&self) -> Result<u16, ProbeError> {
        match ureq::get(&self.url).timeout(self.timeout).call() {
            Ok(response) => Ok(response.status()),
            Err(ureq::Error::Status(status, _)) => Ok(status),
            Err(ureq::Error::Transport(transport)) => Err(ProbeError::Unreachable {
                url: self.url.clone(),
                message: transport.to_string(),
            }),
        }
    }
}
