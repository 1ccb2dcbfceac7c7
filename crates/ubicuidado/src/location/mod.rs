//! Platform-agnostic geolocation abstraction.
//!
//! This module defines the provider trait a tracking session is built on,
//! along with the options, errors and watch handles shared by every provider.

pub mod replay;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::fix::PositionFix;

pub use replay::{ReplayProvider, Sample};

/// Errors a geolocation provider can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user or platform refused access to the location.
    #[error("permission denied")]
    PermissionDenied,

    /// No position could be determined.
    #[error("position unavailable")]
    PositionUnavailable,

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The platform has no location support at all.
    #[error("geolocation is not supported on this platform")]
    Unsupported,

    /// Any other provider failure.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl LocationError {
    /// The short, user-facing message for this error.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission denied",
            Self::PositionUnavailable => "position unavailable",
            Self::Timeout => "request timed out",
            Self::Unsupported => "geolocation is not supported on this platform",
            Self::Unknown(_) => "unknown error",
        }
    }
}

/// Acquisition options shared by one-shot and continuous requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOptions {
    /// Ask the provider for its most accurate source.
    pub high_accuracy: bool,

    /// Maximum age of a cached fix the provider may return, in milliseconds.
    pub max_fix_age_ms: u64,

    /// Maximum time to wait for a fix, in milliseconds.
    pub timeout_ms: u64,
}

impl FixOptions {
    /// The timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            max_fix_age_ms: 10_000,
            timeout_ms: 5_000,
        }
    }
}

/// A handle identifying one continuous watch.
///
/// Clones share the same cancellation flag, so a provider task and the
/// session that owns the watch observe cancellation at the same moment.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl WatchHandle {
    /// Create a live handle with the given id.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The watch id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark the watch as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if the watch has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One sample delivered by a continuous watch.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    /// Id of the watch that produced this sample.
    pub watch_id: u64,
    /// The sample itself.
    pub result: Result<PositionFix, LocationError>,
}

/// A started continuous watch: its handle plus the stream of samples.
#[derive(Debug)]
pub struct Watch {
    /// Handle used to cancel the watch.
    pub handle: WatchHandle,
    /// Samples in the order the provider produced them.
    pub events: mpsc::Receiver<WatchEvent>,
}

/// A source of device positions.
///
/// Implementors wrap a concrete positioning backend. `watch` produces an
/// infinite (or provider-terminated) stream that cannot be restarted; a new
/// stream requires a new call.
#[async_trait::async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// The name of this provider (for logging).
    fn name(&self) -> &'static str;

    /// Whether the platform supports location acquisition at all.
    fn is_supported(&self) -> bool;

    /// Request a single fix.
    ///
    /// # Errors
    ///
    /// Returns the provider's failure for this request.
    async fn current_fix(&self, options: &FixOptions) -> Result<PositionFix, LocationError>;

    /// Begin continuous observation.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch cannot be started.
    fn watch(&self, options: &FixOptions) -> Result<Watch, LocationError>;

    /// Cancel a watch previously returned by [`GeolocationProvider::watch`].
    fn cancel(&self, handle: &WatchHandle);
}

/// A provider for platforms with no positioning source.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedProvider;

#[async_trait::async_trait]
impl GeolocationProvider for UnsupportedProvider {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn is_supported(&self) -> bool {
        false
    }

    async fn current_fix(&self, _options: &FixOptions) -> Result<PositionFix, LocationError> {
        Err(LocationError::Unsupported)
    }

    fn watch(&self, _options: &FixOptions) -> Result<Watch, LocationError> {
        Err(LocationError::Unsupported)
    }

    fn cancel(&self, handle: &WatchHandle) {
        handle.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(LocationError::PermissionDenied.message(), "permission denied");
        assert_eq!(
            LocationError::PositionUnavailable.message(),
            "position unavailable"
        );
        assert_eq!(LocationError::Timeout.message(), "request timed out");
        assert_eq!(
            LocationError::Unknown("sensor fault".to_string()).message(),
            "unknown error"
        );
        assert!(LocationError::Unsupported.message().contains("not supported"));
    }

    #[test]
    fn test_error_display_keeps_detail() {
        let err = LocationError::Unknown("sensor fault".to_string());
        assert!(err.to_string().contains("sensor fault"));
    }

    #[test]
    fn test_fix_options_default() {
        let options = FixOptions::default();
        assert!(options.high_accuracy);
        assert_eq!(options.timeout(), Duration::from_millis(5_000));
        assert_eq!(options.max_fix_age_ms, 10_000);
    }

    #[test]
    fn test_watch_handle_cancel() {
        let handle = WatchHandle::new(7);
        assert_eq!(handle.id(), 7);
        assert!(!handle.is_cancelled());

        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_watch_handle_clone_shares_flag() {
        let handle1 = WatchHandle::new(1);
        let handle2 = handle1.clone();

        handle1.cancel();
        assert!(handle2.is_cancelled());
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let provider = UnsupportedProvider;
        assert!(!provider.is_supported());
        assert_eq!(
            provider.current_fix(&FixOptions::default()).await,
            Err(LocationError::Unsupported)
        );
        assert!(provider.watch(&FixOptions::default()).is_err());
    }
}
