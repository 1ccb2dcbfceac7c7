//! Live location tracking session.
//!
//! A [`TrackingSession`] acquires an initial fix, follows a provider watch,
//! estimates the direction of travel from consecutive fixes and keeps a
//! [`MapSurface`] up to date. Acquisition failures are recovered locally: the
//! session shows the fallback reference point and keeps listening.
//!
//! ```text
//! Idle -> Acquiring -> Tracking <-> Error
//!                         \          /
//!                          -> Stopped (only via stop())
//! ```

mod heading;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, MapConfig, MarkerConfig};
use crate::fix::PositionFix;
use crate::location::{FixOptions, GeolocationProvider, LocationError, WatchEvent, WatchHandle};
use crate::map::{MapSurface, MarkerStyle};

pub use heading::heading_degrees;

/// Lifecycle state of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started.
    Idle,
    /// Waiting for the initial fix.
    Acquiring,
    /// Following live fixes.
    Tracking,
    /// The latest acquisition failed. Not terminal.
    Error,
    /// Torn down by `stop()`.
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Acquiring => write!(f, "acquiring"),
            Self::Tracking => write!(f, "tracking"),
            Self::Error => write!(f, "error"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// A cloneable handle used to stop a running session from another task.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    stop_requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl SessionHandle {
    /// Ask the session to stop.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Check if a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// What a session did between `start` and its end.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Fixes rendered, including the initial one.
    pub fixes_processed: u64,
    /// Acquisition failures reported.
    pub errors_seen: u64,
    /// State when the summary was taken.
    pub state: SessionState,
    /// The most recent fix.
    pub last_fix: Option<PositionFix>,
    /// The most recent heading.
    pub heading_degrees: f64,
}

enum Step {
    Event(Option<WatchEvent>),
    StopRequested,
    Shutdown,
}

/// A live location tracking session.
///
/// The session owns its provider and map surface and processes watch events
/// one at a time, so `last_fix` has a single writer.
#[derive(Debug)]
pub struct TrackingSession<P, M> {
    provider: P,
    map: M,
    options: FixOptions,
    map_config: MapConfig,
    marker_config: MarkerConfig,
    state: SessionState,
    last_fix: Option<PositionFix>,
    heading_degrees: f64,
    last_error: Option<LocationError>,
    subscription: Option<WatchHandle>,
    events: Option<mpsc::Receiver<WatchEvent>>,
    handle: SessionHandle,
    fixes_processed: u64,
    errors_seen: u64,
}

impl<P: GeolocationProvider, M: MapSurface> TrackingSession<P, M> {
    /// Create an idle session.
    #[must_use]
    pub fn new(provider: P, map: M, config: &Config) -> Self {
        Self {
            provider,
            map,
            options: config.tracking.fix_options(),
            map_config: config.map.clone(),
            marker_config: config.marker.clone(),
            state: SessionState::Idle,
            last_fix: None,
            heading_degrees: 0.0,
            last_error: None,
            subscription: None,
            events: None,
            handle: SessionHandle::default(),
            fixes_processed: 0,
            errors_seen: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The most recent fix.
    #[must_use]
    pub fn last_fix(&self) -> Option<&PositionFix> {
        self.last_fix.as_ref()
    }

    /// The most recent heading in degrees.
    #[must_use]
    pub fn heading_degrees(&self) -> f64 {
        self.heading_degrees
    }

    /// The latest acquisition failure, cleared by the next good fix.
    #[must_use]
    pub fn last_error(&self) -> Option<&LocationError> {
        self.last_error.as_ref()
    }

    /// User-facing message for the latest acquisition failure.
    #[must_use]
    pub fn error_message(&self) -> Option<&'static str> {
        self.last_error.as_ref().map(LocationError::message)
    }

    /// Whether a watch subscription is live.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// The geolocation provider.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The map surface.
    #[must_use]
    pub fn map(&self) -> &M {
        &self.map
    }

    /// A handle that can stop [`TrackingSession::run`] from another task.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Acquire the initial fix and begin continuous observation.
    ///
    /// Any existing subscription is cancelled first. Failures are not
    /// returned: they move the session to [`SessionState::Error`] and show
    /// the fallback view. Returns the resulting state.
    pub async fn start(&mut self) -> SessionState {
        if self.state == SessionState::Stopped {
            warn!("Tracking session already stopped, ignoring start");
            return self.state;
        }

        self.cancel_subscription();

        if !self.provider.is_supported() {
            self.fail(LocationError::Unsupported);
            return self.state;
        }

        self.state = SessionState::Acquiring;
        debug!(
            provider = self.provider.name(),
            timeout_ms = self.options.timeout_ms,
            "Requesting initial fix"
        );

        let initial = tokio::time::timeout(
            self.options.timeout(),
            self.provider.current_fix(&self.options),
        )
        .await
        .unwrap_or(Err(LocationError::Timeout));

        let fix = match initial {
            Ok(fix) => fix,
            Err(e) => {
                self.fail(e);
                return self.state;
            }
        };
        self.show_initial_fix(fix);

        match self.provider.watch(&self.options) {
            Ok(watch) => {
                info!(
                    provider = self.provider.name(),
                    watch_id = watch.handle.id(),
                    "Tracking started"
                );
                self.subscription = Some(watch.handle);
                self.events = Some(watch.events);
                self.state = SessionState::Tracking;
            }
            Err(e) => self.fail(e),
        }

        self.state
    }

    /// Apply one watch event.
    ///
    /// Events from a cancelled or replaced watch are ignored. Returns
    /// whether the event was applied.
    pub fn handle_event(&mut self, event: WatchEvent) -> bool {
        let live = self
            .subscription
            .as_ref()
            .is_some_and(|h| h.id() == event.watch_id && !h.is_cancelled());
        if !live {
            trace!(watch_id = event.watch_id, "Ignoring event from inactive watch");
            return false;
        }

        match event.result {
            Ok(fix) => self.follow(fix),
            Err(e) => self.fail(e),
        }
        true
    }

    /// Wait for the next event of the live watch.
    ///
    /// Returns `None` once the watch has ended or no watch is live.
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        self.events.as_mut()?.recv().await
    }

    /// Process watch events until the watch ends, a stop is requested
    /// through a [`SessionHandle`], or `shutdown` resolves. The session is
    /// stopped on return.
    pub async fn run<F>(&mut self, shutdown: F) -> SessionSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let handle = self.handle.clone();

        loop {
            if handle.is_stop_requested() {
                debug!("Stop requested");
                break;
            }
            let Some(events) = self.events.as_mut() else {
                break;
            };

            let step = tokio::select! {
                () = &mut shutdown => Step::Shutdown,
                () = handle.notified() => Step::StopRequested,
                event = events.recv() => Step::Event(event),
            };

            match step {
                Step::Event(Some(event)) => {
                    self.handle_event(event);
                }
                Step::Event(None) => {
                    debug!("Watch ended");
                    break;
                }
                Step::StopRequested => {
                    debug!("Stop requested");
                    break;
                }
                Step::Shutdown => {
                    debug!("Shutdown signalled");
                    break;
                }
            }
        }

        self.stop();
        self.summary()
    }

    /// Cancel the watch and end the session. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.cancel_subscription();
        self.state = SessionState::Stopped;
        info!(fixes = self.fixes_processed, errors = self.errors_seen, "Tracking stopped");
    }

    /// A snapshot of what the session has done so far.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            fixes_processed: self.fixes_processed,
            errors_seen: self.errors_seen,
            state: self.state,
            last_fix: self.last_fix.clone(),
            heading_degrees: self.heading_degrees,
        }
    }

    fn show_initial_fix(&mut self, fix: PositionFix) {
        let position = fix.coordinates();
        let radius = if fix.accuracy_meters > 0.0 {
            fix.accuracy_meters
        } else {
            self.map_config.default_accuracy_radius_m
        };

        debug!(%position, accuracy = fix.accuracy_meters, "Initial fix acquired");

        self.heading_degrees = 0.0;
        self.map.set_center(position);
        self.map.set_zoom(self.map_config.tracking_zoom);
        self.map
            .place_or_move_marker(position, 0.0, &MarkerStyle::initial(&self.marker_config));
        self.map.draw_accuracy_circle(position, radius);

        self.last_fix = Some(fix);
        self.last_error = None;
        self.fixes_processed += 1;
    }

    fn follow(&mut self, fix: PositionFix) {
        let heading = self
            .last_fix
            .as_ref()
            .map_or(0.0, |previous| heading_degrees(previous, &fix));
        let position = fix.coordinates();

        trace!(%position, heading, "Fix received");

        self.map
            .place_or_move_marker(position, heading, &MarkerStyle::tracking(&self.marker_config));
        self.map.set_center(position);
        if self.state == SessionState::Error {
            info!("Position recovered");
            self.map.set_zoom(self.map_config.tracking_zoom);
        }

        self.heading_degrees = heading;
        self.last_fix = Some(fix);
        self.last_error = None;
        self.state = SessionState::Tracking;
        self.fixes_processed += 1;
    }

    fn fail(&mut self, error: LocationError) {
        warn!(error = %error, "Location unavailable: {}", error.message());

        if error != LocationError::Unsupported {
            self.map.set_center(self.map_config.fallback());
            self.map.set_zoom(self.map_config.fallback_zoom);
        }

        self.last_error = Some(error);
        self.state = SessionState::Error;
        self.errors_seen += 1;
    }

    fn cancel_subscription(&mut self) {
        if let Some(handle) = self.subscription.take() {
            debug!(watch_id = handle.id(), "Cancelling watch");
            self.provider.cancel(&handle);
        }
        self.events = None;
    }
}
