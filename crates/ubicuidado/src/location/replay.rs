//! Replay provider.
//!
//! Plays back a recorded sequence of samples, typically the track points of a
//! GPX file, as if they were live position reports. The first sample answers
//! the one-shot request; a watch emits the remaining samples at a fixed
//! interval and then ends.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{FixOptions, GeolocationProvider, LocationError, Watch, WatchEvent, WatchHandle};
use crate::error::{Error, Result};
use crate::fix::PositionFix;

/// A recorded sample: either a fix or a provider failure.
pub type Sample = std::result::Result<PositionFix, LocationError>;

/// Meters of horizontal error per unit of HDOP.
const HDOP_TO_METERS: f64 = 5.0;

/// Capacity of the watch channel.
const WATCH_CHANNEL_CAPACITY: usize = 32;

/// Replays recorded samples as a geolocation provider.
#[derive(Debug)]
pub struct ReplayProvider {
    samples: Arc<Vec<Sample>>,
    interval: Duration,
    next_watch_id: AtomicU64,
}

impl ReplayProvider {
    /// Create a provider from in-memory samples.
    #[must_use]
    pub fn new(samples: Vec<Sample>, interval: Duration) -> Self {
        Self {
            samples: Arc::new(samples),
            interval,
            next_watch_id: AtomicU64::new(1),
        }
    }

    /// Create a provider replaying the track points of a GPX file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds no track points.
    pub fn from_gpx(path: impl AsRef<Path>, interval: Duration) -> Result<Self> {
        let fixes = read_gpx(path)?;
        Ok(Self::new(fixes.into_iter().map(Ok).collect(), interval))
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[async_trait::async_trait]
impl GeolocationProvider for ReplayProvider {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn is_supported(&self) -> bool {
        true
    }

    async fn current_fix(&self, _options: &FixOptions) -> Sample {
        self.samples
            .first()
            .cloned()
            .unwrap_or(Err(LocationError::PositionUnavailable))
    }

    fn watch(&self, options: &FixOptions) -> std::result::Result<Watch, LocationError> {
        let id = self.next_watch_id.fetch_add(1, Ordering::SeqCst);
        let handle = WatchHandle::new(id);
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        debug!(
            watch_id = id,
            samples = self.samples.len().saturating_sub(1),
            interval_ms = self.interval.as_millis(),
            high_accuracy = options.high_accuracy,
            "Starting replay watch"
        );

        let samples = Arc::clone(&self.samples);
        let interval = self.interval;
        let task_handle = handle.clone();

        tokio::spawn(async move {
            let mut ticker = (!interval.is_zero()).then(|| tokio::time::interval(interval));
            // The first tick of a tokio interval completes immediately
            if let Some(t) = ticker.as_mut() {
                t.tick().await;
            }

            for sample in samples.iter().skip(1) {
                match ticker.as_mut() {
                    Some(t) => {
                        t.tick().await;
                    }
                    None => tokio::task::yield_now().await,
                }

                if task_handle.is_cancelled() {
                    trace!(watch_id = id, "Replay watch cancelled");
                    return;
                }

                let event = WatchEvent {
                    watch_id: id,
                    result: sample.clone(),
                };
                if tx.send(event).await.is_err() {
                    debug!(watch_id = id, "Watch receiver dropped, stopping replay");
                    return;
                }
            }
            debug!(watch_id = id, "Replay watch exhausted");
        });

        Ok(Watch { handle, events: rx })
    }

    fn cancel(&self, handle: &WatchHandle) {
        debug!(watch_id = handle.id(), "Cancelling replay watch");
        handle.cancel();
    }
}

/// Read all track points of a GPX file as fixes.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or parsed, or holds no
/// track points.
pub fn read_gpx(path: impl AsRef<Path>) -> Result<Vec<PositionFix>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::replay(path, e.to_string()))?;
    parse_gpx(BufReader::new(file), path)
}

/// Parse GPX content into fixes.
///
/// Points without a timestamp are placed one second after the previous
/// point. `path` is only used in error messages.
///
/// # Errors
///
/// Returns an error if the content is not valid GPX or has no track points.
pub fn parse_gpx<R: Read>(reader: R, path: &Path) -> Result<Vec<PositionFix>> {
    let gpx = gpx::read(reader).map_err(|e| Error::replay(path, e.to_string()))?;

    let mut fixes: Vec<PositionFix> = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let observed_at = point
                    .time
                    .and_then(|t| t.format().ok())
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .or_else(|| {
                        fixes
                            .last()
                            .map(|prev| prev.observed_at + chrono::Duration::seconds(1))
                    })
                    .unwrap_or_else(Utc::now);

                let position = point.point();
                let accuracy = point.hdop.map_or(0.0, |hdop| hdop * HDOP_TO_METERS);
                fixes.push(PositionFix::new(
                    position.y(),
                    position.x(),
                    accuracy,
                    observed_at,
                ));
            }
        }
    }

    if fixes.is_empty() {
        return Err(Error::replay(path, "no track points"));
    }

    debug!(points = fixes.len(), "Loaded GPX track from {}", path.display());
    Ok(fixes)
}
