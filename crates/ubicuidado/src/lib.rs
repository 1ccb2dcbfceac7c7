//! `ubicuidado` - Live location tracking and location check-ins
//!
//! This library follows a device position from a geolocation provider,
//! renders it on a map surface with a direction marker, and keeps a durable
//! list of user check-ins tied to captured positions.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod checkin;
pub mod cli;
pub mod config;
pub mod error;
pub mod fix;
pub mod location;
pub mod logging;
pub mod map;
pub mod storage;
pub mod tracking;

pub use checkin::{time_ago, CheckinRecord, CheckinStore};
pub use config::Config;
pub use error::{Error, Result};
pub use fix::{Coordinates, PositionFix};
pub use location::{GeolocationProvider, LocationError, ReplayProvider, UnsupportedProvider};
pub use logging::init_logging;
pub use map::{ConsoleMap, MapSurface};
pub use storage::{KeyValueStore, Storage, StorageStats};
pub use tracking::{SessionState, TrackingSession};
