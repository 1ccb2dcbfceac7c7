//! Map rendering surface.
//!
//! A tracking session publishes what the user should see through a
//! [`MapSurface`]. The surface is injected, so tests can record calls and the
//! CLI can print them.

use tracing::{debug, info};

use crate::config::MarkerConfig;
use crate::fix::Coordinates;

/// Visual style of the direction marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    /// Marker scale factor.
    pub scale: f64,
    /// Fill color as `#RRGGBB`.
    pub fill_color: String,
    /// Stroke color as `#RRGGBB`.
    pub stroke_color: String,
    /// Stroke width in pixels.
    pub stroke_weight: u32,
}

impl MarkerStyle {
    /// Style used when the marker is first placed.
    #[must_use]
    pub fn initial(config: &MarkerConfig) -> Self {
        Self::with_scale(config, config.initial_scale)
    }

    /// Style used while the marker follows live fixes.
    #[must_use]
    pub fn tracking(config: &MarkerConfig) -> Self {
        Self::with_scale(config, config.tracking_scale)
    }

    fn with_scale(config: &MarkerConfig, scale: f64) -> Self {
        Self {
            scale,
            fill_color: config.fill_color.clone(),
            stroke_color: config.stroke_color.clone(),
            stroke_weight: config.stroke_weight,
        }
    }
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self::tracking(&MarkerConfig::default())
    }
}

/// A surface that renders the user's position.
pub trait MapSurface: Send {
    /// Center the view on a position.
    fn set_center(&mut self, center: Coordinates);

    /// Set the zoom level.
    fn set_zoom(&mut self, zoom: u8);

    /// Place the direction marker, or move it if already placed.
    fn place_or_move_marker(&mut self, position: Coordinates, heading_degrees: f64, style: &MarkerStyle);

    /// Draw the accuracy circle around a position.
    fn draw_accuracy_circle(&mut self, center: Coordinates, radius_meters: f64);
}

/// The current state of a rendered view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapView {
    /// Where the view is centered.
    pub center: Option<Coordinates>,
    /// The current zoom level.
    pub zoom: Option<u8>,
    /// Marker position and heading, if placed.
    pub marker: Option<(Coordinates, f64)>,
    /// Accuracy circle center and radius, if drawn.
    pub accuracy_circle: Option<(Coordinates, f64)>,
}

/// A map surface that logs every rendering call and keeps the latest view.
#[derive(Debug, Default)]
pub struct ConsoleMap {
    view: MapView,
    echo: bool,
}

impl ConsoleMap {
    /// Create a surface that only logs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a surface that also prints marker updates to stdout.
    #[must_use]
    pub fn echoing() -> Self {
        Self {
            view: MapView::default(),
            echo: true,
        }
    }

    /// The latest view.
    #[must_use]
    pub fn view(&self) -> &MapView {
        &self.view
    }
}

impl MapSurface for ConsoleMap {
    fn set_center(&mut self, center: Coordinates) {
        debug!(%center, "Map centered");
        self.view.center = Some(center);
    }

    fn set_zoom(&mut self, zoom: u8) {
        debug!(zoom, "Map zoom set");
        self.view.zoom = Some(zoom);
    }

    fn place_or_move_marker(&mut self, position: Coordinates, heading_degrees: f64, style: &MarkerStyle) {
        info!(
            %position,
            heading = format!("{heading_degrees:.1}"),
            scale = style.scale,
            "Marker updated"
        );
        if self.echo {
            println!("{position}  heading {heading_degrees:>7.1}°");
        }
        self.view.marker = Some((position, heading_degrees));
    }

    fn draw_accuracy_circle(&mut self, center: Coordinates, radius_meters: f64) {
        debug!(%center, radius_meters, "Accuracy circle drawn");
        self.view.accuracy_circle = Some((center, radius_meters));
    }
}
