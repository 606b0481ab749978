//! Wind widget engine.
//!
//! Subscribes heading, apparent wind and true wind paths on a [`Session`]
//! and keeps display-ready readings: angles in degrees (0-360), speeds in
//! the configured unit. True wind directions also feed a [`WindHistory`]
//! that reports the wind sector over a sliding time window.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::Value;
use signalk_core::{ConsumerId, Session};

use crate::config::{ConfigError, WindWidgetConfig, MAX_WINDOW_SECONDS};
use crate::units::{convert_value, Quantity};

/// True wind angles measured off the bow rather than from north.
const BOAT_RELATIVE_PATTERN: &str = r"angleTrue(Water|Ground)";
const DIRECTION_PATTERN: &str = r"direction";

/// How a true wind path references its angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleReference {
    /// -180..180 off the bow; the heading is added.
    Boat,
    /// 0..360 from north.
    North,
}

/// Current display values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindReadings {
    /// Heading in degrees; 0 until received.
    pub heading: f64,
    /// Apparent wind angle, 0-360 clockwise from the bow.
    pub app_wind_angle: Option<f64>,
    pub app_wind_speed: Option<f64>,
    /// True wind direction, 0-360 from north.
    pub true_wind_angle: Option<f64>,
    pub true_wind_speed: Option<f64>,
}

/// A true wind direction observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    pub timestamp: DateTime<Utc>,
    pub direction: f64,
}

/// Sliding window of true wind directions.
#[derive(Debug, Clone)]
pub struct WindHistory {
    window: Duration,
    samples: VecDeque<WindSample>,
}

impl WindHistory {
    /// Windows longer than [`MAX_WINDOW_SECONDS`] are clamped.
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window: window_duration(window_seconds),
            samples: VecDeque::new(),
        }
    }

    pub fn push(&mut self, timestamp: DateTime<Utc>, direction: f64) {
        self.samples.push_back(WindSample {
            timestamp,
            direction,
        });
    }

    /// Drop samples older than the window. Returns how many were dropped.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let before = self.samples.len();
        self.samples.retain(|sample| sample.timestamp >= cutoff);
        before - self.samples.len()
    }

    /// `(from, to)` directions bounding the window, clockwise.
    ///
    /// Directions are unwrapped around the first sample, so a sector that
    /// crosses north comes back as e.g. `(355, 5)`.
    pub fn sector(&self) -> Option<(f64, f64)> {
        let reference = self.samples.front()?.direction;
        let (low, high) = self
            .samples
            .iter()
            .map(|sample| (sample.direction - reference + 180.0).rem_euclid(360.0) - 180.0)
            .fold((0.0_f64, 0.0_f64), |(low, high), offset| {
                (low.min(offset), high.max(offset))
            });
        Some((
            (reference + low).rem_euclid(360.0),
            (reference + high).rem_euclid(360.0),
        ))
    }

    pub fn samples(&self) -> impl Iterator<Item = &WindSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug)]
struct WindState {
    readings: WindReadings,
    history: WindHistory,
}

fn window_duration(seconds: u64) -> Duration {
    Duration::seconds(seconds.min(MAX_WINDOW_SECONDS) as i64)
}

/// Add a boat-relative angle to a heading, wrapping into 0..360.
pub fn add_heading(heading: f64, angle: f64) -> f64 {
    (heading + angle).rem_euclid(360.0)
}

fn lock(state: &Mutex<WindState>) -> MutexGuard<'_, WindState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn degrees(value: Option<&Value>) -> Option<f64> {
    convert_value(Quantity::Angle, "deg", value?)
}

/// Wind widget bound to a session through five path subscriptions.
pub struct WindWidget {
    id: ConsumerId,
    config: WindWidgetConfig,
    reference: AngleReference,
    state: Arc<Mutex<WindState>>,
    started: bool,
}

impl WindWidget {
    pub fn new(config: WindWidgetConfig) -> Result<Self, ConfigError> {
        Self::with_id(ConsumerId::new(), config)
    }

    pub fn with_id(id: ConsumerId, config: WindWidgetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let reference = Self::classify_true_angle(&config.true_wind_angle_path)?;
        let history = WindHistory::new(config.wind_sector_window_seconds);
        Ok(Self {
            id,
            config,
            reference,
            state: Arc::new(Mutex::new(WindState {
                readings: WindReadings::default(),
                history,
            })),
            started: false,
        })
    }

    /// Decide how a true wind path references its angle.
    ///
    /// Paths that match neither pattern are taken as north referenced.
    pub fn classify_true_angle(path: &str) -> Result<AngleReference, ConfigError> {
        let boat_relative = Regex::new(BOAT_RELATIVE_PATTERN)?;
        let direction = Regex::new(DIRECTION_PATTERN)?;
        if boat_relative.is_match(path) {
            Ok(AngleReference::Boat)
        } else {
            if !direction.is_match(path) {
                tracing::debug!("True wind path {} has no known reference, using north", path);
            }
            Ok(AngleReference::North)
        }
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn config(&self) -> &WindWidgetConfig {
        &self.config
    }

    pub fn reference(&self) -> AngleReference {
        self.reference
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Subscribe all five paths. Starting twice resubscribes.
    pub fn start(&mut self, session: &mut Session) {
        self.stop(session);

        let state = self.state.clone();
        session.subscribe(
            self.id,
            &self.config.heading_path,
            self.config.heading_source.as_str(),
            move |value: Option<&Value>| {
                lock(&state).readings.heading = degrees(value).unwrap_or(0.0);
            },
        );

        let state = self.state.clone();
        session.subscribe(
            self.id,
            &self.config.app_wind_angle_path,
            self.config.app_wind_angle_source.as_str(),
            move |value: Option<&Value>| {
                // Port side arrives negative
                lock(&state).readings.app_wind_angle = degrees(value).map(|deg| deg.rem_euclid(360.0));
            },
        );

        let state = self.state.clone();
        let unit = self.config.unit_name.clone();
        session.subscribe(
            self.id,
            &self.config.app_wind_speed_path,
            self.config.app_wind_speed_source.as_str(),
            move |value: Option<&Value>| {
                lock(&state).readings.app_wind_speed =
                    value.and_then(|v| convert_value(Quantity::Speed, &unit, v));
            },
        );

        let state = self.state.clone();
        let reference = self.reference;
        session.subscribe(
            self.id,
            &self.config.true_wind_angle_path,
            self.config.true_wind_angle_source.as_str(),
            move |value: Option<&Value>| {
                let mut state = lock(&state);
                let Some(angle) = degrees(value) else {
                    state.readings.true_wind_angle = None;
                    return;
                };
                let direction = match reference {
                    AngleReference::Boat => add_heading(state.readings.heading, angle),
                    AngleReference::North => angle,
                };
                state.readings.true_wind_angle = Some(direction);
                state.history.push(Utc::now(), direction);
            },
        );

        let state = self.state.clone();
        let unit = self.config.unit_name.clone();
        session.subscribe(
            self.id,
            &self.config.true_wind_speed_path,
            self.config.true_wind_speed_source.as_str(),
            move |value: Option<&Value>| {
                lock(&state).readings.true_wind_speed =
                    value.and_then(|v| convert_value(Quantity::Speed, &unit, v));
            },
        );

        self.started = true;
        tracing::debug!("Wind widget {} started", self.id);
    }

    /// Unsubscribe every path this widget observes.
    pub fn stop(&mut self, session: &mut Session) {
        if !self.started {
            return;
        }
        for (path, _) in self.config.paths() {
            session.unsubscribe(self.id, path);
        }
        self.started = false;
        tracing::debug!("Wind widget {} stopped", self.id);
    }

    /// Swap in new settings; a running widget resubscribes.
    pub fn reconfigure(
        &mut self,
        session: &mut Session,
        config: WindWidgetConfig,
    ) -> Result<(), ConfigError> {
        config.validate()?;
        let reference = Self::classify_true_angle(&config.true_wind_angle_path)?;
        let was_started = self.started;
        self.stop(session);

        {
            let mut state = lock(&self.state);
            state.history.window = window_duration(config.wind_sector_window_seconds);
        }
        self.config = config;
        self.reference = reference;

        if was_started {
            self.start(session);
        }
        Ok(())
    }

    pub fn readings(&self) -> WindReadings {
        lock(&self.state).readings.clone()
    }

    /// Drop history samples older than the sector window.
    pub fn prune_history(&self, now: DateTime<Utc>) -> usize {
        lock(&self.state).history.prune(now)
    }

    pub fn sector(&self) -> Option<(f64, f64)> {
        lock(&self.state).history.sector()
    }

    pub fn history_len(&self) -> usize {
        lock(&self.state).history.len()
    }
}

impl std::fmt::Debug for WindWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindWidget")
            .field("id", &self.id)
            .field("reference", &self.reference)
            .field("started", &self.started)
            .finish()
    }
}
