//! Visualizer configuration.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use meldvis_geom::{CanvasSize, DEFAULT_EASE_RATE};

use crate::error::{Error, Result};
use crate::playback::DEFAULT_STEP_PACING;
use crate::scene::{DEFAULT_CANVAS, DEFAULT_EDGE_SPACING};
use crate::scheduler::{DEFAULT_ARC_HEIGHT, DEFAULT_FLIGHT_STEPS, DEFAULT_MIN_INTERVAL};
use crate::trail::DEFAULT_GLOBAL_CAPACITY;

/// Default address of the runtime's visualization socket.
pub const DEFAULT_RUNTIME_URL: &str = "ws://127.0.0.1:1234";
/// Default address presentation clients connect to.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8090";
/// Fixed delay between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(2);
/// Redraw tick period (about 30 frames per second).
pub const DEFAULT_TICK: Duration = Duration::from_millis(33);

/// Configuration for a visualizer session and its host.
#[derive(Debug, Clone, PartialEq)]
pub struct VisConfig {
    /// WebSocket URL of the runtime
    pub runtime_url: String,

    /// HTTP/WebSocket listen address for presentation clients
    pub listen_addr: SocketAddr,

    /// Capacity of the global event log
    pub log_capacity: usize,

    /// Minimum spacing between flights on one node pair
    pub flight_interval: Duration,

    /// Delay before the automatic advance in continuous mode
    pub step_pacing: Duration,

    /// Redraw ticks per flight
    pub flight_steps: u32,

    /// Peak lift of the flight arc in pixels
    pub arc_height: f64,

    /// Viewport easing rate per tick
    pub ease_rate: f64,

    /// Pixel spacing between parallel edges
    pub edge_spacing: f64,

    pub reconnect_interval: Duration,

    pub tick: Duration,

    pub canvas: CanvasSize,
}

impl Default for VisConfig {
    fn default() -> Self {
        Self {
            runtime_url: DEFAULT_RUNTIME_URL.to_string(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8090)),
            log_capacity: DEFAULT_GLOBAL_CAPACITY,
            flight_interval: DEFAULT_MIN_INTERVAL,
            step_pacing: DEFAULT_STEP_PACING,
            flight_steps: DEFAULT_FLIGHT_STEPS,
            arc_height: DEFAULT_ARC_HEIGHT,
            ease_rate: DEFAULT_EASE_RATE,
            edge_spacing: DEFAULT_EDGE_SPACING,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            tick: DEFAULT_TICK,
            canvas: DEFAULT_CANVAS,
        }
    }
}

impl VisConfig {
    /// Read `MELDVIS_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Missing keys keep their default;
    /// present but unparsable values are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| lookup(&format!("MELDVIS_{name}"));

        if let Some(url) = get("RUNTIME_URL") {
            config.runtime_url = url;
        }
        if let Some(addr) = get("LISTEN_ADDR") {
            config.listen_addr = parse("LISTEN_ADDR", &addr)?;
        }
        if let Some(v) = get("LOG_CAPACITY") {
            config.log_capacity = parse("LOG_CAPACITY", &v)?;
        }
        if let Some(v) = get("FLIGHT_INTERVAL_MS") {
            config.flight_interval = millis("FLIGHT_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("STEP_PACING_MS") {
            config.step_pacing = millis("STEP_PACING_MS", &v)?;
        }
        if let Some(v) = get("FLIGHT_STEPS") {
            config.flight_steps = parse("FLIGHT_STEPS", &v)?;
        }
        if let Some(v) = get("ARC_HEIGHT") {
            config.arc_height = parse("ARC_HEIGHT", &v)?;
        }
        if let Some(v) = get("EASE_RATE") {
            config.ease_rate = parse("EASE_RATE", &v)?;
        }
        if let Some(v) = get("EDGE_SPACING") {
            config.edge_spacing = parse("EDGE_SPACING", &v)?;
        }
        if let Some(v) = get("RECONNECT_MS") {
            config.reconnect_interval = millis("RECONNECT_MS", &v)?;
        }
        if let Some(v) = get("TICK_MS") {
            config.tick = millis("TICK_MS", &v)?;
        }
        if let Some(v) = get("CANVAS_WIDTH") {
            config.canvas.width = parse("CANVAS_WIDTH", &v)?;
        }
        if let Some(v) = get("CANVAS_HEIGHT") {
            config.canvas.height = parse("CANVAS_HEIGHT", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tick.is_zero() {
            return Err(Error::Config("MELDVIS_TICK_MS must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.ease_rate) {
            return Err(Error::Config(format!(
                "MELDVIS_EASE_RATE must be within [0, 1], got {}",
                self.ease_rate
            )));
        }
        if self.canvas.width <= 0.0 || self.canvas.height <= 0.0 {
            return Err(Error::Config("canvas dimensions must be positive".into()));
        }
        Ok(())
    }
}

fn parse<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid MELDVIS_{name} {raw:?}: {e}")))
}

fn millis(name: &str, raw: &str) -> Result<Duration> {
    parse::<u64>(name, raw).map(Duration::from_millis)
}
