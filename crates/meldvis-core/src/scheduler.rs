//! Animation Scheduler: message-flight debounce and in-flight glyphs.
//!
//! Every `tuple_send` between two distinct nodes becomes exactly one flight.
//! Flights on the same `(from, to)` lane are spaced at least `min_interval`
//! apart: a send that arrives too soon reserves the next free slot, counted
//! from the last fired or reserved slot, and waits in the lane's FIFO until
//! [`FlightScheduler::poll`] reaches it. Only the head of each lane is ever
//! due next, so there is one outstanding timer per lane. A head that fires
//! late pushes the rest of its lane back, so the spacing holds between
//! actual launches and not only between reserved slots.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use meldvis_geom::{arc_lift, Point};
use serde::Serialize;

use crate::ids::RuntimeNodeId;

/// Minimum spacing between flights on one lane.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);
/// Redraw ticks a flight takes from source to destination.
pub const DEFAULT_FLIGHT_STEPS: u32 = 40;
/// Peak downward lift of the flight arc, in pixels.
pub const DEFAULT_ARC_HEIGHT: f64 = 30.0;

/// Debounce key: ordered node pair.
pub type Fingerprint = (RuntimeNodeId, RuntimeNodeId);

/// Payload of one send event.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightRequest {
    pub from: RuntimeNodeId,
    pub to: RuntimeNodeId,
    /// Text drawn next to the glyph.
    pub label: String,
}

/// A glyph travelling between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Flight {
    pub from: RuntimeNodeId,
    pub to: RuntimeNodeId,
    pub label: String,
    /// When the glyph was launched.
    pub fired_at: Instant,
    step: u32,
    total: u32,
}

impl Flight {
    /// Progress along the path (0.0 = source, 1.0 = destination).
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        f64::from(self.step) / f64::from(self.total)
    }

    pub fn arrived(&self) -> bool {
        self.step >= self.total
    }

    /// Screen position between `src` and `dst`, lifted by the arc.
    pub fn position(&self, src: Point, dst: Point, arc_height: f64) -> Point {
        let t = self.progress();
        src.lerp(dst, t) + Point::new(0.0, arc_lift(t, arc_height))
    }
}

/// What happened to a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// A flight started immediately.
    Fired,
    /// A flight will start at the reserved slot.
    Deferred { at: Instant },
    /// Source and destination coincide; nothing is animated.
    SelfLoop,
}

/// Scheduler counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlightStats {
    pub fired: u64,
    pub deferred: u64,
    pub self_loops: u64,
    pub completed: u64,
}

#[derive(Debug)]
struct Lane {
    last_slot: Instant,
    queue: VecDeque<(Instant, FlightRequest)>,
}

/// Owns the per-lane slot table and the list of active flights.
#[derive(Debug)]
pub struct FlightScheduler {
    min_interval: Duration,
    steps: u32,
    lanes: HashMap<Fingerprint, Lane>,
    flights: Vec<Flight>,
    stats: FlightStats,
}

impl Default for FlightScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL, DEFAULT_FLIGHT_STEPS)
    }
}

impl FlightScheduler {
    pub fn new(min_interval: Duration, steps: u32) -> Self {
        Self {
            min_interval,
            steps,
            lanes: HashMap::new(),
            flights: Vec::new(),
            stats: FlightStats::default(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Handle a send event observed at `now`.
    pub fn request(&mut self, request: FlightRequest, now: Instant) -> SendOutcome {
        if request.from == request.to {
            self.stats.self_loops += 1;
            return SendOutcome::SelfLoop;
        }

        let key = (request.from, request.to);
        // Keep the lane FIFO: anything already due goes first.
        self.fire_due_in_lane(key, now);

        let interval = self.min_interval;
        match self.lanes.get_mut(&key) {
            Some(lane) if now < lane.last_slot + interval => {
                let at = lane.last_slot + interval;
                lane.last_slot = at;
                lane.queue.push_back((at, request));
                self.stats.deferred += 1;
                SendOutcome::Deferred { at }
            }
            Some(lane) => {
                lane.last_slot = now;
                self.launch(request, now);
                SendOutcome::Fired
            }
            None => {
                self.lanes.insert(
                    key,
                    Lane {
                        last_slot: now,
                        queue: VecDeque::new(),
                    },
                );
                self.launch(request, now);
                SendOutcome::Fired
            }
        }
    }

    /// Fire the head of every lane whose slot is at or before `now`.
    /// Returns how many fired.
    pub fn poll(&mut self, now: Instant) -> usize {
        let keys: Vec<Fingerprint> = self
            .lanes
            .iter()
            .filter(|(_, lane)| lane.queue.front().is_some_and(|(at, _)| *at <= now))
            .map(|(k, _)| *k)
            .collect();
        keys.into_iter()
            .map(|key| self.fire_due_in_lane(key, now))
            .sum()
    }

    fn fire_due_in_lane(&mut self, key: Fingerprint, now: Instant) -> usize {
        let interval = self.min_interval;
        let Some(lane) = self.lanes.get_mut(&key) else {
            return 0;
        };
        if !lane.queue.front().is_some_and(|(at, _)| *at <= now) {
            return 0;
        }
        let Some((_, request)) = lane.queue.pop_front() else {
            return 0;
        };

        let mut slot = now;
        for (at, _) in lane.queue.iter_mut() {
            slot = (*at).max(slot + interval);
            *at = slot;
        }
        lane.last_slot = slot;
        self.launch(request, now);
        1
    }

    fn launch(&mut self, request: FlightRequest, at: Instant) {
        tracing::trace!(from = %request.from, to = %request.to, "flight launched");
        self.stats.fired += 1;
        self.flights.push(Flight {
            from: request.from,
            to: request.to,
            label: request.label,
            fired_at: at,
            step: 0,
            total: self.steps,
        });
    }

    /// Earliest reserved slot still waiting, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.lanes
            .values()
            .filter_map(|lane| lane.queue.front().map(|(at, _)| *at))
            .min()
    }

    /// Number of deferred flights not yet fired.
    pub fn pending(&self) -> usize {
        self.lanes.values().map(|lane| lane.queue.len()).sum()
    }

    /// Advance every active flight by one tick and drop the ones that
    /// arrived. Returns how many arrived.
    pub fn advance(&mut self) -> usize {
        for flight in &mut self.flights {
            flight.step = flight.step.saturating_add(1);
        }
        let before = self.flights.len();
        self.flights.retain(|f| !f.arrived());
        let arrived = before - self.flights.len();
        self.stats.completed += arrived as u64;
        arrived
    }

    /// Active flights in launch order.
    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    pub fn stats(&self) -> FlightStats {
        self.stats
    }

    /// Forget every lane and active flight.
    pub fn reset(&mut self) {
        self.lanes.clear();
        self.flights.clear();
    }
}
