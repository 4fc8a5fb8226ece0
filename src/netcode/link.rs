//! Seeded unreliable channel for exercising the reconciliation loop

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Delivery characteristics of a `LossyLink`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    /// Probability a message is lost
    pub drop_chance: f64,
    /// Probability a delivered message arrives twice
    pub duplicate_chance: f64,
    /// Latency bounds in ticks, inclusive
    pub min_latency: u32,
    pub max_latency: u32,
}

impl LinkConfig {
    pub fn reliable(latency: u32) -> Self {
        Self {
            drop_chance: 0.0,
            duplicate_chance: 0.0,
            min_latency: latency,
            max_latency: latency,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drop_chance: 0.1,
            duplicate_chance: 0.05,
            min_latency: 2,
            max_latency: 8,
        }
    }
}

#[derive(Debug, Clone)]
struct InFlight<T> {
    deliver_at: u64,
    seq: u64,
    message: T,
}

/// One-way channel that drops, duplicates and reorders messages
#[derive(Debug, Clone)]
pub struct LossyLink<T> {
    rng: ChaCha8Rng,
    config: LinkConfig,
    in_flight: Vec<InFlight<T>>,
    now: u64,
    next_seq: u64,
    sent: u64,
    dropped: u64,
}

impl<T: Clone> LossyLink<T> {
    pub fn new(seed: u64, config: LinkConfig) -> Self {
        let config = LinkConfig {
            drop_chance: config.drop_chance.clamp(0.0, 1.0),
            duplicate_chance: config.duplicate_chance.clamp(0.0, 1.0),
            min_latency: config.min_latency.min(config.max_latency),
            max_latency: config.max_latency.max(config.min_latency),
        };
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
            in_flight: Vec::new(),
            now: 0,
            next_seq: 0,
            sent: 0,
            dropped: 0,
        }
    }

    pub fn send(&mut self, message: T) {
        self.sent += 1;
        if self.rng.gen_bool(self.config.drop_chance) {
            self.dropped += 1;
            return;
        }

        let copies = if self.rng.gen_bool(self.config.duplicate_chance) { 2 } else { 1 };
        for _ in 0..copies {
            let latency = self.rng.gen_range(self.config.min_latency..=self.config.max_latency);
            let seq = self.next_seq;
            self.next_seq += 1;
            self.in_flight.push(InFlight {
                deliver_at: self.now + latency as u64,
                seq,
                message: message.clone(),
            });
        }
    }

    /// Move one tick forward and return whatever arrives
    pub fn advance(&mut self) -> Vec<T> {
        self.now += 1;
        let now = self.now;
        self.take(|m| m.deliver_at <= now)
    }

    /// Deliver everything still in flight
    pub fn drain(&mut self) -> Vec<T> {
        self.take(|_| true)
    }

    fn take(&mut self, ready: impl Fn(&InFlight<T>) -> bool) -> Vec<T> {
        let (mut arrived, waiting): (Vec<_>, Vec<_>) = self.in_flight.drain(..).partition(|m| ready(m));
        self.in_flight = waiting;
        arrived.sort_by_key(|m| (m.deliver_at, m.seq));
        arrived.into_iter().map(|m| m.message).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
