//! Snapshot pacing and bandwidth bookkeeping

use serde::Serialize;

/// Decides which executed ticks get a snapshot broadcast
#[derive(Debug, Clone)]
pub struct SnapshotThrottle {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotThrottle {
    pub fn new(snapshot_interval: u32) -> Self {
        let snapshot_interval = snapshot_interval.max(1);
        Self {
            // First executed tick always goes out
            ticks_since_snapshot: snapshot_interval - 1,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (after a join or a rejected tick)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }
}

/// Snapshot traffic stats for the health endpoint and logs
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
}

impl SnapshotStats {
    pub fn record(&mut self, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;
    }

    pub fn avg_bytes(&self) -> f32 {
        if self.total_snapshots == 0 {
            0.0
        } else {
            self.total_bytes as f32 / self.total_snapshots as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sends_every_interval() {
        let mut throttle = SnapshotThrottle::new(3);
        let sent: Vec<bool> = (0..7).map(|_| throttle.should_send()).collect();
        assert_eq!(sent, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_force_next() {
        let mut throttle = SnapshotThrottle::new(4);
        throttle.should_send();
        throttle.force_next();
        assert!(throttle.should_send());
        assert!(!throttle.should_send());
    }

    #[test]
    fn test_interval_of_one_sends_every_tick() {
        let mut throttle = SnapshotThrottle::new(0);
        assert!((0..5).all(|_| throttle.should_send()));
    }

    #[test]
    fn test_stats_average() {
        let mut stats = SnapshotStats::default();
        assert_eq!(stats.avg_bytes(), 0.0);
        stats.record(80);
        stats.record(90);
        assert_eq!(stats.total_snapshots, 2);
        assert_eq!(stats.avg_bytes(), 85.0);
    }
}
