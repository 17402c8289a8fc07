use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::temporal::TemporalAnchor;

/// Per-ledger timestamp source.
///
/// Each call to [`now`](Self::now) returns an anchor strictly greater than
/// the last one: the physical part is `max(wall clock, last physical)`, and
/// the logical counter increments whenever the physical part did not move.
/// A wall clock stepping backwards therefore never reorders a ledger.
pub struct HybridLogicalClock {
    last: Mutex<TemporalAnchor>,
}

impl HybridLogicalClock {
    pub fn new(node_id: u16) -> Self {
        Self {
            last: Mutex::new(TemporalAnchor::new(0, 0, node_id)),
        }
    }

    pub fn now(&self) -> TemporalAnchor {
        self.tick(wall_clock_ms())
    }

    fn tick(&self, wall_ms: u64) -> TemporalAnchor {
        // Holds plain integers; a poisoned guard is still consistent.
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        let next = if wall_ms > last.physical_ms {
            TemporalAnchor::new(wall_ms, 0, last.node_id)
        } else {
            TemporalAnchor::new(last.physical_ms, last.logical.saturating_add(1), last.node_id)
        };
        *last = next;
        next
    }
}

impl Default for HybridLogicalClock {
    fn default() -> Self {
        Self::new(0)
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
