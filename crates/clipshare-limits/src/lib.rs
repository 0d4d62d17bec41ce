//! Limits tracker (C3): per-visitor sliding-window PUT counts, plus the
//! aggregate clipboard stats the manager loop (C5) refreshes and the request
//! handler (C4) consults before accepting a new entry.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use clipshare_core::error::{Error, Result};
use clipshare_core::model::ClipboardStats;

/// Sliding window of recent PUT timestamps per source IP (spec §3
/// VisitorRecord). Kept in-memory only; restarting the server resets it.
#[derive(Default)]
struct VisitorTable {
    windows: HashMap<IpAddr, VecDeque<Instant>>,
}

impl VisitorTable {
    fn prune(&mut self, ip: IpAddr, window: Duration, now: Instant) {
        if let Some(times) = self.windows.get_mut(&ip) {
            while times.front().is_some_and(|t| now.duration_since(*t) > window) {
                times.pop_front();
            }
            if times.is_empty() {
                self.windows.remove(&ip);
            }
        }
    }

    fn count(&self, ip: IpAddr) -> usize {
        self.windows.get(&ip).map_or(0, VecDeque::len)
    }

    fn record(&mut self, ip: IpAddr, now: Instant) {
        self.windows.entry(ip).or_default().push_back(now);
    }
}

/// Process-wide shared state for C3 (visitor counts) and the aggregate
/// stats C5 publishes. One `Mutex` per piece of state, mirroring the
/// teacher's single-struct-single-owner shape but adapted for a
/// multithreaded server instead of a single-threaded TUI.
pub struct LimitsTracker {
    visitor_window: Duration,
    visitor_limit: u64,
    clipboard_count_limit: u64,
    clipboard_size_limit: u64,
    visitors: Mutex<VisitorTable>,
    stats: Mutex<ClipboardStats>,
}

impl LimitsTracker {
    pub fn new(
        visitor_window: Duration,
        visitor_limit: u64,
        clipboard_count_limit: u64,
        clipboard_size_limit: u64,
    ) -> Self {
        Self {
            visitor_window,
            visitor_limit,
            clipboard_count_limit,
            clipboard_size_limit,
            visitors: Mutex::new(VisitorTable::default()),
            stats: Mutex::new(ClipboardStats::default()),
        }
    }

    /// Checks and records one PUT from `ip` in a single critical section, so
    /// a caller never needs a separate prune-then-record round trip. Callers
    /// must only invoke this for PUTs that create a *new* id — an overwrite
    /// of an existing id by its own visitor does not consume a slot (spec
    /// §4.3).
    pub fn try_record_visitor_put(&self, ip: IpAddr) -> Result<()> {
        let now = Instant::now();
        let mut visitors = self.visitors.lock().unwrap_or_else(|e| e.into_inner());
        visitors.prune(ip, self.visitor_window, now);
        if visitors.count(ip) as u64 >= self.visitor_limit {
            return Err(Error::TooManyRequests);
        }
        visitors.record(ip, now);
        Ok(())
    }

    /// Rejects creating a new entry if it would push the aggregate count
    /// above `ClipboardCountLimit` (spec §4.3). Overwrites never call this.
    pub fn check_new_entry_count(&self) -> Result<()> {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        if stats.count >= self.clipboard_count_limit {
            return Err(Error::TooManyRequests);
        }
        Ok(())
    }

    /// Up-front headroom check described in spec §4.3: the true payload
    /// size is only known mid-stream, so this denies only when the current
    /// aggregate already leaves no room at all; the per-file cap plus the
    /// store's counting reader catch the rest while streaming.
    pub fn check_size_headroom(&self) -> Result<()> {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        if stats.total_bytes >= self.clipboard_size_limit {
            return Err(Error::PayloadTooLarge);
        }
        Ok(())
    }

    /// Replaces the published aggregate stats; called by the manager loop
    /// (C5) after each sweep.
    pub fn publish_stats(&self, stats: ClipboardStats) {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner()) = stats;
    }

    pub fn stats(&self) -> ClipboardStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }

    #[test]
    fn rejects_the_nplus1th_put_within_the_window() {
        let tracker = LimitsTracker::new(Duration::from_secs(60), 2, u64::MAX, u64::MAX);
        assert!(tracker.try_record_visitor_put(ip()).is_ok());
        assert!(tracker.try_record_visitor_put(ip()).is_ok());
        assert!(matches!(
            tracker.try_record_visitor_put(ip()).unwrap_err(),
            Error::TooManyRequests
        ));
    }

    #[test]
    fn different_visitors_have_independent_windows() {
        let tracker = LimitsTracker::new(Duration::from_secs(60), 1, u64::MAX, u64::MAX);
        let other = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert!(tracker.try_record_visitor_put(ip()).is_ok());
        assert!(tracker.try_record_visitor_put(other).is_ok());
    }

    #[test]
    fn clipboard_count_limit_rejects_once_full() {
        let tracker = LimitsTracker::new(Duration::from_secs(60), u64::MAX, 2, u64::MAX);
        tracker.publish_stats(ClipboardStats {
            count: 2,
            total_bytes: 0,
        });
        assert!(matches!(
            tracker.check_new_entry_count().unwrap_err(),
            Error::TooManyRequests
        ));
    }

    #[test]
    fn size_headroom_denies_only_when_already_full() {
        let tracker = LimitsTracker::new(Duration::from_secs(60), u64::MAX, u64::MAX, 1024);
        tracker.publish_stats(ClipboardStats {
            count: 1,
            total_bytes: 1000,
        });
        assert!(tracker.check_size_headroom().is_ok());
        tracker.publish_stats(ClipboardStats {
            count: 1,
            total_bytes: 1024,
        });
        assert!(tracker.check_size_headroom().is_err());
    }
}
