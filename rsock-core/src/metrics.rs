//! Client performance counters.
//!
//! All counters are relaxed atomics: callers record requests from their own
//! threads while the connection driver records responses and errors, and
//! no reader needs the counters to agree with each other at an instant.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// Throughput and error counters for one client.
#[derive(Debug)]
pub struct PerformanceMetrics {
    requests: AtomicU64,
    responses: AtomicU64,
    errors: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    start: Instant,
    started_at: SystemTime,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            responses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            start: Instant::now(),
            started_at: SystemTime::now(),
        }
    }

    #[inline]
    pub fn record_request(&self, bytes_sent: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes_sent as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_response(&self, bytes_received: usize) {
        self.responses.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes_received as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn response_count(&self) -> u64 {
        self.responses.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Time since construction, from the monotonic clock.
    pub fn uptime(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.uptime().as_secs()
    }

    /// Wall-clock construction time, for reporting only.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.request_count(),
            responses: self.response_count(),
            errors: self.error_count(),
            bytes_sent: self.bytes_sent(),
            bytes_received: self.bytes_received(),
            uptime: self.uptime(),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub responses: u64,
    pub errors: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    pub fn requests_per_sec(&self) -> f64 {
        per_sec(self.requests, self.uptime)
    }

    pub fn responses_per_sec(&self) -> f64 {
        per_sec(self.responses, self.uptime)
    }

    /// Requests that have not (yet) produced a response.
    pub fn unanswered(&self) -> u64 {
        self.requests.saturating_sub(self.responses)
    }
}

fn per_sec(count: u64, uptime: Duration) -> f64 {
    let secs = uptime.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests={} responses={} errors={} sent={}B received={}B uptime={:.1}s",
            self.requests,
            self.responses,
            self.errors,
            self.bytes_sent,
            self.bytes_received,
            self.uptime.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record() {
        let metrics = PerformanceMetrics::new();
        metrics.record_request(100);
        metrics.record_request(20);
        metrics.record_response(64);
        metrics.record_error();

        let snap = metrics.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.responses, 1);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.bytes_sent, 120);
        assert_eq!(snap.bytes_received, 64);
        assert_eq!(snap.unanswered(), 1);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let metrics = Arc::new(PerformanceMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.record_request(3);
                        metrics.record_response(5);
                        metrics.record_error();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.request_count(), 8000);
        assert_eq!(metrics.response_count(), 8000);
        assert_eq!(metrics.error_count(), 8000);
        assert_eq!(metrics.bytes_sent(), 24_000);
        assert_eq!(metrics.bytes_received(), 40_000);
    }

    #[test]
    fn test_uptime_monotonic() {
        let metrics = PerformanceMetrics::new();
        let first = metrics.uptime();
        thread::sleep(Duration::from_millis(5));
        let second = metrics.uptime();
        assert!(second >= first);
        assert!(second >= Duration::from_millis(5));
    }

    #[test]
    fn test_display() {
        let snap = MetricsSnapshot {
            requests: 1,
            responses: 1,
            errors: 0,
            bytes_sent: 10,
            bytes_received: 12,
            uptime: Duration::from_secs(2),
        };
        assert_eq!(
            snap.to_string(),
            "requests=1 responses=1 errors=0 sent=10B received=12B uptime=2.0s"
        );
        assert!((snap.requests_per_sec() - 0.5).abs() < f64::EPSILON);
    }
}
