//! Observability and Metrics
//!
//! Atomic counters for connection, handshake and packet activity. One
//! [`Metrics`] instance is shared through `Arc` by the server, its connections
//! and its session gate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct Metrics {
    /// Total connections established
    pub connections_total: AtomicU64,
    /// Currently active connections
    pub connections_active: AtomicU64,
    /// Sockets closed at accept because the server was full
    pub rejected_connections: AtomicU64,
    /// Hello packets accepted
    pub handshakes_success: AtomicU64,
    /// Connections dropped for sending something other than hello first
    pub handshakes_failed: AtomicU64,
    /// Connections dropped by the hello timer
    pub hello_timeouts: AtomicU64,
    /// Total packets sent
    pub packets_sent: AtomicU64,
    /// Total packets received
    pub packets_received: AtomicU64,
    /// Payload bytes sent
    pub bytes_sent: AtomicU64,
    /// Payload bytes received
    pub bytes_received: AtomicU64,
    /// Receive loops ended by a decode, token or registry failure
    pub decode_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            handshakes_success: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            hello_timeouts: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_success(&self) {
        self.handshakes_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hello_timeout(&self) {
        self.hello_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet sent
    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a packet received
    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            handshakes_success: self.handshakes_success.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            hello_timeouts: self.hello_timeouts.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            rejected_connections = snapshot.rejected_connections,
            handshakes_success = snapshot.handshakes_success,
            handshakes_failed = snapshot.handshakes_failed,
            hello_timeouts = snapshot.hello_timeouts,
            packets_sent = snapshot.packets_sent,
            packets_received = snapshot.packets_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            decode_errors = snapshot.decode_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Transport metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub rejected_connections: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub hello_timeouts: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub decode_errors: u64,
    pub uptime_seconds: u64,
}
