//! Request/answer correlation over the structured-message side channel.
//!
//! The server never answers a console command directly. It emits the report
//! on its event stream, and whoever listens there writes it into a cache. A
//! request here sends the command, then polls that cache until an entry newer
//! than the request shows up or the deadline passes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fxrunner_contracts::SYSTEM_AUTHOR;
use serde::Serialize;
use serde_json::Value;
use tokio::time::{Instant, MissedTickBehavior};

use crate::console::CommandSink;
use crate::SupervisorError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
/// Cache age accepted by non-forced resource requests.
pub const DEFAULT_RESOURCES_MAX_AGE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportKind {
    pub key: &'static str,
    pub command: &'static str,
}

impl ReportKind {
    pub const RESOURCES: ReportKind = ReportKind {
        key: "resources",
        command: "txaReportResources",
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub payload: Value,
    pub timestamp: Instant,
}

pub trait ReportCache {
    fn read(&self, kind: &ReportKind) -> Option<ReportEntry>;
}

impl<T: ReportCache + ?Sized> ReportCache for &T {
    fn read(&self, kind: &ReportKind) -> Option<ReportEntry> {
        (**self).read(kind)
    }
}

impl<T: ReportCache + ?Sized> ReportCache for Arc<T> {
    fn read(&self, kind: &ReportKind) -> Option<ReportEntry> {
        (**self).read(kind)
    }
}

/// One slot per report kind; a newer store replaces the older one.
#[derive(Debug, Default)]
pub struct MemoryReportCache {
    slots: Mutex<HashMap<&'static str, ReportEntry>>,
}

impl MemoryReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, kind: &ReportKind, payload: Value) {
        self.store_at(kind, payload, Instant::now());
    }

    pub fn store_at(&self, kind: &ReportKind, payload: Value, timestamp: Instant) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(kind.key, ReportEntry { payload, timestamp });
        }
    }

    pub fn clear(&self, kind: &ReportKind) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(kind.key);
        }
    }
}

impl ReportCache for MemoryReportCache {
    fn read(&self, kind: &ReportKind) -> Option<ReportEntry> {
        self.slots.lock().ok()?.get(kind.key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Accept a cached entry at most this old.
    Cached(Duration),
    /// Always ask the server again.
    Fresh,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Delivered(ReportEntry),
    TimedOut,
}

impl ReportOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ReportOutcome::Delivered(_))
    }

    pub fn into_resolution(self) -> ReportResolution {
        match self {
            ReportOutcome::Delivered(entry) => ReportResolution {
                success: true,
                report: Some(entry.payload),
                failure_reason: None,
            },
            ReportOutcome::TimedOut => ReportResolution {
                success: false,
                report: None,
                failure_reason: Some(
                    "timed out waiting for the server report, make sure the server is online"
                        .to_string(),
                ),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResolution {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ReportResolution {
    pub fn transport_failure(err: &SupervisorError) -> Self {
        ReportResolution {
            success: false,
            report: None,
            failure_reason: Some(err.to_string()),
        }
    }
}

/// Concurrent requests for the same kind are not merged: each one sends its
/// own command and they all watch the same cache slot.
#[derive(Debug)]
pub struct ReportCorrelator<C, S> {
    cache: C,
    sink: S,
    poll_interval: Duration,
    deadline: Duration,
    span: tracing::Span,
}

impl<C: ReportCache, S: CommandSink> ReportCorrelator<C, S> {
    pub fn new(cache: C, sink: S) -> Self {
        Self {
            cache,
            sink,
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_DEADLINE,
            span: tracing::Span::none(),
        }
    }

    /// Intervals below one millisecond are raised to one millisecond.
    pub fn with_poll_interval(mut self, every: Duration) -> Self {
        self.poll_interval = every.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub async fn request(
        &self,
        kind: ReportKind,
        freshness: Freshness,
    ) -> Result<ReportOutcome, SupervisorError> {
        if let Freshness::Cached(max_age) = freshness {
            if let Some(entry) = self.cache.read(&kind) {
                if entry.timestamp.elapsed() <= max_age {
                    self.span.in_scope(|| {
                        tracing::debug!(kind = kind.key, "report served from cache")
                    });
                    return Ok(ReportOutcome::Delivered(entry));
                }
            }
        }

        let issued_at = Instant::now();
        self.span.in_scope(|| {
            tracing::debug!(kind = kind.key, command = kind.command, "requesting report");
            self.sink.send_command(kind.command, &[], SYSTEM_AUTHOR)
        })?;

        let mut poll = tokio::time::interval_at(issued_at + self.poll_interval, self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let timeout = tokio::time::sleep_until(issued_at + self.deadline);
        tokio::pin!(timeout);

        loop {
            // A poll tick due at the same instant as the deadline still counts.
            tokio::select! {
                biased;
                _ = poll.tick() => {
                    if let Some(entry) = self.answer_since(&kind, issued_at) {
                        return Ok(ReportOutcome::Delivered(entry));
                    }
                }
                _ = &mut timeout => {
                    if let Some(entry) = self.answer_since(&kind, issued_at) {
                        return Ok(ReportOutcome::Delivered(entry));
                    }
                    self.span.in_scope(|| {
                        tracing::warn!(kind = kind.key, deadline_ms = self.deadline.as_millis() as u64, "report timed out")
                    });
                    return Ok(ReportOutcome::TimedOut);
                }
            }
        }
    }

    fn answer_since(&self, kind: &ReportKind, issued_at: Instant) -> Option<ReportEntry> {
        let entry = self.cache.read(kind).filter(|e| e.timestamp > issued_at)?;
        self.span.in_scope(|| {
            tracing::debug!(kind = kind.key, waited_ms = issued_at.elapsed().as_millis() as u64, "report delivered")
        });
        Some(entry)
    }
}
