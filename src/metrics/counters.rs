use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::Method;
use serde::Serialize;
use thiserror::Error;

// ─── Dimensions ──────────────────────────────────────────────────

/// The HTTP verbs the request tracker knows how to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Put,
    Post,
    Delete,
}

/// Raised when the tracker sees a verb outside [`HttpVerb`].
/// Logged and absorbed, never surfaced to a client.
#[derive(Debug, Error)]
#[error("unrecognized method: {0}")]
pub struct UnrecognizedMethod(pub Method);

impl HttpVerb {
    pub const ALL: [HttpVerb; 4] = [Self::Get, Self::Put, Self::Post, Self::Delete];

    pub fn classify(method: &Method) -> Result<Self, UnrecognizedMethod> {
        match *method {
            Method::GET => Ok(Self::Get),
            Method::PUT => Ok(Self::Put),
            Method::POST => Ok(Self::Post),
            Method::DELETE => Ok(Self::Delete),
            _ => Err(UnrecognizedMethod(method.clone())),
        }
    }

    /// Lower-case tag value used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyKind {
    /// End-to-end request handling, measured by the request tracker.
    Service,
    /// Round-trip to the pizza factory.
    Factory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Failure,
}

// ─── Public types ────────────────────────────────────────────────

/// Process-wide aggregate counters.
///
/// Every write is a single atomic add, so concurrent requests never lose
/// an increment. Nothing here is ever reset; the reporter only reads.
#[derive(Debug, Default)]
pub struct CounterSet {
    get: AtomicU64,
    put: AtomicU64,
    post: AtomicU64,
    delete: AtomicU64,

    auth_successful: AtomicU64,
    auth_failed: AtomicU64,
    users_registered: AtomicU64,

    service_millis: AtomicU64,
    factory_millis: AtomicU64,

    pizzas_sold: AtomicU64,
    pizza_failures: AtomicU64,
    /// `f64` bit pattern, updated with a CAS loop.
    revenue_bits: AtomicU64,
}

/// Immutable copy of the counters, handed to the encoder and `/api/metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CounterSnapshot {
    pub requests: MethodCounts,
    pub auth: AuthCounts,
    pub latency: LatencyTotals,
    pub business: BusinessTotals,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MethodCounts {
    pub get: u64,
    pub put: u64,
    pub post: u64,
    pub delete: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthCounts {
    pub successful: u64,
    pub failed: u64,
    pub users_registered: u64,
}

/// Cumulative sums in milliseconds, not averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencyTotals {
    pub service_millis: u64,
    pub factory_millis: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BusinessTotals {
    pub pizzas_sold: u64,
    pub pizza_failures: u64,
    pub revenue: f64,
}

impl MethodCounts {
    pub fn get(&self, verb: HttpVerb) -> u64 {
        match verb {
            HttpVerb::Get => self.get,
            HttpVerb::Put => self.put,
            HttpVerb::Post => self.post,
            HttpVerb::Delete => self.delete,
        }
    }

    /// Sum across all tracked verbs (the `method=all` line).
    pub fn total(&self) -> u64 {
        HttpVerb::ALL.iter().map(|v| self.get(*v)).sum()
    }
}

// ─── CounterSet impl ─────────────────────────────────────────────

impl CounterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_method(&self, verb: HttpVerb) {
        self.method_slot(verb).fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, kind: LatencyKind, delta_millis: u64) {
        let slot = match kind {
            LatencyKind::Service => &self.service_millis,
            LatencyKind::Factory => &self.factory_millis,
        };
        slot.fetch_add(delta_millis, Ordering::Relaxed);
    }

    pub fn increment_auth(&self, outcome: AuthOutcome) {
        let slot = match outcome {
            AuthOutcome::Success => &self.auth_successful,
            AuthOutcome::Failure => &self.auth_failed,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pizzas_sold(&self, n: u64) {
        self.pizzas_sold.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_creation_failure(&self) {
        self.pizza_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds to the registered-user total.
    pub fn add_users(&self, delta: u64) {
        self.users_registered.fetch_add(delta, Ordering::Relaxed);
    }

    /// Negative or non-finite amounts are ignored; revenue never decreases.
    pub fn add_revenue(&self, amount: f64) {
        if !amount.is_finite() || amount <= 0.0 {
            return;
        }
        let _ = self
            .revenue_bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + amount).to_bits())
            });
    }

    /// Copy the current values. Writers are never blocked.
    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            requests: MethodCounts {
                get: load(&self.get),
                put: load(&self.put),
                post: load(&self.post),
                delete: load(&self.delete),
            },
            auth: AuthCounts {
                successful: load(&self.auth_successful),
                failed: load(&self.auth_failed),
                users_registered: load(&self.users_registered),
            },
            latency: LatencyTotals {
                service_millis: load(&self.service_millis),
                factory_millis: load(&self.factory_millis),
            },
            business: BusinessTotals {
                pizzas_sold: load(&self.pizzas_sold),
                pizza_failures: load(&self.pizza_failures),
                revenue: f64::from_bits(self.revenue_bits.load(Ordering::Acquire)),
            },
        }
    }

    fn method_slot(&self, verb: HttpVerb) -> &AtomicU64 {
        match verb {
            HttpVerb::Get => &self.get,
            HttpVerb::Put => &self.put,
            HttpVerb::Post => &self.post,
            HttpVerb::Delete => &self.delete,
        }
    }
}
