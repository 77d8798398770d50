use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Consecutive failures within this window trip a cooldown.
const COOLDOWN_TRIP_THRESHOLD: u32 = 3;
const COOLDOWN_WINDOW: Duration = Duration::from_secs(60);
const COOLDOWN_BASE: Duration = Duration::from_secs(30);
const COOLDOWN_MAX: Duration = Duration::from_secs(5 * 60);

/// Requests attempted against one candidate endpoint before rotating.
pub const RETRY_BUDGET: u32 = 2;
pub const RETRY_BACKOFF: &[Duration] = &[Duration::from_millis(200), Duration::from_millis(500)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Available,
    Cooldown,
    Disabled,
}

/// Exponential backoff starting at 30s, doubling on each trip, capped at
/// 5min, reset on the first success after a trip (see DESIGN.md).
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    trips: u32,
}

impl CooldownPolicy {
    pub fn new() -> Self {
        Self { trips: 0 }
    }

    /// Backoff duration for the Nth consecutive trip (N starting at 1).
    pub fn backoff_for_trip(&self, trip: u32) -> Duration {
        if trip == 0 {
            return Duration::ZERO;
        }
        let shift = (trip - 1).min(16);
        let millis = COOLDOWN_BASE.as_millis().saturating_mul(1u128 << shift);
        Duration::from_millis(millis.min(COOLDOWN_MAX.as_millis()) as u64)
    }

    pub fn trip(&mut self) -> Duration {
        self.trips += 1;
        self.backoff_for_trip(self.trips)
    }

    pub fn reset(&mut self) {
        self.trips = 0;
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct EndpointState {
    pub status: EndpointStatus,
    pub consecutive_errors: u32,
    pub active_requests: i64,
    pub last_error_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
    cooldown_until: Option<Instant>,
    cooldown_policy: CooldownPolicy,
    window_start: Option<Instant>,
}

impl EndpointState {
    pub fn new() -> Self {
        Self {
            status: EndpointStatus::Available,
            consecutive_errors: 0,
            active_requests: 0,
            last_error_at: None,
            last_success_at: None,
            cooldown_until: None,
            cooldown_policy: CooldownPolicy::new(),
            window_start: None,
        }
    }

    /// Resolves an expired cooldown back to `available` before a selection
    /// decision is made.
    pub fn refresh(&mut self, now: Instant) {
        if self.status == EndpointStatus::Cooldown
            && let Some(until) = self.cooldown_until
            && now >= until
        {
            self.status = EndpointStatus::Available;
            self.cooldown_until = None;
        }
    }

    pub fn is_selectable(&self, now: Instant) -> bool {
        match self.status {
            EndpointStatus::Disabled => false,
            EndpointStatus::Cooldown => self.cooldown_until.is_some_and(|until| now >= until),
            EndpointStatus::Available => true,
        }
    }

    pub fn on_success(&mut self, now: Instant) {
        self.consecutive_errors = 0;
        self.window_start = None;
        self.cooldown_policy.reset();
        self.last_success_at = Some(now);
        if self.status == EndpointStatus::Cooldown {
            self.status = EndpointStatus::Available;
            self.cooldown_until = None;
        }
    }

    pub fn on_failure(&mut self, now: Instant) {
        self.last_error_at = Some(now);
        match self.window_start {
            Some(start) if now.duration_since(start) <= COOLDOWN_WINDOW => {
                self.consecutive_errors += 1;
            }
            _ => {
                self.window_start = Some(now);
                self.consecutive_errors = 1;
            }
        }

        if self.consecutive_errors >= COOLDOWN_TRIP_THRESHOLD {
            let backoff = self.cooldown_policy.trip();
            self.status = EndpointStatus::Cooldown;
            self.cooldown_until = Some(now + backoff);
            self.consecutive_errors = 0;
            self.window_start = None;
        }
    }

    pub fn disable(&mut self) {
        self.status = EndpointStatus::Disabled;
    }

    pub fn enable(&mut self) {
        if self.status == EndpointStatus::Disabled {
            self.status = EndpointStatus::Available;
        }
    }
}

impl Default for EndpointState {
    fn default() -> Self {
        Self::new()
    }
}

/// Increments `activeRequests` on construction, decrements on every exit path
/// (success, error, disconnect, panic) via `Drop`. This is what makes the
/// "activeRequests returns to zero" property hold unconditionally.
pub struct ActiveRequestGuard {
    table: Arc<Mutex<HashMap<(String, String), EndpointState>>>,
    key: (String, String),
}

impl ActiveRequestGuard {
    pub async fn acquire(
        table: Arc<Mutex<HashMap<(String, String), EndpointState>>>,
        client_type: &str,
        endpoint_name: &str,
    ) -> Self {
        {
            let mut guard = table.lock().await;
            let state = guard
                .entry((client_type.to_string(), endpoint_name.to_string()))
                .or_insert_with(EndpointState::new);
            state.active_requests += 1;
        }
        Self {
            table,
            key: (client_type.to_string(), endpoint_name.to_string()),
        }
    }
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        let table = self.table.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            let mut guard = table.lock().await;
            if let Some(state) = guard.get_mut(&key) {
                state.active_requests = (state.active_requests - 1).max(0);
            }
        });
    }
}

/// Per-client-type rotation pointer, guarded independently from individual
/// endpoint state by a per-client-type mutex.
#[derive(Debug, Default)]
pub struct RotationTable {
    index: Mutex<HashMap<String, usize>>,
}

impl RotationTable {
    pub fn new() -> Self {
        Self {
            index: Mutex::new(HashMap::new()),
        }
    }

    pub async fn current(&self, client_type: &str) -> usize {
        *self.index.lock().await.get(client_type).unwrap_or(&0)
    }

    pub async fn advance(&self, client_type: &str, candidate_count: usize) {
        if candidate_count == 0 {
            return;
        }
        let mut guard = self.index.lock().await;
        let entry = guard.entry(client_type.to_string()).or_insert(0);
        *entry = (*entry + 1) % candidate_count;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoEndpointReason {
    NoEndpoints,
    AllInCooldown,
    AllDisabled,
}

impl NoEndpointReason {
    pub fn code(&self) -> &'static str {
        match self {
            NoEndpointReason::NoEndpoints => "no_endpoints",
            NoEndpointReason::AllInCooldown => "all_in_cooldown",
            NoEndpointReason::AllDisabled => "all_disabled",
        }
    }
}

/// Error taxonomy visible to the dispatcher, independent of transport-level
/// `UpstreamFailure`.
#[derive(Debug, Clone)]
pub enum DispatchErrorKind {
    BadRequest(String),
    UpstreamTransient(String),
    UpstreamPermanent(u16, String),
    UpstreamRateLimited { retry_after: Option<Duration> },
    TranslatorError(String),
    NoEndpointAvailable(NoEndpointReason),
    ClientDisconnect,
}

impl DispatchErrorKind {
    /// Whether this failure counts toward an endpoint's consecutive-error
    /// tally (cooldown trips never count disconnects or translator faults).
    pub fn counts_as_endpoint_failure(&self) -> bool {
        matches!(
            self,
            DispatchErrorKind::UpstreamTransient(_)
                | DispatchErrorKind::UpstreamPermanent(_, _)
                | DispatchErrorKind::UpstreamRateLimited { .. }
        )
    }

    /// Whether the dispatcher should retry the same endpoint (up to the
    /// retry budget) rather than rotating immediately.
    pub fn retries_same_endpoint(&self) -> bool {
        matches!(self, DispatchErrorKind::UpstreamTransient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_backoff_doubles_and_caps() {
        let policy = CooldownPolicy::new();
        assert_eq!(policy.backoff_for_trip(1), Duration::from_secs(30));
        assert_eq!(policy.backoff_for_trip(2), Duration::from_secs(60));
        assert_eq!(policy.backoff_for_trip(3), Duration::from_secs(120));
        assert_eq!(policy.backoff_for_trip(4), Duration::from_secs(240));
        assert_eq!(policy.backoff_for_trip(5), Duration::from_secs(300));
        assert_eq!(policy.backoff_for_trip(10), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn endpoint_state_trips_cooldown_after_k_failures() {
        let mut state = EndpointState::new();
        let t0 = Instant::now();
        state.on_failure(t0);
        state.on_failure(t0);
        assert_eq!(state.status, EndpointStatus::Available);
        state.on_failure(t0);
        assert_eq!(state.status, EndpointStatus::Cooldown);
    }

    #[tokio::test]
    async fn endpoint_state_resets_on_success() {
        let mut state = EndpointState::new();
        let t0 = Instant::now();
        state.on_failure(t0);
        state.on_failure(t0);
        state.on_failure(t0);
        assert_eq!(state.status, EndpointStatus::Cooldown);
        state.refresh(t0 + Duration::from_secs(31));
        assert_eq!(state.status, EndpointStatus::Available);
        state.on_success(t0 + Duration::from_secs(31));
        assert_eq!(state.consecutive_errors, 0);
    }

    #[tokio::test]
    async fn active_request_guard_decrements_on_drop() {
        let table: Arc<Mutex<HashMap<(String, String), EndpointState>>> =
            Arc::new(Mutex::new(HashMap::new()));
        {
            let guard = ActiveRequestGuard::acquire(table.clone(), "claude", "ep-a").await;
            let active = table.lock().await.get(&("claude".to_string(), "ep-a".to_string())).unwrap().active_requests;
            assert_eq!(active, 1);
            drop(guard);
        }
        // Drop spawns a task to decrement; give it a chance to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let active = table
            .lock()
            .await
            .get(&("claude".to_string(), "ep-a".to_string()))
            .unwrap()
            .active_requests;
        assert_eq!(active, 0);
    }
}
