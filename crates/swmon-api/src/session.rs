// ── Device session ──
//
// Owns one switch's authentication state. Every logical request holds the
// session mutex end to end, so a device never sees two requests in flight
// and re-authentication cannot race a concurrent fetch.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::{Credentials, SessionPhase, SessionToken};
use crate::error::Error;
use crate::switch::{Endpoint, SwitchClient};

/// Default minimum gap between two requests to the same device.
pub const DEFAULT_REQUEST_SPACING: Duration = Duration::from_millis(500);

#[derive(Default)]
struct SessionState {
    token: Option<SessionToken>,
    last_request: Option<Instant>,
}

/// Authenticated session with a single switch.
///
/// Created unauthenticated; the first [`request`](Self::request) logs in.
/// When the device reports the token as expired the session logs in again
/// and retries exactly once. A second expiry in the same request surfaces
/// as [`Error::Session`].
pub struct DeviceSession {
    name: String,
    client: SwitchClient,
    credentials: Credentials,
    ttl: Option<Duration>,
    request_spacing: Duration,
    state: Mutex<SessionState>,
    phase: watch::Sender<SessionPhase>,
}

impl DeviceSession {
    pub fn new(name: impl Into<String>, client: SwitchClient, credentials: Credentials) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Unauthenticated);
        Self {
            name: name.into(),
            client,
            credentials,
            ttl: None,
            request_spacing: DEFAULT_REQUEST_SPACING,
            state: Mutex::new(SessionState::default()),
            phase,
        }
    }

    /// Treat tokens older than `ttl` as expired without asking the device.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_request_spacing(mut self, spacing: Duration) -> Self {
        self.request_spacing = spacing;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &SwitchClient {
        &self.client
    }

    /// Current phase of the session state machine.
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase transitions.
    pub fn phase_changes(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Log in now, replacing any existing token.
    pub async fn authenticate(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        self.login_locked(&mut state).await.map(|_| ())
    }

    /// Fetch `endpoint` with its default payload.
    pub async fn fetch(&self, endpoint: Endpoint) -> Result<Value, Error> {
        self.request(endpoint, &endpoint.default_payload()).await
    }

    /// One logical request: authenticate if needed, fetch, and on session
    /// expiry re-authenticate and retry once.
    pub async fn request(&self, endpoint: Endpoint, params: &Value) -> Result<Value, Error> {
        let mut state = self.state.lock().await;

        let token = self.current_token(&mut state).await?;
        self.pace(&mut state).await;
        match self.client.fetch(endpoint, &token, params).await {
            Err(e) if e.is_session_expired() => {
                warn!(device = %self.name, endpoint = %endpoint, "session expired, re-authenticating");
                self.invalidate(&mut state);
            }
            other => return other,
        }

        let token = self.login_locked(&mut state).await?;
        self.pace(&mut state).await;
        match self.client.fetch(endpoint, &token, params).await {
            Err(e) if e.is_session_expired() => {
                self.invalidate(&mut state);
                Err(Error::Session {
                    message: format!(
                        "{endpoint} rejected a freshly issued token on {}",
                        self.name
                    ),
                })
            }
            other => other,
        }
    }

    /// Best-effort logout. Drops the local token whether or not the device
    /// acknowledges.
    pub async fn logout(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let Some(token) = state.token.take() else {
            return Ok(());
        };
        self.phase.send_replace(SessionPhase::Unauthenticated);
        self.pace(&mut state).await;
        self.client.logout(&token).await
    }

    // ── Internals (mutex held) ──────────────────────────────────────

    async fn current_token(&self, state: &mut SessionState) -> Result<SessionToken, Error> {
        if let Some(token) = &state.token {
            if !token.is_expired_at(chrono::Utc::now()) {
                return Ok(token.clone());
            }
            debug!(device = %self.name, "session token past its TTL");
            self.invalidate(state);
        }
        self.login_locked(state).await
    }

    async fn login_locked(&self, state: &mut SessionState) -> Result<SessionToken, Error> {
        self.phase.send_replace(SessionPhase::Authenticating);
        self.pace(state).await;
        match self.client.login(&self.credentials, self.ttl).await {
            Ok(token) => {
                info!(device = %self.name, user_level = token.user_level, "authenticated");
                state.token = Some(token.clone());
                self.phase.send_replace(SessionPhase::Authenticated);
                Ok(token)
            }
            Err(e) => {
                state.token = None;
                self.phase.send_replace(SessionPhase::Unauthenticated);
                Err(e)
            }
        }
    }

    fn invalidate(&self, state: &mut SessionState) {
        state.token = None;
        self.phase.send_replace(SessionPhase::Unauthenticated);
    }

    /// Wait until `request_spacing` has passed since the previous request.
    async fn pace(&self, state: &mut SessionState) {
        if let Some(last) = state.last_request {
            tokio::time::sleep_until(last + self.request_spacing).await;
        }
        state.last_request = Some(Instant::now());
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("name", &self.name)
            .field("base_url", &self.client.base_url().as_str())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
