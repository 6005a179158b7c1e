//! Cookie-backed sessions held in memory.
//!
//! A middleware looks up the caller's session for each admin request and
//! stores a [`Session`] handle in the request extensions; handlers pull it
//! out with the extractor below. Nothing is stored for a visitor until a
//! flash or the admin flag needs somewhere to live. Logging in moves the
//! session to a fresh token; logging out forgets it.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};

use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "rh_session";
/// Admin session lifetime (24 hours, sliding).
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 3600);
/// Anonymous sessions only carry flashes across a redirect.
pub const ANON_SESSION_TTL: Duration = Duration::from_secs(10 * 60);
/// Minimum gap between sweeps of expired sessions.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Stored sessions before anonymous ones start being evicted.
const MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Danger,
}

impl FlashLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            FlashLevel::Success => "flash-success",
            FlashLevel::Info => "flash-info",
            FlashLevel::Warning => "flash-warning",
            FlashLevel::Danger => "flash-danger",
        }
    }
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

struct SessionData {
    admin: bool,
    touched: Instant,
    flashes: Vec<Flash>,
}

struct Sessions {
    map: HashMap<String, SessionData>,
    last_sweep: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Sessions>>,
    ttl: Duration,
    anon_ttl: Duration,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl SessionStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Sessions {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            ttl,
            anon_ttl: ttl.min(ANON_SESSION_TTL),
            capacity: MAX_SESSIONS,
        }
    }

    /// Handle for the live session behind `token`, sliding its expiry.
    /// Unknown or expired tokens give an empty handle; nothing is stored.
    pub async fn resolve(&self, token: Option<&str>) -> Session {
        let id = match token {
            Some(tok) => self.touch(tok).await,
            None => None,
        };
        Session {
            store: self.clone(),
            slot: Arc::new(Mutex::new(Slot { id, changed: false })),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    async fn touch(&self, tok: &str) -> Option<String> {
        let now = Instant::now();
        // One write lock covers the lookup and the slide so a concurrent
        // logout cannot slip in between.
        let mut sessions = self.inner.write().await;
        self.sweep_if_due(&mut sessions, now);

        let live = sessions.map.get(tok).map(|d| self.is_live(d, now))?;
        if !live {
            sessions.map.remove(tok);
            return None;
        }
        if let Some(data) = sessions.map.get_mut(tok) {
            data.touched = now;
        }
        Some(tok.to_string())
    }

    /// Store `data` under a new token.
    async fn insert(&self, data: SessionData) -> String {
        let now = Instant::now();
        let id = new_session_token();
        let mut sessions = self.inner.write().await;
        if sessions.map.len() >= self.capacity {
            self.make_room(&mut sessions, now);
        }
        sessions.map.insert(id.clone(), data);
        id
    }

    fn lifetime(&self, data: &SessionData) -> Duration {
        if data.admin { self.ttl } else { self.anon_ttl }
    }

    fn is_live(&self, data: &SessionData, now: Instant) -> bool {
        now.duration_since(data.touched) < self.lifetime(data)
    }

    fn sweep_if_due(&self, sessions: &mut Sessions, now: Instant) {
        if now.duration_since(sessions.last_sweep) >= SWEEP_INTERVAL {
            self.sweep(sessions, now);
        }
    }

    fn sweep(&self, sessions: &mut Sessions, now: Instant) {
        sessions.last_sweep = now;
        sessions.map.retain(|_, data| self.is_live(data, now));
    }

    /// Drop expired sessions, then the oldest anonymous one if still full.
    fn make_room(&self, sessions: &mut Sessions, now: Instant) {
        self.sweep(sessions, now);
        if sessions.map.len() < self.capacity {
            return;
        }
        let oldest = sessions
            .map
            .iter()
            .filter(|(_, d)| !d.admin)
            .min_by_key(|(_, d)| d.touched)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            sessions.map.remove(&id);
        }
    }
}

struct Slot {
    id: Option<String>,
    /// Set when this request moved the caller to a different token.
    changed: bool,
}

/// Request-scoped handle to the caller's session.
#[derive(Clone)]
pub struct Session {
    store: SessionStore,
    slot: Arc<Mutex<Slot>>,
}

enum CookieUpdate {
    Set(String, Duration),
    Clear,
}

impl Session {
    pub async fn id(&self) -> Option<String> {
        self.slot.lock().await.id.clone()
    }

    pub async fn is_admin(&self) -> bool {
        let Some(id) = self.id().await else {
            return false;
        };
        self.store
            .inner
            .read()
            .await
            .map
            .get(&id)
            .is_some_and(|d| d.admin)
    }

    /// Move to a fresh admin token, carrying pending flashes over. The old
    /// token stops working.
    pub async fn log_in(&self) {
        let mut slot = self.slot.lock().await;
        let flashes = match slot.id.take() {
            Some(old) => self
                .store
                .inner
                .write()
                .await
                .map
                .remove(&old)
                .map(|d| d.flashes)
                .unwrap_or_default(),
            None => Vec::new(),
        };
        let id = self
            .store
            .insert(SessionData {
                admin: true,
                touched: Instant::now(),
                flashes,
            })
            .await;
        slot.id = Some(id);
        slot.changed = true;
    }

    /// Forget the session. A later flash starts a new anonymous one.
    pub async fn log_out(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(old) = slot.id.take() {
            self.store.inner.write().await.map.remove(&old);
        }
        slot.changed = true;
    }

    pub async fn flash(&self, level: FlashLevel, message: impl Into<String>) {
        let flash = Flash {
            level,
            message: message.into(),
        };
        let mut slot = self.slot.lock().await;
        if let Some(id) = slot.id.clone() {
            let mut sessions = self.store.inner.write().await;
            if let Some(data) = sessions.map.get_mut(&id) {
                data.flashes.push(flash);
                return;
            }
        }
        let id = self
            .store
            .insert(SessionData {
                admin: false,
                touched: Instant::now(),
                flashes: vec![flash],
            })
            .await;
        slot.id = Some(id);
        slot.changed = true;
    }

    /// Remove and return all pending flashes. An anonymous session has
    /// nothing left to carry afterwards and is dropped.
    pub async fn take_flashes(&self) -> Vec<Flash> {
        let Some(id) = self.id().await else {
            return Vec::new();
        };
        let mut sessions = self.store.inner.write().await;
        let Some(data) = sessions.map.get_mut(&id) else {
            return Vec::new();
        };
        let flashes = std::mem::take(&mut data.flashes);
        if !data.admin {
            sessions.map.remove(&id);
        }
        flashes
    }

    async fn cookie_update(&self) -> Option<CookieUpdate> {
        let slot = self.slot.lock().await;
        if !slot.changed {
            return None;
        }
        let Some(id) = slot.id.clone() else {
            return Some(CookieUpdate::Clear);
        };
        let sessions = self.store.inner.read().await;
        match sessions.map.get(&id) {
            Some(data) => Some(CookieUpdate::Set(id, self.store.lifetime(data))),
            None => Some(CookieUpdate::Clear),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "session layer missing"))
    }
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// Attach a [`Session`] to the request and send a cookie whenever the
/// request moved the caller to another token.
pub async fn attach(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = extract_session_cookie(req.headers());
    let session = state.sessions.resolve(token.as_deref()).await;
    req.extensions_mut().insert(session.clone());

    let mut resp = next.run(req).await;

    let cookie = match session.cookie_update().await {
        Some(CookieUpdate::Set(id, ttl)) => format!(
            "{}={}; Path=/admin; HttpOnly; SameSite=Strict; Max-Age={}",
            SESSION_COOKIE,
            id,
            ttl.as_secs()
        ),
        Some(CookieUpdate::Clear) => format!(
            "{}=; Path=/admin; HttpOnly; SameSite=Strict; Max-Age=0",
            SESSION_COOKIE
        ),
        None => return resp,
    };
    match HeaderValue::from_str(&cookie) {
        Ok(v) => {
            resp.headers_mut().append(header::SET_COOKIE, v);
        }
        Err(e) => tracing::error!("Cannot encode session cookie: {}", e),
    }
    resp
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn extract_session_cookie(headers: &axum::http::HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .find_map(|part| part.trim().strip_prefix(&prefix).map(str::to_string))
}

fn new_session_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[tokio::test]
    async fn lookups_store_nothing() {
        let store = SessionStore::default();

        let session = store.resolve(None).await;
        assert_eq!(session.id().await, None);
        assert!(!session.is_admin().await);
        assert!(session.take_flashes().await.is_empty());

        let forged = store.resolve(Some("forged")).await;
        assert_eq!(forged.id().await, None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn flashes_are_shown_once_then_the_session_goes() {
        let store = SessionStore::default();
        let session = store.resolve(None).await;
        session.flash(FlashLevel::Success, "Saved").await;
        session.flash(FlashLevel::Danger, "Oops").await;

        let id = session.id().await.unwrap();
        assert_eq!(id.len(), 64);
        assert_eq!(store.len().await, 1);

        let again = store.resolve(Some(id.as_str())).await;
        let flashes = again.take_flashes().await;
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].message, "Saved");
        assert_eq!(flashes[1].level, FlashLevel::Danger);
        assert!(again.take_flashes().await.is_empty());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn login_moves_to_a_fresh_token() {
        let store = SessionStore::default();
        let session = store.resolve(None).await;
        session.flash(FlashLevel::Warning, "Please log in").await;
        let before = session.id().await.unwrap();

        session.log_in().await;
        let after = session.id().await.unwrap();
        assert_ne!(before, after);

        let stale = store.resolve(Some(before.as_str())).await;
        assert!(!stale.is_admin().await);

        let current = store.resolve(Some(after.as_str())).await;
        assert!(current.is_admin().await);
        assert_eq!(current.take_flashes().await[0].message, "Please log in");
        assert!(current.is_admin().await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn logout_forgets_the_session() {
        let store = SessionStore::default();
        let session = store.resolve(None).await;
        session.log_in().await;
        let id = session.id().await.unwrap();

        let current = store.resolve(Some(id.as_str())).await;
        current.log_out().await;
        assert!(!current.is_admin().await);
        assert!(!store.resolve(Some(id.as_str())).await.is_admin().await);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let store = SessionStore::with_ttl(Duration::from_millis(10));
        let session = store.resolve(None).await;
        session.log_in().await;
        let id = session.id().await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        let stale = store.resolve(Some(id.as_str())).await;
        assert_eq!(stale.id().await, None);
        assert!(!session.is_admin().await);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn full_store_evicts_the_oldest_anonymous_session() {
        let store = SessionStore {
            capacity: 3,
            ..SessionStore::default()
        };
        let admin = store.resolve(None).await;
        admin.log_in().await;

        let mut anon = Vec::new();
        for i in 0..3 {
            let s = store.resolve(None).await;
            s.flash(FlashLevel::Info, format!("n{i}")).await;
            anon.push(s.id().await.unwrap());
        }

        assert_eq!(store.len().await, 3);
        assert!(admin.is_admin().await);
        let first = store.resolve(Some(anon[0].as_str())).await;
        assert_eq!(first.id().await, None);
        let last = store.resolve(Some(anon[2].as_str())).await;
        assert_eq!(last.take_flashes().await[0].message, "n2");
    }

    #[test]
    fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; rh_session=abc123; other=1"),
        );
        assert_eq!(extract_session_cookie(&headers), Some("abc123".to_string()));
        assert_eq!(extract_session_cookie(&HeaderMap::new()), None);
    }
}
