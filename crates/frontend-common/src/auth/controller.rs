//! Session controller
//!
//! Owns the tab's [`SessionState`] and is the only thing that mutates it.
//! Every mutation is a synchronous point update followed by observer
//! notification, so nothing ever observes a half-applied change across an
//! await.

use super::refresh::{InFlight, RefreshOutcome};
use super::state::{Observers, SessionSnapshot, SessionState, SessionStatus};
use crate::config::SessionConfig;
use crate::navigation::Navigator;
use crate::sync::{StorageChannel, SyncChannel, SyncEvent, SyncKind};
use crate::visibility::{Visibility, VisibilitySource};
use async_trait::async_trait;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use pos_core::rt::{self, MAX_TIMER_DELAY};
use pos_core::{KeyValueStore, StorageEvents, Subscription, TimerSlot, TimerToken, token};
use pos_http::types::{LoginRequest, RegisterRequest, StoreSummary};
use pos_http::{AuthApi, ClientError, CredentialSource, PosClient, TokenPair, UserSnapshot};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const INIT_FAILED: &str = "Failed to initialize authentication";

/// Handle to the tab's session; cheap to clone.
#[derive(Clone)]
pub struct SessionController {
    inner: Rc<SessionInner>,
}

pub(crate) struct SessionInner {
    me: Weak<SessionInner>,
    config: SessionConfig,
    client: PosClient,
    api: Rc<dyn AuthApi>,
    store: Rc<dyn KeyValueStore>,
    channel: Rc<dyn SyncChannel>,
    navigator: Rc<dyn Navigator>,
    state: RefCell<SessionState>,
    observers: Observers,
    refresh: Rc<InFlight>,
    timer: TimerSlot,
    initializing: RefCell<Option<Shared<LocalBoxFuture<'static, ()>>>>,
    listeners: RefCell<Vec<Subscription>>,
}

/// Builder for [`SessionController`]
///
/// Anything not supplied falls back to the browser implementation (or an
/// inert stand-in outside a browser).
pub struct SessionBuilder {
    config: SessionConfig,
    client: Option<PosClient>,
    api: Option<Rc<dyn AuthApi>>,
    store: Option<Rc<dyn KeyValueStore>>,
    channel: Option<Rc<dyn SyncChannel>>,
    navigator: Option<Rc<dyn Navigator>>,
    visibility: Option<Rc<dyn VisibilitySource>>,
}

impl SessionBuilder {
    fn new(config: SessionConfig) -> Self {
        Self {
            config,
            client: None,
            api: None,
            store: None,
            channel: None,
            navigator: None,
            visibility: None,
        }
    }

    /// Use this transport client instead of one built from the config
    #[must_use]
    pub fn client(mut self, client: PosClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Drive the authentication endpoints through `api` instead of the
    /// transport client
    #[must_use]
    pub fn api(mut self, api: Rc<dyn AuthApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Persist tokens in `store` and broadcast sync events through it
    #[must_use]
    pub fn storage<S>(mut self, store: S) -> Self
    where
        S: KeyValueStore + StorageEvents + Clone + 'static,
    {
        let channel = StorageChannel::new(
            store.clone(),
            self.config.sync_key.clone(),
            self.config.sync_cleanup(),
        );
        self.store = Some(Rc::new(store));
        self.channel = Some(Rc::new(channel));
        self
    }

    /// Broadcast sync events through `channel`
    #[must_use]
    pub fn channel(mut self, channel: Rc<dyn SyncChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    #[must_use]
    pub fn navigator(mut self, navigator: Rc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    #[must_use]
    pub fn visibility(mut self, visibility: Rc<dyn VisibilitySource>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Build the controller and start listening for other tabs and for
    /// visibility changes
    ///
    /// # Errors
    ///
    /// Returns an error if no client was supplied and one cannot be built
    /// from the configuration
    pub fn build(self) -> Result<SessionController, ClientError> {
        let client = match self.client {
            Some(client) => client,
            None => self.config.build_client()?,
        };
        let config = self.config;
        let api = self.api;

        let (store, channel) = match (self.store, self.channel) {
            (Some(store), Some(channel)) => (store, channel),
            (store, channel) => {
                let (default_store, default_channel) = default_storage(&config);
                (
                    store.unwrap_or(default_store),
                    channel.unwrap_or(default_channel),
                )
            }
        };
        let navigator = self.navigator.unwrap_or_else(|| default_navigator(&config));
        let visibility = self.visibility.unwrap_or_else(default_visibility);

        let inner = Rc::new_cyclic(|me: &Weak<SessionInner>| {
            let credentials: Weak<dyn CredentialSource> = me.clone();
            let client = client.with_credentials(credentials);
            let api: Rc<dyn AuthApi> = api.unwrap_or_else(|| Rc::new(client.clone()));

            SessionInner {
                me: me.clone(),
                config,
                client,
                api,
                store,
                channel,
                navigator,
                state: RefCell::new(SessionState::default()),
                observers: Observers::default(),
                refresh: Rc::new(InFlight::default()),
                timer: TimerSlot::new(),
                initializing: RefCell::new(None),
                listeners: RefCell::new(Vec::new()),
            }
        });
        inner.attach_listeners(visibility.as_ref());

        Ok(SessionController { inner })
    }
}

fn default_storage(config: &SessionConfig) -> (Rc<dyn KeyValueStore>, Rc<dyn SyncChannel>) {
    #[cfg(target_arch = "wasm32")]
    let store = pos_core::LocalStore::open();
    #[cfg(not(target_arch = "wasm32"))]
    let store = pos_core::MemoryStore::standalone();

    let channel = StorageChannel::new(
        store.clone(),
        config.sync_key.clone(),
        config.sync_cleanup(),
    );
    (Rc::new(store), Rc::new(channel))
}

#[cfg(target_arch = "wasm32")]
fn default_navigator(_config: &SessionConfig) -> Rc<dyn Navigator> {
    Rc::new(crate::navigation::BrowserNavigator)
}

#[cfg(not(target_arch = "wasm32"))]
fn default_navigator(config: &SessionConfig) -> Rc<dyn Navigator> {
    Rc::new(crate::navigation::MemoryNavigator::new(config.home_path.clone()))
}

#[cfg(target_arch = "wasm32")]
fn default_visibility() -> Rc<dyn VisibilitySource> {
    Rc::new(crate::visibility::DocumentVisibility)
}

#[cfg(not(target_arch = "wasm32"))]
fn default_visibility() -> Rc<dyn VisibilitySource> {
    Rc::new(crate::visibility::ManualVisibility::new())
}

impl SessionController {
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Restore the session persisted by an earlier visit.
    ///
    /// Runs once: concurrent callers share the first run and later calls
    /// return immediately. Never fails; any problem leaves the tab
    /// initialized and signed out.
    pub async fn initialize(&self) {
        if self.inner.state.borrow().initialized {
            debug!("session already initialized");
            return;
        }

        let pending = self
            .inner
            .initializing
            .borrow_mut()
            .get_or_insert_with(|| {
                let me = self.inner.me.clone();
                async move {
                    if let Some(inner) = me.upgrade() {
                        inner.run_initialize().await;
                    }
                }
                .boxed_local()
                .shared()
            })
            .clone();
        pending.await;
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the server's error; the tab is left signed out.
    pub async fn login(&self, request: &LoginRequest) -> Result<(), ClientError> {
        let inner = &self.inner;
        inner.begin_sign_in();
        let result = match inner.api.login(request).await {
            Ok(response) => inner.establish(response.tokens).await,
            Err(err) => Err(err),
        };
        inner.finish_sign_in(result, SyncKind::Login)
    }

    /// Create a tenant and sign in as its first user.
    ///
    /// # Errors
    ///
    /// Returns the server's error; the tab is left signed out.
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ClientError> {
        let inner = &self.inner;
        inner.begin_sign_in();
        let result = match inner.api.register(request).await {
            Ok(response) => inner.establish(response.tokens).await,
            Err(err) => Err(err),
        };
        inner.finish_sign_in(result, SyncKind::Register)
    }

    /// Start a session from tokens obtained out of band, such as by
    /// accepting an invitation.
    ///
    /// # Errors
    ///
    /// Returns the error from loading the user; the tab is left signed out.
    pub async fn login_with_tokens(&self, tokens: TokenPair) -> Result<(), ClientError> {
        let inner = &self.inner;
        inner.begin_sign_in();
        let result = inner.establish(tokens).await;
        inner.finish_sign_in(result, SyncKind::Login)
    }

    /// Sign out locally and in every other tab, then invalidate the refresh
    /// token on the server as a best effort.
    pub async fn logout(&self) {
        let inner = &self.inner;
        let tokens = inner.current_tokens();

        inner.clear_session();
        inner.channel.publish(SyncEvent::now(SyncKind::Logout));
        info!("signed out");

        if let Some(tokens) = tokens {
            if let Err(err) = inner.api.logout(&tokens.refresh_token).await {
                warn!("server-side logout failed, already signed out locally: {err}");
            }
        }

        inner.redirect_to_login();
    }

    /// Reload the user snapshot, e.g. after a profile edit. Does nothing
    /// when signed out.
    ///
    /// # Errors
    ///
    /// Returns the error from `GET /me`. Anything but a network failure
    /// also ends the session.
    pub async fn refresh_user(&self) -> Result<(), ClientError> {
        if !self.is_authenticated() {
            return Ok(());
        }

        let inner = &self.inner;
        inner.update(|state| state.loading = true);
        let result = inner.load_user().await;
        if let Err(err) = &result {
            warn!("failed to reload user: {err}");
            if !err.is_transient() {
                inner.clear_session();
            }
        }
        inner.update(|state| state.loading = false);
        result
    }

    /// Refresh the access token now, or join the refresh already running.
    pub async fn refresh_tokens(&self) -> RefreshOutcome {
        self.inner.refresh_tokens().await
    }

    /// Stop the refresh timer and stop listening to other tabs and to
    /// visibility changes.
    pub fn destroy(&self) {
        self.inner.timer.cancel();
        let listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        drop(listeners);
        debug!("session controller destroyed");
    }

    /// Whether the user may perform `action` on `feature`
    pub fn has_permission(&self, feature: &str, action: &str) -> bool {
        self.inner
            .state
            .borrow()
            .user
            .as_ref()
            .is_some_and(|user| user.has_permission(feature, action))
    }

    /// Whether the user may work in the store `store_id`
    pub fn can_access_store(&self, store_id: &str) -> bool {
        self.inner
            .state
            .borrow()
            .user
            .as_ref()
            .is_some_and(|user| user.can_access_store(store_id))
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Whether this tab holds a token pair, with or without a loaded user
    pub fn has_tokens(&self) -> bool {
        self.inner.state.borrow().tokens.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.borrow().initialized
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    pub fn user(&self) -> Option<UserSnapshot> {
        self.inner.state.borrow().user.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&*self.inner.state.borrow())
    }

    pub fn accessible_stores(&self) -> Vec<StoreSummary> {
        self.inner
            .state
            .borrow()
            .user
            .as_ref()
            .map(|user| user.stores.clone())
            .unwrap_or_default()
    }

    pub fn all_stores_access(&self) -> bool {
        self.inner
            .state
            .borrow()
            .user
            .as_ref()
            .is_some_and(|user| user.all_stores_access)
    }

    pub fn permissions(&self) -> HashMap<String, HashSet<String>> {
        self.inner
            .state
            .borrow()
            .user
            .as_ref()
            .map(|user| user.permissions.clone())
            .unwrap_or_default()
    }

    /// Call `observer` after every state change
    pub fn subscribe(&self, observer: impl Fn(&SessionSnapshot) + 'static) -> Subscription {
        self.inner.observers.subscribe(Rc::new(observer))
    }

    /// Transport client that authenticates as this session
    pub fn client(&self) -> PosClient {
        self.inner.client.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub(crate) fn store(&self) -> Rc<dyn KeyValueStore> {
        self.inner.store.clone()
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("status", &self.status())
            .field("refresh_scheduled", &self.inner.timer.is_armed())
            .finish_non_exhaustive()
    }
}

impl SessionInner {
    fn attach_listeners(&self, visibility: &dyn VisibilitySource) {
        let me = self.me.clone();
        let sync = self.channel.subscribe(Rc::new(move |event| {
            if let Some(inner) = me.upgrade() {
                inner.on_sync_event(event);
            }
        }));

        let me = self.me.clone();
        let visible = visibility.watch(Rc::new(move |visibility| {
            if let Some(inner) = me.upgrade() {
                inner.on_visibility(visibility);
            }
        }));

        self.listeners.borrow_mut().extend([sync, visible]);
    }

    fn update(&self, change: impl FnOnce(&mut SessionState)) {
        let snapshot = {
            let mut state = self.state.borrow_mut();
            change(&mut state);
            SessionSnapshot::from(&*state)
        };
        self.observers.notify(&snapshot);
    }

    fn current_tokens(&self) -> Option<TokenPair> {
        self.state.borrow().tokens.clone()
    }

    fn stored_tokens(&self) -> Result<Option<TokenPair>, serde_json::Error> {
        self.store
            .get(&self.config.tokens_key)
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
    }

    /// Persist and hold `tokens`, then re-arm the refresh timer
    fn install_tokens(&self, tokens: TokenPair) {
        match serde_json::to_string(&tokens) {
            Ok(raw) => self.store.set(&self.config.tokens_key, &raw),
            Err(err) => error!("failed to serialize tokens: {err}"),
        }
        self.adopt_tokens(tokens);
    }

    /// Hold `tokens` that are already persisted, then re-arm the refresh
    /// timer
    fn adopt_tokens(&self, tokens: TokenPair) {
        self.update(|state| state.tokens = Some(tokens));
        self.schedule_refresh();
    }

    fn clear_session(&self) {
        self.timer.cancel();
        self.store.remove(&self.config.tokens_key);
        self.update(|state| {
            state.tokens = None;
            state.user = None;
            state.error = None;
        });
    }

    /// Forget the session in this tab only, leaving storage alone
    fn drop_local_session(&self) {
        self.timer.cancel();
        self.update(|state| {
            state.tokens = None;
            state.user = None;
        });
    }

    fn handle_unauthorized(&self) {
        warn!("session is no longer authorized, signing out");
        self.clear_session();
        self.channel.publish(SyncEvent::now(SyncKind::Unauthorized));
        self.redirect_to_login();
    }

    fn redirect_to_login(&self) {
        let login = &self.config.login_path;
        let path = self.navigator.current_path();
        let on_login = path == *login
            || path
                .strip_prefix(login.as_str())
                .is_some_and(|rest| rest.starts_with('/'));
        if !on_login {
            self.navigator.navigate(login);
        }
    }

    fn schedule_refresh(&self) {
        let Some(access_token) = self
            .state
            .borrow()
            .tokens
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
        else {
            self.timer.cancel();
            return;
        };

        match token::refresh_delay_ms(&access_token, self.config.expiry_buffer_ms, rt::now_ms()) {
            Some(delay) if delay > 0 => {
                let delay = Duration::from_millis(delay.unsigned_abs());
                debug!("scheduling token refresh in {}s", delay.as_secs());
                self.arm_refresh(delay);
            }
            _ => self.timer.cancel(),
        }
    }

    fn arm_refresh(&self, delay: Duration) {
        let me = self.me.clone();
        self.timer.arm(delay.min(MAX_TIMER_DELAY), move |armed| async move {
            if let Some(inner) = me.upgrade() {
                inner.on_refresh_timer(armed).await;
            }
        });
    }

    fn retry_refresh_later(&self) {
        let delay = self.config.refresh_retry();
        warn!("token refresh unreachable, retrying in {}s", delay.as_secs());
        self.arm_refresh(delay);
    }

    async fn on_refresh_timer(self: Rc<Self>, armed: TimerToken) {
        if !self.timer.release(armed) || self.current_tokens().is_none() {
            return;
        }

        info!("refreshing access token before expiry");
        match self.refresh_tokens().await {
            RefreshOutcome::Refreshed | RefreshOutcome::NoSession => {}
            RefreshOutcome::Rejected => self.handle_unauthorized(),
            RefreshOutcome::Transient => self.retry_refresh_later(),
        }
    }

    async fn refresh_tokens(&self) -> RefreshOutcome {
        let me = self.me.clone();
        let pending = self.refresh.join(move || {
            async move {
                match me.upgrade() {
                    Some(inner) => inner.run_refresh().await,
                    None => RefreshOutcome::NoSession,
                }
            }
            .boxed_local()
        });
        pending.await
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let Some(current) = self.current_tokens() else {
            return RefreshOutcome::NoSession;
        };

        // Another tab may already have spent the refresh token
        if let Ok(Some(stored)) = self.stored_tokens() {
            if stored != current
                && !token::is_expired(&stored.access_token, self.config.expiry_buffer_ms)
            {
                info!("adopting tokens refreshed by another tab");
                self.adopt_tokens(stored);
                return RefreshOutcome::Refreshed;
            }
        }

        match self.api.refresh_tokens(&current.refresh_token).await {
            Ok(tokens) => {
                if self.current_tokens().as_ref() != Some(&current) {
                    debug!("session changed while refreshing, discarding new tokens");
                    return if self.current_tokens().is_some() {
                        RefreshOutcome::Refreshed
                    } else {
                        RefreshOutcome::NoSession
                    };
                }
                info!("access token refreshed");
                self.install_tokens(tokens);
                RefreshOutcome::Refreshed
            }
            Err(err) if err.is_transient() => {
                warn!("token refresh failed, keeping session: {err}");
                RefreshOutcome::Transient
            }
            Err(err) => {
                warn!("refresh token rejected: {err}");
                if self.current_tokens().as_ref() == Some(&current) {
                    self.clear_session();
                }
                RefreshOutcome::Rejected
            }
        }
    }

    async fn run_initialize(self: Rc<Self>) {
        info!("initializing session");
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let tokens = match self.stored_tokens() {
            Ok(Some(tokens)) => tokens,
            Ok(None) => {
                self.finish_initialize(None);
                return;
            }
            Err(err) => {
                warn!("stored tokens are unreadable: {err}");
                self.clear_session();
                self.finish_initialize(Some(INIT_FAILED));
                return;
            }
        };
        self.update(|state| state.tokens = Some(tokens.clone()));

        if token::is_expired(&tokens.access_token, self.config.expiry_buffer_ms) {
            info!("stored access token expired, refreshing");
            let outcome = self.refresh_tokens().await;
            if outcome != RefreshOutcome::Refreshed {
                info!(?outcome, "stored session could not be refreshed");
                self.clear_session();
                self.finish_initialize(None);
                return;
            }
        }

        match self.load_user().await {
            Ok(()) => {
                self.schedule_refresh();
                self.finish_initialize(None);
            }
            Err(err) => {
                warn!("failed to load user: {err}");
                self.clear_session();
                self.finish_initialize(Some(INIT_FAILED));
            }
        }
    }

    fn finish_initialize(&self, error: Option<&str>) {
        self.update(|state| {
            state.initialized = true;
            state.loading = false;
            if let Some(error) = error {
                state.error = Some(error.to_string());
            }
        });
        info!(
            authenticated = self.state.borrow().is_authenticated(),
            "session initialized"
        );
    }

    async fn load_user(&self) -> Result<(), ClientError> {
        let user = self.api.me().await?;
        if self.current_tokens().is_none() {
            debug!("session ended while loading user");
            return Err(ClientError::unauthorized());
        }

        debug!(user_id = %user.id, "user loaded");
        self.update(|state| {
            state.user = Some(user);
            state.error = None;
        });
        Ok(())
    }

    fn begin_sign_in(&self) {
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });
    }

    async fn establish(&self, tokens: TokenPair) -> Result<(), ClientError> {
        self.install_tokens(tokens);
        self.load_user().await
    }

    fn finish_sign_in(
        &self,
        result: Result<(), ClientError>,
        kind: SyncKind,
    ) -> Result<(), ClientError> {
        match result {
            Ok(()) => {
                self.update(|state| {
                    state.loading = false;
                    state.initialized = true;
                });
                self.channel.publish(SyncEvent::now(kind));
                info!(?kind, "signed in");
                Ok(())
            }
            Err(err) => {
                warn!(?kind, "sign-in failed: {err}");
                self.clear_session();
                self.update(|state| state.loading = false);
                Err(err)
            }
        }
    }

    fn on_visibility(&self, visibility: Visibility) {
        if visibility != Visibility::Visible {
            return;
        }
        let Some(tokens) = self.current_tokens() else {
            return;
        };
        if !token::is_expired(&tokens.access_token, self.config.expiry_buffer_ms) {
            return;
        }

        info!("tab became visible with an expired access token, refreshing");
        if let Some(inner) = self.me.upgrade() {
            rt::spawn_local(inner.reactivate());
        }
    }

    async fn reactivate(self: Rc<Self>) {
        match self.refresh_tokens().await {
            RefreshOutcome::Refreshed => {
                if let Err(err) = self.load_user().await {
                    warn!("failed to reload user after refresh: {err}");
                }
            }
            RefreshOutcome::Rejected => self.handle_unauthorized(),
            RefreshOutcome::Transient => self.retry_refresh_later(),
            RefreshOutcome::NoSession => {}
        }
    }

    fn on_sync_event(&self, event: SyncEvent) {
        info!(kind = ?event.kind, "session change from another tab");
        if event.kind.ends_session() {
            self.clear_session();
            self.redirect_to_login();
        } else if let Some(inner) = self.me.upgrade() {
            rt::spawn_local(inner.adopt_remote_session());
        }
    }

    async fn adopt_remote_session(self: Rc<Self>) {
        let tokens = match self.stored_tokens() {
            Ok(Some(tokens)) => tokens,
            Ok(None) => return,
            Err(err) => {
                warn!("tokens written by another tab are unreadable: {err}");
                return;
            }
        };

        self.adopt_tokens(tokens);
        match self.load_user().await {
            Ok(()) => self.update(|state| state.initialized = true),
            Err(err) => {
                warn!("failed to load user after sync: {err}");
                self.drop_local_session();
            }
        }
    }
}

#[async_trait(?Send)]
impl CredentialSource for SessionInner {
    fn access_token(&self) -> Option<String> {
        self.state
            .borrow()
            .tokens
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
    }

    async fn refresh(&self) -> bool {
        self.refresh_tokens().await == RefreshOutcome::Refreshed
    }

    fn on_unauthorized(&self) {
        self.handle_unauthorized();
    }
}
