//! Mock session lifecycle: activation, deactivation, and mode guarding.
//!
//! `PaymentMock` is the context object a test suite drives. Activating it
//! installs the dispatch engine as the exclusive handler for outbound calls;
//! deactivating it discards the session wholesale and restores the
//! passthrough sender exactly as configured. The mode value and the installed
//! hook move together: a dispatch engine is installed if and only if the mock
//! is in the `Mocking` mode.
//!
//! # Concurrency
//!
//! One context holds single, process-visible mutable state (mode, session).
//! Concurrent activation from multiple threads is unsupported: test
//! frameworks must serialize start/stop around a context, one session per
//! test. All calls are synchronous.
//!
//! # Example
//!
//! ```
//! use pagar_mock::{ApiMethod, ApiRequest, ApiResponse, PathPattern, PaymentMock};
//! use serde_json::json;
//!
//! let mut mock = PaymentMock::new();
//! mock.register_handler(
//!     "new_customer",
//!     ApiMethod::Post,
//!     PathPattern::Exact("/v1/customers".to_string()),
//!     |store, _request, _captures| {
//!         store.set("customers", "cus_1", json!({"id": "cus_1"}));
//!         Ok(ApiResponse::ok(json!({"id": "cus_1"})))
//!     },
//! );
//!
//! let session = mock.start().expect("ready to mock");
//! let resp = mock.send_request(&ApiRequest::post("/v1/customers")).unwrap();
//! assert_eq!(resp.body["id"], "cus_1");
//!
//! mock.stop();
//! assert_eq!(mock.state().to_string(), "ready");
//! # let _ = session;
//! ```

use crate::dispatch::{DispatchEngine, HandlerRegistry, SharedRegistry};
use crate::inject::{
    CardErrorCode, DirectiveTarget, ErrorDirective, ErrorQueue, SharedQueue, SimulatedApiError,
};
use crate::request::{ApiMethod, ApiRequest, ApiResponse, PathPattern};
use crate::result::{PagarError, PagarResult};
use crate::store::{SessionStore, SharedStore};
use crate::strategy::{StrategyKind, TestStrategy};
use crate::transport::RequestSender;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Lifecycle phase of the mock engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Nothing installed; both mocking and live testing can be entered
    #[default]
    Ready,
    /// A session is active and the dispatch engine intercepts calls
    Mocking,
    /// Live testing is toggled on; activation is refused
    Live,
    /// Administrative mode; activation is refused
    Remote,
}

impl Mode {
    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Mocking => "mocking",
            Self::Live => "live",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One activation's isolated state: store, error queue, dispatch engine
struct Session {
    id: Uuid,
    engine: Arc<DispatchEngine>,
}

impl Session {
    fn create(registry: SharedRegistry) -> Self {
        let store = SessionStore::shared();
        let queue = ErrorQueue::shared();
        let engine = Arc::new(DispatchEngine::new(registry, store, queue));
        Self {
            id: Uuid::new_v4(),
            engine,
        }
    }

    fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            store: self.engine.store(),
            queue: self.engine.queue(),
        }
    }
}

/// Caller-facing view of an active session
///
/// Holding a handle does not extend the session's life: once the mock is
/// stopped, the engine retains neither store nor queue, and a lingering
/// handle points at orphaned state no dispatch will ever touch again.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    store: SharedStore,
    queue: SharedQueue,
}

impl SessionHandle {
    /// Unique id of this activation
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The session's resource store
    #[must_use]
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// The session's error injection queue
    #[must_use]
    pub fn queue(&self) -> SharedQueue {
        Arc::clone(&self.queue)
    }
}

/// The mock engine's activation controller and public control surface
///
/// An explicit, passable context rather than process-global state, so
/// multiple isolated instances can coexist in tests of the engine itself.
pub struct PaymentMock {
    mode: Mode,
    registry: SharedRegistry,
    session: Option<Session>,
    passthrough: Option<Box<dyn RequestSender>>,
    default_strategy: StrategyKind,
}

impl Default for PaymentMock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PaymentMock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentMock")
            .field("mode", &self.mode)
            .field("session_id", &self.session.as_ref().map(|s| s.id))
            .field("default_strategy", &self.default_strategy)
            .finish()
    }
}

impl PaymentMock {
    /// Create a controller in the `Ready` mode with no handlers registered
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: Mode::Ready,
            registry: HandlerRegistry::shared(),
            session: None,
            passthrough: None,
            default_strategy: StrategyKind::default(),
        }
    }

    /// Configure the sender that answers calls while no session is active
    ///
    /// This is the original outbound behavior `stop()` restores: usually the
    /// real client library's transport.
    #[must_use]
    pub fn with_passthrough<S: RequestSender + 'static>(mut self, sender: S) -> Self {
        self.passthrough = Some(Box::new(sender));
        self
    }

    /// Register a resource handler
    ///
    /// Handlers may be registered at any time; they apply to the current
    /// session and every later one.
    pub fn register_handler<F>(
        &self,
        operation: &str,
        method: ApiMethod,
        pattern: PathPattern,
        handler: F,
    ) where
        F: Fn(&mut SessionStore, &ApiRequest, &HashMap<String, String>) -> PagarResult<ApiResponse>
            + Send
            + Sync
            + 'static,
    {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(operation, method, pattern, handler);
    }

    /// Activate mocking
    ///
    /// Returns `None` without touching any state when live testing is
    /// toggled on (or the mode was forced to `Remote`). From `Ready`,
    /// creates a fresh session over an empty store and installs the dispatch
    /// engine. Calling again while already mocking is a no-op that returns a
    /// handle to the existing session, so repeated setup hooks neither leak
    /// nor duplicate sessions.
    pub fn start(&mut self) -> Option<SessionHandle> {
        match self.mode {
            Mode::Live | Mode::Remote => {
                debug!(mode = %self.mode, "activation refused");
                None
            }
            Mode::Mocking => self.session.as_ref().map(Session::handle),
            Mode::Ready => {
                let session = Session::create(Arc::clone(&self.registry));
                let handle = session.handle();
                debug!(session_id = %session.id, "mock session started");
                self.session = Some(session);
                self.mode = Mode::Mocking;
                Some(handle)
            }
        }
    }

    /// Deactivate mocking
    ///
    /// Uninstalls the dispatch engine, discards the session entirely (store
    /// and queue are retained nowhere) and returns to `Ready`. A no-op in
    /// every other mode.
    pub fn stop(&mut self) {
        if self.mode == Mode::Mocking {
            if let Some(session) = self.session.take() {
                debug!(session_id = %session.id, "mock session stopped");
            }
            self.mode = Mode::Ready;
        }
    }

    /// Toggle live testing on or off
    ///
    /// Only legal while no session is active: switching testing philosophy
    /// mid-session is a programming error, as is toggling out of the
    /// administrative `Remote` mode.
    pub fn toggle_live(&mut self, live: bool) -> PagarResult<()> {
        match self.mode {
            Mode::Mocking => Err(PagarError::IllegalTransition {
                message: "cannot toggle live testing while a mock session is active".to_string(),
            }),
            Mode::Remote => Err(PagarError::IllegalTransition {
                message: "cannot toggle live testing in remote mode".to_string(),
            }),
            Mode::Ready | Mode::Live => {
                self.mode = if live { Mode::Live } else { Mode::Ready };
                debug!(mode = %self.mode, "live testing toggled");
                Ok(())
            }
        }
    }

    /// Current mode
    #[must_use]
    pub const fn state(&self) -> Mode {
        self.mode
    }

    /// Force the mode directly, bypassing transition guards
    ///
    /// Administrative entry point, the only way to reach `Remote`. Forcing
    /// out of `Mocking` still discards the session, and forcing into
    /// `Mocking` creates one, so the installed-hook invariant holds either
    /// way.
    #[doc(hidden)]
    pub fn set_mode_unchecked(&mut self, mode: Mode) {
        if mode != Mode::Mocking {
            self.session = None;
        } else if self.session.is_none() {
            self.session = Some(Session::create(Arc::clone(&self.registry)));
        }
        debug!(mode = %mode, "mode forced");
        self.mode = mode;
    }

    /// Send one outbound call through the active seam
    ///
    /// While mocking, the dispatch engine answers exclusively. Otherwise the
    /// configured passthrough answers; with no passthrough configured the
    /// call fails with an unstarted-state error so misuse surfaces early.
    pub fn send_request(&self, request: &ApiRequest) -> PagarResult<ApiResponse> {
        if let Some(session) = &self.session {
            return session.engine.dispatch(request);
        }
        match &self.passthrough {
            Some(sender) => sender.send(request),
            None => Err(PagarError::unstarted("send_request")),
        }
    }

    /// Queue an error directive against the active session
    pub fn queue_directive(&self, directive: ErrorDirective) -> PagarResult<()> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| PagarError::unstarted("prepare_error"))?;
        session
            .engine
            .queue()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queue(directive);
        Ok(())
    }

    /// Fail the next dispatch matching `target` with the given error
    pub fn prepare_error(
        &self,
        error: SimulatedApiError,
        target: DirectiveTarget,
    ) -> PagarResult<()> {
        self.queue_directive(ErrorDirective::once(target, error))
    }

    /// Fail the next dispatch matching `target` with a card error
    pub fn prepare_card_error(
        &self,
        code: CardErrorCode,
        target: DirectiveTarget,
    ) -> PagarResult<()> {
        self.prepare_error(SimulatedApiError::card_error(code), target)
    }

    /// Produce a test helper for the requested strategy
    ///
    /// With no argument the configured default applies (initially `Mock`).
    /// The choice reflects configuration only; it is independent of the
    /// current mode, so a mock helper can be requested even while live.
    #[must_use]
    pub fn create_test_helper(&self, kind: Option<StrategyKind>) -> TestStrategy {
        let kind = kind.unwrap_or(self.default_strategy);
        TestStrategy::new(kind, self.session_store())
    }

    /// Configure the default test helper strategy
    pub fn set_default_test_helper_strategy(&mut self, kind: StrategyKind) {
        self.default_strategy = kind;
    }

    /// The configured default test helper strategy
    #[must_use]
    pub const fn default_test_helper_strategy(&self) -> StrategyKind {
        self.default_strategy
    }

    /// Shared handle to the active session's store, if one exists
    #[must_use]
    pub fn session_store(&self) -> Option<SharedStore> {
        self.session.as_ref().map(|s| s.engine.store())
    }

    /// Requests seen by the active session, in arrival order
    #[must_use]
    pub fn history(&self) -> Vec<ApiRequest> {
        self.session
            .as_ref()
            .map(|s| s.engine.history())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mock_with_routes() -> PaymentMock {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let mock = PaymentMock::new();
        mock.register_handler(
            "new_customer",
            ApiMethod::Post,
            PathPattern::Exact("/v1/customers".to_string()),
            |store, request, _| {
                let id = request
                    .param("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("cus_default")
                    .to_string();
                let record = json!({ "id": id, "object": "customer" });
                store.set("customers", &id, record.clone());
                Ok(ApiResponse::ok(record))
            },
        );
        mock
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_start_overrides_request_path() {
            let mut mock = mock_with_routes();
            mock.start().unwrap();
            let resp = mock
                .send_request(&ApiRequest::post("/v1/customers").with_param("id", "cus_1"))
                .unwrap();
            assert_eq!(resp.body["id"], "cus_1");
            mock.stop();
        }

        #[test]
        fn test_stop_reverts_to_passthrough() {
            let mut mock = mock_with_routes()
                .with_passthrough(|_req: &ApiRequest| Ok(ApiResponse::ok(json!("passthrough"))));

            // Before any session, the passthrough answers.
            let resp = mock.send_request(&ApiRequest::get("/v1/ping")).unwrap();
            assert_eq!(resp.body, json!("passthrough"));

            mock.start().unwrap();
            let err = mock.send_request(&ApiRequest::get("/v1/ping")).unwrap_err();
            assert!(matches!(err, PagarError::SimulatedNotFound { .. }));

            mock.stop();
            let resp = mock.send_request(&ApiRequest::get("/v1/ping")).unwrap();
            assert_eq!(resp.body, json!("passthrough"));
        }

        #[test]
        fn test_no_passthrough_means_unstarted() {
            let mock = PaymentMock::new();
            let err = mock.send_request(&ApiRequest::get("/v1/ping")).unwrap_err();
            assert!(matches!(err, PagarError::UnstartedState { .. }));
        }

        #[test]
        fn test_data_never_persists_between_sessions() {
            let mut mock = PaymentMock::new();

            let session = mock.start().unwrap();
            session
                .store()
                .lock()
                .unwrap()
                .set("customers", "x", json!(9));
            mock.stop();

            let session = mock.start().unwrap();
            let store = session.store();
            let store = store.lock().unwrap();
            assert!(store.get("customers", "x").is_none());
            assert_eq!(store.count("customers"), 0);
        }

        #[test]
        fn test_restart_is_idempotent_and_keeps_session() {
            let mut mock = PaymentMock::new();
            let first = mock.start().unwrap();
            first
                .store()
                .lock()
                .unwrap()
                .set("customers", "cus_1", json!({}));

            let second = mock.start().unwrap();
            assert_eq!(first.id(), second.id());
            assert_eq!(second.store().lock().unwrap().count("customers"), 1);
        }

        #[test]
        fn test_stop_outside_mocking_is_noop() {
            let mut mock = PaymentMock::new();
            mock.stop();
            assert_eq!(mock.state(), Mode::Ready);

            mock.toggle_live(true).unwrap();
            mock.stop();
            assert_eq!(mock.state(), Mode::Live);
        }

        #[test]
        fn test_repeated_cycles_do_not_leak_sessions() {
            let mut mock = PaymentMock::new();
            for _ in 0..5 {
                let session = mock.start().unwrap();
                session
                    .store()
                    .lock()
                    .unwrap()
                    .set("charges", "ch_1", json!({}));
                mock.stop();
            }
            let session = mock.start().unwrap();
            assert!(session.store().lock().unwrap().is_empty());
        }
    }

    mod unstarted_guard_tests {
        use super::*;

        #[test]
        fn test_prepare_error_before_start() {
            let mock = PaymentMock::new();
            let err = mock
                .prepare_error(SimulatedApiError::api_error("boom"), DirectiveTarget::Any)
                .unwrap_err();
            assert!(matches!(err, PagarError::UnstartedState { .. }));
        }

        #[test]
        fn test_prepare_card_error_before_start() {
            let mock = PaymentMock::new();
            let err = mock
                .prepare_card_error(CardErrorCode::CardDeclined, DirectiveTarget::Any)
                .unwrap_err();
            assert!(matches!(err, PagarError::UnstartedState { .. }));
        }

        #[test]
        fn test_guard_leaves_next_session_queue_untouched() {
            let mut mock = PaymentMock::new();
            let _ = mock.prepare_card_error(CardErrorCode::CardDeclined, DirectiveTarget::Any);

            let session = mock.start().unwrap();
            assert!(session.queue().lock().unwrap().is_empty());
        }

        #[test]
        fn test_prepared_error_fails_next_dispatch() {
            let mut mock = mock_with_routes();
            mock.start().unwrap();
            mock.prepare_card_error(
                CardErrorCode::CardDeclined,
                DirectiveTarget::Operation("new_customer".to_string()),
            )
            .unwrap();

            let err = mock
                .send_request(&ApiRequest::post("/v1/customers"))
                .unwrap_err();
            assert_eq!(err.http_status(), Some(402));

            // Consumed: normal behavior resumes.
            let resp = mock.send_request(&ApiRequest::post("/v1/customers")).unwrap();
            assert_eq!(resp.status, 200);
        }
    }

    mod live_testing_tests {
        use super::*;

        #[test]
        fn test_toggle_live_changes_state() {
            let mut mock = PaymentMock::new();
            assert_eq!(mock.state(), Mode::Ready);

            mock.toggle_live(true).unwrap();
            assert_eq!(mock.state(), Mode::Live);
            assert_eq!(mock.state().to_string(), "live");

            mock.toggle_live(false).unwrap();
            assert_eq!(mock.state(), Mode::Ready);
        }

        #[test]
        fn test_does_not_start_when_live() {
            let mut mock = PaymentMock::new();
            mock.toggle_live(true).unwrap();

            assert!(mock.start().is_none());
            assert_eq!(mock.state(), Mode::Live);
            assert!(mock.session_store().is_none());
        }

        #[test]
        fn test_live_can_be_undone() {
            let mut mock = PaymentMock::new();
            mock.toggle_live(true).unwrap();
            mock.toggle_live(false).unwrap();
            assert_eq!(mock.state(), Mode::Ready);
            assert!(mock.start().is_some());
        }

        #[test]
        fn test_cannot_toggle_when_started() {
            let mut mock = PaymentMock::new();
            mock.start().unwrap();

            let err = mock.toggle_live(true).unwrap_err();
            assert!(matches!(err, PagarError::IllegalTransition { .. }));
            assert_eq!(mock.state(), Mode::Mocking);
        }

        #[test]
        fn test_cannot_toggle_in_remote_mode() {
            let mut mock = PaymentMock::new();
            mock.set_mode_unchecked(Mode::Remote);

            let err = mock.toggle_live(true).unwrap_err();
            assert!(matches!(err, PagarError::IllegalTransition { .. }));
            assert_eq!(mock.state(), Mode::Remote);
        }

        #[test]
        fn test_does_not_start_in_remote_mode() {
            let mut mock = PaymentMock::new();
            mock.set_mode_unchecked(Mode::Remote);
            assert!(mock.start().is_none());
        }
    }

    mod forced_mode_tests {
        use super::*;

        #[test]
        fn test_forcing_out_of_mocking_discards_session() {
            let mut mock = PaymentMock::new();
            mock.start().unwrap();
            mock.set_mode_unchecked(Mode::Ready);
            assert!(mock.session_store().is_none());
        }

        #[test]
        fn test_forcing_into_mocking_installs_session() {
            let mut mock = PaymentMock::new();
            mock.set_mode_unchecked(Mode::Mocking);
            assert!(mock.session_store().is_some());
        }
    }

    mod strategy_factory_tests {
        use super::*;

        #[test]
        fn test_uses_mock_by_default() {
            let mock = PaymentMock::new();
            assert!(mock.create_test_helper(None).is_mock());
        }

        #[test]
        fn test_explicit_kind_selects_variant() {
            let mock = PaymentMock::new();
            assert!(mock.create_test_helper(Some(StrategyKind::Live)).is_live());
            assert!(mock.create_test_helper(Some(StrategyKind::Mock)).is_mock());
        }

        #[test]
        fn test_configured_default_applies() {
            let mut mock = PaymentMock::new();
            mock.set_default_test_helper_strategy(StrategyKind::Live);
            assert!(mock.create_test_helper(None).is_live());
        }

        #[test]
        fn test_explicit_kind_overrides_configured_default() {
            let mut mock = PaymentMock::new();
            mock.set_default_test_helper_strategy(StrategyKind::Live);
            assert!(mock.create_test_helper(Some(StrategyKind::Mock)).is_mock());
        }

        #[test]
        fn test_factory_ignores_current_mode() {
            let mut mock = PaymentMock::new();
            mock.toggle_live(true).unwrap();
            // Still the configured default, not the live mode.
            assert!(mock.create_test_helper(None).is_mock());
        }

        #[test]
        fn test_helper_sees_active_session_store() {
            let mut mock = PaymentMock::new();
            mock.start().unwrap();

            let helper = mock.create_test_helper(None);
            let helper = helper.as_mock().unwrap();
            helper.insert("customers", "cus_9", json!({})).unwrap();

            let store = mock.session_store().unwrap();
            assert!(store.lock().unwrap().contains("customers", "cus_9"));
        }
    }

    mod history_tests {
        use super::*;

        #[test]
        fn test_history_tracks_session_requests() {
            let mut mock = mock_with_routes();
            mock.start().unwrap();
            let _ = mock.send_request(&ApiRequest::post("/v1/customers"));
            let _ = mock.send_request(&ApiRequest::get("/v1/unknown"));

            let history = mock.history();
            assert_eq!(history.len(), 2);
            assert_eq!(history[1].path, "/v1/unknown");

            mock.stop();
            assert!(mock.history().is_empty());
        }
    }

    #[cfg(test)]
    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_sessions_are_isolated(
                ids in prop::collection::vec("[a-z0-9_]{1,12}", 1..10)
            ) {
                let mut mock = PaymentMock::new();

                let session = mock.start().unwrap();
                for id in &ids {
                    session.store().lock().unwrap().set("customers", id, json!({}));
                }
                mock.stop();

                let session = mock.start().unwrap();
                let store = session.store();
                let store = store.lock().unwrap();
                prop_assert!(store.is_empty());
                for id in &ids {
                    prop_assert!(store.get("customers", id).is_none());
                }
            }
        }
    }
}
