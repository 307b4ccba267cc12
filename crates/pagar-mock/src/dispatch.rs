//! Request dispatch: route matching, error-directive consumption, handler
//! execution.
//!
//! Resource handlers are an external concern; they register here for an
//! (operation, method, path-pattern) combination and receive the session
//! store at call time. Dispatch order per request:
//!
//! 1. No matching route: fail with a simulated 404, mirroring how an
//!    unrecognized route fails against the real service.
//! 2. Route found with a matching error directive queued: consume the
//!    directive and return the injected failure without running the handler.
//! 3. Otherwise: invoke the handler against the session store.

use crate::inject::SharedQueue;
use crate::request::{ApiMethod, ApiRequest, ApiResponse, PathPattern};
use crate::result::{PagarError, PagarResult};
use crate::store::{SessionStore, SharedStore};
use crate::transport::RequestSender;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// A registered resource handler
///
/// Receives the session store, the intercepted request, and any `:name`
/// captures from the matched path pattern.
pub type Handler = Box<
    dyn Fn(&mut SessionStore, &ApiRequest, &HashMap<String, String>) -> PagarResult<ApiResponse>
        + Send
        + Sync,
>;

/// Shared handle to a handler registry
pub type SharedRegistry = Arc<Mutex<HandlerRegistry>>;

struct HandlerRoute {
    operation: String,
    method: ApiMethod,
    pattern: PathPattern,
    handler: Handler,
}

/// Registry of resource handlers, scanned in registration order
#[derive(Default)]
pub struct HandlerRegistry {
    routes: Vec<HandlerRoute>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("route_count", &self.routes.len())
            .finish()
    }
}

impl HandlerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry behind a shared handle
    #[must_use]
    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Register a handler for an (operation, method, pattern) combination
    pub fn register<F>(&mut self, operation: &str, method: ApiMethod, pattern: PathPattern, f: F)
    where
        F: Fn(&mut SessionStore, &ApiRequest, &HashMap<String, String>) -> PagarResult<ApiResponse>
            + Send
            + Sync
            + 'static,
    {
        trace!(operation, %method, %pattern, "registering handler");
        self.routes.push(HandlerRoute {
            operation: operation.to_string(),
            method,
            pattern,
            handler: Box::new(f),
        });
    }

    fn find(&self, method: ApiMethod, path: &str) -> Option<&HandlerRoute> {
        self.routes
            .iter()
            .find(|r| r.method.matches(&method) && r.pattern.matches(path))
    }

    /// Number of registered routes
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Operation ids in registration order
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.operation.clone()).collect()
    }
}

/// The active interception point for one mock session
///
/// Holds the session's store and error queue plus a shared view of the
/// handler registry, and answers every intercepted call while installed.
pub struct DispatchEngine {
    registry: SharedRegistry,
    store: SharedStore,
    queue: SharedQueue,
    history: Mutex<Vec<ApiRequest>>,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("history_len", &self.history().len())
            .finish()
    }
}

impl DispatchEngine {
    /// Create an engine over the given registry, store and queue
    #[must_use]
    pub fn new(registry: SharedRegistry, store: SharedStore, queue: SharedQueue) -> Self {
        Self {
            registry,
            store,
            queue,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Dispatch one intercepted request
    pub fn dispatch(&self, request: &ApiRequest) -> PagarResult<ApiResponse> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let registry = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(route) = registry.find(request.method, &request.path) else {
            debug!(method = %request.method, path = %request.path, "no handler registered, simulating 404");
            return Err(PagarError::not_found(request.method.as_str(), &request.path));
        };

        let injected = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_matching(&route.operation);
        if let Some(error) = injected {
            debug!(operation = %route.operation, %error, "consuming error directive");
            return Err(PagarError::InjectedFailure { error });
        }

        let captures = route.pattern.capture(&request.path).unwrap_or_default();
        trace!(operation = %route.operation, path = %request.path, "invoking handler");
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        (route.handler)(&mut store, request, &captures)
    }

    /// Every request seen by this engine, in arrival order
    #[must_use]
    pub fn history(&self) -> Vec<ApiRequest> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Shared handle to the session store backing this engine
    #[must_use]
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// Shared handle to the session's error queue
    #[must_use]
    pub fn queue(&self) -> SharedQueue {
        Arc::clone(&self.queue)
    }
}

impl RequestSender for DispatchEngine {
    fn send(&self, request: &ApiRequest) -> PagarResult<ApiResponse> {
        self.dispatch(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::{CardErrorCode, DirectiveTarget, ErrorDirective, ErrorQueue, SimulatedApiError};
    use serde_json::json;

    fn engine_with_customer_routes() -> DispatchEngine {
        let registry = HandlerRegistry::shared();
        {
            let mut reg = registry.lock().unwrap();
            reg.register(
                "new_customer",
                ApiMethod::Post,
                PathPattern::Exact("/v1/customers".to_string()),
                |store, request, _| {
                    let id = request
                        .param("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or("cus_test")
                        .to_string();
                    let record = json!({ "id": id, "object": "customer" });
                    store.set("customers", &id, record.clone());
                    Ok(ApiResponse::ok(record))
                },
            );
            reg.register(
                "get_customer",
                ApiMethod::Get,
                PathPattern::Segments("/v1/customers/:id".to_string()),
                |store, request, captures| {
                    let id = &captures["id"];
                    store.get("customers", id).cloned().map_or_else(
                        || Err(PagarError::not_found(request.method.as_str(), &request.path)),
                        |record| Ok(ApiResponse::ok(record)),
                    )
                },
            );
        }
        DispatchEngine::new(registry, crate::store::SessionStore::shared(), ErrorQueue::shared())
    }

    #[test]
    fn test_unregistered_route_is_simulated_404() {
        let engine = engine_with_customer_routes();
        let err = engine.dispatch(&ApiRequest::get("/v1/accounts")).unwrap_err();
        assert!(matches!(
            err,
            PagarError::SimulatedNotFound { status: 404, .. }
        ));
    }

    #[test]
    fn test_handler_runs_against_store() {
        let engine = engine_with_customer_routes();
        let resp = engine
            .dispatch(&ApiRequest::post("/v1/customers").with_param("id", "cus_7"))
            .unwrap();
        assert_eq!(resp.status, 200);

        let fetched = engine
            .dispatch(&ApiRequest::get("/v1/customers/cus_7"))
            .unwrap();
        assert_eq!(fetched.body["id"], "cus_7");
    }

    #[test]
    fn test_directive_preempts_handler_then_reverts() {
        let engine = engine_with_customer_routes();
        engine.queue().lock().unwrap().queue(ErrorDirective::once(
            DirectiveTarget::Operation("new_customer".to_string()),
            SimulatedApiError::card_error(CardErrorCode::CardDeclined),
        ));

        let err = engine
            .dispatch(&ApiRequest::post("/v1/customers").with_param("id", "cus_1"))
            .unwrap_err();
        assert!(matches!(err, PagarError::InjectedFailure { .. }));
        // The handler never ran, so nothing was stored.
        assert_eq!(engine.store().lock().unwrap().count("customers"), 0);

        // Directive consumed: the next call goes through normally.
        let resp = engine
            .dispatch(&ApiRequest::post("/v1/customers").with_param("id", "cus_1"))
            .unwrap();
        assert_eq!(resp.body["id"], "cus_1");
    }

    #[test]
    fn test_directive_for_other_operation_not_consumed() {
        let engine = engine_with_customer_routes();
        engine.queue().lock().unwrap().queue(ErrorDirective::once(
            DirectiveTarget::Operation("get_customer".to_string()),
            SimulatedApiError::api_error("boom"),
        ));

        let resp = engine
            .dispatch(&ApiRequest::post("/v1/customers").with_param("id", "cus_2"))
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(engine.queue().lock().unwrap().len(), 1);
    }

    #[test]
    fn test_history_records_every_request() {
        let engine = engine_with_customer_routes();
        let _ = engine.dispatch(&ApiRequest::get("/v1/nope"));
        let _ = engine.dispatch(&ApiRequest::post("/v1/customers"));

        let history = engine.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].path, "/v1/nope");
    }

    #[test]
    fn test_method_must_match() {
        let engine = engine_with_customer_routes();
        let err = engine.dispatch(&ApiRequest::delete("/v1/customers")).unwrap_err();
        assert!(matches!(err, PagarError::SimulatedNotFound { .. }));
    }
}
