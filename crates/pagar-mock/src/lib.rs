//! Pagar Mock: Deterministic Test Double for Payment API Clients
//!
//! Pagar (Spanish: "to pay") Mock intercepts the outbound calls a payment
//! client library would send to a live service and answers them from an
//! in-process simulated backend, so application test suites can exercise
//! payment flows deterministically, offline, and without side effects on a
//! real account.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     PAGAR MOCK Architecture                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐     ┌────────────┐     ┌────────────────┐      │
//! │   │ Client     │     │ Dispatch   │     │ Session Store  │      │
//! │   │ under test │────►│ Engine     │────►│ + Error Queue  │      │
//! │   │            │     │            │     │ (per session)  │      │
//! │   └────────────┘     └────────────┘     └────────────────┘      │
//! │          ▲                  ▲                                    │
//! │          │       installed / removed by                          │
//! │          └──────── PaymentMock (ready / mocking / live) ─────────│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Activation (`start`) installs the dispatch engine as the exclusive
//! handler for outbound calls and creates a fresh, isolated session;
//! deactivation (`stop`) removes the hook and discards the session wholesale.
//! Two consecutive sessions never share data.
//!
//! # Example
//!
//! ```
//! use pagar_mock::{
//!     ApiMethod, ApiRequest, ApiResponse, CardErrorCode, DirectiveTarget, PathPattern,
//!     PaymentMock,
//! };
//! use serde_json::json;
//!
//! let mut mock = PaymentMock::new();
//! mock.register_handler(
//!     "new_charge",
//!     ApiMethod::Post,
//!     PathPattern::Exact("/v1/charges".to_string()),
//!     |store, _request, _captures| {
//!         store.set("charges", "ch_1", json!({"id": "ch_1", "paid": true}));
//!         Ok(ApiResponse::ok(json!({"id": "ch_1", "paid": true})))
//!     },
//! );
//!
//! mock.start().expect("activation from ready");
//!
//! // The next charge fails with a declined card, then behavior reverts.
//! mock.prepare_card_error(CardErrorCode::CardDeclined, DirectiveTarget::Any)
//!     .unwrap();
//! assert!(mock.send_request(&ApiRequest::post("/v1/charges")).is_err());
//! assert!(mock.send_request(&ApiRequest::post("/v1/charges")).is_ok());
//!
//! mock.stop();
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Request dispatch: route matching, directive consumption, handler execution
pub mod dispatch;

/// Mock session lifecycle, mode state machine, and the public control surface
pub mod engine;

/// Error injection directives and the per-session FIFO queue
pub mod inject;

/// Intercepted request and simulated response model
pub mod request;

/// Result and error types
pub mod result;

/// Session-scoped storage for simulated resources
pub mod store;

/// Test helper strategies (mock-backed vs. live-backed)
pub mod strategy;

/// The outbound "send request" seam
pub mod transport;

pub use dispatch::{DispatchEngine, Handler, HandlerRegistry, SharedRegistry};
pub use engine::{Mode, PaymentMock, SessionHandle};
pub use inject::{
    CardErrorCode, DirectiveTarget, ErrorDirective, ErrorQueue, SharedQueue, SimulatedApiError,
};
pub use request::{ApiMethod, ApiRequest, ApiResponse, PathPattern};
pub use result::{PagarError, PagarResult};
pub use store::{SessionStore, SharedStore};
pub use strategy::{LiveStrategy, MockStrategy, StrategyKind, TestStrategy};
pub use transport::RequestSender;
