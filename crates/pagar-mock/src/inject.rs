//! Error injection: queued directives that fail the next matching dispatch.
//!
//! A directive is queued before the operation it targets occurs. The dispatch
//! engine consumes the first matching directive in FIFO order and returns the
//! injected failure instead of invoking the handler; afterwards the mock
//! reverts to normal behavior until another directive is queued.

use crate::request::ApiResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Shared handle to a session's error queue
pub type SharedQueue = Arc<Mutex<ErrorQueue>>;

/// Common card-failure taxonomy of the simulated service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardErrorCode {
    /// The card was declined
    CardDeclined,
    /// The card has expired
    ExpiredCard,
    /// The security code is wrong
    IncorrectCvc,
    /// The card number is wrong
    IncorrectNumber,
    /// The postal code check failed
    IncorrectZip,
    /// The expiry month is invalid
    InvalidExpiryMonth,
    /// The expiry year is invalid
    InvalidExpiryYear,
    /// The issuer could not process the charge
    ProcessingError,
}

impl CardErrorCode {
    /// Stable code string, as the real service reports it
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CardDeclined => "card_declined",
            Self::ExpiredCard => "expired_card",
            Self::IncorrectCvc => "incorrect_cvc",
            Self::IncorrectNumber => "incorrect_number",
            Self::IncorrectZip => "incorrect_zip",
            Self::InvalidExpiryMonth => "invalid_expiry_month",
            Self::InvalidExpiryYear => "invalid_expiry_year",
            Self::ProcessingError => "processing_error",
        }
    }

    /// Default human-readable message for this code
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::CardDeclined => "Your card was declined",
            Self::ExpiredCard => "Your card has expired",
            Self::IncorrectCvc => "Your card's security code is incorrect",
            Self::IncorrectNumber => "Your card number is incorrect",
            Self::IncorrectZip => "Your card's zip code failed validation",
            Self::InvalidExpiryMonth => "Your card's expiration month is invalid",
            Self::InvalidExpiryYear => "Your card's expiration year is invalid",
            Self::ProcessingError => "An error occurred while processing your card",
        }
    }
}

/// A simulated service error, shaped like the real wire payload
///
/// Serializes to the `{"error": {...}}` body the real service returns, so
/// injected failures and genuine handler failures are indistinguishable to
/// the code under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedApiError {
    /// Error class, e.g. `card_error` or `invalid_request_error`
    pub error_type: String,
    /// Machine-readable code, when the class defines one
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
    /// Parameter the error refers to, if any
    pub param: Option<String>,
    /// Issuer decline code, for declined cards
    pub decline_code: Option<String>,
    /// Simulated HTTP status
    pub http_status: u16,
}

impl SimulatedApiError {
    /// Create a card error from the common taxonomy (HTTP 402)
    #[must_use]
    pub fn card_error(code: CardErrorCode) -> Self {
        Self {
            error_type: "card_error".to_string(),
            code: Some(code.code().to_string()),
            message: code.message().to_string(),
            param: None,
            decline_code: matches!(code, CardErrorCode::CardDeclined)
                .then(|| "generic_decline".to_string()),
            http_status: 402,
        }
    }

    /// Create an invalid-request error (HTTP 400)
    #[must_use]
    pub fn invalid_request(message: &str, param: Option<&str>) -> Self {
        Self {
            error_type: "invalid_request_error".to_string(),
            code: None,
            message: message.to_string(),
            param: param.map(String::from),
            decline_code: None,
            http_status: 400,
        }
    }

    /// Create a generic API error (HTTP 500)
    #[must_use]
    pub fn api_error(message: &str) -> Self {
        Self {
            error_type: "api_error".to_string(),
            code: None,
            message: message.to_string(),
            param: None,
            decline_code: None,
            http_status: 500,
        }
    }

    /// Override the message
    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    /// Attach a parameter name
    #[must_use]
    pub fn with_param(mut self, param: &str) -> Self {
        self.param = Some(param.to_string());
        self
    }

    /// Render as a simulated response, for handlers that answer with an
    /// error body rather than raising
    #[must_use]
    pub fn to_response(&self) -> ApiResponse {
        let mut error = json!({
            "type": self.error_type,
            "message": self.message,
        });
        if let Some(code) = &self.code {
            error["code"] = json!(code);
        }
        if let Some(param) = &self.param {
            error["param"] = json!(param);
        }
        if let Some(decline) = &self.decline_code {
            error["decline_code"] = json!(decline);
        }
        ApiResponse::with_status(self.http_status, json!({ "error": error }))
    }
}

impl std::fmt::Display for SimulatedApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({}, HTTP {})", self.message, code, self.http_status),
            None => write!(f, "{} (HTTP {})", self.message, self.http_status),
        }
    }
}

/// Target selector for an error directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectiveTarget {
    /// Fail only dispatches of the named operation
    Operation(String),
    /// Fail the next dispatch, whatever its operation
    Any,
}

impl DirectiveTarget {
    /// Check if a dispatched operation matches this target
    #[must_use]
    pub fn matches(&self, operation: &str) -> bool {
        match self {
            Self::Operation(op) => op == operation,
            Self::Any => true,
        }
    }
}

/// A queued instruction to fail matching dispatches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDirective {
    /// Which operations this directive applies to
    pub target: DirectiveTarget,
    /// The failure to inject
    pub error: SimulatedApiError,
    /// Remaining matching dispatches to fail before the directive expires
    pub remaining: usize,
}

impl ErrorDirective {
    /// Directive that fails the next matching dispatch once
    #[must_use]
    pub fn once(target: DirectiveTarget, error: SimulatedApiError) -> Self {
        Self {
            target,
            error,
            remaining: 1,
        }
    }

    /// Directive that fails the next `times` matching dispatches
    #[must_use]
    pub fn times(mut self, times: usize) -> Self {
        self.remaining = times.max(1);
        self
    }
}

/// Ordered, per-session queue of error directives
///
/// Consumption is FIFO per matching operation: a dispatch consumes the
/// oldest directive whose target matches it, and never an unrelated one.
#[derive(Debug, Default)]
pub struct ErrorQueue {
    directives: VecDeque<ErrorDirective>,
}

impl ErrorQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue behind a shared handle
    #[must_use]
    pub fn shared() -> SharedQueue {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Append a directive
    pub fn queue(&mut self, directive: ErrorDirective) {
        self.directives.push_back(directive);
    }

    /// Consume and return the oldest directive matching the operation
    ///
    /// Directives queued with a trigger count above one stay queued until
    /// the count is exhausted.
    pub fn take_matching(&mut self, operation: &str) -> Option<SimulatedApiError> {
        let index = self
            .directives
            .iter()
            .position(|d| d.target.matches(operation))?;

        let directive = &mut self.directives[index];
        let error = directive.error.clone();
        directive.remaining -= 1;
        if directive.remaining == 0 {
            self.directives.remove(index);
        }
        Some(error)
    }

    /// Number of queued directives
    #[must_use]
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}
