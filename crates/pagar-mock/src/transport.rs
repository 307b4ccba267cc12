//! The outbound "send request" seam.
//!
//! The client library under test is consumed only through this capability.
//! While a mock session is active the dispatch engine is installed as the
//! exclusive sender; deactivation restores whatever passthrough the caller
//! configured, exactly as it was.

use crate::request::{ApiRequest, ApiResponse};
use crate::result::PagarResult;

/// A generic outbound-call capability: (method, path, parameters) in,
/// result-or-failure out.
pub trait RequestSender: Send {
    /// Send one request and return the service's answer
    fn send(&self, request: &ApiRequest) -> PagarResult<ApiResponse>;
}

impl<F> RequestSender for F
where
    F: Fn(&ApiRequest) -> PagarResult<ApiResponse> + Send,
{
    fn send(&self, request: &ApiRequest) -> PagarResult<ApiResponse> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closures_are_senders() {
        let sender = |req: &ApiRequest| Ok(ApiResponse::ok(json!({ "echo": req.path })));
        let resp = sender.send(&ApiRequest::get("/v1/ping")).unwrap();
        assert_eq!(resp.body["echo"], "/v1/ping");
    }
}
