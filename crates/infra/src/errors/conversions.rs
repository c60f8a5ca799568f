//! Conversions from external infrastructure errors into domain errors.

use courier_domain::{DispatchError, ErrorCode};
use reqwest::Error as HttpError;

use crate::http::{TransportError, TransportErrorKind};

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for TransportError {
    fn from(err: HttpError) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if is_connect(&err) {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        TransportError::new(kind, err.to_string())
    }
}

fn is_connect(err: &HttpError) -> bool {
    #[cfg(not(target_arch = "wasm32"))]
    {
        err.is_connect()
    }
    #[cfg(target_arch = "wasm32")]
    {
        false
    }
}

/* -------------------------------------------------------------------------- */
/* TransportError → DispatchError */
/* -------------------------------------------------------------------------- */

impl From<TransportError> for DispatchError {
    fn from(err: TransportError) -> Self {
        let code = match err.kind {
            TransportErrorKind::Timeout => ErrorCode::TimeoutError,
            TransportErrorKind::Connect | TransportErrorKind::Other => ErrorCode::NetworkError,
        };
        DispatchError::new(code, err.to_string())
            .with_details(serde_json::json!({ "transport": err.kind.to_string() }))
    }
}
