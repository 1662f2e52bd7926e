//! WebSocket handshake request construction.

use std::collections::HashMap;

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::error::{NetworkError, Result};

/// Build a client handshake request for `url` carrying custom headers and an
/// optional `Sec-WebSocket-Protocol`.
pub fn handshake_request(
    url: &str,
    headers: &HashMap<String, String>,
    subprotocol: Option<&str>,
) -> Result<Request> {
    let mut request = url
        .into_client_request()
        .map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;

    let request_headers = request.headers_mut();
    for (name, value) in headers {
        let header_name = http::header::HeaderName::try_from(name.as_str())?;
        let header_value = http::header::HeaderValue::try_from(value.as_str())?;
        request_headers.insert(header_name, header_value);
    }

    if let Some(protocol) = subprotocol {
        request_headers.insert(
            http::header::SEC_WEBSOCKET_PROTOCOL,
            http::header::HeaderValue::try_from(protocol)?,
        );
    }

    Ok(request)
}
