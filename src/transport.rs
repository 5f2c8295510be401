//! Outbound HTTP for output integrations.

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use thiserror::Error;
use tracing::{debug, error};

/// The single error kind raised by [`TransportHelper::send`].
///
/// `status` is `None` when the request never produced a response (connection
/// refused, TLS failure, invalid header); `body` then carries the transport
/// error text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to send to {url} - [{}] {body}", status_label(.status))]
pub struct RequestFailure {
    pub url: String,
    pub status: Option<u16>,
    pub body: String,
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "no response".to_string(), |code| code.to_string())
}

impl RequestFailure {
    fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        Self {
            url: url.to_string(),
            status: None,
            body: err.to_string(),
        }
    }
}

/// True iff `status` is in the 2xx range.
pub fn is_success_status(status: u16) -> bool {
    (200..=299).contains(&status)
}

/// True iff a response exists and carries a 2xx status.
pub fn is_success_response(response: Option<&Response>) -> bool {
    response.is_some_and(|resp| is_success_status(resp.status().as_u16()))
}

/// Stateless helper that posts payloads to output endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportHelper;

impl TransportHelper {
    pub fn new() -> Self {
        Self
    }

    /// Posts `body` to `url`.
    ///
    /// Requests default to a JSON content type unless `headers` sets one.
    /// With `verify_tls` false both certificate and hostname checks are
    /// disabled for this request only.
    ///
    /// # Returns
    /// * `Ok(Response)` for any response below 400, left for the caller to inspect
    /// * `Err(RequestFailure)` for 4xx/5xx statuses and transport errors
    pub fn send(
        &self,
        url: &str,
        body: impl Into<String>,
        headers: Option<&[(&str, &str)]>,
        verify_tls: bool,
    ) -> Result<Response, RequestFailure> {
        let client = Self::client(verify_tls).map_err(|err| RequestFailure::transport(url, err))?;
        let header_map =
            Self::header_map(headers.unwrap_or_default()).map_err(|err| RequestFailure::transport(url, err))?;

        debug!(url = %url, verify_tls, "sending request");
        let response = client
            .post(url)
            .headers(header_map)
            .body(body.into())
            .send()
            .map_err(|err| {
                error!(url = %url, error = %err, "request failed before a response was received");
                RequestFailure::transport(url, err)
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().unwrap_or_default();
            return Err(RequestFailure {
                url: url.to_string(),
                status: Some(status.as_u16()),
                body,
            });
        }

        Ok(response)
    }

    fn client(verify_tls: bool) -> reqwest::Result<Client> {
        let mut builder = Client::builder();
        if !verify_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        builder.build()
    }

    fn header_map(headers: &[(&str, &str)]) -> anyhow::Result<HeaderMap> {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            map.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        Ok(map)
    }
}
