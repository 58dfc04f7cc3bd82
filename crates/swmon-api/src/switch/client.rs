// Switch HTTP client
//
// Wraps `reqwest::Client` with TP-Link URL construction, token placement,
// and `{ success, errorcode, data }` envelope unwrapping. Login/logout live
// in `switch::auth` to keep this module focused on transport mechanics.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{SessionToken, TokenPlacement};
use crate::error::Error;
use crate::switch::endpoint::Endpoint;
use crate::transport::TransportConfig;

/// Envelope `errorcode` the firmware uses for a timed-out session.
pub const SESSION_TIMEOUT_CODE: i64 = 401;

/// The `{ success, errorcode, data }` wrapper around every data response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errorcode: Option<i64>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Raw HTTP client for one switch's web management interface.
///
/// Stateless with respect to authentication: the caller passes the
/// [`SessionToken`] on each request. [`DeviceSession`](crate::DeviceSession)
/// owns the token and the retry policy.
#[derive(Clone)]
pub struct SwitchClient {
    http: reqwest::Client,
    base_url: Url,
    /// Configured request timeout; `None` for a caller-built client.
    timeout: Option<Duration>,
    /// Kept so the login cookie survives across token refreshes.
    #[allow(dead_code)]
    cookie_jar: Option<Arc<Jar>>,
}

impl SwitchClient {
    /// Create a new switch client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically. The `base_url` is the management root, e.g.
    /// `http://192.168.0.1`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let cookie_jar = config.cookie_jar.clone();
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout: Some(config.timeout),
            cookie_jar,
        })
    }

    /// Create a switch client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout: None,
            cookie_jar: None,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Host label used in logs and metric tags.
    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or("unknown")
    }

    /// Send a prepared request, mapping a fired timeout to [`Error::Timeout`].
    pub(crate) async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Error> {
        request
            .send()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))
    }

    /// Join an absolute path onto the management root.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    /// POST one data endpoint and return the unwrapped `data` payload.
    ///
    /// Returns `Value::Null` when the device answers successfully without a
    /// `data` key (an empty log table, for example).
    pub async fn fetch(
        &self,
        endpoint: Endpoint,
        token: &SessionToken,
        payload: &Value,
    ) -> Result<Value, Error> {
        let url = self.url(endpoint.path())?;
        debug!(endpoint = %endpoint, "POST {}", url);

        let level = token.user_level.to_string();
        let builder = self.http.post(url).json(payload);
        let builder = match endpoint.token_placement() {
            TokenPlacement::Query => {
                builder.query(&[("_tid_", token.tid.as_str()), ("usrLvl", level.as_str())])
            }
            TokenPlacement::Header => builder
                .header("_tid_", token.tid.as_str())
                .header("usrLvl", level.as_str()),
        };

        let resp = self.send(builder).await?;
        self.parse_envelope(resp).await
    }

    /// Parse the `{ success, errorcode, data }` envelope.
    ///
    /// Session expiry shows up three ways: HTTP 401, the login page served
    /// as HTML in place of JSON, or `errorcode == SESSION_TIMEOUT_CODE`.
    async fn parse_envelope(&self, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }

        if status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Unavailable {
                status: status.as_u16(),
                message: preview(&body).to_owned(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::DeviceApi {
                code: i64::from(status.as_u16()),
                message: format!("HTTP {status}: {}", preview(&body)),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        if looks_like_html(&body) {
            trace!("device served HTML in place of JSON");
            return Err(Error::SessionExpired);
        }

        let envelope: Envelope = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })?;

        if envelope.success {
            return Ok(envelope.data.unwrap_or(Value::Null));
        }

        match envelope.errorcode {
            Some(SESSION_TIMEOUT_CODE) => Err(Error::SessionExpired),
            code => Err(Error::DeviceApi {
                code: code.unwrap_or(-1),
                message: "device reported success=false".into(),
            }),
        }
    }
}

pub(crate) fn looks_like_html(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

pub(crate) fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
