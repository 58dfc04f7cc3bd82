// Switch authentication
//
// `POST /data/login.json` exchanges credentials for a `_tid_` session token;
// `POST /data/logout.json` releases it. The token is then echoed on every
// data request by `SwitchClient::fetch`.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::auth::{Credentials, SessionToken};
use crate::error::Error;
use crate::switch::client::{SwitchClient, looks_like_html, preview};
use crate::switch::models::lenient_u8;

const LOGIN_PATH: &str = "/data/login.json";
const LOGOUT_PATH: &str = "/data/logout.json";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errorcode: Option<i64>,
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(rename = "_tid_")]
    tid: String,
    #[serde(rename = "usrLvl", default, deserialize_with = "lenient_u8")]
    user_level: u8,
}

impl SwitchClient {
    /// Authenticate and return a fresh session token.
    ///
    /// `ttl` sets the local expiry on the returned token; `None` leaves
    /// expiry detection entirely to the device.
    pub async fn login(
        &self,
        credentials: &Credentials,
        ttl: Option<Duration>,
    ) -> Result<SessionToken, Error> {
        let url = self.url(LOGIN_PATH)?;
        debug!("logging in at {}", url);

        let body = json!({
            "username": credentials.username,
            "password": credentials.password.expose_secret(),
            "operation": "write",
        });

        let resp = self.send(self.http().post(url).json(&body)).await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = format!("login failed (HTTP {status}): {}", preview(&body));
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Error::Authentication { message }
                }
                s if s.is_server_error() => Error::Unavailable {
                    status: s.as_u16(),
                    message,
                },
                s => Error::DeviceApi {
                    code: i64::from(s.as_u16()),
                    message,
                },
            });
        }

        let text = resp.text().await.map_err(Error::Transport)?;
        if looks_like_html(&text) {
            return Err(Error::Authentication {
                message: "login returned HTML in place of JSON".into(),
            });
        }

        let parsed: LoginResponse =
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: format!("login response: {e}"),
                body: text.clone(),
            })?;

        if !parsed.success {
            return Err(Error::Authentication {
                message: format!(
                    "device rejected credentials (errorcode {})",
                    parsed.errorcode.unwrap_or(-1)
                ),
            });
        }

        let data = parsed.data.ok_or_else(|| Error::Authentication {
            message: "login response carried no session token".into(),
        })?;
        if data.tid.is_empty() {
            return Err(Error::Authentication {
                message: "login response carried an empty session token".into(),
            });
        }

        debug!(user_level = data.user_level, "login successful");
        Ok(SessionToken::new(data.tid, data.user_level, ttl))
    }

    /// Release the session on the device. Best-effort: the response body
    /// is ignored.
    pub async fn logout(&self, token: &SessionToken) -> Result<(), Error> {
        let url = self.url(LOGOUT_PATH)?;
        debug!("logging out at {}", url);

        let level = token.user_level.to_string();
        let request = self
            .http()
            .post(url)
            .query(&[("_tid_", token.tid.as_str()), ("usrLvl", level.as_str())])
            .json(&json!({ "operation": "write" }));
        let _resp = self.send(request).await?;

        debug!("logout complete");
        Ok(())
    }
}
