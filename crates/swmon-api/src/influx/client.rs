// InfluxDB v2 write client
//
// `POST /api/v2/write?org=..&bucket=..&precision=ns` with a token header and
// a line-protocol body. Only the write path is implemented.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::influx::line_protocol::{Point, encode_batch};
use crate::transport::TransportConfig;

/// Connection settings for one InfluxDB v2 bucket.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: Url,
    pub org: String,
    pub bucket: String,
    pub token: SecretString,
}

#[derive(Debug, Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    write_url: Url,
    timeout: Duration,
}

impl InfluxClient {
    pub fn new(config: &InfluxConfig, transport: &TransportConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Token {}", config.token.expose_secret()))
            .map_err(|e| Error::Authentication {
                message: format!("invalid InfluxDB token: {e}"),
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            write_url: write_url(config)?,
            timeout: transport.timeout,
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    /// Write a batch of points. Returns the number of lines sent.
    ///
    /// An empty batch (or one where no point has a usable field) is a no-op.
    pub async fn write(&self, points: &[Point]) -> Result<usize, Error> {
        let body = encode_batch(points);
        if body.is_empty() {
            return Ok(0);
        }
        let lines = body.lines().count();
        debug!(lines, "POST {}", self.write_url);

        let resp = self
            .http
            .post(self.write_url.clone())
            .body(body)
            .send()
            .await
            .map_err(|e| Error::from_send(e, Some(self.timeout)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(lines);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(Error::Influx {
            status: status.as_u16(),
            message,
        })
    }

    /// `GET /health`; `Ok` when the server answers 2xx.
    pub async fn health(&self) -> Result<(), Error> {
        let url = self.write_url.join("/health")?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::from_send(e, Some(self.timeout)))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Influx {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            })
        }
    }
}

fn write_url(config: &InfluxConfig) -> Result<Url, Error> {
    let mut url = config.url.join("/api/v2/write")?;
    url.query_pairs_mut()
        .append_pair("org", &config.org)
        .append_pair("bucket", &config.bucket)
        .append_pair("precision", "ns");
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn write_url_carries_org_bucket_and_precision() {
        let config = InfluxConfig {
            url: Url::parse("http://influx.local:8086").unwrap(),
            org: "home lab".into(),
            bucket: "switches".into(),
            token: SecretString::from("t0k"),
        };
        let url = write_url(&config).unwrap();
        assert_eq!(
            url.as_str(),
            "http://influx.local:8086/api/v2/write?org=home+lab&bucket=switches&precision=ns"
        );
    }
}
