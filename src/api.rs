//! Low-level HTTP client for the Data Mart endpoint.
//!
//! Every object lives at `<base>/DataMart?filename=<url-encoded-name>`.
//! HEAD checks existence, GET downloads and POST uploads. Each request
//! carries the company secret and project id headers.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Response, StatusCode, Url};
use tracing::debug;

use crate::config::{ClientConfig, Credentials};
use crate::error::DataMartError;

pub const COMPANY_SECRET_HEADER: &str = "x-q-company-secret";
pub const PROJECT_ID_HEADER: &str = "x-q-project-id";

/// Raw HEAD/GET/POST access to the Data Mart.
///
/// Status handling is uniform: only `200 OK` counts as success.
#[derive(Debug)]
pub struct DataMartApi {
    http: reqwest::Client,
    endpoint: Url,
    credentials: Credentials,
}

impl DataMartApi {
    pub fn new(config: &ClientConfig) -> Result<Self, DataMartError> {
        let raw = format!("{}/DataMart", config.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&raw)
            .map_err(|e| DataMartError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint,
            credentials: config.credentials.clone(),
        })
    }

    /// The full URL addressing `filename`.
    pub fn object_url(&self, filename: &str) -> String {
        format!("{}?filename={}", self.endpoint, urlencoding::encode(filename))
    }

    /// Fails with [`DataMartError::Connection`] unless both credentials are set.
    pub fn check_credentials(&self) -> Result<(), DataMartError> {
        if self.credentials.is_complete() {
            Ok(())
        } else {
            Err(DataMartError::Connection(
                "company secret and project id must both be set".into(),
            ))
        }
    }

    fn credential_headers(&self) -> Result<HeaderMap, DataMartError> {
        self.check_credentials()?;

        let secret = HeaderValue::from_str(self.credentials.company_secret()).map_err(|_| {
            DataMartError::Connection("company secret is not a valid header value".into())
        })?;
        let project_id = HeaderValue::from_str(self.credentials.project_id()).map_err(|_| {
            DataMartError::Connection("project id is not a valid header value".into())
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(COMPANY_SECRET_HEADER), secret);
        headers.insert(HeaderName::from_static(PROJECT_ID_HEADER), project_id);
        Ok(headers)
    }

    /// Issue a HEAD request and return the response status.
    ///
    /// Transport failures surface as [`DataMartError::NotFound`].
    pub async fn head_object(&self, filename: &str) -> Result<StatusCode, DataMartError> {
        let headers = self.credential_headers()?;
        debug!(filename, "HEAD Data Mart object");

        let resp = self
            .http
            .head(self.object_url(filename))
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                debug!(filename, error = %e, "HEAD request failed");
                DataMartError::not_found(filename)
            })?;

        Ok(resp.status())
    }

    /// Issue a GET request and return the response with its body unread.
    pub async fn download_object(&self, filename: &str) -> Result<Response, DataMartError> {
        let headers = self.credential_headers()?;
        debug!(filename, "GET Data Mart object");

        let resp = self
            .http
            .get(self.object_url(filename))
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                debug!(filename, error = %e, "GET request failed");
                DataMartError::not_found(filename)
            })?;

        if resp.status() != StatusCode::OK {
            debug!(filename, status = %resp.status(), "GET returned non-OK status");
            return Err(DataMartError::not_found(filename));
        }
        Ok(resp)
    }

    /// POST `body` as the full contents of `filename`.
    pub async fn upload_object(
        &self,
        filename: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DataMartError> {
        let headers = self.credential_headers()?;
        debug!(filename, content_type, bytes = body.len(), "POST Data Mart object");

        let resp = self
            .http
            .post(self.object_url(filename))
            .headers(headers)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| DataMartError::UploadFailed {
                filename: filename.to_string(),
                status: None,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let message = resp
                .text()
                .await
                .ok()
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_string()
                });
            return Err(DataMartError::UploadFailed {
                filename: filename.to_string(),
                status: Some(status.as_u16()),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base_url: &str) -> DataMartApi {
        DataMartApi::new(&ClientConfig::new(base_url, "secret", "42")).unwrap()
    }

    #[test]
    fn test_object_url_encodes_filename() {
        let api = api("http://localhost:9000/API");
        assert_eq!(
            api.object_url("my data/ß&x.csv"),
            "http://localhost:9000/API/DataMart?filename=my%20data%2F%C3%9F%26x.csv"
        );
    }

    #[test]
    fn test_object_url_trailing_slash() {
        let api = api("http://localhost:9000/API/");
        assert_eq!(
            api.object_url("a.rds"),
            "http://localhost:9000/API/DataMart?filename=a.rds"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = DataMartApi::new(&ClientConfig::new("not a url", "s", "1"));
        assert!(matches!(result, Err(DataMartError::InvalidUrl(_))));
    }

    #[test]
    fn test_credential_headers() {
        let headers = api("http://localhost").credential_headers().unwrap();
        assert_eq!(headers[COMPANY_SECRET_HEADER], "secret");
        assert_eq!(headers[PROJECT_ID_HEADER], "42");
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let api = DataMartApi::new(&ClientConfig::new("http://localhost", "", "")).unwrap();
        assert!(matches!(
            api.credential_headers(),
            Err(DataMartError::Connection(_))
        ));
    }

    #[test]
    fn test_secret_with_newline_rejected() {
        let api =
            DataMartApi::new(&ClientConfig::new("http://localhost", "bad\nsecret", "1")).unwrap();
        assert!(matches!(
            api.credential_headers(),
            Err(DataMartError::Connection(_))
        ));
    }
}
