use std::future::Future;

use reqwest::{header::HeaderMap, redirect, Client, ClientBuilder};
use url::Url;

/// Failures below the level of the report envelope.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a status outside 2xx/3xx.
    #[error("server responded with HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, kept for diagnostics.
        body: Vec<u8>,
    },
}

/// Something that can POST a body and hand back the response bytes.
///
/// 2xx responses yield their body, 3xx responses yield an empty body (redirects are not
/// followed) and anything else is a [`TransportError::Status`].
pub trait HttpClient: Send + Sync {
    /// Issue a POST request.
    fn post(
        &self,
        url: &Url,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    /// Shared connection pool.
    client: Client,
}

impl ReqwestHttpClient {
    /// Build a client that never follows redirects.
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            client: Self::builder().build()?,
        })
    }

    fn builder() -> ClientBuilder {
        Client::builder().redirect(redirect::Policy::none())
    }
}

impl HttpClient for ReqwestHttpClient {
    async fn post(
        &self,
        url: &Url,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .post(url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.bytes().await?.to_vec())
        } else if status.is_redirection() {
            Ok(Vec::new())
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
                body: response.bytes().await?.to_vec(),
            })
        }
    }
}
