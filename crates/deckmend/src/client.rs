//! The AnkiConnect client and builder.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Serialize, de::DeserializeOwned};

use crate::actions::{DeckActions, MiscActions, ModelActions, NoteActions};
use crate::error::{Error, Result};
use crate::request::{AnkiRequest, AnkiResponse};

/// Default URL for AnkiConnect.
const DEFAULT_URL: &str = "http://127.0.0.1:8765";

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The main client for interacting with AnkiConnect.
///
/// Cheap to clone; clones share the underlying connection pool.
///
/// # Example
///
/// ```no_run
/// use deckmend::AnkiClient;
///
/// # async fn example() -> deckmend::Result<()> {
/// let client = AnkiClient::new();
///
/// let decks = client.decks().names().await?;
/// println!("{} decks", decks.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AnkiClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnkiClient {
    /// Create a new client with default settings.
    ///
    /// Connects to `http://127.0.0.1:8765` with a 30 second timeout.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for custom client configuration.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The AnkiConnect URL this client posts to.
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Access deck operations.
    pub fn decks(&self) -> DeckActions<'_> {
        DeckActions { client: self }
    }

    /// Access miscellaneous operations.
    pub fn misc(&self) -> MiscActions<'_> {
        MiscActions { client: self }
    }

    /// Access note operations.
    pub fn notes(&self) -> NoteActions<'_> {
        NoteActions { client: self }
    }

    /// Access model (note type) operations.
    pub fn models(&self) -> ModelActions<'_> {
        ModelActions { client: self }
    }

    /// Execute an action without parameters.
    pub(crate) async fn invoke_without_params<R>(&self, action: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let request = AnkiRequest::<()>::without_params(action, self.api_key.as_deref());
        self.send_request(&request).await
    }

    /// Execute an action with parameters.
    pub(crate) async fn invoke<P, R>(&self, action: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = AnkiRequest::new(action, params, self.api_key.as_deref());
        self.send_request(&request).await
    }

    /// Execute an action that returns null on success.
    pub(crate) async fn invoke_void<P>(&self, action: &str, params: P) -> Result<()>
    where
        P: Serialize,
    {
        let request = AnkiRequest::new(action, params, self.api_key.as_deref());
        let response = self.post(&request).await?;

        // Void actions answer `{"result": null, "error": null}`
        let anki_response: AnkiResponse<serde_json::Value> =
            response.json().await.map_err(map_transport)?;
        match anki_response.error {
            Some(err) => Err(action_error(err)),
            None => Ok(()),
        }
    }

    /// Send a request to AnkiConnect and process the response.
    async fn send_request<T, R>(&self, request: &AnkiRequest<'_, T>) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let response = self.post(request).await?;
        let anki_response: AnkiResponse<R> = response.json().await.map_err(map_transport)?;

        match (anki_response.result, anki_response.error) {
            (Some(result), None) => Ok(result),
            (None, Some(err)) => Err(action_error(err)),
            (None, None) => Err(Error::EmptyResponse),
            (Some(_), Some(err)) => Err(Error::AnkiConnect(err)),
        }
    }

    async fn post<T>(&self, request: &AnkiRequest<'_, T>) -> Result<Response>
    where
        T: Serialize,
    {
        self.http_client
            .post(&self.base_url)
            .json(request)
            .send()
            .await
            .map_err(map_transport)
    }
}

impl Default for AnkiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn map_transport(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else if e.is_connect() {
        Error::ConnectionRefused
    } else {
        Error::Http(e)
    }
}

fn action_error(err: String) -> Error {
    if err.contains("permission") {
        Error::PermissionDenied
    } else {
        Error::AnkiConnect(err)
    }
}

/// Builder for creating a customized [`AnkiClient`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use deckmend::AnkiClient;
///
/// let client = AnkiClient::builder()
///     .host("127.0.0.1")
///     .port(8765)
///     .timeout(Duration::from_secs(10))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the AnkiConnect URL.
    ///
    /// Defaults to `http://127.0.0.1:8765`.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Point the client at `http://{host}:{port}`, keeping the current port.
    pub fn host(mut self, host: &str) -> Self {
        let port = self.port_or_default();
        self.base_url = format!("http://{host}:{port}");
        self
    }

    /// Set the port, keeping the current host.
    pub fn port(mut self, port: u16) -> Self {
        let rest = self.base_url.trim_start_matches("http://");
        let host = rest.rsplit_once(':').map_or(rest, |(h, _)| h).to_string();
        self.base_url = format!("http://{host}:{port}");
        self
    }

    fn port_or_default(&self) -> u16 {
        self.base_url
            .rsplit_once(':')
            .and_then(|(_, p)| p.trim_end_matches('/').parse().ok())
            .unwrap_or(8765)
    }

    /// Set the API key for authentication.
    ///
    /// Only required if AnkiConnect is configured to require an API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the per-request timeout.
    ///
    /// Defaults to 30 seconds. Requests that exceed it fail with [`Error::Timeout`].
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Build the client, reporting an invalid HTTP configuration as [`Error::Config`].
    pub fn try_build(self) -> Result<AnkiClient> {
        let http_client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(AnkiClient {
            http_client,
            base_url: self.base_url,
            api_key: self.api_key,
        })
    }

    /// Build the client.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized; use
    /// [`try_build`](Self::try_build) to handle that case.
    pub fn build(self) -> AnkiClient {
        self.try_build().expect("Failed to build HTTP client")
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
