//! # connection: transport to the Datastore v1 API
//!
//! [`DatastoreConnection`] is the single seam between the mapping layer and
//! the network. Everything above it (queries, commits, transactions) speaks
//! in terms of the request/response types from [`crate::schema`].
//!
//! - [`DatastoreClient`] implements it over HTTPS (or plain HTTP for the
//!   emulator) with `reqwest`.
//! - [`crate::transaction::TransactionConnection`] implements it on top of
//!   another connection, scoping reads to a transaction.
//! - `MockDatastoreConnection` is generated by `mockall` for tests (feature
//!   `test-export-mocks`).

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ConnectionConfig;
use crate::error::{self, DatastorersError};
use crate::schema::{
    BeginTransactionRequest, BeginTransactionResponse, CommitRequest, CommitResponse,
    LookupRequest, LookupResponse, RollbackRequest, RollbackResponse, RunQueryRequest,
    RunQueryResponse,
};

/// The Datastore RPCs the mapping layer relies on.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DatastoreConnection: Send + Sync {
    /// Looks up entities by key.
    async fn lookup(&self, request: LookupRequest) -> Result<LookupResponse, DatastorersError>;

    /// Runs a query and returns one batch of results.
    async fn run_query(
        &self,
        request: RunQueryRequest,
    ) -> Result<RunQueryResponse, DatastorersError>;

    /// Opens a read-write transaction.
    async fn begin_transaction(
        &self,
        request: BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, DatastorersError>;

    /// Applies mutations, optionally inside a transaction.
    async fn commit(&self, request: CommitRequest) -> Result<CommitResponse, DatastorersError>;

    /// Abandons a transaction.
    async fn rollback(
        &self,
        request: RollbackRequest,
    ) -> Result<RollbackResponse, DatastorersError>;
}

/// HTTP client for one Datastore project.
pub struct DatastoreClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    access_token: Option<String>,
}

impl DatastoreClient {
    pub fn new(config: ConnectionConfig) -> Result<Self, DatastorersError> {
        if config.project_id.trim().is_empty() {
            tracing::error!("Datastore project id is empty");
            return Err(DatastorersError::Config(
                "the datastore project id must not be empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                DatastorersError::Transport(e)
            })?;

        let endpoint = config.resolved_endpoint();
        let access_token = if config.uses_emulator() {
            None
        } else {
            if config.access_token.is_none() {
                tracing::warn!(
                    endpoint = %endpoint,
                    "No access token configured; requests to the service will likely be rejected"
                );
            }
            config.access_token
        };

        tracing::info!(
            project_id = %config.project_id,
            endpoint = %endpoint,
            "Initialised datastore client"
        );
        Ok(DatastoreClient {
            http,
            endpoint,
            project_id: config.project_id,
            access_token,
        })
    }

    /// Shorthand for [`ConnectionConfig::from_env`] followed by [`DatastoreClient::new`].
    pub fn from_env() -> Result<Self, DatastorersError> {
        Self::new(ConnectionConfig::from_env()?)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn method_url(&self, method: &str) -> String {
        let (endpoint, project) = (&self.endpoint, &self.project_id);
        format!("{endpoint}/v1/projects/{project}:{method}")
    }

    async fn call<Req, Resp>(&self, method: &str, body: &Req) -> Result<Resp, DatastorersError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.method_url(method);
        tracing::debug!(method, url = %url, "Calling datastore");

        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = ?e, method, "Datastore request failed to send");
            DatastorersError::Transport(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Resp>().await.map_err(|e| {
                tracing::error!(error = ?e, method, "Failed to decode datastore response");
                DatastorersError::Transport(e)
            });
        }

        let text = response.text().await.unwrap_or_default();
        let err = error::from_api_response(status.as_u16(), &text);
        tracing::error!(method, status = status.as_u16(), error = %err, "Datastore call failed");
        Err(err)
    }
}

#[async_trait]
impl DatastoreConnection for DatastoreClient {
    async fn lookup(&self, request: LookupRequest) -> Result<LookupResponse, DatastorersError> {
        self.call("lookup", &request).await
    }

    async fn run_query(
        &self,
        request: RunQueryRequest,
    ) -> Result<RunQueryResponse, DatastorersError> {
        self.call("runQuery", &request).await
    }

    async fn begin_transaction(
        &self,
        request: BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, DatastorersError> {
        self.call("beginTransaction", &request).await
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitResponse, DatastorersError> {
        self.call("commit", &request).await
    }

    async fn rollback(
        &self,
        request: RollbackRequest,
    ) -> Result<RollbackResponse, DatastorersError> {
        self.call("rollback", &request).await
    }
}
