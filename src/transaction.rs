//! Multi-entity transactions.
//!
//! A [`TransactionConnection`] wraps an existing connection. Reads made
//! through it (`get_one_by_id(.., &transaction)` and friends) are part of the
//! transaction; writes are queued with [`TransactionConnection::push_save`] and
//! [`TransactionConnection::push_delete`] and applied atomically by
//! [`TransactionConnection::commit`].

use async_trait::async_trait;
use tracing::{info, warn};

use crate::connection::DatastoreConnection;
use crate::entity::DatastoreEntity;
use crate::error::{DatastoreClientError, DatastorersError};
use crate::schema::{
    BeginTransactionRequest, BeginTransactionResponse, CommitMode, CommitRequest, CommitResponse,
    LookupRequest, LookupResponse, Mutation, MutationResult, ReadOptions, RollbackRequest,
    RollbackResponse, RunQueryRequest, RunQueryResponse,
};
use crate::update::{check_conflict, delete_mutation, save_mutation};

pub struct TransactionConnection<'a, C: DatastoreConnection> {
    connection: &'a C,
    transaction: String,
    mutations: Vec<Mutation>,
    finished: bool,
}

impl<'a, C: DatastoreConnection> TransactionConnection<'a, C> {
    pub async fn begin_transaction(connection: &'a C) -> Result<Self, DatastorersError> {
        let BeginTransactionResponse { transaction } = connection
            .begin_transaction(BeginTransactionRequest::default())
            .await?;
        info!(transaction = %transaction, "Began transaction");
        Ok(TransactionConnection {
            connection,
            transaction,
            mutations: Vec::new(),
            finished: false,
        })
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction
    }

    /// Number of mutations queued so far.
    pub fn pending(&self) -> usize {
        self.mutations.len()
    }

    /// Queues an upsert of `entity`, guarded by the version it was read at.
    pub fn push_save<E>(&mut self, entity: E) -> Result<(), DatastorersError>
    where
        E: TryInto<DatastoreEntity>,
        DatastorersError: From<E::Error>,
    {
        self.mutations.push(save_mutation(entity.try_into()?));
        Ok(())
    }

    /// Queues a delete of `entity`, which must have a key.
    pub fn push_delete<E>(&mut self, entity: E) -> Result<(), DatastorersError>
    where
        E: TryInto<DatastoreEntity>,
        DatastorersError: From<E::Error>,
    {
        let entity = entity.try_into()?;
        self.mutations.push(delete_mutation(&entity)?);
        Ok(())
    }

    /// Applies every queued mutation atomically.
    pub async fn commit(mut self) -> Result<Vec<MutationResult>, DatastorersError> {
        self.finished = true;
        let mutations = std::mem::take(&mut self.mutations);
        let count = mutations.len();
        let response = self
            .connection
            .commit(CommitRequest {
                mode: CommitMode::Transactional,
                mutations,
                transaction: Some(self.transaction.clone()),
            })
            .await?;
        for result in &response.mutation_results {
            check_conflict(result)?;
        }
        info!(transaction = %self.transaction, mutations = count, "Committed transaction");
        Ok(response.mutation_results)
    }

    /// Abandons the transaction and every queued mutation.
    pub async fn rollback(mut self) -> Result<(), DatastorersError> {
        self.finished = true;
        self.connection
            .rollback(RollbackRequest {
                transaction: self.transaction.clone(),
            })
            .await?;
        info!(transaction = %self.transaction, "Rolled back transaction");
        Ok(())
    }

    fn read_options(&self) -> Option<ReadOptions> {
        Some(ReadOptions::in_transaction(self.transaction.clone()))
    }
}

impl<C: DatastoreConnection> Drop for TransactionConnection<'_, C> {
    fn drop(&mut self) {
        if !self.finished && !self.mutations.is_empty() {
            warn!(
                transaction = %self.transaction,
                pending = self.mutations.len(),
                "Transaction dropped without commit; queued mutations are discarded"
            );
        }
    }
}

#[async_trait]
impl<'a, C: DatastoreConnection> DatastoreConnection for TransactionConnection<'a, C> {
    async fn lookup(&self, mut request: LookupRequest) -> Result<LookupResponse, DatastorersError> {
        request.read_options = self.read_options();
        self.connection.lookup(request).await
    }

    async fn run_query(
        &self,
        mut request: RunQueryRequest,
    ) -> Result<RunQueryResponse, DatastorersError> {
        request.read_options = self.read_options();
        self.connection.run_query(request).await
    }

    async fn begin_transaction(
        &self,
        _request: BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, DatastorersError> {
        Err(DatastoreClientError::TransactionInProgress.into())
    }

    async fn commit(&self, _request: CommitRequest) -> Result<CommitResponse, DatastorersError> {
        Err(DatastoreClientError::TransactionInProgress.into())
    }

    async fn rollback(
        &self,
        request: RollbackRequest,
    ) -> Result<RollbackResponse, DatastorersError> {
        self.connection.rollback(request).await
    }
}
