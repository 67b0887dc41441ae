//! Writes: commit (upsert) and delete of single entities with optimistic
//! concurrency through base versions.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::connection::DatastoreConnection;
use crate::entity::{DatastoreEntity, DatastoreManaged};
use crate::error::{DatastoreClientError, DatastorersError};
use crate::schema::{
    BeginTransactionRequest, CommitMode, CommitRequest, CommitResponse, Key, Mutation,
    MutationResult,
};

#[async_trait]
pub trait DatastorersUpdatable: Sized {
    /// Inserts or updates the entity and returns it with its assigned key and new version.
    async fn commit<C>(self, connection: &C) -> Result<Self, DatastorersError>
    where
        C: DatastoreConnection;

    /// Deletes the entity. Fails with `DataConflict` if it changed since it was read.
    async fn delete<C>(self, connection: &C) -> Result<(), DatastorersError>
    where
        C: DatastoreConnection;
}

#[async_trait]
impl<E> DatastorersUpdatable for E
where
    E: DatastoreManaged,
{
    async fn commit<C>(self, connection: &C) -> Result<Self, DatastorersError>
    where
        C: DatastoreConnection,
    {
        let committed = commit_one(connection, self.try_into()?).await?;
        E::try_from(committed)
    }

    async fn delete<C>(self, connection: &C) -> Result<(), DatastorersError>
    where
        C: DatastoreConnection,
    {
        delete_one(connection, self.try_into()?).await
    }
}

async fn commit(
    connection: &impl DatastoreConnection,
    mutations: Vec<Mutation>,
) -> Result<CommitResponse, DatastorersError> {
    let transaction = connection
        .begin_transaction(BeginTransactionRequest::default())
        .await?
        .transaction;
    connection
        .commit(CommitRequest {
            mode: CommitMode::Transactional,
            mutations,
            transaction: Some(transaction),
        })
        .await
}

/// Whether the datastore is expected to hand back a key: true for incomplete keys.
fn expects_key_after_commit(key: Option<&Key>) -> Result<bool, DatastoreClientError> {
    match key {
        Some(k) => Ok(!k.is_complete()),
        None => Err(DatastoreClientError::KeyMissing),
    }
}

pub(crate) fn check_conflict(result: &MutationResult) -> Result<(), DatastorersError> {
    if result.conflict_detected {
        return Err(DatastoreClientError::DataConflict.into());
    }
    Ok(())
}

/// The upsert mutation for an entity, guarded by the version it was read at.
pub(crate) fn save_mutation(entity: DatastoreEntity) -> Mutation {
    let base_version = entity.version();
    Mutation {
        upsert: Some(entity.into()),
        base_version,
        ..Default::default()
    }
}

pub(crate) fn delete_mutation(entity: &DatastoreEntity) -> Result<Mutation, DatastorersError> {
    let key = entity
        .key()
        .cloned()
        .ok_or(DatastoreClientError::NotFound)?;
    Ok(Mutation {
        delete: Some(key),
        base_version: entity.version(),
        ..Default::default()
    })
}

pub async fn commit_one(
    connection: &impl DatastoreConnection,
    entity: DatastoreEntity,
) -> Result<DatastoreEntity, DatastorersError> {
    let expects_key = expects_key_after_commit(entity.key())?;
    let mut result_entity = entity.clone();

    let response = commit(connection, vec![save_mutation(entity)]).await?;

    let result = match response.mutation_results.as_slice() {
        [] => return Err(DatastoreClientError::KeyAssignmentFailed.into()),
        [result] => result,
        _ => return Err(DatastoreClientError::AmbiguousResult.into()),
    };
    check_conflict(result)?;

    if expects_key {
        match &result.key {
            Some(key) => result_entity.set_key(Some(key.clone())),
            None => return Err(DatastoreClientError::KeyAssignmentFailed.into()),
        }
    }
    if result.version.is_some() {
        result_entity.set_version(result.version);
    }

    info!(
        kind = result_entity.key().and_then(Key::kind),
        id = result_entity.key().and_then(Key::id),
        version = result_entity.version(),
        inserted = expects_key,
        "Committed entity"
    );
    Ok(result_entity)
}

pub async fn delete_one(
    connection: &impl DatastoreConnection,
    entity: DatastoreEntity,
) -> Result<(), DatastorersError> {
    let mutation = delete_mutation(&entity)?;
    let response = commit(connection, vec![mutation]).await?;

    match response.mutation_results.as_slice() {
        [] => Err(DatastoreClientError::DeleteFailed.into()),
        [result] => {
            check_conflict(result)?;
            debug!(key = ?entity.key(), "Deleted entity");
            Ok(())
        }
        _ => Err(DatastoreClientError::AmbiguousResult.into()),
    }
}
