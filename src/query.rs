//! Reads: lookups by key and property queries, single results and pages.
//!
//! The untyped functions work on [`DatastoreEntity`]; the typed ones convert
//! into any [`DatastoreManaged`] type and are what derived `get_*` methods call.

use tracing::{debug, info, warn};

use crate::connection::DatastoreConnection;
use crate::entity::{DatastoreEntity, DatastoreManaged};
use crate::error::{DatastoreClientError, DatastorersError};
use crate::schema::{Filter, Key, KindExpression, LookupRequest, Query, RunQueryRequest, Value};

/// Lookup calls made for one key while the service keeps deferring it.
const MAX_DEFERRED_ROUNDS: usize = 5;

/// A query over all entities of `kind`.
pub fn kind_query(kind: &str) -> Query {
    Query {
        kind: vec![KindExpression {
            name: kind.to_string(),
        }],
        ..Default::default()
    }
}

/// A query for entities of `kind` whose `property` equals `value`. Array
/// properties match when any element equals `value`.
pub fn property_query(kind: &str, property: &str, value: Value) -> Query {
    Query {
        filter: Some(Filter::equal(property, value)),
        ..kind_query(kind)
    }
}

/// One batch of query results.
#[derive(Debug, Clone)]
pub struct Page {
    pub entities: Vec<DatastoreEntity>,
    pub end_cursor: Option<String>,
    pub has_more_results: bool,
}

/// Looks up one key. Keys the service defers are requested again; a key
/// still deferred after [`MAX_DEFERRED_ROUNDS`] calls fails with
/// [`DatastoreClientError::LookupDeferred`] rather than `NotFound`.
pub async fn get_one_by_key(
    key: Key,
    connection: &impl DatastoreConnection,
) -> Result<DatastoreEntity, DatastorersError> {
    let mut keys = vec![key];
    let mut found = Vec::new();

    for round in 1..=MAX_DEFERRED_ROUNDS {
        let response = connection
            .lookup(LookupRequest {
                read_options: None,
                keys,
            })
            .await?;
        found.extend(response.found);
        keys = response.deferred;
        if keys.is_empty() {
            break;
        }
        debug!(round, deferred = keys.len(), "Lookup deferred keys");
    }
    if !keys.is_empty() {
        warn!(rounds = MAX_DEFERRED_ROUNDS, "Lookup still deferred");
        return Err(DatastoreClientError::LookupDeferred.into());
    }

    match found.len() {
        0 => Err(DatastoreClientError::NotFound.into()),
        1 => Ok(found.remove(0).into()),
        _ => Err(DatastoreClientError::AmbiguousResult.into()),
    }
}

pub async fn get_one_entity_by_id(
    kind: &str,
    id: i64,
    connection: &impl DatastoreConnection,
) -> Result<DatastoreEntity, DatastorersError> {
    debug!(kind, id, "Looking up entity by id");
    get_one_by_key(Key::from_id(kind, id), connection).await
}

pub async fn get_one_entity_by_name(
    kind: &str,
    name: &str,
    connection: &impl DatastoreConnection,
) -> Result<DatastoreEntity, DatastorersError> {
    debug!(kind, name, "Looking up entity by name");
    get_one_by_key(Key::from_name(kind, name), connection).await
}

/// Runs `query` for exactly one entity: none is `NotFound`, several is `AmbiguousResult`.
pub async fn fetch_one(
    mut query: Query,
    connection: &impl DatastoreConnection,
) -> Result<DatastoreEntity, DatastorersError> {
    query.limit = Some(2);
    let mut page = fetch_page(query, connection).await?;
    match page.entities.len() {
        0 => Err(DatastoreClientError::NotFound.into()),
        1 => Ok(page.entities.remove(0)),
        _ => Err(DatastoreClientError::AmbiguousResult.into()),
    }
}

/// Runs `query` once and returns the batch the service produced.
pub async fn fetch_page(
    query: Query,
    connection: &impl DatastoreConnection,
) -> Result<Page, DatastorersError> {
    let response = connection
        .run_query(RunQueryRequest {
            read_options: None,
            query,
        })
        .await?;
    let batch = response.batch;
    let entities: Vec<DatastoreEntity> = batch
        .entity_results
        .into_iter()
        .map(DatastoreEntity::from)
        .collect();
    let has_more_results = batch.more_results.may_have_more() && !entities.is_empty();
    debug!(
        count = entities.len(),
        more_results = ?batch.more_results,
        has_more_results,
        "Fetched query page"
    );
    Ok(Page {
        entities,
        end_cursor: batch.end_cursor,
        has_more_results,
    })
}

/// A page of typed results that knows how to fetch the page after it.
#[derive(Debug)]
pub struct ResultCollection<E> {
    pub result: Vec<E>,
    pub has_more_results: bool,
    query: Query,
    end_cursor: Option<String>,
}

impl<E> ResultCollection<E>
where
    E: TryFrom<DatastoreEntity, Error = DatastorersError>,
{
    async fn fetch(
        query: Query,
        connection: &impl DatastoreConnection,
    ) -> Result<Self, DatastorersError> {
        let page = fetch_page(query.clone(), connection).await?;
        let result = page
            .entities
            .into_iter()
            .map(E::try_from)
            .collect::<Result<Vec<E>, DatastorersError>>()?;
        Ok(ResultCollection {
            result,
            has_more_results: page.has_more_results,
            query,
            end_cursor: page.end_cursor,
        })
    }

    /// Fetches the following page with the same filter and page size.
    pub async fn get_next_page(
        &self,
        connection: &impl DatastoreConnection,
    ) -> Result<ResultCollection<E>, DatastorersError> {
        if !self.has_more_results {
            return Err(DatastoreClientError::NoMorePages.into());
        }
        let query = Query {
            start_cursor: self.end_cursor.clone(),
            ..self.query.clone()
        };
        Self::fetch(query, connection).await
    }
}

pub async fn get_one_by_id<E: DatastoreManaged>(
    id: i64,
    connection: &impl DatastoreConnection,
) -> Result<E, DatastorersError> {
    let entity = get_one_entity_by_id(E::KIND, id, connection).await?;
    E::try_from(entity)
}

pub async fn get_one_by_name<E: DatastoreManaged>(
    name: &str,
    connection: &impl DatastoreConnection,
) -> Result<E, DatastorersError> {
    let entity = get_one_entity_by_name(E::KIND, name, connection).await?;
    E::try_from(entity)
}

pub async fn get_one_by_property<E: DatastoreManaged>(
    property: &str,
    value: Value,
    connection: &impl DatastoreConnection,
) -> Result<E, DatastorersError> {
    info!(kind = E::KIND, property, "Fetching one entity by property");
    let entity = fetch_one(property_query(E::KIND, property, value), connection).await?;
    E::try_from(entity)
}

pub async fn get_by_property<E: DatastoreManaged>(
    property: &str,
    value: Value,
    connection: &impl DatastoreConnection,
) -> Result<ResultCollection<E>, DatastorersError> {
    info!(kind = %E::KIND, property, page_size = E::PAGE_SIZE, "Fetching entities by property");
    let query = Query {
        limit: Some(E::PAGE_SIZE),
        ..property_query(E::KIND, property, value)
    };
    ResultCollection::fetch(query, connection).await
}

pub async fn get_all<E: DatastoreManaged>(
    connection: &impl DatastoreConnection,
) -> Result<ResultCollection<E>, DatastorersError> {
    info!(kind = %E::KIND, page_size = E::PAGE_SIZE, "Fetching all entities of kind");
    let query = Query {
        limit: Some(E::PAGE_SIZE),
        ..kind_query(E::KIND)
    };
    ResultCollection::fetch(query, connection).await
}
