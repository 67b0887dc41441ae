//! Scenarios against a real Datastore project (or emulator). Run with
//! `cargo test --features integration_tests` and `TEST_PROJECT_NAME` set.

mod connection;

use crate::connection::create_test_connection;
use datastorers::{
    DatastoreClientError, DatastoreManaged, DatastoreParseError, DatastorersError,
    DatastorersUpdatable, Key, TransactionConnection,
};
use uuid::Uuid;

#[derive(DatastoreManaged, Clone, Debug)]
#[kind = "Test"]
#[page_size = 2]
pub struct TestEntity {
    #[key]
    pub key: Option<Key>,

    #[version]
    pub version: Option<i64>,

    #[indexed]
    #[property = "Name"]
    pub prop_string: String,

    #[property = "bool_property"]
    pub prop_bool: bool,

    #[indexed]
    #[property = "int_property"]
    pub prop_int: i64,

    #[indexed]
    #[property = "str_array_property"]
    pub prop_string_array: Vec<String>,
}

#[derive(DatastoreManaged, Clone, Debug, Default)]
#[kind = "Test"]
#[page_size = 2]
pub struct TestEntityOptional {
    #[key]
    pub key: Option<Key>,

    #[indexed]
    #[property = "Name"]
    pub prop_string: Option<String>,

    #[property = "bool_property"]
    pub prop_bool: Option<bool>,

    #[property = "int_property"]
    pub prop_int: Option<i64>,

    #[property = "str_array_property"]
    pub prop_string_array: Option<Vec<String>>,
}

fn generate_random_string(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_string()
}

fn generate_random_bool() -> bool {
    Uuid::new_v4().as_bytes()[0] & 1 == 1
}

fn generate_random_int() -> i64 {
    Uuid::new_v4().as_u128() as i64
}

fn generate_random_entity() -> TestEntity {
    TestEntity {
        key: None,
        version: None,
        prop_string: generate_random_string(10),
        prop_bool: generate_random_bool(),
        prop_int: generate_random_int(),
        prop_string_array: vec![],
    }
}

fn assert_client_error<T>(
    result: Result<T, DatastorersError>,
    expected_error: DatastoreClientError,
) {
    match result {
        Ok(_) => panic!("expected {expected_error}, got a result"),
        Err(DatastorersError::DatastoreClientError(client_error)) => {
            assert_eq!(
                client_error, expected_error,
                "Expected error to be {expected_error}"
            )
        }
        Err(e) => panic!("Expected DatastoreClientError, got {e}"),
    }
}

fn assert_parse_error<T>(result: Result<T, DatastorersError>, expected_error: DatastoreParseError) {
    match result {
        Ok(_) => panic!("expected {expected_error}, got a result"),
        Err(DatastorersError::ParseError(parse_error)) => {
            assert_eq!(
                parse_error, expected_error,
                "Expected error to be {expected_error}"
            )
        }
        Err(e) => panic!("Expected DatastoreParseError, got {e}"),
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_insert_and_update() -> Result<(), DatastorersError> {
    let connection = create_test_connection();
    let original_entity = generate_random_entity();
    let original_bool_value = original_entity.prop_bool;

    let mut test_entity = original_entity.commit(&connection).await?;
    assert!(test_entity.key.is_some());
    let id_after_insert = test_entity.id().expect("inserted entity has an id");

    test_entity.prop_bool = !original_bool_value;
    let updated = test_entity.commit(&connection).await?;

    assert_eq!(updated.prop_bool, !original_bool_value);
    assert_eq!(Some(id_after_insert), updated.id());

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_get_by_id() -> Result<(), DatastorersError> {
    let connection = create_test_connection();

    let entity = generate_random_entity();
    let original_string = entity.prop_string.clone();
    let original_int = entity.prop_int;
    let inserted = entity.commit(&connection).await?;

    assert_client_error(
        TestEntity::get_one_by_id(generate_random_int(), &connection).await,
        DatastoreClientError::NotFound,
    );

    let inserted_id = inserted.id().expect("inserted entity has an id");
    let fetched_entity = TestEntity::get_one_by_id(inserted_id, &connection).await?;

    assert_eq!(original_string, fetched_entity.prop_string);
    assert_eq!(original_int, fetched_entity.prop_int);
    assert_eq!(inserted.version, fetched_entity.version);

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_get_by_property() -> Result<(), DatastorersError> {
    let connection = create_test_connection();

    let expected_result_entity = generate_random_entity().commit(&connection).await?;
    let duplicated_entity = generate_random_entity();
    duplicated_entity.clone().commit(&connection).await?;
    duplicated_entity.clone().commit(&connection).await?;

    assert_client_error(
        TestEntity::get_one_by_prop_string(generate_random_string(10), &connection).await,
        DatastoreClientError::NotFound,
    );

    assert_client_error(
        TestEntity::get_one_by_prop_string(duplicated_entity.prop_string, &connection).await,
        DatastoreClientError::AmbiguousResult,
    );

    let fetched_entity =
        TestEntity::get_one_by_prop_string(expected_result_entity.prop_string, &connection)
            .await?;
    assert_eq!(fetched_entity.prop_int, expected_result_entity.prop_int);

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_get_collection_by_property() -> Result<(), DatastorersError> {
    let page_size = TestEntity::PAGE_SIZE as usize;
    let connection = create_test_connection();

    let common_string_prop = generate_random_string(15);
    let mut int_props = vec![];
    let mut fetched_int_props = vec![];
    for _ in 0..5 {
        let mut entity = generate_random_entity();
        entity.prop_string = common_string_prop.clone();
        let inserted = entity.commit(&connection).await?;
        int_props.push(inserted.prop_int);
    }

    let page = TestEntity::get_by_prop_string(common_string_prop, &connection).await?;
    assert_eq!(page.result.len(), page_size);
    assert!(page.has_more_results);
    fetched_int_props.extend(page.result.iter().map(|e| e.prop_int));

    let page_two = page.get_next_page(&connection).await?;
    assert_eq!(page_two.result.len(), page_size);
    assert!(page_two.has_more_results);
    fetched_int_props.extend(page_two.result.iter().map(|e| e.prop_int));

    let last_page = page_two.get_next_page(&connection).await?;
    assert_eq!(last_page.result.len(), 1);
    assert!(!last_page.has_more_results);
    fetched_int_props.extend(last_page.result.iter().map(|e| e.prop_int));

    assert_client_error(
        last_page.get_next_page(&connection).await,
        DatastoreClientError::NoMorePages,
    );

    int_props.sort();
    fetched_int_props.sort();
    assert_eq!(fetched_int_props, int_props);

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_get_all_pages_by_kind() -> Result<(), DatastorersError> {
    let connection = create_test_connection();
    generate_random_entity().commit(&connection).await?;

    let page = TestEntity::get_all(&connection).await?;
    assert!(!page.result.is_empty());
    assert!(page.result.len() <= TestEntity::PAGE_SIZE as usize);

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_update_property() -> Result<(), DatastorersError> {
    let connection = create_test_connection();

    let original = generate_random_entity();
    let inserted = original.clone().commit(&connection).await?;

    let mut fetched =
        TestEntity::get_one_by_prop_string(original.prop_string.clone(), &connection).await?;
    assert_eq!(inserted.key, fetched.key);

    let new_string_prop = generate_random_string(10);
    fetched.prop_string = new_string_prop.clone();
    fetched.commit(&connection).await?;

    assert_client_error(
        TestEntity::get_one_by_prop_string(original.prop_string.clone(), &connection).await,
        DatastoreClientError::NotFound,
    );

    let fetched = TestEntity::get_one_by_prop_string(new_string_prop.clone(), &connection).await?;
    assert_eq!(inserted.key, fetched.key);
    assert_eq!(new_string_prop, fetched.prop_string);

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_get_by_array_property() -> Result<(), DatastorersError> {
    let connection = create_test_connection();

    let string_value_a = generate_random_string(10);
    let string_value_b = generate_random_string(10);
    let string_value_c = generate_random_string(10);

    let mut entity_a = generate_random_entity();
    entity_a.prop_string_array = vec![string_value_a.clone(), string_value_b.clone()];
    let mut entity_b = generate_random_entity();
    entity_b.prop_string_array = vec![string_value_b.clone(), string_value_c.clone()];

    let inserted_a = entity_a.commit(&connection).await?;
    let inserted_b = entity_b.commit(&connection).await?;

    let fetched = TestEntity::get_one_by_prop_string_array(string_value_a, &connection).await?;
    assert_eq!(inserted_a.key, fetched.key);

    let fetched = TestEntity::get_one_by_prop_string_array(string_value_c, &connection).await?;
    assert_eq!(inserted_b.key, fetched.key);

    assert_client_error(
        TestEntity::get_one_by_prop_string_array(string_value_b, &connection).await,
        DatastoreClientError::AmbiguousResult,
    );

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_update_array_property() -> Result<(), DatastorersError> {
    let connection = create_test_connection();

    let string_value_a = generate_random_string(10);
    let string_value_b = generate_random_string(10);
    let string_value_c = generate_random_string(10);

    let mut entity = generate_random_entity();
    entity.prop_string_array = vec![string_value_a.clone(), string_value_b.clone()];
    let mut inserted = entity.commit(&connection).await?;
    let inserted_key = inserted.key.clone();

    let fetched =
        TestEntity::get_one_by_prop_string_array(string_value_a.clone(), &connection).await?;
    assert_eq!(inserted_key, fetched.key);
    let fetched =
        TestEntity::get_one_by_prop_string_array(string_value_b.clone(), &connection).await?;
    assert_eq!(inserted_key, fetched.key);
    assert_client_error(
        TestEntity::get_one_by_prop_string_array(string_value_c.clone(), &connection).await,
        DatastoreClientError::NotFound,
    );

    inserted.prop_string_array.remove(0);
    inserted.prop_string_array.push(string_value_c.clone());
    inserted.commit(&connection).await?;

    assert_client_error(
        TestEntity::get_one_by_prop_string_array(string_value_a, &connection).await,
        DatastoreClientError::NotFound,
    );
    let fetched = TestEntity::get_one_by_prop_string_array(string_value_b, &connection).await?;
    assert_eq!(inserted_key, fetched.key);
    let fetched = TestEntity::get_one_by_prop_string_array(string_value_c, &connection).await?;
    assert_eq!(inserted_key, fetched.key);

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_delete() -> Result<(), DatastorersError> {
    let connection = create_test_connection();

    let inserted_a = generate_random_entity().commit(&connection).await?;
    let inserted_b = generate_random_entity().commit(&connection).await?;

    let fetched =
        TestEntity::get_one_by_prop_string(inserted_a.prop_string.clone(), &connection).await?;
    assert_eq!(inserted_a.key, fetched.key);
    let fetched =
        TestEntity::get_one_by_prop_string(inserted_b.prop_string.clone(), &connection).await?;
    assert_eq!(inserted_b.key, fetched.key);

    let prop_string_b = inserted_b.prop_string.clone();
    inserted_b.delete(&connection).await?;

    let fetched =
        TestEntity::get_one_by_prop_string(inserted_a.prop_string.clone(), &connection).await?;
    assert_eq!(inserted_a.key, fetched.key);
    assert_client_error(
        TestEntity::get_one_by_prop_string(prop_string_b, &connection).await,
        DatastoreClientError::NotFound,
    );

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_optional_values() -> Result<(), DatastorersError> {
    let connection = create_test_connection();

    let mut inserted_empty = TestEntityOptional::default().commit(&connection).await?;
    let inserted_id = inserted_empty.id().expect("inserted entity has an id");

    let string_value = generate_random_string(10);
    inserted_empty.prop_string = Some(string_value.clone());
    inserted_empty.prop_bool = Some(true);
    inserted_empty.commit(&connection).await?;

    let mut fetched_entity = TestEntityOptional::get_one_by_id(inserted_id, &connection).await?;
    assert_eq!(fetched_entity.prop_string, Some(string_value.clone()));
    assert_eq!(fetched_entity.prop_bool, Some(true));
    assert_eq!(fetched_entity.prop_int, None);
    assert_eq!(fetched_entity.prop_string_array, None);

    assert_parse_error(
        TestEntity::get_one_by_id(inserted_id, &connection).await,
        DatastoreParseError::NoSuchValue,
    );

    let int_value = generate_random_int();
    fetched_entity.prop_int = Some(int_value);
    fetched_entity.prop_string_array = Some(vec![]);
    fetched_entity.commit(&connection).await?;

    let fetched_entity =
        TestEntityOptional::get_one_by_prop_string(string_value.clone(), &connection).await?;
    assert_eq!(fetched_entity.prop_string, Some(string_value.clone()));
    assert_eq!(fetched_entity.prop_bool, Some(true));
    assert_eq!(fetched_entity.prop_int, Some(int_value));
    assert_eq!(fetched_entity.prop_string_array, Some(vec![]));

    let fetched_non_optional = TestEntity::get_one_by_prop_int(int_value, &connection).await?;
    assert_eq!(fetched_non_optional.prop_string, string_value);
    assert!(fetched_non_optional.prop_bool);
    assert_eq!(fetched_non_optional.prop_int, int_value);
    assert!(fetched_non_optional.prop_string_array.is_empty());

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_colliding_update() -> Result<(), DatastorersError> {
    let connection = create_test_connection();
    let inserted = generate_random_entity().commit(&connection).await?;
    let inserted_id = inserted.id().expect("inserted entity has an id");

    let mut a = TestEntity::get_one_by_id(inserted_id, &connection).await?;
    let prop_int_a = generate_random_int();
    a.prop_int = prop_int_a;

    let mut b = TestEntity::get_one_by_id(inserted_id, &connection).await?;
    b.prop_int = generate_random_int();

    a.commit(&connection).await?;
    assert_client_error(
        b.commit(&connection).await,
        DatastoreClientError::DataConflict,
    );

    let fetched = TestEntity::get_one_by_id(inserted_id, &connection).await?;
    assert_eq!(prop_int_a, fetched.prop_int);

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_colliding_delete() -> Result<(), DatastorersError> {
    let connection = create_test_connection();
    let inserted = generate_random_entity().commit(&connection).await?;
    let inserted_id = inserted.id().expect("inserted entity has an id");

    let mut a = TestEntity::get_one_by_id(inserted_id, &connection).await?;
    let prop_int_a = generate_random_int();
    a.prop_int = prop_int_a;

    let b = TestEntity::get_one_by_id(inserted_id, &connection).await?;

    a.commit(&connection).await?;
    assert_client_error(
        b.delete(&connection).await,
        DatastoreClientError::DataConflict,
    );

    let fetched = TestEntity::get_one_by_id(inserted_id, &connection).await?;
    assert_eq!(prop_int_a, fetched.prop_int);

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_transaction_with_update() -> Result<(), DatastorersError> {
    let connection = create_test_connection();

    let inserted = generate_random_entity().commit(&connection).await?;
    let inserted_id_a = inserted.id().expect("inserted entity has an id");
    let original_prop_int_a = inserted.prop_int;
    let inserted = generate_random_entity().commit(&connection).await?;
    let inserted_id_b = inserted.id().expect("inserted entity has an id");
    let original_prop_int_b = inserted.prop_int;

    let mut transaction = TransactionConnection::begin_transaction(&connection).await?;

    let mut a = TestEntity::get_one_by_id(inserted_id_a, &transaction).await?;
    let prop_int_a = generate_random_int();
    a.prop_int = prop_int_a;
    transaction.push_save(a)?;

    let mut b = TestEntity::get_one_by_id(inserted_id_b, &transaction).await?;
    let prop_int_b = generate_random_int();
    b.prop_int = prop_int_b;
    transaction.push_save(b)?;

    let fetched_a = TestEntity::get_one_by_id(inserted_id_a, &connection).await?;
    assert_eq!(original_prop_int_a, fetched_a.prop_int);
    let fetched_b = TestEntity::get_one_by_id(inserted_id_b, &connection).await?;
    assert_eq!(original_prop_int_b, fetched_b.prop_int);

    transaction.commit().await?;

    let fetched_a = TestEntity::get_one_by_id(inserted_id_a, &connection).await?;
    assert_eq!(fetched_a.prop_int, prop_int_a);
    let fetched_b = TestEntity::get_one_by_id(inserted_id_b, &connection).await?;
    assert_eq!(fetched_b.prop_int, prop_int_b);

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
async fn test_transaction_with_delete_and_rollback() -> Result<(), DatastorersError> {
    let connection = create_test_connection();
    let inserted = generate_random_entity().commit(&connection).await?;
    let inserted_id = inserted.id().expect("inserted entity has an id");

    let mut transaction = TransactionConnection::begin_transaction(&connection).await?;
    let fetched = TestEntity::get_one_by_id(inserted_id, &transaction).await?;
    transaction.push_delete(fetched)?;
    transaction.rollback().await?;

    // Rolled back: the entity is still there.
    TestEntity::get_one_by_id(inserted_id, &connection).await?;

    let mut transaction = TransactionConnection::begin_transaction(&connection).await?;
    let fetched = TestEntity::get_one_by_id(inserted_id, &transaction).await?;
    transaction.push_delete(fetched)?;
    transaction.commit().await?;

    assert_client_error(
        TestEntity::get_one_by_id(inserted_id, &connection).await,
        DatastoreClientError::NotFound,
    );

    Ok(())
}
