use datastorers::{ConnectionConfig, DatastoreClient};

/// Connects to the project named by `TEST_PROJECT_NAME`. Endpoint, emulator
/// host and access token come from the usual `DATASTORE_*` variables.
pub fn create_test_connection() -> DatastoreClient {
    dotenvy::dotenv().ok();
    let project = std::env::var("TEST_PROJECT_NAME")
        .expect("TEST_PROJECT_NAME env var must be set for integration tests");

    let mut config = ConnectionConfig::new(project);
    config.endpoint = std::env::var("DATASTORE_ENDPOINT").ok();
    config.emulator_host = std::env::var("DATASTORE_EMULATOR_HOST").ok();
    config.access_token = std::env::var("DATASTORE_ACCESS_TOKEN").ok();

    DatastoreClient::new(config).expect("Failed to create datastore client")
}
