//! Run one GraphQL query against the configured endpoint.
//!
//! ```text
//! GRAPHQL=https://api.example.com/graphql \
//!     cargo run -p graphlink --example query -- '{ viewer { id name } }'
//! ```
//!
//! A bearer token is read from the `id_token` entry of the default
//! credential file when one exists. The query always goes to the network.

use std::sync::Arc;

use graphlink::{
    ClientConfig, CredentialStore, FetchPolicy, FileStore, Operation, create_client,
};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let document = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "{ __typename }".to_string());

    let config = ClientConfig::from_env()?;
    let store = FileStore::default_location().map(|store| Arc::new(store) as Arc<dyn CredentialStore>);
    let client = create_client(config, store)?;

    let response = client
        .query_with_policy(Operation::new(document), FetchPolicy::NetworkOnly)
        .await?;
    for error in &response.errors {
        eprintln!("error: {error}");
    }
    println!("{}", serde_json::to_string_pretty(&response.data)?);
    Ok(())
}
