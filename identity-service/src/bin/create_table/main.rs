use identity_service::config::Config;
use identity_service::config::StoreBackend;
use identity_service::outbound::store::DynamoDbKeyValueStore;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,create_table=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Table setup starting"
    );

    let config = Config::load()?;

    tracing::info!(
        backend = ?config.store.backend,
        table = %config.store.table_name,
        region = %config.store.region,
        "Configuration loaded"
    );

    if config.store.backend != StoreBackend::DynamoDb {
        tracing::warn!("Store backend is not dynamodb, nothing to create");
        return Ok(());
    }

    let store = DynamoDbKeyValueStore::connect(&config.store).await;

    if store.create_table().await? {
        tracing::info!(table = %store.table_name(), "Table is ready");
    }

    let tables = store.list_tables().await?;
    tracing::info!(tables = ?tables, "Tables in region");

    Ok(())
}
