use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Clone, Debug)]
pub struct DocumentStore {
    pub client: Client,
    pub database: Database,
}

impl DocumentStore {
    // SECURITY: the URI carries credentials; keep it out of spans.
    #[instrument(skip(uri))]
    pub async fn connect(uri: &str, database: &str) -> mongodb::error::Result<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("catalog_variants".to_string());
        options.max_pool_size = Some(10);
        options.min_pool_size = Some(2);
        options.max_idle_time = Some(Duration::from_secs(30));
        options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(options)?;
        let database = client.database(database);
        // The driver connects lazily; ping so a bad URI fails here, not mid-run.
        database.run_command(doc! { "ping": 1 }).await?;
        info!(database = database.name(), "connected to document store");
        Ok(Self { client, database })
    }

    pub async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> mongodb::error::Result<Vec<Document>> {
        let cursor = self
            .database
            .collection::<Document>(collection)
            .aggregate(pipeline.to_vec())
            .await?;
        cursor.try_collect().await
    }

    pub async fn ping(&self) -> mongodb::error::Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
