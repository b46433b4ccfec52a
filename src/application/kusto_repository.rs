// Repository trait for the Kusto query engine
use async_trait::async_trait;
use chrono::Duration;

#[async_trait]
pub trait KustoRepository: Send + Sync {
    /// List all table names in the configured database
    async fn list_table_names(&self) -> anyhow::Result<Vec<String>>;

    /// Run a query and return its result column names, in order
    async fn query_columns(&self, query: &str) -> anyhow::Result<Vec<String>>;

    /// Gap between the two most recent timestamps of the series, or None
    /// when the series has fewer than two rows
    async fn latest_gap(
        &self,
        query: &str,
        time_column: &str,
    ) -> anyhow::Result<Option<Duration>>;
}
