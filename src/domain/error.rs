// Error taxonomy for dashboard generation
use thiserror::Error;

/// Fatal errors raised while planning or publishing a dashboard.
///
/// Every variant aborts the whole run - a dashboard with silently missing
/// panels is worse than no dashboard.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// Required setting is absent or empty
    #[error("required setting {0} is not set")]
    MissingSetting(&'static str),

    /// The base query result has fewer than the two mandatory columns
    #[error("base query returned {0} column(s), need at least a time and a value column")]
    NotEnoughColumns(usize),

    /// No token of the base query matches a table in the database
    #[error("the base query does not reference any table in the database")]
    UnknownTable,

    /// Grafana answered the publish call with a non-success status
    #[error("grafana rejected the dashboard: {0}")]
    PublishRejected(String),
}
