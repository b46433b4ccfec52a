// Main entry point - dependency injection and the one-shot publish run
mod application;
mod domain;
mod infrastructure;

use std::sync::Arc;

use crate::application::planner::PanelPlanner;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::grafana::{GrafanaClient, build_dashboard_document};
use crate::infrastructure::kusto_client::KustoClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load and validate configuration before touching any collaborator
    let settings = load_settings()?;

    // Create the query engine client (infrastructure layer)
    let kusto = Arc::new(KustoClient::connect(&settings).await?);

    // Plan the dashboard (application layer); any engine failure aborts the
    // run - no partial dashboard is published
    let planner = PanelPlanner::new(kusto, settings.base_query.clone());
    let plan = planner.plan().await?;
    tracing::info!(
        title = %plan.title,
        panels = plan.panels.len(),
        variables = plan.variables.len(),
        "dashboard plan ready"
    );

    // Assemble and publish
    let document = build_dashboard_document(&plan, &settings.datasource_name, &settings.database);
    let grafana = GrafanaClient::new(settings.grafana_url.clone(), settings.api_token.clone());
    grafana.publish(&document).await?;
    tracing::info!(title = %plan.title, uid = %plan.uid(), "dashboard published");

    Ok(())
}
