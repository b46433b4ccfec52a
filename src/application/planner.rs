// Panel planner - maps the discovered columns to the ordered panel list
//
// Emission order is a fixed narrative: overview first, then per-dimension
// breakdown, per-segment ranking, and per-dimension drill-down. For a given
// column list the output order and titles are fully deterministic.
use crate::application::kusto_repository::KustoRepository;
use crate::application::query_templates::{
    anomalies_query, decomposition_query, dimension_bar_query, dimension_totals_query,
    segment_count_query,
};
use crate::application::sampling::bucket_width;
use crate::domain::dashboard::DashboardPlan;
use crate::domain::error::DashboardError;
use crate::domain::panel::{Panel, PanelQuery, Viz};
use crate::domain::variable::TemplateVariable;
use std::sync::Arc;

pub struct PanelPlanner {
    repository: Arc<dyn KustoRepository>,
    base_query: String,
}

impl PanelPlanner {
    pub fn new(repository: Arc<dyn KustoRepository>, base_query: String) -> Self {
        Self {
            repository,
            base_query,
        }
    }

    /// Discover the base query's schema and produce the full dashboard plan.
    /// Engine failures propagate and abort the run - no partial dashboard.
    pub async fn plan(&self) -> anyhow::Result<DashboardPlan> {
        let table_names = self.repository.list_table_names().await?;
        let title = resolve_dashboard_title(&self.base_query, &table_names)?;

        let all_columns = self.repository.query_columns(&self.base_query).await?;
        if all_columns.len() < 2 {
            return Err(DashboardError::NotEnoughColumns(all_columns.len()).into());
        }
        let time_column = &all_columns[0];
        let value_column = &all_columns[1];
        let dimensions = &all_columns[2..];
        tracing::info!(
            %title,
            %time_column,
            %value_column,
            dimensions = dimensions.len(),
            "resolved base query schema"
        );

        let gap = self
            .repository
            .latest_gap(&self.base_query, time_column)
            .await?;
        let dt = bucket_width(gap);
        tracing::debug!(%dt, "estimated sampling window");

        let base = self.base_query.as_str();
        let mut panels = Vec::new();
        let mut variables = vec![TemplateVariable::Textbox {
            name: "AnomalyThreshold".to_string(),
            label: "Anomaly Threshold".to_string(),
            default: "1.5".to_string(),
        }];

        panels.push(Panel::row("Time Series Plot"));
        panels.push(Panel::chart(
            "Series Decomposition".to_string(),
            Viz::Timeseries,
            decomposition_query(base, time_column, value_column, &dt, None),
        ));
        panels.push(Panel::chart(
            "Anomalies".to_string(),
            Viz::Timeseries,
            anomalies_query(base, time_column, value_column, &dt, None),
        ));

        panels.push(Panel::row("Anomalies Count Per Dimension"));
        match dimension_totals_query(base, time_column, value_column, &dt, dimensions) {
            PanelQuery::Emitted(query) => panels.push(Panel::chart(
                "Anomalies Per Dimension".to_string(),
                Viz::BarChart,
                query,
            )),
            PanelQuery::Skipped(reason) => {
                tracing::debug!(?reason, "omitting per-dimension bar panel");
            }
        }

        panels.push(Panel::row("Anomalies Count"));
        for dimension in dimensions {
            variables.push(TemplateVariable::Query {
                name: dimension.clone(),
                query: dimension_values_query(base, dimension),
            });
            panels.push(Panel::chart(
                format!("Anomalies Count by {dimension}"),
                Viz::BarChart,
                dimension_bar_query(base, time_column, value_column, &dt, dimension),
            ));
        }

        panels.push(Panel::row("Anomalies Count Per Segment"));
        match segment_count_query(base, time_column, value_column, &dt, dimensions) {
            PanelQuery::Emitted(query) => {
                let title = if dimensions.len() >= 2 {
                    format!("Anomaly Count per Segment by {}", dimensions.join(", "))
                } else {
                    format!("Anomaly Count by {}", dimensions[0])
                };
                panels.push(Panel::chart(title, Viz::Table, query));
            }
            PanelQuery::Skipped(reason) => {
                tracing::debug!(?reason, "omitting segment count panel");
            }
        }

        panels.push(Panel::row("Anomalies Score"));
        for dimension in dimensions {
            panels.push(Panel::repeated(
                format!("{dimension} - ${{{dimension}}}"),
                Viz::Timeseries,
                anomalies_query(base, time_column, value_column, &dt, Some(dimension.as_str())),
                dimension.clone(),
            ));
        }

        panels.push(Panel::row("Series Decomposition"));
        for dimension in dimensions {
            panels.push(Panel::repeated(
                format!("{dimension} - ${{{dimension}}}"),
                Viz::Timeseries,
                decomposition_query(base, time_column, value_column, &dt, Some(dimension.as_str())),
                dimension.clone(),
            ));
        }

        Ok(DashboardPlan::new(title, panels, variables))
    }
}

/// Query populating a dimension's selector variable with its distinct values.
fn dimension_values_query(base_query: &str, dimension: &str) -> String {
    format!("{base_query}\n| project {dimension} = tostring({dimension})\n| distinct {dimension}")
}

/// Resolve the dashboard title by finding the first token of the base query
/// that names a table in the database. Line comments are stripped first.
pub fn resolve_dashboard_title(
    base_query: &str,
    table_names: &[String],
) -> Result<String, DashboardError> {
    for line in base_query.lines() {
        let code = match line.find("//") {
            Some(idx) => &line[..idx],
            None => line,
        };
        for token in code.split(|c: char| c.is_whitespace() || c == '|') {
            let token = token.trim();
            if !token.is_empty() && table_names.iter().any(|name| name == token) {
                return Ok(token.to_string());
            }
        }
    }
    Err(DashboardError::UnknownTable)
}
