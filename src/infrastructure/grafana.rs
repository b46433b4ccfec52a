// Grafana dashboard assembly and publishing
use crate::domain::dashboard::DashboardPlan;
use crate::domain::error::DashboardError;
use crate::domain::panel::{Panel, Viz};
use crate::domain::variable::TemplateVariable;
use anyhow::{Context, Result};
use serde_json::{Value, json};

const ROW_HEIGHT: u64 = 1;
const PANEL_HEIGHT: u64 = 8;
const FULL_WIDTH: u64 = 24;
const DATASOURCE_TYPE: &str = "grafana-azure-data-explorer-datasource";

/// Turn the ordered plan into one Grafana dashboard document: panels stacked
/// top to bottom in emission order, full width, with monotonically
/// increasing ids.
pub fn build_dashboard_document(
    plan: &DashboardPlan,
    datasource_uid: &str,
    database: &str,
) -> Value {
    let mut panels = Vec::with_capacity(plan.panels.len());
    let mut panel_id = 1u64;
    let mut y_position = 0u64;

    for panel in &plan.panels {
        match panel {
            Panel::Row { title, collapsed } => {
                panels.push(json!({
                    "type": "row",
                    "title": title,
                    "collapsed": collapsed,
                    "gridPos": { "h": ROW_HEIGHT, "w": FULL_WIDTH, "x": 0, "y": y_position },
                    "panels": [],
                    "id": panel_id
                }));
                y_position += ROW_HEIGHT;
            }
            Panel::Chart {
                title,
                viz,
                query,
                repeat,
            } => {
                panels.push(chart_panel(
                    title,
                    *viz,
                    query,
                    repeat.as_deref(),
                    panel_id,
                    y_position,
                    datasource_uid,
                    database,
                ));
                y_position += PANEL_HEIGHT;
            }
        }
        panel_id += 1;
    }

    json!({
        "dashboard": {
            "uid": plan.uid(),
            "title": plan.title,
            "panels": panels,
            "templating": { "list": templating_list(&plan.variables, datasource_uid) },
            "timezone": "browser",
            "schemaVersion": 40,
            "version": 1,
            "refresh": "",
            "time": { "from": "now-7d", "to": "now" },
            "timepicker": {},
            "weekStart": ""
        },
        "folderId": 0,
        "overwrite": true
    })
}

#[allow(clippy::too_many_arguments)]
fn chart_panel(
    title: &str,
    viz: Viz,
    query: &str,
    repeat: Option<&str>,
    id: u64,
    y_position: u64,
    datasource_uid: &str,
    database: &str,
) -> Value {
    let datasource = json!({ "type": DATASOURCE_TYPE, "uid": datasource_uid });
    let mut panel = json!({
        "type": viz.panel_type(),
        "title": title,
        "id": id,
        "gridPos": { "h": PANEL_HEIGHT, "w": FULL_WIDTH, "x": 0, "y": y_position },
        "datasource": datasource.clone(),
        "targets": [{
            "refId": "A",
            "datasource": datasource,
            "database": database,
            "queryType": "KQL",
            "querySource": "raw",
            "rawMode": true,
            "resultFormat": viz.result_format(),
            "query": query
        }],
        "fieldConfig": { "defaults": {}, "overrides": [] },
        "options": {
            "legend": { "displayMode": "list", "placement": "bottom", "showLegend": true },
            "tooltip": { "mode": "single", "sort": "none" }
        },
        "pluginVersion": "5.0.7"
    });

    if let Some(repeat) = repeat {
        panel["repeat"] = json!(repeat);
        panel["repeatDirection"] = json!("h");
        panel["maxPerRow"] = json!(6);
    }

    match viz {
        Viz::Timeseries => {
            panel["fieldConfig"]["defaults"]["custom"] = json!({
                "drawStyle": "line",
                "lineInterpolation": "linear",
                "lineWidth": 1,
                "fillOpacity": 0,
                "pointSize": 5,
                "showPoints": "auto",
                "barWidthFactor": 0.6,
                "gradientMode": "none"
            });
        }
        Viz::BarChart => {
            panel["fieldConfig"]["defaults"]["custom"] = json!({
                "drawStyle": "bar",
                "barAlignment": 0,
                "barWidthFactor": 0.97,
                "fillOpacity": 80
            });
            panel["options"]["stacking"] = json!("none");
            panel["options"]["orientation"] = json!("auto");
        }
        Viz::Table => {
            panel["options"] = json!({
                "showHeader": true,
                "fontSize": "100%",
                "sortBy": []
            });
            panel["fieldConfig"]["defaults"]["align"] = json!("auto");
        }
    }

    panel
}

fn templating_list(variables: &[TemplateVariable], datasource_uid: &str) -> Vec<Value> {
    variables
        .iter()
        .map(|variable| match variable {
            TemplateVariable::Textbox {
                name,
                label,
                default,
            } => json!({
                "type": "textbox",
                "name": name,
                "label": label,
                "hide": 0,
                "query": "",
                "refresh": 2,
                "current": { "text": default, "value": default },
                "skipUrlSync": false
            }),
            TemplateVariable::Query { name, query } => json!({
                "type": "query",
                "name": name,
                "hide": 0,
                "datasource": { "type": DATASOURCE_TYPE, "uid": datasource_uid },
                "refresh": "",
                "multi": true,
                "includeAll": true,
                "query": query,
                "sort": 0,
                "current": {},
                "definition": query,
                "label": name,
                "skipUrlSync": false,
                "multiFormat": "regex",
                "allValue": ".*"
            }),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct GrafanaClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl GrafanaClient {
    pub fn new(base_url: String, api_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    /// Publish a dashboard document, overwriting any dashboard with the
    /// same uid. A non-success answer is terminal and not retried.
    pub async fn publish(&self, document: &Value) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/api/dashboards/db", self.base_url))
            .bearer_auth(&self.api_token)
            .json(document)
            .send()
            .await
            .context("failed to send the dashboard to grafana")?;

        let success = response.status().is_success();
        let body = response.text().await.unwrap_or_default();
        interpret_publish_response(success, body)?;
        Ok(())
    }
}

/// Grafana's own message is surfaced verbatim on rejection.
fn interpret_publish_response(success: bool, body: String) -> Result<(), DashboardError> {
    if success {
        Ok(())
    } else {
        Err(DashboardError::PublishRejected(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> DashboardPlan {
        DashboardPlan::new(
            "Orders Table!!".to_string(),
            vec![
                Panel::row("Time Series Plot"),
                Panel::chart(
                    "Series Decomposition".to_string(),
                    Viz::Timeseries,
                    "Orders | take 1".to_string(),
                ),
                Panel::repeated(
                    "Region - ${Region}".to_string(),
                    Viz::Timeseries,
                    "Orders | take 1".to_string(),
                    "Region".to_string(),
                ),
                Panel::chart(
                    "Anomaly Count by Region".to_string(),
                    Viz::Table,
                    "Orders | take 1".to_string(),
                ),
            ],
            vec![
                TemplateVariable::Textbox {
                    name: "AnomalyThreshold".to_string(),
                    label: "Anomaly Threshold".to_string(),
                    default: "1.5".to_string(),
                },
                TemplateVariable::Query {
                    name: "Region".to_string(),
                    query: "Orders | distinct Region".to_string(),
                },
            ],
        )
    }

    #[test]
    fn test_grid_layout_and_ids() {
        let document = build_dashboard_document(&sample_plan(), "adx-uid", "telemetry");
        let panels = document["dashboard"]["panels"].as_array().unwrap();

        let ys: Vec<u64> = panels
            .iter()
            .map(|p| p["gridPos"]["y"].as_u64().unwrap())
            .collect();
        assert_eq!(ys, vec![0, 1, 9, 17]);

        let heights: Vec<u64> = panels
            .iter()
            .map(|p| p["gridPos"]["h"].as_u64().unwrap())
            .collect();
        assert_eq!(heights, vec![1, 8, 8, 8]);

        let ids: Vec<u64> = panels.iter().map(|p| p["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        assert!(panels.iter().all(|p| p["gridPos"]["w"] == json!(24)));
    }

    #[test]
    fn test_uid_and_envelope() {
        let document = build_dashboard_document(&sample_plan(), "adx-uid", "telemetry");
        assert_eq!(document["dashboard"]["uid"], json!("orders-table"));
        assert_eq!(document["overwrite"], json!(true));
        assert_eq!(document["folderId"], json!(0));
        assert_eq!(document["dashboard"]["schemaVersion"], json!(40));
    }

    #[test]
    fn test_repeat_binding_and_result_formats() {
        let document = build_dashboard_document(&sample_plan(), "adx-uid", "telemetry");
        let panels = document["dashboard"]["panels"].as_array().unwrap();

        let repeated = &panels[2];
        assert_eq!(repeated["repeat"], json!("Region"));
        assert_eq!(repeated["repeatDirection"], json!("h"));
        assert_eq!(repeated["maxPerRow"], json!(6));
        assert_eq!(repeated["targets"][0]["resultFormat"], json!("time_series"));

        let table = &panels[3];
        assert!(table.get("repeat").is_none());
        assert_eq!(table["targets"][0]["resultFormat"], json!("table"));
        assert_eq!(table["options"]["showHeader"], json!(true));
    }

    #[test]
    fn test_templating_variables() {
        let document = build_dashboard_document(&sample_plan(), "adx-uid", "telemetry");
        let variables = document["dashboard"]["templating"]["list"]
            .as_array()
            .unwrap();

        assert_eq!(variables[0]["type"], json!("textbox"));
        assert_eq!(variables[0]["name"], json!("AnomalyThreshold"));
        assert_eq!(variables[0]["current"]["value"], json!("1.5"));

        assert_eq!(variables[1]["type"], json!("query"));
        assert_eq!(variables[1]["multi"], json!(true));
        assert_eq!(variables[1]["allValue"], json!(".*"));
        assert_eq!(variables[1]["datasource"]["uid"], json!("adx-uid"));
    }

    #[test]
    fn test_publish_rejection_surfaces_message() {
        let err = interpret_publish_response(false, "quota exceeded".to_string()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "grafana rejected the dashboard: quota exceeded"
        );
        assert!(interpret_publish_response(true, String::new()).is_ok());
    }
}
