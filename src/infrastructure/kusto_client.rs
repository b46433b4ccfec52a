// Kusto REST client implementation
use crate::application::kusto_repository::KustoRepository;
use crate::infrastructure::config::Settings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct KustoClient {
    http: reqwest::Client,
    cluster: String,
    database: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "Tables")]
    tables: Vec<ResultTable>,
}

#[derive(Debug, Deserialize)]
struct ResultTable {
    #[allow(dead_code)]
    #[serde(rename = "TableName")]
    name: String,
    #[serde(rename = "Columns")]
    columns: Vec<ResultColumn>,
    #[serde(rename = "Rows")]
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ResultColumn {
    #[serde(rename = "ColumnName")]
    column_name: String,
}

impl KustoClient {
    /// Authenticate against AAD with application-key credentials and keep
    /// the token for the lifetime of the run.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::new();
        let cluster = settings.query_cluster.trim_end_matches('/').to_string();
        let token = acquire_token(
            &http,
            &settings.authority_id,
            &settings.app_id,
            &settings.app_key,
            &cluster,
        )
        .await?;

        Ok(Self {
            http,
            cluster,
            database: settings.database.clone(),
            token,
        })
    }

    async fn execute(&self, csl: &str) -> Result<ResultTable> {
        // Management commands (leading dot) go to a separate endpoint
        let endpoint = if csl.trim_start().starts_with('.') {
            "v1/rest/mgmt"
        } else {
            "v1/rest/query"
        };
        let url = format!("{}/{}", self.cluster, endpoint);
        tracing::debug!(%url, query = csl, "executing kusto query");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "db": self.database, "csl": csl }))
            .send()
            .await
            .context("failed to send request to kusto")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("kusto query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<QueryResponse>()
            .await
            .context("failed to parse kusto response")?;

        // The primary result is the first table
        data.tables
            .into_iter()
            .next()
            .context("kusto response contained no result table")
    }
}

async fn acquire_token(
    http: &reqwest::Client,
    authority_id: &str,
    app_id: &str,
    app_key: &str,
    cluster: &str,
) -> Result<String> {
    let url = format!("https://login.microsoftonline.com/{authority_id}/oauth2/v2.0/token");
    let scope = format!("{cluster}/.default");
    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", app_id),
        ("client_secret", app_key),
        ("scope", scope.as_str()),
    ];

    let response = http
        .post(&url)
        .form(&params)
        .send()
        .await
        .context("failed to reach the AAD token endpoint")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("token acquisition failed with status {}: {}", status, body);
    }

    Ok(response
        .json::<TokenResponse>()
        .await
        .context("failed to parse the AAD token response")?
        .access_token)
}

#[async_trait]
impl KustoRepository for KustoClient {
    async fn list_table_names(&self) -> Result<Vec<String>> {
        let table = self.execute(".show tables | project TableName").await?;
        Ok(table
            .rows
            .iter()
            .filter_map(|row| row.first().and_then(|cell| cell.as_str()))
            .map(|name| name.to_string())
            .collect())
    }

    async fn query_columns(&self, query: &str) -> Result<Vec<String>> {
        let table = self.execute(query).await?;
        Ok(table
            .columns
            .into_iter()
            .map(|column| column.column_name)
            .collect())
    }

    async fn latest_gap(&self, query: &str, time_column: &str) -> Result<Option<Duration>> {
        let gap_query = format!(
            "let data = ({query});\n\
            data\n\
            | sort by {time_column} desc\n\
            | extend NextTimestamp = next({time_column})\n\
            | where isnotnull(NextTimestamp)\n\
            | take 1\n\
            | project TimeDifference = {time_column} - NextTimestamp"
        );
        let table = self.execute(&gap_query).await?;

        // Under two rows the filter leaves nothing to project
        let Some(cell) = table.rows.first().and_then(|row| row.first()) else {
            return Ok(None);
        };
        Ok(cell.as_str().and_then(parse_timespan))
    }
}

/// Parse a Kusto timespan literal, `[-][d.]hh:mm:ss[.fffffff]`.
fn parse_timespan(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut parts = rest.split(':');
    let hours_part = parts.next()?;
    let minutes_part = parts.next()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (days, hours) = match hours_part.split_once('.') {
        Some((days, hours)) => (days.parse::<i64>().ok()?, hours.parse::<i64>().ok()?),
        None => (0, hours_part.parse::<i64>().ok()?),
    };
    let minutes: i64 = minutes_part.parse().ok()?;
    let (seconds, fraction) = match seconds_part.split_once('.') {
        Some((seconds, fraction)) => (seconds.parse::<i64>().ok()?, Some(fraction)),
        None => (seconds_part.parse::<i64>().ok()?, None),
    };

    let mut gap = Duration::days(days)
        + Duration::hours(hours)
        + Duration::minutes(minutes)
        + Duration::seconds(seconds);
    if let Some(fraction) = fraction {
        // Kusto emits up to seven fractional digits (ticks)
        let digits: String = fraction.chars().take(9).collect();
        let value = digits.parse::<i64>().ok()?;
        let nanos = value * 10_i64.pow(9 - digits.len() as u32);
        gap = gap + Duration::nanoseconds(nanos);
    }

    Some(if negative { -gap } else { gap })
}
