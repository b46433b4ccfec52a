// Configuration loading - optional settings file plus environment overrides
use crate::domain::error::DashboardError;
use serde::Deserialize;

/// Validated settings value object, passed explicitly into the planner and
/// the clients instead of living in process globals.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub query_cluster: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub authority_id: String,
    #[serde(default)]
    pub grafana_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub datasource_name: String,
    #[serde(default)]
    pub base_query: String,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/settings").required(false))
        .add_source(config::Environment::default())
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// A missing setting is fatal before any engine call is attempted.
    pub fn validate(&self) -> Result<(), DashboardError> {
        let required: [(&'static str, &str); 9] = [
            ("QUERY_CLUSTER", &self.query_cluster),
            ("DATABASE", &self.database),
            ("APP_ID", &self.app_id),
            ("APP_KEY", &self.app_key),
            ("AUTHORITY_ID", &self.authority_id),
            ("GRAFANA_URL", &self.grafana_url),
            ("API_TOKEN", &self.api_token),
            ("DATASOURCE_NAME", &self.datasource_name),
            ("BASE_QUERY", &self.base_query),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(DashboardError::MissingSetting(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> Settings {
        Settings {
            query_cluster: "https://cluster.kusto.windows.net".to_string(),
            database: "telemetry".to_string(),
            app_id: "app".to_string(),
            app_key: "key".to_string(),
            authority_id: "tenant".to_string(),
            grafana_url: "https://grafana.example.com".to_string(),
            api_token: "token".to_string(),
            datasource_name: "adx".to_string(),
            base_query: "Orders".to_string(),
        }
    }

    #[test]
    fn test_complete_settings_validate() {
        assert!(filled().validate().is_ok());
    }

    #[test]
    fn test_missing_setting_is_named() {
        let mut settings = filled();
        settings.base_query = String::new();
        assert!(matches!(
            settings.validate(),
            Err(DashboardError::MissingSetting("BASE_QUERY"))
        ));
    }
}
