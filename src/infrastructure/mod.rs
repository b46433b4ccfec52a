// Infrastructure layer - external collaborators and configuration
pub mod config;
pub mod grafana;
pub mod kusto_client;
