use async_trait::async_trait;
use log::{error, info};
use serde::Deserialize;
use serde_json::Value;

use super::{http_client, ClientError, RemoteConfigSource};
use crate::config::remote::RemoteVariables;
use crate::config::GrafanaConfig;

#[derive(Debug, Default, Deserialize)]
struct DashboardResponse {
    #[serde(default)]
    dashboard: Dashboard,
}

#[derive(Debug, Default, Deserialize)]
struct Dashboard {
    #[serde(default)]
    templating: Templating,
}

#[derive(Debug, Default, Deserialize)]
struct Templating {
    #[serde(default)]
    list: Vec<TemplateVariable>,
}

#[derive(Debug, Deserialize)]
struct TemplateVariable {
    name: Option<String>,
    #[serde(default)]
    current: Option<CurrentValue>,
}

#[derive(Debug, Deserialize)]
struct CurrentValue {
    #[serde(default)]
    value: Option<Value>,
}

/// Reads template variables from a Grafana dashboard.
///
/// The last successful result is kept and returned when a refresh fails.
pub struct GrafanaClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    dashboard_uid: String,
    cache: RemoteVariables,
}

impl GrafanaClient {
    /// `None` unless url, api key and dashboard uid are all configured.
    pub fn from_config(config: &GrafanaConfig) -> Result<Option<Self>, ClientError> {
        let (Some(url), Some(api_key), Some(dashboard_uid)) =
            (&config.url, &config.api_key, &config.dashboard_uid)
        else {
            info!("Grafana client not configured, using local configuration only");
            return Ok(None);
        };

        Ok(Some(Self {
            client: http_client()?,
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.clone(),
            dashboard_uid: dashboard_uid.clone(),
            cache: RemoteVariables::new(),
        }))
    }

    async fn refresh(&self) -> Result<RemoteVariables, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/dashboards/uid/{}", self.url, self.dashboard_uid))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let dashboard: DashboardResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))?;
        Ok(variables_from_dashboard(dashboard))
    }
}

#[async_trait]
impl RemoteConfigSource for GrafanaClient {
    async fn fetch_variables(&mut self) -> RemoteVariables {
        match self.refresh().await {
            Ok(variables) => {
                info!("Refreshed variables from Grafana: {} values", variables.len());
                self.cache = variables;
            }
            Err(e) => {
                error!(
                    "Error refreshing Grafana variables, using {} cached values: {}",
                    self.cache.len(),
                    e
                );
            }
        }
        self.cache.clone()
    }
}

fn variables_from_dashboard(response: DashboardResponse) -> RemoteVariables {
    response
        .dashboard
        .templating
        .list
        .into_iter()
        .filter_map(|variable| {
            let name = variable.name.filter(|n| !n.is_empty())?;
            let value = variable.current?.value.filter(|v| !v.is_null())?;
            Some((name, value))
        })
        .collect()
}
