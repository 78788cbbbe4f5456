use crate::controller::opensprinkler::{auth, types};
use crate::controller::{Controller, ControllerError, ControllerSnapshot};
use crate::data::RunLogRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// OpenSprinkler HTTP API client
pub struct OpenSprinklerClient {
    client: Client,
    base_url: Url,
    password_hash: String,
}

impl OpenSprinklerClient {
    /// Create new client for the controller at `base_url`
    pub fn new(base_url: &str, password: &str, timeout: Duration) -> Result<Self, ControllerError> {
        let client = Client::builder().timeout(timeout).build()?;

        // Endpoints are joined onto the path, so it must end in a slash
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            password_hash: auth::hash_password(password),
        })
    }

    /// Read the full controller state
    pub async fn get_all(&self) -> Result<types::JsonAll, ControllerError> {
        self.get("ja", &[]).await
    }

    /// Execute an authenticated GET and decode the JSON body
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ControllerError> {
        let mut url = self.base_url.join(endpoint)?;
        url.set_query(Some(&auth::build_query(params, &self.password_hash)));

        debug!("Controller request: {}", endpoint);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Controller request {} failed: {}", endpoint, status);
            return Err(ControllerError::Payload(format!(
                "{} returned HTTP {}",
                endpoint, status
            )));
        }

        let body: Value = response.json().await?;

        // Failures come back as HTTP 200 with {"result": n}
        if let Some(code) = body.get("result").and_then(Value::as_i64) {
            if code != 1 {
                warn!("Controller rejected {} with result {}", endpoint, code);
                return Err(ControllerError::Api(code));
            }
        }

        serde_json::from_value(body)
            .map_err(|e| ControllerError::Payload(format!("{}: {}", endpoint, e)))
    }
}

#[async_trait]
impl Controller for OpenSprinklerClient {
    async fn refresh(&self) -> Result<ControllerSnapshot, ControllerError> {
        let all = self.get_all().await?;
        Ok(all.into_snapshot())
    }

    async fn get_logs(&self, lookback_days: u32) -> Result<Vec<RunLogRecord>, ControllerError> {
        let days = lookback_days.to_string();
        let entries: Vec<Vec<Value>> = self.get("jl", &[("hist", &days)]).await?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in &entries {
            match types::parse_log_entry(entry) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed log entry: {}", e),
            }
        }

        debug!("Fetched {} log records for {} days", records.len(), lookback_days);
        Ok(records)
    }
}
