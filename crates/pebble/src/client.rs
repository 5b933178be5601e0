//! Pebble API client.
//!
//! Every endpoint answers with the same JSON envelope; asynchronous
//! operations return a change id which is waited on before returning.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mlflow_reconciler::{Layer, Plan, Supervisor};
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::config::PebbleConfig;
use crate::error::{Error, Result};
use crate::types::{Change, Envelope, ResponseType, ServiceAction, ServiceInfo};

/// Client for the Pebble v1 API.
#[derive(Debug, Clone)]
pub struct PebbleClient {
    /// Configuration for the client.
    config: Arc<PebbleConfig>,
    /// HTTP client.
    http_client: reqwest::Client,
}

impl PebbleClient {
    /// Create a new client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_config(config: PebbleConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::connection_failed(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    /// Create a new client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_url(base_url: Url) -> Result<Self> {
        Self::with_config(PebbleConfig::new(base_url))
    }

    /// Fetch the combined plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the plan does not parse.
    pub async fn plan(&self) -> Result<Plan> {
        let envelope = self.get("/v1/plan", &[("format", "yaml")]).await?;
        let yaml = envelope
            .result
            .as_str()
            .ok_or_else(|| Error::invalid_response("plan result is not a string"))?;
        Ok(Plan::from_yaml(yaml)?)
    }

    /// Add a layer to the plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer cannot be encoded or Pebble rejects it.
    pub async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        let body = json!({
            "action": "add",
            "combine": combine,
            "label": label,
            "format": "yaml",
            "layer": layer.to_yaml()?,
        });
        self.post("/v1/layers", &body).await?;
        debug!(label, combine, "Layer added");
        Ok(())
    }

    /// Start or stop services and wait for the change to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the change reports an error.
    pub async fn service_action(&self, action: ServiceAction, services: &[&str]) -> Result<()> {
        let body = json!({ "action": action, "services": services });
        let envelope = self.post("/v1/services", &body).await?;

        let id = envelope
            .change
            .ok_or_else(|| Error::invalid_response(format!("{action} returned no change id")))?;

        info!(%action, ?services, change = %id, "Waiting for change");
        self.wait_change(&id).await
    }

    /// Fetch the status of one service.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response does not parse.
    pub async fn service_info(&self, name: &str) -> Result<Option<ServiceInfo>> {
        let envelope = self.get("/v1/services", &[("names", name)]).await?;
        let services: Vec<ServiceInfo> = serde_json::from_value(envelope.result)?;
        Ok(services.into_iter().find(|s| s.name == name))
    }

    async fn wait_change(&self, id: &str) -> Result<()> {
        let wait = format!("{}s", self.config.change_timeout.as_secs());
        let url = self.url(&format!("/v1/changes/{id}/wait"))?;
        let budget = self.config.timeout.saturating_add(self.config.change_timeout);

        let response = self
            .http_client
            .get(url)
            .query(&[("timeout", wait.as_str())])
            .timeout(budget)
            .send()
            .await
            .map_err(|e| Error::from_request(e, millis(budget)))?;

        let envelope = Self::decode(response).await?;
        let change: Change = serde_json::from_value(envelope.result)?;

        if let Some(err) = change.err.filter(|e| !e.is_empty()) {
            return Err(Error::change_failed(change.id, err));
        }
        if !change.ready {
            return Err(Error::change_failed(
                change.id,
                format!("still {} after {wait}", change.status),
            ));
        }
        Ok(())
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Envelope> {
        let response = self
            .http_client
            .get(self.url(path)?)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::from_request(e, millis(self.config.timeout)))?;

        Self::decode(response).await
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<Envelope> {
        let response = self
            .http_client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::from_request(e, millis(self.config.timeout)))?;

        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<Envelope> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::invalid_response(format!("failed to read body: {e}")))?;

        let envelope: Envelope = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                Error::invalid_response(format!("malformed envelope: {e}"))
            } else {
                Error::api(status.as_u16(), text.trim().to_string())
            }
        })?;

        if envelope.kind == ResponseType::Error || !status.is_success() {
            let code = if envelope.status_code == 0 {
                status.as_u16()
            } else {
                envelope.status_code
            };
            return Err(Error::api(code, envelope.error_message()));
        }

        Ok(envelope)
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| Error::config_error(format!("Invalid API URL: {e}")))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl Supervisor for PebbleClient {
    async fn get_plan(&self) -> mlflow_reconciler::Result<Plan> {
        Ok(self.plan().await?)
    }

    async fn add_layer(
        &self,
        label: &str,
        layer: &Layer,
        combine: bool,
    ) -> mlflow_reconciler::Result<()> {
        Ok(Self::add_layer(self, label, layer, combine).await?)
    }

    async fn start_service(&self, name: &str) -> mlflow_reconciler::Result<()> {
        Ok(self.service_action(ServiceAction::Start, &[name]).await?)
    }

    async fn stop_service(&self, name: &str) -> mlflow_reconciler::Result<()> {
        Ok(self.service_action(ServiceAction::Stop, &[name]).await?)
    }

    async fn is_running(&self, name: &str) -> mlflow_reconciler::Result<bool> {
        let info = self.service_info(name).await?;
        Ok(info.is_some_and(|s| s.is_running()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlflow_reconciler::ServiceSpec;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sync(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "type": "sync",
            "status-code": 200,
            "status": "OK",
            "result": result,
        }))
    }

    fn accepted(change: &str) -> ResponseTemplate {
        ResponseTemplate::new(202).set_body_json(json!({
            "type": "async",
            "status-code": 202,
            "status": "Accepted",
            "change": change,
            "result": null,
        }))
    }

    async fn client_for(server: &MockServer) -> std::result::Result<PebbleClient, Box<dyn std::error::Error>> {
        let base_url = server.uri().parse::<Url>()?;
        Ok(PebbleClient::with_url(base_url)?)
    }

    #[tokio::test]
    async fn test_plan() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/plan"))
            .and(query_param("format", "yaml"))
            .respond_with(sync(json!(
                "services:\n  server:\n    override: replace\n    command: mlflow server\n    startup: enabled\n"
            )))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await?;
        let plan = client.plan().await?;

        assert_eq!(
            plan.service("server").and_then(|s| s.command.as_deref()),
            Some("mlflow server")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_plan() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/plan"))
            .respond_with(sync(json!("{}\n")))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await?;
        assert!(client.plan().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_add_layer() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/layers"))
            .and(body_partial_json(json!({
                "action": "add",
                "combine": true,
                "label": "mlflow-server",
                "format": "yaml",
            })))
            .respond_with(sync(json!(true)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await?;
        let layer = Layer::single("summary", "", "server", &ServiceSpec::new("run"));
        client.add_layer("mlflow-server", &layer, true).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_start_waits_for_change() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/services"))
            .and(body_partial_json(json!({"action": "start", "services": ["server"]})))
            .respond_with(accepted("12"))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/changes/12/wait"))
            .respond_with(sync(json!({"id": "12", "status": "Done", "ready": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await?;
        Supervisor::start_service(&client, "server").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_change() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/services"))
            .respond_with(accepted("3"))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/changes/3/wait"))
            .respond_with(sync(json!({
                "id": "3",
                "status": "Error",
                "ready": true,
                "err": "cannot start service: exited quickly with code 2",
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await?;
        let result = client
            .service_action(ServiceAction::Start, &["server"])
            .await;

        assert!(matches!(result, Err(Error::ChangeFailed { ref id, .. }) if id == "3"));

        let result = Supervisor::start_service(&client, "server").await;
        assert!(result.is_err_and(|e| e.is_service_failure() && !e.is_transient()));
        Ok(())
    }

    #[tokio::test]
    async fn test_error_envelope() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/layers"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "type": "error",
                "status-code": 400,
                "status": "Bad Request",
                "result": {"message": "layer \"mlflow-server\" already exists"},
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await?;
        let layer = Layer::single("", "", "server", &ServiceSpec::new("run"));
        let result = client.add_layer("mlflow-server", &layer, false).await;

        assert!(matches!(result, Err(Error::Api { status: 400, .. })));
        if let Err(error) = result {
            assert!(error.to_string().contains("already exists"));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_non_json_server_error() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/plan"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await?;
        let result = Supervisor::get_plan(&client).await;

        assert!(result.is_err_and(|e| e.is_transient()));
        Ok(())
    }

    #[tokio::test]
    async fn test_is_running() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/services"))
            .and(query_param("names", "server"))
            .respond_with(sync(json!([
                {"name": "server", "startup": "enabled", "current": "active"}
            ])))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/services"))
            .and(query_param("names", "worker"))
            .respond_with(sync(json!([])))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await?;
        assert!(Supervisor::is_running(&client, "server").await?);
        assert!(!Supervisor::is_running(&client, "worker").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_timeout() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/plan"))
            .respond_with(sync(json!("{}")).set_delay(Duration::from_secs(10)))
            .mount(&mock_server)
            .await;

        let base_url = mock_server.uri().parse::<Url>()?;
        let client = PebbleClient::with_config(
            PebbleConfig::new(base_url).timeout(Duration::from_millis(100)),
        )?;

        let result = client.plan().await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_connection_refused() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        let base_url = mock_server.uri().parse::<Url>()?;
        drop(mock_server);

        let client = PebbleClient::with_url(base_url)?;
        let result = Supervisor::get_plan(&client).await;

        assert!(result.is_err_and(|e| e.is_transient()));
        Ok(())
    }
}
