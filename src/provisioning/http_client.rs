//! SCIM HTTP Client (§4.6): a thin, value-returning wrapper over an outbound
//! HTTP call. It never throws for HTTP-level outcomes — transport failures,
//! 4xx/5xx responses, and successes are all just different `ScimResponse`
//! values for the caller to classify.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ScimResponse {
    /// 0 when the request never reached the server (DNS, TLS, connect, timeout).
    pub status: u16,
    pub body: Option<Value>,
    pub scim_resource_id: Option<String>,
    pub error_message: Option<String>,
}

impl ScimResponse {
    pub fn is_transport_failure(&self) -> bool {
        self.status == 0
    }
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ScimHttpClient: Send + Sync {
    async fn post(&self, base_url: &str, path: &str, bearer_token: &str, body: Value) -> ScimResponse;
    async fn put(&self, base_url: &str, path: &str, bearer_token: &str, body: Value) -> ScimResponse;
    async fn patch(&self, base_url: &str, path: &str, bearer_token: &str, body: Value) -> ScimResponse;
    async fn delete(&self, base_url: &str, path: &str, bearer_token: &str) -> ScimResponse;
}

pub struct ReqwestScimClient {
    client: Client,
}

impl ReqwestScimClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    fn build_url(base_url: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send(
        &self,
        method: Method,
        base_url: &str,
        path: &str,
        bearer_token: &str,
        body: Option<Value>,
    ) -> ScimResponse {
        let url = Self::build_url(base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bearer {bearer_token}"))
            .header("Accept", "application/scim+json");

        if let Some(body) = body {
            request = request.header("Content-Type", "application/scim+json").json(&body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                return ScimResponse {
                    status: 0,
                    body: None,
                    scim_resource_id: None,
                    error_message: Some(err.to_string()),
                };
            }
        };

        let status = response.status().as_u16();
        let body: Option<Value> = response.json().await.ok();
        let scim_resource_id = body
            .as_ref()
            .and_then(|b| b.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let error_message = if !(200..300).contains(&status) {
            body.as_ref()
                .and_then(|b| b.get("detail").or_else(|| b.get("message")))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(format!("SCIM request failed with status {status}")))
        } else {
            None
        };

        ScimResponse {
            status,
            body,
            scim_resource_id,
            error_message,
        }
    }
}

#[async_trait]
impl ScimHttpClient for ReqwestScimClient {
    async fn post(&self, base_url: &str, path: &str, bearer_token: &str, body: Value) -> ScimResponse {
        self.send(Method::POST, base_url, path, bearer_token, Some(body)).await
    }

    async fn put(&self, base_url: &str, path: &str, bearer_token: &str, body: Value) -> ScimResponse {
        self.send(Method::PUT, base_url, path, bearer_token, Some(body)).await
    }

    async fn patch(&self, base_url: &str, path: &str, bearer_token: &str, body: Value) -> ScimResponse {
        self.send(Method::PATCH, base_url, path, bearer_token, Some(body)).await
    }

    async fn delete(&self, base_url: &str, path: &str, bearer_token: &str) -> ScimResponse {
        self.send(Method::DELETE, base_url, path, bearer_token, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_trims_slashes_on_both_sides() {
        assert_eq!(
            ReqwestScimClient::build_url("https://scim.example.com/v2/", "/Users"),
            "https://scim.example.com/v2/Users"
        );
        assert_eq!(
            ReqwestScimClient::build_url("https://scim.example.com/v2", "Users/abc"),
            "https://scim.example.com/v2/Users/abc"
        );
    }

    #[test]
    fn transport_failure_is_status_zero() {
        let response = ScimResponse {
            status: 0,
            body: None,
            scim_resource_id: None,
            error_message: Some("connection refused".into()),
        };
        assert!(response.is_transport_failure());
    }

    #[tokio::test]
    async fn wiremock_create_user_returns_scim_resource_id() {
        use serde_json::json;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/Users"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "remote-user-1",
                "userName": "alice",
            })))
            .mount(&server)
            .await;

        let client = ReqwestScimClient::new(Duration::from_secs(5)).unwrap();
        let response = client
            .post(&server.uri(), "/v2/Users", "test-token", json!({"userName": "alice"}))
            .await;

        assert_eq!(response.status, 201);
        assert_eq!(response.scim_resource_id.as_deref(), Some("remote-user-1"));
        assert!(response.error_message.is_none());
    }

    #[tokio::test]
    async fn wiremock_error_response_surfaces_error_message() {
        use serde_json::json;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "detail": "user already exists",
            })))
            .mount(&server)
            .await;

        let client = ReqwestScimClient::new(Duration::from_secs(5)).unwrap();
        let response = client.post(&server.uri(), "/Users", "t", json!({})).await;

        assert_eq!(response.status, 409);
        assert_eq!(response.error_message.as_deref(), Some("user already exists"));
    }

    #[tokio::test]
    async fn transport_error_against_unroutable_address_yields_status_zero() {
        let client = ReqwestScimClient::new(Duration::from_millis(200)).unwrap();
        let response = client
            .post("http://127.0.0.1:1", "/Users", "t", serde_json::json!({}))
            .await;
        assert!(response.is_transport_failure());
        assert!(response.error_message.is_some());
    }
}
