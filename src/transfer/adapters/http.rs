//! REST backend
//!
//! `GET /transfers`, `POST /transfers`, `POST /transfers/{id}/receive`,
//! `GET /inventory`, `GET /warehouses`. Payloads are accepted either bare
//! or wrapped in a `{status, msg, data}` envelope; a non-zero envelope
//! status is a failed call even on HTTP 200.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::traits::TransferBackend;
use crate::configure::AppConfig;
use crate::transfer::errors::TransferError;
use crate::transfer::types::{NewTransfer, Product, Transfer, TransferId, Warehouse};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Response body, enveloped or bare
///
/// The envelope is tried first: a bare transfer carries a string `status`
/// and never matches it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload<T> {
    Wrapped {
        status: i32,
        #[serde(default)]
        msg: String,
        data: Option<T>,
    },
    Bare(T),
}

impl<T> Payload<T> {
    /// Unwrap the data, turning a non-zero envelope status into a failure
    fn into_result(self) -> Result<T, TransferError> {
        match self {
            Payload::Bare(inner) => Ok(inner),
            Payload::Wrapped { status: 0, data: Some(data), .. } => Ok(data),
            Payload::Wrapped { status: 0, .. } => Err(TransferError::operation_failed(
                "backend envelope carried no data",
            )),
            Payload::Wrapped { status, msg, .. } if msg.is_empty() => Err(
                TransferError::operation_failed(format!("backend reported status {}", status)),
            ),
            Payload::Wrapped { msg, .. } => Err(TransferError::operation_failed(msg)),
        }
    }
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self, TransferError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, TransferError> {
        Self::new(
            &config.api_base_url,
            Duration::from_millis(config.request_timeout_ms),
            config.api_token.clone(),
        )
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode the body, mapping failures for `id` when given
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        id: Option<&TransferId>,
    ) -> Result<T, TransferError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        log::debug!("backend responded HTTP {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(error_from_status(status, &body, id));
        }

        let payload: Payload<T> = serde_json::from_str(&body).map_err(|e| {
            TransferError::operation_failed(format!("malformed backend response: {}", e))
        })?;
        payload.into_result()
    }

    /// `{base}/transfers/{id}/receive` with the id percent-encoded as one segment
    pub fn receive_url(&self, id: &TransferId) -> Result<Url, TransferError> {
        let mut url = Url::parse(&self.endpoint("/transfers")).map_err(|e| {
            TransferError::operation_failed(format!("invalid backend url {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                TransferError::operation_failed(format!("backend url {} cannot take a path", self.base_url))
            })?
            .push(id.as_str())
            .push("receive");
        Ok(url)
    }
}

/// Map a non-2xx response to the error surfaced to the caller
pub fn error_from_status(status: StatusCode, body: &str, id: Option<&TransferId>) -> TransferError {
    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => TransferError::NotFound(id.clone()),
        (StatusCode::CONFLICT, Some(id)) => TransferError::AlreadyReceived(id.clone()),
        _ => {
            let message = server_message(body)
                .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body.trim()));
            TransferError::OperationFailed { message }
        }
    }
}

/// Extract the human-readable message a backend put in an error body
pub fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl TransferBackend for HttpBackend {
    async fn list_transfers(&self) -> Result<Vec<Transfer>, TransferError> {
        let url = self.endpoint("/transfers");
        self.send(self.client.get(&url), None).await
    }

    async fn create_transfer(&self, req: &NewTransfer) -> Result<Transfer, TransferError> {
        let url = self.endpoint("/transfers");
        let request = self
            .client
            .post(&url)
            .header(IDEMPOTENCY_HEADER, req.request_id.to_string())
            .json(req);
        self.send(request, None).await
    }

    async fn receive_transfer(&self, id: &TransferId) -> Result<Transfer, TransferError> {
        let url = self.receive_url(id)?;
        self.send(self.client.post(url), Some(id)).await
    }

    async fn list_inventory(&self) -> Result<Vec<Product>, TransferError> {
        let url = self.endpoint("/inventory");
        self.send(self.client.get(&url), None).await
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, TransferError> {
        let url = self.endpoint("/warehouses");
        self.send(self.client.get(&url), None).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let backend =
            HttpBackend::new("http://localhost:8080/api/", Duration::from_secs(1), None).unwrap();
        assert_eq!(backend.endpoint("/transfers"), "http://localhost:8080/api/transfers");
    }

    #[test]
    fn test_server_message_fields() {
        assert_eq!(
            server_message(r#"{"message":"insufficient stock"}"#).as_deref(),
            Some("insufficient stock")
        );
        assert_eq!(
            server_message(r#"{"status":1,"msg":"bad warehouse","data":null}"#).as_deref(),
            Some("bad warehouse")
        );
        assert_eq!(server_message(r#"{"error":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(server_message(r#"{"message":""}"#), None);
        assert_eq!(server_message("<html>oops</html>"), None);
    }

    #[test]
    fn test_error_from_status_fallback() {
        let err = error_from_status(StatusCode::INTERNAL_SERVER_ERROR, " upstream died ", None);
        assert_eq!(err, TransferError::operation_failed("HTTP 500: upstream died"));
    }

    #[test]
    fn test_error_from_status_receive_mapping() {
        let id = TransferId::new("T1");
        assert_eq!(
            error_from_status(StatusCode::NOT_FOUND, "", Some(&id)),
            TransferError::NotFound(id.clone())
        );
        assert_eq!(
            error_from_status(StatusCode::CONFLICT, "{}", Some(&id)),
            TransferError::AlreadyReceived(id.clone())
        );
        // Without an id a 404 is just a failed call
        assert_eq!(
            error_from_status(StatusCode::NOT_FOUND, r#"{"message":"no route"}"#, None),
            TransferError::operation_failed("no route")
        );
    }

    #[test]
    fn test_payload_accepts_envelope() {
        let bare: Payload<Vec<u32>> = serde_json::from_str("[1,2]").unwrap();
        assert_eq!(bare.into_result().unwrap(), vec![1, 2]);

        let wrapped: Payload<Vec<u32>> =
            serde_json::from_str(r#"{"status":0,"msg":"ok","data":[3]}"#).unwrap();
        assert_eq!(wrapped.into_result().unwrap(), vec![3]);
    }

    #[test]
    fn test_payload_error_status() {
        let failed: Payload<Vec<u32>> =
            serde_json::from_str(r#"{"status":500,"msg":"database down","data":[]}"#).unwrap();
        assert_eq!(
            failed.into_result().unwrap_err(),
            TransferError::operation_failed("database down")
        );

        let silent: Payload<Vec<u32>> = serde_json::from_str(r#"{"status":7}"#).unwrap();
        assert_eq!(
            silent.into_result().unwrap_err(),
            TransferError::operation_failed("backend reported status 7")
        );

        let empty: Payload<Vec<u32>> =
            serde_json::from_str(r#"{"status":0,"msg":"ok","data":null}"#).unwrap();
        assert!(empty.into_result().is_err());
    }

    #[test]
    fn test_bare_transfer_is_not_an_envelope() {
        let body = r#"{"id":"T1","product":{"id":"P1","name":"Widget"},
            "fromWarehouse":{"id":"W1","name":"North"},"toWarehouse":{"id":"W2","name":"South"},
            "quantity":50,"status":"Pending"}"#;
        let payload: Payload<Transfer> = serde_json::from_str(body).unwrap();
        assert_eq!(payload.into_result().unwrap().id, TransferId::new("T1"));
    }

    #[test]
    fn test_receive_url_encodes_id() {
        let backend =
            HttpBackend::new("http://localhost:8080/api/", Duration::from_secs(1), None).unwrap();
        let url = backend.receive_url(&TransferId::new("T#1/a b?")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/transfers/T%231%2Fa%20b%3F/receive");

        let plain = backend.receive_url(&TransferId::new("TR-0001")).unwrap();
        assert_eq!(plain.as_str(), "http://localhost:8080/api/transfers/TR-0001/receive");
    }
}
