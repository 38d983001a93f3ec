use std::time::Instant;

use base64::Engine;
use cideldill_codec::Cid;
use cideldill_protocol::{
    CallData, CidNotFoundBody, CompleteRequest, CompleteResponse, FunctionRegistration,
    ReportComErrorRequest, SerializedItem, StartResponse,
};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::cache::ValueCache;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::fatal;

/// Async mirror of [`crate::transport::Transport`] for `DebugProxy::call_async`
/// (spec §4.D "Async callables"). Suspension points are explicit `.await`s
/// at each network round-trip and each poll sleep.
pub struct AsyncTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

enum StartAttempt {
    Ready(StartResponse),
    Retry(Vec<Cid>),
}

impl AsyncTransport {
    pub fn new(config: ClientConfig) -> Self {
        AsyncTransport {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn call_start(
        &self,
        call_data: &mut CallData,
        cache: &ValueCache,
    ) -> Result<StartResponse, ClientError> {
        let first = self.send(Method::POST, "/api/call/start", Some(&*call_data)).await;
        match self.read_start_response(first).await? {
            StartAttempt::Ready(response) => Ok(response),
            StartAttempt::Retry(missing) => {
                attach_missing_data(call_data, &missing, cache)?;
                let second = self.send(Method::POST, "/api/call/start", Some(&*call_data)).await;
                match self.read_start_response(second).await? {
                    StartAttempt::Ready(response) => Ok(response),
                    StartAttempt::Retry(_) => Err(ClientError::ProtocolMalformed {
                        detail: "server reported cid_not_found twice for the same call".to_string(),
                    }),
                }
            }
        }
    }

    async fn read_start_response(&self, response: Response) -> Result<StartAttempt, ClientError> {
        let status = response.status();
        if status.is_success() {
            let parsed = response
                .json::<StartResponse>()
                .await
                .map_err(|source| ClientError::ProtocolMalformed { detail: source.to_string() })?;
            return Ok(StartAttempt::Ready(parsed));
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status == StatusCode::BAD_REQUEST && body.get("error").and_then(Value::as_str) == Some("cid_not_found") {
            let missing: CidNotFoundBody = serde_json::from_value(body)
                .map_err(|source| ClientError::ProtocolMalformed { detail: source.to_string() })?;
            return Ok(StartAttempt::Retry(missing.missing_cids));
        }
        Err(ClientError::ServerRejected { status: status.as_u16(), body: body.to_string() })
    }

    pub async fn poll(&self, poll_url: &str) -> Result<cideldill_protocol::PollResponse, ClientError> {
        let response = self.send(Method::GET, poll_url, None::<&()>).await;
        parse_json(response).await
    }

    pub async fn call_complete(&self, request: &CompleteRequest) -> Result<CompleteResponse, ClientError> {
        let response = self.send(Method::POST, "/api/call/complete", Some(request)).await;
        parse_json(response).await
    }

    pub async fn report_com_error(&self, request: &ReportComErrorRequest) {
        match self.client.post(self.url("/api/report-com-error")).json(request).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(status = %response.status(), "server rejected com-error report");
            }
            Err(source) => {
                tracing::warn!(error = %source, "failed to report com-error");
            }
            Ok(_) => {}
        }
    }

    pub async fn register_function(
        &self,
        name: &str,
        registration: &FunctionRegistration,
    ) -> Result<(), ClientError> {
        let body = serde_json::json!({
            "function_name": name,
            "signature": registration.signature,
            "metadata": registration.metadata,
        });
        let response = self.send(Method::POST, "/api/functions", Some(&body)).await;
        if response.status().is_success() {
            Ok(())
        } else {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            Err(ClientError::ServerRejected {
                status: StatusCode::BAD_REQUEST.as_u16(),
                body: body.to_string(),
            })
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.server_url, path)
    }

    async fn send<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> Response {
        let url = self.url(path);
        let deadline = Instant::now() + self.config.retry_deadline;
        loop {
            let mut builder = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                builder = builder.json(body);
            }
            match builder.send().await {
                Ok(response) if response.status().is_server_error() => {
                    if Instant::now() >= deadline {
                        fatal::exit_with_server_failure(
                            &format!("{method} {path} kept failing with server errors"),
                            &self.config.server_url,
                            None,
                        );
                    }
                    tracing::warn!(%method, path, status = %response.status(), "server error, retrying");
                    tokio::time::sleep(self.config.retry_interval).await;
                }
                Ok(response) => return response,
                Err(source) => {
                    if Instant::now() >= deadline {
                        fatal::exit_with_server_failure(
                            &format!("{method} {path} unreachable"),
                            &self.config.server_url,
                            Some(&source),
                        );
                    }
                    tracing::warn!(%method, path, error = %source, "transport error, retrying");
                    tokio::time::sleep(self.config.retry_interval).await;
                }
            }
        }
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::ServerRejected { status: status.as_u16(), body });
    }
    response
        .json::<T>()
        .await
        .map_err(|source| ClientError::ProtocolMalformed { detail: source.to_string() })
}

fn attach_missing_data(call_data: &mut CallData, missing: &[Cid], cache: &ValueCache) -> Result<(), ClientError> {
    attach_if_missing(&mut call_data.target, missing, cache)?;
    for item in &mut call_data.args {
        attach_if_missing(item, missing, cache)?;
    }
    for item in call_data.kwargs.values_mut() {
        attach_if_missing(item, missing, cache)?;
    }
    Ok(())
}

fn attach_if_missing(item: &mut SerializedItem, missing: &[Cid], cache: &ValueCache) -> Result<(), ClientError> {
    if item.data.is_some() || !missing.contains(&item.cid) {
        return Ok(());
    }
    let value = cache.value_of(&item.cid).ok_or_else(|| ClientError::ProtocolMalformed {
        detail: format!("server reported cid {} missing but it is not in the local cache", item.cid),
    })?;
    let encoded = cideldill_codec::encode(&value);
    item.data = Some(base64::engine::general_purpose::STANDARD.encode(&encoded.bytes));
    cache.forget_sent(&item.cid);
    cache.mark_sent(item.cid.clone(), value);
    Ok(())
}
