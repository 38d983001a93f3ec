use std::time::Instant;

use base64::Engine;
use cideldill_codec::Cid;
use cideldill_protocol::{
    CallData, CidNotFoundBody, CompleteRequest, CompleteResponse, FunctionRegistration,
    ReportComErrorRequest, SerializedItem, StartResponse,
};
use reqwest::blocking::Response;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::cache::ValueCache;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::fatal;

/// Blocking HTTP transport to the breakpoint server (spec §4.D).
///
/// Every request retries on transport errors and 5xx responses until
/// `config.retry_deadline` elapses, at which point the process exits via
/// [`fatal::exit_with_server_failure`] rather than returning an error.
pub struct Transport {
    client: reqwest::blocking::Client,
    config: ClientConfig,
}

impl Transport {
    pub fn new(config: ClientConfig) -> Self {
        Transport {
            client: reqwest::blocking::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `POST /api/call/start`. Retries exactly once, with missing CIDs'
    /// `data` reattached from `cache`, if the server answers `cid_not_found`.
    pub fn call_start(
        &self,
        call_data: &mut CallData,
        cache: &ValueCache,
    ) -> Result<StartResponse, ClientError> {
        let response = self.send(Method::POST, "/api/call/start", Some(&*call_data));
        self.finish_call_start(response, call_data, cache, true)
    }

    fn finish_call_start(
        &self,
        response: Response,
        call_data: &mut CallData,
        cache: &ValueCache,
        allow_retry: bool,
    ) -> Result<StartResponse, ClientError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<StartResponse>()
                .map_err(|source| ClientError::ProtocolMalformed { detail: source.to_string() });
        }
        let body: Value = response.json().unwrap_or(Value::Null);
        if allow_retry
            && status == StatusCode::BAD_REQUEST
            && body.get("error").and_then(Value::as_str) == Some("cid_not_found")
        {
            let missing: CidNotFoundBody = serde_json::from_value(body)
                .map_err(|source| ClientError::ProtocolMalformed { detail: source.to_string() })?;
            attach_missing_data(call_data, &missing.missing_cids, cache)?;
            let retry = self.send(Method::POST, "/api/call/start", Some(&*call_data));
            return self.finish_call_start(retry, call_data, cache, false);
        }
        Err(ClientError::ServerRejected { status: status.as_u16(), body: body.to_string() })
    }

    /// `GET <poll_url>` (already an absolute path, e.g. `/api/poll/<uuid>`).
    pub fn poll(&self, poll_url: &str) -> Result<cideldill_protocol::PollResponse, ClientError> {
        let response = self.send(Method::GET, poll_url, None::<&()>);
        parse_json(response)
    }

    /// `POST /api/call/complete`.
    pub fn call_complete(&self, request: &CompleteRequest) -> Result<CompleteResponse, ClientError> {
        let response = self.send(Method::POST, "/api/call/complete", Some(request));
        parse_json(response)
    }

    /// `POST /api/report-com-error`. Best-effort: failures here are logged,
    /// not retried against the fatal-exit budget, since this call itself is
    /// only made after some other transport failure was already observed.
    pub fn report_com_error(&self, request: &ReportComErrorRequest) {
        match self.client.post(self.url("/api/report-com-error")).json(request).send() {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(status = %response.status(), "server rejected com-error report");
            }
            Err(source) => {
                tracing::warn!(error = %source, "failed to report com-error");
            }
            Ok(_) => {}
        }
    }

    /// `POST /api/functions`: advertise a locally resolvable callable.
    pub fn register_function(
        &self,
        name: &str,
        registration: &FunctionRegistration,
    ) -> Result<(), ClientError> {
        let body = serde_json::json!({
            "function_name": name,
            "signature": registration.signature,
            "metadata": registration.metadata,
        });
        let response = self.send(Method::POST, "/api/functions", Some(&body));
        if response.status().is_success() {
            Ok(())
        } else {
            let body: Value = response.json().unwrap_or(Value::Null);
            Err(ClientError::ServerRejected {
                status: StatusCode::BAD_REQUEST.as_u16(),
                body: body.to_string(),
            })
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.server_url, path)
    }

    /// Send one request, retrying transport errors and 5xx responses until
    /// the retry deadline elapses, then fatally exiting the process.
    fn send<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> Response {
        let url = self.url(path);
        let deadline = Instant::now() + self.config.retry_deadline;
        loop {
            let mut builder = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                builder = builder.json(body);
            }
            match builder.send() {
                Ok(response) if response.status().is_server_error() => {
                    if Instant::now() >= deadline {
                        fatal::exit_with_server_failure(
                            &format!("{method} {path} kept failing with server errors"),
                            &self.config.server_url,
                            None,
                        );
                    }
                    tracing::warn!(%method, path, status = %response.status(), "server error, retrying");
                    std::thread::sleep(self.config.retry_interval);
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
                    std::thread::sleep(self.config.retry_interval);
                }
            }
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ClientError::ServerRejected { status: status.as_u16(), body });
    }
    response
        .json::<T>()
        .map_err(|source| ClientError::ProtocolMalformed { detail: source.to_string() })
}

/// Reattach base64 `data` to every [`SerializedItem`] in `call_data` whose
/// CID appears in `missing`, pulling the original value from `cache`.
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

#[cfg(test)]
mod tests {
    use super::*;
    use cideldill_protocol::{CallSite, ProcessIdentity};
    use serde_json::json;

    fn reference(value: &serde_json::Value) -> SerializedItem {
        SerializedItem::reference(cideldill_codec::encode(value).cid)
    }

    fn sample_call_data(target: SerializedItem, args: Vec<SerializedItem>) -> CallData {
        CallData {
            method_name: "echo".to_string(),
            target,
            args,
            kwargs: Default::default(),
            call_site: CallSite { timestamp: 0.0, stack_trace: Vec::new() },
            signature: None,
            process_identity: ProcessIdentity { pid: 1, process_start_time: 0.0 },
        }
    }

    #[test]
    fn attach_if_missing_fills_in_cached_data() {
        let value = json!({"x": 1});
        let cid = cideldill_codec::encode(&value).cid;
        let cache = ValueCache::new(16);
        cache.mark_sent(cid.clone(), value.clone());

        let mut item = SerializedItem::reference(cid.clone());
        attach_if_missing(&mut item, &[cid], &cache).unwrap();
        assert!(item.data.is_some());
    }

    #[test]
    fn attach_if_missing_is_a_noop_for_unrelated_cids() {
        let value = json!("unrelated");
        let cid = cideldill_codec::encode(&value).cid;
        let cache = ValueCache::new(16);
        cache.mark_sent(cid.clone(), value);

        let other = reference(&json!("something else"));
        let mut item = other.clone();
        attach_if_missing(&mut item, &[cid], &cache).unwrap();
        assert!(item.data.is_none());
    }

    #[test]
    fn attach_if_missing_errors_when_value_not_cached() {
        let value = json!("never cached");
        let cid = cideldill_codec::encode(&value).cid;
        let cache = ValueCache::new(16);

        let mut item = SerializedItem::reference(cid.clone());
        let error = attach_if_missing(&mut item, &[cid], &cache).unwrap_err();
        assert!(matches!(error, ClientError::ProtocolMalformed { .. }));
    }

    #[test]
    fn attach_missing_data_reattaches_target_args_and_kwargs() {
        let target_value = json!("target");
        let arg_value = json!(42);
        let target_cid = cideldill_codec::encode(&target_value).cid;
        let arg_cid = cideldill_codec::encode(&arg_value).cid;

        let cache = ValueCache::new(16);
        cache.mark_sent(target_cid.clone(), target_value.clone());
        cache.mark_sent(arg_cid.clone(), arg_value.clone());

        let mut call_data =
            sample_call_data(SerializedItem::reference(target_cid.clone()), vec![SerializedItem::reference(arg_cid.clone())]);
        attach_missing_data(&mut call_data, &[target_cid, arg_cid], &cache).unwrap();

        assert!(call_data.target.data.is_some());
        assert!(call_data.args[0].data.is_some());
    }
}
