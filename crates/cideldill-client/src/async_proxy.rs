use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine;
use cideldill_codec::Cid;
use cideldill_protocol::{
    unix_timestamp, Action, CallData, CallStatus, CompleteRequest, CompleteResponse,
    ExceptionInfo, FunctionRegistration, PollResponse, SerializedItem, StartAction,
};
use serde_json::Value;

use crate::async_dispatch::{AsyncDispatchTable, BoxedProxyFuture};
use crate::async_transport::AsyncTransport;
use crate::cache::ValueCache;
use crate::error::ClientError;
use crate::proxy::{ProxyError, ProxyResult};
use crate::state;

/// Async mirror of [`crate::proxy::DebugProxy`] for coroutine-style
/// callables (spec §4.D "Async callables", §9 "Coroutine interception").
/// Suspension points are explicit `.await`s at each poll tick and each
/// network round-trip.
pub struct AsyncDebugProxy<F> {
    method_name: String,
    signature: Option<String>,
    inner: F,
    transport: AsyncTransport,
    cache: ValueCache,
    dispatch: Arc<AsyncDispatchTable>,
    registered: AtomicBool,
}

impl<F> AsyncDebugProxy<F>
where
    F: Fn(Vec<Value>, BTreeMap<String, Value>) -> BoxedProxyFuture,
{
    pub fn new(
        method_name: impl Into<String>,
        signature: Option<String>,
        inner: F,
        transport: AsyncTransport,
        dispatch: Arc<AsyncDispatchTable>,
    ) -> Self {
        let cache_capacity = transport.config().cache_capacity;
        AsyncDebugProxy {
            method_name: method_name.into(),
            signature,
            inner,
            transport,
            cache: ValueCache::new(cache_capacity),
            dispatch,
            registered: AtomicBool::new(false),
        }
    }

    pub async fn call(&self, args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> ProxyResult {
        if !state::is_enabled() {
            return (self.inner)(args, kwargs).await;
        }
        self.call_intercepted(args, kwargs).await
    }

    async fn ensure_registered(&self) {
        if self.registered.swap(true, Ordering::AcqRel) {
            return;
        }
        let registration = FunctionRegistration { signature: self.signature.clone(), metadata: None };
        if let Err(error) = self.transport.register_function(&self.method_name, &registration).await {
            tracing::warn!(method = %self.method_name, %error, "failed to register function with server");
        }
    }

    async fn call_intercepted(&self, args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> ProxyResult {
        self.ensure_registered().await;

        let mut call_data = self.build_call_data(&args, &kwargs);
        let start = match self.transport.call_start(&mut call_data, &self.cache).await {
            Ok(start) => start,
            Err(error) => {
                tracing::error!(%error, "call/start failed");
                self.report_com_error(None, &error.to_string()).await;
                return Err(ProxyError {
                    exception_type: "ProtocolError".to_string(),
                    exception_message: error.to_string(),
                });
            }
        };
        let call_id = start.call_id.clone();

        let action = self.resolve_action(start.action).await;
        let (outcome, status, result, exception) = self.execute(action, args, kwargs).await;

        let complete = CompleteRequest {
            call_id: call_id.clone(),
            status,
            result,
            exception,
            process_identity: crate::proxy_support::process_identity(),
            timestamp: unix_timestamp(),
        };
        match self.transport.call_complete(&complete).await {
            Ok(CompleteResponse::Poll { poll_url, poll_interval_ms, .. }) => {
                self.await_after_pause(&poll_url, poll_interval_ms).await;
            }
            Ok(CompleteResponse::Ack { .. }) => {}
            Err(error) => {
                tracing::error!(%error, "failed to report call completion");
                self.report_com_error(Some(&call_id), &error.to_string()).await;
            }
        }

        outcome
    }

    fn build_call_data(&self, args: &[Value], kwargs: &BTreeMap<String, Value>) -> CallData {
        CallData {
            method_name: self.method_name.clone(),
            target: self.serialize_item(&Value::String(self.method_name.clone())),
            args: args.iter().map(|v| self.serialize_item(v)).collect(),
            kwargs: kwargs.iter().map(|(k, v)| (k.clone(), self.serialize_item(v))).collect(),
            call_site: crate::proxy_support::capture_call_site(),
            signature: self.signature.clone(),
            process_identity: crate::proxy_support::process_identity(),
        }
    }

    fn serialize_item(&self, value: &Value) -> SerializedItem {
        let encoded = cideldill_codec::encode(value);
        if self.cache.was_sent(&encoded.cid) {
            SerializedItem::reference(encoded.cid)
        } else {
            let data = base64::engine::general_purpose::STANDARD.encode(&encoded.bytes);
            self.cache.mark_sent(encoded.cid.clone(), value.clone());
            SerializedItem::inline(encoded.cid, data)
        }
    }

    fn resolve_value(&self, item: &SerializedItem) -> Result<Value, ClientError> {
        crate::proxy_support::resolve_value(item, &self.cache)
    }

    async fn resolve_action(&self, start_action: StartAction) -> Action {
        match start_action {
            StartAction::Continue => Action::Continue,
            StartAction::Replace { function_name } => Action::Replace { function_name },
            StartAction::Poll { poll_url, poll_interval_ms, .. } => {
                self.poll_until_ready(&poll_url, poll_interval_ms).await
            }
        }
    }

    async fn poll_until_ready(&self, poll_url: &str, poll_interval_ms: u64) -> Action {
        let mut ticks = 0u32;
        loop {
            match self.transport.poll(poll_url).await {
                Ok(PollResponse::Ready { action }) => return action,
                Ok(PollResponse::Waiting) => {}
                Err(error) => tracing::warn!(%error, "poll failed, retrying"),
            }
            tokio::time::sleep(std::time::Duration::from_millis(poll_interval_ms)).await;
            ticks += 1;
            if ticks % 600 == 0 {
                tracing::info!(poll_url, "still waiting for operator to resume paused call");
            }
        }
    }

    async fn await_after_pause(&self, poll_url: &str, poll_interval_ms: u64) {
        match self.poll_until_ready(poll_url, poll_interval_ms).await {
            Action::Continue => {}
            other => tracing::warn!(?other, "unsupported post-completion action from server, ignoring"),
        }
    }

    async fn execute(
        &self,
        action: Action,
        original_args: Vec<Value>,
        original_kwargs: BTreeMap<String, Value>,
    ) -> (ProxyResult, CallStatus, Option<SerializedItem>, Option<ExceptionInfo>) {
        let outcome = match action {
            Action::Continue => (self.inner)(original_args, original_kwargs).await,
            Action::Replace { function_name } => match self.dispatch.get(&function_name) {
                Some(callable) => callable(original_args, original_kwargs).await,
                None => {
                    let error = ClientError::ReplacementNotRegistered { name: function_name.clone() };
                    self.report_com_error(None, &error.to_string()).await;
                    Err(ProxyError {
                        exception_type: "ReplacementNotRegistered".to_string(),
                        exception_message: error.to_string(),
                    })
                }
            },
            Action::Modify { modified_args, modified_kwargs } => {
                match self.resolve_modified(&modified_args, &modified_kwargs) {
                    Ok((args, kwargs)) => (self.inner)(args, kwargs).await,
                    Err(error) => Err(ProxyError {
                        exception_type: "ProtocolError".to_string(),
                        exception_message: error.to_string(),
                    }),
                }
            }
            Action::Skip { fake_result, fake_result_cid, fake_result_data } => {
                self.resolve_skip_result(fake_result, fake_result_cid, fake_result_data)
            }
            Action::Raise { exception_type, exception_message } => {
                Err(ProxyError { exception_type, exception_message })
            }
        };

        match outcome {
            Ok(value) => {
                let item = self.serialize_item(&value);
                (Ok(value), CallStatus::Success, Some(item), None)
            }
            Err(error) => {
                let exception = ExceptionInfo {
                    exception_type: error.exception_type.clone(),
                    exception_message: error.exception_message.clone(),
                    traceback: None,
                };
                (Err(error), CallStatus::Exception, None, Some(exception))
            }
        }
    }

    fn resolve_modified(
        &self,
        modified_args: &[SerializedItem],
        modified_kwargs: &BTreeMap<String, SerializedItem>,
    ) -> Result<(Vec<Value>, BTreeMap<String, Value>), ClientError> {
        let args = modified_args.iter().map(|item| self.resolve_value(item)).collect::<Result<Vec<_>, _>>()?;
        let kwargs = modified_kwargs
            .iter()
            .map(|(k, item)| self.resolve_value(item).map(|v| (k.clone(), v)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok((args, kwargs))
    }

    fn resolve_skip_result(
        &self,
        fake_result: Option<Value>,
        fake_result_cid: Option<Cid>,
        fake_result_data: Option<SerializedItem>,
    ) -> ProxyResult {
        if let Some(value) = fake_result {
            return Ok(value);
        }
        if let Some(item) = fake_result_data {
            return self.resolve_value(&item).map_err(|error| ProxyError {
                exception_type: "ProtocolError".to_string(),
                exception_message: error.to_string(),
            });
        }
        if let Some(cid) = fake_result_cid {
            return self.cache.value_of(&cid).ok_or_else(|| ProxyError {
                exception_type: "ProtocolError".to_string(),
                exception_message: format!("no local value cached for fake_result_cid {cid}"),
            });
        }
        Ok(Value::Null)
    }

    async fn report_com_error(&self, call_id: Option<&str>, summary: &str) {
        let request = cideldill_protocol::ReportComErrorRequest {
            process_key: Some(crate::proxy_support::process_identity().process_key()),
            call_id: call_id.map(str::to_string),
            summary: summary.to_string(),
            detail: None,
        };
        self.transport.report_com_error(&request).await;
    }
}
