use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine;
use cideldill_codec::Cid;
use cideldill_protocol::{
    unix_timestamp, Action, CallData, CallStatus, CompleteRequest, CompleteResponse,
    ExceptionInfo, FunctionRegistration, PollResponse, ReportComErrorRequest, SerializedItem,
    StartAction,
};
use serde_json::Value;

use crate::cache::ValueCache;
use crate::dispatch::DispatchTable;
use crate::error::ClientError;
use crate::proxy_support::{capture_call_site, process_identity, resolve_value};
use crate::state;
use crate::transport::Transport;

/// The outcome of invoking the wrapped callable: a JSON value on success, or
/// a lightweight exception description on failure. Callers that want a
/// richer error type convert at the call site — the proxy itself only needs
/// enough structure to report `call/complete` and to implement `raise`.
pub type ProxyResult = Result<Value, ProxyError>;

#[derive(Debug, Clone)]
pub struct ProxyError {
    pub exception_type: String,
    pub exception_message: String,
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.exception_type, self.exception_message)
    }
}

impl std::error::Error for ProxyError {}

/// Wraps a callable so every invocation is intercepted while debug mode is
/// on, and is a zero-cost pass-through while it is off (spec §4.D).
pub struct DebugProxy<F> {
    method_name: String,
    signature: Option<String>,
    inner: F,
    transport: Transport,
    cache: ValueCache,
    dispatch: Arc<DispatchTable>,
    registered: AtomicBool,
}

impl<F> DebugProxy<F>
where
    F: Fn(&[Value], &BTreeMap<String, Value>) -> ProxyResult,
{
    pub fn new(
        method_name: impl Into<String>,
        signature: Option<String>,
        inner: F,
        transport: Transport,
        dispatch: Arc<DispatchTable>,
    ) -> Self {
        let cache_capacity = transport.config().cache_capacity;
        DebugProxy {
            method_name: method_name.into(),
            signature,
            inner,
            transport,
            cache: ValueCache::new(cache_capacity),
            dispatch,
            registered: AtomicBool::new(false),
        }
    }

    /// Invoke the proxy. Passes straight through to the wrapped closure when
    /// debug mode is off.
    pub fn call(&self, args: &[Value], kwargs: &BTreeMap<String, Value>) -> ProxyResult {
        if !state::is_enabled() {
            return (self.inner)(args, kwargs);
        }
        self.call_intercepted(args, kwargs)
    }

    fn ensure_registered(&self) {
        if self.registered.swap(true, Ordering::AcqRel) {
            return;
        }
        let registration = FunctionRegistration { signature: self.signature.clone(), metadata: None };
        if let Err(error) = self.transport.register_function(&self.method_name, &registration) {
            tracing::warn!(method = %self.method_name, %error, "failed to register function with server");
        }
    }

    fn call_intercepted(&self, args: &[Value], kwargs: &BTreeMap<String, Value>) -> ProxyResult {
        self.ensure_registered();

        let mut call_data = self.build_call_data(args, kwargs);
        let start = match self.transport.call_start(&mut call_data, &self.cache) {
            Ok(start) => start,
            Err(error) => {
                tracing::error!(%error, "call/start failed");
                self.report_com_error(None, &error.to_string());
                return Err(ProxyError {
                    exception_type: "ProtocolError".to_string(),
                    exception_message: error.to_string(),
                });
            }
        };
        let call_id = start.call_id.clone();

        let action = self.resolve_action(start.action);
        let (outcome, status, result, exception) = self.execute(action, args, kwargs);

        let complete = CompleteRequest {
            call_id: call_id.clone(),
            status,
            result,
            exception,
            process_identity: process_identity(),
            timestamp: unix_timestamp(),
        };
        match self.transport.call_complete(&complete) {
            Ok(CompleteResponse::Poll { poll_url, poll_interval_ms, .. }) => {
                // After-breakpoint pauses only ever resolve to `continue`
                // (spec §4.G); block until the operator releases it. The
                // outcome already computed above is what is returned.
                self.await_after_pause(&poll_url, poll_interval_ms);
            }
            Ok(CompleteResponse::Ack { .. }) => {}
            Err(error) => {
                tracing::error!(%error, "failed to report call completion");
                self.report_com_error(Some(&call_id), &error.to_string());
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
            call_site: capture_call_site(),
            signature: self.signature.clone(),
            process_identity: process_identity(),
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
        resolve_value(item, &self.cache)
    }

    fn resolve_action(&self, start_action: StartAction) -> Action {
        match start_action {
            StartAction::Continue => Action::Continue,
            StartAction::Replace { function_name } => Action::Replace { function_name },
            StartAction::Poll { poll_url, poll_interval_ms, .. } => self.poll_until_ready(&poll_url, poll_interval_ms),
        }
    }

    /// Long-poll until the operator resumes the call. `timeout_ms` is
    /// advisory only (spec §5 "Cancellation & timeouts"): on expiry the
    /// client logs and keeps polling rather than giving up.
    fn poll_until_ready(&self, poll_url: &str, poll_interval_ms: u64) -> Action {
        let mut ticks = 0u32;
        loop {
            match self.transport.poll(poll_url) {
                Ok(PollResponse::Ready { action }) => return action,
                Ok(PollResponse::Waiting) => {}
                Err(error) => {
                    tracing::warn!(%error, "poll failed, retrying");
                }
            }
            std::thread::sleep(std::time::Duration::from_millis(poll_interval_ms));
            ticks += 1;
            if ticks % 600 == 0 {
                tracing::info!(poll_url, "still waiting for operator to resume paused call");
            }
        }
    }

    fn await_after_pause(&self, poll_url: &str, poll_interval_ms: u64) {
        match self.poll_until_ready(poll_url, poll_interval_ms) {
            Action::Continue => {}
            other => {
                tracing::warn!(?other, "unsupported post-completion action from server, ignoring");
            }
        }
    }

    fn execute(
        &self,
        action: Action,
        original_args: &[Value],
        original_kwargs: &BTreeMap<String, Value>,
    ) -> (ProxyResult, CallStatus, Option<SerializedItem>, Option<ExceptionInfo>) {
        let outcome = match action {
            Action::Continue => (self.inner)(original_args, original_kwargs),
            Action::Replace { function_name } => match self.dispatch.get(&function_name) {
                Some(callable) => callable(original_args, original_kwargs),
                None => {
                    let error = ClientError::ReplacementNotRegistered { name: function_name.clone() };
                    self.report_com_error(None, &error.to_string());
                    Err(ProxyError {
                        exception_type: "ReplacementNotRegistered".to_string(),
                        exception_message: error.to_string(),
                    })
                }
            },
            Action::Modify { modified_args, modified_kwargs } => {
                match self.resolve_modified(&modified_args, &modified_kwargs) {
                    Ok((args, kwargs)) => (self.inner)(&args, &kwargs),
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

    fn report_com_error(&self, call_id: Option<&str>, summary: &str) {
        let request = ReportComErrorRequest {
            process_key: Some(process_identity().process_key()),
            call_id: call_id.map(str::to_string),
            summary: summary.to_string(),
            detail: None,
        };
        self.transport.report_com_error(&request);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;

    type TestCallable = Box<dyn Fn(&[Value], &BTreeMap<String, Value>) -> ProxyResult>;

    fn test_proxy(inner: TestCallable, dispatch: Arc<DispatchTable>) -> DebugProxy<TestCallable> {
        let config = ClientConfig::new("http://127.0.0.1:9").unwrap();
        DebugProxy::new("pkg.fn", None, inner, Transport::new(config), dispatch)
    }

    fn no_args() -> (Vec<Value>, BTreeMap<String, Value>) {
        (Vec::new(), BTreeMap::new())
    }

    #[test]
    fn execute_continue_invokes_the_inner_callable() {
        let proxy = test_proxy(Box::new(|_, _| Ok(json!("real"))), Arc::new(DispatchTable::new()));
        let (args, kwargs) = no_args();
        let (outcome, status, result, exception) = proxy.execute(Action::Continue, &args, &kwargs);
        assert_eq!(outcome.unwrap(), json!("real"));
        assert_eq!(status, CallStatus::Success);
        assert!(result.is_some());
        assert!(exception.is_none());
    }

    #[test]
    fn execute_replace_dispatches_to_the_registered_callable() {
        let dispatch = Arc::new(DispatchTable::new());
        dispatch.insert("pkg.alt", |_, _| Ok(json!("alt result")));
        let proxy = test_proxy(Box::new(|_, _| Ok(json!("real"))), dispatch);
        let (args, kwargs) = no_args();
        let (outcome, status, ..) =
            proxy.execute(Action::Replace { function_name: "pkg.alt".to_string() }, &args, &kwargs);
        assert_eq!(outcome.unwrap(), json!("alt result"));
        assert_eq!(status, CallStatus::Success);
    }

    #[test]
    fn execute_replace_reports_an_error_when_unregistered() {
        let proxy = test_proxy(Box::new(|_, _| Ok(json!("real"))), Arc::new(DispatchTable::new()));
        let (args, kwargs) = no_args();
        let (outcome, status, ..) =
            proxy.execute(Action::Replace { function_name: "pkg.missing".to_string() }, &args, &kwargs);
        assert!(outcome.is_err());
        assert_eq!(status, CallStatus::Exception);
    }

    #[test]
    fn execute_modify_passes_resolved_args_to_the_inner_callable() {
        let proxy =
            test_proxy(Box::new(|args, _| Ok(args[0].clone())), Arc::new(DispatchTable::new()));
        let modified = proxy.serialize_item(&json!(10));
        let (outcome, status, ..) = proxy.execute(
            Action::Modify { modified_args: vec![modified], modified_kwargs: Default::default() },
            &[],
            &BTreeMap::new(),
        );
        assert_eq!(outcome.unwrap(), json!(10));
        assert_eq!(status, CallStatus::Success);
    }

    #[test]
    fn execute_skip_prefers_inline_fake_result() {
        let proxy = test_proxy(Box::new(|_, _| Ok(json!("real"))), Arc::new(DispatchTable::new()));
        let (args, kwargs) = no_args();
        let (outcome, ..) = proxy.execute(
            Action::Skip { fake_result: Some(json!(42)), fake_result_cid: None, fake_result_data: None },
            &args,
            &kwargs,
        );
        assert_eq!(outcome.unwrap(), json!(42));
    }

    #[test]
    fn execute_raise_never_invokes_the_inner_callable() {
        let proxy = test_proxy(
            Box::new(|_, _| panic!("the inner callable must not run on raise")),
            Arc::new(DispatchTable::new()),
        );
        let (args, kwargs) = no_args();
        let (outcome, status, result, exception) = proxy.execute(
            Action::Raise { exception_type: "FileNotFoundError".to_string(), exception_message: "nope".to_string() },
            &args,
            &kwargs,
        );
        assert!(outcome.is_err());
        assert_eq!(status, CallStatus::Exception);
        assert!(result.is_none());
        let exception = exception.unwrap();
        assert_eq!(exception.exception_type, "FileNotFoundError");
    }
}
