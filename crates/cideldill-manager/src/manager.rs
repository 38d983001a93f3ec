use std::collections::HashMap;

use cideldill_codec::Cid;
use cideldill_protocol::{
    next_call_id, resolve_after, resolve_before, unix_timestamp, Action, AckStatus, Behavior,
    CallData, CallId, CallRecord, CallStatus, ComError, CompleteResponse, DefaultBehavior,
    ExceptionInfo, ExecutionRecord, FunctionRegistration, PausedExecution, PollMarker,
    PollResponse, ReplSession, ReplTranscriptEntry, SerializedItem, StartAction, StartResponse,
    TimelineEvent,
};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::ManagerError;
use crate::observer::ManagerObserver;
use crate::state::{BreakpointsSnapshot, ManagerState};

/// Default poll cadence handed to clients for both the before- and
/// after-breakpoint pause, per spec §4.G.
pub const POLL_INTERVAL_MS: u64 = 100;
pub const POLL_TIMEOUT_MS: u64 = 60_000;

/// Server-side breakpoint state and the pause scheduler subprotocol that
/// operates on it (spec §4.E, §4.G).
pub struct Manager {
    state: Mutex<ManagerState>,
    observers: Mutex<Vec<Box<dyn ManagerObserver>>>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    pub fn new() -> Self {
        Manager {
            state: Mutex::new(ManagerState::default()),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn add_observer(&self, observer: Box<dyn ManagerObserver>) {
        self.observers.lock().push(observer);
    }

    // ---- breakpoint administration ----------------------------------

    pub fn add_breakpoint(&self, name: &str) {
        self.state.lock().breakpoints.insert(name.to_string());
    }

    pub fn remove_breakpoint(&self, name: &str) -> Result<(), ManagerError> {
        let mut state = self.state.lock();
        if !state.breakpoints.remove(name) {
            return Err(ManagerError::BreakpointNotFound { name: name.to_string() });
        }
        state.before_behavior.remove(name);
        state.after_behavior.remove(name);
        state.replacement.remove(name);
        Ok(())
    }

    pub fn set_before_behavior(&self, name: &str, behavior: Behavior) -> Result<(), ManagerError> {
        let mut state = self.state.lock();
        if !state.breakpoints.contains(name) {
            return Err(ManagerError::BreakpointNotFound { name: name.to_string() });
        }
        state.before_behavior.insert(name.to_string(), behavior);
        Ok(())
    }

    pub fn set_after_behavior(&self, name: &str, behavior: Behavior) -> Result<(), ManagerError> {
        let mut state = self.state.lock();
        if !state.breakpoints.contains(name) {
            return Err(ManagerError::BreakpointNotFound { name: name.to_string() });
        }
        state.after_behavior.insert(name.to_string(), behavior);
        Ok(())
    }

    pub fn set_default_behavior(&self, default: DefaultBehavior) {
        self.state.lock().default_behavior = default;
    }

    pub fn default_behavior(&self) -> DefaultBehavior {
        self.state.lock().default_behavior
    }

    /// Set a replacement, validating that both `name` and `replacement` are
    /// registered with identical signatures.
    pub fn set_replacement(&self, name: &str, replacement: &str) -> Result<(), ManagerError> {
        let mut state = self.state.lock();
        if !state.breakpoints.contains(name) {
            return Err(ManagerError::BreakpointNotFound { name: name.to_string() });
        }
        let signature_mismatch = || ManagerError::SignatureMismatch {
            name: name.to_string(),
            replacement: replacement.to_string(),
        };
        let target_sig = state.registered_functions.get(name).and_then(|r| r.signature.clone());
        let replacement_sig = state
            .registered_functions
            .get(replacement)
            .and_then(|r| r.signature.clone());
        match (target_sig, replacement_sig) {
            (Some(a), Some(b)) if a == b => {
                state.replacement.insert(name.to_string(), replacement.to_string());
                Ok(())
            }
            _ => Err(signature_mismatch()),
        }
    }

    pub fn clear_replacement(&self, name: &str) {
        self.state.lock().replacement.remove(name);
    }

    pub fn register_function(&self, name: &str, signature: Option<String>) {
        let mut state = self.state.lock();
        state
            .registered_functions
            .insert(name.to_string(), FunctionRegistration { signature, metadata: None });
    }

    pub fn list_functions(&self) -> HashMap<String, FunctionRegistration> {
        self.state.lock().registered_functions.clone()
    }

    pub fn list_breakpoints(&self) -> BreakpointsSnapshot {
        let state = self.state.lock();
        BreakpointsSnapshot {
            breakpoints: state.breakpoints.iter().cloned().collect(),
            behaviors: state.before_behavior.clone(),
            after_behaviors: state.after_behavior.clone(),
            replacements: state.replacement.clone(),
        }
    }

    pub fn history(&self, name: &str, limit: Option<usize>) -> Vec<ExecutionRecord> {
        let state = self.state.lock();
        let records = state.history.get(name).cloned().unwrap_or_default();
        match limit {
            Some(limit) if records.len() > limit => records[records.len() - limit..].to_vec(),
            _ => records,
        }
    }

    // ---- policy resolution --------------------------------------------

    fn should_pause_before(state: &ManagerState, name: &str) -> bool {
        if !state.breakpoints.contains(name) {
            return false;
        }
        let behavior = state.before_behavior.get(name).copied().unwrap_or(Behavior::Yield);
        resolve_before(behavior, state.default_behavior) == Behavior::Stop
    }

    fn should_pause_after(state: &ManagerState, name: &str) -> bool {
        if !state.breakpoints.contains(name) {
            return false;
        }
        let behavior = state.after_behavior.get(name).copied().unwrap_or(Behavior::Yield);
        resolve_after(behavior) == Behavior::Stop
    }

    fn effective_replacement(state: &ManagerState, name: &str) -> Option<String> {
        if state.breakpoints.contains(name) {
            state.replacement.get(name).cloned()
        } else {
            None
        }
    }

    // ---- pause scheduler: start flow -----------------------------------

    /// `call/start`: assign a call_id, persist call data, and resolve the
    /// first action per spec §4.G's start flow.
    pub fn start_call(&self, call_data: CallData) -> StartResponse {
        let call_id = next_call_id();
        let method_name = call_data.method_name.clone();
        let mut state = self.state.lock();
        state.call_index.insert(call_id.clone(), call_data.clone());

        let action = if Self::should_pause_before(&state, &method_name) {
            let pause_id = Uuid::new_v4();
            let paused = PausedExecution {
                pause_id,
                call_id: call_id.clone(),
                call_data,
                paused_at: unix_timestamp(),
            };
            state.paused.insert(pause_id, paused.clone());
            state.call_to_pause.insert(call_id.clone(), pause_id);
            drop(state);
            self.fan_out_paused(&paused);
            StartAction::Poll {
                poll_url: format!("/api/poll/{pause_id}"),
                poll_interval_ms: POLL_INTERVAL_MS,
                timeout_ms: POLL_TIMEOUT_MS,
            }
        } else if let Some(function_name) = Self::effective_replacement(&state, &method_name) {
            StartAction::Replace { function_name }
        } else {
            StartAction::Continue
        };
        StartResponse { call_id, action }
    }

    pub fn call_id_for_pending(&self, pause_id: Uuid) -> Option<CallId> {
        self.state.lock().paused.get(&pause_id).map(|p| p.call_id.clone())
    }

    // ---- pause scheduler: poll flow -------------------------------------

    /// `GET /api/poll/<pause_id>`: non-destructive peek, so retries after a
    /// dropped response see the same answer.
    pub fn poll(&self, pause_id: Uuid) -> PollResponse {
        let state = self.state.lock();
        match state.resume.get(&pause_id) {
            Some(action) => PollResponse::Ready { action: action.clone() },
            None => PollResponse::Waiting,
        }
    }

    pub fn list_paused(&self) -> Vec<PausedExecution> {
        self.state.lock().paused.values().cloned().collect()
    }

    // ---- pause scheduler: resume flow -----------------------------------

    /// `POST /api/paused/<pause_id>/continue`: record a resume action.
    pub fn resume(&self, pause_id: Uuid, action: Action) -> Result<(), ManagerError> {
        let mut state = self.state.lock();
        if !state.paused.contains_key(&pause_id) {
            return Err(ManagerError::PauseNotFound { pause_id });
        }
        if state.resume.contains_key(&pause_id) {
            return Err(ManagerError::PauseAlreadyResumed { pause_id });
        }
        if state.post_completion_pauses.contains(&pause_id) && action != Action::Continue {
            return Err(ManagerError::UnsupportedPostCompletionAction);
        }
        state.resume.insert(pause_id, action.clone());
        if let Some(session_id) = state.repl_by_pause.get(&pause_id).copied() {
            if let Some(session) = state.repl_sessions.get_mut(&session_id) {
                session.closed_at = Some(unix_timestamp());
            }
        }
        drop(state);
        self.fan_out_resumed(pause_id, &action);
        Ok(())
    }

    // ---- pause scheduler: complete flow ---------------------------------

    /// `call/complete`: resolve and pop the pending call, append a
    /// [`CallRecord`], and decide whether an after-breakpoint fires.
    #[allow(clippy::too_many_arguments)]
    pub fn complete_call(
        &self,
        call_id: &CallId,
        status: CallStatus,
        result: Option<SerializedItem>,
        exception: Option<ExceptionInfo>,
    ) -> Result<CompleteResponse, ManagerError> {
        let mut state = self.state.lock();
        let call_data = state
            .call_index
            .remove(call_id)
            .ok_or_else(|| ManagerError::CallNotFound { call_id: call_id.clone() })?;

        let mut paused_at = None;
        if let Some(pause_id) = state.call_to_pause.remove(call_id) {
            paused_at = state.paused.remove(&pause_id).map(|paused| paused.paused_at);
            state.resume.remove(&pause_id);
            state.post_completion_pauses.remove(&pause_id);
        }

        let started_at = call_data.call_site.timestamp;
        let method_name = call_data.method_name.clone();
        let record = CallRecord {
            call_id: call_id.clone(),
            method_name: method_name.clone(),
            target: call_data.target,
            args: call_data.args,
            kwargs: call_data.kwargs,
            call_site: call_data.call_site,
            signature: call_data.signature,
            process_identity: call_data.process_identity,
            status,
            result,
            exception,
            started_at,
            completed_at: Some(unix_timestamp()),
        };
        state.call_records.push(record.clone());

        if state.breakpoints.contains(&method_name) {
            state.history.entry(method_name.clone()).or_default().push(ExecutionRecord {
                call_id: call_id.clone(),
                method_name: method_name.clone(),
                status,
                paused_at,
                completed_at: record.completed_at,
            });
        }

        let response = if status == CallStatus::Success && Self::should_pause_after(&state, &method_name) {
            let pause_id = Uuid::new_v4();
            let paused = PausedExecution {
                pause_id,
                call_id: call_id.clone(),
                call_data: CallData {
                    method_name: method_name.clone(),
                    target: record.target.clone(),
                    args: record.args.clone(),
                    kwargs: record.kwargs.clone(),
                    call_site: record.call_site.clone(),
                    signature: record.signature.clone(),
                    process_identity: record.process_identity.clone(),
                },
                paused_at: unix_timestamp(),
            };
            state.paused.insert(pause_id, paused.clone());
            state.call_to_pause.insert(call_id.clone(), pause_id);
            state.post_completion_pauses.insert(pause_id);
            drop(state);
            self.fan_out_paused(&paused);
            CompleteResponse::Poll {
                _action_poll: PollMarker,
                poll_url: format!("/api/poll/{pause_id}"),
                poll_interval_ms: POLL_INTERVAL_MS,
                timeout_ms: POLL_TIMEOUT_MS,
            }
        } else {
            drop(state);
            CompleteResponse::Ack { status: AckStatus::Ok }
        };

        self.fan_out_completed(&record);
        Ok(response)
    }

    // ---- com errors ------------------------------------------------------

    pub fn report_com_error(&self, error: ComError) {
        self.state.lock().push_com_error(error);
    }

    pub fn com_errors(&self) -> Vec<ComError> {
        self.state.lock().com_errors.iter().cloned().collect()
    }

    // ---- timeline ----------------------------------------------------------

    pub fn record_event(&self, event: TimelineEvent) {
        self.state.lock().push_timeline_event(event);
    }

    pub fn timeline_events(&self) -> Vec<TimelineEvent> {
        self.state.lock().timeline.iter().cloned().collect()
    }

    // ---- REPL session metadata -------------------------------------------

    pub fn repl_open(&self, pause_id: Uuid, pid: u32) -> Result<ReplSession, ManagerError> {
        let mut state = self.state.lock();
        if !state.paused.contains_key(&pause_id) {
            return Err(ManagerError::PauseNotFound { pause_id });
        }
        let session = ReplSession {
            session_id: Uuid::new_v4(),
            pause_id,
            pid,
            started_at: unix_timestamp(),
            closed_at: None,
            transcript: Vec::new(),
        };
        state.repl_by_pause.insert(pause_id, session.session_id);
        state.repl_sessions.insert(session.session_id, session.clone());
        Ok(session)
    }

    /// Append a transcript entry. Evaluation itself is out of scope for this
    /// workspace (spec §9 Open Questions); `output` is always `None`.
    pub fn repl_eval(&self, session_id: Uuid, input: String) -> Result<ReplTranscriptEntry, ManagerError> {
        let mut state = self.state.lock();
        let session = state
            .repl_sessions
            .get_mut(&session_id)
            .ok_or(ManagerError::ReplSessionNotFound { session_id })?;
        let entry = ReplTranscriptEntry {
            at: unix_timestamp(),
            input,
            output: None,
        };
        session.transcript.push(entry.clone());
        Ok(entry)
    }

    // ---- object history ----------------------------------------------------

    pub fn record_object_ref(&self, process_key: String, client_ref: String, cid: Cid) {
        self.state.lock().object_history.insert((process_key, client_ref), cid);
    }

    pub fn lookup_object_ref(&self, process_key: &str, client_ref: &str) -> Option<Cid> {
        self.state
            .lock()
            .object_history
            .get(&(process_key.to_string(), client_ref.to_string()))
            .cloned()
    }

    pub fn call_records(&self) -> Vec<CallRecord> {
        self.state.lock().call_records.clone()
    }

    // ---- observer fan-out ----------------------------------------------

    fn fan_out_paused(&self, paused: &PausedExecution) {
        for observer in self.observers.lock().iter() {
            observer.on_execution_paused(paused);
        }
    }

    fn fan_out_resumed(&self, pause_id: Uuid, action: &Action) {
        for observer in self.observers.lock().iter() {
            observer.on_execution_resumed(pause_id, action);
        }
    }

    fn fan_out_completed(&self, record: &CallRecord) {
        for observer in self.observers.lock().iter() {
            observer.on_call_completed(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cideldill_codec::cid as compute_cid;
    use cideldill_protocol::{CallSite, ProcessIdentity};

    fn sample_call(method_name: &str, args: Vec<SerializedItem>) -> CallData {
        CallData {
            method_name: method_name.to_string(),
            target: SerializedItem::reference(compute_cid(method_name.as_bytes())),
            args,
            kwargs: Default::default(),
            call_site: CallSite {
                timestamp: unix_timestamp(),
                stack_trace: Vec::new(),
            },
            signature: Some("(a, b)".to_string()),
            process_identity: ProcessIdentity { pid: 1, process_start_time: 0.0 },
        }
    }

    fn item(n: i64) -> SerializedItem {
        // The manager never decodes `data`; any opaque payload string is fine here.
        let bytes = serde_json::to_vec(&n).unwrap();
        SerializedItem::inline(compute_cid(&bytes), format!("{n}"))
    }

    #[test]
    fn continue_with_no_breakpoint() {
        let manager = Manager::new();
        let response = manager.start_call(sample_call("add", vec![item(2), item(3)]));
        assert_eq!(response.action, StartAction::Continue);
    }

    #[test]
    fn stop_then_resume_continue() {
        let manager = Manager::new();
        manager.add_breakpoint("add");
        manager.set_before_behavior("add", Behavior::Stop).unwrap();

        let response = manager.start_call(sample_call("add", vec![item(2), item(3)]));
        let pause_id = match response.action {
            StartAction::Poll { poll_url, .. } => {
                Uuid::parse_str(poll_url.rsplit('/').next().unwrap()).unwrap()
            }
            other => panic!("expected poll, got {other:?}"),
        };

        assert_eq!(manager.poll(pause_id), PollResponse::Waiting);
        manager.resume(pause_id, Action::Continue).unwrap();
        assert_eq!(manager.poll(pause_id), PollResponse::Ready { action: Action::Continue });

        let call_id = manager.call_id_for_pending(pause_id).unwrap();
        manager
            .complete_call(&call_id, CallStatus::Success, Some(item(5)), None)
            .unwrap();

        let history = manager.history("add", None);
        assert_eq!(history.len(), 1);
        let paused_at = history[0].paused_at.expect("a stopped call records its pause time");
        assert!(history[0].completed_at.unwrap() >= paused_at);
    }

    #[test]
    fn resume_on_unknown_pause_is_not_found() {
        let manager = Manager::new();
        assert!(matches!(
            manager.resume(Uuid::new_v4(), Action::Continue),
            Err(ManagerError::PauseNotFound { .. })
        ));
    }

    #[test]
    fn resume_twice_is_rejected() {
        let manager = Manager::new();
        manager.add_breakpoint("add");
        manager.set_before_behavior("add", Behavior::Stop).unwrap();
        let response = manager.start_call(sample_call("add", vec![item(2), item(3)]));
        let pause_id = match response.action {
            StartAction::Poll { poll_url, .. } => Uuid::parse_str(poll_url.rsplit('/').next().unwrap()).unwrap(),
            other => panic!("expected poll, got {other:?}"),
        };
        manager.resume(pause_id, Action::Continue).unwrap();
        assert!(matches!(
            manager.resume(pause_id, Action::Continue),
            Err(ManagerError::PauseAlreadyResumed { .. })
        ));
    }

    #[test]
    fn replace_requires_matching_signatures() {
        let manager = Manager::new();
        manager.add_breakpoint("add");
        manager.register_function("add", Some("(a, b)".to_string()));
        manager.register_function("add_alt", Some("(a, b)".to_string()));
        manager.set_replacement("add", "add_alt").unwrap();

        let response = manager.start_call(sample_call("add", vec![item(2), item(3)]));
        assert_eq!(response.action, StartAction::Replace { function_name: "add_alt".to_string() });
    }

    #[test]
    fn replace_rejects_mismatched_signature() {
        let manager = Manager::new();
        manager.add_breakpoint("add");
        manager.register_function("add", Some("(a, b)".to_string()));
        manager.register_function("add_alt", Some("(a)".to_string()));
        assert!(manager.set_replacement("add", "add_alt").is_err());
    }

    #[test]
    fn post_completion_pause_rejects_non_continue() {
        let manager = Manager::new();
        manager.add_breakpoint("add");
        manager.set_after_behavior("add", Behavior::Stop).unwrap();

        let start = manager.start_call(sample_call("add", vec![item(2), item(3)]));
        assert_eq!(start.action, StartAction::Continue);

        let response = manager
            .complete_call(&start.call_id, CallStatus::Success, Some(item(5)), None)
            .unwrap();
        let pause_id = match response {
            CompleteResponse::Poll { poll_url, .. } => {
                Uuid::parse_str(poll_url.rsplit('/').next().unwrap()).unwrap()
            }
            other => panic!("expected secondary poll, got {other:?}"),
        };

        assert!(matches!(
            manager.resume(pause_id, Action::Skip { fake_result: None, fake_result_cid: None, fake_result_data: None }),
            Err(ManagerError::UnsupportedPostCompletionAction)
        ));
        manager.resume(pause_id, Action::Continue).unwrap();
    }

    #[test]
    fn empty_breakpoint_set_never_pauses() {
        let manager = Manager::new();
        let response = manager.start_call(sample_call("anything", vec![]));
        assert_eq!(response.action, StartAction::Continue);
        assert!(manager.list_paused().is_empty());
    }
}
