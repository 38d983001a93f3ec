use std::collections::{HashMap, HashSet, VecDeque};

use cideldill_codec::Cid;
use cideldill_protocol::{
    Action, CallData, CallId, CallRecord, ComError, DefaultBehavior, ExecutionRecord,
    FunctionRegistration, PausedExecution, TimelineEvent,
};
use uuid::Uuid;

use cideldill_protocol::Behavior;

const COM_ERROR_RING_CAPACITY: usize = 500;
const TIMELINE_RING_CAPACITY: usize = 500;

/// All server-side state guarded by one coarse mutex (spec §4.E, §5).
#[derive(Default)]
pub struct ManagerState {
    pub breakpoints: HashSet<String>,
    pub before_behavior: HashMap<String, Behavior>,
    pub after_behavior: HashMap<String, Behavior>,
    pub replacement: HashMap<String, String>,
    pub default_behavior: DefaultBehavior,

    pub paused: HashMap<Uuid, PausedExecution>,
    pub resume: HashMap<Uuid, Action>,
    pub post_completion_pauses: HashSet<Uuid>,

    pub call_index: HashMap<CallId, CallData>,
    pub call_to_pause: HashMap<CallId, Uuid>,

    pub history: HashMap<String, Vec<ExecutionRecord>>,
    pub call_records: Vec<CallRecord>,
    pub com_errors: VecDeque<ComError>,
    pub timeline: VecDeque<TimelineEvent>,

    pub repl_sessions: HashMap<Uuid, cideldill_protocol::ReplSession>,
    pub repl_by_pause: HashMap<Uuid, Uuid>,

    pub registered_functions: HashMap<String, FunctionRegistration>,
    pub object_history: HashMap<(String, String), Cid>,
}

impl ManagerState {
    pub fn push_com_error(&mut self, error: ComError) {
        if self.com_errors.len() >= COM_ERROR_RING_CAPACITY {
            self.com_errors.pop_front();
        }
        self.com_errors.push_back(error);
    }

    pub fn push_timeline_event(&mut self, event: TimelineEvent) {
        if self.timeline.len() >= TIMELINE_RING_CAPACITY {
            self.timeline.pop_front();
        }
        self.timeline.push_back(event);
    }
}

/// `GET /api/breakpoints` response shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BreakpointsSnapshot {
    pub breakpoints: Vec<String>,
    pub behaviors: HashMap<String, Behavior>,
    pub after_behaviors: HashMap<String, Behavior>,
    pub replacements: HashMap<String, String>,
}
