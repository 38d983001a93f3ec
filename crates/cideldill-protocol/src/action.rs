use std::collections::BTreeMap;

use cideldill_codec::Cid;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::serialized_item::SerializedItem;

/// An action resolved for a debuggee to execute, per spec §4.G's transition
/// table. This is both the terminal payload of a poll's `ready` response
/// and the body accepted by `/api/paused/<pause_id>/continue`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Continue,
    Replace {
        function_name: String,
    },
    Modify {
        modified_args: Vec<SerializedItem>,
        #[serde(default)]
        modified_kwargs: BTreeMap<String, SerializedItem>,
    },
    Skip {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        fake_result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        fake_result_cid: Option<Cid>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        fake_result_data: Option<SerializedItem>,
    },
    Raise {
        exception_type: String,
        exception_message: String,
    },
}

// Manual `Deserialize` so a missing `action` field defaults to `continue`,
// matching the source server's `ResumeAction.from_dict` default.
impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| D::Error::custom("resume action body must be a JSON object"))?;
        obj.entry("action").or_insert_with(|| Value::String("continue".to_string()));
        serde_json::from_value(value).map_err(D::Error::custom)
    }
}

/// The envelope returned by `POST /api/call/start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StartAction {
    Continue,
    Replace {
        function_name: String,
    },
    Poll {
        poll_url: String,
        poll_interval_ms: u64,
        timeout_ms: u64,
    },
}

/// Full response body of `POST /api/call/start`: a `call_id` plus the
/// flattened [`StartAction`] envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartResponse {
    pub call_id: crate::call::CallId,
    #[serde(flatten)]
    pub action: StartAction,
}

/// Body of a 400 `cid_not_found` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CidNotFoundBody {
    pub error: String,
    pub missing_cids: Vec<cideldill_codec::Cid>,
}

/// `GET /api/poll/<pause_id>` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollResponse {
    Waiting,
    Ready { action: Action },
}

/// `POST /api/call/complete` response: either a plain acknowledgement or a
/// secondary ("after") poll envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CompleteResponse {
    Poll {
        #[serde(rename = "action")]
        _action_poll: PollMarker,
        poll_url: String,
        poll_interval_ms: u64,
        timeout_ms: u64,
    },
    Ack { status: AckStatus },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Ok,
}

/// Zero-sized marker ensuring `CompleteResponse::Poll` only matches bodies
/// whose `action` field is literally `"poll"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollMarker;

impl Serialize for PollMarker {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("poll")
    }
}

impl<'de> Deserialize<'de> for PollMarker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        if tag == "poll" {
            Ok(PollMarker)
        } else {
            Err(D::Error::custom("expected action=\"poll\""))
        }
    }
}
