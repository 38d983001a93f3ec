use cideldill_codec::Cid;
use serde::{Deserialize, Serialize};

/// Discriminates how a [`SerializedItem`]'s `data` (when present) should be
/// interpreted before its CID is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    /// The canonical codec encoding (base64 of [`cideldill_codec::encode`]'s bytes).
    #[default]
    Dill,
    /// Raw JSON text; the CID is computed over the UTF-8 bytes directly.
    Json,
}

/// `{cid, data?}` — the unit of value exchange over the wire. `data` is
/// present the first time a debuggee transmits a value; later references to
/// the same CID omit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedItem {
    pub cid: Cid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "is_default_format")]
    pub serialization_format: SerializationFormat,
}

fn is_default_format(format: &SerializationFormat) -> bool {
    *format == SerializationFormat::Dill
}

impl SerializedItem {
    pub fn inline(cid: Cid, data_base64: String) -> Self {
        SerializedItem {
            cid,
            data: Some(data_base64),
            serialization_format: SerializationFormat::Dill,
        }
    }

    pub fn reference(cid: Cid) -> Self {
        SerializedItem {
            cid,
            data: None,
            serialization_format: SerializationFormat::Dill,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}
