use serde::{Deserialize, Serialize};

/// Marker key used to recognize a decoded placeholder.
pub const PLACEHOLDER_MARKER: &str = "__cideldill_placeholder__";

/// Maximum characters kept from a value's `Debug` representation when it
/// cannot be serialized. Rust's serializer failures do not hand back a
/// partial attribute tree the way the source runtime's `inspect`-based
/// reducer does, so depth/breadth bounding is approximated by truncating
/// the debug repr rather than walking fields.
const MAX_REPR_CHARS: usize = 4_000;

/// A degraded stand-in for a value that failed to encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placeholder {
    #[serde(rename = "__cideldill_placeholder__")]
    pub marker: bool,
    pub type_name: String,
    pub repr: String,
    pub error_chain: Vec<String>,
    pub timestamp: f64,
}

impl Placeholder {
    pub fn new(type_name: impl Into<String>, repr: impl Into<String>, error_chain: Vec<String>, timestamp: f64) -> Self {
        let mut repr = repr.into();
        if repr.len() > MAX_REPR_CHARS {
            let boundary = repr
                .char_indices()
                .map(|(i, _)| i)
                .take_while(|&i| i <= MAX_REPR_CHARS)
                .last()
                .unwrap_or(0);
            repr.truncate(boundary);
            repr.push_str("...<truncated>");
        }
        Placeholder {
            marker: true,
            type_name: type_name.into(),
            repr,
            error_chain,
            timestamp,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Recognize a decoded JSON value as a placeholder.
    pub fn from_value(value: &serde_json::Value) -> Option<Placeholder> {
        let is_placeholder = value
            .as_object()
            .and_then(|obj| obj.get(PLACEHOLDER_MARKER))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !is_placeholder {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_repr_is_kept_verbatim() {
        let placeholder = Placeholder::new("int", "42", vec![], 0.0);
        assert_eq!(placeholder.repr, "42");
    }

    #[test]
    fn long_repr_is_truncated_on_a_char_boundary() {
        // A repr made entirely of a 3-byte character straddles
        // `MAX_REPR_CHARS` at a non-boundary byte offset if truncated naively.
        let repr: String = std::iter::repeat('\u{20ac}').take(MAX_REPR_CHARS + 10).collect();
        let placeholder = Placeholder::new("str", repr, vec![], 0.0);
        assert!(placeholder.repr.ends_with("...<truncated>"));
        assert!(placeholder.repr.is_char_boundary(placeholder.repr.len() - "...<truncated>".len()));
    }

    #[test]
    fn round_trips_through_to_value_and_from_value() {
        let placeholder = Placeholder::new("Foo", "Foo(1)", vec!["TypeError: boom".to_string()], 12.5);
        let value = placeholder.to_value();
        let decoded = Placeholder::from_value(&value).expect("recognized as placeholder");
        assert_eq!(decoded.type_name, "Foo");
        assert_eq!(decoded.error_chain, vec!["TypeError: boom".to_string()]);
    }

    #[test]
    fn from_value_rejects_non_placeholder_values() {
        assert!(Placeholder::from_value(&serde_json::json!({"a": 1})).is_none());
    }
}
