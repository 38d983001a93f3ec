use serde::{Deserialize, Serialize};

/// Per-breakpoint policy for when a call begins or ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// Pause and wait for an operator-supplied resume action.
    Stop,
    /// Do not pause; record the call and continue.
    Go,
    /// Defer: before-side falls back to [`DefaultBehavior`]; after-side
    /// never pauses (see spec §3 for the asymmetry).
    Yield,
}

/// The server-wide fallback used to resolve `Behavior::Yield` on the
/// before-side of a breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefaultBehavior {
    #[default]
    Go,
    Stop,
}

impl From<DefaultBehavior> for Behavior {
    fn from(value: DefaultBehavior) -> Self {
        match value {
            DefaultBehavior::Go => Behavior::Go,
            DefaultBehavior::Stop => Behavior::Stop,
        }
    }
}

/// Resolve a before-side behavior against the server default.
///
/// `yield` defers to `default`; `stop`/`go` pass through unchanged. Never
/// returns `Behavior::Yield`.
pub fn resolve_before(behavior: Behavior, default: DefaultBehavior) -> Behavior {
    match behavior {
        Behavior::Yield => default.into(),
        other => other,
    }
}

/// Resolve an after-side behavior. Unlike the before-side, `yield` here
/// means "never pause" — there is no default-behavior fallback.
pub fn resolve_after(behavior: Behavior) -> Behavior {
    match behavior {
        Behavior::Yield => Behavior::Go,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_before_never_yields() {
        for default in [DefaultBehavior::Go, DefaultBehavior::Stop] {
            for behavior in [Behavior::Stop, Behavior::Go, Behavior::Yield] {
                assert_ne!(resolve_before(behavior, default), Behavior::Yield);
            }
        }
    }

    #[test]
    fn resolve_before_yield_follows_default() {
        assert_eq!(resolve_before(Behavior::Yield, DefaultBehavior::Stop), Behavior::Stop);
        assert_eq!(resolve_before(Behavior::Yield, DefaultBehavior::Go), Behavior::Go);
    }

    #[test]
    fn resolve_after_yield_never_pauses() {
        assert_eq!(resolve_after(Behavior::Yield), Behavior::Go);
    }
}
