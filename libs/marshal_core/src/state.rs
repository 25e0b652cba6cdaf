//! Parse and emit states shared by every format implementation.

/// The kind of the container enclosing a stream position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// The root frame, or a transient frame wrapping a single value.
    None,
    Object,
    Array,
}

/// Current position of a reader or writer within the event protocol.
///
/// Exactly one state is current at any time for a given stream.
/// [`Done`](Self::Done) is terminal; the legal successors of every
/// other state depend on the kind of the *enclosing* container, see
/// [`is_valid_transition`](Self::is_valid_transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    /// Initial state; nothing has been read or written.
    Null,
    StartObject,
    StartArray,
    /// A property name inside an object.
    Name,
    /// A scalar value, in any position that allows one.
    Value,
    EndObject,
    EndArray,
    /// Terminal state with no outgoing transitions.
    Done,
}

impl ProtocolState {
    /// Whether moving from `self` to `target` is legal when the
    /// enclosing container is of kind `enclosing`.
    ///
    /// This is the single source of truth used by every format
    /// implementation to reject malformed call sequences as early as
    /// possible, before corrupt output is produced or malformed input
    /// silently accepted.
    #[must_use]
    pub fn is_valid_transition(self, target: Self, enclosing: ContainerKind) -> bool {
        use ProtocolState::*;

        match self {
            Null => matches!(target, Value | Done | StartObject | StartArray),
            StartArray => matches!(target, Value | EndArray | StartObject | StartArray),
            StartObject => matches!(target, Name | EndObject),
            Name => matches!(target, Value | StartObject | StartArray),
            // what may follow a completed value or container depends
            // entirely on where we are
            Value | EndObject | EndArray => match enclosing {
                ContainerKind::Array => {
                    matches!(target, Value | EndArray | StartObject | StartArray)
                }
                ContainerKind::Object => matches!(target, Name | EndObject),
                ContainerKind::None => matches!(target, Done),
            },
            Done => false,
        }
    }

    /// Whether this state is terminal.
    #[must_use]
    pub fn is_done(self) -> bool {
        self == Self::Done
    }
}

#[cfg(test)]
mod tests {
    use super::ContainerKind::{Array, None as Root, Object};
    use super::ProtocolState::{self, *};

    const ALL: [ProtocolState; 8] = [
        Null,
        StartObject,
        StartArray,
        Name,
        Value,
        EndObject,
        EndArray,
        Done,
    ];

    /// Asserts that the set of legal successors for `(from, enclosing)`
    /// is exactly `legal`, and everything else is rejected.
    fn assert_successors(from: ProtocolState, enclosing: super::ContainerKind, legal: &[ProtocolState]) {
        for target in ALL {
            let expected = legal.contains(&target);
            assert_eq!(
                from.is_valid_transition(target, enclosing),
                expected,
                "transition {from:?} -> {target:?} (in {enclosing:?})"
            );
        }
    }

    #[test]
    fn transitions_at_root() {
        assert_successors(Null, Root, &[Value, Done, StartObject, StartArray]);
        assert_successors(Value, Root, &[Done]);
        assert_successors(EndObject, Root, &[Done]);
        assert_successors(EndArray, Root, &[Done]);
        assert_successors(Done, Root, &[]);
    }

    #[test]
    fn transitions_in_object() {
        assert_successors(StartObject, Object, &[Name, EndObject]);
        assert_successors(Name, Object, &[Value, StartObject, StartArray]);
        assert_successors(Value, Object, &[Name, EndObject]);
        assert_successors(EndObject, Object, &[Name, EndObject]);
        assert_successors(EndArray, Object, &[Name, EndObject]);
    }

    #[test]
    fn transitions_in_array() {
        assert_successors(StartArray, Array, &[Value, EndArray, StartObject, StartArray]);
        assert_successors(Value, Array, &[Value, EndArray, StartObject, StartArray]);
        assert_successors(EndObject, Array, &[Value, EndArray, StartObject, StartArray]);
        assert_successors(EndArray, Array, &[Value, EndArray, StartObject, StartArray]);
    }

    #[test]
    fn done_is_terminal_everywhere() {
        for enclosing in [Root, Object, Array] {
            assert_successors(Done, enclosing, &[]);
        }
    }

    #[test]
    fn start_states_ignore_enclosing_kind() {
        // the successors of a start state are governed by the newly
        // opened container, which the state itself names
        for enclosing in [Root, Object, Array] {
            assert_successors(StartObject, enclosing, &[Name, EndObject]);
            assert_successors(
                StartArray,
                enclosing,
                &[Value, EndArray, StartObject, StartArray],
            );
            assert_successors(Name, enclosing, &[Value, StartObject, StartArray]);
        }
    }
}
