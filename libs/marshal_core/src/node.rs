//! Container nesting frames shared by readers and writers.

use crate::state::ContainerKind;

/// One open container, or the root frame, of a stream.
///
/// Frames form an owned, strictly LIFO linked stack: a frame is
/// created when a container starts, owned exclusively by the stream
/// until the matching end is consumed or emitted, then discarded. The
/// stack can never contain cycles.
///
/// The active property name lives in the frame rather than in a
/// stream-wide field, so that array-of-object nesting reusing one
/// reader or writer instance cannot alias names across levels.
///
/// `T` is the format-specific per-frame bookkeeping (symbol table
/// handle, run buffers, bound sizes and the like).
#[derive(Debug)]
pub struct Node<T> {
    parent: Option<Box<Node<T>>>,
    kind: ContainerKind,
    count: u32,
    name: Option<Box<str>>,
    context: T,
}

impl<T> Node<T> {
    /// Creates the root frame.
    pub fn root(context: T) -> Self {
        Self {
            parent: None,
            kind: ContainerKind::None,
            count: 0,
            name: None,
            context,
        }
    }

    /// Pushes a child frame for a newly started container, consuming
    /// this frame as the parent.
    #[must_use]
    pub fn push(self, kind: ContainerKind, context: T) -> Self {
        Self {
            parent: Some(Box::new(self)),
            kind,
            count: 0,
            name: None,
            context,
        }
    }

    /// Pops this frame, returning the parent (absent for the root
    /// frame) and this frame's context.
    #[must_use]
    pub fn pop(self) -> (Option<Self>, T) {
        (self.parent.map(|parent| *parent), self.context)
    }

    /// The container kind of this frame.
    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// The container kind of the parent frame;
    /// [`ContainerKind::None`] at the root.
    pub fn parent_kind(&self) -> ContainerKind {
        self.parent.as_ref().map_or(ContainerKind::None, |p| p.kind)
    }

    /// Whether this is the root frame.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of child values or properties seen so far in this frame.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Records one more child value or property.
    pub fn bump(&mut self) {
        self.count += 1;
    }

    /// The active property name of this frame, if one is set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(Box::from(name));
    }

    pub fn clear_name(&mut self) {
        self.name = None;
    }

    pub fn context(&self) -> &T {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut T {
        &mut self.context
    }
}
