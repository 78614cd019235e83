//! Defines the [`List`] struct, an intrusive doubly linked list over an arena of nodes.
//!
//! Nodes are addressed by [`NodeId`]s (indices into a slice owned elsewhere)
//! and carry their own [`Link`]. Besides `prev`/`next` a link remembers which
//! list currently owns the node, so [`splice`] can unlink a node in *O*(1)
//! without being told where it lives.
//!
//! Headers own nothing, they only borrow the node slice for the duration of an operation.

/// Handle of a node, an index into the node slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Handle of a list header, an index into the header slice passed to [`splice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(pub usize);

/// The list membership fields embedded in every node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    owner: Option<ListId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl Link {
    /// Returns the list currently holding the node or `None` if it is detached.
    #[inline]
    pub fn owner(&self) -> Option<ListId> {
        self.owner
    }

    #[inline]
    pub fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    #[inline]
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }
}

/// Types that can be threaded onto a [`List`].
pub trait Linked {
    fn link(&self) -> &Link;
    fn link_mut(&mut self) -> &mut Link;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    id: ListId,
    length: usize,
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

impl List {
    /// Creates an empty list. `id` must be the position of the header
    /// in the slice later handed to [`splice`].
    #[inline]
    pub const fn new(id: ListId) -> Self {
        List {
            id,
            length: 0,
            head: None,
            tail: None,
        }
    }

    /// Makes `node` the new tail of the list.
    /// This operation has a time complexity of *O*(1).
    ///
    /// # Panics
    /// Panics if `node` is out of bounds. `node` must be detached, this is checked in debug builds.
    pub fn append<N: Linked>(&mut self, nodes: &mut [N], node: NodeId) {
        debug_assert!(
            nodes[node.0].link().owner.is_none(),
            "Node {node:?} should be detached before appending."
        );
        *nodes[node.0].link_mut() = Link {
            owner: Some(self.id),
            prev: self.tail,
            next: None,
        };
        match self.tail {
            Some(tail) => nodes[tail.0].link_mut().next = Some(node),
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.length += 1;
    }

    /// Detaches and returns the tail of the list or `None` if the list is empty.
    /// This operation has a time complexity of *O*(1).
    pub fn pop<N: Linked>(&mut self, nodes: &mut [N]) -> Option<NodeId> {
        let tail = self.tail?;
        let prev = nodes[tail.0].link().prev;
        match prev {
            Some(prev) => nodes[prev.0].link_mut().next = None,
            None => self.head = None,
        }
        self.tail = prev;
        self.length -= 1;
        *nodes[tail.0].link_mut() = Link::default();
        Some(tail)
    }

    #[inline]
    pub fn id(&self) -> ListId {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<NodeId> {
        self.tail
    }

    /// Walks the list from head to tail.
    pub fn iter<'a, N: Linked>(&self, nodes: &'a [N]) -> Iter<'a, N> {
        Iter {
            nodes,
            cur: self.head,
        }
    }
}

/// Unlinks `node` from whichever list in `lists` currently owns it,
/// using only the node's own link. Does nothing if the node is detached.
/// This operation has a time complexity of *O*(1).
pub fn splice<N: Linked>(lists: &mut [List], nodes: &mut [N], node: NodeId) {
    let Link { owner, prev, next } = *nodes[node.0].link();
    let Some(owner) = owner else {
        return;
    };
    let list = &mut lists[owner.0];
    debug_assert_eq!(list.id, owner);

    match (prev, next) {
        (None, None) => {
            list.head = None;
            list.tail = None;
        }
        (Some(prev), None) => {
            nodes[prev.0].link_mut().next = None;
            list.tail = Some(prev);
        }
        (None, Some(next)) => {
            nodes[next.0].link_mut().prev = None;
            list.head = Some(next);
        }
        (Some(prev), Some(next)) => {
            nodes[prev.0].link_mut().next = Some(next);
            nodes[next.0].link_mut().prev = Some(prev);
        }
    }
    list.length -= 1;
    *nodes[node.0].link_mut() = Link::default();
}

pub struct Iter<'a, N> {
    nodes: &'a [N],
    cur: Option<NodeId>,
}

impl<N: Linked> Iterator for Iter<'_, N> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.cur?;
        self.cur = self.nodes[cur.0].link().next;
        Some(cur)
    }
}
