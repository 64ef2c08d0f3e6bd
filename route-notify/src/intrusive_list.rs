//! Arena-backed intrusive doubly-linked list.
//!
//! Payloads live in an [`Arena`] and carry their own [`Link`]; a [`ListHead`] only records
//! the first/last handles. Linking and unlinking never move or drop a payload, so the same
//! payload type can be threaded through a list while its storage is owned elsewhere.

use std::collections::TryReserveError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable handle into an [`Arena`].
///
/// The generation is bumped every time a slot is vacated, so a handle kept past removal
/// resolves to nothing instead of to whatever reused the slot.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32 },
}

impl<T> Slot<T> {
    fn generation(&self) -> u32 {
        match self {
            Slot::Occupied { generation, .. } | Slot::Vacant { generation } => *generation,
        }
    }
}

/// Generational slot storage owning the linked payloads.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value`, reusing a vacated slot when one is available.
    pub fn try_insert(&mut self, value: T) -> Result<NodeId, TryReserveError> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let generation = slot.generation();
            *slot = Slot::Occupied { generation, value };
            self.len += 1;
            return Ok(NodeId { index, generation });
        }

        self.slots.try_reserve(1)?;
        // Keep room for every slot on the free list so `remove` never allocates.
        let wanted = self.slots.len() + 1;
        self.free.try_reserve(wanted.saturating_sub(self.free.len()))?;

        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied {
            generation: 0,
            value,
        });
        self.len += 1;
        Ok(NodeId {
            index,
            generation: 0,
        })
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        match self.slots.get(id.index as usize) {
            Some(Slot::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match self.slots.get_mut(id.index as usize) {
            Some(Slot::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Takes the payload out of its slot. The caller unlinks it first.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if !matches!(slot, Slot::Occupied { generation, .. } if *generation == id.generation) {
            return None;
        }

        let vacated = Slot::Vacant {
            generation: id.generation.wrapping_add(1),
        };
        match std::mem::replace(slot, vacated) {
            Slot::Occupied { value, .. } => {
                self.free.push(id.index);
                self.len -= 1;
                Some(value)
            }
            Slot::Vacant { .. } => None,
        }
    }

    /// Drops every payload. Outstanding handles all go stale.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let generation = slot.generation().wrapping_add(1);
            *slot = Slot::Vacant { generation };
            self.free.push(index as u32);
        }
        self.len = 0;
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of one [`ListHead`], recorded in the links of its members.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ListId(u64);

impl ListId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ListId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Neighbour handles embedded in a linked payload, plus the list they belong to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Link {
    owner: Option<ListId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl Link {
    /// Resets the link to empty. Only meaningful for a payload no list holds.
    pub fn init(&mut self) {
        *self = Link::default();
    }

    pub fn is_linked(&self) -> bool {
        self.owner.is_some()
    }

    pub fn owner(&self) -> Option<ListId> {
        self.owner
    }
}

/// Implemented by payloads that embed a [`Link`].
pub trait Linked {
    fn link(&self) -> &Link;
    fn link_mut(&mut self) -> &mut Link;
}

/// Head of one intrusive list. Holds no payloads.
///
/// Every head carries a fresh [`ListId`]; a node is a member exactly when its link names
/// that id, so handing a list a node it does not own is refused instead of corrupting
/// either list.
#[derive(Debug)]
pub struct ListHead {
    id: ListId,
    first: Option<NodeId>,
    last: Option<NodeId>,
    len: usize,
}

impl Default for ListHead {
    fn default() -> Self {
        Self {
            id: ListId::next(),
            first: None,
            last: None,
            len: 0,
        }
    }
}

impl ListHead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> ListId {
        self.id
    }

    /// Forgets every member without touching their links. The head takes a new id, so
    /// the forgotten members are no longer recognised as its own.
    pub fn init(&mut self) {
        *self = ListHead::default();
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn first(&self) -> Option<NodeId> {
        self.first
    }

    pub fn last(&self) -> Option<NodeId> {
        self.last
    }

    pub fn contains<T: Linked>(&self, arena: &Arena<T>, node: NodeId) -> bool {
        arena
            .get(node)
            .is_some_and(|payload| payload.link().owner == Some(self.id))
    }

    fn is_free<T: Linked>(arena: &Arena<T>, node: NodeId) -> bool {
        arena
            .get(node)
            .is_some_and(|payload| !payload.link().is_linked())
    }

    pub fn push_back<T: Linked>(&mut self, arena: &mut Arena<T>, node: NodeId) -> bool {
        match self.last {
            Some(last) => self.insert_after(arena, last, node),
            None => self.link_sole(arena, node),
        }
    }

    pub fn push_front<T: Linked>(&mut self, arena: &mut Arena<T>, node: NodeId) -> bool {
        match self.first {
            Some(first) => self.insert_before(arena, first, node),
            None => self.link_sole(arena, node),
        }
    }

    fn link_sole<T: Linked>(&mut self, arena: &mut Arena<T>, node: NodeId) -> bool {
        if !Self::is_free(arena, node) {
            return false;
        }
        let Some(payload) = arena.get_mut(node) else {
            return false;
        };
        *payload.link_mut() = Link {
            owner: Some(self.id),
            prev: None,
            next: None,
        };
        self.first = Some(node);
        self.last = Some(node);
        self.len = 1;
        true
    }

    /// Splices `node` directly after `anchor`.
    ///
    /// Refused unless `anchor` is a member of this list and `node` is not linked into
    /// any list.
    pub fn insert_after<T: Linked>(
        &mut self,
        arena: &mut Arena<T>,
        anchor: NodeId,
        node: NodeId,
    ) -> bool {
        if !self.contains(arena, anchor) || !Self::is_free(arena, node) {
            return false;
        }
        let Some(len) = self.len.checked_add(1) else {
            return false;
        };
        let Some(anchor_payload) = arena.get_mut(anchor) else {
            return false;
        };
        let next = anchor_payload.link().next;
        anchor_payload.link_mut().next = Some(node);

        if let Some(payload) = arena.get_mut(node) {
            *payload.link_mut() = Link {
                owner: Some(self.id),
                prev: Some(anchor),
                next,
            };
        }

        match next.and_then(|next| arena.get_mut(next)) {
            Some(next_payload) => next_payload.link_mut().prev = Some(node),
            None => self.last = Some(node),
        }
        self.len = len;
        true
    }

    /// Splices `node` directly before `anchor`, under the same membership rules as
    /// [`ListHead::insert_after`].
    pub fn insert_before<T: Linked>(
        &mut self,
        arena: &mut Arena<T>,
        anchor: NodeId,
        node: NodeId,
    ) -> bool {
        if !self.contains(arena, anchor) || !Self::is_free(arena, node) {
            return false;
        }
        let Some(len) = self.len.checked_add(1) else {
            return false;
        };
        let Some(anchor_payload) = arena.get_mut(anchor) else {
            return false;
        };
        let prev = anchor_payload.link().prev;
        anchor_payload.link_mut().prev = Some(node);

        if let Some(payload) = arena.get_mut(node) {
            *payload.link_mut() = Link {
                owner: Some(self.id),
                prev,
                next: Some(anchor),
            };
        }

        match prev.and_then(|prev| arena.get_mut(prev)) {
            Some(prev_payload) => prev_payload.link_mut().next = Some(node),
            None => self.first = Some(node),
        }
        self.len = len;
        true
    }

    /// Detaches `node` using its own neighbour handles. The payload stays in the arena.
    ///
    /// Returns `false`, touching nothing, when `node` is not a member of this list.
    pub fn unlink<T: Linked>(&mut self, arena: &mut Arena<T>, node: NodeId) -> bool {
        if !self.contains(arena, node) {
            return false;
        }
        let Some(len) = self.len.checked_sub(1) else {
            return false;
        };
        let Some(payload) = arena.get(node) else {
            return false;
        };
        let Link { prev, next, .. } = *payload.link();

        match prev.and_then(|prev| arena.get_mut(prev)) {
            Some(prev_payload) => prev_payload.link_mut().next = next,
            None => self.first = next,
        }
        match next.and_then(|next| arena.get_mut(next)) {
            Some(next_payload) => next_payload.link_mut().prev = prev,
            None => self.last = prev,
        }
        if let Some(payload) = arena.get_mut(node) {
            payload.link_mut().init();
        }
        self.len = len;
        true
    }

    pub fn next_of<T: Linked>(arena: &Arena<T>, node: NodeId) -> Option<NodeId> {
        arena.get(node).and_then(|payload| payload.link().next)
    }

    pub fn prev_of<T: Linked>(arena: &Arena<T>, node: NodeId) -> Option<NodeId> {
        arena.get(node).and_then(|payload| payload.link().prev)
    }

    pub fn iter<'a, T: Linked>(&self, arena: &'a Arena<T>) -> Iter<'a, T> {
        Iter {
            arena,
            cursor: self.first,
            remaining: self.len,
            direction: Direction::Forward,
        }
    }

    pub fn iter_rev<'a, T: Linked>(&self, arena: &'a Arena<T>) -> Iter<'a, T> {
        Iter {
            arena,
            cursor: self.last,
            remaining: self.len,
            direction: Direction::Backward,
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Lazy walk over list members, yielding each handle with its payload.
pub struct Iter<'a, T> {
    arena: &'a Arena<T>,
    cursor: Option<NodeId>,
    remaining: usize,
    direction: Direction,
}

impl<'a, T: Linked> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        // `remaining` bounds the walk even if a link were ever corrupted into a cycle.
        if self.remaining == 0 {
            return None;
        }
        let id = self.cursor?;
        let payload = self.arena.get(id)?;
        self.cursor = match self.direction {
            Direction::Forward => payload.link().next,
            Direction::Backward => payload.link().prev,
        };
        self.remaining -= 1;
        Some((id, payload))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
