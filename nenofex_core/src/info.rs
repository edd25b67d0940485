use index_vec::IndexVec;

use crate::node::NodeId;
use crate::variable::Assignment;

index_vec::define_index_type! {
    pub struct HandleId = usize;
    MAX_INDEX = usize::MAX;
    DISABLE_MAX_INDEX_CHECK = cfg!(not(debug_assertions));
}

/// A tombstonable proxy for a graph node. Fault and occurrence queues
/// reference handles rather than raw `NodeId`s, so a subtree deletion
/// only has to flip `deleted` on every handle under it instead of
/// chasing down every queue that might mention the node.
#[derive(Debug, Clone, Copy)]
pub struct FaultHandle {
    pub node: NodeId,
    pub deleted: bool,
    pub skip: bool,
}

impl FaultHandle {
    pub fn is_usable(&self) -> bool {
        !self.deleted && !self.skip
    }
}

/// Per-pass, per-node fault-table record. One `NodeInfo` is held by every
/// node participating in the current changed_subformula.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub assignment: Assignment,
    pub justified: bool,
    pub on_path: bool,
    pub collected: bool,
    pub unassigned_children: u32,
    /// Index into the restricted watcher list (if any) or into the
    /// node's native child list otherwise.
    pub watcher: Option<usize>,
    /// Present only when not every child of this node participates in
    /// the pass; holds handles to the participating children only.
    pub restricted: Option<Vec<HandleId>>,
    pub needs_cleanup: bool,
    pub handle: HandleId,
}

impl NodeInfo {
    pub fn new(handle: HandleId, unassigned_children: u32, restricted: Option<Vec<HandleId>>) -> Self {
        NodeInfo {
            assignment: Assignment::Undefined,
            justified: false,
            on_path: false,
            collected: false,
            unassigned_children,
            watcher: if unassigned_children > 0 { Some(0) } else { None },
            restricted,
            needs_cleanup: false,
            handle,
        }
    }

    pub fn reset_transient(&mut self) {
        self.assignment = Assignment::Undefined;
        self.justified = false;
        self.on_path = false;
        self.collected = false;
    }
}

/// The preallocated fault-information table for one pass. Sized to
/// `1.5x` the region's node count so global-flow rewrites that add nodes
/// mid-pass have slack; initialisation and rewriting both consult
/// `try_reserve` and report arena exhaustion rather than growing without
/// bound.
pub struct PassArena {
    capacity: usize,
    info: IndexVec<NodeId, Option<NodeInfo>>,
    handles: IndexVec<HandleId, FaultHandle>,
}

impl PassArena {
    pub fn with_capacity(region_node_count: usize) -> Self {
        let capacity = (region_node_count * 3) / 2 + 1;
        PassArena {
            capacity,
            info: IndexVec::new(),
            handles: IndexVec::new(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.handles.len() >= self.capacity
    }

    /// Allocates a `FaultHandle` plus an empty `NodeInfo` slot for
    /// `node`. Returns `None` on arena exhaustion; the caller must abort
    /// the pass cleanly in that case.
    pub fn try_alloc(
        &mut self,
        node: NodeId,
        unassigned_children: u32,
        restricted: Option<Vec<HandleId>>,
    ) -> Option<HandleId> {
        if self.is_exhausted() {
            return None;
        }
        let handle_id = self.handles.push(FaultHandle {
            node,
            deleted: false,
            skip: false,
        });
        let info = NodeInfo::new(handle_id, unassigned_children, restricted);
        while self.info.len() <= node.index() {
            self.info.push(None);
        }
        self.info[node] = Some(info);
        Some(handle_id)
    }

    pub fn handle(&self, id: HandleId) -> &FaultHandle {
        &self.handles[id]
    }

    pub fn handle_mut(&mut self, id: HandleId) -> &mut FaultHandle {
        &mut self.handles[id]
    }

    pub fn mark_deleted(&mut self, id: HandleId) {
        self.handles[id].deleted = true;
    }

    pub fn info(&self, node: NodeId) -> Option<&NodeInfo> {
        self.info.get(node).and_then(|slot| slot.as_ref())
    }

    pub fn info_mut(&mut self, node: NodeId) -> Option<&mut NodeInfo> {
        self.info.get_mut(node).and_then(|slot| slot.as_mut())
    }

    pub fn has_info(&self, node: NodeId) -> bool {
        self.info(node).is_some()
    }

    pub fn handle_of(&self, node: NodeId) -> Option<HandleId> {
        self.info(node).map(|i| i.handle)
    }

    pub fn release(&mut self, node: NodeId) {
        if let Some(slot) = self.info.get_mut(node) {
            *slot = None;
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
