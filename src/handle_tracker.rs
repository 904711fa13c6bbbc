//! A bidirectional map between handles, with a target for each entry.
//!
//! Each entry pairs a handle with an "inverse" handle. For the replayer the
//! forward side is the trace handle and the inverse side the replay handle,
//! but the tracker itself doesn't care. Both directions are kept in step:
//! every valid forward entry has exactly one inverse entry pointing back at
//! it, and `check` verifies that.

use gleam::gl::{GLenum, GLuint};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::enums::{self, GlEnumTable};
use crate::error::DocError;
use crate::handle::Namespace;

/// A single mapping, as stored and serialized.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleDef {
    pub handle: GLuint,
    pub inv_handle: GLuint,
    pub target: GLenum,
}

#[derive(Clone, Debug)]
pub struct HandleTracker {
    namespace: Namespace,
    handles: BTreeMap<GLuint, HandleDef>,
    inv_handles: HashMap<GLuint, GLuint>,
}

impl HandleTracker {
    pub fn new(namespace: Namespace) -> HandleTracker {
        HandleTracker {
            namespace,
            handles: BTreeMap::new(),
            inv_handles: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn len(&self) -> usize {
        self.inv_handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inv_handles.is_empty()
    }

    pub fn clear(&mut self) {
        self.handles.clear();
        self.inv_handles.clear();
    }

    /// All valid forward handles, in increasing order.
    pub fn handles(&self) -> Vec<GLuint> {
        self.handles.keys().copied().collect()
    }

    /// The inverse handles of all valid entries, ordered by forward handle.
    pub fn inv_handles(&self) -> Vec<GLuint> {
        self.handles.values().map(|def| def.inv_handle).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HandleDef> {
        self.handles.values()
    }

    pub fn contains(&self, handle: GLuint) -> bool {
        self.handles.contains_key(&handle)
    }

    pub fn contains_inv(&self, inv_handle: GLuint) -> bool {
        self.inv_handles.contains_key(&inv_handle)
    }

    /// Add a mapping. Returns false, changing nothing, if either side is
    /// already mapped.
    pub fn insert(&mut self, handle: GLuint, inv_handle: GLuint, target: GLenum) -> bool {
        if self.contains(handle) || self.contains_inv(inv_handle) {
            return false;
        }

        self.handles.insert(handle, HandleDef { handle, inv_handle, target });
        self.inv_handles.insert(inv_handle, handle);
        true
    }

    /// If `handle` is mapped, change its target, keeping its inverse handle.
    /// Otherwise, insert a new mapping.
    pub fn update(&mut self, handle: GLuint, inv_handle: GLuint, target: GLenum) -> bool {
        match self.handles.get_mut(&handle) {
            Some(def) => {
                Self::change_target(self.namespace, def, target);
                true
            }
            None => self.insert(handle, inv_handle, target),
        }
    }

    /// Like `update`, but an existing entry's target only changes if it is
    /// currently `compare_target`.
    pub fn conditional_update(
        &mut self,
        handle: GLuint,
        inv_handle: GLuint,
        compare_target: GLenum,
        target: GLenum,
    ) -> bool {
        match self.handles.get_mut(&handle) {
            Some(def) => {
                if def.target == compare_target {
                    def.target = target;
                }
                true
            }
            None => self.insert(handle, inv_handle, target),
        }
    }

    /// `update`, keyed by the inverse handle.
    pub fn update_inv(&mut self, inv_handle: GLuint, handle: GLuint, target: GLenum) -> bool {
        match self.inv_handles.get(&inv_handle).copied() {
            Some(actual) => {
                if let Some(def) = self.handles.get_mut(&actual) {
                    Self::change_target(self.namespace, def, target);
                }
                true
            }
            None => self.insert(handle, inv_handle, target),
        }
    }

    fn change_target(namespace: Namespace, def: &mut HandleDef, target: GLenum) {
        if def.target != enums::NONE && def.target != target {
            let names = GlEnumTable::standard();
            tracing::debug!(
                "object target changing from {} to {}, handle {} inv handle {}, namespace {}",
                names.name(def.target, None),
                names.name(target, None),
                def.handle,
                def.inv_handle,
                namespace
            );
        }
        def.target = target;
    }

    pub fn set_target(&mut self, handle: GLuint, target: GLenum) -> bool {
        match self.handles.get_mut(&handle) {
            Some(def) => {
                def.target = target;
                true
            }
            None => false,
        }
    }

    pub fn set_target_inv(&mut self, inv_handle: GLuint, target: GLenum) -> bool {
        match self.inv_handles.get(&inv_handle).copied() {
            Some(handle) => self.set_target(handle, target),
            None => false,
        }
    }

    /// Return the inverse handle `handle` maps to.
    pub fn map_handle_to_inv_handle(&self, handle: GLuint) -> Option<GLuint> {
        self.handles.get(&handle).map(|def| def.inv_handle)
    }

    /// Return the handle that maps to `inv_handle`. An entry whose forward
    /// handle is 0 counts as unmapped.
    pub fn map_inv_handle_to_handle(&self, inv_handle: GLuint) -> Option<GLuint> {
        match self.inv_handles.get(&inv_handle) {
            Some(&handle) if handle != 0 => Some(handle),
            _ => None,
        }
    }

    pub fn get_target(&self, handle: GLuint) -> GLenum {
        self.handles.get(&handle).map_or(enums::NONE, |def| def.target)
    }

    pub fn get_target_inv(&self, inv_handle: GLuint) -> GLenum {
        self.map_inv_handle_to_handle(inv_handle)
            .map_or(enums::NONE, |handle| self.get_target(handle))
    }

    /// Remove `handle`'s mapping in both directions. The handle may be
    /// inserted again afterwards.
    pub fn erase(&mut self, handle: GLuint) -> bool {
        match self.handles.remove(&handle) {
            Some(def) => {
                self.inv_handles.remove(&def.inv_handle);
                true
            }
            None => false,
        }
    }

    pub fn erase_inv(&mut self, inv_handle: GLuint) -> bool {
        match self.inv_handles.remove(&inv_handle) {
            Some(handle) => {
                self.handles.remove(&handle);
                true
            }
            None => false,
        }
    }

    /// Return a tracker with the roles of the two sides swapped.
    pub fn invert(&self) -> HandleTracker {
        let mut inverted = HandleTracker::new(self.namespace);
        for def in self.handles.values() {
            // Can't fail: our own inverse side has no duplicates.
            inverted.insert(def.inv_handle, def.handle, def.target);
        }
        inverted
    }

    /// Verify that the forward and inverse tables agree.
    pub fn check(&self) -> bool {
        if self.handles.len() != self.inv_handles.len() {
            return false;
        }

        for (&handle, def) in &self.handles {
            if def.handle != handle {
                return false;
            }
            if self.inv_handles.get(&def.inv_handle) != Some(&handle) {
                return false;
            }
        }

        true
    }

    pub fn serialize(&self) -> Value {
        Value::Array(
            self.handles
                .values()
                .map(|def| serde_json::to_value(def).unwrap_or(Value::Null))
                .collect(),
        )
    }

    /// Replace our contents with the entries in `node`.
    pub fn deserialize(&mut self, node: &Value) -> Result<(), DocError> {
        self.clear();

        let defs: Vec<HandleDef> = serde_json::from_value(node.clone())?;
        for def in defs {
            if !self.insert(def.handle, def.inv_handle, def.target) {
                self.clear();
                return Err(DocError::Invalid(format!(
                    "{} handle tracker: conflicting entry for handle {} / inverse {}",
                    self.namespace, def.handle, def.inv_handle
                )));
            }
        }

        Ok(())
    }
}

impl PartialEq for HandleTracker {
    fn eq(&self, other: &HandleTracker) -> bool {
        self.handles == other.handles
    }
}

impl Eq for HandleTracker {}
