//! The link-time snapshots of every linked program in a context.
//!
//! The tracer calls `add_link_snapshot` right after each successful
//! `glLinkProgram`, `glProgramBinary` or `glCreateShaderProgramv`, before the
//! attached shaders can change. Snapshotting a program later pairs its
//! current state with the entry kept here.

use gleam::gl::GLuint;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::blob_manager::BlobManager;
use crate::enums::GlEnumTable;
use crate::error::{DocError, StateError};
use crate::gl_object::{GlContext, GlObjectState};
use crate::handle::ProgramHandle;
use crate::program_state::{LinkSource, ProgramState};
use crate::remapper::{HandleRemapper, RemapperExt};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkedProgramStates {
    programs: BTreeMap<GLuint, ProgramState>,
}

impl LinkedProgramStates {
    pub fn new() -> LinkedProgramStates {
        LinkedProgramStates::default()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn clear(&mut self) {
        self.programs.clear();
    }

    /// Store `state` as `handle`'s link-time snapshot, replacing any earlier
    /// one.
    pub fn add_snapshot(&mut self, handle: GLuint, state: ProgramState) {
        self.programs.insert(handle, state);
    }

    /// Snapshot `handle`'s link as it happened just now. On failure no
    /// entry is left for `handle`, not even an earlier one.
    pub fn add_link_snapshot(
        &mut self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        handle: GLuint,
        source: LinkSource,
    ) -> Result<(), StateError> {
        let mut state = ProgramState::new();
        match state.link_snapshot(cx, remapper, handle, source) {
            Ok(()) => {
                self.programs.insert(handle, state);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("failed to snapshot the link of program {}: {}", handle, err);
                self.programs.remove(&handle);
                Err(err)
            }
        }
    }

    /// Returns whether there was a snapshot to remove.
    pub fn remove_snapshot(&mut self, handle: GLuint) -> bool {
        self.programs.remove(&handle).is_some()
    }

    pub fn find_snapshot(&self, handle: GLuint) -> Option<&ProgramState> {
        self.programs.get(&handle)
    }

    pub fn find_snapshot_mut(&mut self, handle: GLuint) -> Option<&mut ProgramState> {
        self.programs.get_mut(&handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (GLuint, &ProgramState)> {
        self.programs.iter().map(|(&handle, state)| (handle, state))
    }

    /// Rewrite every snapshot, and the handles they are keyed by. Nothing
    /// changes unless every snapshot remaps cleanly.
    pub fn remap_handles(&mut self, remapper: &dyn HandleRemapper) -> Result<(), StateError> {
        let mut remapped = BTreeMap::new();
        for (&handle, state) in &self.programs {
            let new_handle = remapper.remap(ProgramHandle(handle)).0;
            let mut state = state.clone();
            state.remap_handles(remapper)?;
            debug_assert_eq!(new_handle, state.snapshot_handle());
            if remapped.insert(new_handle, state).is_some() {
                return Err(StateError::Doc(DocError::Invalid(format!(
                    "linked programs: two programs remap to handle {}",
                    new_handle
                ))));
            }
        }
        self.programs = remapped;
        Ok(())
    }

    /// An array of program records, in handle order.
    pub fn serialize(&self, enums: &GlEnumTable, blobs: &mut dyn BlobManager) -> Result<Value, StateError> {
        let programs = self
            .programs
            .values()
            .map(|state| state.serialize(enums, blobs))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(programs))
    }

    pub fn deserialize(&mut self, node: &Value, enums: &GlEnumTable, blobs: &dyn BlobManager) -> Result<(), DocError> {
        self.clear();
        let result = self.deserialize_inner(node, enums, blobs);
        if result.is_err() {
            self.clear();
        }
        result
    }

    fn deserialize_inner(&mut self, node: &Value, enums: &GlEnumTable, blobs: &dyn BlobManager) -> Result<(), DocError> {
        let nodes = node.as_array().ok_or(DocError::NotA { expected: "array" })?;
        for node in nodes {
            let mut state = ProgramState::new();
            state.deserialize(node, enums, blobs)?;
            let handle = state.snapshot_handle();
            if self.programs.insert(handle, state).is_some() {
                return Err(DocError::Invalid(format!(
                    "linked programs: more than one snapshot for program {}",
                    handle
                )));
            }
        }
        Ok(())
    }
}
