//! Translating handles between the trace and the replay context.
//!
//! Every state object consults a `HandleRemapper` whenever it writes or
//! reads a handle embedded in its state. `IdentityRemapper` is used when
//! snapshotting a context in place. `ReplayRemapper` owns the trace-to-replay
//! tables for the life of a replay, and `ReplayRemapper::reverse` gives a
//! view that maps replay handles back to trace handles, for snapshotting a
//! replay context in trace terms.

use gleam::gl::{GLenum, GLint, GLuint};
use std::collections::{BTreeMap, HashMap};

use crate::enums;
use crate::gl_api::GlApi;
use crate::gl_utils::delete_gl_object;
use crate::handle::{Namespace, ObjectHandle};
use crate::handle_tracker::HandleTracker;

/// Maps handles from a "source" context (usually the trace) to a
/// "destination" context (usually the replay).
///
/// The default methods implement the identity mapping, which is what the
/// trace side wants.
pub trait HandleRemapper {
    fn is_default_remapper(&self) -> bool {
        true
    }

    /// Return the destination handle for `handle`. Unknown handles pass
    /// through unchanged, and 0 always maps to 0.
    fn remap_handle(&self, namespace: Namespace, handle: GLuint) -> GLuint {
        let _ = namespace;
        handle
    }

    /// True if `handle` is a source handle this remapper knows about.
    fn is_valid_handle(&self, namespace: Namespace, handle: GLuint) -> bool {
        let _ = namespace;
        handle != 0
    }

    /// Map a uniform location in source program `program`.
    fn remap_location(&self, program: GLuint, location: GLint) -> GLint {
        let _ = program;
        location
    }

    /// Map a client-side vertex attribute pointer.
    fn remap_vertex_attrib_ptr(&self, index: GLuint, ptr: u64) -> u64 {
        let _ = index;
        ptr
    }

    /// Map a legacy client-side array pointer: `array` is the array's
    /// enable cap, such as `GL_VERTEX_ARRAY`.
    fn remap_vertex_array_ptr(&self, array: GLenum, index: GLuint, ptr: u64) -> u64 {
        let _ = (array, index);
        ptr
    }

    /// Record that source handle `from` now corresponds to `to`.
    fn declare_handle(&mut self, namespace: Namespace, from: GLuint, to: GLuint, target: GLenum) {
        let _ = (namespace, from, to, target);
    }

    /// Destroy the destination object `to`, and forget the mapping from `from`.
    fn delete_handle_and_object(&mut self, gl: &dyn GlApi, namespace: Namespace, from: GLuint, to: GLuint) {
        let _ = from;
        delete_gl_object(gl, namespace, to);
    }

    fn declare_location(&mut self, from_program: GLuint, to_program: GLuint, from: GLint, to: GLint) {
        let _ = (from_program, to_program, from, to);
    }

    /// The target a source object was last bound to, if known.
    fn determine_from_object_target(&self, namespace: Namespace, from: GLuint) -> Option<GLenum> {
        let _ = (namespace, from);
        None
    }

    /// The target a destination object was last bound to, if known.
    fn determine_to_object_target(&self, namespace: Namespace, to: GLuint) -> Option<GLenum> {
        let _ = (namespace, to);
        None
    }
}

/// Handle-typed conveniences over any `HandleRemapper`.
pub trait RemapperExt: HandleRemapper {
    fn remap<H: ObjectHandle>(&self, handle: H) -> H {
        H::from_raw(self.remap_handle(H::NAMESPACE, handle.raw()))
    }

    fn declare<H: ObjectHandle>(&mut self, from: H, to: H, target: GLenum) {
        self.declare_handle(H::NAMESPACE, from.raw(), to.raw(), target)
    }

    fn delete<H: ObjectHandle>(&mut self, gl: &dyn GlApi, from: H, to: H) {
        self.delete_handle_and_object(gl, H::NAMESPACE, from.raw(), to.raw())
    }
}

impl<R: HandleRemapper + ?Sized> RemapperExt for R {}

/// The remapper to use when no translation is needed.
#[derive(Copy, Clone, Debug, Default)]
pub struct IdentityRemapper;

impl HandleRemapper for IdentityRemapper {}

/// Uniform location translations for one trace program.
#[derive(Clone, Debug, Default)]
struct ProgramLocations {
    replay_program: GLuint,
    locations: HashMap<GLint, GLint>,
}

/// Trace-to-replay handle tables: one `HandleTracker` per namespace, whose
/// forward side holds trace handles and inverse side replay handles.
#[derive(Debug)]
pub struct ReplayRemapper {
    trackers: BTreeMap<Namespace, HandleTracker>,
    locations: HashMap<GLuint, ProgramLocations>,
    attrib_ptrs: HashMap<(GLuint, u64), u64>,
    array_ptrs: HashMap<(GLenum, GLuint, u64), u64>,
}

impl Default for ReplayRemapper {
    fn default() -> Self {
        ReplayRemapper::new()
    }
}

impl ReplayRemapper {
    pub fn new() -> ReplayRemapper {
        ReplayRemapper {
            trackers: Namespace::ALL
                .iter()
                .map(|&ns| (ns, HandleTracker::new(ns)))
                .collect(),
            locations: HashMap::new(),
            attrib_ptrs: HashMap::new(),
            array_ptrs: HashMap::new(),
        }
    }

    pub fn tracker(&self, namespace: Namespace) -> &HandleTracker {
        // `new` populates every namespace.
        &self.trackers[&namespace]
    }

    fn tracker_mut(&mut self, namespace: Namespace) -> &mut HandleTracker {
        self.trackers
            .entry(namespace)
            .or_insert_with(|| HandleTracker::new(namespace))
    }

    /// Record that client-side attribute pointer `trace_ptr` for attribute
    /// `index` lives at `replay_ptr` in this process.
    pub fn declare_vertex_attrib_ptr(&mut self, index: GLuint, trace_ptr: u64, replay_ptr: u64) {
        self.attrib_ptrs.insert((index, trace_ptr), replay_ptr);
    }

    pub fn declare_vertex_array_ptr(&mut self, array: GLenum, index: GLuint, trace_ptr: u64, replay_ptr: u64) {
        self.array_ptrs.insert((array, index, trace_ptr), replay_ptr);
    }

    /// The number of live mappings for `namespace`.
    pub fn len(&self, namespace: Namespace) -> usize {
        self.tracker(namespace).len()
    }

    /// A view of these tables mapping replay handles back to trace handles.
    pub fn reverse(&self) -> ReverseRemapper<'_> {
        ReverseRemapper { tables: self }
    }

    pub fn clear(&mut self) {
        for tracker in self.trackers.values_mut() {
            tracker.clear();
        }
        self.locations.clear();
        self.attrib_ptrs.clear();
        self.array_ptrs.clear();
    }
}

impl HandleRemapper for ReplayRemapper {
    fn is_default_remapper(&self) -> bool {
        false
    }

    fn remap_handle(&self, namespace: Namespace, handle: GLuint) -> GLuint {
        if handle == 0 {
            return 0;
        }
        self.tracker(namespace)
            .map_handle_to_inv_handle(handle)
            .unwrap_or(handle)
    }

    fn is_valid_handle(&self, namespace: Namespace, handle: GLuint) -> bool {
        handle != 0 && self.tracker(namespace).contains(handle)
    }

    fn remap_location(&self, program: GLuint, location: GLint) -> GLint {
        self.locations
            .get(&program)
            .and_then(|p| p.locations.get(&location))
            .copied()
            .unwrap_or(location)
    }

    fn remap_vertex_attrib_ptr(&self, index: GLuint, ptr: u64) -> u64 {
        self.attrib_ptrs.get(&(index, ptr)).copied().unwrap_or(ptr)
    }

    fn remap_vertex_array_ptr(&self, array: GLenum, index: GLuint, ptr: u64) -> u64 {
        self.array_ptrs.get(&(array, index, ptr)).copied().unwrap_or(ptr)
    }

    fn declare_handle(&mut self, namespace: Namespace, from: GLuint, to: GLuint, target: GLenum) {
        if from == 0 {
            return;
        }

        let tracker = self.tracker_mut(namespace);

        // A trace handle never has more than one live replay handle; a new
        // declaration replaces the old one.
        if let Some(old) = tracker.map_handle_to_inv_handle(from) {
            if old != to {
                tracing::debug!("{} trace handle {}: replay handle {} replaced by {}", namespace, from, old, to);
            }
            tracker.erase(from);
        }
        if let Some(stale) = tracker.map_inv_handle_to_handle(to) {
            tracing::debug!("{} replay handle {} was still mapped from trace handle {}", namespace, to, stale);
        }
        tracker.erase_inv(to);

        tracker.insert(from, to, target);
    }

    fn delete_handle_and_object(&mut self, gl: &dyn GlApi, namespace: Namespace, from: GLuint, to: GLuint) {
        delete_gl_object(gl, namespace, to);

        let tracker = self.tracker_mut(namespace);
        if !tracker.erase(from) {
            tracker.erase_inv(to);
        }

        if namespace == Namespace::Programs {
            self.locations.remove(&from);
        }
    }

    fn declare_location(&mut self, from_program: GLuint, to_program: GLuint, from: GLint, to: GLint) {
        let entry = self.locations.entry(from_program).or_default();
        entry.replay_program = to_program;
        entry.locations.insert(from, to);
    }

    fn determine_from_object_target(&self, namespace: Namespace, from: GLuint) -> Option<GLenum> {
        match self.tracker(namespace).get_target(from) {
            enums::NONE => None,
            target => Some(target),
        }
    }

    fn determine_to_object_target(&self, namespace: Namespace, to: GLuint) -> Option<GLenum> {
        match self.tracker(namespace).get_target_inv(to) {
            enums::NONE => None,
            target => Some(target),
        }
    }
}

/// Replay-to-trace mapping over a `ReplayRemapper`'s tables. It only reads;
/// declarations made through it are ignored.
#[derive(Copy, Clone, Debug)]
pub struct ReverseRemapper<'a> {
    tables: &'a ReplayRemapper,
}

impl<'a> HandleRemapper for ReverseRemapper<'a> {
    fn is_default_remapper(&self) -> bool {
        false
    }

    fn remap_handle(&self, namespace: Namespace, handle: GLuint) -> GLuint {
        if handle == 0 {
            return 0;
        }
        self.tables
            .tracker(namespace)
            .map_inv_handle_to_handle(handle)
            .unwrap_or(handle)
    }

    fn is_valid_handle(&self, namespace: Namespace, handle: GLuint) -> bool {
        handle != 0 && self.tables.tracker(namespace).contains_inv(handle)
    }

    fn remap_location(&self, program: GLuint, location: GLint) -> GLint {
        self.tables
            .locations
            .values()
            .filter(|p| p.replay_program == program)
            .flat_map(|p| p.locations.iter())
            .find(|&(_, &to)| to == location)
            .map_or(location, |(&from, _)| from)
    }

    fn remap_vertex_attrib_ptr(&self, index: GLuint, ptr: u64) -> u64 {
        self.tables
            .attrib_ptrs
            .iter()
            .find(|&(&(i, _), &replay)| i == index && replay == ptr)
            .map_or(ptr, |(&(_, trace), _)| trace)
    }

    fn remap_vertex_array_ptr(&self, array: GLenum, index: GLuint, ptr: u64) -> u64 {
        self.tables
            .array_ptrs
            .iter()
            .find(|&(&(a, i, _), &replay)| a == array && i == index && replay == ptr)
            .map_or(ptr, |(&(_, _, trace), _)| trace)
    }

    fn delete_handle_and_object(&mut self, gl: &dyn GlApi, namespace: Namespace, from: GLuint, to: GLuint) {
        let _ = from;
        delete_gl_object(gl, namespace, to);
    }

    fn determine_from_object_target(&self, namespace: Namespace, from: GLuint) -> Option<GLenum> {
        self.tables.determine_to_object_target(namespace, from)
    }

    fn determine_to_object_target(&self, namespace: Namespace, to: GLuint) -> Option<GLenum> {
        self.tables.determine_from_object_target(namespace, to)
    }
}
