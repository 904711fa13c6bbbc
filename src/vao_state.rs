//! Vertex array object state.

use gleam::gl::{GLenum, GLint, GLsizei, GLuint};
use serde_json::{json, Value};
use std::any::Any;

use crate::blob_manager::BlobManager;
use crate::doc;
use crate::enums::{self, GlEnumTable};
use crate::error::{DocError, StateError};
use crate::gl_object::{GlContext, GlObjectState, GlObjectStateType, RestoreReport};
use crate::gl_utils::ScopedBindingState;
use crate::handle::{BufferHandle, VertexArrayHandle};
use crate::remapper::{HandleRemapper, RemapperExt};

/// One generic vertex attribute's array state.
///
/// `pointer` is a buffer offset when `array_binding` is non-zero, and a
/// client memory address otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexAttribDesc {
    pub pointer: u64,
    pub array_binding: GLuint,
    pub size: GLint,
    pub type_: GLenum,
    pub stride: GLsizei,
    pub integer: bool,
    pub divisor: GLuint,
    pub enabled: bool,
    pub normalized: bool,
}

impl Default for VertexAttribDesc {
    /// GL's initial attribute state.
    fn default() -> VertexAttribDesc {
        VertexAttribDesc {
            pointer: 0,
            array_binding: 0,
            size: 4,
            type_: enums::FLOAT,
            stride: 0,
            integer: false,
            divisor: 0,
            enabled: false,
            normalized: false,
        }
    }
}

impl VertexAttribDesc {
    fn query(cx: &GlContext, index: GLuint) -> VertexAttribDesc {
        let gl = cx.gl;
        let get = |pname| gl.get_vertex_attrib_iv(index, pname);
        VertexAttribDesc {
            array_binding: get(enums::VERTEX_ATTRIB_ARRAY_BUFFER_BINDING) as GLuint,
            enabled: get(enums::VERTEX_ATTRIB_ARRAY_ENABLED) != 0,
            size: get(enums::VERTEX_ATTRIB_ARRAY_SIZE),
            type_: get(enums::VERTEX_ATTRIB_ARRAY_TYPE) as GLenum,
            normalized: get(enums::VERTEX_ATTRIB_ARRAY_NORMALIZED) != 0,
            stride: get(enums::VERTEX_ATTRIB_ARRAY_STRIDE),
            integer: get(enums::VERTEX_ATTRIB_ARRAY_INTEGER) != 0,
            divisor: get(enums::VERTEX_ATTRIB_ARRAY_DIVISOR) as GLuint,
            pointer: gl.get_vertex_attrib_pointer_v(index, enums::VERTEX_ATTRIB_ARRAY_POINTER),
        }
    }

    fn serialize(&self, enums: &GlEnumTable) -> Value {
        json!({
            "pointer": self.pointer,
            "array_binding": self.array_binding,
            "size": self.size,
            "type": doc::enum_value(enums, self.type_),
            "stride": self.stride,
            "integer": self.integer,
            "divisor": self.divisor,
            "enabled": self.enabled,
            "normalized": self.normalized,
        })
    }

    fn deserialize(obj: &doc::Object, enums: &GlEnumTable) -> Result<VertexAttribDesc, DocError> {
        Ok(VertexAttribDesc {
            pointer: doc::get_u64(obj, "pointer")?,
            array_binding: doc::get_u32(obj, "array_binding")?,
            size: doc::get_i32(obj, "size")?,
            type_: doc::get_enum(obj, "type", enums)?,
            stride: doc::get_i32(obj, "stride")?,
            integer: doc::get_bool(obj, "integer")?,
            divisor: doc::get_u32(obj, "divisor")?,
            enabled: doc::get_bool(obj, "enabled")?,
            normalized: doc::get_bool(obj, "normalized")?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VaoState {
    snapshot_handle: GLuint,
    has_been_bound: bool,
    element_array_binding: GLuint,
    vertex_attribs: Vec<VertexAttribDesc>,
    is_valid: bool,
}

impl VaoState {
    pub fn new() -> VaoState {
        VaoState::default()
    }

    pub fn has_been_bound(&self) -> bool {
        self.has_been_bound
    }

    pub fn element_array_binding(&self) -> GLuint {
        self.element_array_binding
    }

    pub fn vertex_attribs(&self) -> &[VertexAttribDesc] {
        &self.vertex_attribs
    }

    fn restore_attribs(
        &self,
        cx: &GlContext,
        remapper: &dyn HandleRemapper,
        handle: GLuint,
        report: &mut RestoreReport,
    ) {
        let gl = cx.gl;
        let max_attribs = cx.info.max_vertex_attribs() as usize;

        gl.bind_buffer(
            enums::ELEMENT_ARRAY_BUFFER,
            remapper.remap(BufferHandle(self.element_array_binding)).0,
        );
        cx.check_error("glBindBuffer(GL_ELEMENT_ARRAY_BUFFER)");

        if self.vertex_attribs.len() > max_attribs {
            report.warn(format!(
                "vertex array {} has {} attributes, but the context only allows {}",
                self.snapshot_handle,
                self.vertex_attribs.len(),
                max_attribs
            ));
        }

        for (i, desc) in self.vertex_attribs.iter().enumerate().take(max_attribs) {
            let index = i as GLuint;
            gl.bind_buffer(enums::ARRAY_BUFFER, remapper.remap(BufferHandle(desc.array_binding)).0);
            cx.check_error("glBindBuffer(GL_ARRAY_BUFFER)");

            let mut pointer = desc.pointer;
            if desc.array_binding == 0 && pointer != 0 && cx.info.is_compatibility_profile() {
                pointer = remapper.remap_vertex_attrib_ptr(index, pointer);
            }

            if handle != 0 && desc.array_binding == 0 {
                // Drivers reject client-side arrays on a non-default vertex
                // array object.
                if pointer != 0 || desc.stride != 0 || desc.enabled {
                    report.warn(format!(
                        "can't set client-side array for attribute {} of vertex array: trace handle {}, replay handle {}, pointer 0x{:X}, size {}, stride {}, enabled {}",
                        index, self.snapshot_handle, handle, pointer, desc.size, desc.stride, desc.enabled
                    ));
                }
            } else if desc.integer {
                gl.vertex_attrib_i_pointer(index, desc.size, desc.type_, desc.stride, pointer);
                cx.check_error("glVertexAttribIPointer");
            } else {
                gl.vertex_attrib_pointer(index, desc.size, desc.type_, desc.normalized, desc.stride, pointer);
                cx.check_error("glVertexAttribPointer");
            }

            gl.vertex_attrib_divisor(index, desc.divisor);
            if desc.enabled {
                gl.enable_vertex_attrib_array(index);
            } else {
                gl.disable_vertex_attrib_array(index);
            }
            cx.check_error("vertex attribute array state");
        }
    }
}

impl GlObjectState for VaoState {
    fn object_type(&self) -> GlObjectStateType {
        GlObjectStateType::VertexArray
    }

    fn snapshot_handle(&self) -> GLuint {
        self.snapshot_handle
    }

    fn is_valid(&self) -> bool {
        self.is_valid
    }

    fn clear(&mut self) {
        *self = VaoState::default();
    }

    fn snapshot(
        &mut self,
        cx: &GlContext,
        _remapper: &mut dyn HandleRemapper,
        handle: GLuint,
        _target: GLenum,
    ) -> Result<(), StateError> {
        cx.check_error("before vertex array snapshot");
        self.clear();

        let gl = cx.gl;
        self.snapshot_handle = handle;
        self.has_been_bound = handle == 0 || gl.is_vertex_array(handle) != 0;

        if self.has_been_bound {
            let _saved = ScopedBindingState::new(gl, &[enums::VERTEX_ARRAY]);
            gl.bind_vertex_array(handle);
            if cx.check_error("glBindVertexArray") {
                self.clear();
                return Err(StateError::Query {
                    object: GlObjectStateType::VertexArray,
                    handle,
                    what: "binding the vertex array".to_string(),
                });
            }

            self.element_array_binding = gl.get_integer(enums::ELEMENT_ARRAY_BUFFER_BINDING) as GLuint;
            self.vertex_attribs = (0..cx.info.max_vertex_attribs())
                .map(|index| VertexAttribDesc::query(cx, index))
                .collect();
            cx.check_error("vertex attribute queries");
        }

        self.is_valid = true;
        Ok(())
    }

    fn restore(
        &self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        handle: &mut GLuint,
    ) -> Result<RestoreReport, StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::VertexArray));
        }
        cx.check_error("before vertex array restore");

        let gl = cx.gl;
        let _saved = ScopedBindingState::new(
            gl,
            &[enums::VERTEX_ARRAY, enums::ARRAY_BUFFER, enums::ELEMENT_ARRAY_BUFFER],
        );
        let mut report = RestoreReport::default();

        if self.snapshot_handle == 0 && *handle == 0 {
            gl.bind_vertex_array(0);
            cx.check_error("glBindVertexArray(0)");
        } else {
            if *handle == 0 {
                let new_handle = gl.gen_vertex_arrays(1).first().copied().unwrap_or(0);
                if cx.check_error("glGenVertexArrays") || new_handle == 0 {
                    return Err(StateError::CreateFailed {
                        object: GlObjectStateType::VertexArray,
                        trace: self.snapshot_handle,
                    });
                }
                remapper.declare(
                    VertexArrayHandle(self.snapshot_handle),
                    VertexArrayHandle(new_handle),
                    enums::NONE,
                );
                *handle = new_handle;
            }

            if self.has_been_bound {
                gl.bind_vertex_array(*handle);
                cx.check_error("glBindVertexArray");
            }
        }

        if self.has_been_bound {
            self.restore_attribs(cx, remapper, *handle, &mut report);
        }

        Ok(report)
    }

    fn remap_handles(&mut self, remapper: &dyn HandleRemapper) -> Result<(), StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::VertexArray));
        }
        self.snapshot_handle = remapper.remap(VertexArrayHandle(self.snapshot_handle)).0;
        self.element_array_binding = remapper.remap(BufferHandle(self.element_array_binding)).0;
        for (index, desc) in self.vertex_attribs.iter_mut().enumerate() {
            if desc.array_binding != 0 {
                desc.array_binding = remapper.remap(BufferHandle(desc.array_binding)).0;
            } else if desc.pointer != 0 {
                desc.pointer = remapper.remap_vertex_attrib_ptr(index as GLuint, desc.pointer);
            }
        }
        Ok(())
    }

    fn serialize(&self, enums: &GlEnumTable, _blobs: &mut dyn BlobManager) -> Result<Value, StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::VertexArray));
        }
        let attribs: Vec<Value> = self.vertex_attribs.iter().map(|desc| desc.serialize(enums)).collect();
        Ok(json!({
            "handle": self.snapshot_handle,
            "has_been_bound": self.has_been_bound,
            "element_array_binding": self.element_array_binding,
            "vertex_attribs": attribs,
        }))
    }

    fn deserialize(&mut self, node: &Value, enums: &GlEnumTable, _blobs: &dyn BlobManager) -> Result<(), DocError> {
        self.clear();
        let result: Result<_, DocError> = (|| {
            let obj = doc::as_object(node)?;
            let mut state = VaoState::new();
            state.snapshot_handle = doc::get_u32(obj, "handle")?;
            state.has_been_bound = doc::opt(obj, "has_been_bound", true, doc::get_bool)?;
            state.element_array_binding = doc::opt(obj, "element_array_binding", 0, doc::get_u32)?;

            for (i, attrib) in doc::get_array(obj, "vertex_attribs")?.iter().enumerate() {
                let attrib = doc::as_object(attrib)?;
                // Older documents kept the element array binding with the
                // first attribute.
                if i == 0 && attrib.contains_key("element_array_binding") {
                    state.element_array_binding = doc::get_u32(attrib, "element_array_binding")?;
                }
                state.vertex_attribs.push(VertexAttribDesc::deserialize(attrib, enums)?);
            }

            state.is_valid = true;
            Ok(state)
        })();

        *self = result?;
        Ok(())
    }

    fn compare_restorable_state(&self, other: &dyn GlObjectState) -> bool {
        if !self.is_valid || !other.is_valid() {
            return false;
        }
        match other.as_any().downcast_ref::<VaoState>() {
            Some(other) => {
                self.has_been_bound == other.has_been_bound
                    && self.element_array_binding == other.element_array_binding
                    && self.vertex_attribs == other.vertex_attribs
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
