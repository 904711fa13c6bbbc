//! Shader object state.

use gleam::gl::{GLenum, GLuint};
use serde_json::{json, Value};
use std::any::Any;

use crate::blob_manager::BlobManager;
use crate::doc;
use crate::enums::{self, GlEnumTable};
use crate::error::{DocError, StateError};
use crate::gl_object::{GlContext, GlObjectState, GlObjectStateType, RestoreReport};
use crate::handle::ShaderHandle;
use crate::remapper::{HandleRemapper, RemapperExt};

const SHADER_TYPES: &[GLenum] = &[
    enums::VERTEX_SHADER,
    enums::COMPUTE_SHADER,
    enums::TESS_CONTROL_SHADER,
    enums::TESS_EVALUATION_SHADER,
    enums::GEOMETRY_SHADER,
    enums::FRAGMENT_SHADER,
];

/// The blob id prefix for a shader's source.
fn source_blob_prefix(shader_type: GLenum) -> &'static str {
    match shader_type {
        enums::VERTEX_SHADER => "vertex_shader",
        enums::COMPUTE_SHADER => "compute_shader",
        enums::TESS_CONTROL_SHADER => "tess_control_shader",
        enums::TESS_EVALUATION_SHADER => "tess_eval_shader",
        enums::GEOMETRY_SHADER => "geom_shader",
        enums::FRAGMENT_SHADER => "fragment_shader",
        _ => "shader",
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderState {
    snapshot_handle: GLuint,
    shader_type: GLenum,
    info_log: String,
    source: String,
    marked_for_deletion: bool,
    compile_status: bool,
    is_valid: bool,
}

impl ShaderState {
    pub fn new() -> ShaderState {
        ShaderState::default()
    }

    /// Build a valid record directly, as a program's link-time snapshot
    /// does for the shaders it was linked from.
    pub fn from_source(snapshot_handle: GLuint, shader_type: GLenum, source: &str, compile_status: bool) -> ShaderState {
        ShaderState {
            snapshot_handle,
            shader_type,
            info_log: String::new(),
            source: source.to_string(),
            marked_for_deletion: false,
            compile_status,
            is_valid: true,
        }
    }

    pub fn shader_type(&self) -> GLenum {
        self.shader_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: &str) {
        self.source = source.to_string();
    }

    pub fn info_log(&self) -> &str {
        &self.info_log
    }

    pub fn compile_status(&self) -> bool {
        self.compile_status
    }

    pub fn marked_for_deletion(&self) -> bool {
        self.marked_for_deletion
    }

    pub fn set_snapshot_handle(&mut self, handle: GLuint) {
        self.snapshot_handle = handle;
    }

    fn query_error(&self, what: &str) -> StateError {
        StateError::Query {
            object: GlObjectStateType::Shader,
            handle: self.snapshot_handle,
            what: what.to_string(),
        }
    }

    fn snapshot_inner(&mut self, cx: &GlContext, handle: GLuint) -> Result<(), StateError> {
        let gl = cx.gl;
        self.snapshot_handle = handle;

        self.shader_type = gl.get_shader_iv(handle, enums::SHADER_TYPE) as GLenum;
        if cx.check_error("glGetShaderiv(GL_SHADER_TYPE)") {
            return Err(self.query_error("GL_SHADER_TYPE"));
        }

        self.marked_for_deletion = gl.get_shader_iv(handle, enums::DELETE_STATUS) != 0;
        self.compile_status = gl.get_shader_iv(handle, enums::COMPILE_STATUS) != 0;
        self.info_log = gl.get_shader_info_log(handle);
        self.source = gl.get_shader_source(handle);
        if cx.check_error("shader queries") {
            return Err(self.query_error("shader status, info log or source"));
        }

        self.is_valid = true;
        Ok(())
    }

    /// Set the source and compile. Returns the replay compile status and
    /// info log.
    fn compile(&self, cx: &GlContext, handle: GLuint) -> Result<(bool, String), StateError> {
        let gl = cx.gl;
        let gl_error = |what: &str| StateError::Gl {
            object: GlObjectStateType::Shader,
            handle: self.snapshot_handle,
            what: what.to_string(),
        };

        gl.shader_source(handle, &self.source);
        if cx.check_error("glShaderSource") {
            return Err(gl_error("glShaderSource"));
        }

        gl.compile_shader(handle);
        if cx.check_error("glCompileShader") {
            return Err(gl_error("glCompileShader"));
        }

        // Ask right away; some drivers lose the status otherwise.
        let compiled = gl.get_shader_iv(handle, enums::COMPILE_STATUS) != 0;
        let info_log = if compiled {
            String::new()
        } else {
            gl.get_shader_info_log(handle)
        };
        cx.check_error("glGetShaderiv(GL_COMPILE_STATUS)");
        Ok((compiled, info_log))
    }
}

impl GlObjectState for ShaderState {
    fn object_type(&self) -> GlObjectStateType {
        GlObjectStateType::Shader
    }

    fn snapshot_handle(&self) -> GLuint {
        self.snapshot_handle
    }

    fn is_valid(&self) -> bool {
        self.is_valid
    }

    fn clear(&mut self) {
        *self = ShaderState::default();
    }

    fn snapshot(
        &mut self,
        cx: &GlContext,
        _remapper: &mut dyn HandleRemapper,
        handle: GLuint,
        _target: GLenum,
    ) -> Result<(), StateError> {
        cx.check_error("before shader snapshot");
        self.clear();
        let result = self.snapshot_inner(cx, handle);
        if result.is_err() {
            self.clear();
        }
        result
    }

    fn restore(
        &self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        handle: &mut GLuint,
    ) -> Result<RestoreReport, StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::Shader));
        }
        cx.check_error("before shader restore");

        let mut report = RestoreReport::default();
        let mut created = false;
        if *handle == 0 {
            let new_handle = cx.gl.create_shader(self.shader_type);
            if cx.check_error("glCreateShader") || new_handle == 0 {
                return Err(StateError::CreateFailed {
                    object: GlObjectStateType::Shader,
                    trace: self.snapshot_handle,
                });
            }
            remapper.declare(ShaderHandle(self.snapshot_handle), ShaderHandle(new_handle), enums::NONE);
            *handle = new_handle;
            created = true;
        }

        if self.source.is_empty() {
            return Ok(report);
        }

        let failure = match self.compile(cx, *handle) {
            Ok((true, _)) => {
                if !self.compile_status {
                    report.warn(format!(
                        "shader compiled on replay but not at trace time: trace handle {}, replay handle {}, type {}",
                        self.snapshot_handle,
                        *handle,
                        cx.enums.name(self.shader_type, None)
                    ));
                }
                None
            }
            Ok((false, info_log)) if self.compile_status => Some(StateError::CompileFailed {
                trace: self.snapshot_handle,
                info_log,
            }),
            Ok((false, info_log)) => {
                report.warn(format!(
                    "shader failed to compile on replay, as it did at trace time: trace handle {}, replay handle {}, type {}, info log: {:?}",
                    self.snapshot_handle,
                    *handle,
                    cx.enums.name(self.shader_type, None),
                    info_log
                ));
                None
            }
            Err(err) => Some(err),
        };

        match failure {
            None => Ok(report),
            Some(err) => {
                if created {
                    remapper.delete(cx.gl, ShaderHandle(self.snapshot_handle), ShaderHandle(*handle));
                    *handle = 0;
                }
                Err(err)
            }
        }
    }

    fn remap_handles(&mut self, remapper: &dyn HandleRemapper) -> Result<(), StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::Shader));
        }
        self.snapshot_handle = remapper.remap(ShaderHandle(self.snapshot_handle)).0;
        Ok(())
    }

    fn serialize(&self, enums: &GlEnumTable, blobs: &mut dyn BlobManager) -> Result<Value, StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::Shader));
        }

        let source_blob_id = if self.source.is_empty() {
            String::new()
        } else {
            let prefix = format!(
                "{}_{}",
                source_blob_prefix(self.shader_type),
                self.compile_status as u32
            );
            blobs.add_buf_compute_unique_id(self.source.as_bytes(), &prefix, "txt")?
        };

        Ok(json!({
            "handle": self.snapshot_handle,
            "type": doc::enum_value(enums, self.shader_type),
            "info_log": self.info_log,
            "source_blob_id": source_blob_id,
            "marked_for_deletion": self.marked_for_deletion,
            "compile_status": self.compile_status,
        }))
    }

    fn deserialize(&mut self, node: &Value, enums: &GlEnumTable, blobs: &dyn BlobManager) -> Result<(), DocError> {
        self.clear();
        let result: Result<_, DocError> = (|| {
            let obj = doc::as_object(node)?;
            let mut state = ShaderState::new();

            let blob_id = doc::opt(obj, "source_blob_id", "", doc::get_str)?;
            if !blob_id.is_empty() {
                let mut data = blobs.get(blob_id)?;
                if let Some(nul) = data.iter().position(|&b| b == 0) {
                    data.truncate(nul);
                }
                state.source = String::from_utf8_lossy(&data).into_owned();
            }

            state.snapshot_handle = doc::get_u32(obj, "handle")?;
            state.shader_type = doc::get_enum(obj, "type", enums)?;
            if !SHADER_TYPES.contains(&state.shader_type) {
                return Err(DocError::Invalid(format!(
                    "shader {}: {} is not a shader type",
                    state.snapshot_handle,
                    enums.name(state.shader_type, None)
                )));
            }
            state.info_log = doc::opt(obj, "info_log", "", doc::get_str)?.to_string();
            state.marked_for_deletion = doc::opt(obj, "marked_for_deletion", false, doc::get_bool)?;
            state.compile_status = doc::get_bool(obj, "compile_status")?;
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
        match other.as_any().downcast_ref::<ShaderState>() {
            Some(other) => self.shader_type == other.shader_type && self.source == other.source,
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
