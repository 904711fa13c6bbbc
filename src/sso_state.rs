//! Separable program pipeline state.

use gleam::gl::{GLbitfield, GLenum, GLuint};
use serde_json::{json, Map, Value};
use std::any::Any;

use crate::blob_manager::BlobManager;
use crate::doc;
use crate::enums::{self, GlEnumTable};
use crate::error::{DocError, StateError};
use crate::gl_object::{GlContext, GlObjectState, GlObjectStateType, RestoreReport};
use crate::gl_utils::ScopedBindingState;
use crate::handle::{PipelineHandle, ProgramHandle};
use crate::remapper::{HandleRemapper, RemapperExt};

/// A pipeline stage: its document name, shader type and stage bit.
#[derive(Copy, Clone, Debug)]
struct Stage {
    name: &'static str,
    shader_type: GLenum,
    bit: GLbitfield,
}

const STAGES: [Stage; 5] = [
    Stage { name: "vertex", shader_type: enums::VERTEX_SHADER, bit: enums::VERTEX_SHADER_BIT },
    Stage { name: "fragment", shader_type: enums::FRAGMENT_SHADER, bit: enums::FRAGMENT_SHADER_BIT },
    Stage { name: "geometry", shader_type: enums::GEOMETRY_SHADER, bit: enums::GEOMETRY_SHADER_BIT },
    Stage { name: "tess_control", shader_type: enums::TESS_CONTROL_SHADER, bit: enums::TESS_CONTROL_SHADER_BIT },
    Stage { name: "tess_eval", shader_type: enums::TESS_EVALUATION_SHADER, bit: enums::TESS_EVALUATION_SHADER_BIT },
];

/// Without geometry shader support only the vertex and fragment stages are
/// queried; some drivers reject the rest.
fn stage_count(cx: &GlContext) -> usize {
    if cx.info.supports_extension("GL_ARB_geometry_shader4") {
        STAGES.len()
    } else {
        2
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SsoState {
    snapshot_handle: GLuint,
    has_been_bound: bool,
    /// The program used for each entry of `STAGES`.
    stage_programs: [GLuint; 5],
    active_program: GLuint,
    info_log_length: u32,
    is_valid: bool,
}

impl SsoState {
    pub fn new() -> SsoState {
        SsoState::default()
    }

    pub fn has_been_bound(&self) -> bool {
        self.has_been_bound
    }

    /// The program bound to the stage for `shader_type`, if any.
    pub fn stage_program(&self, shader_type: GLenum) -> Option<GLuint> {
        STAGES
            .iter()
            .position(|stage| stage.shader_type == shader_type)
            .map(|i| self.stage_programs[i])
            .filter(|&program| program != 0)
    }

    pub fn active_program(&self) -> GLuint {
        self.active_program
    }

    pub fn info_log_length(&self) -> u32 {
        self.info_log_length
    }

    fn apply_stages(&self, cx: &GlContext, remapper: &dyn HandleRemapper, replay: GLuint) -> Result<(), StateError> {
        let gl = cx.gl;
        gl.bind_program_pipeline(replay);
        if cx.check_error("glBindProgramPipeline") {
            return Err(self.restore_error(replay, "glBindProgramPipeline failed"));
        }

        for (stage, &program) in STAGES.iter().zip(&self.stage_programs).take(stage_count(cx)) {
            if program != 0 {
                let replay_program = remapper.remap(ProgramHandle(program)).0;
                gl.use_program_stages(replay, stage.bit, replay_program);
            }
        }

        if self.active_program != 0 {
            gl.active_shader_program(replay, remapper.remap(ProgramHandle(self.active_program)).0);
        }

        if cx.check_error("glUseProgramStages") {
            return Err(self.restore_error(replay, "binding programs to pipeline stages failed"));
        }
        Ok(())
    }

    fn restore_error(&self, replay: GLuint, reason: &str) -> StateError {
        StateError::Restore {
            object: GlObjectStateType::ProgramPipeline,
            trace: self.snapshot_handle,
            replay,
            reason: reason.to_string(),
        }
    }
}

impl GlObjectState for SsoState {
    fn object_type(&self) -> GlObjectStateType {
        GlObjectStateType::ProgramPipeline
    }

    fn snapshot_handle(&self) -> GLuint {
        self.snapshot_handle
    }

    fn is_valid(&self) -> bool {
        self.is_valid
    }

    fn clear(&mut self) {
        *self = SsoState::default();
    }

    fn snapshot(
        &mut self,
        cx: &GlContext,
        _remapper: &mut dyn HandleRemapper,
        handle: GLuint,
        _target: GLenum,
    ) -> Result<(), StateError> {
        cx.check_error("before program pipeline snapshot");
        self.clear();

        let gl = cx.gl;
        self.snapshot_handle = handle;
        self.has_been_bound = gl.is_program_pipeline(handle) != 0;

        if self.has_been_bound {
            let _saved = ScopedBindingState::new(gl, &[enums::PROGRAM_PIPELINE]);
            gl.bind_program_pipeline(handle);

            for (i, stage) in STAGES.iter().enumerate().take(stage_count(cx)) {
                self.stage_programs[i] = gl.get_program_pipeline_iv(handle, stage.shader_type) as GLuint;
            }
            self.info_log_length = gl.get_program_pipeline_iv(handle, enums::INFO_LOG_LENGTH).max(0) as u32;
            self.active_program = gl.get_program_pipeline_iv(handle, enums::ACTIVE_PROGRAM) as GLuint;

            if cx.check_error("glGetProgramPipelineiv") {
                let handle = self.snapshot_handle;
                self.clear();
                return Err(StateError::Query {
                    object: GlObjectStateType::ProgramPipeline,
                    handle,
                    what: "pipeline stages".to_string(),
                });
            }
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
            return Err(StateError::NotValid(GlObjectStateType::ProgramPipeline));
        }
        if self.snapshot_handle == 0 {
            return Err(StateError::DefaultObject(GlObjectStateType::ProgramPipeline));
        }
        cx.check_error("before program pipeline restore");

        let gl = cx.gl;
        let _saved = ScopedBindingState::new(gl, &[enums::PROGRAM_PIPELINE]);
        let mut created = false;
        if *handle == 0 {
            let new_handle = gl.gen_program_pipelines(1).first().copied().unwrap_or(0);
            if cx.check_error("glGenProgramPipelines") || new_handle == 0 {
                return Err(StateError::CreateFailed {
                    object: GlObjectStateType::ProgramPipeline,
                    trace: self.snapshot_handle,
                });
            }
            remapper.declare(PipelineHandle(self.snapshot_handle), PipelineHandle(new_handle), enums::NONE);
            *handle = new_handle;
            created = true;
        }

        if self.has_been_bound {
            if let Err(err) = self.apply_stages(cx, remapper, *handle) {
                tracing::error!(
                    "failed restoring trace program pipeline {}, replay pipeline {}",
                    self.snapshot_handle,
                    *handle
                );
                if created {
                    remapper.delete(gl, PipelineHandle(self.snapshot_handle), PipelineHandle(*handle));
                    *handle = 0;
                }
                return Err(err);
            }
        }

        Ok(RestoreReport::default())
    }

    fn remap_handles(&mut self, remapper: &dyn HandleRemapper) -> Result<(), StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::ProgramPipeline));
        }
        self.snapshot_handle = remapper.remap(PipelineHandle(self.snapshot_handle)).0;
        for program in self.stage_programs.iter_mut() {
            *program = remapper.remap(ProgramHandle(*program)).0;
        }
        self.active_program = remapper.remap(ProgramHandle(self.active_program)).0;
        Ok(())
    }

    fn serialize(&self, _enums: &GlEnumTable, _blobs: &mut dyn BlobManager) -> Result<Value, StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::ProgramPipeline));
        }

        let stages: Map<String, Value> = STAGES
            .iter()
            .zip(&self.stage_programs)
            .map(|(stage, &program)| (stage.name.to_string(), json!(program)))
            .collect();

        Ok(json!({
            "handle": self.snapshot_handle,
            "shader_objects": stages,
            "active_program": self.active_program,
            "info_log_length": self.info_log_length,
            "has_been_bound": self.has_been_bound,
        }))
    }

    fn deserialize(&mut self, node: &Value, _enums: &GlEnumTable, _blobs: &dyn BlobManager) -> Result<(), DocError> {
        self.clear();
        let result: Result<_, DocError> = (|| {
            let obj = doc::as_object(node)?;
            let mut state = SsoState::new();
            state.snapshot_handle = doc::get_u32(obj, "handle")?;

            if obj.contains_key("shader_objects") {
                let stages = doc::get_object(obj, "shader_objects")?;
                for (i, stage) in STAGES.iter().enumerate() {
                    state.stage_programs[i] = doc::opt(stages, stage.name, 0, doc::get_u32)?;
                }
            }

            state.active_program = doc::opt(obj, "active_program", 0, doc::get_u32)?;
            state.info_log_length = doc::opt(obj, "info_log_length", 0, doc::get_u32)?;
            // Records without the flag came from pipelines that had been bound.
            state.has_been_bound = doc::opt(obj, "has_been_bound", true, doc::get_bool)?;
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
        match other.as_any().downcast_ref::<SsoState>() {
            Some(other) => self.stage_programs == other.stage_programs && self.active_program == other.active_program,
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
