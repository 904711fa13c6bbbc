//! Program object state.
//!
//! A `ProgramState` records either a program's current state, or, for a
//! *link snapshot*, everything that went into its most recent link,
//! including full copies of the shaders attached at the time. Shaders may be
//! detached, edited or deleted after linking without affecting the linked
//! program, so restoring a program faithfully means relinking from the
//! link-time snapshot and then layering the current state on top.

use gleam::gl::{GLenum, GLint, GLuint};
use serde_json::{json, Map, Value};
use std::any::Any;

use crate::blob_manager::BlobManager;
use crate::doc;
use crate::enums::{self, GlEnumTable};
use crate::error::{DocError, StateError};
use crate::gl_object::{GlContext, GlObjectState, GlObjectStateType, RestoreReport};
use crate::gl_utils::{uniform_type_info, ScopedBindingState, UniformBaseType, UniformTypeInfo};
use crate::handle::{ProgramHandle, ShaderHandle};
use crate::remapper::{HandleRemapper, RemapperExt};
use crate::shader_state::ShaderState;

const PROGRAM_STATE_VERSION: u32 = 0x0101;

/// `glGetUniformBlockIndex`'s "no such block" value.
const INVALID_INDEX: GLuint = 0xFFFF_FFFF;

/// How a program was last linked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkEntrypoint {
    None,
    LinkProgram,
    ProgramBinary,
    CreateShaderProgramv,
}

impl LinkEntrypoint {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkEntrypoint::None => "",
            LinkEntrypoint::LinkProgram => "glLinkProgram",
            LinkEntrypoint::ProgramBinary => "glProgramBinary",
            LinkEntrypoint::CreateShaderProgramv => "glCreateShaderProgramv",
        }
    }

    fn parse(name: &str) -> Result<LinkEntrypoint, DocError> {
        match name {
            "" => Ok(LinkEntrypoint::None),
            "glLinkProgram" | "glLinkProgramARB" => Ok(LinkEntrypoint::LinkProgram),
            "glProgramBinary" => Ok(LinkEntrypoint::ProgramBinary),
            "glCreateShaderProgramv" => Ok(LinkEntrypoint::CreateShaderProgramv),
            other => Err(DocError::Invalid(format!("unrecognized link entrypoint {:?}", other))),
        }
    }
}

/// What a link-time snapshot was linked from.
#[derive(Copy, Clone, Debug)]
pub enum LinkSource<'a> {
    /// `glLinkProgram` with whatever shaders are attached.
    AttachedShaders,
    /// `glProgramBinary`.
    Binary { format: GLenum, data: &'a [u8] },
    /// `glCreateShaderProgramv`.
    ShaderProgram { shader_type: GLenum, strings: &'a [&'a str] },
}

impl<'a> LinkSource<'a> {
    fn entrypoint(&self) -> LinkEntrypoint {
        match self {
            LinkSource::AttachedShaders => LinkEntrypoint::LinkProgram,
            LinkSource::Binary { .. } => LinkEntrypoint::ProgramBinary,
            LinkSource::ShaderProgram { .. } => LinkEntrypoint::CreateShaderProgramv,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgramAttrib {
    pub name: String,
    pub type_: GLenum,
    pub size: GLint,
    pub bound_location: GLint,
}

/// One active uniform. `data` holds the raw 32-bit words of every array
/// element, doubles taking two words each; it is empty when the value could
/// not be read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgramUniform {
    pub name: String,
    pub type_: GLenum,
    pub size: GLint,
    pub base_location: GLint,
    pub data: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniformBlock {
    pub block_index: GLuint,
    pub name: String,
    pub binding_point: GLint,
    pub data_size: GLint,
    pub active_uniforms: GLint,
    /// A mask of the `REFERENCED_BY_*` bits.
    pub referenced_by: u32,
}

impl UniformBlock {
    pub const REFERENCED_BY_VERTEX: u32 = 1;
    pub const REFERENCED_BY_TESS_CONTROL: u32 = 2;
    pub const REFERENCED_BY_TESS_EVALUATION: u32 = 4;
    pub const REFERENCED_BY_GEOMETRY: u32 = 8;
    pub const REFERENCED_BY_FRAGMENT: u32 = 16;
    pub const REFERENCED_BY_COMPUTE: u32 = 32;
}

const BLOCK_REFERENCES: &[(GLenum, u32)] = &[
    (enums::UNIFORM_BLOCK_REFERENCED_BY_VERTEX_SHADER, UniformBlock::REFERENCED_BY_VERTEX),
    (enums::UNIFORM_BLOCK_REFERENCED_BY_TESS_CONTROL_SHADER, UniformBlock::REFERENCED_BY_TESS_CONTROL),
    (enums::UNIFORM_BLOCK_REFERENCED_BY_TESS_EVALUATION_SHADER, UniformBlock::REFERENCED_BY_TESS_EVALUATION),
    (enums::UNIFORM_BLOCK_REFERENCED_BY_GEOMETRY_SHADER, UniformBlock::REFERENCED_BY_GEOMETRY),
    (enums::UNIFORM_BLOCK_REFERENCED_BY_FRAGMENT_SHADER, UniformBlock::REFERENCED_BY_FRAGMENT),
];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgramOutput {
    pub name: String,
    pub location: GLint,
    pub location_index: GLint,
    pub type_: GLenum,
    pub array_size: GLint,
    pub is_per_patch: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformFeedbackVarying {
    pub index: GLint,
    pub name: String,
    pub size: GLint,
    pub type_: GLenum,
}

fn is_builtin(name: &str) -> bool {
    name.starts_with("gl_")
}

/// Read one element of a uniform into its raw words.
fn read_uniform_element(cx: &GlContext, program: GLuint, location: GLint, info: UniformTypeInfo, out: &mut Vec<u32>) {
    let gl = cx.gl;
    let components = info.components() as usize;
    match info.base {
        UniformBaseType::Float => {
            let mut values = vec![0f32; components];
            gl.get_uniform_fv(program, location, &mut values);
            out.extend(values.iter().map(|f| f.to_bits()));
        }
        UniformBaseType::Double => {
            let mut values = vec![0f64; components];
            gl.get_uniform_dv(program, location, &mut values);
            for d in values {
                let bits = d.to_bits();
                out.push(bits as u32);
                out.push((bits >> 32) as u32);
            }
        }
        UniformBaseType::UnsignedInt | UniformBaseType::AtomicCounter => {
            let mut values = vec![0u32; components];
            gl.get_uniform_uiv(program, location, &mut values);
            out.extend(values);
        }
        UniformBaseType::Int | UniformBaseType::Bool | UniformBaseType::Sampler | UniformBaseType::Image => {
            let mut values = vec![0i32; components];
            gl.get_uniform_iv(program, location, &mut values);
            out.extend(values.iter().map(|&i| i as u32));
        }
    }
}

fn words_to_doubles(words: &[u32]) -> Vec<f64> {
    words
        .chunks(2)
        .map(|pair| {
            let lo = u64::from(pair[0]);
            let hi = pair.get(1).map_or(0, |&w| u64::from(w));
            f64::from_bits(lo | (hi << 32))
        })
        .collect()
}

/// Set `count` elements of a uniform from raw words.
fn write_uniform(cx: &GlContext, location: GLint, info: UniformTypeInfo, words: &[u32]) {
    let gl = cx.gl;
    match info.base {
        UniformBaseType::Float => {
            let values: Vec<f32> = words.iter().map(|&w| f32::from_bits(w)).collect();
            if info.is_matrix() {
                gl.uniform_matrix_fv(info.columns, info.rows, location, false, &values);
            } else {
                gl.uniform_fv(info.rows, location, &values);
            }
        }
        UniformBaseType::Double => {
            let values = words_to_doubles(words);
            if info.is_matrix() {
                gl.uniform_matrix_dv(info.columns, info.rows, location, false, &values);
            } else {
                gl.uniform_dv(info.rows, location, &values);
            }
        }
        UniformBaseType::UnsignedInt | UniformBaseType::AtomicCounter => {
            gl.uniform_uiv(info.rows, location, words);
        }
        UniformBaseType::Int | UniformBaseType::Bool | UniformBaseType::Sampler | UniformBaseType::Image => {
            let values: Vec<i32> = words.iter().map(|&w| w as i32).collect();
            gl.uniform_iv(info.rows, location, &values);
        }
    }
}

/// The document form of a uniform's words: one value per component.
/// Non-finite floating point values are written as hex bit patterns, which
/// JSON numbers can't carry.
fn uniform_data_to_json(info: UniformTypeInfo, words: &[u32]) -> Vec<Value> {
    match info.base {
        UniformBaseType::Float => words
            .iter()
            .map(|&w| {
                let f = f32::from_bits(w);
                if f.is_finite() {
                    json!(f)
                } else {
                    json!(format!("0x{:08X}", w))
                }
            })
            .collect(),
        UniformBaseType::Double => words_to_doubles(words)
            .into_iter()
            .map(|d| {
                if d.is_finite() {
                    json!(d)
                } else {
                    json!(format!("0x{:016X}", d.to_bits()))
                }
            })
            .collect(),
        UniformBaseType::Bool => words.iter().map(|&w| json!(w != 0)).collect(),
        UniformBaseType::UnsignedInt | UniformBaseType::AtomicCounter => words.iter().map(|&w| json!(w)).collect(),
        UniformBaseType::Int | UniformBaseType::Sampler | UniformBaseType::Image => {
            words.iter().map(|&w| json!(w as i32)).collect()
        }
    }
}

/// Parse a uniform component written as a string: a hex bit pattern or a
/// decimal integer.
fn parse_component_string(s: &str) -> Option<(u64, bool)> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|bits| (bits, true));
    }
    if s.starts_with('-') {
        return s.parse::<i64>().ok().map(|n| (n as u64, false));
    }
    s.parse::<u64>().ok().map(|n| (n, false))
}

fn uniform_data_from_json(info: UniformTypeInfo, values: &[Value], out: &mut Vec<u32>) -> Result<(), DocError> {
    let bad = || DocError::WrongType {
        key: "uniform_data".to_string(),
        expected: "numbers, booleans or hex strings",
    };

    for value in values {
        match info.base {
            UniformBaseType::Float => {
                let f = match value {
                    Value::String(s) => match parse_component_string(s).ok_or_else(bad)? {
                        (bits, true) => f32::from_bits(bits as u32),
                        (n, false) => n as i64 as f32,
                    },
                    _ => value.as_f64().ok_or_else(bad)? as f32,
                };
                out.push(f.to_bits());
            }
            UniformBaseType::Double => {
                let d = match value {
                    Value::String(s) => match parse_component_string(s).ok_or_else(bad)? {
                        (bits, true) => f64::from_bits(bits),
                        (n, false) => n as i64 as f64,
                    },
                    _ => value.as_f64().ok_or_else(bad)?,
                };
                let bits = d.to_bits();
                out.push(bits as u32);
                out.push((bits >> 32) as u32);
            }
            _ => {
                let word = match value {
                    Value::Bool(b) => *b as u32,
                    Value::String(s) => parse_component_string(s).ok_or_else(bad)?.0 as u32,
                    _ => value
                        .as_i64()
                        .map(|n| n as u32)
                        .or_else(|| value.as_u64().map(|n| n as u32))
                        .ok_or_else(bad)?,
                };
                out.push(word);
            }
        }
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgramState {
    link_entrypoint: LinkEntrypoint,
    snapshot_handle: GLuint,
    link_snapshot: bool,
    link_status: bool,
    separable: bool,
    verify_status: bool,
    marked_for_deletion: bool,
    num_active_attribs: u32,
    num_active_uniforms: u32,
    num_active_uniform_blocks: u32,
    info_log: String,
    create_shader_program_type: GLenum,
    create_shader_program_strings: Vec<String>,
    program_binary: Vec<u8>,
    program_binary_format: GLenum,
    attached_shaders: Vec<GLuint>,
    shaders: Vec<ShaderState>,
    attribs: Vec<ProgramAttrib>,
    uniforms: Vec<ProgramUniform>,
    uniform_blocks: Vec<UniformBlock>,
    outputs: Vec<ProgramOutput>,
    transform_feedback_mode: GLenum,
    varyings: Vec<TransformFeedbackVarying>,
    link_time_snapshot: Option<Box<ProgramState>>,
    is_valid: bool,
}

impl Default for ProgramState {
    fn default() -> ProgramState {
        ProgramState {
            link_entrypoint: LinkEntrypoint::None,
            snapshot_handle: 0,
            link_snapshot: false,
            link_status: false,
            separable: false,
            verify_status: false,
            marked_for_deletion: false,
            num_active_attribs: 0,
            num_active_uniforms: 0,
            num_active_uniform_blocks: 0,
            info_log: String::new(),
            create_shader_program_type: enums::NONE,
            create_shader_program_strings: Vec::new(),
            program_binary: Vec::new(),
            program_binary_format: enums::NONE,
            attached_shaders: Vec::new(),
            shaders: Vec::new(),
            attribs: Vec::new(),
            uniforms: Vec::new(),
            uniform_blocks: Vec::new(),
            outputs: Vec::new(),
            transform_feedback_mode: enums::NONE,
            varyings: Vec::new(),
            link_time_snapshot: None,
            is_valid: false,
        }
    }
}

impl ProgramState {
    pub fn new() -> ProgramState {
        ProgramState::default()
    }

    pub fn link_entrypoint(&self) -> LinkEntrypoint {
        self.link_entrypoint
    }

    pub fn is_link_snapshot(&self) -> bool {
        self.link_snapshot
    }

    pub fn link_status(&self) -> bool {
        self.link_status
    }

    pub fn separable(&self) -> bool {
        self.separable
    }

    pub fn marked_for_deletion(&self) -> bool {
        self.marked_for_deletion
    }

    pub fn info_log(&self) -> &str {
        &self.info_log
    }

    pub fn attached_shaders(&self) -> &[GLuint] {
        &self.attached_shaders
    }

    /// The shaders a link snapshot was linked from.
    pub fn shaders(&self) -> &[ShaderState] {
        &self.shaders
    }

    pub fn attribs(&self) -> &[ProgramAttrib] {
        &self.attribs
    }

    pub fn uniforms(&self) -> &[ProgramUniform] {
        &self.uniforms
    }

    pub fn uniform(&self, name: &str) -> Option<&ProgramUniform> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn uniform_blocks(&self) -> &[UniformBlock] {
        &self.uniform_blocks
    }

    pub fn outputs(&self) -> &[ProgramOutput] {
        &self.outputs
    }

    pub fn transform_feedback_mode(&self) -> GLenum {
        self.transform_feedback_mode
    }

    pub fn varyings(&self) -> &[TransformFeedbackVarying] {
        &self.varyings
    }

    pub fn program_binary(&self) -> (&[u8], GLenum) {
        (&self.program_binary, self.program_binary_format)
    }

    pub fn link_time_snapshot(&self) -> Option<&ProgramState> {
        self.link_time_snapshot.as_deref()
    }

    /// Attach the state the program had when it was last linked. The
    /// snapshot must be a valid link snapshot.
    pub fn set_link_time_snapshot(&mut self, snapshot: Option<ProgramState>) -> Result<(), StateError> {
        if let Some(snapshot) = &snapshot {
            if !snapshot.is_valid {
                return Err(StateError::NotValid(GlObjectStateType::Program));
            }
        }
        self.link_time_snapshot = snapshot.map(Box::new);
        Ok(())
    }

    fn query_failed(&self, what: &str) -> StateError {
        StateError::Query {
            object: GlObjectStateType::Program,
            handle: self.snapshot_handle,
            what: what.to_string(),
        }
    }

    fn get_int(&self, cx: &GlContext, pname: GLenum) -> GLint {
        cx.gl.get_program_iv(self.snapshot_handle, pname)
    }

    fn snapshot_basic_info(&mut self, cx: &GlContext) -> Result<(), StateError> {
        self.link_status = self.get_int(cx, enums::LINK_STATUS) != 0;
        if cx.check_error("glGetProgramiv(GL_LINK_STATUS)") {
            return Err(self.query_failed("link status"));
        }
        if cx.info.supports_extension("GL_ARB_separate_shader_objects") {
            self.separable = self.get_int(cx, enums::PROGRAM_SEPARABLE) != 0;
        }
        self.marked_for_deletion = self.get_int(cx, enums::DELETE_STATUS) != 0;
        self.verify_status = self.get_int(cx, enums::VALIDATE_STATUS) != 0;
        self.num_active_attribs = self.get_int(cx, enums::ACTIVE_ATTRIBUTES).max(0) as u32;
        self.num_active_uniforms = self.get_int(cx, enums::ACTIVE_UNIFORMS).max(0) as u32;
        if cx.info.is_version_at_least(3, 1) {
            self.num_active_uniform_blocks = self.get_int(cx, enums::ACTIVE_UNIFORM_BLOCKS).max(0) as u32;
        }
        if cx.check_error("program status queries") {
            return Err(self.query_failed("program status"));
        }
        Ok(())
    }

    fn snapshot_outputs(&mut self, cx: &GlContext) {
        if !cx.info.supports_extension("GL_ARB_program_interface_query") {
            return;
        }
        let gl = cx.gl;
        let program = self.snapshot_handle;

        let count = gl.get_program_interface_iv(program, enums::PROGRAM_OUTPUT, enums::ACTIVE_RESOURCES);
        cx.check_error("glGetProgramInterfaceiv");

        const PROPS: &[GLenum] = &[
            enums::LOCATION,
            enums::LOCATION_INDEX,
            enums::TYPE,
            enums::ARRAY_SIZE,
            enums::IS_PER_PATCH,
        ];
        self.outputs = (0..count.max(0) as GLuint)
            .map(|i| {
                let name = gl.get_program_resource_name(program, enums::PROGRAM_OUTPUT, i);
                let props = gl.get_program_resource_iv(program, enums::PROGRAM_OUTPUT, i, PROPS);
                cx.check_error("program output queries");
                let prop = |n: usize| props.get(n).copied().unwrap_or(0);
                ProgramOutput {
                    name,
                    location: prop(0),
                    location_index: prop(1),
                    type_: prop(2) as GLenum,
                    array_size: prop(3),
                    is_per_patch: prop(4) != 0,
                }
            })
            .collect();
    }

    fn snapshot_program_binary(&mut self, cx: &GlContext) {
        if !self.link_status || self.get_int(cx, enums::PROGRAM_BINARY_RETRIEVABLE_HINT) == 0 {
            cx.check_error("glGetProgramiv(GL_PROGRAM_BINARY_RETRIEVABLE_HINT)");
            return;
        }
        let (binary, format) = cx.gl.get_program_binary(self.snapshot_handle);
        if cx.check_error("glGetProgramBinary") {
            tracing::error!("failed retrieving program binary for GL program {}", self.snapshot_handle);
            return;
        }
        self.program_binary = binary;
        self.program_binary_format = format;
    }

    fn snapshot_info_log(&mut self, cx: &GlContext) {
        if self.get_int(cx, enums::INFO_LOG_LENGTH) > 0 {
            self.info_log = cx.gl.get_program_info_log(self.snapshot_handle);
        }
        cx.check_error("glGetProgramInfoLog");
    }

    fn snapshot_attached_shaders(&mut self, cx: &GlContext, remapper: &dyn HandleRemapper, linked_using_binary: bool) {
        let attached = cx.gl.get_attached_shaders(self.snapshot_handle);
        cx.check_error("glGetAttachedShaders");

        // glIsShader can't be trusted here; only keep shaders the remapper
        // knows about.
        let handle = self.snapshot_handle;
        self.attached_shaders = attached
            .into_iter()
            .filter(|&shader| {
                let known = remapper.is_valid_handle(crate::handle::Namespace::Shaders, shader);
                if !known && !linked_using_binary {
                    tracing::warn!("GL shader {} attached to GL program {} is unknown", shader, handle);
                }
                known
            })
            .collect();
    }

    fn snapshot_shader_objects(
        &mut self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
    ) -> Result<(), StateError> {
        let mut shaders = Vec::with_capacity(self.attached_shaders.len());
        for &handle in &self.attached_shaders {
            let mut shader = ShaderState::new();
            shader.snapshot(cx, remapper, handle, enums::NONE)?;
            shaders.push(shader);
        }
        self.shaders = shaders;
        Ok(())
    }

    fn snapshot_active_attribs(&mut self, cx: &GlContext) {
        let gl = cx.gl;
        let program = self.snapshot_handle;
        self.attribs = (0..self.num_active_attribs)
            .map(|i| {
                let (size, type_, name) = gl.get_active_attrib(program, i);
                let bound_location = if is_builtin(&name) {
                    -1
                } else {
                    gl.get_attrib_location(program, &name)
                };
                cx.check_error("glGetActiveAttrib");
                ProgramAttrib {
                    name,
                    type_,
                    size,
                    bound_location,
                }
            })
            .collect();
    }

    fn snapshot_uniforms(&mut self, cx: &GlContext) {
        let gl = cx.gl;
        let program = self.snapshot_handle;
        self.uniforms = (0..self.num_active_uniforms)
            .map(|i| {
                let (size, type_, name) = gl.get_active_uniform(program, i);
                let base_location = if is_builtin(&name) {
                    -1
                } else {
                    gl.get_uniform_location(program, &name)
                };
                cx.check_error("glGetActiveUniform");

                let mut data = Vec::new();
                if let (Some(info), true) = (uniform_type_info(type_), base_location >= 0) {
                    for element in 0..size {
                        read_uniform_element(cx, program, base_location + element, info, &mut data);
                    }
                    if cx.check_error("glGetUniform") {
                        data.clear();
                    }
                }

                ProgramUniform {
                    name,
                    type_,
                    size,
                    base_location,
                    data,
                }
            })
            .collect();
    }

    fn snapshot_uniform_blocks(&mut self, cx: &GlContext) {
        if !cx.info.is_version_at_least(3, 1) {
            return;
        }
        let gl = cx.gl;
        let program = self.snapshot_handle;
        let compute = cx.info.is_version_at_least(4, 3);

        self.uniform_blocks = (0..self.num_active_uniform_blocks)
            .map(|index| {
                let query = |pname| gl.get_active_uniform_block_i(program, index, pname);
                let mut referenced_by = 0;
                for &(pname, bit) in BLOCK_REFERENCES {
                    if query(pname) != 0 {
                        referenced_by |= bit;
                    }
                }
                if compute && query(enums::UNIFORM_BLOCK_REFERENCED_BY_COMPUTE_SHADER) != 0 {
                    referenced_by |= UniformBlock::REFERENCED_BY_COMPUTE;
                }
                let block = UniformBlock {
                    block_index: index,
                    name: gl.get_active_uniform_block_name(program, index),
                    binding_point: query(enums::UNIFORM_BLOCK_BINDING),
                    data_size: query(enums::UNIFORM_BLOCK_DATA_SIZE),
                    active_uniforms: query(enums::UNIFORM_BLOCK_ACTIVE_UNIFORMS),
                    referenced_by,
                };
                cx.check_error("glGetActiveUniformBlockiv");
                block
            })
            .collect();
    }

    fn snapshot_transform_feedback(&mut self, cx: &GlContext) {
        let gl = cx.gl;
        let program = self.snapshot_handle;

        // The mode is current state; the varyings are what was linked.
        self.transform_feedback_mode = self.get_int(cx, enums::TRANSFORM_FEEDBACK_BUFFER_MODE) as GLenum;
        let count = self.get_int(cx, enums::TRANSFORM_FEEDBACK_VARYINGS).max(0) as GLuint;
        cx.check_error("transform feedback queries");

        self.varyings = (0..count)
            .map(|i| {
                let (size, type_, name) = gl.get_transform_feedback_varying(program, i);
                cx.check_error("glGetTransformFeedbackVarying");
                TransformFeedbackVarying {
                    index: i as GLint,
                    name,
                    size,
                    type_,
                }
            })
            .collect();
    }

    fn snapshot_current(&mut self, cx: &GlContext, remapper: &mut dyn HandleRemapper) -> Result<(), StateError> {
        self.snapshot_basic_info(cx)?;
        self.snapshot_outputs(cx);
        self.snapshot_program_binary(cx);
        self.snapshot_info_log(cx);
        self.snapshot_attached_shaders(cx, remapper, false);
        self.snapshot_active_attribs(cx);
        self.snapshot_uniforms(cx);
        self.snapshot_uniform_blocks(cx);
        // Some of this is linked state, but it's worth having.
        self.snapshot_transform_feedback(cx);
        Ok(())
    }

    /// Record what program `handle` was just linked from. Call this right
    /// after the link, while the attached shaders still hold the sources
    /// the program was built with.
    pub fn link_snapshot(
        &mut self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        handle: GLuint,
        source: LinkSource,
    ) -> Result<(), StateError> {
        cx.check_error("before program link snapshot");
        self.clear();

        self.link_entrypoint = source.entrypoint();
        self.snapshot_handle = handle;

        let result = self.link_snapshot_inner(cx, remapper, source);
        if result.is_err() {
            self.clear();
        }
        result
    }

    fn link_snapshot_inner(
        &mut self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        source: LinkSource,
    ) -> Result<(), StateError> {
        if let LinkSource::ShaderProgram { shader_type, strings } = source {
            self.create_shader_program_type = shader_type;
            self.create_shader_program_strings = strings.iter().map(|s| s.to_string()).collect();
        }
        let linked_using_binary = match source {
            LinkSource::Binary { format, data } if !data.is_empty() => {
                self.program_binary = data.to_vec();
                self.program_binary_format = format;
                true
            }
            _ => false,
        };

        self.snapshot_basic_info(cx)?;
        self.snapshot_outputs(cx);
        self.snapshot_info_log(cx);
        self.snapshot_active_attribs(cx);
        self.snapshot_attached_shaders(cx, remapper, linked_using_binary);
        self.snapshot_shader_objects(cx, remapper)?;
        if !linked_using_binary {
            self.snapshot_program_binary(cx);
        }
        self.snapshot_transform_feedback(cx);

        if self.link_status
            && self.shaders.is_empty()
            && !linked_using_binary
            && self.link_entrypoint != LinkEntrypoint::CreateShaderProgramv
        {
            tracing::error!(
                "program {} was successfully linked, but there are no attached shaders",
                self.snapshot_handle
            );
        }

        // The copies in `shaders` are what matter now.
        self.attached_shaders.clear();

        self.link_snapshot = true;
        self.is_valid = true;
        Ok(())
    }

    fn restore_active_attribs(&self, cx: &GlContext, replay: GLuint, report: &mut RestoreReport) {
        for attrib in &self.attribs {
            if is_builtin(&attrib.name) || attrib.bound_location < 0 {
                continue;
            }
            cx.gl.bind_attrib_location(replay, attrib.bound_location as GLuint, &attrib.name);
            if cx.check_error("glBindAttribLocation") {
                report.warn(format!(
                    "GL error binding attribute {:?} to location {}: trace program {}, replay program {}",
                    attrib.name, attrib.bound_location, self.snapshot_handle, replay
                ));
            }
        }
    }

    fn restore_outputs(&self, cx: &GlContext, replay: GLuint, report: &mut RestoreReport) {
        let indexed = cx.info.supports_extension("GL_ARB_blend_func_extended");
        for output in &self.outputs {
            if output.name.is_empty() || is_builtin(&output.name) {
                continue;
            }
            let location = output.location as GLuint;
            if indexed {
                cx.gl
                    .bind_frag_data_location_indexed(replay, location, output.location_index as GLuint, &output.name);
            } else {
                if output.location_index != 0 {
                    report.warn(format!(
                        "GL_ARB_blend_func_extended is not supported, but output {:?} of trace program {} uses location index {}",
                        output.name, self.snapshot_handle, output.location_index
                    ));
                }
                cx.gl.bind_frag_data_location(replay, location, &output.name);
            }
            if cx.check_error("glBindFragDataLocation") {
                report.warn(format!(
                    "GL error binding output {:?} to location {} index {}: trace program {}, replay program {}",
                    output.name, output.location, output.location_index, self.snapshot_handle, replay
                ));
            }
        }
    }

    fn restore_transform_feedback(&self, cx: &GlContext, replay: GLuint, report: &mut RestoreReport) {
        if self.varyings.is_empty() {
            return;
        }
        let count = self
            .varyings
            .iter()
            .filter(|v| v.index >= 0)
            .map(|v| v.index as usize + 1)
            .max()
            .unwrap_or(0);
        let mut names = vec![""; count];
        for varying in &self.varyings {
            if varying.index >= 0 {
                names[varying.index as usize] = varying.name.as_str();
            }
        }
        cx.gl.transform_feedback_varyings(replay, &names, self.transform_feedback_mode);
        if cx.check_error("glTransformFeedbackVaryings") {
            report.warn(format!(
                "GL error setting transform feedback varyings: trace program {}, replay program {}",
                self.snapshot_handle, replay
            ));
        }
    }

    /// Relink `replay` from this link snapshot. Returns whether it linked.
    fn restore_link_snapshot(
        &self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        replay: GLuint,
        report: &mut RestoreReport,
    ) -> Result<bool, StateError> {
        let gl = cx.gl;

        self.restore_active_attribs(cx, replay, report);
        self.restore_outputs(cx, replay, report);
        self.restore_transform_feedback(cx, replay, report);
        if self.separable {
            gl.program_parameter_i(replay, enums::PROGRAM_SEPARABLE, 1);
        }

        let mut linked = false;
        if !self.program_binary.is_empty() {
            gl.program_binary(replay, self.program_binary_format, &self.program_binary);
            if cx.check_error("glProgramBinary") {
                report.warn(format!(
                    "GL error loading the link-time program binary: trace program {}, replay program {}",
                    self.snapshot_handle, replay
                ));
            } else {
                linked = gl.get_program_iv(replay, enums::LINK_STATUS) != 0;
            }
        }

        if linked || self.shaders.is_empty() {
            return Ok(linked);
        }

        // Rebuild the shaders this program was linked from. They only live
        // long enough to link.
        let mut shader_handles = Vec::with_capacity(self.shaders.len());
        let fail = |shader_handles: &[GLuint], err: StateError| {
            for &shader in shader_handles {
                gl.detach_shader(replay, shader);
                gl.delete_shader(shader);
            }
            cx.check_error("deleting link-time shaders");
            err
        };

        for shader in &self.shaders {
            let mut handle = gl.create_shader(shader.shader_type());
            if cx.check_error("glCreateShader") || handle == 0 {
                return Err(fail(
                    &shader_handles,
                    StateError::CreateFailed {
                        object: GlObjectStateType::Shader,
                        trace: shader.snapshot_handle(),
                    },
                ));
            }
            shader_handles.push(handle);

            match shader.restore(cx, remapper, &mut handle) {
                Ok(shader_report) => report.merge(shader_report),
                Err(StateError::CompileFailed { .. }) => {
                    report.warn(format!(
                        "failed compiling link-time shader {}: trace program {}, replay program {}",
                        shader.snapshot_handle(),
                        self.snapshot_handle,
                        replay
                    ));
                }
                Err(err) => return Err(fail(&shader_handles, err)),
            }

            gl.attach_shader(replay, handle);
            if cx.check_error("glAttachShader") {
                return Err(fail(
                    &shader_handles,
                    StateError::Gl {
                        object: GlObjectStateType::Program,
                        handle: self.snapshot_handle,
                        what: "glAttachShader".to_string(),
                    },
                ));
            }
        }

        gl.link_program(replay);
        if cx.check_error("glLinkProgram") {
            report.warn(format!(
                "GL error linking link-time snapshot: trace program {}, replay program {}",
                self.snapshot_handle, replay
            ));
        } else {
            linked = gl.get_program_iv(replay, enums::LINK_STATUS) != 0;
        }

        for &shader in &shader_handles {
            gl.detach_shader(replay, shader);
            gl.delete_shader(shader);
        }
        cx.check_error("deleting link-time shaders");

        Ok(linked)
    }

    /// Bring `replay`'s linked state and pre-link bindings in line with this
    /// record. Returns whether a link happened and succeeded.
    fn link_program(
        &self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        replay: GLuint,
        report: &mut RestoreReport,
    ) -> Result<bool, StateError> {
        if self.link_snapshot {
            return self.restore_link_snapshot(cx, remapper, replay, report);
        }

        let mut linked = false;
        if let Some(snapshot) = &self.link_time_snapshot {
            linked = snapshot.link_program(cx, remapper, replay, report)?;
        }

        // Current state, which takes effect at the next link.
        self.restore_active_attribs(cx, replay, report);
        self.restore_outputs(cx, replay, report);
        if self.separable {
            cx.gl.program_parameter_i(replay, enums::PROGRAM_SEPARABLE, 1);
        }

        for &trace_shader in &self.attached_shaders {
            let replay_shader = remapper.remap(ShaderHandle(trace_shader)).0;
            if replay_shader == 0 {
                continue;
            }
            cx.gl.attach_shader(replay, replay_shader);
            if cx.check_error("glAttachShader") {
                return Err(StateError::Gl {
                    object: GlObjectStateType::Program,
                    handle: self.snapshot_handle,
                    what: format!("attaching shader {} to replay program {}", replay_shader, replay),
                });
            }
        }

        // Without a link-time record, the best we can do is link whatever
        // was attached, which the caller has restored already.
        if self.link_time_snapshot.is_none() && self.link_status && !self.attached_shaders.is_empty() {
            cx.gl.link_program(replay);
            if !cx.check_error("glLinkProgram") {
                linked = cx.gl.get_program_iv(replay, enums::LINK_STATUS) != 0;
            }
        }

        Ok(linked)
    }

    fn restore_uniforms(
        &self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        replay: GLuint,
        report: &mut RestoreReport,
    ) {
        let gl = cx.gl;

        let count = gl.get_program_iv(replay, enums::ACTIVE_UNIFORMS).max(0) as GLuint;
        let replay_uniforms: Vec<(GLint, GLenum, String, GLint)> = (0..count)
            .map(|i| {
                let (size, type_, name) = gl.get_active_uniform(replay, i);
                let location = if is_builtin(&name) {
                    -1
                } else {
                    gl.get_uniform_location(replay, &name)
                };
                (size, type_, name, location)
            })
            .collect();
        cx.check_error("replay uniform queries");

        for trace in &self.uniforms {
            if is_builtin(&trace.name) || trace.base_location < 0 || trace.data.is_empty() {
                continue;
            }

            let (size, type_, location) = match replay_uniforms.iter().find(|u| u.2 == trace.name) {
                Some(&(size, type_, _, location)) => (size, type_, location),
                None => {
                    report.warn(format!(
                        "uniform {:?} not found: trace program {}, replay program {}",
                        trace.name, self.snapshot_handle, replay
                    ));
                    continue;
                }
            };
            if location < 0 {
                report.warn(format!(
                    "uniform {:?} has no location: trace program {}, replay program {}",
                    trace.name, self.snapshot_handle, replay
                ));
                continue;
            }
            if type_ != trace.type_ {
                report.warn(format!(
                    "uniform {:?} has type {} in the trace but {} on replay, skipping it: trace program {}, replay program {}",
                    trace.name,
                    cx.enums.name(trace.type_, None),
                    cx.enums.name(type_, None),
                    self.snapshot_handle,
                    replay
                ));
                continue;
            }
            let info = match uniform_type_info(type_) {
                Some(info) => info,
                None => {
                    report.warn(format!("uniform {:?} has unknown type 0x{:04X}", trace.name, type_));
                    continue;
                }
            };
            if size != trace.size {
                report.warn(format!(
                    "uniform {:?} has array size {} in the trace but {} on replay, setting {} elements: trace program {}, replay program {}",
                    trace.name,
                    trace.size,
                    size,
                    size.min(trace.size),
                    self.snapshot_handle,
                    replay
                ));
            }

            let elements = size.min(trace.size).max(0);
            for i in 0..elements {
                remapper.declare_location(self.snapshot_handle, replay, trace.base_location + i, location + i);
            }
            if elements == 0 {
                continue;
            }

            let words = (elements as usize * info.size_in_glints() as usize).min(trace.data.len());
            write_uniform(cx, location, info, &trace.data[..words]);
            if cx.check_error("glUniform") {
                report.warn(format!(
                    "GL error restoring uniform {:?} of type {}: trace program {}, replay program {}",
                    trace.name,
                    cx.enums.name(trace.type_, None),
                    self.snapshot_handle,
                    replay
                ));
            }
        }
    }

    fn restore_uniform_blocks(&self, cx: &GlContext, replay: GLuint, report: &mut RestoreReport) {
        let gl = cx.gl;

        if !cx.info.is_version_at_least(3, 1) {
            if !self.uniform_blocks.is_empty() {
                report.warn(format!(
                    "trace program {} has {} uniform blocks, but this context doesn't support them",
                    self.snapshot_handle,
                    self.uniform_blocks.len()
                ));
            }
            return;
        }

        for block in &self.uniform_blocks {
            if block.name.is_empty() {
                report.warn(format!(
                    "trace program {} has a uniform block with no name",
                    self.snapshot_handle
                ));
                continue;
            }

            let index = gl.get_uniform_block_index(replay, &block.name);
            if cx.check_error("glGetUniformBlockIndex") || index == INVALID_INDEX {
                report.warn(format!(
                    "uniform block {:?} not found: trace program {}, replay program {}",
                    block.name, self.snapshot_handle, replay
                ));
                continue;
            }
            if index != block.block_index {
                report.warn(format!(
                    "uniform block {:?} has index {} on replay but {} in the trace; block indices are not remapped: trace program {}, replay program {}",
                    block.name, index, block.block_index, self.snapshot_handle, replay
                ));
            }

            gl.uniform_block_binding(replay, index, block.binding_point as GLuint);
            if cx.check_error("glUniformBlockBinding") {
                report.warn(format!(
                    "failed restoring uniform block {:?}'s binding point {}: trace program {}, replay program {}",
                    block.name, block.binding_point, self.snapshot_handle, replay
                ));
                continue;
            }

            let data_size = gl.get_active_uniform_block_i(replay, index, enums::UNIFORM_BLOCK_DATA_SIZE);
            let active_uniforms = gl.get_active_uniform_block_i(replay, index, enums::UNIFORM_BLOCK_ACTIVE_UNIFORMS);
            cx.check_error("glGetActiveUniformBlockiv");
            if data_size != block.data_size {
                report.warn(format!(
                    "uniform block {:?} has data size {} on replay but {} in the trace: trace program {}, replay program {}",
                    block.name, data_size, block.data_size, self.snapshot_handle, replay
                ));
            }
            if active_uniforms != block.active_uniforms {
                report.warn(format!(
                    "uniform block {:?} has {} active uniforms on replay but {} in the trace: trace program {}, replay program {}",
                    block.name, active_uniforms, block.active_uniforms, self.snapshot_handle, replay
                ));
            }
        }
    }

    /// The link status the trace recorded for the link being restored.
    fn recorded_link_status(&self) -> bool {
        match &self.link_time_snapshot {
            Some(snapshot) => snapshot.link_status,
            None => self.link_status,
        }
    }

    fn restore_into(
        &self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        replay: GLuint,
        report: &mut RestoreReport,
    ) -> Result<(), StateError> {
        let gl = cx.gl;

        let linked = if self.link_entrypoint == LinkEntrypoint::CreateShaderProgramv {
            gl.get_program_iv(replay, enums::LINK_STATUS) != 0
        } else {
            self.link_program(cx, remapper, replay, report)?
        };

        match (linked, self.recorded_link_status()) {
            (false, true) => {
                return Err(StateError::LinkFailed {
                    trace: self.snapshot_handle,
                    info_log: gl.get_program_info_log(replay),
                });
            }
            (false, false) => {
                tracing::debug!(
                    "trace program {} failed to link on replay (program {}), as it did in the trace",
                    self.snapshot_handle,
                    replay
                );
            }
            (true, false) => {
                report.warn(format!(
                    "trace program {} linked on replay (program {}), but failed to link in the trace",
                    self.snapshot_handle, replay
                ));
            }
            (true, true) => {}
        }

        if linked {
            gl.use_program(replay);
            if cx.check_error("glUseProgram") {
                return Err(StateError::Gl {
                    object: GlObjectStateType::Program,
                    handle: self.snapshot_handle,
                    what: "glUseProgram".to_string(),
                });
            }
            self.restore_uniforms(cx, remapper, replay, report);
            self.restore_uniform_blocks(cx, replay, report);
        }

        Ok(())
    }

    fn serialize_uniform(&self, uniform: &ProgramUniform, enums: &GlEnumTable) -> Value {
        let data = match uniform_type_info(uniform.type_) {
            Some(info) => uniform_data_to_json(info, &uniform.data),
            None => Vec::new(),
        };
        json!({
            "name": uniform.name,
            "type": doc::enum_value(enums, uniform.type_),
            "size": uniform.size,
            "base_location": uniform.base_location,
            "uniform_data": data,
        })
    }

    fn deserialize_uniform(&self, obj: &doc::Object, enums: &GlEnumTable) -> Result<ProgramUniform, DocError> {
        let mut uniform = ProgramUniform {
            name: doc::get_str(obj, "name")?.to_string(),
            type_: doc::get_enum(obj, "type", enums)?,
            size: doc::get_i32(obj, "size")?,
            base_location: doc::opt(obj, "base_location", -1, doc::get_i32)?,
            data: Vec::new(),
        };

        let values = doc::opt(obj, "uniform_data", &[][..], |o, k| doc::get_array(o, k).map(|a| &a[..]))?;
        if values.is_empty() {
            return Ok(uniform);
        }
        let info = match uniform_type_info(uniform.type_) {
            Some(info) => info,
            None => {
                tracing::warn!(
                    "trace program {}: uniform {:?} has unknown type 0x{:04X}, dropping its value",
                    self.snapshot_handle,
                    uniform.name,
                    uniform.type_
                );
                return Ok(uniform);
            }
        };
        let expected = uniform.size.max(0) as usize * info.components() as usize;
        if values.len() != expected {
            tracing::warn!(
                "trace program {}: uniform {:?} has {} values, expected {}; dropping its value",
                self.snapshot_handle,
                uniform.name,
                values.len(),
                expected
            );
            return Ok(uniform);
        }
        uniform_data_from_json(info, values, &mut uniform.data)?;
        Ok(uniform)
    }

    fn deserialize_inner(&mut self, node: &Value, enums: &GlEnumTable, blobs: &dyn BlobManager) -> Result<(), DocError> {
        let obj = doc::as_object(node)?;

        self.snapshot_handle = doc::get_u32(obj, "handle")?;
        self.link_entrypoint = LinkEntrypoint::parse(doc::opt(obj, "link_entrypoint", "", doc::get_str)?)?;
        self.link_snapshot = doc::opt(obj, "link_snapshot", false, doc::get_bool)?;
        self.link_status = doc::get_bool(obj, "link_status")?;
        self.separable = doc::opt(obj, "separable", false, doc::get_bool)?;
        self.verify_status = doc::opt(obj, "verify_status", false, doc::get_bool)?;
        self.marked_for_deletion = doc::opt(obj, "marked_for_deletion", false, doc::get_bool)?;
        self.num_active_attribs = doc::opt(obj, "num_active_attribs", 0, doc::get_u32)?;
        self.num_active_uniforms = doc::opt(obj, "num_active_uniforms", 0, doc::get_u32)?;
        self.num_active_uniform_blocks = doc::opt(obj, "num_active_uniform_blocks", 0, doc::get_u32)?;
        self.info_log = doc::opt(obj, "info_log", "", doc::get_str)?.to_string();

        self.create_shader_program_type =
            doc::opt(obj, "create_shader_program_type", enums::NONE, |o, k| doc::get_enum(o, k, enums))?;
        if obj.contains_key("create_shader_program_strings") {
            self.create_shader_program_strings = doc::get_array(obj, "create_shader_program_strings")?
                .iter()
                .map(|s| {
                    s.as_str().map(str::to_string).ok_or_else(|| DocError::WrongType {
                        key: "create_shader_program_strings".to_string(),
                        expected: "an array of strings",
                    })
                })
                .collect::<Result<_, _>>()?;
        }

        self.program_binary_format = doc::opt(obj, "program_binary_format", enums::NONE, doc::get_u32)?;
        if obj.contains_key("program_binary") {
            let id = doc::get_str(obj, "program_binary")?;
            match blobs.get(id) {
                Ok(data) => self.program_binary = data,
                Err(err) => {
                    tracing::warn!("trace program {}: can't load program binary: {}", self.snapshot_handle, err);
                }
            }
        }

        if obj.contains_key("attached_shaders") {
            self.attached_shaders = doc::get_array(obj, "attached_shaders")?
                .iter()
                .map(|h| {
                    h.as_u64()
                        .filter(|&h| h <= u64::from(u32::MAX))
                        .map(|h| h as GLuint)
                        .ok_or_else(|| DocError::WrongType {
                            key: "attached_shaders".to_string(),
                            expected: "an array of handles",
                        })
                })
                .collect::<Result<_, _>>()?;
        }

        if obj.contains_key("shader_objects") {
            for node in doc::get_array(obj, "shader_objects")? {
                let mut shader = ShaderState::new();
                shader.deserialize(node, enums, blobs)?;
                self.shaders.push(shader);
            }
        }

        if obj.contains_key("active_attribs") {
            for node in doc::get_array(obj, "active_attribs")? {
                let attrib = doc::as_object(node)?;
                self.attribs.push(ProgramAttrib {
                    name: doc::get_str(attrib, "name")?.to_string(),
                    type_: doc::get_enum(attrib, "type", enums)?,
                    size: doc::get_i32(attrib, "size")?,
                    bound_location: doc::opt(attrib, "location", -1, doc::get_i32)?,
                });
            }
        }

        if obj.contains_key("active_uniforms") {
            for node in doc::get_array(obj, "active_uniforms")? {
                let uniform = self.deserialize_uniform(doc::as_object(node)?, enums)?;
                self.uniforms.push(uniform);
            }
        }

        if obj.contains_key("active_uniform_blocks") {
            for node in doc::get_array(obj, "active_uniform_blocks")? {
                let block = doc::as_object(node)?;
                self.uniform_blocks.push(UniformBlock {
                    block_index: doc::get_u32(block, "block_index")?,
                    name: doc::get_str(block, "name")?.to_string(),
                    binding_point: doc::get_i32(block, "binding_point")?,
                    data_size: doc::opt(block, "data_size", 0, doc::get_i32)?,
                    active_uniforms: doc::opt(block, "active_uniforms", 0, doc::get_i32)?,
                    referenced_by: doc::opt(block, "referenced_by", 0, doc::get_u32)?,
                });
            }
        }

        if obj.contains_key("outputs") {
            for node in doc::get_array(obj, "outputs")? {
                let output = doc::as_object(node)?;
                self.outputs.push(ProgramOutput {
                    name: doc::get_str(output, "name")?.to_string(),
                    location: doc::get_i32(output, "location")?,
                    location_index: doc::opt(output, "location_index", 0, doc::get_i32)?,
                    type_: doc::opt(output, "type", enums::NONE, |o, k| doc::get_enum(o, k, enums))?,
                    array_size: doc::opt(output, "array_size", 0, doc::get_i32)?,
                    is_per_patch: doc::opt(output, "is_per_patch", false, doc::get_bool)?,
                });
            }
        }

        self.transform_feedback_mode =
            doc::opt(obj, "transform_feedback_mode", enums::NONE, |o, k| doc::get_enum(o, k, enums))?;
        let num_varyings = doc::opt(obj, "transform_feedback_num_varyings", 0, doc::get_u32)?;
        if num_varyings > 0 {
            if obj.contains_key("transform_feedback_varyings") {
                for node in doc::get_array(obj, "transform_feedback_varyings")? {
                    let varying = doc::as_object(node)?;
                    self.varyings.push(TransformFeedbackVarying {
                        index: doc::get_i32(varying, "index")?,
                        name: doc::get_str(varying, "name")?.to_string(),
                        size: doc::get_i32(varying, "size")?,
                        type_: doc::get_enum(varying, "type", enums)?,
                    });
                }
            } else {
                tracing::warn!(
                    "trace program {}: transform_feedback_num_varyings is {}, but there is no transform_feedback_varyings array",
                    self.snapshot_handle,
                    num_varyings
                );
                self.transform_feedback_mode = enums::NONE;
            }
        }

        if obj.contains_key("link_time_snapshot") {
            let mut snapshot = ProgramState::new();
            snapshot.deserialize(doc::require_value(obj, "link_time_snapshot")?, enums, blobs)?;
            self.link_time_snapshot = Some(Box::new(snapshot));
        }

        self.is_valid = true;
        Ok(())
    }
}

impl GlObjectState for ProgramState {
    fn object_type(&self) -> GlObjectStateType {
        GlObjectStateType::Program
    }

    fn snapshot_handle(&self) -> GLuint {
        self.snapshot_handle
    }

    fn is_valid(&self) -> bool {
        self.is_valid
    }

    fn clear(&mut self) {
        *self = ProgramState::default();
    }

    fn snapshot(
        &mut self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        handle: GLuint,
        _target: GLenum,
    ) -> Result<(), StateError> {
        cx.check_error("before program snapshot");
        self.clear();
        self.snapshot_handle = handle;

        if let Err(err) = self.snapshot_current(cx, remapper) {
            self.clear();
            return Err(err);
        }

        self.link_snapshot = false;
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
            return Err(StateError::NotValid(GlObjectStateType::Program));
        }
        cx.check_error("before program restore");

        let gl = cx.gl;
        let _saved = ScopedBindingState::new(gl, &[enums::PROGRAM]);

        let mut created = false;
        if *handle == 0 {
            let new_handle = if self.link_entrypoint == LinkEntrypoint::CreateShaderProgramv {
                let strings: Vec<&str> = self.create_shader_program_strings.iter().map(String::as_str).collect();
                gl.create_shader_program_v(self.create_shader_program_type, &strings)
            } else {
                gl.create_program()
            };
            if cx.check_error("creating program") || new_handle == 0 {
                return Err(StateError::CreateFailed {
                    object: GlObjectStateType::Program,
                    trace: self.snapshot_handle,
                });
            }
            remapper.declare(ProgramHandle(self.snapshot_handle), ProgramHandle(new_handle), enums::NONE);
            *handle = new_handle;
            created = true;
        }

        let mut report = RestoreReport::default();
        match self.restore_into(cx, remapper, *handle, &mut report) {
            Ok(()) => {
                if report.warning_count() > 0 {
                    tracing::warn!(
                        "trace program {} was restored as program {} with {} warnings; the replay may diverge",
                        self.snapshot_handle,
                        *handle,
                        report.warning_count()
                    );
                }
                Ok(report)
            }
            Err(err) => {
                tracing::error!(
                    "failed restoring trace program {} as program {}: {}",
                    self.snapshot_handle,
                    *handle,
                    err
                );
                if created {
                    gl.use_program(0);
                    cx.check_error("glUseProgram(0)");
                    remapper.delete(gl, ProgramHandle(self.snapshot_handle), ProgramHandle(*handle));
                    *handle = 0;
                }
                Err(err)
            }
        }
    }

    fn remap_handles(&mut self, remapper: &dyn HandleRemapper) -> Result<(), StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::Program));
        }

        // Locations are keyed by the handle before remapping.
        let source_handle = self.snapshot_handle;
        self.snapshot_handle = remapper.remap(ProgramHandle(source_handle)).0;

        if self.link_snapshot {
            // These shaders may be long gone; remap the ones that aren't.
            for shader in &mut self.shaders {
                let handle = shader.snapshot_handle();
                if shader.is_valid() && remapper.is_valid_handle(crate::handle::Namespace::Shaders, handle) {
                    shader.set_snapshot_handle(remapper.remap(ShaderHandle(handle)).0);
                }
            }
        } else {
            for shader in &mut self.attached_shaders {
                *shader = remapper.remap(ShaderHandle(*shader)).0;
            }
        }

        for uniform in &mut self.uniforms {
            if uniform.base_location >= 0 {
                uniform.base_location = remapper.remap_location(source_handle, uniform.base_location);
            }
        }

        if let Some(snapshot) = &mut self.link_time_snapshot {
            snapshot.remap_handles(remapper)?;
        }
        Ok(())
    }

    fn serialize(&self, enums: &GlEnumTable, blobs: &mut dyn BlobManager) -> Result<Value, StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::Program));
        }

        let mut node = Map::new();
        let mut put = |key: &str, value: Value| {
            node.insert(key.to_string(), value);
        };

        put("version", json!(PROGRAM_STATE_VERSION));
        put("link_entrypoint", json!(self.link_entrypoint.as_str()));
        put("handle", json!(self.snapshot_handle));
        put("link_snapshot", json!(self.link_snapshot));
        put("link_status", json!(self.link_status));
        put("separable", json!(self.separable));
        put("verify_status", json!(self.verify_status));
        put("marked_for_deletion", json!(self.marked_for_deletion));
        put("num_active_attribs", json!(self.num_active_attribs));
        put("num_active_uniforms", json!(self.num_active_uniforms));
        put("num_active_uniform_blocks", json!(self.num_active_uniform_blocks));
        put("info_log", json!(self.info_log));
        put(
            "create_shader_program_type",
            doc::enum_value(enums, self.create_shader_program_type),
        );
        put(
            "create_shader_program_strings",
            json!(self.create_shader_program_strings),
        );
        put("program_binary_format", json!(self.program_binary_format));

        if !self.program_binary.is_empty() {
            let id = blobs.add_buf_compute_unique_id(&self.program_binary, "program_binary", "bin")?;
            put("program_binary", json!(id));
        }

        if !self.attached_shaders.is_empty() {
            put("attached_shaders", json!(self.attached_shaders));
        }

        if !self.shaders.is_empty() {
            let shaders = self
                .shaders
                .iter()
                .map(|shader| shader.serialize(enums, blobs))
                .collect::<Result<Vec<_>, _>>()?;
            put("shader_objects", Value::Array(shaders));
        }

        if !self.attribs.is_empty() {
            let attribs = self
                .attribs
                .iter()
                .map(|attrib| {
                    json!({
                        "name": attrib.name,
                        "type": doc::enum_value(enums, attrib.type_),
                        "size": attrib.size,
                        "location": attrib.bound_location,
                    })
                })
                .collect();
            put("active_attribs", Value::Array(attribs));
        }

        if !self.uniforms.is_empty() {
            let uniforms = self.uniforms.iter().map(|u| self.serialize_uniform(u, enums)).collect();
            put("active_uniforms", Value::Array(uniforms));
        }

        if !self.uniform_blocks.is_empty() {
            let blocks = self
                .uniform_blocks
                .iter()
                .map(|block| {
                    json!({
                        "block_index": block.block_index,
                        "name": block.name,
                        "binding_point": block.binding_point,
                        "data_size": block.data_size,
                        "active_uniforms": block.active_uniforms,
                        "referenced_by": block.referenced_by,
                    })
                })
                .collect();
            put("active_uniform_blocks", Value::Array(blocks));
        }

        if !self.outputs.is_empty() {
            let outputs = self
                .outputs
                .iter()
                .enumerate()
                .map(|(i, output)| {
                    json!({
                        "index": i,
                        "name": output.name,
                        "location": output.location,
                        "location_index": output.location_index,
                        "type": doc::enum_value(enums, output.type_),
                        "array_size": output.array_size,
                        "is_per_patch": output.is_per_patch,
                    })
                })
                .collect();
            put("outputs", Value::Array(outputs));
        }

        put(
            "transform_feedback_mode",
            doc::enum_value(enums, self.transform_feedback_mode),
        );
        put("transform_feedback_num_varyings", json!(self.varyings.len()));
        if !self.varyings.is_empty() {
            let varyings = self
                .varyings
                .iter()
                .map(|varying| {
                    json!({
                        "index": varying.index,
                        "name": varying.name,
                        "size": varying.size,
                        "type": doc::enum_value(enums, varying.type_),
                    })
                })
                .collect();
            put("transform_feedback_varyings", Value::Array(varyings));
        }

        if let Some(snapshot) = &self.link_time_snapshot {
            let snapshot = snapshot.serialize(enums, blobs)?;
            put("link_time_snapshot", snapshot);
        }

        Ok(Value::Object(node))
    }

    fn deserialize(&mut self, node: &Value, enums: &GlEnumTable, blobs: &dyn BlobManager) -> Result<(), DocError> {
        self.clear();
        let mut state = ProgramState::new();
        state.deserialize_inner(node, enums, blobs)?;
        *self = state;
        Ok(())
    }

    fn compare_restorable_state(&self, other: &dyn GlObjectState) -> bool {
        if !self.is_valid || !other.is_valid() {
            return false;
        }
        let other = match other.as_any().downcast_ref::<ProgramState>() {
            Some(other) => other,
            None => return false,
        };

        let same_shaders = self.shaders.len() == other.shaders.len()
            && self
                .shaders
                .iter()
                .zip(&other.shaders)
                .all(|(a, b)| a.compare_restorable_state(b));

        let same_link_time_snapshot = match (&self.link_time_snapshot, &other.link_time_snapshot) {
            (None, None) => true,
            (Some(a), Some(b)) => a.compare_restorable_state(&**b),
            _ => false,
        };

        self.link_entrypoint == other.link_entrypoint
            && self.link_snapshot == other.link_snapshot
            && self.link_status == other.link_status
            && self.separable == other.separable
            && self.create_shader_program_type == other.create_shader_program_type
            && self.create_shader_program_strings == other.create_shader_program_strings
            && self.program_binary == other.program_binary
            && self.program_binary_format == other.program_binary_format
            && self.attached_shaders == other.attached_shaders
            && self.attribs == other.attribs
            && self.uniforms == other.uniforms
            && self.uniform_blocks == other.uniform_blocks
            && self.outputs == other.outputs
            && self.transform_feedback_mode == other.transform_feedback_mode
            && self.varyings == other.varyings
            && same_shaders
            && same_link_time_snapshot
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
