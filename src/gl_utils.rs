//! Query helpers, the uniform type table, and binding save/restore.

use gleam::gl::{GLenum, GLint, GLuint};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::context_info::ContextInfo;
use crate::enums::{self, GlEnumTable};
use crate::gl_api::GlApi;
use crate::handle::Namespace;

static GL_GET_ERROR_ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn on `glGetError` polling after GL calls. This is the default.
pub fn enable_gl_get_error() {
    GL_GET_ERROR_ENABLED.store(true, Ordering::Relaxed);
}

/// Turn off `glGetError` polling. `check_gl_error` then always reports
/// success without touching the context.
pub fn disable_gl_get_error() {
    GL_GET_ERROR_ENABLED.store(false, Ordering::Relaxed);
}

pub fn is_gl_get_error_enabled() -> bool {
    GL_GET_ERROR_ENABLED.load(Ordering::Relaxed)
}

// A context that has lost its mind can report errors forever.
const MAX_ERRORS_DRAINED: usize = 32;

/// Drain the GL error queue, logging each error. Returns true if any error
/// was pending. `what` names the operation just performed.
pub fn check_gl_error(gl: &dyn GlApi, enums: &GlEnumTable, what: &str) -> bool {
    if !is_gl_get_error_enabled() {
        return false;
    }

    let mut saw_error = false;
    for _ in 0..MAX_ERRORS_DRAINED {
        let error = gl.get_error();
        if error == enums::NO_ERROR {
            break;
        }
        tracing::error!("GL error {} after {}", enums.name(error, None), what);
        saw_error = true;
    }
    saw_error
}

pub fn get_gl_integer(gl: &dyn GlApi, pname: GLenum) -> GLint {
    gl.get_integer(pname)
}

pub fn get_gl_integer_indexed(gl: &dyn GlApi, pname: GLenum, index: GLuint) -> GLint {
    let mut result = [0];
    gl.get_integer_iv(pname, index, &mut result);
    result[0]
}

/// The scalar type a uniform's components are made of.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UniformBaseType {
    Float,
    Double,
    Int,
    UnsignedInt,
    Bool,
    Sampler,
    Image,
    AtomicCounter,
}

impl UniformBaseType {
    /// The GL enum conventionally used to name this base type.
    pub fn gl_enum(self) -> GLenum {
        match self {
            UniformBaseType::Float => enums::FLOAT,
            UniformBaseType::Double => enums::DOUBLE,
            UniformBaseType::Int => enums::INT,
            UniformBaseType::UnsignedInt | UniformBaseType::AtomicCounter => enums::UNSIGNED_INT,
            UniformBaseType::Bool => enums::BOOL,
            UniformBaseType::Sampler => enums::SAMPLER,
            UniformBaseType::Image => enums::IMAGE_1D,
        }
    }
}

/// The shape of a uniform type: `columns` is 1 for scalars and vectors, in
/// which case `rows` is the component count.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UniformTypeInfo {
    pub base: UniformBaseType,
    pub columns: u32,
    pub rows: u32,
}

impl UniformTypeInfo {
    pub fn components(&self) -> u32 {
        self.columns * self.rows
    }

    pub fn is_matrix(&self) -> bool {
        self.columns > 1
    }

    /// Doubles take two 32-bit words each.
    pub fn size_in_glints(&self) -> u32 {
        match self.base {
            UniformBaseType::Double => self.components() * 2,
            _ => self.components(),
        }
    }
}

macro_rules! uniform_types {
    ( $( $base:ident $cols:literal x $rows:literal : $( $ty:ident )|+ ; )* ) => {
        /// Look up a uniform type's shape. Returns `None` for types we don't
        /// know.
        pub fn uniform_type_info(ty: GLenum) -> Option<UniformTypeInfo> {
            match ty {
                $(
                    $( enums::$ty )|+ => Some(UniformTypeInfo {
                        base: UniformBaseType::$base,
                        columns: $cols,
                        rows: $rows,
                    }),
                )*
                _ => None,
            }
        }
    }
}

uniform_types! {
    Float 1 x 1: FLOAT;
    Float 1 x 2: FLOAT_VEC2;
    Float 1 x 3: FLOAT_VEC3;
    Float 1 x 4: FLOAT_VEC4;
    Float 2 x 2: FLOAT_MAT2;
    Float 3 x 3: FLOAT_MAT3;
    Float 4 x 4: FLOAT_MAT4;
    Float 2 x 3: FLOAT_MAT2x3;
    Float 2 x 4: FLOAT_MAT2x4;
    Float 3 x 2: FLOAT_MAT3x2;
    Float 3 x 4: FLOAT_MAT3x4;
    Float 4 x 2: FLOAT_MAT4x2;
    Float 4 x 3: FLOAT_MAT4x3;
    Double 1 x 1: DOUBLE;
    Double 1 x 2: DOUBLE_VEC2;
    Double 1 x 3: DOUBLE_VEC3;
    Double 1 x 4: DOUBLE_VEC4;
    Double 2 x 2: DOUBLE_MAT2;
    Double 3 x 3: DOUBLE_MAT3;
    Double 4 x 4: DOUBLE_MAT4;
    Double 2 x 3: DOUBLE_MAT2x3;
    Double 2 x 4: DOUBLE_MAT2x4;
    Double 3 x 2: DOUBLE_MAT3x2;
    Double 3 x 4: DOUBLE_MAT3x4;
    Double 4 x 2: DOUBLE_MAT4x2;
    Double 4 x 3: DOUBLE_MAT4x3;
    Int 1 x 1: INT;
    Int 1 x 2: INT_VEC2;
    Int 1 x 3: INT_VEC3;
    Int 1 x 4: INT_VEC4;
    UnsignedInt 1 x 1: UNSIGNED_INT;
    UnsignedInt 1 x 2: UNSIGNED_INT_VEC2;
    UnsignedInt 1 x 3: UNSIGNED_INT_VEC3;
    UnsignedInt 1 x 4: UNSIGNED_INT_VEC4;
    Bool 1 x 1: BOOL;
    Bool 1 x 2: BOOL_VEC2;
    Bool 1 x 3: BOOL_VEC3;
    Bool 1 x 4: BOOL_VEC4;
    AtomicCounter 1 x 1: UNSIGNED_INT_ATOMIC_COUNTER;
    Sampler 1 x 1:
        SAMPLER_1D | SAMPLER_2D | SAMPLER_3D | SAMPLER_CUBE | SAMPLER_1D_SHADOW
        | SAMPLER_2D_SHADOW | SAMPLER_2D_RECT | SAMPLER_2D_RECT_SHADOW | SAMPLER_1D_ARRAY
        | SAMPLER_2D_ARRAY | SAMPLER_BUFFER | SAMPLER_1D_ARRAY_SHADOW | SAMPLER_2D_ARRAY_SHADOW
        | SAMPLER_CUBE_SHADOW | INT_SAMPLER_1D | INT_SAMPLER_2D | INT_SAMPLER_3D
        | INT_SAMPLER_CUBE | INT_SAMPLER_2D_RECT | INT_SAMPLER_1D_ARRAY | INT_SAMPLER_2D_ARRAY
        | INT_SAMPLER_BUFFER | UNSIGNED_INT_SAMPLER_1D | UNSIGNED_INT_SAMPLER_2D
        | UNSIGNED_INT_SAMPLER_3D | UNSIGNED_INT_SAMPLER_CUBE | UNSIGNED_INT_SAMPLER_2D_RECT
        | UNSIGNED_INT_SAMPLER_1D_ARRAY | UNSIGNED_INT_SAMPLER_2D_ARRAY
        | UNSIGNED_INT_SAMPLER_BUFFER | SAMPLER_CUBE_MAP_ARRAY | SAMPLER_CUBE_MAP_ARRAY_SHADOW
        | INT_SAMPLER_CUBE_MAP_ARRAY | UNSIGNED_INT_SAMPLER_CUBE_MAP_ARRAY
        | SAMPLER_2D_MULTISAMPLE | INT_SAMPLER_2D_MULTISAMPLE
        | UNSIGNED_INT_SAMPLER_2D_MULTISAMPLE | SAMPLER_2D_MULTISAMPLE_ARRAY
        | INT_SAMPLER_2D_MULTISAMPLE_ARRAY | UNSIGNED_INT_SAMPLER_2D_MULTISAMPLE_ARRAY;
    Image 1 x 1:
        IMAGE_1D | IMAGE_2D | IMAGE_3D | IMAGE_2D_RECT | IMAGE_CUBE | IMAGE_BUFFER
        | IMAGE_1D_ARRAY | IMAGE_2D_ARRAY | IMAGE_CUBE_MAP_ARRAY | IMAGE_2D_MULTISAMPLE
        | IMAGE_2D_MULTISAMPLE_ARRAY | INT_IMAGE_1D | INT_IMAGE_2D | INT_IMAGE_3D
        | INT_IMAGE_2D_RECT | INT_IMAGE_CUBE | INT_IMAGE_BUFFER | INT_IMAGE_1D_ARRAY
        | INT_IMAGE_2D_ARRAY | INT_IMAGE_CUBE_MAP_ARRAY | INT_IMAGE_2D_MULTISAMPLE
        | INT_IMAGE_2D_MULTISAMPLE_ARRAY | UNSIGNED_INT_IMAGE_1D | UNSIGNED_INT_IMAGE_2D
        | UNSIGNED_INT_IMAGE_3D | UNSIGNED_INT_IMAGE_2D_RECT | UNSIGNED_INT_IMAGE_CUBE
        | UNSIGNED_INT_IMAGE_BUFFER | UNSIGNED_INT_IMAGE_1D_ARRAY | UNSIGNED_INT_IMAGE_2D_ARRAY
        | UNSIGNED_INT_IMAGE_CUBE_MAP_ARRAY | UNSIGNED_INT_IMAGE_2D_MULTISAMPLE
        | UNSIGNED_INT_IMAGE_2D_MULTISAMPLE_ARRAY;
}

/// The number of 32-bit words one element of a uniform of type `ty`
/// occupies, or 0 for unknown types.
pub fn uniform_size_in_glints(ty: GLenum) -> u32 {
    uniform_type_info(ty).map_or(0, |info| info.size_in_glints())
}

pub fn uniform_size_in_bytes(ty: GLenum) -> u32 {
    uniform_size_in_glints(ty) * 4
}

pub fn uniform_base_type(ty: GLenum) -> Option<UniformBaseType> {
    uniform_type_info(ty).map(|info| info.base)
}

macro_rules! bindings {
    ( $( $target:ident => $binding:ident, $ns:ident; )* ) => {
        /// The `glGet` pname that reports what is bound to `target`.
        pub fn binding_from_target(target: GLenum) -> Option<GLenum> {
            match target {
                $( enums::$target => Some(enums::$binding), )*
                _ => None,
            }
        }

        /// The inverse of `binding_from_target`.
        pub fn target_from_binding(binding: GLenum) -> Option<GLenum> {
            $(
                if binding == enums::$binding {
                    return Some(enums::$target);
                }
            )*
            None
        }

        /// Which kind of object binds to `target`.
        pub fn object_category_from_target(target: GLenum) -> Option<Namespace> {
            match target {
                $( enums::$target => Some(Namespace::$ns), )*
                _ => None,
            }
        }
    }
}

// `GL_FRAMEBUFFER` binds both the draw and read framebuffers; its query
// reports the draw binding.
bindings! {
    TEXTURE_1D => TEXTURE_BINDING_1D, Textures;
    TEXTURE_2D => TEXTURE_BINDING_2D, Textures;
    TEXTURE_3D => TEXTURE_BINDING_3D, Textures;
    TEXTURE_RECTANGLE => TEXTURE_BINDING_RECTANGLE, Textures;
    TEXTURE_CUBE_MAP => TEXTURE_BINDING_CUBE_MAP, Textures;
    TEXTURE_1D_ARRAY => TEXTURE_BINDING_1D_ARRAY, Textures;
    TEXTURE_2D_ARRAY => TEXTURE_BINDING_2D_ARRAY, Textures;
    TEXTURE_CUBE_MAP_ARRAY => TEXTURE_BINDING_CUBE_MAP_ARRAY, Textures;
    TEXTURE_2D_MULTISAMPLE => TEXTURE_BINDING_2D_MULTISAMPLE, Textures;
    TEXTURE_2D_MULTISAMPLE_ARRAY => TEXTURE_BINDING_2D_MULTISAMPLE_ARRAY, Textures;
    TEXTURE_BUFFER => TEXTURE_BINDING_BUFFER, Textures;
    DRAW_FRAMEBUFFER => DRAW_FRAMEBUFFER_BINDING, Framebuffers;
    READ_FRAMEBUFFER => READ_FRAMEBUFFER_BINDING, Framebuffers;
    FRAMEBUFFER => DRAW_FRAMEBUFFER_BINDING, Framebuffers;
    RENDERBUFFER => RENDERBUFFER_BINDING, RenderBuffers;
    ARRAY_BUFFER => ARRAY_BUFFER_BINDING, Buffers;
    ELEMENT_ARRAY_BUFFER => ELEMENT_ARRAY_BUFFER_BINDING, Buffers;
    PIXEL_PACK_BUFFER => PIXEL_PACK_BUFFER_BINDING, Buffers;
    PIXEL_UNPACK_BUFFER => PIXEL_UNPACK_BUFFER_BINDING, Buffers;
    COPY_READ_BUFFER => COPY_READ_BUFFER, Buffers;
    COPY_WRITE_BUFFER => COPY_WRITE_BUFFER, Buffers;
    UNIFORM_BUFFER => UNIFORM_BUFFER_BINDING, Buffers;
    TRANSFORM_FEEDBACK_BUFFER => TRANSFORM_FEEDBACK_BUFFER_BINDING, Buffers;
    VERTEX_ARRAY => VERTEX_ARRAY_BINDING, VertexArrays;
    PROGRAM => CURRENT_PROGRAM, Programs;
    PROGRAM_PIPELINE => PROGRAM_PIPELINE_BINDING, Pipelines;
    SAMPLER => SAMPLER_BINDING, Samplers;
}

/// Bind `handle` to `target`, using whichever entry point fits the target.
/// Returns false for targets we don't know how to bind.
pub fn bind_object(gl: &dyn GlApi, target: GLenum, handle: GLuint) -> bool {
    let category = match object_category_from_target(target) {
        Some(category) => category,
        None => return false,
    };

    match category {
        Namespace::Textures => gl.bind_texture(target, handle),
        Namespace::Framebuffers => gl.bind_framebuffer(target, handle),
        Namespace::RenderBuffers => gl.bind_renderbuffer(target, handle),
        Namespace::Buffers => gl.bind_buffer(target, handle),
        Namespace::VertexArrays => gl.bind_vertex_array(handle),
        Namespace::Programs => gl.use_program(handle),
        Namespace::Pipelines => gl.bind_program_pipeline(handle),
        Namespace::Samplers => {
            let unit = gl.get_integer(enums::ACTIVE_TEXTURE) as GLenum;
            gl.bind_sampler(unit.saturating_sub(enums::TEXTURE0), handle);
        }
        _ => return false,
    }
    true
}

/// What is currently bound to `target`, or 0 for unknown targets.
pub fn get_bound_object(gl: &dyn GlApi, target: GLenum) -> GLuint {
    match binding_from_target(target) {
        Some(binding) => gl.get_integer(binding) as GLuint,
        None => 0,
    }
}

/// Delete the GL object `handle` in `namespace`. Handle 0 is ignored.
pub fn delete_gl_object(gl: &dyn GlApi, namespace: Namespace, handle: GLuint) {
    if handle == 0 {
        return;
    }

    match namespace {
        Namespace::Framebuffers => gl.delete_framebuffers(&[handle]),
        Namespace::Textures => gl.delete_textures(&[handle]),
        Namespace::RenderBuffers => gl.delete_renderbuffers(&[handle]),
        Namespace::Queries => gl.delete_queries(&[handle]),
        Namespace::Samplers => gl.delete_samplers(&[handle]),
        Namespace::Programs => gl.delete_program(handle),
        Namespace::VertexArrays => gl.delete_vertex_arrays(&[handle]),
        Namespace::Lists => gl.delete_lists(handle, 1),
        Namespace::Pipelines => gl.delete_program_pipelines(&[handle]),
        Namespace::Shaders => gl.delete_shader(handle),
        Namespace::Buffers => gl.delete_buffers(&[handle]),
        Namespace::Feedbacks => gl.delete_transform_feedbacks(&[handle]),
        other => {
            tracing::warn!("don't know how to delete GL objects in namespace {}, handle {}", other, handle);
        }
    }
}

/// Apply a list of draw buffers with the fewest calls that reproduce it:
/// trailing `GL_NONE` entries are dropped, an empty list becomes
/// `glDrawBuffer(GL_NONE)`, and a single entry uses `glDrawBuffer`.
pub fn restore_draw_buffers(gl: &dyn GlApi, draw_buffers: &[GLenum]) {
    let len = draw_buffers
        .iter()
        .rposition(|&buf| buf != enums::NONE)
        .map_or(0, |last| last + 1);

    match &draw_buffers[..len] {
        [] => gl.draw_buffer(enums::NONE),
        [only] => gl.draw_buffer(*only),
        bufs => gl.draw_buffers(bufs),
    }
}

const BUFFER_TARGETS: &[GLenum] = &[
    enums::ARRAY_BUFFER,
    enums::ELEMENT_ARRAY_BUFFER,
    enums::PIXEL_PACK_BUFFER,
    enums::PIXEL_UNPACK_BUFFER,
    enums::COPY_READ_BUFFER,
    enums::COPY_WRITE_BUFFER,
    enums::UNIFORM_BUFFER,
    enums::TRANSFORM_FEEDBACK_BUFFER,
];

/// Saves what is bound to a set of targets, and rebinds it when dropped.
pub struct ScopedBindingState<'a> {
    gl: &'a dyn GlApi,
    saved: Vec<(GLenum, GLuint)>,
}

impl<'a> ScopedBindingState<'a> {
    pub fn new(gl: &'a dyn GlApi, targets: &[GLenum]) -> ScopedBindingState<'a> {
        let mut state = ScopedBindingState {
            gl,
            saved: Vec::with_capacity(targets.len()),
        };
        for &target in targets {
            state.save(target);
        }
        state
    }

    pub fn save(&mut self, target: GLenum) {
        if binding_from_target(target).is_none() {
            tracing::warn!("can't save binding for unknown target 0x{:04X}", target);
            return;
        }
        let handle = get_bound_object(self.gl, target);
        self.saved.push((target, handle));
    }

    /// Also save every buffer binding point.
    pub fn save_buffers(&mut self) {
        for &target in BUFFER_TARGETS {
            self.save(target);
        }
    }
}

impl<'a> Drop for ScopedBindingState<'a> {
    fn drop(&mut self) {
        for &(target, handle) in &self.saved {
            bind_object(self.gl, target, handle);
        }
    }
}

/// A piece of context state `ScopedStateSaver` can preserve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SavedState {
    PixelStore,
    ReadBuffer,
    DrawBuffers,
    ActiveTexture,
    MatrixMode,
}

const PIXEL_STORE_PNAMES: &[GLenum] = &[
    enums::UNPACK_SWAP_BYTES,
    enums::UNPACK_LSB_FIRST,
    enums::UNPACK_ROW_LENGTH,
    enums::UNPACK_SKIP_ROWS,
    enums::UNPACK_SKIP_PIXELS,
    enums::UNPACK_ALIGNMENT,
    enums::UNPACK_SKIP_IMAGES,
    enums::UNPACK_IMAGE_HEIGHT,
    enums::PACK_SWAP_BYTES,
    enums::PACK_LSB_FIRST,
    enums::PACK_ROW_LENGTH,
    enums::PACK_SKIP_ROWS,
    enums::PACK_SKIP_PIXELS,
    enums::PACK_ALIGNMENT,
    enums::PACK_SKIP_IMAGES,
    enums::PACK_IMAGE_HEIGHT,
];

enum Saved {
    PixelStore(Vec<(GLenum, GLint)>),
    ReadBuffer(GLenum),
    DrawBuffers(Vec<GLenum>),
    ActiveTexture(GLenum),
    MatrixMode(GLenum),
}

/// Saves assorted non-binding context state, and puts it back when dropped.
pub struct ScopedStateSaver<'a> {
    gl: &'a dyn GlApi,
    saved: Vec<Saved>,
}

impl<'a> ScopedStateSaver<'a> {
    pub fn new(gl: &'a dyn GlApi, info: &ContextInfo, what: &[SavedState]) -> ScopedStateSaver<'a> {
        let mut saved = Vec::with_capacity(what.len());

        for &state in what {
            match state {
                SavedState::PixelStore => {
                    let values = PIXEL_STORE_PNAMES
                        .iter()
                        .map(|&pname| (pname, gl.get_integer(pname)))
                        .collect();
                    saved.push(Saved::PixelStore(values));
                }
                SavedState::ReadBuffer => {
                    saved.push(Saved::ReadBuffer(gl.get_integer(enums::READ_BUFFER) as GLenum));
                }
                SavedState::DrawBuffers => {
                    let count = info.max_draw_buffers();
                    let bufs = (0..count)
                        .map(|i| gl.get_integer(enums::DRAW_BUFFER0 + i) as GLenum)
                        .collect();
                    saved.push(Saved::DrawBuffers(bufs));
                }
                SavedState::ActiveTexture => {
                    saved.push(Saved::ActiveTexture(gl.get_integer(enums::ACTIVE_TEXTURE) as GLenum));
                }
                SavedState::MatrixMode => {
                    // Fixed-function state doesn't exist in core profiles.
                    if info.is_compatibility_profile() {
                        saved.push(Saved::MatrixMode(gl.get_integer(enums::MATRIX_MODE) as GLenum));
                    }
                }
            }
        }

        ScopedStateSaver { gl, saved }
    }
}

impl<'a> Drop for ScopedStateSaver<'a> {
    fn drop(&mut self) {
        for saved in self.saved.iter().rev() {
            match saved {
                Saved::PixelStore(values) => {
                    for &(pname, value) in values {
                        self.gl.pixel_store_i(pname, value);
                    }
                }
                Saved::ReadBuffer(mode) => self.gl.read_buffer(*mode),
                Saved::DrawBuffers(bufs) => restore_draw_buffers(self.gl, bufs),
                Saved::ActiveTexture(unit) => self.gl.active_texture(*unit),
                Saved::MatrixMode(mode) => self.gl.matrix_mode(*mode),
            }
        }
    }
}
