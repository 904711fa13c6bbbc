//! GL enumerant values, and a name table for the ones this crate serializes.
//!
//! `gleam` only carries the enums of the GLES-ish subset WebRender uses, so
//! we keep our own list. Every enum is declared once in the `gl_enums!`
//! invocation below, which produces both the `pub const` and an entry in the
//! name table. When several names share a value, the first one listed wins
//! unless the caller asks for a particular prefix.

use gleam::gl::GLenum;

macro_rules! gl_enums {
    ( $( $name:ident = $value:expr, )* ) => {
        $(
            pub const $name: GLenum = $value;
        )*

        static ENUM_NAMES: &[(&str, GLenum)] = &[
            $( (concat!("GL_", stringify!($name)), $value), )*
        ];
    }
}

gl_enums! {
    NONE = 0x0000,
    NO_ERROR = 0x0000,

    // Errors.
    INVALID_ENUM = 0x0500,
    INVALID_VALUE = 0x0501,
    INVALID_OPERATION = 0x0502,
    STACK_OVERFLOW = 0x0503,
    STACK_UNDERFLOW = 0x0504,
    OUT_OF_MEMORY = 0x0505,
    INVALID_FRAMEBUFFER_OPERATION = 0x0506,

    // Window-system framebuffer buffers.
    FRONT_LEFT = 0x0400,
    FRONT_RIGHT = 0x0401,
    BACK_LEFT = 0x0402,
    BACK_RIGHT = 0x0403,
    FRONT = 0x0404,
    BACK = 0x0405,
    LEFT = 0x0406,
    RIGHT = 0x0407,
    FRONT_AND_BACK = 0x0408,
    COLOR = 0x1800,
    DEPTH = 0x1801,
    STENCIL = 0x1802,
    DRAW_BUFFER = 0x0C01,
    READ_BUFFER = 0x0C02,

    // Framebuffer objects.
    FRAMEBUFFER = 0x8D40,
    READ_FRAMEBUFFER = 0x8CA8,
    DRAW_FRAMEBUFFER = 0x8CA9,
    DRAW_FRAMEBUFFER_BINDING = 0x8CA6,
    FRAMEBUFFER_BINDING = 0x8CA6,
    READ_FRAMEBUFFER_BINDING = 0x8CAA,
    RENDERBUFFER = 0x8D41,
    RENDERBUFFER_BINDING = 0x8CA7,
    FRAMEBUFFER_COMPLETE = 0x8CD5,
    FRAMEBUFFER_INCOMPLETE_ATTACHMENT = 0x8CD6,
    FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT = 0x8CD7,
    FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER = 0x8CDB,
    FRAMEBUFFER_INCOMPLETE_READ_BUFFER = 0x8CDC,
    FRAMEBUFFER_UNSUPPORTED = 0x8CDD,
    FRAMEBUFFER_INCOMPLETE_MULTISAMPLE = 0x8D56,
    FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS = 0x8DA8,
    FRAMEBUFFER_UNDEFINED = 0x8219,
    MAX_COLOR_ATTACHMENTS = 0x8CDF,
    COLOR_ATTACHMENT0 = 0x8CE0,
    COLOR_ATTACHMENT1 = 0x8CE1,
    COLOR_ATTACHMENT2 = 0x8CE2,
    COLOR_ATTACHMENT3 = 0x8CE3,
    COLOR_ATTACHMENT4 = 0x8CE4,
    COLOR_ATTACHMENT5 = 0x8CE5,
    COLOR_ATTACHMENT6 = 0x8CE6,
    COLOR_ATTACHMENT7 = 0x8CE7,
    COLOR_ATTACHMENT8 = 0x8CE8,
    COLOR_ATTACHMENT9 = 0x8CE9,
    COLOR_ATTACHMENT10 = 0x8CEA,
    COLOR_ATTACHMENT11 = 0x8CEB,
    COLOR_ATTACHMENT12 = 0x8CEC,
    COLOR_ATTACHMENT13 = 0x8CED,
    COLOR_ATTACHMENT14 = 0x8CEE,
    COLOR_ATTACHMENT15 = 0x8CEF,
    DEPTH_ATTACHMENT = 0x8D00,
    STENCIL_ATTACHMENT = 0x8D20,
    DEPTH_STENCIL_ATTACHMENT = 0x821A,
    FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE = 0x8CD0,
    FRAMEBUFFER_ATTACHMENT_OBJECT_NAME = 0x8CD1,
    FRAMEBUFFER_ATTACHMENT_TEXTURE_LEVEL = 0x8CD2,
    FRAMEBUFFER_ATTACHMENT_TEXTURE_CUBE_MAP_FACE = 0x8CD3,
    FRAMEBUFFER_ATTACHMENT_TEXTURE_LAYER = 0x8CD4,
    FRAMEBUFFER_ATTACHMENT_COLOR_ENCODING = 0x8210,
    FRAMEBUFFER_ATTACHMENT_COMPONENT_TYPE = 0x8211,
    FRAMEBUFFER_ATTACHMENT_RED_SIZE = 0x8212,
    FRAMEBUFFER_ATTACHMENT_GREEN_SIZE = 0x8213,
    FRAMEBUFFER_ATTACHMENT_BLUE_SIZE = 0x8214,
    FRAMEBUFFER_ATTACHMENT_ALPHA_SIZE = 0x8215,
    FRAMEBUFFER_ATTACHMENT_DEPTH_SIZE = 0x8216,
    FRAMEBUFFER_ATTACHMENT_STENCIL_SIZE = 0x8217,
    FRAMEBUFFER_ATTACHMENT_LAYERED = 0x8DA7,
    FRAMEBUFFER_DEFAULT = 0x8218,
    MAX_DRAW_BUFFERS = 0x8824,
    DRAW_BUFFER0 = 0x8825,
    LINEAR = 0x2601,
    SRGB = 0x8C40,
    UNSIGNED_NORMALIZED = 0x8C17,
    SIGNED_NORMALIZED = 0x8F9C,

    // Textures.
    TEXTURE = 0x1702,
    TEXTURE_1D = 0x0DE0,
    TEXTURE_2D = 0x0DE1,
    TEXTURE_3D = 0x806F,
    TEXTURE_RECTANGLE = 0x84F5,
    TEXTURE_CUBE_MAP = 0x8513,
    TEXTURE_CUBE_MAP_POSITIVE_X = 0x8515,
    TEXTURE_CUBE_MAP_NEGATIVE_X = 0x8516,
    TEXTURE_CUBE_MAP_POSITIVE_Y = 0x8517,
    TEXTURE_CUBE_MAP_NEGATIVE_Y = 0x8518,
    TEXTURE_CUBE_MAP_POSITIVE_Z = 0x8519,
    TEXTURE_CUBE_MAP_NEGATIVE_Z = 0x851A,
    TEXTURE_1D_ARRAY = 0x8C18,
    TEXTURE_2D_ARRAY = 0x8C1A,
    TEXTURE_CUBE_MAP_ARRAY = 0x9009,
    TEXTURE_2D_MULTISAMPLE = 0x9100,
    TEXTURE_2D_MULTISAMPLE_ARRAY = 0x9102,
    TEXTURE_BUFFER = 0x8C2A,
    TEXTURE_BINDING_1D = 0x8068,
    TEXTURE_BINDING_2D = 0x8069,
    TEXTURE_BINDING_3D = 0x806A,
    TEXTURE_BINDING_RECTANGLE = 0x84F6,
    TEXTURE_BINDING_CUBE_MAP = 0x8514,
    TEXTURE_BINDING_1D_ARRAY = 0x8C1C,
    TEXTURE_BINDING_2D_ARRAY = 0x8C1D,
    TEXTURE_BINDING_CUBE_MAP_ARRAY = 0x900A,
    TEXTURE_BINDING_2D_MULTISAMPLE = 0x9104,
    TEXTURE_BINDING_2D_MULTISAMPLE_ARRAY = 0x9105,
    TEXTURE_BINDING_BUFFER = 0x8C2C,
    TEXTURE0 = 0x84C0,
    ACTIVE_TEXTURE = 0x84E0,
    CLIENT_ACTIVE_TEXTURE = 0x84E1,
    MATRIX_MODE = 0x0BA0,
    MODELVIEW = 0x1700,

    // Buffers and other bindable objects.
    ARRAY_BUFFER = 0x8892,
    ELEMENT_ARRAY_BUFFER = 0x8893,
    ARRAY_BUFFER_BINDING = 0x8894,
    ELEMENT_ARRAY_BUFFER_BINDING = 0x8895,
    PIXEL_PACK_BUFFER = 0x88EB,
    PIXEL_UNPACK_BUFFER = 0x88EC,
    PIXEL_PACK_BUFFER_BINDING = 0x88ED,
    PIXEL_UNPACK_BUFFER_BINDING = 0x88EF,
    COPY_READ_BUFFER = 0x8F36,
    COPY_WRITE_BUFFER = 0x8F37,
    UNIFORM_BUFFER = 0x8A11,
    UNIFORM_BUFFER_BINDING = 0x8A28,
    TRANSFORM_FEEDBACK_BUFFER = 0x8C8E,
    TRANSFORM_FEEDBACK_BUFFER_BINDING = 0x8C8F,
    VERTEX_ARRAY = 0x8074,
    VERTEX_ARRAY_BINDING = 0x85B5,
    PROGRAM = 0x82E2,
    CURRENT_PROGRAM = 0x8B8D,
    PROGRAM_PIPELINE = 0x82E4,
    PROGRAM_PIPELINE_BINDING = 0x825A,
    SAMPLER = 0x82E6,
    SAMPLER_BINDING = 0x8919,

    // Pixel store.
    UNPACK_SWAP_BYTES = 0x0CF0,
    UNPACK_LSB_FIRST = 0x0CF1,
    UNPACK_ROW_LENGTH = 0x0CF2,
    UNPACK_SKIP_ROWS = 0x0CF3,
    UNPACK_SKIP_PIXELS = 0x0CF4,
    UNPACK_ALIGNMENT = 0x0CF5,
    PACK_SWAP_BYTES = 0x0D00,
    PACK_LSB_FIRST = 0x0D01,
    PACK_ROW_LENGTH = 0x0D02,
    PACK_SKIP_ROWS = 0x0D03,
    PACK_SKIP_PIXELS = 0x0D04,
    PACK_ALIGNMENT = 0x0D05,
    PACK_SKIP_IMAGES = 0x806B,
    PACK_IMAGE_HEIGHT = 0x806C,
    UNPACK_SKIP_IMAGES = 0x806D,
    UNPACK_IMAGE_HEIGHT = 0x806E,

    // Context queries.
    VENDOR = 0x1F00,
    RENDERER = 0x1F01,
    VERSION = 0x1F02,
    EXTENSIONS = 0x1F03,
    SHADING_LANGUAGE_VERSION = 0x8B8C,
    MAJOR_VERSION = 0x821B,
    MINOR_VERSION = 0x821C,
    NUM_EXTENSIONS = 0x821D,
    CONTEXT_FLAGS = 0x821E,
    CONTEXT_PROFILE_MASK = 0x9126,
    MAX_VERTEX_ATTRIBS = 0x8869,
    MAX_UNIFORM_BUFFER_BINDINGS = 0x8A2F,
    MAX_TRANSFORM_FEEDBACK_SEPARATE_ATTRIBS = 0x8C8B,
    MAX_TEXTURE_UNITS = 0x84E2,
    MAX_COMBINED_TEXTURE_IMAGE_UNITS = 0x8B4D,

    // Shaders and programs.
    FRAGMENT_SHADER = 0x8B30,
    VERTEX_SHADER = 0x8B31,
    GEOMETRY_SHADER = 0x8DD9,
    TESS_EVALUATION_SHADER = 0x8E87,
    TESS_CONTROL_SHADER = 0x8E88,
    COMPUTE_SHADER = 0x91B9,
    SHADER_TYPE = 0x8B4F,
    DELETE_STATUS = 0x8B80,
    COMPILE_STATUS = 0x8B81,
    LINK_STATUS = 0x8B82,
    VALIDATE_STATUS = 0x8B83,
    INFO_LOG_LENGTH = 0x8B84,
    ATTACHED_SHADERS = 0x8B85,
    ACTIVE_UNIFORMS = 0x8B86,
    ACTIVE_UNIFORM_MAX_LENGTH = 0x8B87,
    SHADER_SOURCE_LENGTH = 0x8B88,
    ACTIVE_ATTRIBUTES = 0x8B89,
    ACTIVE_ATTRIBUTE_MAX_LENGTH = 0x8B8A,
    ACTIVE_UNIFORM_BLOCKS = 0x8A36,
    PROGRAM_BINARY_RETRIEVABLE_HINT = 0x8257,
    PROGRAM_SEPARABLE = 0x8258,
    ACTIVE_PROGRAM = 0x8259,
    PROGRAM_BINARY_LENGTH = 0x8741,
    TRANSFORM_FEEDBACK_BUFFER_MODE = 0x8C7F,
    TRANSFORM_FEEDBACK_VARYINGS = 0x8C83,
    TRANSFORM_FEEDBACK_VARYING_MAX_LENGTH = 0x8C76,
    INTERLEAVED_ATTRIBS = 0x8C8C,
    SEPARATE_ATTRIBS = 0x8C8D,
    UNIFORM_BLOCK_BINDING = 0x8A3F,
    UNIFORM_BLOCK_DATA_SIZE = 0x8A40,
    UNIFORM_BLOCK_NAME_LENGTH = 0x8A41,
    UNIFORM_BLOCK_ACTIVE_UNIFORMS = 0x8A42,
    UNIFORM_BLOCK_ACTIVE_UNIFORM_INDICES = 0x8A43,
    UNIFORM_BLOCK_REFERENCED_BY_VERTEX_SHADER = 0x8A44,
    UNIFORM_BLOCK_REFERENCED_BY_GEOMETRY_SHADER = 0x8A45,
    UNIFORM_BLOCK_REFERENCED_BY_FRAGMENT_SHADER = 0x8A46,
    UNIFORM_BLOCK_REFERENCED_BY_TESS_CONTROL_SHADER = 0x84F0,
    UNIFORM_BLOCK_REFERENCED_BY_TESS_EVALUATION_SHADER = 0x84F1,
    UNIFORM_BLOCK_REFERENCED_BY_COMPUTE_SHADER = 0x90EC,
    PROGRAM_OUTPUT = 0x92E4,
    IS_PER_PATCH = 0x92E7,
    ACTIVE_RESOURCES = 0x92F5,
    MAX_NAME_LENGTH = 0x92F6,
    NAME_LENGTH = 0x92F9,
    TYPE = 0x92FA,
    ARRAY_SIZE = 0x92FB,
    LOCATION = 0x930E,
    LOCATION_INDEX = 0x930F,
    VERTEX_SHADER_BIT = 0x0001,
    FRAGMENT_SHADER_BIT = 0x0002,
    GEOMETRY_SHADER_BIT = 0x0004,
    TESS_CONTROL_SHADER_BIT = 0x0008,
    TESS_EVALUATION_SHADER_BIT = 0x0010,

    // Vertex attributes.
    VERTEX_ATTRIB_ARRAY_ENABLED = 0x8622,
    VERTEX_ATTRIB_ARRAY_SIZE = 0x8623,
    VERTEX_ATTRIB_ARRAY_STRIDE = 0x8624,
    VERTEX_ATTRIB_ARRAY_TYPE = 0x8625,
    VERTEX_ATTRIB_ARRAY_POINTER = 0x8645,
    VERTEX_ATTRIB_ARRAY_NORMALIZED = 0x886A,
    VERTEX_ATTRIB_ARRAY_BUFFER_BINDING = 0x889F,
    VERTEX_ATTRIB_ARRAY_INTEGER = 0x88FD,
    VERTEX_ATTRIB_ARRAY_DIVISOR = 0x88FE,

    // Scalar types.
    BYTE = 0x1400,
    UNSIGNED_BYTE = 0x1401,
    SHORT = 0x1402,
    UNSIGNED_SHORT = 0x1403,
    INT = 0x1404,
    UNSIGNED_INT = 0x1405,
    FLOAT = 0x1406,
    DOUBLE = 0x140A,
    HALF_FLOAT = 0x140B,

    // Uniform and attribute types.
    FLOAT_VEC2 = 0x8B50,
    FLOAT_VEC3 = 0x8B51,
    FLOAT_VEC4 = 0x8B52,
    INT_VEC2 = 0x8B53,
    INT_VEC3 = 0x8B54,
    INT_VEC4 = 0x8B55,
    BOOL = 0x8B56,
    BOOL_VEC2 = 0x8B57,
    BOOL_VEC3 = 0x8B58,
    BOOL_VEC4 = 0x8B59,
    FLOAT_MAT2 = 0x8B5A,
    FLOAT_MAT3 = 0x8B5B,
    FLOAT_MAT4 = 0x8B5C,
    FLOAT_MAT2x3 = 0x8B65,
    FLOAT_MAT2x4 = 0x8B66,
    FLOAT_MAT3x2 = 0x8B67,
    FLOAT_MAT3x4 = 0x8B68,
    FLOAT_MAT4x2 = 0x8B69,
    FLOAT_MAT4x3 = 0x8B6A,
    UNSIGNED_INT_VEC2 = 0x8DC6,
    UNSIGNED_INT_VEC3 = 0x8DC7,
    UNSIGNED_INT_VEC4 = 0x8DC8,
    DOUBLE_VEC2 = 0x8FFC,
    DOUBLE_VEC3 = 0x8FFD,
    DOUBLE_VEC4 = 0x8FFE,
    DOUBLE_MAT2 = 0x8F46,
    DOUBLE_MAT3 = 0x8F47,
    DOUBLE_MAT4 = 0x8F48,
    DOUBLE_MAT2x3 = 0x8F49,
    DOUBLE_MAT2x4 = 0x8F4A,
    DOUBLE_MAT3x2 = 0x8F4B,
    DOUBLE_MAT3x4 = 0x8F4C,
    DOUBLE_MAT4x2 = 0x8F4D,
    DOUBLE_MAT4x3 = 0x8F4E,
    SAMPLER_1D = 0x8B5D,
    SAMPLER_2D = 0x8B5E,
    SAMPLER_3D = 0x8B5F,
    SAMPLER_CUBE = 0x8B60,
    SAMPLER_1D_SHADOW = 0x8B61,
    SAMPLER_2D_SHADOW = 0x8B62,
    SAMPLER_2D_RECT = 0x8B63,
    SAMPLER_2D_RECT_SHADOW = 0x8B64,
    SAMPLER_1D_ARRAY = 0x8DC0,
    SAMPLER_2D_ARRAY = 0x8DC1,
    SAMPLER_BUFFER = 0x8DC2,
    SAMPLER_1D_ARRAY_SHADOW = 0x8DC3,
    SAMPLER_2D_ARRAY_SHADOW = 0x8DC4,
    SAMPLER_CUBE_SHADOW = 0x8DC5,
    INT_SAMPLER_1D = 0x8DC9,
    INT_SAMPLER_2D = 0x8DCA,
    INT_SAMPLER_3D = 0x8DCB,
    INT_SAMPLER_CUBE = 0x8DCC,
    INT_SAMPLER_2D_RECT = 0x8DCD,
    INT_SAMPLER_1D_ARRAY = 0x8DCE,
    INT_SAMPLER_2D_ARRAY = 0x8DCF,
    INT_SAMPLER_BUFFER = 0x8DD0,
    UNSIGNED_INT_SAMPLER_1D = 0x8DD1,
    UNSIGNED_INT_SAMPLER_2D = 0x8DD2,
    UNSIGNED_INT_SAMPLER_3D = 0x8DD3,
    UNSIGNED_INT_SAMPLER_CUBE = 0x8DD4,
    UNSIGNED_INT_SAMPLER_2D_RECT = 0x8DD5,
    UNSIGNED_INT_SAMPLER_1D_ARRAY = 0x8DD6,
    UNSIGNED_INT_SAMPLER_2D_ARRAY = 0x8DD7,
    UNSIGNED_INT_SAMPLER_BUFFER = 0x8DD8,
    SAMPLER_CUBE_MAP_ARRAY = 0x900C,
    SAMPLER_CUBE_MAP_ARRAY_SHADOW = 0x900D,
    INT_SAMPLER_CUBE_MAP_ARRAY = 0x900E,
    UNSIGNED_INT_SAMPLER_CUBE_MAP_ARRAY = 0x900F,
    SAMPLER_2D_MULTISAMPLE = 0x9108,
    INT_SAMPLER_2D_MULTISAMPLE = 0x9109,
    UNSIGNED_INT_SAMPLER_2D_MULTISAMPLE = 0x910A,
    SAMPLER_2D_MULTISAMPLE_ARRAY = 0x910B,
    INT_SAMPLER_2D_MULTISAMPLE_ARRAY = 0x910C,
    UNSIGNED_INT_SAMPLER_2D_MULTISAMPLE_ARRAY = 0x910D,
    IMAGE_1D = 0x904C,
    IMAGE_2D = 0x904D,
    IMAGE_3D = 0x904E,
    IMAGE_2D_RECT = 0x904F,
    IMAGE_CUBE = 0x9050,
    IMAGE_BUFFER = 0x9051,
    IMAGE_1D_ARRAY = 0x9052,
    IMAGE_2D_ARRAY = 0x9053,
    IMAGE_CUBE_MAP_ARRAY = 0x9054,
    IMAGE_2D_MULTISAMPLE = 0x9055,
    IMAGE_2D_MULTISAMPLE_ARRAY = 0x9056,
    INT_IMAGE_1D = 0x9057,
    INT_IMAGE_2D = 0x9058,
    INT_IMAGE_3D = 0x9059,
    INT_IMAGE_2D_RECT = 0x905A,
    INT_IMAGE_CUBE = 0x905B,
    INT_IMAGE_BUFFER = 0x905C,
    INT_IMAGE_1D_ARRAY = 0x905D,
    INT_IMAGE_2D_ARRAY = 0x905E,
    INT_IMAGE_CUBE_MAP_ARRAY = 0x905F,
    INT_IMAGE_2D_MULTISAMPLE = 0x9060,
    INT_IMAGE_2D_MULTISAMPLE_ARRAY = 0x9061,
    UNSIGNED_INT_IMAGE_1D = 0x9062,
    UNSIGNED_INT_IMAGE_2D = 0x9063,
    UNSIGNED_INT_IMAGE_3D = 0x9064,
    UNSIGNED_INT_IMAGE_2D_RECT = 0x9065,
    UNSIGNED_INT_IMAGE_CUBE = 0x9066,
    UNSIGNED_INT_IMAGE_BUFFER = 0x9067,
    UNSIGNED_INT_IMAGE_1D_ARRAY = 0x9068,
    UNSIGNED_INT_IMAGE_2D_ARRAY = 0x9069,
    UNSIGNED_INT_IMAGE_CUBE_MAP_ARRAY = 0x906A,
    UNSIGNED_INT_IMAGE_2D_MULTISAMPLE = 0x906B,
    UNSIGNED_INT_IMAGE_2D_MULTISAMPLE_ARRAY = 0x906C,
    UNSIGNED_INT_ATOMIC_COUNTER = 0x92DB,
}

pub const CONTEXT_CORE_PROFILE_BIT: GLenum = 0x0001;
pub const CONTEXT_COMPATIBILITY_PROFILE_BIT: GLenum = 0x0002;
pub const CONTEXT_FLAG_DEBUG_BIT: GLenum = 0x0002;

/// How the value of a `glGet`-style parameter should be presented.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PnameType {
    /// A plain integer.
    Int,
    /// An enumerant, serialized by name.
    Enum,
    /// A boolean flag.
    Bool,
}

#[rustfmt::skip]
static PNAMES: &[(GLenum, u32, PnameType)] = &[
    (FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE, 1, PnameType::Enum),
    (FRAMEBUFFER_ATTACHMENT_OBJECT_NAME, 1, PnameType::Int),
    (FRAMEBUFFER_ATTACHMENT_TEXTURE_LEVEL, 1, PnameType::Int),
    (FRAMEBUFFER_ATTACHMENT_TEXTURE_CUBE_MAP_FACE, 1, PnameType::Enum),
    (FRAMEBUFFER_ATTACHMENT_TEXTURE_LAYER, 1, PnameType::Int),
    (FRAMEBUFFER_ATTACHMENT_COLOR_ENCODING, 1, PnameType::Enum),
    (FRAMEBUFFER_ATTACHMENT_COMPONENT_TYPE, 1, PnameType::Enum),
    (FRAMEBUFFER_ATTACHMENT_RED_SIZE, 1, PnameType::Int),
    (FRAMEBUFFER_ATTACHMENT_GREEN_SIZE, 1, PnameType::Int),
    (FRAMEBUFFER_ATTACHMENT_BLUE_SIZE, 1, PnameType::Int),
    (FRAMEBUFFER_ATTACHMENT_ALPHA_SIZE, 1, PnameType::Int),
    (FRAMEBUFFER_ATTACHMENT_DEPTH_SIZE, 1, PnameType::Int),
    (FRAMEBUFFER_ATTACHMENT_STENCIL_SIZE, 1, PnameType::Int),
    (FRAMEBUFFER_ATTACHMENT_LAYERED, 1, PnameType::Bool),
    (DRAW_BUFFER, 1, PnameType::Enum),
    (READ_BUFFER, 1, PnameType::Enum),
    (ACTIVE_TEXTURE, 1, PnameType::Enum),
    (MATRIX_MODE, 1, PnameType::Enum),
    (MAX_DRAW_BUFFERS, 1, PnameType::Int),
    (MAX_COLOR_ATTACHMENTS, 1, PnameType::Int),
    (MAX_VERTEX_ATTRIBS, 1, PnameType::Int),
    (VERTEX_ATTRIB_ARRAY_TYPE, 1, PnameType::Enum),
    (VERTEX_ATTRIB_ARRAY_ENABLED, 1, PnameType::Bool),
    (VERTEX_ATTRIB_ARRAY_NORMALIZED, 1, PnameType::Bool),
    (VERTEX_ATTRIB_ARRAY_INTEGER, 1, PnameType::Bool),
    (SHADER_TYPE, 1, PnameType::Enum),
    (COMPILE_STATUS, 1, PnameType::Bool),
    (LINK_STATUS, 1, PnameType::Bool),
    (TRANSFORM_FEEDBACK_BUFFER_MODE, 1, PnameType::Enum),
];

/// A table mapping GL enumerant values to their names and back, plus what
/// we know about the shape of query parameters.
///
/// State objects never consult a global table; callers pass one in, usually
/// `GlEnumTable::standard()`.
#[derive(Debug)]
pub struct GlEnumTable {
    names: &'static [(&'static str, GLenum)],
    pnames: &'static [(GLenum, u32, PnameType)],
}

static STANDARD: GlEnumTable = GlEnumTable {
    names: ENUM_NAMES,
    pnames: PNAMES,
};

impl GlEnumTable {
    /// The table covering every enum this crate knows about.
    pub fn standard() -> &'static GlEnumTable {
        &STANDARD
    }

    /// Return the name of `value`.
    ///
    /// If several names share the value, prefer one starting with
    /// `preferred_prefix` (with or without the leading `GL_`). Unknown values
    /// come back as hex, so the result always parses with `value`.
    pub fn name(&self, value: GLenum, preferred_prefix: Option<&str>) -> String {
        if let Some(prefix) = preferred_prefix {
            let found = self.names.iter().find(|&&(name, v)| {
                v == value
                    && (name.starts_with(prefix)
                        || name.trim_start_matches("GL_").starts_with(prefix))
            });
            if let Some(&(name, _)) = found {
                return name.to_string();
            }
        }

        match self.names.iter().find(|&&(_, v)| v == value) {
            Some(&(name, _)) => name.to_string(),
            None => format!("0x{:04X}", value),
        }
    }

    /// Return the value named by `name`. Accepts the forms `name` produces:
    /// `GL_` names, and hexadecimal or decimal numbers.
    pub fn value(&self, name: &str) -> Option<GLenum> {
        let name = name.trim();
        if let Some(hex) = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
            return GLenum::from_str_radix(hex, 16).ok();
        }
        if let Ok(n) = name.parse::<GLenum>() {
            return Some(n);
        }

        let bare = name.trim_start_matches("GL_");
        self.names
            .iter()
            .find(|&&(n, _)| n.trim_start_matches("GL_") == bare)
            .map(|&(_, v)| v)
    }

    /// The number of values a query of `pname` produces, if we know it.
    pub fn pname_count(&self, pname: GLenum) -> Option<u32> {
        self.pnames
            .iter()
            .find(|&&(p, _, _)| p == pname)
            .map(|&(_, count, _)| count)
    }

    /// How the result of querying `pname` should be presented. Parameters we
    /// know nothing about are treated as integers.
    pub fn pname_type(&self, pname: GLenum) -> PnameType {
        self.pnames
            .iter()
            .find(|&&(p, _, _)| p == pname)
            .map_or(PnameType::Int, |&(_, _, ty)| ty)
    }
}

#[test]
fn test_names() {
    let enums = GlEnumTable::standard();

    assert_eq!(enums.name(TEXTURE_2D, None), "GL_TEXTURE_2D");
    assert_eq!(enums.name(0, None), "GL_NONE");
    assert_eq!(enums.name(0, Some("GL_NO_")), "GL_NO_ERROR");
    assert_eq!(enums.name(FRAMEBUFFER_BINDING, None), "GL_DRAW_FRAMEBUFFER_BINDING");
    assert_eq!(enums.name(FRAMEBUFFER_BINDING, Some("FRAMEBUFFER_")), "GL_FRAMEBUFFER_BINDING");
    assert_eq!(enums.name(0xdead_beef, None), "0xDEADBEEF");

    assert_eq!(enums.value("GL_COLOR_ATTACHMENT3"), Some(COLOR_ATTACHMENT3));
    assert_eq!(enums.value("COLOR_ATTACHMENT3"), Some(COLOR_ATTACHMENT3));
    assert_eq!(enums.value("0x8CE0"), Some(COLOR_ATTACHMENT0));
    assert_eq!(enums.value("36064"), Some(COLOR_ATTACHMENT0));
    assert_eq!(enums.value("GL_NOT_A_THING"), None);

    // Every name we produce must parse back to the same value.
    for &(name, value) in ENUM_NAMES {
        assert_eq!(enums.value(&enums.name(value, None)), Some(value), "{}", name);
    }
}

#[test]
fn test_pnames() {
    let enums = GlEnumTable::standard();
    assert_eq!(enums.pname_type(FRAMEBUFFER_ATTACHMENT_COMPONENT_TYPE), PnameType::Enum);
    assert_eq!(enums.pname_type(FRAMEBUFFER_ATTACHMENT_RED_SIZE), PnameType::Int);
    assert_eq!(enums.pname_type(0x1234), PnameType::Int);
    assert_eq!(enums.pname_count(MAX_DRAW_BUFFERS), Some(1));
    assert_eq!(enums.pname_count(0x1234), None);
}
