//! The interface shared by every GL object state record.

use gleam::gl::{GLenum, GLuint};
use serde_json::{json, Value};
use std::any::Any;
use std::fmt;
use std::str::FromStr;

use crate::blob_manager::BlobManager;
use crate::context_info::ContextInfo;
use crate::doc;
use crate::enums::GlEnumTable;
use crate::error::{DocError, StateError};
use crate::fbo_state::FramebufferState;
use crate::gl_api::GlApi;
use crate::gl_utils::check_gl_error;
use crate::handle::Namespace;
use crate::program_state::ProgramState;
use crate::remapper::HandleRemapper;
use crate::shader_state::ShaderState;
use crate::sso_state::SsoState;
use crate::vao_state::VaoState;

macro_rules! object_state_types {
    ( $( $variant:ident => $ns:expr, )* ) => {
        /// The kinds of GL object whose state can be recorded.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum GlObjectStateType {
            $( $variant, )*
        }

        impl GlObjectStateType {
            pub const ALL: &'static [GlObjectStateType] = &[ $( GlObjectStateType::$variant, )* ];

            pub fn as_str(self) -> &'static str {
                match self {
                    $( GlObjectStateType::$variant => stringify!($variant), )*
                }
            }

            /// The namespace handles of this kind of object live in.
            pub fn namespace(self) -> Option<Namespace> {
                match self {
                    $( GlObjectStateType::$variant => $ns, )*
                }
            }
        }
    }
}

object_state_types! {
    Invalid => None,
    Texture => Some(Namespace::Textures),
    Renderbuffer => Some(Namespace::RenderBuffers),
    Buffer => Some(Namespace::Buffers),
    Framebuffer => Some(Namespace::Framebuffers),
    Query => Some(Namespace::Queries),
    Shader => Some(Namespace::Shaders),
    Program => Some(Namespace::Programs),
    Sampler => Some(Namespace::Samplers),
    VertexArray => Some(Namespace::VertexArrays),
    Sync => Some(Namespace::Syncs),
    ARBProgram => Some(Namespace::ProgramArb),
    ProgramPipeline => Some(Namespace::Pipelines),
}

impl fmt::Display for GlObjectStateType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlObjectStateType {
    type Err = DocError;

    /// Names match case-insensitively.
    fn from_str(s: &str) -> Result<GlObjectStateType, DocError> {
        GlObjectStateType::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DocError::Invalid(format!("unknown GL object type {:?}", s)))
    }
}

/// Everything a snapshot or restore needs to talk to a context.
#[derive(Copy, Clone)]
pub struct GlContext<'a> {
    pub gl: &'a dyn GlApi,
    pub info: &'a ContextInfo,
    pub enums: &'a GlEnumTable,
}

impl<'a> GlContext<'a> {
    pub fn new(gl: &'a dyn GlApi, info: &'a ContextInfo, enums: &'a GlEnumTable) -> GlContext<'a> {
        GlContext { gl, info, enums }
    }

    /// Drain and log pending GL errors. True if there were any.
    pub fn check_error(&self, what: &str) -> bool {
        check_gl_error(self.gl, self.enums, what)
    }
}

/// Divergences between the trace and the replay context that didn't stop a
/// restore.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RestoreReport {
    pub warnings: Vec<String>,
}

impl RestoreReport {
    /// Log `message` and count it.
    pub fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn merge(&mut self, other: RestoreReport) {
        self.warnings.extend(other.warnings);
    }
}

/// A complete, handle-independent record of one GL object's state.
///
/// A state object is either empty (`is_valid` is false) or holds a full
/// record; operations that fail part-way leave it empty.
pub trait GlObjectState: fmt::Debug {
    fn object_type(&self) -> GlObjectStateType;

    fn handle_namespace(&self) -> Option<Namespace> {
        self.object_type().namespace()
    }

    fn snapshot_handle(&self) -> GLuint;

    fn is_valid(&self) -> bool;

    fn clear(&mut self);

    /// Record the live state of object `handle`. Context state disturbed
    /// along the way is put back before returning.
    fn snapshot(
        &mut self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        handle: GLuint,
        target: GLenum,
    ) -> Result<(), StateError>;

    /// Recreate the recorded state. If `*handle` is 0, create a new object,
    /// declare it to `remapper`, and store its name in `*handle`. On failure,
    /// any object created is deleted and `*handle` is reset to 0.
    fn restore(
        &self,
        cx: &GlContext,
        remapper: &mut dyn HandleRemapper,
        handle: &mut GLuint,
    ) -> Result<RestoreReport, StateError>;

    /// Rewrite every handle embedded in the record.
    fn remap_handles(&mut self, remapper: &dyn HandleRemapper) -> Result<(), StateError>;

    fn serialize(&self, enums: &GlEnumTable, blobs: &mut dyn BlobManager) -> Result<Value, StateError>;

    fn deserialize(&mut self, node: &Value, enums: &GlEnumTable, blobs: &dyn BlobManager) -> Result<(), DocError>;

    /// Compare only the state `restore` can reproduce.
    fn compare_restorable_state(&self, other: &dyn GlObjectState) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// Create an empty state object of the given type, for the types we
/// implement.
pub fn create_gl_object_state(ty: GlObjectStateType) -> Option<Box<dyn GlObjectState>> {
    let state: Box<dyn GlObjectState> = match ty {
        GlObjectStateType::Framebuffer => Box::new(FramebufferState::new()),
        GlObjectStateType::Shader => Box::new(ShaderState::new()),
        GlObjectStateType::Program => Box::new(ProgramState::new()),
        GlObjectStateType::VertexArray => Box::new(VaoState::new()),
        GlObjectStateType::ProgramPipeline => Box::new(SsoState::new()),
        _ => return None,
    };
    Some(state)
}

/// Serialize `state` with its type, so `deserialize_object` can rebuild it.
pub fn serialize_object(
    state: &dyn GlObjectState,
    enums: &GlEnumTable,
    blobs: &mut dyn BlobManager,
) -> Result<Value, StateError> {
    Ok(json!({
        "object_type": state.object_type().as_str(),
        "state": state.serialize(enums, blobs)?,
    }))
}

pub fn deserialize_object(
    node: &Value,
    enums: &GlEnumTable,
    blobs: &dyn BlobManager,
) -> Result<Box<dyn GlObjectState>, DocError> {
    let obj = doc::as_object(node)?;
    let ty: GlObjectStateType = doc::get_str(obj, "object_type")?.parse()?;
    let mut state = create_gl_object_state(ty)
        .ok_or_else(|| DocError::Invalid(format!("no state record for GL object type {}", ty)))?;
    state.deserialize(doc::require_value(obj, "state")?, enums, blobs)?;
    Ok(state)
}

/// Serialize a list of objects as a document: `{"objects": [...]}`.
pub fn serialize_objects(
    states: &[Box<dyn GlObjectState>],
    enums: &GlEnumTable,
    blobs: &mut dyn BlobManager,
) -> Result<Value, StateError> {
    let objects = states
        .iter()
        .map(|state| serialize_object(&**state, enums, blobs))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "objects": objects }))
}

pub fn deserialize_objects(
    node: &Value,
    enums: &GlEnumTable,
    blobs: &dyn BlobManager,
) -> Result<Vec<Box<dyn GlObjectState>>, DocError> {
    let obj = doc::as_object(node)?;
    doc::get_array(obj, "objects")?
        .iter()
        .map(|object| deserialize_object(object, enums, blobs))
        .collect()
}

#[test]
fn test_type_names() {
    for &ty in GlObjectStateType::ALL {
        assert_eq!(ty.as_str().parse::<GlObjectStateType>().unwrap(), ty);
    }
    assert_eq!("PROGRAMPIPELINE".parse::<GlObjectStateType>().unwrap(), GlObjectStateType::ProgramPipeline);
    assert_eq!("arbprogram".parse::<GlObjectStateType>().unwrap(), GlObjectStateType::ARBProgram);
    assert!("Frobnicator".parse::<GlObjectStateType>().is_err());

    assert_eq!(GlObjectStateType::ProgramPipeline.namespace(), Some(Namespace::Pipelines));
    assert_eq!(GlObjectStateType::Invalid.namespace(), None);
}

#[test]
fn test_factory() {
    for &ty in GlObjectStateType::ALL {
        match create_gl_object_state(ty) {
            Some(state) => {
                assert_eq!(state.object_type(), ty);
                assert!(!state.is_valid());
            }
            None => assert!(!matches!(
                ty,
                GlObjectStateType::Framebuffer
                    | GlObjectStateType::Shader
                    | GlObjectStateType::Program
                    | GlObjectStateType::VertexArray
                    | GlObjectStateType::ProgramPipeline
            )),
        }
    }
}

#[test]
fn test_report() {
    let mut report = RestoreReport::default();
    report.warn("one".to_string());
    let mut other = RestoreReport::default();
    other.warn("two".to_string());
    report.merge(other);
    assert_eq!(report.warning_count(), 2);
}
