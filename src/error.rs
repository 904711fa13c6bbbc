//! Error types.

use gleam::gl::{GLenum, GLuint};
use std::io;
use thiserror::Error;

use crate::gl_object::GlObjectStateType;

/// A failure to snapshot, restore or serialize a GL object.
///
/// Soft divergences between the trace and the replay context are not errors;
/// they are logged and counted in the `RestoreReport`.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("{0:?} state object holds no state")]
    NotValid(GlObjectStateType),

    #[error("{object:?} {handle}: GL error after {what}")]
    Gl {
        object: GlObjectStateType,
        handle: GLuint,
        what: String,
    },

    #[error("{object:?} {handle}: query failed: {what}")]
    Query {
        object: GlObjectStateType,
        handle: GLuint,
        what: String,
    },

    #[error("failed to create GL {object:?} for trace handle {trace}")]
    CreateFailed {
        object: GlObjectStateType,
        trace: GLuint,
    },

    #[error("the default {0:?} object cannot be restored")]
    DefaultObject(GlObjectStateType),

    #[error("trace {object:?} {trace}, replay {replay}: {reason}")]
    Restore {
        object: GlObjectStateType,
        trace: GLuint,
        replay: GLuint,
        reason: String,
    },

    #[error("trace shader {trace} compiled at trace time but failed to compile on replay: {info_log}")]
    CompileFailed { trace: GLuint, info_log: String },

    #[error("trace program {trace} linked at trace time but failed to link on replay: {info_log}")]
    LinkFailed { trace: GLuint, info_log: String },

    #[error("unsupported {what}: 0x{value:04X}")]
    Unsupported { what: &'static str, value: GLenum },

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Doc(#[from] DocError),
}

/// A malformed or incomplete serialized document.
#[derive(Debug, Error)]
pub enum DocError {
    #[error("expected a JSON {expected}")]
    NotA { expected: &'static str },

    #[error("missing key `{0}`")]
    MissingKey(String),

    #[error("key `{key}` should be {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("key `{key}`: unrecognized GL enum {value}")]
    UnknownEnum { key: String, value: String },

    #[error("{0}")]
    Invalid(String),

    #[error("blob referenced by the document: {0}")]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A failure in a blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("no blob with id `{0}`")]
    NotFound(String),

    #[error("blob store is read-only")]
    ReadOnly,

    #[error("malformed blob archive: {0}")]
    BadArchive(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
