//! Snapshot and restore the state of individual GL objects.
//!
//! A tracer records what each framebuffer, shader, program, program pipeline
//! and vertex array object looks like at some moment; a replayer later
//! recreates equivalent objects in a different context. The handle numbers
//! the trace saw are not the ones the replay context hands out, so every
//! handle embedded in a record passes through a `HandleRemapper` on the way
//! back in.
//!
//! Each object kind has a state record implementing `GlObjectState`:
//! `snapshot` reads a live object, `restore` recreates it, and `serialize` /
//! `deserialize` convert to and from `serde_json::Value` documents, with
//! bulky data such as shader sources kept in a `BlobManager`. Restores
//! distinguish hard failures, returned as `StateError`, from divergences the
//! replay can live with, which are logged and counted in the returned
//! `RestoreReport`.
//!
//! All GL access goes through the `GlApi` trait. `GleamGl` implements it for a
//! live context.

mod blob_manager;
mod context_info;
mod doc;
pub mod enums;
mod error;
mod fbo_state;
mod gl_api;
mod gl_object;
pub mod gl_utils;
mod gleam_gl;
mod handle;
mod handle_tracker;
mod linked_programs;
mod program_state;
mod remapper;
mod shader_state;
mod sso_state;
mod vao_state;

#[cfg(test)]
mod fake_gl;

pub use blob_manager::{compute_unique_id, get_extension, get_prefix, BlobManager, MemoryBlobManager, NullBlobManager};
pub use context_info::ContextInfo;
pub use enums::GlEnumTable;
pub use error::{BlobError, DocError, StateError};
pub use fbo_state::{FramebufferAttachment, FramebufferState};
pub use gl_api::GlApi;
pub use gl_object::{
    create_gl_object_state, deserialize_object, deserialize_objects, serialize_object, serialize_objects, GlContext,
    GlObjectState, GlObjectStateType, RestoreReport,
};
pub use gleam_gl::GleamGl;
pub use handle::{
    BufferHandle, FeedbackHandle, FramebufferHandle, ListHandle, Namespace, ObjectHandle, PipelineHandle,
    ProgramHandle, QueryHandle, RenderbufferHandle, SamplerHandle, ShaderHandle, TextureHandle, UnknownNamespace,
    VertexArrayHandle,
};
pub use handle_tracker::{HandleDef, HandleTracker};
pub use linked_programs::LinkedProgramStates;
pub use program_state::{
    LinkEntrypoint, LinkSource, ProgramAttrib, ProgramOutput, ProgramState, ProgramUniform, TransformFeedbackVarying,
    UniformBlock,
};
pub use remapper::{HandleRemapper, IdentityRemapper, RemapperExt, ReplayRemapper, ReverseRemapper};
pub use shader_state::ShaderState;
pub use sso_state::SsoState;
pub use vao_state::{VaoState, VertexAttribDesc};
