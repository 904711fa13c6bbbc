//! Framebuffer object state.

use gleam::gl::{GLenum, GLint, GLuint};
use serde_json::{json, Map, Value};
use std::any::Any;
use std::collections::BTreeMap;

use crate::blob_manager::BlobManager;
use crate::doc;
use crate::enums::{self, GlEnumTable, PnameType};
use crate::error::{DocError, StateError};
use crate::gl_object::{GlContext, GlObjectState, GlObjectStateType, RestoreReport};
use crate::gl_utils::{restore_draw_buffers, ScopedBindingState};
use crate::handle::{FramebufferHandle, Namespace, RenderbufferHandle, TextureHandle};
use crate::remapper::{HandleRemapper, RemapperExt};

/// Attachment points of the default framebuffer.
const DEFAULT_ATTACHMENTS: &[GLenum] = &[
    enums::FRONT_LEFT,
    enums::FRONT_RIGHT,
    enums::BACK_LEFT,
    enums::BACK_RIGHT,
    enums::DEPTH,
    enums::STENCIL,
];

/// Non-color attachment points of framebuffer objects. Color attachments
/// are limited by the context.
const FBO_ATTACHMENTS: &[GLenum] = &[enums::DEPTH_ATTACHMENT, enums::STENCIL_ATTACHMENT];

const COMMON_PARAMS: &[GLenum] = &[
    enums::FRAMEBUFFER_ATTACHMENT_OBJECT_NAME,
    enums::FRAMEBUFFER_ATTACHMENT_RED_SIZE,
    enums::FRAMEBUFFER_ATTACHMENT_GREEN_SIZE,
    enums::FRAMEBUFFER_ATTACHMENT_BLUE_SIZE,
    enums::FRAMEBUFFER_ATTACHMENT_ALPHA_SIZE,
    enums::FRAMEBUFFER_ATTACHMENT_DEPTH_SIZE,
    enums::FRAMEBUFFER_ATTACHMENT_STENCIL_SIZE,
    enums::FRAMEBUFFER_ATTACHMENT_COMPONENT_TYPE,
    enums::FRAMEBUFFER_ATTACHMENT_COLOR_ENCODING,
];

const TEXTURE_PARAMS: &[GLenum] = &[
    enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_LEVEL,
    enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_CUBE_MAP_FACE,
    enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_LAYER,
];

/// What is attached at one attachment point, with everything GL reports
/// about it, keyed by query pname.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramebufferAttachment {
    attachment: GLenum,
    type_: GLenum,
    params: BTreeMap<GLenum, GLint>,
}

impl FramebufferAttachment {
    pub fn new(attachment: GLenum, type_: GLenum) -> FramebufferAttachment {
        FramebufferAttachment {
            attachment,
            type_,
            params: BTreeMap::new(),
        }
    }

    /// Query the attachment at `attachment` of the framebuffer bound to
    /// `GL_FRAMEBUFFER`.
    fn snapshot(cx: &GlContext, attachment: GLenum, type_: GLenum) -> FramebufferAttachment {
        let mut result = FramebufferAttachment::new(attachment, type_);
        let mut query = |pname| {
            let value = cx.gl.get_framebuffer_attachment_parameter_iv(enums::FRAMEBUFFER, attachment, pname);
            cx.check_error("glGetFramebufferAttachmentParameteriv");
            result.params.insert(pname, value);
        };

        for &pname in COMMON_PARAMS {
            query(pname);
        }
        if type_ == enums::TEXTURE {
            for &pname in TEXTURE_PARAMS {
                query(pname);
            }
            if cx.info.supports_extension("GL_ARB_geometry_shader4") {
                query(enums::FRAMEBUFFER_ATTACHMENT_LAYERED);
            }
        }
        result
    }

    pub fn attachment(&self) -> GLenum {
        self.attachment
    }

    /// `GL_TEXTURE`, `GL_RENDERBUFFER` or `GL_FRAMEBUFFER_DEFAULT`.
    pub fn type_(&self) -> GLenum {
        self.type_
    }

    pub fn handle(&self) -> GLuint {
        self.param(enums::FRAMEBUFFER_ATTACHMENT_OBJECT_NAME, 0) as GLuint
    }

    pub fn param(&self, pname: GLenum, default: GLint) -> GLint {
        self.params.get(&pname).copied().unwrap_or(default)
    }

    pub fn set_param(&mut self, pname: GLenum, value: GLint) {
        self.params.insert(pname, value);
    }

    pub fn params(&self) -> &BTreeMap<GLenum, GLint> {
        &self.params
    }

    fn remap_handles(&mut self, remapper: &dyn HandleRemapper) -> bool {
        let name = match self.params.get_mut(&enums::FRAMEBUFFER_ATTACHMENT_OBJECT_NAME) {
            Some(name) => name,
            None => return false,
        };
        match self.type_ {
            enums::RENDERBUFFER => *name = remapper.remap(RenderbufferHandle(*name as GLuint)).0 as GLint,
            enums::TEXTURE => *name = remapper.remap(TextureHandle(*name as GLuint)).0 as GLint,
            _ => {}
        }
        true
    }

    fn serialize(&self, enums: &GlEnumTable) -> Value {
        let mut node = Map::new();
        node.insert("attachment".to_string(), doc::enum_value(enums, self.attachment));
        node.insert("type".to_string(), doc::enum_value(enums, self.type_));
        for (&pname, &value) in &self.params {
            let value = match enums.pname_type(pname) {
                PnameType::Enum => doc::enum_value(enums, value as GLenum),
                PnameType::Bool => json!(value != 0),
                PnameType::Int => json!(value),
            };
            node.insert(enums.name(pname, None), value);
        }
        Value::Object(node)
    }

    fn deserialize(obj: &doc::Object, enums: &GlEnumTable) -> Result<FramebufferAttachment, DocError> {
        let mut result = FramebufferAttachment::new(
            doc::get_enum(obj, "attachment", enums)?,
            doc::get_enum(obj, "type", enums)?,
        );

        for (key, value) in obj {
            if key == "attachment" || key == "type" {
                continue;
            }
            let pname = match enums.value(key) {
                Some(pname) => pname,
                None => {
                    tracing::warn!("framebuffer attachment: ignoring unknown parameter {:?}", key);
                    continue;
                }
            };
            let value = match enums.pname_type(pname) {
                PnameType::Enum => doc::parse_enum(value, key, enums)? as GLint,
                _ => match value {
                    Value::Bool(b) => *b as GLint,
                    _ => value
                        .as_i64()
                        .filter(|&n| n >= i64::from(GLint::MIN) && n <= i64::from(GLuint::MAX))
                        .ok_or_else(|| DocError::WrongType {
                            key: key.clone(),
                            expected: "an integer",
                        })? as GLint,
                },
            };
            result.params.insert(pname, value);
        }

        Ok(result)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FramebufferState {
    snapshot_handle: GLuint,
    has_been_bound: bool,
    attachments: BTreeMap<GLenum, FramebufferAttachment>,
    draw_buffers: Vec<GLenum>,
    read_buffer: GLenum,
    status: GLenum,
    is_valid: bool,
}

impl Default for FramebufferState {
    fn default() -> FramebufferState {
        FramebufferState {
            snapshot_handle: 0,
            has_been_bound: false,
            attachments: BTreeMap::new(),
            draw_buffers: Vec::new(),
            read_buffer: enums::NONE,
            status: enums::FRAMEBUFFER_COMPLETE,
            is_valid: false,
        }
    }
}

impl FramebufferState {
    pub fn new() -> FramebufferState {
        FramebufferState::default()
    }

    pub fn has_been_bound(&self) -> bool {
        self.has_been_bound
    }

    pub fn attachments(&self) -> &BTreeMap<GLenum, FramebufferAttachment> {
        &self.attachments
    }

    pub fn attachment(&self, attachment: GLenum) -> Option<&FramebufferAttachment> {
        self.attachments.get(&attachment)
    }

    pub fn draw_buffers(&self) -> &[GLenum] {
        &self.draw_buffers
    }

    pub fn read_buffer(&self) -> GLenum {
        self.read_buffer
    }

    pub fn status(&self) -> GLenum {
        self.status
    }

    fn snapshot_bound(&mut self, cx: &GlContext) -> Result<(), StateError> {
        let gl = cx.gl;
        let handle = self.snapshot_handle;

        gl.bind_framebuffer(enums::FRAMEBUFFER, handle);
        if cx.check_error("glBindFramebuffer") {
            return Err(StateError::Query {
                object: GlObjectStateType::Framebuffer,
                handle,
                what: "binding the framebuffer".to_string(),
            });
        }

        // Draw and read buffers belong to the framebuffer, not the context.
        self.draw_buffers = (0..cx.info.max_draw_buffers())
            .map(|i| gl.get_integer(enums::DRAW_BUFFER0 + i) as GLenum)
            .collect();
        self.read_buffer = gl.get_integer(enums::READ_BUFFER) as GLenum;
        if cx.check_error("draw and read buffer queries") {
            return Err(StateError::Query {
                object: GlObjectStateType::Framebuffer,
                handle,
                what: "draw and read buffers".to_string(),
            });
        }

        self.status = if handle != 0 {
            let status = gl.check_frame_buffer_status(enums::DRAW_FRAMEBUFFER);
            cx.check_error("glCheckFramebufferStatus");
            status
        } else {
            enums::FRAMEBUFFER_COMPLETE
        };

        let points: Vec<GLenum> = if handle == 0 {
            DEFAULT_ATTACHMENTS.to_vec()
        } else {
            let colors = cx.info.max_color_attachments().min(16);
            (0..colors)
                .map(|i| enums::COLOR_ATTACHMENT0 + i)
                .chain(FBO_ATTACHMENTS.iter().copied())
                .collect()
        };

        for attachment in points {
            let type_ = gl.get_framebuffer_attachment_parameter_iv(
                enums::FRAMEBUFFER,
                attachment,
                enums::FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE,
            ) as GLenum;
            cx.check_error("glGetFramebufferAttachmentParameteriv(GL_FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE)");

            match type_ {
                enums::NONE => {}
                enums::FRAMEBUFFER_DEFAULT | enums::TEXTURE | enums::RENDERBUFFER => {
                    self.attachments
                        .insert(attachment, FramebufferAttachment::snapshot(cx, attachment, type_));
                }
                other => {
                    tracing::warn!(
                        "framebuffer {}: attachment {} has unexpected object type {}",
                        handle,
                        cx.enums.name(attachment, None),
                        cx.enums.name(other, None)
                    );
                }
            }
        }

        Ok(())
    }

    /// Attach one recorded attachment to the draw framebuffer.
    fn restore_attachment(
        &self,
        cx: &GlContext,
        remapper: &dyn HandleRemapper,
        replay: GLuint,
        attachment: &FramebufferAttachment,
        report: &mut RestoreReport,
    ) -> Result<(), StateError> {
        let gl = cx.gl;
        let point = attachment.attachment();
        let fail = |reason: String| StateError::Restore {
            object: GlObjectStateType::Framebuffer,
            trace: self.snapshot_handle,
            replay,
            reason,
        };

        match attachment.type_() {
            enums::RENDERBUFFER => {
                let trace_rbo = attachment.handle();
                if trace_rbo == 0 {
                    return Ok(());
                }
                let replay_rbo = remapper.remap(RenderbufferHandle(trace_rbo)).0;
                if replay_rbo == 0 {
                    report.warn(format!(
                        "framebuffer {} (replay {}): can't map renderbuffer {} for attachment {}",
                        self.snapshot_handle,
                        replay,
                        trace_rbo,
                        cx.enums.name(point, None)
                    ));
                    return Ok(());
                }
                gl.framebuffer_renderbuffer(enums::DRAW_FRAMEBUFFER, point, enums::RENDERBUFFER, replay_rbo);
                cx.check_error("glFramebufferRenderbuffer");
            }
            enums::TEXTURE => {
                let trace_tex = attachment.handle();
                if trace_tex == 0 {
                    return Ok(());
                }
                let replay_tex = remapper.remap(TextureHandle(trace_tex)).0;
                let tex_target = remapper
                    .determine_to_object_target(Namespace::Textures, replay_tex)
                    .ok_or_else(|| {
                        fail(format!(
                            "can't determine the target of texture {} (replay {}) attached at {}",
                            trace_tex,
                            replay_tex,
                            cx.enums.name(point, None)
                        ))
                    })?;

                let level = attachment.param(enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_LEVEL, 0);
                let layer = attachment.param(enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_LAYER, 0);
                let face = attachment.param(enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_CUBE_MAP_FACE, 0) as GLenum;
                let layered = attachment.param(enums::FRAMEBUFFER_ATTACHMENT_LAYERED, 0) != 0;

                let target = enums::DRAW_FRAMEBUFFER;
                if layered {
                    // Only glFramebufferTexture makes layered attachments.
                    gl.framebuffer_texture(target, point, replay_tex, level);
                } else {
                    match tex_target {
                        enums::TEXTURE_1D => gl.framebuffer_texture_1d(target, point, tex_target, replay_tex, level),
                        enums::TEXTURE_2D | enums::TEXTURE_2D_MULTISAMPLE | enums::TEXTURE_RECTANGLE => {
                            gl.framebuffer_texture_2d(target, point, tex_target, replay_tex, level)
                        }
                        enums::TEXTURE_CUBE_MAP => {
                            if !(enums::TEXTURE_CUBE_MAP_POSITIVE_X..=enums::TEXTURE_CUBE_MAP_NEGATIVE_Z).contains(&face) {
                                return Err(fail(format!("bad cube map face {}", cx.enums.name(face, None))));
                            }
                            gl.framebuffer_texture_2d(target, point, face, replay_tex, level)
                        }
                        enums::TEXTURE_3D
                        | enums::TEXTURE_1D_ARRAY
                        | enums::TEXTURE_2D_ARRAY
                        | enums::TEXTURE_CUBE_MAP_ARRAY
                        | enums::TEXTURE_2D_MULTISAMPLE_ARRAY => {
                            gl.framebuffer_texture_layer(target, point, replay_tex, level, layer)
                        }
                        other => {
                            return Err(fail(format!(
                                "don't know how to attach a texture with target {} (texture {}, replay {})",
                                cx.enums.name(other, None),
                                trace_tex,
                                replay_tex
                            )));
                        }
                    }
                }
                cx.check_error("glFramebufferTexture");
            }
            other => {
                return Err(fail(format!(
                    "can't restore attachment {} of type {}",
                    cx.enums.name(point, None),
                    cx.enums.name(other, None)
                )));
            }
        }
        Ok(())
    }

    fn restore_bound(
        &self,
        cx: &GlContext,
        remapper: &dyn HandleRemapper,
        replay: GLuint,
        report: &mut RestoreReport,
    ) -> Result<(), StateError> {
        let gl = cx.gl;

        // Draw and read buffers apply to whatever is bound, so the bindings
        // must be put back last.
        let _saved = ScopedBindingState::new(gl, &[enums::DRAW_FRAMEBUFFER, enums::READ_FRAMEBUFFER]);
        gl.bind_framebuffer(enums::FRAMEBUFFER, replay);
        if cx.check_error("glBindFramebuffer") {
            return Err(StateError::Gl {
                object: GlObjectStateType::Framebuffer,
                handle: self.snapshot_handle,
                what: "glBindFramebuffer".to_string(),
            });
        }

        for attachment in self.attachments.values() {
            self.restore_attachment(cx, remapper, replay, attachment, report)?;
        }

        restore_draw_buffers(gl, &self.draw_buffers);
        cx.check_error("glDrawBuffers");
        gl.read_buffer(self.read_buffer);
        cx.check_error("glReadBuffer");

        let status = gl.check_frame_buffer_status(enums::DRAW_FRAMEBUFFER);
        cx.check_error("glCheckFramebufferStatus");
        if status != self.status {
            report.warn(format!(
                "restored framebuffer's completeness {} differs from the trace's {}: trace handle {}, replay handle {}",
                cx.enums.name(status, Some("GL_FRAMEBUFFER_")),
                cx.enums.name(self.status, Some("GL_FRAMEBUFFER_")),
                self.snapshot_handle,
                replay
            ));
        }
        Ok(())
    }
}

impl GlObjectState for FramebufferState {
    fn object_type(&self) -> GlObjectStateType {
        GlObjectStateType::Framebuffer
    }

    fn snapshot_handle(&self) -> GLuint {
        self.snapshot_handle
    }

    fn is_valid(&self) -> bool {
        self.is_valid
    }

    fn clear(&mut self) {
        *self = FramebufferState::default();
    }

    fn snapshot(
        &mut self,
        cx: &GlContext,
        _remapper: &mut dyn HandleRemapper,
        handle: GLuint,
        _target: GLenum,
    ) -> Result<(), StateError> {
        cx.check_error("before framebuffer snapshot");
        self.clear();

        self.snapshot_handle = handle;
        // The default framebuffer always exists; its attachments are worth
        // recording even though it can't be restored.
        self.has_been_bound = handle == 0 || cx.gl.is_framebuffer(handle) != 0;

        if self.has_been_bound {
            let _saved = ScopedBindingState::new(cx.gl, &[enums::DRAW_FRAMEBUFFER, enums::READ_FRAMEBUFFER]);
            if let Err(err) = self.snapshot_bound(cx) {
                self.clear();
                return Err(err);
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
            return Err(StateError::NotValid(GlObjectStateType::Framebuffer));
        }
        if self.snapshot_handle == 0 {
            return Err(StateError::DefaultObject(GlObjectStateType::Framebuffer));
        }
        cx.check_error("before framebuffer restore");

        let gl = cx.gl;
        let mut created = false;
        if *handle == 0 {
            let new_handle = gl.gen_framebuffers(1).first().copied().unwrap_or(0);
            if cx.check_error("glGenFramebuffers") || new_handle == 0 {
                return Err(StateError::CreateFailed {
                    object: GlObjectStateType::Framebuffer,
                    trace: self.snapshot_handle,
                });
            }
            remapper.declare(FramebufferHandle(self.snapshot_handle), FramebufferHandle(new_handle), enums::NONE);
            *handle = new_handle;
            created = true;
        }

        let mut report = RestoreReport::default();
        if self.has_been_bound {
            if let Err(err) = self.restore_bound(cx, remapper, *handle, &mut report) {
                tracing::error!(
                    "failed restoring trace framebuffer {}, replay framebuffer {}: {}",
                    self.snapshot_handle,
                    *handle,
                    err
                );
                if created {
                    remapper.delete(gl, FramebufferHandle(self.snapshot_handle), FramebufferHandle(*handle));
                    *handle = 0;
                }
                return Err(err);
            }
        }

        Ok(report)
    }

    fn remap_handles(&mut self, remapper: &dyn HandleRemapper) -> Result<(), StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::Framebuffer));
        }
        self.snapshot_handle = remapper.remap(FramebufferHandle(self.snapshot_handle)).0;

        let mut missing = None;
        for attachment in self.attachments.values_mut() {
            if !attachment.remap_handles(remapper) {
                missing = Some(attachment.attachment());
            }
        }
        match missing {
            None => Ok(()),
            Some(point) => Err(StateError::Restore {
                object: GlObjectStateType::Framebuffer,
                trace: self.snapshot_handle,
                replay: 0,
                reason: format!("attachment 0x{:04X} has no object name", point),
            }),
        }
    }

    fn serialize(&self, enums: &GlEnumTable, _blobs: &mut dyn BlobManager) -> Result<Value, StateError> {
        if !self.is_valid {
            return Err(StateError::NotValid(GlObjectStateType::Framebuffer));
        }
        let attachments: Vec<Value> = self.attachments.values().map(|a| a.serialize(enums)).collect();
        let draw_buffers: Vec<Value> = self.draw_buffers.iter().map(|&buf| doc::enum_value(enums, buf)).collect();
        Ok(json!({
            "handle": self.snapshot_handle,
            "has_been_bound": self.has_been_bound,
            "status": doc::enum_value_prefixed(enums, self.status, "GL_FRAMEBUFFER_"),
            "read_buffer": doc::enum_value(enums, self.read_buffer),
            "draw_buffers": draw_buffers,
            "attachments": attachments,
        }))
    }

    fn deserialize(&mut self, node: &Value, enums: &GlEnumTable, _blobs: &dyn BlobManager) -> Result<(), DocError> {
        self.clear();
        let result: Result<_, DocError> = (|| {
            let obj = doc::as_object(node)?;
            let mut state = FramebufferState::new();
            state.snapshot_handle = doc::get_u32(obj, "handle")?;
            state.has_been_bound = doc::opt(obj, "has_been_bound", true, doc::get_bool)?;
            state.status = doc::get_enum(obj, "status", enums)?;
            state.read_buffer = doc::opt(obj, "read_buffer", enums::NONE, |o, k| doc::get_enum(o, k, enums))?;

            if obj.contains_key("draw_buffers") {
                state.draw_buffers = doc::get_array(obj, "draw_buffers")?
                    .iter()
                    .map(|buf| doc::parse_enum(buf, "draw_buffers", enums))
                    .collect::<Result<_, _>>()?;
            }

            if obj.contains_key("attachments") {
                for node in doc::get_array(obj, "attachments")? {
                    let attachment = FramebufferAttachment::deserialize(doc::as_object(node)?, enums)?;
                    if attachment.attachment() != enums::NONE {
                        state.attachments.insert(attachment.attachment(), attachment);
                    }
                }
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
        match other.as_any().downcast_ref::<FramebufferState>() {
            Some(other) => {
                self.status == other.status
                    && self.has_been_bound == other.has_been_bound
                    && self.read_buffer == other.read_buffer
                    && self.draw_buffers == other.draw_buffers
                    && self.attachments == other.attachments
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
