//! `GlApi` for a live context, through `gleam`.
//!
//! Most calls forward to a `gleam::gl::Gl`. The entry points gleam leaves
//! out (program pipelines, program interface queries, transform feedback
//! varyings, double and non-square matrix uniforms, and the compatibility
//! profile calls) go through bindings generated at build time and resolved
//! with the caller's loader function. Calling one the driver doesn't provide
//! panics, so callers check `ContextInfo` before using optional features.

use gleam::gl::{self, GLboolean, GLbitfield, GLenum, GLint, GLsizei, GLuint};
use std::ffi::CString;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::rc::Rc;

use crate::enums;
use crate::gl_api::GlApi;

#[allow(clippy::all, missing_docs, missing_debug_implementations, non_upper_case_globals, dead_code)]
mod ffi {
    include!(concat!(env!("OUT_DIR"), "/gl_bindings.rs"));
}

/// Longest name or log we'll fetch through a caller-sized buffer.
const MAX_STRING_LEN: GLsizei = 64 * 1024;

pub struct GleamGl {
    gl: Rc<dyn gl::Gl>,
    extra: ffi::Gl,
}

impl GleamGl {
    /// Wrap `gl`. `load` resolves entry point names for the current
    /// context, as for `gleam::gl::GlFns::load_with`.
    pub fn new<F>(gl: Rc<dyn gl::Gl>, load: F) -> GleamGl
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        GleamGl {
            gl,
            extra: ffi::Gl::load_with(load),
        }
    }

    pub fn gleam(&self) -> &Rc<dyn gl::Gl> {
        &self.gl
    }

    /// Call `fill` with a buffer of `len` bytes and a place to put the
    /// length actually written, and return what it wrote.
    fn fetch_string<F>(&self, len: GLint, fill: F) -> String
    where
        F: FnOnce(GLsizei, *mut GLsizei, *mut c_char),
    {
        let capacity = len.max(1).min(MAX_STRING_LEN);
        let mut buf = vec![0u8; capacity as usize];
        let mut written: GLsizei = 0;
        fill(capacity, &mut written, buf.as_mut_ptr() as *mut c_char);
        buf.truncate(written.max(0).min(capacity) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn c_string(s: &str) -> CString {
    // GL names can't contain NUL; cut at the first one rather than fail.
    let bytes = s.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    CString::new(&bytes[..end]).unwrap_or_default()
}

impl GlApi for GleamGl {
    fn get_error(&self) -> GLenum {
        self.gl.get_error()
    }

    fn get_integer_v(&self, pname: GLenum, result: &mut [GLint]) {
        unsafe { self.gl.get_integer_v(pname, result) }
    }

    fn get_integer_iv(&self, pname: GLenum, index: GLuint, result: &mut [GLint]) {
        unsafe { self.gl.get_integer_iv(pname, index, result) }
    }

    fn get_string(&self, which: GLenum) -> String {
        self.gl.get_string(which)
    }

    fn get_string_i(&self, which: GLenum, index: GLuint) -> String {
        self.gl.get_string_i(which, index)
    }

    fn is_framebuffer(&self, framebuffer: GLuint) -> GLboolean {
        self.gl.is_framebuffer(framebuffer)
    }

    fn gen_framebuffers(&self, n: GLsizei) -> Vec<GLuint> {
        self.gl.gen_framebuffers(n)
    }

    fn bind_framebuffer(&self, target: GLenum, framebuffer: GLuint) {
        self.gl.bind_framebuffer(target, framebuffer)
    }

    fn delete_framebuffers(&self, framebuffers: &[GLuint]) {
        self.gl.delete_framebuffers(framebuffers)
    }

    fn check_frame_buffer_status(&self, target: GLenum) -> GLenum {
        self.gl.check_frame_buffer_status(target)
    }

    fn get_framebuffer_attachment_parameter_iv(&self, target: GLenum, attachment: GLenum, pname: GLenum) -> GLint {
        self.gl.get_framebuffer_attachment_parameter_iv(target, attachment, pname)
    }

    fn framebuffer_renderbuffer(
        &self,
        target: GLenum,
        attachment: GLenum,
        renderbuffertarget: GLenum,
        renderbuffer: GLuint,
    ) {
        self.gl
            .framebuffer_renderbuffer(target, attachment, renderbuffertarget, renderbuffer)
    }

    fn framebuffer_texture(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: GLint) {
        unsafe { self.extra.FramebufferTexture(target, attachment, texture, level) }
    }

    fn framebuffer_texture_1d(&self, target: GLenum, attachment: GLenum, textarget: GLenum, texture: GLuint, level: GLint) {
        unsafe {
            self.extra
                .FramebufferTexture1D(target, attachment, textarget, texture, level)
        }
    }

    fn framebuffer_texture_2d(&self, target: GLenum, attachment: GLenum, textarget: GLenum, texture: GLuint, level: GLint) {
        self.gl
            .framebuffer_texture_2d(target, attachment, textarget, texture, level)
    }

    fn framebuffer_texture_layer(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: GLint, layer: GLint) {
        self.gl
            .framebuffer_texture_layer(target, attachment, texture, level, layer)
    }

    fn draw_buffer(&self, mode: GLenum) {
        unsafe { self.extra.DrawBuffer(mode) }
    }

    fn draw_buffers(&self, bufs: &[GLenum]) {
        self.gl.draw_buffers(bufs)
    }

    fn read_buffer(&self, mode: GLenum) {
        self.gl.read_buffer(mode)
    }

    fn bind_texture(&self, target: GLenum, texture: GLuint) {
        self.gl.bind_texture(target, texture)
    }

    fn bind_renderbuffer(&self, target: GLenum, renderbuffer: GLuint) {
        self.gl.bind_renderbuffer(target, renderbuffer)
    }

    fn bind_buffer(&self, target: GLenum, buffer: GLuint) {
        self.gl.bind_buffer(target, buffer)
    }

    fn bind_sampler(&self, unit: GLuint, sampler: GLuint) {
        unsafe { self.extra.BindSampler(unit, sampler) }
    }

    fn active_texture(&self, texture: GLenum) {
        self.gl.active_texture(texture)
    }

    fn client_active_texture(&self, texture: GLenum) {
        unsafe { self.extra.ClientActiveTexture(texture) }
    }

    fn matrix_mode(&self, mode: GLenum) {
        unsafe { self.extra.MatrixMode(mode) }
    }

    fn pixel_store_i(&self, name: GLenum, param: GLint) {
        self.gl.pixel_store_i(name, param)
    }

    fn delete_textures(&self, textures: &[GLuint]) {
        self.gl.delete_textures(textures)
    }

    fn delete_renderbuffers(&self, renderbuffers: &[GLuint]) {
        self.gl.delete_renderbuffers(renderbuffers)
    }

    fn delete_buffers(&self, buffers: &[GLuint]) {
        self.gl.delete_buffers(buffers)
    }

    fn delete_queries(&self, queries: &[GLuint]) {
        self.gl.delete_queries(queries)
    }

    fn delete_samplers(&self, samplers: &[GLuint]) {
        unsafe { self.extra.DeleteSamplers(samplers.len() as GLsizei, samplers.as_ptr()) }
    }

    fn delete_transform_feedbacks(&self, feedbacks: &[GLuint]) {
        unsafe {
            self.extra
                .DeleteTransformFeedbacks(feedbacks.len() as GLsizei, feedbacks.as_ptr())
        }
    }

    fn delete_lists(&self, list: GLuint, range: GLsizei) {
        unsafe { self.extra.DeleteLists(list, range) }
    }

    fn is_shader(&self, shader: GLuint) -> GLboolean {
        self.gl.is_shader(shader)
    }

    fn create_shader(&self, shader_type: GLenum) -> GLuint {
        self.gl.create_shader(shader_type)
    }

    fn shader_source(&self, shader: GLuint, source: &str) {
        self.gl.shader_source(shader, &[source.as_bytes()])
    }

    fn compile_shader(&self, shader: GLuint) {
        self.gl.compile_shader(shader)
    }

    fn delete_shader(&self, shader: GLuint) {
        self.gl.delete_shader(shader)
    }

    fn get_shader_iv(&self, shader: GLuint, pname: GLenum) -> GLint {
        let mut result = [0];
        unsafe { self.gl.get_shader_iv(shader, pname, &mut result) };
        result[0]
    }

    fn get_shader_info_log(&self, shader: GLuint) -> String {
        self.gl.get_shader_info_log(shader)
    }

    fn get_shader_source(&self, shader: GLuint) -> String {
        let len = self.get_shader_iv(shader, enums::SHADER_SOURCE_LENGTH);
        if len <= 0 {
            return String::new();
        }
        self.fetch_string(len, |size, written, buf| unsafe {
            self.extra.GetShaderSource(shader, size, written, buf)
        })
    }

    fn is_program(&self, program: GLuint) -> GLboolean {
        unsafe { self.extra.IsProgram(program) }
    }

    fn create_program(&self) -> GLuint {
        self.gl.create_program()
    }

    fn create_shader_program_v(&self, shader_type: GLenum, strings: &[&str]) -> GLuint {
        let owned: Vec<CString> = strings.iter().map(|s| c_string(s)).collect();
        let pointers: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        unsafe {
            self.extra
                .CreateShaderProgramv(shader_type, pointers.len() as GLsizei, pointers.as_ptr())
        }
    }

    fn delete_program(&self, program: GLuint) {
        self.gl.delete_program(program)
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        self.gl.attach_shader(program, shader)
    }

    fn detach_shader(&self, program: GLuint, shader: GLuint) {
        self.gl.detach_shader(program, shader)
    }

    fn link_program(&self, program: GLuint) {
        self.gl.link_program(program)
    }

    fn use_program(&self, program: GLuint) {
        self.gl.use_program(program)
    }

    fn get_program_iv(&self, program: GLuint, pname: GLenum) -> GLint {
        let mut result = [0];
        unsafe { self.gl.get_program_iv(program, pname, &mut result) };
        result[0]
    }

    fn get_program_info_log(&self, program: GLuint) -> String {
        self.gl.get_program_info_log(program)
    }

    fn get_attached_shaders(&self, program: GLuint) -> Vec<GLuint> {
        let count = self.get_program_iv(program, enums::ATTACHED_SHADERS);
        if count <= 0 {
            return Vec::new();
        }
        let mut shaders = vec![0; count as usize];
        let mut written: GLsizei = 0;
        unsafe {
            self.extra
                .GetAttachedShaders(program, count, &mut written, shaders.as_mut_ptr())
        };
        shaders.truncate(written.max(0).min(count) as usize);
        shaders
    }

    fn program_parameter_i(&self, program: GLuint, pname: GLenum, value: GLint) {
        self.gl.program_parameter_i(program, pname, value)
    }

    fn program_binary(&self, program: GLuint, format: GLenum, binary: &[u8]) {
        self.gl.program_binary(program, format, binary)
    }

    fn get_program_binary(&self, program: GLuint) -> (Vec<u8>, GLenum) {
        self.gl.get_program_binary(program)
    }

    fn get_active_attrib(&self, program: GLuint, index: GLuint) -> (GLint, GLenum, String) {
        self.gl.get_active_attrib(program, index)
    }

    fn get_attrib_location(&self, program: GLuint, name: &str) -> GLint {
        self.gl.get_attrib_location(program, name)
    }

    fn bind_attrib_location(&self, program: GLuint, index: GLuint, name: &str) {
        self.gl.bind_attrib_location(program, index, name)
    }

    fn get_frag_data_location(&self, program: GLuint, name: &str) -> GLint {
        self.gl.get_frag_data_location(program, name)
    }

    fn get_frag_data_index(&self, program: GLuint, name: &str) -> GLint {
        self.gl.get_frag_data_index(program, name)
    }

    fn bind_frag_data_location(&self, program: GLuint, color_number: GLuint, name: &str) {
        let name = c_string(name);
        unsafe { self.extra.BindFragDataLocation(program, color_number, name.as_ptr()) }
    }

    fn bind_frag_data_location_indexed(&self, program: GLuint, color_number: GLuint, index: GLuint, name: &str) {
        self.gl
            .bind_frag_data_location_indexed(program, color_number, index, name)
    }

    fn get_program_interface_iv(&self, program: GLuint, interface: GLenum, pname: GLenum) -> GLint {
        let mut result = 0;
        unsafe {
            self.extra
                .GetProgramInterfaceiv(program, interface, pname, &mut result)
        };
        result
    }

    fn get_program_resource_name(&self, program: GLuint, interface: GLenum, index: GLuint) -> String {
        let len = self.get_program_interface_iv(program, interface, enums::MAX_NAME_LENGTH);
        self.fetch_string(len, |size, written, buf| unsafe {
            self.extra
                .GetProgramResourceName(program, interface, index, size, written, buf)
        })
    }

    fn get_program_resource_iv(&self, program: GLuint, interface: GLenum, index: GLuint, props: &[GLenum]) -> Vec<GLint> {
        let mut result = vec![0; props.len()];
        let mut written: GLsizei = 0;
        unsafe {
            self.extra.GetProgramResourceiv(
                program,
                interface,
                index,
                props.len() as GLsizei,
                props.as_ptr(),
                result.len() as GLsizei,
                &mut written,
                result.as_mut_ptr(),
            )
        };
        result
    }

    fn get_transform_feedback_varying(&self, program: GLuint, index: GLuint) -> (GLint, GLenum, String) {
        let len = self.get_program_iv(program, enums::TRANSFORM_FEEDBACK_VARYING_MAX_LENGTH);
        let mut size = 0;
        let mut type_ = 0;
        let name = self.fetch_string(len, |buf_size, written, buf| unsafe {
            self.extra
                .GetTransformFeedbackVarying(program, index, buf_size, written, &mut size, &mut type_, buf)
        });
        (size, type_, name)
    }

    fn transform_feedback_varyings(&self, program: GLuint, varyings: &[&str], buffer_mode: GLenum) {
        let owned: Vec<CString> = varyings.iter().map(|s| c_string(s)).collect();
        let pointers: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        unsafe {
            self.extra.TransformFeedbackVaryings(
                program,
                pointers.len() as GLsizei,
                pointers.as_ptr(),
                buffer_mode,
            )
        }
    }

    fn get_active_uniform(&self, program: GLuint, index: GLuint) -> (GLint, GLenum, String) {
        self.gl.get_active_uniform(program, index)
    }

    fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint {
        self.gl.get_uniform_location(program, name)
    }

    fn get_uniform_fv(&self, program: GLuint, location: GLint, result: &mut [f32]) {
        unsafe { self.gl.get_uniform_fv(program, location, result) }
    }

    fn get_uniform_iv(&self, program: GLuint, location: GLint, result: &mut [i32]) {
        unsafe { self.gl.get_uniform_iv(program, location, result) }
    }

    fn get_uniform_uiv(&self, program: GLuint, location: GLint, result: &mut [u32]) {
        unsafe { self.extra.GetUniformuiv(program, location, result.as_mut_ptr()) }
    }

    fn get_uniform_dv(&self, program: GLuint, location: GLint, result: &mut [f64]) {
        unsafe { self.extra.GetUniformdv(program, location, result.as_mut_ptr()) }
    }

    fn uniform_fv(&self, components: u32, location: GLint, values: &[f32]) {
        match components {
            1 => self.gl.uniform_1fv(location, values),
            2 => self.gl.uniform_2fv(location, values),
            3 => self.gl.uniform_3fv(location, values),
            4 => self.gl.uniform_4fv(location, values),
            _ => tracing::error!("glUniform{}fv: bad component count", components),
        }
    }

    fn uniform_iv(&self, components: u32, location: GLint, values: &[i32]) {
        match components {
            1 => self.gl.uniform_1iv(location, values),
            2 => self.gl.uniform_2iv(location, values),
            3 => self.gl.uniform_3iv(location, values),
            4 => self.gl.uniform_4iv(location, values),
            _ => tracing::error!("glUniform{}iv: bad component count", components),
        }
    }

    fn uniform_uiv(&self, components: u32, location: GLint, values: &[u32]) {
        let count = (values.len() / components.max(1) as usize) as GLsizei;
        let values = values.as_ptr();
        unsafe {
            match components {
                1 => self.extra.Uniform1uiv(location, count, values),
                2 => self.extra.Uniform2uiv(location, count, values),
                3 => self.extra.Uniform3uiv(location, count, values),
                4 => self.extra.Uniform4uiv(location, count, values),
                _ => tracing::error!("glUniform{}uiv: bad component count", components),
            }
        }
    }

    fn uniform_dv(&self, components: u32, location: GLint, values: &[f64]) {
        let count = (values.len() / components.max(1) as usize) as GLsizei;
        let values = values.as_ptr();
        unsafe {
            match components {
                1 => self.extra.Uniform1dv(location, count, values),
                2 => self.extra.Uniform2dv(location, count, values),
                3 => self.extra.Uniform3dv(location, count, values),
                4 => self.extra.Uniform4dv(location, count, values),
                _ => tracing::error!("glUniform{}dv: bad component count", components),
            }
        }
    }

    fn uniform_matrix_fv(&self, cols: u32, rows: u32, location: GLint, transpose: bool, values: &[f32]) {
        let count = (values.len() / (cols * rows).max(1) as usize) as GLsizei;
        let t = transpose as GLboolean;
        let ptr = values.as_ptr();
        match (cols, rows) {
            (2, 2) => self.gl.uniform_matrix_2fv(location, transpose, values),
            (3, 3) => self.gl.uniform_matrix_3fv(location, transpose, values),
            (4, 4) => self.gl.uniform_matrix_4fv(location, transpose, values),
            (2, 3) => unsafe { self.extra.UniformMatrix2x3fv(location, count, t, ptr) },
            (2, 4) => unsafe { self.extra.UniformMatrix2x4fv(location, count, t, ptr) },
            (3, 2) => unsafe { self.extra.UniformMatrix3x2fv(location, count, t, ptr) },
            (3, 4) => unsafe { self.extra.UniformMatrix3x4fv(location, count, t, ptr) },
            (4, 2) => unsafe { self.extra.UniformMatrix4x2fv(location, count, t, ptr) },
            (4, 3) => unsafe { self.extra.UniformMatrix4x3fv(location, count, t, ptr) },
            _ => tracing::error!("glUniformMatrix{}x{}fv: bad shape", cols, rows),
        }
    }

    fn uniform_matrix_dv(&self, cols: u32, rows: u32, location: GLint, transpose: bool, values: &[f64]) {
        let count = (values.len() / (cols * rows).max(1) as usize) as GLsizei;
        let t = transpose as GLboolean;
        let ptr = values.as_ptr();
        unsafe {
            match (cols, rows) {
                (2, 2) => self.extra.UniformMatrix2dv(location, count, t, ptr),
                (3, 3) => self.extra.UniformMatrix3dv(location, count, t, ptr),
                (4, 4) => self.extra.UniformMatrix4dv(location, count, t, ptr),
                (2, 3) => self.extra.UniformMatrix2x3dv(location, count, t, ptr),
                (2, 4) => self.extra.UniformMatrix2x4dv(location, count, t, ptr),
                (3, 2) => self.extra.UniformMatrix3x2dv(location, count, t, ptr),
                (3, 4) => self.extra.UniformMatrix3x4dv(location, count, t, ptr),
                (4, 2) => self.extra.UniformMatrix4x2dv(location, count, t, ptr),
                (4, 3) => self.extra.UniformMatrix4x3dv(location, count, t, ptr),
                _ => tracing::error!("glUniformMatrix{}x{}dv: bad shape", cols, rows),
            }
        }
    }

    fn get_uniform_block_index(&self, program: GLuint, name: &str) -> GLuint {
        self.gl.get_uniform_block_index(program, name)
    }

    fn get_active_uniform_block_i(&self, program: GLuint, index: GLuint, pname: GLenum) -> GLint {
        self.gl.get_active_uniform_block_i(program, index, pname)
    }

    fn get_active_uniform_block_name(&self, program: GLuint, index: GLuint) -> String {
        self.gl.get_active_uniform_block_name(program, index)
    }

    fn uniform_block_binding(&self, program: GLuint, uniform_block_index: GLuint, uniform_block_binding: GLuint) {
        self.gl
            .uniform_block_binding(program, uniform_block_index, uniform_block_binding)
    }

    fn is_program_pipeline(&self, pipeline: GLuint) -> GLboolean {
        unsafe { self.extra.IsProgramPipeline(pipeline) }
    }

    fn gen_program_pipelines(&self, n: GLsizei) -> Vec<GLuint> {
        let mut pipelines = vec![0; n.max(0) as usize];
        unsafe { self.extra.GenProgramPipelines(n.max(0), pipelines.as_mut_ptr()) };
        pipelines
    }

    fn bind_program_pipeline(&self, pipeline: GLuint) {
        unsafe { self.extra.BindProgramPipeline(pipeline) }
    }

    fn delete_program_pipelines(&self, pipelines: &[GLuint]) {
        unsafe {
            self.extra
                .DeleteProgramPipelines(pipelines.len() as GLsizei, pipelines.as_ptr())
        }
    }

    fn use_program_stages(&self, pipeline: GLuint, stages: GLbitfield, program: GLuint) {
        unsafe { self.extra.UseProgramStages(pipeline, stages, program) }
    }

    fn active_shader_program(&self, pipeline: GLuint, program: GLuint) {
        unsafe { self.extra.ActiveShaderProgram(pipeline, program) }
    }

    fn get_program_pipeline_iv(&self, pipeline: GLuint, pname: GLenum) -> GLint {
        let mut result = 0;
        unsafe { self.extra.GetProgramPipelineiv(pipeline, pname, &mut result) };
        result
    }

    fn is_vertex_array(&self, vao: GLuint) -> GLboolean {
        unsafe { self.extra.IsVertexArray(vao) }
    }

    fn gen_vertex_arrays(&self, n: GLsizei) -> Vec<GLuint> {
        self.gl.gen_vertex_arrays(n)
    }

    fn bind_vertex_array(&self, vao: GLuint) {
        self.gl.bind_vertex_array(vao)
    }

    fn delete_vertex_arrays(&self, vertex_arrays: &[GLuint]) {
        self.gl.delete_vertex_arrays(vertex_arrays)
    }

    fn get_vertex_attrib_iv(&self, index: GLuint, pname: GLenum) -> GLint {
        let mut result = [0];
        unsafe { self.gl.get_vertex_attrib_iv(index, pname, &mut result) };
        result[0]
    }

    fn get_vertex_attrib_pointer_v(&self, index: GLuint, pname: GLenum) -> u64 {
        let mut pointer: *mut c_void = ptr::null_mut();
        unsafe { self.extra.GetVertexAttribPointerv(index, pname, &mut pointer) };
        pointer as usize as u64
    }

    // Pointers are offsets into the bound array buffer, or client memory
    // addresses; either way they may not fit gleam's `GLuint` offsets.
    fn vertex_attrib_pointer(
        &self,
        index: GLuint,
        size: GLint,
        type_: GLenum,
        normalized: bool,
        stride: GLsizei,
        pointer: u64,
    ) {
        unsafe {
            self.extra.VertexAttribPointer(
                index,
                size,
                type_,
                normalized as GLboolean,
                stride,
                pointer as usize as *const c_void,
            )
        }
    }

    fn vertex_attrib_i_pointer(&self, index: GLuint, size: GLint, type_: GLenum, stride: GLsizei, pointer: u64) {
        unsafe {
            self.extra
                .VertexAttribIPointer(index, size, type_, stride, pointer as usize as *const c_void)
        }
    }

    fn vertex_attrib_divisor(&self, index: GLuint, divisor: GLuint) {
        self.gl.vertex_attrib_divisor(index, divisor)
    }

    fn enable_vertex_attrib_array(&self, index: GLuint) {
        self.gl.enable_vertex_attrib_array(index)
    }

    fn disable_vertex_attrib_array(&self, index: GLuint) {
        self.gl.disable_vertex_attrib_array(index)
    }
}
