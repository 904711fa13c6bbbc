//! The GL entry points the state objects use.
//!
//! `GlApi` is the narrowest interface that lets us snapshot and restore the
//! objects we handle. Methods follow `gleam::gl::Gl`'s naming and argument
//! conventions, but queries return their results rather than filling
//! caller-provided slices, and nothing is `unsafe`: implementations are
//! responsible for sizing buffers.
//!
//! `GleamGl` implements this for a real context; tests use a recording fake.

use gleam::gl::{GLboolean, GLbitfield, GLenum, GLint, GLsizei, GLuint};

pub trait GlApi {
    // Errors and general queries.
    fn get_error(&self) -> GLenum;
    fn get_integer_v(&self, pname: GLenum, result: &mut [GLint]);
    fn get_integer_iv(&self, pname: GLenum, index: GLuint, result: &mut [GLint]);
    fn get_string(&self, which: GLenum) -> String;
    fn get_string_i(&self, which: GLenum, index: GLuint) -> String;

    fn get_integer(&self, pname: GLenum) -> GLint {
        let mut result = [0];
        self.get_integer_v(pname, &mut result);
        result[0]
    }

    // Framebuffers.
    fn is_framebuffer(&self, framebuffer: GLuint) -> GLboolean;
    fn gen_framebuffers(&self, n: GLsizei) -> Vec<GLuint>;
    fn bind_framebuffer(&self, target: GLenum, framebuffer: GLuint);
    fn delete_framebuffers(&self, framebuffers: &[GLuint]);
    fn check_frame_buffer_status(&self, target: GLenum) -> GLenum;
    fn get_framebuffer_attachment_parameter_iv(
        &self,
        target: GLenum,
        attachment: GLenum,
        pname: GLenum,
    ) -> GLint;
    fn framebuffer_renderbuffer(
        &self,
        target: GLenum,
        attachment: GLenum,
        renderbuffertarget: GLenum,
        renderbuffer: GLuint,
    );
    fn framebuffer_texture(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: GLint);
    fn framebuffer_texture_1d(
        &self,
        target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: GLint,
    );
    fn framebuffer_texture_2d(
        &self,
        target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: GLint,
    );
    fn framebuffer_texture_layer(
        &self,
        target: GLenum,
        attachment: GLenum,
        texture: GLuint,
        level: GLint,
        layer: GLint,
    );
    fn draw_buffer(&self, mode: GLenum);
    fn draw_buffers(&self, bufs: &[GLenum]);
    fn read_buffer(&self, mode: GLenum);

    // Binding points and object deletion.
    fn bind_texture(&self, target: GLenum, texture: GLuint);
    fn bind_renderbuffer(&self, target: GLenum, renderbuffer: GLuint);
    fn bind_buffer(&self, target: GLenum, buffer: GLuint);
    fn bind_sampler(&self, unit: GLuint, sampler: GLuint);
    fn active_texture(&self, texture: GLenum);
    fn client_active_texture(&self, texture: GLenum);
    fn matrix_mode(&self, mode: GLenum);
    fn pixel_store_i(&self, name: GLenum, param: GLint);
    fn delete_textures(&self, textures: &[GLuint]);
    fn delete_renderbuffers(&self, renderbuffers: &[GLuint]);
    fn delete_buffers(&self, buffers: &[GLuint]);
    fn delete_queries(&self, queries: &[GLuint]);
    fn delete_samplers(&self, samplers: &[GLuint]);
    fn delete_transform_feedbacks(&self, feedbacks: &[GLuint]);
    fn delete_lists(&self, list: GLuint, range: GLsizei);

    // Shaders.
    fn is_shader(&self, shader: GLuint) -> GLboolean;
    fn create_shader(&self, shader_type: GLenum) -> GLuint;
    fn shader_source(&self, shader: GLuint, source: &str);
    fn compile_shader(&self, shader: GLuint);
    fn delete_shader(&self, shader: GLuint);
    fn get_shader_iv(&self, shader: GLuint, pname: GLenum) -> GLint;
    fn get_shader_info_log(&self, shader: GLuint) -> String;
    fn get_shader_source(&self, shader: GLuint) -> String;

    // Programs.
    fn is_program(&self, program: GLuint) -> GLboolean;
    fn create_program(&self) -> GLuint;
    fn create_shader_program_v(&self, shader_type: GLenum, strings: &[&str]) -> GLuint;
    fn delete_program(&self, program: GLuint);
    fn attach_shader(&self, program: GLuint, shader: GLuint);
    fn detach_shader(&self, program: GLuint, shader: GLuint);
    fn link_program(&self, program: GLuint);
    fn use_program(&self, program: GLuint);
    fn get_program_iv(&self, program: GLuint, pname: GLenum) -> GLint;
    fn get_program_info_log(&self, program: GLuint) -> String;
    fn get_attached_shaders(&self, program: GLuint) -> Vec<GLuint>;
    fn program_parameter_i(&self, program: GLuint, pname: GLenum, value: GLint);
    fn program_binary(&self, program: GLuint, format: GLenum, binary: &[u8]);
    fn get_program_binary(&self, program: GLuint) -> (Vec<u8>, GLenum);

    // Attributes, outputs and transform feedback.
    fn get_active_attrib(&self, program: GLuint, index: GLuint) -> (GLint, GLenum, String);
    fn get_attrib_location(&self, program: GLuint, name: &str) -> GLint;
    fn bind_attrib_location(&self, program: GLuint, index: GLuint, name: &str);
    fn get_frag_data_location(&self, program: GLuint, name: &str) -> GLint;
    fn get_frag_data_index(&self, program: GLuint, name: &str) -> GLint;
    fn bind_frag_data_location(&self, program: GLuint, color_number: GLuint, name: &str);
    fn bind_frag_data_location_indexed(
        &self,
        program: GLuint,
        color_number: GLuint,
        index: GLuint,
        name: &str,
    );
    fn get_program_interface_iv(&self, program: GLuint, interface: GLenum, pname: GLenum) -> GLint;
    fn get_program_resource_name(&self, program: GLuint, interface: GLenum, index: GLuint) -> String;
    fn get_program_resource_iv(
        &self,
        program: GLuint,
        interface: GLenum,
        index: GLuint,
        props: &[GLenum],
    ) -> Vec<GLint>;
    fn get_transform_feedback_varying(&self, program: GLuint, index: GLuint) -> (GLint, GLenum, String);
    fn transform_feedback_varyings(&self, program: GLuint, varyings: &[&str], buffer_mode: GLenum);

    // Uniforms.
    fn get_active_uniform(&self, program: GLuint, index: GLuint) -> (GLint, GLenum, String);
    fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint;
    fn get_uniform_fv(&self, program: GLuint, location: GLint, result: &mut [f32]);
    fn get_uniform_iv(&self, program: GLuint, location: GLint, result: &mut [i32]);
    fn get_uniform_uiv(&self, program: GLuint, location: GLint, result: &mut [u32]);
    fn get_uniform_dv(&self, program: GLuint, location: GLint, result: &mut [f64]);

    /// Set a float vector uniform array: `glUniform{components}fv`.
    fn uniform_fv(&self, components: u32, location: GLint, values: &[f32]);
    fn uniform_iv(&self, components: u32, location: GLint, values: &[i32]);
    fn uniform_uiv(&self, components: u32, location: GLint, values: &[u32]);
    fn uniform_dv(&self, components: u32, location: GLint, values: &[f64]);
    /// Set a matrix uniform array: `glUniformMatrix{cols}x{rows}fv`.
    fn uniform_matrix_fv(&self, cols: u32, rows: u32, location: GLint, transpose: bool, values: &[f32]);
    fn uniform_matrix_dv(&self, cols: u32, rows: u32, location: GLint, transpose: bool, values: &[f64]);

    fn get_uniform_block_index(&self, program: GLuint, name: &str) -> GLuint;
    fn get_active_uniform_block_i(&self, program: GLuint, index: GLuint, pname: GLenum) -> GLint;
    fn get_active_uniform_block_name(&self, program: GLuint, index: GLuint) -> String;
    fn uniform_block_binding(&self, program: GLuint, uniform_block_index: GLuint, uniform_block_binding: GLuint);

    // Separable program pipelines.
    fn is_program_pipeline(&self, pipeline: GLuint) -> GLboolean;
    fn gen_program_pipelines(&self, n: GLsizei) -> Vec<GLuint>;
    fn bind_program_pipeline(&self, pipeline: GLuint);
    fn delete_program_pipelines(&self, pipelines: &[GLuint]);
    fn use_program_stages(&self, pipeline: GLuint, stages: GLbitfield, program: GLuint);
    fn active_shader_program(&self, pipeline: GLuint, program: GLuint);
    fn get_program_pipeline_iv(&self, pipeline: GLuint, pname: GLenum) -> GLint;

    // Vertex arrays.
    fn is_vertex_array(&self, vao: GLuint) -> GLboolean;
    fn gen_vertex_arrays(&self, n: GLsizei) -> Vec<GLuint>;
    fn bind_vertex_array(&self, vao: GLuint);
    fn delete_vertex_arrays(&self, vertex_arrays: &[GLuint]);
    fn get_vertex_attrib_iv(&self, index: GLuint, pname: GLenum) -> GLint;
    fn get_vertex_attrib_pointer_v(&self, index: GLuint, pname: GLenum) -> u64;
    fn vertex_attrib_pointer(
        &self,
        index: GLuint,
        size: GLint,
        type_: GLenum,
        normalized: bool,
        stride: GLsizei,
        pointer: u64,
    );
    fn vertex_attrib_i_pointer(&self, index: GLuint, size: GLint, type_: GLenum, stride: GLsizei, pointer: u64);
    fn vertex_attrib_divisor(&self, index: GLuint, divisor: GLuint);
    fn enable_vertex_attrib_array(&self, index: GLuint);
    fn disable_vertex_attrib_array(&self, index: GLuint);
}
