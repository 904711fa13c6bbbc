//! A GL context simulated in memory, for tests.
//!
//! `FakeGl` keeps just enough object state for snapshots and restores to be
//! checked against it: names, bindings, framebuffer attachments, vertex
//! arrays, pipelines, and shaders and programs. Shaders are "compiled" by
//! scanning their global declarations, which is all linking needs to build
//! the program's attribute, uniform, block and output tables. A source
//! containing `#error` fails to compile.
//!
//! Every call that changes state is appended to a log, which tests inspect
//! with `calls`. Misuse pushes the error GL would raise.

use gleam::gl::{GLbitfield, GLboolean, GLenum, GLint, GLsizei, GLuint};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::enums;
use crate::gl_api::GlApi;
use crate::gl_utils::{object_category_from_target, target_from_binding, uniform_type_info, UniformBaseType};
use crate::handle::Namespace;

pub use crate::call::Call;

const MAX_VERTEX_ATTRIBS: usize = 16;
const MAX_DRAW_BUFFERS: usize = 8;
const MAX_COLOR_ATTACHMENTS: GLenum = 8;
const MAX_UNIFORM_BUFFER_BINDINGS: GLuint = 36;
const MAX_TEXTURE_UNITS: GLenum = 32;
const INVALID_INDEX: GLuint = 0xFFFF_FFFF;

const EXTENSIONS: &[&str] = &[
    "GL_ARB_blend_func_extended",
    "GL_ARB_geometry_shader4",
    "GL_ARB_get_program_binary",
    "GL_ARB_program_interface_query",
    "GL_ARB_separate_shader_objects",
    "GL_ARB_uniform_buffer_object",
    "GL_ARB_vertex_array_object",
];

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

const GLSL_TYPES: &[(&str, GLenum)] = &[
    ("float", enums::FLOAT),
    ("vec2", enums::FLOAT_VEC2),
    ("vec3", enums::FLOAT_VEC3),
    ("vec4", enums::FLOAT_VEC4),
    ("double", enums::DOUBLE),
    ("dvec2", enums::DOUBLE_VEC2),
    ("dvec3", enums::DOUBLE_VEC3),
    ("dvec4", enums::DOUBLE_VEC4),
    ("int", enums::INT),
    ("ivec2", enums::INT_VEC2),
    ("ivec3", enums::INT_VEC3),
    ("ivec4", enums::INT_VEC4),
    ("uint", enums::UNSIGNED_INT),
    ("uvec2", enums::UNSIGNED_INT_VEC2),
    ("uvec3", enums::UNSIGNED_INT_VEC3),
    ("uvec4", enums::UNSIGNED_INT_VEC4),
    ("bool", enums::BOOL),
    ("bvec2", enums::BOOL_VEC2),
    ("bvec3", enums::BOOL_VEC3),
    ("bvec4", enums::BOOL_VEC4),
    ("mat2", enums::FLOAT_MAT2),
    ("mat3", enums::FLOAT_MAT3),
    ("mat4", enums::FLOAT_MAT4),
    ("mat2x3", enums::FLOAT_MAT2x3),
    ("mat2x4", enums::FLOAT_MAT2x4),
    ("mat3x2", enums::FLOAT_MAT3x2),
    ("mat3x4", enums::FLOAT_MAT3x4),
    ("mat4x2", enums::FLOAT_MAT4x2),
    ("mat4x3", enums::FLOAT_MAT4x3),
    ("dmat2", enums::DOUBLE_MAT2),
    ("dmat3", enums::DOUBLE_MAT3),
    ("dmat4", enums::DOUBLE_MAT4),
    ("sampler1D", enums::SAMPLER_1D),
    ("sampler2D", enums::SAMPLER_2D),
    ("sampler3D", enums::SAMPLER_3D),
    ("samplerCube", enums::SAMPLER_CUBE),
    ("sampler2DShadow", enums::SAMPLER_2D_SHADOW),
    ("sampler2DArray", enums::SAMPLER_2D_ARRAY),
    ("sampler2DRect", enums::SAMPLER_2D_RECT),
    ("samplerBuffer", enums::SAMPLER_BUFFER),
    ("isampler2D", enums::INT_SAMPLER_2D),
    ("isampler3D", enums::INT_SAMPLER_3D),
    ("usampler2D", enums::UNSIGNED_INT_SAMPLER_2D),
    ("usamplerCube", enums::UNSIGNED_INT_SAMPLER_CUBE),
    ("image2D", enums::IMAGE_2D),
    ("image3D", enums::IMAGE_3D),
    ("atomic_uint", enums::UNSIGNED_INT_ATOMIC_COUNTER),
];

const SKIPPED_QUALIFIERS: &[&str] = &[
    "flat", "smooth", "noperspective", "centroid", "invariant", "highp", "mediump", "lowp",
];

/// One global variable declaration.
#[derive(Clone, Debug)]
struct Variable {
    name: String,
    type_: GLenum,
    /// 0 for non-arrays.
    array_size: GLint,
    location: Option<GLint>,
}

impl Variable {
    fn elements(&self) -> GLint {
        self.array_size.max(1)
    }
}

#[derive(Clone, Debug)]
struct BlockDecl {
    name: String,
    members: Vec<Variable>,
}

#[derive(Clone, Debug, Default)]
struct Declarations {
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    uniforms: Vec<Variable>,
    blocks: Vec<BlockDecl>,
}

fn glsl_type(name: &str) -> Option<GLenum> {
    GLSL_TYPES.iter().find(|&&(n, _)| n == name).map(|&(_, ty)| ty)
}

fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, c) in text[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a leading `layout(...)` off a declaration, returning any
/// `location = N` it gave.
fn strip_layout(decl: &str) -> Result<(Option<GLint>, &str), String> {
    let decl = decl.trim();
    let rest = match decl.strip_prefix("layout") {
        Some(rest) => rest.trim_start(),
        None => return Ok((None, decl)),
    };
    let close = rest.find(')').ok_or_else(|| "unterminated layout qualifier".to_string())?;
    let mut location = None;
    for item in rest[1..close].split(',') {
        let mut parts = item.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        if key == "location" {
            let value = parts.next().unwrap_or("").trim();
            location = Some(value.parse().map_err(|_| format!("bad location '{}'", value))?);
        }
    }
    Ok((location, rest[close + 1..].trim()))
}

/// Parse `type name[, name...]` into variables.
fn parse_declarators(decl: &str, location: Option<GLint>) -> Result<Vec<Variable>, String> {
    let decl = decl.split('=').next().unwrap_or("");
    let mut words = decl.split_whitespace().skip_while(|w| SKIPPED_QUALIFIERS.contains(w));
    let type_name = words.next().ok_or_else(|| "missing type".to_string())?;
    let type_ = glsl_type(type_name).ok_or_else(|| format!("unknown type '{}'", type_name))?;
    let names: String = words.collect::<Vec<_>>().join("");

    names
        .split(',')
        .filter(|name| !name.is_empty())
        .map(|name| {
            let (name, array_size) = match name.find('[') {
                Some(open) => {
                    let size = name[open + 1..].trim_end_matches(']');
                    let size = size.parse().map_err(|_| format!("bad array size in '{}'", name))?;
                    (&name[..open], size)
                }
                None => (name, 0),
            };
            Ok(Variable {
                name: name.to_string(),
                type_,
                array_size,
                location,
            })
        })
        .collect()
}

fn scan_statement(statement: &str, decls: &mut Declarations) -> Result<(), String> {
    let (location, statement) = strip_layout(statement)?;
    let mut words = statement.splitn(2, char::is_whitespace);
    let qualifier = words.next().unwrap_or("");
    let rest = words.next().unwrap_or("");
    let list = match qualifier {
        "in" | "attribute" => &mut decls.inputs,
        "out" | "varying" => &mut decls.outputs,
        "uniform" => &mut decls.uniforms,
        // precision statements, constants and the like
        _ => return Ok(()),
    };
    list.extend(parse_declarators(rest, location)?);
    Ok(())
}

/// Scan the global declarations of a shader.
fn scan_glsl(source: &str) -> Result<Declarations, String> {
    let text: Vec<&str> = source
        .lines()
        .map(|line| match line.find("//") {
            Some(comment) => &line[..comment],
            None => line,
        })
        .map(|line| if line.trim_start().starts_with('#') { "" } else { line })
        .collect();
    let text = text.join("\n");

    let mut decls = Declarations::default();
    let mut rest = text.as_str();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(decls);
        }
        let semi = rest.find(';');
        let brace = rest.find('{');
        match (semi, brace) {
            (_, Some(open)) if semi.map_or(true, |semi| open < semi) => {
                let close = matching_brace(rest, open).ok_or_else(|| "unbalanced braces".to_string())?;
                let head = rest[..open].trim();
                let body = &rest[open + 1..close];
                rest = &rest[close + 1..];

                let (_, head) = strip_layout(head)?;
                if let Some(block_name) = head.strip_prefix("uniform ") {
                    let tail_end = rest.find(';').ok_or_else(|| "missing ';' after block".to_string())?;
                    let instance = rest[..tail_end].trim();
                    rest = &rest[tail_end + 1..];

                    let block_name = block_name.trim();
                    let mut members = Vec::new();
                    for member in body.split(';').filter(|m| !m.trim().is_empty()) {
                        for mut var in parse_declarators(member, None)? {
                            if !instance.is_empty() {
                                var.name = format!("{}.{}", block_name, var.name);
                            }
                            members.push(var);
                        }
                    }
                    decls.blocks.push(BlockDecl {
                        name: block_name.to_string(),
                        members,
                    });
                }
                // Anything else with braces is a function or a struct.
            }
            (Some(semi), _) => {
                let statement = &rest[..semi];
                rest = &rest[semi + 1..];
                scan_statement(statement, &mut decls)?;
            }
            (None, _) => return Err(format!("syntax error near '{}'", rest.lines().next().unwrap_or(""))),
        }
    }
}

fn stage_name(shader_type: GLenum) -> &'static str {
    match shader_type {
        enums::VERTEX_SHADER => "vertex",
        enums::FRAGMENT_SHADER => "fragment",
        enums::GEOMETRY_SHADER => "geometry",
        enums::TESS_CONTROL_SHADER => "tessellation control",
        enums::TESS_EVALUATION_SHADER => "tessellation evaluation",
        enums::COMPUTE_SHADER => "compute",
        _ => "unknown",
    }
}

#[derive(Clone, Debug)]
struct Shader {
    type_: GLenum,
    source: String,
    compiled: bool,
    info_log: String,
    decls: Declarations,
    delete_pending: bool,
}

impl Shader {
    fn new(type_: GLenum) -> Shader {
        Shader {
            type_,
            source: String::new(),
            compiled: false,
            info_log: String::new(),
            decls: Declarations::default(),
            delete_pending: false,
        }
    }

    fn compile(&mut self) {
        let result = match self.source.lines().enumerate().find(|(_, line)| line.trim_start().starts_with("#error")) {
            Some((line, text)) => Err(format!("{}: {}", line + 1, text.trim())),
            None => scan_glsl(&self.source),
        };
        match result {
            Ok(decls) => {
                self.compiled = true;
                self.info_log.clear();
                self.decls = decls;
            }
            Err(message) => {
                self.compiled = false;
                self.info_log = format!("ERROR: 0:{}\n", message);
                self.decls = Declarations::default();
            }
        }
    }
}

#[derive(Clone, Debug)]
struct ActiveVariable {
    name: String,
    type_: GLenum,
    size: GLint,
    location: GLint,
    index: GLint,
}

#[derive(Clone, Debug)]
struct ActiveUniform {
    name: String,
    type_: GLenum,
    size: GLint,
    /// -1 for block members.
    location: GLint,
    /// Raw words of every element.
    values: Vec<u32>,
}

impl ActiveUniform {
    /// The name `glGetActiveUniform` reports.
    fn reported_name(&self) -> String {
        if self.size > 1 {
            format!("{}[0]", self.name)
        } else {
            self.name.clone()
        }
    }

    fn words_per_element(&self) -> usize {
        uniform_type_info(self.type_).map_or(0, |info| info.size_in_glints() as usize)
    }
}

#[derive(Clone, Debug)]
struct ActiveBlock {
    name: String,
    binding: GLuint,
    data_size: GLint,
    active_uniforms: GLint,
    referenced_by: Vec<GLenum>,
}

#[derive(Clone, Debug)]
struct Linked {
    attribs: Vec<ActiveVariable>,
    uniforms: Vec<ActiveUniform>,
    blocks: Vec<ActiveBlock>,
    outputs: Vec<ActiveVariable>,
    varyings: Vec<ActiveVariable>,
    feedback_mode: GLenum,
}

impl Default for Linked {
    fn default() -> Linked {
        Linked {
            attribs: Vec::new(),
            uniforms: Vec::new(),
            blocks: Vec::new(),
            outputs: Vec::new(),
            varyings: Vec::new(),
            feedback_mode: enums::INTERLEAVED_ATTRIBS,
        }
    }
}

impl Linked {
    /// The uniform occupying `location`, and which element of it.
    fn uniform_at(&self, location: GLint) -> Option<(usize, usize)> {
        self.uniforms
            .iter()
            .position(|u| u.location >= 0 && location >= u.location && location < u.location + u.size)
            .map(|i| (i, (location - self.uniforms[i].location) as usize))
    }

    fn uniform_location(&self, name: &str) -> GLint {
        if name.starts_with("gl_") {
            return -1;
        }
        let (base, element) = match name.find('[') {
            Some(open) => match name[open + 1..].trim_end_matches(']').parse::<GLint>() {
                Ok(element) => (&name[..open], element),
                Err(_) => return -1,
            },
            None => (name, 0),
        };
        match self.uniforms.iter().find(|u| u.name == base) {
            Some(u) if u.location >= 0 && element < u.size => u.location + element,
            _ => -1,
        }
    }
}

/// The std140 size of a block member.
fn std140_size(var: &Variable) -> (GLint, GLint) {
    let info = match uniform_type_info(var.type_) {
        Some(info) => info,
        None => return (4, 4),
    };
    let scalar = if info.base == UniformBaseType::Double { 8 } else { 4 };
    if info.is_matrix() || var.array_size > 0 {
        let stride = 16.max(scalar * 4);
        (16, stride * info.columns as GLint * var.elements())
    } else {
        let size = scalar * info.rows as GLint;
        let align = match info.rows {
            1 => scalar,
            2 => scalar * 2,
            _ => scalar * 4,
        };
        (align, size)
    }
}

fn block_data_size(members: &[Variable]) -> GLint {
    let mut offset = 0;
    for member in members {
        let (align, size) = std140_size(member);
        offset = (offset + align - 1) / align * align + size;
    }
    (offset + 15) / 16 * 16
}

/// Hand out locations: fixed ones first, then the lowest free ones.
fn assign_locations(vars: &mut [ActiveVariable], fixed: impl Fn(&ActiveVariable) -> Option<GLint>) {
    let mut used = BTreeSet::new();
    for var in vars.iter_mut() {
        if let Some(location) = fixed(var) {
            var.location = location;
            used.insert(location);
        }
    }
    let mut next = 0;
    for var in vars.iter_mut().filter(|var| var.location < 0) {
        while used.contains(&next) {
            next += 1;
        }
        var.location = next;
        used.insert(next);
    }
}

#[derive(Clone, Debug, Default)]
struct Program {
    attached: Vec<GLuint>,
    delete_pending: bool,
    separable: bool,
    retrievable_hint: bool,
    attrib_bindings: BTreeMap<String, GLuint>,
    frag_bindings: BTreeMap<String, (GLuint, GLuint)>,
    feedback_names: Vec<String>,
    feedback_mode: Option<GLenum>,
    link_status: bool,
    info_log: String,
    linked: Linked,
}

impl Program {
    fn link(&self, shaders: &[&Shader]) -> Result<Linked, String> {
        if shaders.is_empty() {
            return Err("no shaders attached".to_string());
        }
        if let Some(shader) = shaders.iter().find(|shader| !shader.compiled) {
            return Err(format!("{} shader is not compiled", stage_name(shader.type_)));
        }

        let mut linked = Linked::default();
        if let Some(mode) = self.feedback_mode {
            linked.feedback_mode = mode;
        }

        let to_active = |var: &Variable| ActiveVariable {
            name: var.name.clone(),
            type_: var.type_,
            size: var.elements(),
            location: -1,
            index: 0,
        };

        if let Some(vs) = shaders.iter().find(|s| s.type_ == enums::VERTEX_SHADER) {
            linked.attribs = vs.decls.inputs.iter().map(to_active).collect();
            let inputs = &vs.decls.inputs;
            assign_locations(&mut linked.attribs, |attrib| {
                let declared = inputs.iter().find(|i| i.name == attrib.name).and_then(|i| i.location);
                declared.or_else(|| self.attrib_bindings.get(&attrib.name).map(|&l| l as GLint))
            });
        }

        if let Some(fs) = shaders.iter().find(|s| s.type_ == enums::FRAGMENT_SHADER) {
            linked.outputs = fs.decls.outputs.iter().map(to_active).collect();
            for output in &mut linked.outputs {
                if let Some(&(_, index)) = self.frag_bindings.get(&output.name) {
                    output.index = index as GLint;
                }
            }
            let outputs = &fs.decls.outputs;
            assign_locations(&mut linked.outputs, |output| {
                let declared = outputs.iter().find(|o| o.name == output.name).and_then(|o| o.location);
                declared.or_else(|| self.frag_bindings.get(&output.name).map(|&(l, _)| l as GLint))
            });
        }

        let mut next_location = 0;
        for shader in shaders {
            for var in &shader.decls.uniforms {
                if let Some(existing) = linked.uniforms.iter().find(|u| u.name == var.name) {
                    if existing.type_ != var.type_ || existing.size != var.elements() {
                        return Err(format!("uniform '{}' is declared differently in two stages", var.name));
                    }
                    continue;
                }
                let words = uniform_type_info(var.type_).map_or(0, |info| info.size_in_glints() as usize);
                linked.uniforms.push(ActiveUniform {
                    name: var.name.clone(),
                    type_: var.type_,
                    size: var.elements(),
                    location: next_location,
                    values: vec![0; words * var.elements() as usize],
                });
                next_location += var.elements();
            }
        }

        for shader in shaders {
            for decl in &shader.decls.blocks {
                if let Some(block) = linked.blocks.iter_mut().find(|b| b.name == decl.name) {
                    block.referenced_by.push(shader.type_);
                    continue;
                }
                linked.blocks.push(ActiveBlock {
                    name: decl.name.clone(),
                    binding: 0,
                    data_size: block_data_size(&decl.members),
                    active_uniforms: decl.members.len() as GLint,
                    referenced_by: vec![shader.type_],
                });
                for member in &decl.members {
                    linked.uniforms.push(ActiveUniform {
                        name: member.name.clone(),
                        type_: member.type_,
                        size: member.elements(),
                        location: -1,
                        values: Vec::new(),
                    });
                }
            }
        }

        let feedback_stage = shaders
            .iter()
            .find(|s| s.type_ == enums::GEOMETRY_SHADER)
            .or_else(|| shaders.iter().find(|s| s.type_ == enums::VERTEX_SHADER));
        for name in &self.feedback_names {
            let var = feedback_stage
                .and_then(|stage| stage.decls.outputs.iter().find(|o| &o.name == name))
                .ok_or_else(|| format!("unknown transform feedback varying '{}'", name))?;
            linked.varyings.push(to_active(var));
        }

        Ok(linked)
    }
}

#[derive(Copy, Clone, Debug)]
struct Attachment {
    type_: GLenum,
    name: GLuint,
    level: GLint,
    face: GLenum,
    layer: GLint,
    layered: bool,
}

#[derive(Clone, Debug)]
struct Framebuffer {
    attachments: BTreeMap<GLenum, Attachment>,
    draw_buffers: Vec<GLenum>,
    read_buffer: GLenum,
}

impl Framebuffer {
    fn new(first: GLenum) -> Framebuffer {
        let mut draw_buffers = vec![enums::NONE; MAX_DRAW_BUFFERS];
        draw_buffers[0] = first;
        Framebuffer {
            attachments: BTreeMap::new(),
            draw_buffers,
            read_buffer: first,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct VertexAttrib {
    enabled: bool,
    size: GLint,
    type_: GLenum,
    normalized: bool,
    stride: GLsizei,
    integer: bool,
    divisor: GLuint,
    buffer: GLuint,
    pointer: u64,
}

impl Default for VertexAttrib {
    fn default() -> VertexAttrib {
        VertexAttrib {
            enabled: false,
            size: 4,
            type_: enums::FLOAT,
            normalized: false,
            stride: 0,
            integer: false,
            divisor: 0,
            buffer: 0,
            pointer: 0,
        }
    }
}

#[derive(Clone, Debug)]
struct VertexArray {
    element_array_buffer: GLuint,
    attribs: Vec<VertexAttrib>,
}

impl Default for VertexArray {
    fn default() -> VertexArray {
        VertexArray {
            element_array_buffer: 0,
            attribs: vec![VertexAttrib::default(); MAX_VERTEX_ATTRIBS],
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Pipeline {
    stages: BTreeMap<GLenum, GLuint>,
    active_program: GLuint,
}

const PIPELINE_STAGES: &[(GLbitfield, GLenum)] = &[
    (enums::VERTEX_SHADER_BIT, enums::VERTEX_SHADER),
    (enums::FRAGMENT_SHADER_BIT, enums::FRAGMENT_SHADER),
    (enums::GEOMETRY_SHADER_BIT, enums::GEOMETRY_SHADER),
    (enums::TESS_CONTROL_SHADER_BIT, enums::TESS_CONTROL_SHADER),
    (enums::TESS_EVALUATION_SHADER_BIT, enums::TESS_EVALUATION_SHADER),
];

/// How a `glUniform*` call passes its values.
#[derive(Copy, Clone, Debug, PartialEq)]
enum ValueKind {
    Float,
    Double,
    Int,
    UnsignedInt,
}

fn accepts(base: UniformBaseType, kind: ValueKind) -> bool {
    match base {
        UniformBaseType::Float => kind == ValueKind::Float,
        UniformBaseType::Double => kind == ValueKind::Double,
        UniformBaseType::Int | UniformBaseType::Sampler | UniformBaseType::Image => kind == ValueKind::Int,
        UniformBaseType::UnsignedInt | UniformBaseType::AtomicCounter => kind == ValueKind::UnsignedInt,
        UniformBaseType::Bool => kind != ValueKind::Double,
    }
}

fn same_kind(base: UniformBaseType, kind: ValueKind) -> bool {
    base != UniformBaseType::Bool && accepts(base, kind)
}

/// Component `i` of a stored element, as a double.
fn component_value(base: UniformBaseType, words: &[u32], i: usize) -> f64 {
    match base {
        UniformBaseType::Float => f64::from(f32::from_bits(words[i])),
        UniformBaseType::Double => f64::from_bits(u64::from(words[2 * i]) | (u64::from(words[2 * i + 1]) << 32)),
        UniformBaseType::UnsignedInt | UniformBaseType::AtomicCounter => f64::from(words[i]),
        _ => f64::from(words[i] as i32),
    }
}

struct State {
    next_name: GLuint,
    errors: VecDeque<GLenum>,
    calls: Vec<Call>,

    integers: BTreeMap<GLenum, GLint>,
    textures: BTreeMap<GLuint, GLenum>,
    texture_bindings: BTreeMap<(GLenum, GLenum), GLuint>,
    sampler_bindings: BTreeMap<GLuint, GLuint>,
    renderbuffers: BTreeSet<GLuint>,
    renderbuffer_binding: GLuint,
    buffer_bindings: BTreeMap<GLenum, GLuint>,

    reserved_framebuffers: BTreeSet<GLuint>,
    framebuffers: BTreeMap<GLuint, Framebuffer>,
    draw_framebuffer: GLuint,
    read_framebuffer: GLuint,

    shaders: BTreeMap<GLuint, Shader>,
    programs: BTreeMap<GLuint, Program>,
    current_program: GLuint,

    reserved_pipelines: BTreeSet<GLuint>,
    pipelines: BTreeMap<GLuint, Pipeline>,
    pipeline_binding: GLuint,

    reserved_vertex_arrays: BTreeSet<GLuint>,
    vertex_arrays: BTreeMap<GLuint, VertexArray>,
    vertex_array_binding: GLuint,
}

impl State {
    fn new() -> State {
        let mut integers = BTreeMap::new();
        integers.insert(enums::ACTIVE_TEXTURE, enums::TEXTURE0 as GLint);
        integers.insert(enums::CLIENT_ACTIVE_TEXTURE, enums::TEXTURE0 as GLint);
        integers.insert(enums::MATRIX_MODE, enums::MODELVIEW as GLint);
        for &pname in PIXEL_STORE_PNAMES {
            integers.insert(pname, 0);
        }
        integers.insert(enums::UNPACK_ALIGNMENT, 4);
        integers.insert(enums::PACK_ALIGNMENT, 4);

        let mut framebuffers = BTreeMap::new();
        framebuffers.insert(0, Framebuffer::new(enums::BACK));
        let mut vertex_arrays = BTreeMap::new();
        vertex_arrays.insert(0, VertexArray::default());

        State {
            next_name: 1,
            errors: VecDeque::new(),
            calls: Vec::new(),
            integers,
            textures: BTreeMap::new(),
            texture_bindings: BTreeMap::new(),
            sampler_bindings: BTreeMap::new(),
            renderbuffers: BTreeSet::new(),
            renderbuffer_binding: 0,
            buffer_bindings: BTreeMap::new(),
            reserved_framebuffers: BTreeSet::new(),
            framebuffers,
            draw_framebuffer: 0,
            read_framebuffer: 0,
            shaders: BTreeMap::new(),
            programs: BTreeMap::new(),
            current_program: 0,
            reserved_pipelines: BTreeSet::new(),
            pipelines: BTreeMap::new(),
            pipeline_binding: 0,
            reserved_vertex_arrays: BTreeSet::new(),
            vertex_arrays,
            vertex_array_binding: 0,
        }
    }

    fn error(&mut self, error: GLenum) {
        self.errors.push_back(error);
    }

    fn record(&mut self, call: Call) {
        self.calls.push(call);
    }

    fn gen_name(&mut self) -> GLuint {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    fn gen_names(&mut self, n: GLsizei) -> Vec<GLuint> {
        if n < 0 {
            self.error(enums::INVALID_VALUE);
            return Vec::new();
        }
        (0..n).map(|_| self.gen_name()).collect()
    }

    fn active_unit(&self) -> GLenum {
        self.integers.get(&enums::ACTIVE_TEXTURE).map_or(0, |&unit| unit as GLenum - enums::TEXTURE0)
    }

    fn vertex_array(&mut self) -> &mut VertexArray {
        let binding = self.vertex_array_binding;
        self.vertex_arrays.entry(binding).or_insert_with(VertexArray::default)
    }

    fn framebuffer_for(&self, target: GLenum) -> Option<GLuint> {
        match target {
            enums::FRAMEBUFFER | enums::DRAW_FRAMEBUFFER => Some(self.draw_framebuffer),
            enums::READ_FRAMEBUFFER => Some(self.read_framebuffer),
            _ => None,
        }
    }

    fn is_fbo_attachment_point(attachment: GLenum) -> bool {
        (enums::COLOR_ATTACHMENT0..enums::COLOR_ATTACHMENT0 + MAX_COLOR_ATTACHMENTS).contains(&attachment)
            || attachment == enums::DEPTH_ATTACHMENT
            || attachment == enums::STENCIL_ATTACHMENT
            || attachment == enums::DEPTH_STENCIL_ATTACHMENT
    }

    fn attach(&mut self, target: GLenum, attachment: GLenum, value: Option<Attachment>) {
        let fb = match self.framebuffer_for(target) {
            Some(fb) => fb,
            None => return self.error(enums::INVALID_ENUM),
        };
        if fb == 0 {
            return self.error(enums::INVALID_OPERATION);
        }
        if !State::is_fbo_attachment_point(attachment) {
            return self.error(enums::INVALID_ENUM);
        }
        if let Some(value) = &value {
            let exists = if value.type_ == enums::TEXTURE {
                self.textures.contains_key(&value.name)
            } else {
                self.renderbuffers.contains(&value.name)
            };
            if !exists {
                return self.error(enums::INVALID_OPERATION);
            }
        }

        let points: &[GLenum] = if attachment == enums::DEPTH_STENCIL_ATTACHMENT {
            &[enums::DEPTH_ATTACHMENT, enums::STENCIL_ATTACHMENT]
        } else {
            std::slice::from_ref(&attachment)
        };
        if let Some(framebuffer) = self.framebuffers.get_mut(&fb) {
            for &point in points {
                match value {
                    Some(value) => framebuffer.attachments.insert(point, value),
                    None => framebuffer.attachments.remove(&point),
                };
            }
        }
    }

    fn attach_texture(&mut self, target: GLenum, attachment: GLenum, texture: GLuint, level: GLint, face: GLenum, layer: GLint, layered: bool) {
        let value = if texture == 0 {
            None
        } else {
            Some(Attachment {
                type_: enums::TEXTURE,
                name: texture,
                level,
                face,
                layer,
                layered,
            })
        };
        self.attach(target, attachment, value);
    }

    fn attachment_param(&mut self, target: GLenum, attachment: GLenum, pname: GLenum) -> GLint {
        let fb = match self.framebuffer_for(target) {
            Some(fb) => fb,
            None => {
                self.error(enums::INVALID_ENUM);
                return 0;
            }
        };

        let (type_, found) = if fb == 0 {
            let type_ = match attachment {
                enums::BACK_LEFT | enums::DEPTH | enums::STENCIL => enums::FRAMEBUFFER_DEFAULT,
                _ => enums::NONE,
            };
            (type_, None)
        } else {
            if !State::is_fbo_attachment_point(attachment) {
                self.error(enums::INVALID_ENUM);
                return 0;
            }
            let found = self.framebuffers.get(&fb).and_then(|f| f.attachments.get(&attachment)).copied();
            (found.map_or(enums::NONE, |a| a.type_), found)
        };

        match pname {
            enums::FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE => return type_ as GLint,
            enums::FRAMEBUFFER_ATTACHMENT_OBJECT_NAME => return found.map_or(0, |a| a.name as GLint),
            _ if type_ == enums::NONE => {
                self.error(enums::INVALID_OPERATION);
                return 0;
            }
            _ => {}
        }

        let point = match attachment {
            enums::DEPTH => enums::DEPTH_ATTACHMENT,
            enums::STENCIL => enums::STENCIL_ATTACHMENT,
            other => other,
        };
        let is_color = point != enums::DEPTH_ATTACHMENT && point != enums::STENCIL_ATTACHMENT;
        match pname {
            enums::FRAMEBUFFER_ATTACHMENT_RED_SIZE
            | enums::FRAMEBUFFER_ATTACHMENT_GREEN_SIZE
            | enums::FRAMEBUFFER_ATTACHMENT_BLUE_SIZE
            | enums::FRAMEBUFFER_ATTACHMENT_ALPHA_SIZE => {
                if is_color {
                    8
                } else {
                    0
                }
            }
            enums::FRAMEBUFFER_ATTACHMENT_DEPTH_SIZE => {
                if point == enums::DEPTH_ATTACHMENT {
                    24
                } else {
                    0
                }
            }
            enums::FRAMEBUFFER_ATTACHMENT_STENCIL_SIZE => {
                if point == enums::STENCIL_ATTACHMENT {
                    8
                } else {
                    0
                }
            }
            enums::FRAMEBUFFER_ATTACHMENT_COMPONENT_TYPE => {
                if point == enums::STENCIL_ATTACHMENT {
                    enums::UNSIGNED_INT as GLint
                } else {
                    enums::UNSIGNED_NORMALIZED as GLint
                }
            }
            enums::FRAMEBUFFER_ATTACHMENT_COLOR_ENCODING => enums::LINEAR as GLint,
            enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_LEVEL
            | enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_CUBE_MAP_FACE
            | enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_LAYER
            | enums::FRAMEBUFFER_ATTACHMENT_LAYERED => match found.filter(|a| a.type_ == enums::TEXTURE) {
                Some(a) => match pname {
                    enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_LEVEL => a.level,
                    enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_CUBE_MAP_FACE => a.face as GLint,
                    enums::FRAMEBUFFER_ATTACHMENT_TEXTURE_LAYER => a.layer,
                    _ => a.layered as GLint,
                },
                None => {
                    self.error(enums::INVALID_ENUM);
                    0
                }
            },
            _ => {
                self.error(enums::INVALID_ENUM);
                0
            }
        }
    }

    fn framebuffer_status(&mut self, target: GLenum) -> GLenum {
        let fb = match self.framebuffer_for(target) {
            Some(fb) => fb,
            None => {
                self.error(enums::INVALID_ENUM);
                return 0;
            }
        };
        if fb == 0 {
            return enums::FRAMEBUFFER_COMPLETE;
        }
        let attachments = match self.framebuffers.get(&fb) {
            Some(framebuffer) => &framebuffer.attachments,
            None => return enums::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT,
        };
        if attachments.is_empty() {
            return enums::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        let all_exist = attachments.values().all(|a| {
            if a.type_ == enums::TEXTURE {
                self.textures.contains_key(&a.name)
            } else {
                self.renderbuffers.contains(&a.name)
            }
        });
        if all_exist {
            enums::FRAMEBUFFER_COMPLETE
        } else {
            enums::FRAMEBUFFER_INCOMPLETE_ATTACHMENT
        }
    }

    fn integer(&mut self, pname: GLenum) -> Option<GLint> {
        let value = match pname {
            enums::MAJOR_VERSION => 4,
            enums::MINOR_VERSION => 5,
            enums::CONTEXT_PROFILE_MASK => enums::CONTEXT_COMPATIBILITY_PROFILE_BIT as GLint,
            enums::CONTEXT_FLAGS => 0,
            enums::NUM_EXTENSIONS => EXTENSIONS.len() as GLint,
            enums::MAX_VERTEX_ATTRIBS => MAX_VERTEX_ATTRIBS as GLint,
            enums::MAX_DRAW_BUFFERS => MAX_DRAW_BUFFERS as GLint,
            enums::MAX_COLOR_ATTACHMENTS => MAX_COLOR_ATTACHMENTS as GLint,
            enums::MAX_UNIFORM_BUFFER_BINDINGS => MAX_UNIFORM_BUFFER_BINDINGS as GLint,
            enums::MAX_TRANSFORM_FEEDBACK_SEPARATE_ATTRIBS => 4,
            enums::MAX_COMBINED_TEXTURE_IMAGE_UNITS => MAX_TEXTURE_UNITS as GLint,
            enums::DRAW_FRAMEBUFFER_BINDING => self.draw_framebuffer as GLint,
            enums::READ_FRAMEBUFFER_BINDING => self.read_framebuffer as GLint,
            enums::RENDERBUFFER_BINDING => self.renderbuffer_binding as GLint,
            enums::VERTEX_ARRAY_BINDING => self.vertex_array_binding as GLint,
            enums::ELEMENT_ARRAY_BUFFER_BINDING => self.vertex_array().element_array_buffer as GLint,
            enums::CURRENT_PROGRAM => self.current_program as GLint,
            enums::PROGRAM_PIPELINE_BINDING => self.pipeline_binding as GLint,
            enums::SAMPLER_BINDING => {
                let unit = self.active_unit();
                self.sampler_bindings.get(&unit).copied().unwrap_or(0) as GLint
            }
            enums::READ_BUFFER => {
                let fb = self.read_framebuffer;
                self.framebuffers.get(&fb).map_or(enums::NONE, |f| f.read_buffer) as GLint
            }
            _ if (enums::DRAW_BUFFER0..enums::DRAW_BUFFER0 + MAX_DRAW_BUFFERS as GLenum).contains(&pname) => {
                let fb = self.draw_framebuffer;
                let slot = (pname - enums::DRAW_BUFFER0) as usize;
                self.framebuffers.get(&fb).map_or(enums::NONE, |f| f.draw_buffers[slot]) as GLint
            }
            _ => {
                if let Some(&value) = self.integers.get(&pname) {
                    return Some(value);
                }
                let target = target_from_binding(pname)?;
                match object_category_from_target(target)? {
                    Namespace::Textures => {
                        let unit = self.active_unit();
                        self.texture_bindings.get(&(unit, target)).copied().unwrap_or(0) as GLint
                    }
                    Namespace::Buffers => self.buffer_bindings.get(&target).copied().unwrap_or(0) as GLint,
                    _ => return None,
                }
            }
        };
        Some(value)
    }

    fn program(&mut self, program: GLuint) -> Option<&mut Program> {
        if !self.programs.contains_key(&program) {
            self.error(enums::INVALID_VALUE);
        }
        self.programs.get_mut(&program)
    }

    /// The linked tables of `program`, or an error if it isn't linked.
    fn linked(&mut self, program: GLuint) -> Option<&Linked> {
        match self.programs.get(&program).map(|p| p.link_status) {
            None => {
                self.error(enums::INVALID_VALUE);
                None
            }
            Some(false) => {
                self.error(enums::INVALID_OPERATION);
                None
            }
            Some(true) => self.programs.get(&program).map(|p| &p.linked),
        }
    }

    /// Forget shaders whose deletion was waiting on a detach.
    fn collect_shader(&mut self, shader: GLuint) {
        let attached = self.programs.values().any(|p| p.attached.contains(&shader));
        if !attached && self.shaders.get(&shader).map_or(false, |s| s.delete_pending) {
            self.shaders.remove(&shader);
        }
    }

    fn collect_program(&mut self, program: GLuint) {
        if program == self.current_program {
            return;
        }
        if let Some(removed) = self.programs.remove(&program) {
            for shader in removed.attached {
                self.collect_shader(shader);
            }
        }
    }

    fn link_program(&mut self, program: GLuint) {
        let result = {
            let p = match self.programs.get(&program) {
                Some(p) => p,
                None => return self.error(enums::INVALID_VALUE),
            };
            let shaders: Vec<&Shader> = p.attached.iter().filter_map(|s| self.shaders.get(s)).collect();
            p.link(&shaders)
        };
        if let Some(p) = self.programs.get_mut(&program) {
            match result {
                Ok(linked) => {
                    p.link_status = true;
                    p.info_log.clear();
                    p.linked = linked;
                }
                Err(message) => {
                    p.link_status = false;
                    p.info_log = format!("error: {}\n", message);
                    p.linked = Linked::default();
                }
            }
        }
    }

    fn set_uniform(&mut self, location: GLint, columns: u32, rows: u32, kind: ValueKind, words: &[u32]) {
        if location == -1 {
            return;
        }
        let program = self.current_program;
        let result = match self.programs.get_mut(&program).filter(|p| p.link_status) {
            Some(p) => write_uniform(&mut p.linked, location, columns, rows, kind, words),
            None => Err(enums::INVALID_OPERATION),
        };
        if let Err(error) = result {
            self.error(error);
        }
    }

    fn get_uniform(&mut self, program: GLuint, location: GLint, count: usize, kind: ValueKind) -> Option<Vec<u32>> {
        let linked = self.linked(program)?;
        let (index, element) = match linked.uniform_at(location) {
            Some(found) => found,
            None => {
                self.error(enums::INVALID_OPERATION);
                return None;
            }
        };
        let uniform = &linked.uniforms[index];
        let info = uniform_type_info(uniform.type_)?;
        let per_element = uniform.words_per_element();
        let words = &uniform.values[element * per_element..(element + 1) * per_element];

        if same_kind(info.base, kind) {
            return Some(words.to_vec());
        }
        let components = (info.components() as usize).min(count);
        let mut out = Vec::new();
        for i in 0..components {
            let value = component_value(info.base, words, i);
            match kind {
                ValueKind::Float => out.push((value as f32).to_bits()),
                ValueKind::Double => {
                    let bits = value.to_bits();
                    out.push(bits as u32);
                    out.push((bits >> 32) as u32);
                }
                ValueKind::Int => out.push(value.round() as i32 as u32),
                ValueKind::UnsignedInt => out.push(value.round() as u32),
            }
        }
        Some(out)
    }
}

fn write_uniform(linked: &mut Linked, location: GLint, columns: u32, rows: u32, kind: ValueKind, words: &[u32]) -> Result<(), GLenum> {
    let (index, element) = linked.uniform_at(location).ok_or(enums::INVALID_OPERATION)?;
    let uniform = &mut linked.uniforms[index];
    let info = uniform_type_info(uniform.type_).ok_or(enums::INVALID_OPERATION)?;
    if info.columns != columns || info.rows != rows || !accepts(info.base, kind) {
        return Err(enums::INVALID_OPERATION);
    }

    let words_in = (columns * rows) as usize * if kind == ValueKind::Double { 2 } else { 1 };
    let count = words.len() / words_in;
    if count > 1 && uniform.size == 1 {
        return Err(enums::INVALID_OPERATION);
    }
    let count = count.min(uniform.size as usize - element);
    let per_element = uniform.words_per_element();

    for e in 0..count {
        let src = &words[e * words_in..(e + 1) * words_in];
        let dst = &mut uniform.values[(element + e) * per_element..(element + e + 1) * per_element];
        if info.base == UniformBaseType::Bool {
            for (d, &w) in dst.iter_mut().zip(src) {
                *d = match kind {
                    ValueKind::Float => (f32::from_bits(w) != 0.0) as u32,
                    _ => (w != 0) as u32,
                };
            }
        } else {
            dst.copy_from_slice(src);
        }
    }
    Ok(())
}

fn doubles_to_words(values: &[f64]) -> Vec<u32> {
    values
        .iter()
        .flat_map(|d| {
            let bits = d.to_bits();
            vec![bits as u32, (bits >> 32) as u32]
        })
        .collect()
}

fn words_to_doubles(words: &[u32], out: &mut [f64]) {
    for (d, pair) in out.iter_mut().zip(words.chunks(2)) {
        *d = f64::from_bits(u64::from(pair[0]) | (u64::from(pair[1]) << 32));
    }
}

/// An in-memory GL 4.5 compatibility context.
pub struct FakeGl {
    state: RefCell<State>,
}

impl Default for FakeGl {
    fn default() -> FakeGl {
        FakeGl::new()
    }
}

impl FakeGl {
    pub fn new() -> FakeGl {
        FakeGl {
            state: RefCell::new(State::new()),
        }
    }

    /// Every state-changing call made so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Queue an error for `get_error` to report.
    pub fn push_error(&self, error: GLenum) {
        self.state.borrow_mut().error(error);
    }

    /// Create a texture object with the given target, without binding it.
    pub fn create_texture(&self, target: GLenum) -> GLuint {
        let mut state = self.state.borrow_mut();
        let name = state.gen_name();
        state.textures.insert(name, target);
        name
    }

    pub fn create_renderbuffer(&self) -> GLuint {
        let mut state = self.state.borrow_mut();
        let name = state.gen_name();
        state.renderbuffers.insert(name);
        name
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().record(call);
    }
}

impl GlApi for FakeGl {
    fn get_error(&self) -> GLenum {
        self.state.borrow_mut().errors.pop_front().unwrap_or(enums::NO_ERROR)
    }

    fn get_integer_v(&self, pname: GLenum, result: &mut [GLint]) {
        let mut state = self.state.borrow_mut();
        match state.integer(pname) {
            Some(value) => {
                if let Some(first) = result.first_mut() {
                    *first = value;
                }
            }
            None => state.error(enums::INVALID_ENUM),
        }
    }

    fn get_integer_iv(&self, pname: GLenum, _index: GLuint, result: &mut [GLint]) {
        match pname {
            enums::UNIFORM_BUFFER_BINDING | enums::TRANSFORM_FEEDBACK_BUFFER_BINDING => {
                if let Some(first) = result.first_mut() {
                    *first = 0;
                }
            }
            _ => self.push_error(enums::INVALID_ENUM),
        }
    }

    fn get_string(&self, which: GLenum) -> String {
        match which {
            enums::VERSION => "4.5.0 FakeGl".to_string(),
            enums::VENDOR => "gl-state".to_string(),
            enums::RENDERER => "FakeGl".to_string(),
            enums::SHADING_LANGUAGE_VERSION => "4.50".to_string(),
            enums::EXTENSIONS => EXTENSIONS.join(" "),
            _ => {
                self.push_error(enums::INVALID_ENUM);
                String::new()
            }
        }
    }

    fn get_string_i(&self, which: GLenum, index: GLuint) -> String {
        match (which, EXTENSIONS.get(index as usize)) {
            (enums::EXTENSIONS, Some(name)) => name.to_string(),
            (enums::EXTENSIONS, None) => {
                self.push_error(enums::INVALID_VALUE);
                String::new()
            }
            _ => {
                self.push_error(enums::INVALID_ENUM);
                String::new()
            }
        }
    }

    fn is_framebuffer(&self, framebuffer: GLuint) -> GLboolean {
        (framebuffer != 0 && self.state.borrow().framebuffers.contains_key(&framebuffer)) as GLboolean
    }

    fn gen_framebuffers(&self, n: GLsizei) -> Vec<GLuint> {
        let mut state = self.state.borrow_mut();
        let names = state.gen_names(n);
        state.reserved_framebuffers.extend(&names);
        state.record(Call::gen_framebuffers { returned: names.clone() });
        names
    }

    fn bind_framebuffer(&self, target: GLenum, framebuffer: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_framebuffer { target, framebuffer });
        if state.framebuffer_for(target).is_none() {
            return state.error(enums::INVALID_ENUM);
        }
        // Compatibility contexts accept names that were never generated.
        if !state.framebuffers.contains_key(&framebuffer) {
            state.reserved_framebuffers.remove(&framebuffer);
            state.framebuffers.insert(framebuffer, Framebuffer::new(enums::COLOR_ATTACHMENT0));
        }
        if target != enums::READ_FRAMEBUFFER {
            state.draw_framebuffer = framebuffer;
        }
        if target != enums::DRAW_FRAMEBUFFER {
            state.read_framebuffer = framebuffer;
        }
    }

    fn delete_framebuffers(&self, framebuffers: &[GLuint]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::delete_framebuffers { framebuffers: framebuffers.to_vec() });
        for &fb in framebuffers.iter().filter(|&&fb| fb != 0) {
            state.reserved_framebuffers.remove(&fb);
            if state.framebuffers.remove(&fb).is_some() {
                if state.draw_framebuffer == fb {
                    state.draw_framebuffer = 0;
                }
                if state.read_framebuffer == fb {
                    state.read_framebuffer = 0;
                }
            }
        }
    }

    fn check_frame_buffer_status(&self, target: GLenum) -> GLenum {
        self.state.borrow_mut().framebuffer_status(target)
    }

    fn get_framebuffer_attachment_parameter_iv(&self, target: GLenum, attachment: GLenum, pname: GLenum) -> GLint {
        self.state.borrow_mut().attachment_param(target, attachment, pname)
    }

    fn framebuffer_renderbuffer(&self, target: GLenum, attachment: GLenum, renderbuffertarget: GLenum, renderbuffer: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::framebuffer_renderbuffer { target, attachment, renderbuffertarget, renderbuffer });
        if renderbuffertarget != enums::RENDERBUFFER {
            return state.error(enums::INVALID_ENUM);
        }
        let value = if renderbuffer == 0 {
            None
        } else {
            Some(Attachment {
                type_: enums::RENDERBUFFER,
                name: renderbuffer,
                level: 0,
                face: 0,
                layer: 0,
                layered: false,
            })
        };
        state.attach(target, attachment, value);
    }

    fn framebuffer_texture(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: GLint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::framebuffer_texture { target, attachment, texture, level });
        let layered = matches!(
            state.textures.get(&texture).copied(),
            Some(enums::TEXTURE_3D) | Some(enums::TEXTURE_2D_ARRAY) | Some(enums::TEXTURE_CUBE_MAP)
                | Some(enums::TEXTURE_1D_ARRAY) | Some(enums::TEXTURE_CUBE_MAP_ARRAY)
        );
        state.attach_texture(target, attachment, texture, level, 0, 0, layered);
    }

    fn framebuffer_texture_1d(&self, target: GLenum, attachment: GLenum, textarget: GLenum, texture: GLuint, level: GLint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::framebuffer_texture_1d { target, attachment, textarget, texture, level });
        state.attach_texture(target, attachment, texture, level, 0, 0, false);
    }

    fn framebuffer_texture_2d(&self, target: GLenum, attachment: GLenum, textarget: GLenum, texture: GLuint, level: GLint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::framebuffer_texture_2d { target, attachment, textarget, texture, level });
        let face = if (enums::TEXTURE_CUBE_MAP_POSITIVE_X..=enums::TEXTURE_CUBE_MAP_NEGATIVE_Z).contains(&textarget) {
            textarget
        } else {
            0
        };
        state.attach_texture(target, attachment, texture, level, face, 0, false);
    }

    fn framebuffer_texture_layer(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: GLint, layer: GLint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::framebuffer_texture_layer { target, attachment, texture, level, layer });
        state.attach_texture(target, attachment, texture, level, 0, layer, false);
    }

    fn draw_buffer(&self, mode: GLenum) {
        let mut state = self.state.borrow_mut();
        state.record(Call::draw_buffer { mode });
        let fb = state.draw_framebuffer;
        if let Some(framebuffer) = state.framebuffers.get_mut(&fb) {
            framebuffer.draw_buffers = vec![enums::NONE; MAX_DRAW_BUFFERS];
            framebuffer.draw_buffers[0] = mode;
        }
    }

    fn draw_buffers(&self, bufs: &[GLenum]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::draw_buffers { bufs: bufs.to_vec() });
        if bufs.len() > MAX_DRAW_BUFFERS {
            return state.error(enums::INVALID_VALUE);
        }
        let fb = state.draw_framebuffer;
        if let Some(framebuffer) = state.framebuffers.get_mut(&fb) {
            framebuffer.draw_buffers = vec![enums::NONE; MAX_DRAW_BUFFERS];
            framebuffer.draw_buffers[..bufs.len()].copy_from_slice(bufs);
        }
    }

    fn read_buffer(&self, mode: GLenum) {
        let mut state = self.state.borrow_mut();
        state.record(Call::read_buffer { mode });
        let fb = state.read_framebuffer;
        if let Some(framebuffer) = state.framebuffers.get_mut(&fb) {
            framebuffer.read_buffer = mode;
        }
    }

    fn bind_texture(&self, target: GLenum, texture: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_texture { target, texture });
        if object_category_from_target(target) != Some(Namespace::Textures) {
            return state.error(enums::INVALID_ENUM);
        }
        if texture != 0 {
            match state.textures.get(&texture).copied() {
                Some(existing) if existing != target => return state.error(enums::INVALID_OPERATION),
                Some(_) => {}
                None => {
                    state.textures.insert(texture, target);
                }
            }
        }
        let unit = state.active_unit();
        state.texture_bindings.insert((unit, target), texture);
    }

    fn bind_renderbuffer(&self, target: GLenum, renderbuffer: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_renderbuffer { target, renderbuffer });
        if target != enums::RENDERBUFFER {
            return state.error(enums::INVALID_ENUM);
        }
        if renderbuffer != 0 {
            state.renderbuffers.insert(renderbuffer);
        }
        state.renderbuffer_binding = renderbuffer;
    }

    fn bind_buffer(&self, target: GLenum, buffer: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_buffer { target, buffer });
        match target {
            enums::ELEMENT_ARRAY_BUFFER => state.vertex_array().element_array_buffer = buffer,
            _ if object_category_from_target(target) == Some(Namespace::Buffers) => {
                state.buffer_bindings.insert(target, buffer);
            }
            _ => state.error(enums::INVALID_ENUM),
        }
    }

    fn bind_sampler(&self, unit: GLuint, sampler: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_sampler { unit, sampler });
        if unit >= MAX_TEXTURE_UNITS {
            return state.error(enums::INVALID_VALUE);
        }
        state.sampler_bindings.insert(unit, sampler);
    }

    fn active_texture(&self, texture: GLenum) {
        let mut state = self.state.borrow_mut();
        state.record(Call::active_texture { texture });
        if !(enums::TEXTURE0..enums::TEXTURE0 + MAX_TEXTURE_UNITS).contains(&texture) {
            return state.error(enums::INVALID_ENUM);
        }
        state.integers.insert(enums::ACTIVE_TEXTURE, texture as GLint);
    }

    fn client_active_texture(&self, texture: GLenum) {
        let mut state = self.state.borrow_mut();
        state.record(Call::client_active_texture { texture });
        state.integers.insert(enums::CLIENT_ACTIVE_TEXTURE, texture as GLint);
    }

    fn matrix_mode(&self, mode: GLenum) {
        let mut state = self.state.borrow_mut();
        state.record(Call::matrix_mode { mode });
        state.integers.insert(enums::MATRIX_MODE, mode as GLint);
    }

    fn pixel_store_i(&self, name: GLenum, param: GLint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::pixel_store_i { name, param });
        state.integers.insert(name, param);
    }

    fn delete_textures(&self, textures: &[GLuint]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::delete_textures { textures: textures.to_vec() });
        for texture in textures {
            state.textures.remove(texture);
            state.texture_bindings.retain(|_, bound| bound != texture);
        }
    }

    fn delete_renderbuffers(&self, renderbuffers: &[GLuint]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::delete_renderbuffers { renderbuffers: renderbuffers.to_vec() });
        for renderbuffer in renderbuffers {
            state.renderbuffers.remove(renderbuffer);
            if state.renderbuffer_binding == *renderbuffer {
                state.renderbuffer_binding = 0;
            }
        }
    }

    fn delete_buffers(&self, buffers: &[GLuint]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::delete_buffers { buffers: buffers.to_vec() });
        for buffer in buffers.iter().filter(|&&b| b != 0) {
            state.buffer_bindings.retain(|_, bound| bound != buffer);
            let vao = state.vertex_array();
            if vao.element_array_buffer == *buffer {
                vao.element_array_buffer = 0;
            }
            for attrib in vao.attribs.iter_mut().filter(|a| a.buffer == *buffer) {
                attrib.buffer = 0;
            }
        }
    }

    fn delete_queries(&self, queries: &[GLuint]) {
        self.record(Call::delete_queries { queries: queries.to_vec() });
    }

    fn delete_samplers(&self, samplers: &[GLuint]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::delete_samplers { samplers: samplers.to_vec() });
        for sampler in samplers {
            state.sampler_bindings.retain(|_, bound| bound != sampler);
        }
    }

    fn delete_transform_feedbacks(&self, feedbacks: &[GLuint]) {
        self.record(Call::delete_transform_feedbacks { feedbacks: feedbacks.to_vec() });
    }

    fn delete_lists(&self, list: GLuint, range: GLsizei) {
        self.record(Call::delete_lists { list, range });
    }

    fn is_shader(&self, shader: GLuint) -> GLboolean {
        self.state.borrow().shaders.contains_key(&shader) as GLboolean
    }

    fn create_shader(&self, shader_type: GLenum) -> GLuint {
        let mut state = self.state.borrow_mut();
        let valid = matches!(
            shader_type,
            enums::VERTEX_SHADER
                | enums::FRAGMENT_SHADER
                | enums::GEOMETRY_SHADER
                | enums::TESS_CONTROL_SHADER
                | enums::TESS_EVALUATION_SHADER
                | enums::COMPUTE_SHADER
        );
        let returned = if valid {
            let name = state.gen_name();
            state.shaders.insert(name, Shader::new(shader_type));
            name
        } else {
            state.error(enums::INVALID_ENUM);
            0
        };
        state.record(Call::create_shader { shader_type, returned });
        returned
    }

    fn shader_source(&self, shader: GLuint, source: &str) {
        let mut state = self.state.borrow_mut();
        state.record(Call::shader_source { shader, source: source.to_string() });
        match state.shaders.get_mut(&shader) {
            Some(s) => s.source = source.to_string(),
            None => state.error(enums::INVALID_VALUE),
        }
    }

    fn compile_shader(&self, shader: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::compile_shader { shader });
        match state.shaders.get_mut(&shader) {
            Some(s) => s.compile(),
            None => state.error(enums::INVALID_VALUE),
        }
    }

    fn delete_shader(&self, shader: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::delete_shader { shader });
        if shader == 0 {
            return;
        }
        match state.shaders.get_mut(&shader) {
            Some(s) => s.delete_pending = true,
            None => return state.error(enums::INVALID_VALUE),
        }
        state.collect_shader(shader);
    }

    fn get_shader_iv(&self, shader: GLuint, pname: GLenum) -> GLint {
        let mut state = self.state.borrow_mut();
        let s = match state.shaders.get(&shader) {
            Some(s) => s,
            None => {
                state.error(enums::INVALID_VALUE);
                return 0;
            }
        };
        let length = |text: &str| if text.is_empty() { 0 } else { text.len() as GLint + 1 };
        match pname {
            enums::SHADER_TYPE => s.type_ as GLint,
            enums::DELETE_STATUS => s.delete_pending as GLint,
            enums::COMPILE_STATUS => s.compiled as GLint,
            enums::INFO_LOG_LENGTH => length(&s.info_log),
            enums::SHADER_SOURCE_LENGTH => length(&s.source),
            _ => {
                state.error(enums::INVALID_ENUM);
                0
            }
        }
    }

    fn get_shader_info_log(&self, shader: GLuint) -> String {
        let mut state = self.state.borrow_mut();
        match state.shaders.get(&shader) {
            Some(s) => s.info_log.clone(),
            None => {
                state.error(enums::INVALID_VALUE);
                String::new()
            }
        }
    }

    fn get_shader_source(&self, shader: GLuint) -> String {
        let mut state = self.state.borrow_mut();
        match state.shaders.get(&shader) {
            Some(s) => s.source.clone(),
            None => {
                state.error(enums::INVALID_VALUE);
                String::new()
            }
        }
    }

    fn is_program(&self, program: GLuint) -> GLboolean {
        self.state.borrow().programs.contains_key(&program) as GLboolean
    }

    fn create_program(&self) -> GLuint {
        let mut state = self.state.borrow_mut();
        let returned = state.gen_name();
        state.programs.insert(returned, Program::default());
        state.record(Call::create_program { returned });
        returned
    }

    fn create_shader_program_v(&self, shader_type: GLenum, strings: &[&str]) -> GLuint {
        let mut state = self.state.borrow_mut();
        let returned = state.gen_name();
        // The shader is created, detached and deleted before returning, but
        // its name is still used up.
        state.gen_name();
        state.record(Call::create_shader_program_v {
            shader_type,
            strings: strings.iter().map(|s| s.to_string()).collect(),
            returned,
        });

        let mut shader = Shader::new(shader_type);
        shader.source = strings.concat();
        shader.compile();
        let mut program = Program {
            separable: true,
            ..Program::default()
        };
        match program.link(&[&shader]) {
            Ok(linked) => {
                program.link_status = true;
                program.linked = linked;
            }
            Err(message) => {
                program.info_log = format!("{}error: {}\n", shader.info_log, message);
            }
        }
        state.programs.insert(returned, program);
        returned
    }

    fn delete_program(&self, program: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::delete_program { program });
        if program == 0 {
            return;
        }
        match state.programs.get_mut(&program) {
            Some(p) => p.delete_pending = true,
            None => return state.error(enums::INVALID_VALUE),
        }
        state.collect_program(program);
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::attach_shader { program, shader });
        if !state.shaders.contains_key(&shader) {
            return state.error(enums::INVALID_VALUE);
        }
        let p = match state.program(program) {
            Some(p) => p,
            None => return,
        };
        if p.attached.contains(&shader) {
            return state.error(enums::INVALID_OPERATION);
        }
        p.attached.push(shader);
    }

    fn detach_shader(&self, program: GLuint, shader: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::detach_shader { program, shader });
        let p = match state.program(program) {
            Some(p) => p,
            None => return,
        };
        match p.attached.iter().position(|&s| s == shader) {
            Some(i) => {
                p.attached.remove(i);
            }
            None => return state.error(enums::INVALID_OPERATION),
        }
        state.collect_shader(shader);
    }

    fn link_program(&self, program: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::link_program { program });
        state.link_program(program);
    }

    fn use_program(&self, program: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::use_program { program });
        if program != 0 {
            match state.programs.get(&program).map(|p| p.link_status) {
                None => return state.error(enums::INVALID_VALUE),
                Some(false) => return state.error(enums::INVALID_OPERATION),
                Some(true) => {}
            }
        }
        let previous = state.current_program;
        state.current_program = program;
        if state.programs.get(&previous).map_or(false, |p| p.delete_pending) {
            state.collect_program(previous);
        }
    }

    fn get_program_iv(&self, program: GLuint, pname: GLenum) -> GLint {
        let mut state = self.state.borrow_mut();
        let p = match state.programs.get(&program) {
            Some(p) => p,
            None => {
                state.error(enums::INVALID_VALUE);
                return 0;
            }
        };
        match pname {
            enums::DELETE_STATUS => p.delete_pending as GLint,
            enums::LINK_STATUS => p.link_status as GLint,
            enums::VALIDATE_STATUS => 0,
            enums::INFO_LOG_LENGTH => {
                if p.info_log.is_empty() {
                    0
                } else {
                    p.info_log.len() as GLint + 1
                }
            }
            enums::ATTACHED_SHADERS => p.attached.len() as GLint,
            enums::ACTIVE_ATTRIBUTES => p.linked.attribs.len() as GLint,
            enums::ACTIVE_UNIFORMS => p.linked.uniforms.len() as GLint,
            enums::ACTIVE_UNIFORM_BLOCKS => p.linked.blocks.len() as GLint,
            enums::PROGRAM_SEPARABLE => p.separable as GLint,
            enums::PROGRAM_BINARY_RETRIEVABLE_HINT => p.retrievable_hint as GLint,
            enums::PROGRAM_BINARY_LENGTH => 0,
            enums::TRANSFORM_FEEDBACK_BUFFER_MODE => p.linked.feedback_mode as GLint,
            enums::TRANSFORM_FEEDBACK_VARYINGS => p.linked.varyings.len() as GLint,
            _ => {
                state.error(enums::INVALID_ENUM);
                0
            }
        }
    }

    fn get_program_info_log(&self, program: GLuint) -> String {
        let mut state = self.state.borrow_mut();
        state.program(program).map(|p| p.info_log.clone()).unwrap_or_default()
    }

    fn get_attached_shaders(&self, program: GLuint) -> Vec<GLuint> {
        let mut state = self.state.borrow_mut();
        state.program(program).map(|p| p.attached.clone()).unwrap_or_default()
    }

    fn program_parameter_i(&self, program: GLuint, pname: GLenum, value: GLint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::program_parameter_i { program, pname, value });
        let p = match state.program(program) {
            Some(p) => p,
            None => return,
        };
        match pname {
            enums::PROGRAM_SEPARABLE => p.separable = value != 0,
            enums::PROGRAM_BINARY_RETRIEVABLE_HINT => p.retrievable_hint = value != 0,
            _ => state.error(enums::INVALID_ENUM),
        }
    }

    fn program_binary(&self, program: GLuint, format: GLenum, binary: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::program_binary { program, format, length: binary.len() });
        // No binary format is supported, so loading one always fails to
        // link.
        if let Some(p) = state.program(program) {
            p.link_status = false;
            p.info_log = "error: unsupported program binary format\n".to_string();
            p.linked = Linked::default();
        }
    }

    fn get_program_binary(&self, program: GLuint) -> (Vec<u8>, GLenum) {
        let mut state = self.state.borrow_mut();
        if state.linked(program).is_none() {
            return (Vec::new(), enums::NONE);
        }
        (Vec::new(), enums::NONE)
    }

    fn get_active_attrib(&self, program: GLuint, index: GLuint) -> (GLint, GLenum, String) {
        let mut state = self.state.borrow_mut();
        let found = state
            .program(program)
            .map(|p| p.linked.attribs.get(index as usize).map(|a| (a.size, a.type_, a.name.clone())));
        match found {
            Some(Some(attrib)) => attrib,
            Some(None) => {
                state.error(enums::INVALID_VALUE);
                (0, 0, String::new())
            }
            None => (0, 0, String::new()),
        }
    }

    fn get_attrib_location(&self, program: GLuint, name: &str) -> GLint {
        let mut state = self.state.borrow_mut();
        state
            .linked(program)
            .and_then(|l| l.attribs.iter().find(|a| a.name == name))
            .map_or(-1, |a| a.location)
    }

    fn bind_attrib_location(&self, program: GLuint, index: GLuint, name: &str) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_attrib_location { program, index, name: name.to_string() });
        if name.starts_with("gl_") {
            return state.error(enums::INVALID_OPERATION);
        }
        if index as usize >= MAX_VERTEX_ATTRIBS {
            return state.error(enums::INVALID_VALUE);
        }
        if let Some(p) = state.program(program) {
            p.attrib_bindings.insert(name.to_string(), index);
        }
    }

    fn get_frag_data_location(&self, program: GLuint, name: &str) -> GLint {
        let mut state = self.state.borrow_mut();
        state
            .linked(program)
            .and_then(|l| l.outputs.iter().find(|o| o.name == name))
            .map_or(-1, |o| o.location)
    }

    fn get_frag_data_index(&self, program: GLuint, name: &str) -> GLint {
        let mut state = self.state.borrow_mut();
        state
            .linked(program)
            .and_then(|l| l.outputs.iter().find(|o| o.name == name))
            .map_or(-1, |o| o.index)
    }

    fn bind_frag_data_location(&self, program: GLuint, color_number: GLuint, name: &str) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_frag_data_location { program, color_number, name: name.to_string() });
        if name.starts_with("gl_") {
            return state.error(enums::INVALID_OPERATION);
        }
        if let Some(p) = state.program(program) {
            p.frag_bindings.insert(name.to_string(), (color_number, 0));
        }
    }

    fn bind_frag_data_location_indexed(&self, program: GLuint, color_number: GLuint, index: GLuint, name: &str) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_frag_data_location_indexed {
            program,
            color_number,
            index,
            name: name.to_string(),
        });
        if name.starts_with("gl_") {
            return state.error(enums::INVALID_OPERATION);
        }
        if index > 1 {
            return state.error(enums::INVALID_VALUE);
        }
        if let Some(p) = state.program(program) {
            p.frag_bindings.insert(name.to_string(), (color_number, index));
        }
    }

    fn get_program_interface_iv(&self, program: GLuint, interface: GLenum, pname: GLenum) -> GLint {
        let mut state = self.state.borrow_mut();
        if interface != enums::PROGRAM_OUTPUT {
            state.error(enums::INVALID_ENUM);
            return 0;
        }
        let outputs = match state.program(program) {
            Some(p) => p.linked.outputs.clone(),
            None => return 0,
        };
        match pname {
            enums::ACTIVE_RESOURCES => outputs.len() as GLint,
            enums::MAX_NAME_LENGTH => outputs.iter().map(|o| o.name.len() as GLint + 1).max().unwrap_or(0),
            _ => {
                state.error(enums::INVALID_ENUM);
                0
            }
        }
    }

    fn get_program_resource_name(&self, program: GLuint, interface: GLenum, index: GLuint) -> String {
        let mut state = self.state.borrow_mut();
        if interface != enums::PROGRAM_OUTPUT {
            state.error(enums::INVALID_ENUM);
            return String::new();
        }
        let found = state.program(program).map(|p| p.linked.outputs.get(index as usize).map(|o| o.name.clone()));
        match found {
            Some(Some(name)) => name,
            Some(None) => {
                state.error(enums::INVALID_VALUE);
                String::new()
            }
            None => String::new(),
        }
    }

    fn get_program_resource_iv(&self, program: GLuint, interface: GLenum, index: GLuint, props: &[GLenum]) -> Vec<GLint> {
        let mut state = self.state.borrow_mut();
        if interface != enums::PROGRAM_OUTPUT {
            state.error(enums::INVALID_ENUM);
            return vec![0; props.len()];
        }
        let output = match state.program(program).map(|p| p.linked.outputs.get(index as usize).cloned()) {
            Some(Some(output)) => output,
            Some(None) => {
                state.error(enums::INVALID_VALUE);
                return vec![0; props.len()];
            }
            None => return vec![0; props.len()],
        };
        props
            .iter()
            .map(|&prop| match prop {
                enums::LOCATION => output.location,
                enums::LOCATION_INDEX => output.index,
                enums::TYPE => output.type_ as GLint,
                enums::ARRAY_SIZE => output.size,
                enums::IS_PER_PATCH => 0,
                enums::NAME_LENGTH => output.name.len() as GLint + 1,
                _ => {
                    state.error(enums::INVALID_ENUM);
                    0
                }
            })
            .collect()
    }

    fn get_transform_feedback_varying(&self, program: GLuint, index: GLuint) -> (GLint, GLenum, String) {
        let mut state = self.state.borrow_mut();
        let found = state
            .program(program)
            .map(|p| p.linked.varyings.get(index as usize).map(|v| (v.size, v.type_, v.name.clone())));
        match found {
            Some(Some(varying)) => varying,
            Some(None) => {
                state.error(enums::INVALID_VALUE);
                (0, 0, String::new())
            }
            None => (0, 0, String::new()),
        }
    }

    fn transform_feedback_varyings(&self, program: GLuint, varyings: &[&str], buffer_mode: GLenum) {
        let mut state = self.state.borrow_mut();
        state.record(Call::transform_feedback_varyings {
            program,
            varyings: varyings.iter().map(|v| v.to_string()).collect(),
            buffer_mode,
        });
        if buffer_mode != enums::INTERLEAVED_ATTRIBS && buffer_mode != enums::SEPARATE_ATTRIBS {
            return state.error(enums::INVALID_ENUM);
        }
        if let Some(p) = state.program(program) {
            p.feedback_names = varyings.iter().map(|v| v.to_string()).collect();
            p.feedback_mode = Some(buffer_mode);
        }
    }

    fn get_active_uniform(&self, program: GLuint, index: GLuint) -> (GLint, GLenum, String) {
        let mut state = self.state.borrow_mut();
        let found = state
            .program(program)
            .map(|p| p.linked.uniforms.get(index as usize).map(|u| (u.size, u.type_, u.reported_name())));
        match found {
            Some(Some(uniform)) => uniform,
            Some(None) => {
                state.error(enums::INVALID_VALUE);
                (0, 0, String::new())
            }
            None => (0, 0, String::new()),
        }
    }

    fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint {
        let mut state = self.state.borrow_mut();
        state.linked(program).map_or(-1, |l| l.uniform_location(name))
    }

    fn get_uniform_fv(&self, program: GLuint, location: GLint, result: &mut [f32]) {
        let words = self.state.borrow_mut().get_uniform(program, location, result.len(), ValueKind::Float);
        for (out, word) in result.iter_mut().zip(words.unwrap_or_default()) {
            *out = f32::from_bits(word);
        }
    }

    fn get_uniform_iv(&self, program: GLuint, location: GLint, result: &mut [i32]) {
        let words = self.state.borrow_mut().get_uniform(program, location, result.len(), ValueKind::Int);
        for (out, word) in result.iter_mut().zip(words.unwrap_or_default()) {
            *out = word as i32;
        }
    }

    fn get_uniform_uiv(&self, program: GLuint, location: GLint, result: &mut [u32]) {
        let words = self.state.borrow_mut().get_uniform(program, location, result.len(), ValueKind::UnsignedInt);
        for (out, word) in result.iter_mut().zip(words.unwrap_or_default()) {
            *out = word;
        }
    }

    fn get_uniform_dv(&self, program: GLuint, location: GLint, result: &mut [f64]) {
        let words = self.state.borrow_mut().get_uniform(program, location, result.len(), ValueKind::Double);
        words_to_doubles(&words.unwrap_or_default(), result);
    }

    fn uniform_fv(&self, components: u32, location: GLint, values: &[f32]) {
        let words: Vec<u32> = values.iter().map(|f| f.to_bits()).collect();
        let mut state = self.state.borrow_mut();
        state.record(Call::uniform { location, components, values: words.clone() });
        state.set_uniform(location, 1, components, ValueKind::Float, &words);
    }

    fn uniform_iv(&self, components: u32, location: GLint, values: &[i32]) {
        let words: Vec<u32> = values.iter().map(|&i| i as u32).collect();
        let mut state = self.state.borrow_mut();
        state.record(Call::uniform { location, components, values: words.clone() });
        state.set_uniform(location, 1, components, ValueKind::Int, &words);
    }

    fn uniform_uiv(&self, components: u32, location: GLint, values: &[u32]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::uniform { location, components, values: values.to_vec() });
        state.set_uniform(location, 1, components, ValueKind::UnsignedInt, values);
    }

    fn uniform_dv(&self, components: u32, location: GLint, values: &[f64]) {
        let words = doubles_to_words(values);
        let mut state = self.state.borrow_mut();
        state.record(Call::uniform { location, components, values: words.clone() });
        state.set_uniform(location, 1, components, ValueKind::Double, &words);
    }

    fn uniform_matrix_fv(&self, cols: u32, rows: u32, location: GLint, transpose: bool, values: &[f32]) {
        let words: Vec<u32> = values.iter().map(|f| f.to_bits()).collect();
        let mut state = self.state.borrow_mut();
        state.record(Call::uniform_matrix { location, cols, rows, transpose, values: words.clone() });
        state.set_uniform(location, cols, rows, ValueKind::Float, &words);
    }

    fn uniform_matrix_dv(&self, cols: u32, rows: u32, location: GLint, transpose: bool, values: &[f64]) {
        let words = doubles_to_words(values);
        let mut state = self.state.borrow_mut();
        state.record(Call::uniform_matrix { location, cols, rows, transpose, values: words.clone() });
        state.set_uniform(location, cols, rows, ValueKind::Double, &words);
    }

    fn get_uniform_block_index(&self, program: GLuint, name: &str) -> GLuint {
        let mut state = self.state.borrow_mut();
        state
            .linked(program)
            .and_then(|l| l.blocks.iter().position(|b| b.name == name))
            .map_or(INVALID_INDEX, |i| i as GLuint)
    }

    fn get_active_uniform_block_i(&self, program: GLuint, index: GLuint, pname: GLenum) -> GLint {
        let mut state = self.state.borrow_mut();
        let block = match state.program(program).map(|p| p.linked.blocks.get(index as usize).cloned()) {
            Some(Some(block)) => block,
            Some(None) => {
                state.error(enums::INVALID_VALUE);
                return 0;
            }
            None => return 0,
        };
        let referenced = |stage: GLenum| block.referenced_by.contains(&stage) as GLint;
        match pname {
            enums::UNIFORM_BLOCK_BINDING => block.binding as GLint,
            enums::UNIFORM_BLOCK_DATA_SIZE => block.data_size,
            enums::UNIFORM_BLOCK_ACTIVE_UNIFORMS => block.active_uniforms,
            enums::UNIFORM_BLOCK_NAME_LENGTH => block.name.len() as GLint + 1,
            enums::UNIFORM_BLOCK_REFERENCED_BY_VERTEX_SHADER => referenced(enums::VERTEX_SHADER),
            enums::UNIFORM_BLOCK_REFERENCED_BY_TESS_CONTROL_SHADER => referenced(enums::TESS_CONTROL_SHADER),
            enums::UNIFORM_BLOCK_REFERENCED_BY_TESS_EVALUATION_SHADER => referenced(enums::TESS_EVALUATION_SHADER),
            enums::UNIFORM_BLOCK_REFERENCED_BY_GEOMETRY_SHADER => referenced(enums::GEOMETRY_SHADER),
            enums::UNIFORM_BLOCK_REFERENCED_BY_FRAGMENT_SHADER => referenced(enums::FRAGMENT_SHADER),
            enums::UNIFORM_BLOCK_REFERENCED_BY_COMPUTE_SHADER => referenced(enums::COMPUTE_SHADER),
            _ => {
                state.error(enums::INVALID_ENUM);
                0
            }
        }
    }

    fn get_active_uniform_block_name(&self, program: GLuint, index: GLuint) -> String {
        let mut state = self.state.borrow_mut();
        let found = state.program(program).map(|p| p.linked.blocks.get(index as usize).map(|b| b.name.clone()));
        match found {
            Some(Some(name)) => name,
            Some(None) => {
                state.error(enums::INVALID_VALUE);
                String::new()
            }
            None => String::new(),
        }
    }

    fn uniform_block_binding(&self, program: GLuint, uniform_block_index: GLuint, uniform_block_binding: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::uniform_block_binding { program, uniform_block_index, uniform_block_binding });
        if uniform_block_binding >= MAX_UNIFORM_BUFFER_BINDINGS {
            return state.error(enums::INVALID_VALUE);
        }
        let found = state
            .program(program)
            .map(|p| p.linked.blocks.get_mut(uniform_block_index as usize).map(|b| b.binding = uniform_block_binding));
        if let Some(None) = found {
            state.error(enums::INVALID_VALUE);
        }
    }

    fn is_program_pipeline(&self, pipeline: GLuint) -> GLboolean {
        self.state.borrow().pipelines.contains_key(&pipeline) as GLboolean
    }

    fn gen_program_pipelines(&self, n: GLsizei) -> Vec<GLuint> {
        let mut state = self.state.borrow_mut();
        let names = state.gen_names(n);
        state.reserved_pipelines.extend(&names);
        state.record(Call::gen_program_pipelines { returned: names.clone() });
        names
    }

    fn bind_program_pipeline(&self, pipeline: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_program_pipeline { pipeline });
        if pipeline != 0 && !state.pipelines.contains_key(&pipeline) {
            if !state.reserved_pipelines.remove(&pipeline) {
                return state.error(enums::INVALID_OPERATION);
            }
            state.pipelines.insert(pipeline, Pipeline::default());
        }
        state.pipeline_binding = pipeline;
    }

    fn delete_program_pipelines(&self, pipelines: &[GLuint]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::delete_program_pipelines { pipelines: pipelines.to_vec() });
        for pipeline in pipelines {
            state.reserved_pipelines.remove(pipeline);
            state.pipelines.remove(pipeline);
            if state.pipeline_binding == *pipeline {
                state.pipeline_binding = 0;
            }
        }
    }

    // Program names aren't checked, so pipelines can be built from
    // stand-in programs.
    fn use_program_stages(&self, pipeline: GLuint, stages: GLbitfield, program: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::use_program_stages { pipeline, stages, program });
        if !state.pipelines.contains_key(&pipeline) && !state.reserved_pipelines.remove(&pipeline) {
            return state.error(enums::INVALID_OPERATION);
        }
        let entry = state.pipelines.entry(pipeline).or_insert_with(Pipeline::default);
        for &(bit, shader_type) in PIPELINE_STAGES {
            if stages & bit != 0 {
                entry.stages.insert(shader_type, program);
            }
        }
    }

    fn active_shader_program(&self, pipeline: GLuint, program: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::active_shader_program { pipeline, program });
        if !state.pipelines.contains_key(&pipeline) && !state.reserved_pipelines.remove(&pipeline) {
            return state.error(enums::INVALID_OPERATION);
        }
        state.pipelines.entry(pipeline).or_insert_with(Pipeline::default).active_program = program;
    }

    fn get_program_pipeline_iv(&self, pipeline: GLuint, pname: GLenum) -> GLint {
        let mut state = self.state.borrow_mut();
        let p = match state.pipelines.get(&pipeline) {
            Some(p) => p,
            None => {
                state.error(enums::INVALID_VALUE);
                return 0;
            }
        };
        match pname {
            enums::ACTIVE_PROGRAM => p.active_program as GLint,
            enums::INFO_LOG_LENGTH | enums::VALIDATE_STATUS => 0,
            _ if PIPELINE_STAGES.iter().any(|&(_, ty)| ty == pname) => {
                p.stages.get(&pname).copied().unwrap_or(0) as GLint
            }
            _ => {
                state.error(enums::INVALID_ENUM);
                0
            }
        }
    }

    fn is_vertex_array(&self, vao: GLuint) -> GLboolean {
        (vao != 0 && self.state.borrow().vertex_arrays.contains_key(&vao)) as GLboolean
    }

    fn gen_vertex_arrays(&self, n: GLsizei) -> Vec<GLuint> {
        let mut state = self.state.borrow_mut();
        let names = state.gen_names(n);
        state.reserved_vertex_arrays.extend(&names);
        state.record(Call::gen_vertex_arrays { returned: names.clone() });
        names
    }

    fn bind_vertex_array(&self, vao: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::bind_vertex_array { vao });
        if !state.vertex_arrays.contains_key(&vao) {
            if !state.reserved_vertex_arrays.remove(&vao) {
                return state.error(enums::INVALID_OPERATION);
            }
            state.vertex_arrays.insert(vao, VertexArray::default());
        }
        state.vertex_array_binding = vao;
    }

    fn delete_vertex_arrays(&self, vertex_arrays: &[GLuint]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::delete_vertex_arrays { vertex_arrays: vertex_arrays.to_vec() });
        for vao in vertex_arrays.iter().filter(|&&vao| vao != 0) {
            state.reserved_vertex_arrays.remove(vao);
            state.vertex_arrays.remove(vao);
            if state.vertex_array_binding == *vao {
                state.vertex_array_binding = 0;
            }
        }
    }

    fn get_vertex_attrib_iv(&self, index: GLuint, pname: GLenum) -> GLint {
        let mut state = self.state.borrow_mut();
        let attrib = match state.vertex_array().attribs.get(index as usize) {
            Some(attrib) => attrib.clone(),
            None => {
                state.error(enums::INVALID_VALUE);
                return 0;
            }
        };
        match pname {
            enums::VERTEX_ATTRIB_ARRAY_BUFFER_BINDING => attrib.buffer as GLint,
            enums::VERTEX_ATTRIB_ARRAY_ENABLED => attrib.enabled as GLint,
            enums::VERTEX_ATTRIB_ARRAY_SIZE => attrib.size,
            enums::VERTEX_ATTRIB_ARRAY_TYPE => attrib.type_ as GLint,
            enums::VERTEX_ATTRIB_ARRAY_NORMALIZED => attrib.normalized as GLint,
            enums::VERTEX_ATTRIB_ARRAY_STRIDE => attrib.stride,
            enums::VERTEX_ATTRIB_ARRAY_INTEGER => attrib.integer as GLint,
            enums::VERTEX_ATTRIB_ARRAY_DIVISOR => attrib.divisor as GLint,
            _ => {
                state.error(enums::INVALID_ENUM);
                0
            }
        }
    }

    fn get_vertex_attrib_pointer_v(&self, index: GLuint, pname: GLenum) -> u64 {
        let mut state = self.state.borrow_mut();
        if pname != enums::VERTEX_ATTRIB_ARRAY_POINTER {
            state.error(enums::INVALID_ENUM);
            return 0;
        }
        match state.vertex_array().attribs.get(index as usize) {
            Some(attrib) => attrib.pointer,
            None => {
                state.error(enums::INVALID_VALUE);
                0
            }
        }
    }

    fn vertex_attrib_pointer(&self, index: GLuint, size: GLint, type_: GLenum, normalized: bool, stride: GLsizei, pointer: u64) {
        let mut state = self.state.borrow_mut();
        state.record(Call::vertex_attrib_pointer { index, size, type_, normalized, stride, pointer });
        set_attrib_pointer(&mut state, index, size, type_, normalized, stride, pointer, false);
    }

    fn vertex_attrib_i_pointer(&self, index: GLuint, size: GLint, type_: GLenum, stride: GLsizei, pointer: u64) {
        let mut state = self.state.borrow_mut();
        state.record(Call::vertex_attrib_i_pointer { index, size, type_, stride, pointer });
        set_attrib_pointer(&mut state, index, size, type_, false, stride, pointer, true);
    }

    fn vertex_attrib_divisor(&self, index: GLuint, divisor: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::vertex_attrib_divisor { index, divisor });
        match state.vertex_array().attribs.get_mut(index as usize) {
            Some(attrib) => attrib.divisor = divisor,
            None => state.error(enums::INVALID_VALUE),
        }
    }

    fn enable_vertex_attrib_array(&self, index: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::enable_vertex_attrib_array { index });
        match state.vertex_array().attribs.get_mut(index as usize) {
            Some(attrib) => attrib.enabled = true,
            None => state.error(enums::INVALID_VALUE),
        }
    }

    fn disable_vertex_attrib_array(&self, index: GLuint) {
        let mut state = self.state.borrow_mut();
        state.record(Call::disable_vertex_attrib_array { index });
        match state.vertex_array().attribs.get_mut(index as usize) {
            Some(attrib) => attrib.enabled = false,
            None => state.error(enums::INVALID_VALUE),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn set_attrib_pointer(
    state: &mut State,
    index: GLuint,
    size: GLint,
    type_: GLenum,
    normalized: bool,
    stride: GLsizei,
    pointer: u64,
    integer: bool,
) {
    let buffer = state.buffer_bindings.get(&enums::ARRAY_BUFFER).copied().unwrap_or(0);
    // Client-side arrays only work with the default vertex array.
    if state.vertex_array_binding != 0 && buffer == 0 && pointer != 0 {
        return state.error(enums::INVALID_OPERATION);
    }
    match state.vertex_array().attribs.get_mut(index as usize) {
        Some(attrib) => {
            *attrib = VertexAttrib {
                enabled: attrib.enabled,
                divisor: attrib.divisor,
                size,
                type_,
                normalized,
                stride,
                integer,
                buffer,
                pointer,
            };
        }
        None => state.error(enums::INVALID_VALUE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "#version 330
layout(location = 2) in vec3 normal;
in vec4 position;
uniform mat4 mvp;
uniform float weights[3];
layout(std140) uniform Lights {
    vec4 color;
    float intensity;
};
out vec2 uv;
void main() {
    gl_Position = mvp * position;
}
";

    #[test]
    fn test_scan_glsl() {
        let decls = scan_glsl(VS).unwrap();
        let names: Vec<&str> = decls.inputs.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["normal", "position"]);
        assert_eq!(decls.inputs[0].location, Some(2));
        assert_eq!(decls.uniforms[1].array_size, 3);
        assert_eq!(decls.blocks[0].name, "Lights");
        assert_eq!(decls.blocks[0].members.len(), 2);
        assert_eq!(block_data_size(&decls.blocks[0].members), 32);
        assert_eq!(decls.outputs[0].type_, enums::FLOAT_VEC2);

        assert!(scan_glsl("uniform quaternion q;").is_err());
    }

    #[test]
    fn test_link_and_uniforms() {
        let gl = FakeGl::new();
        let vs = gl.create_shader(enums::VERTEX_SHADER);
        gl.shader_source(vs, VS);
        gl.compile_shader(vs);
        assert_eq!(gl.get_shader_iv(vs, enums::COMPILE_STATUS), 1);

        let program = gl.create_program();
        gl.attach_shader(program, vs);
        gl.bind_attrib_location(program, 5, "position");
        gl.link_program(program);
        assert_eq!(gl.get_program_iv(program, enums::LINK_STATUS), 1);
        assert_eq!(gl.get_attrib_location(program, "normal"), 2);
        assert_eq!(gl.get_attrib_location(program, "position"), 5);
        assert_eq!(gl.get_active_uniform(program, 1), (3, enums::FLOAT, "weights[0]".to_string()));
        assert_eq!(gl.get_uniform_location(program, "weights[2]"), 3);
        assert_eq!(gl.get_uniform_location(program, "color"), -1);

        gl.use_program(program);
        gl.uniform_fv(1, 2, &[0.5, 0.25]);
        let mut value = [0.0];
        gl.get_uniform_fv(program, 3, &mut value);
        assert_eq!(value, [0.25]);
        assert_eq!(gl.get_error(), enums::NO_ERROR);

        // Wrong shape.
        gl.uniform_fv(2, 0, &[1.0, 2.0]);
        assert_eq!(gl.get_error(), enums::INVALID_OPERATION);

        let broken = gl.create_shader(enums::FRAGMENT_SHADER);
        gl.shader_source(broken, "#error nope\n");
        gl.compile_shader(broken);
        assert_eq!(gl.get_shader_iv(broken, enums::COMPILE_STATUS), 0);
        assert!(gl.get_shader_info_log(broken).contains("#error nope"));
        gl.attach_shader(program, broken);
        gl.link_program(program);
        assert_eq!(gl.get_program_iv(program, enums::LINK_STATUS), 0);
    }
}
