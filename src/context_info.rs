//! What we know about the GL context we're talking to.

use gleam::gl::{GLint, GLuint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::enums;
use crate::gl_api::GlApi;

/// Version, profile, extensions and the handful of limits the state objects
/// consult.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextInfo {
    pub major_version: u32,
    pub minor_version: u32,
    pub vendor: String,
    pub renderer: String,
    pub core_profile: bool,
    pub compatibility_profile: bool,
    pub debug_context: bool,
    pub extensions: BTreeSet<String>,
    pub max_vertex_attribs: u32,
    pub max_draw_buffers: u32,
    pub max_color_attachments: u32,
    pub max_uniform_buffer_bindings: u32,
    pub max_transform_feedback_separate_attribs: u32,
}

/// Parse the leading `major.minor` out of a `GL_VERSION` string, which may
/// carry an `OpenGL ES` prefix and vendor junk after the numbers.
fn parse_version_string(version: &str) -> Option<(u32, u32)> {
    let start = version.find(|c: char| c.is_ascii_digit())?;
    let mut parts = version[start..].split(|c: char| !c.is_ascii_digit());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

fn limit(gl: &dyn GlApi, pname: u32, default: u32) -> u32 {
    match gl.get_integer(pname) {
        n if n > 0 => n as u32,
        _ => default,
    }
}

impl ContextInfo {
    /// A context of the given version with the minimum limits GL 3.x
    /// guarantees and no extensions.
    pub fn for_version(major_version: u32, minor_version: u32) -> ContextInfo {
        ContextInfo {
            major_version,
            minor_version,
            vendor: String::new(),
            renderer: String::new(),
            core_profile: (major_version, minor_version) >= (3, 2),
            compatibility_profile: (major_version, minor_version) < (3, 2),
            debug_context: false,
            extensions: BTreeSet::new(),
            max_vertex_attribs: 16,
            max_draw_buffers: 8,
            max_color_attachments: 8,
            max_uniform_buffer_bindings: 36,
            max_transform_feedback_separate_attribs: 4,
        }
    }

    pub fn with_extension(mut self, name: &str) -> ContextInfo {
        self.extensions.insert(name.to_string());
        self
    }

    /// Ask the current context about itself.
    pub fn query(gl: &dyn GlApi) -> ContextInfo {
        let version_string = gl.get_string(enums::VERSION);
        let (mut major, mut minor) = parse_version_string(&version_string).unwrap_or((1, 0));
        if major >= 3 {
            // Trust the integer queries when they exist.
            let queried = (
                gl.get_integer(enums::MAJOR_VERSION),
                gl.get_integer(enums::MINOR_VERSION),
            );
            if queried.0 > 0 {
                major = queried.0 as u32;
                minor = queried.1.max(0) as u32;
            }
        }

        let mut info = ContextInfo::for_version(major, minor);
        info.vendor = gl.get_string(enums::VENDOR);
        info.renderer = gl.get_string(enums::RENDERER);

        if (major, minor) >= (3, 2) {
            let mask = gl.get_integer(enums::CONTEXT_PROFILE_MASK) as GLuint;
            info.core_profile = mask & enums::CONTEXT_CORE_PROFILE_BIT != 0;
            info.compatibility_profile = mask & enums::CONTEXT_COMPATIBILITY_PROFILE_BIT != 0;
        } else {
            info.core_profile = false;
            info.compatibility_profile = true;
        }

        if major >= 3 {
            let flags = gl.get_integer(enums::CONTEXT_FLAGS) as GLuint;
            info.debug_context = flags & enums::CONTEXT_FLAG_DEBUG_BIT != 0;

            let count: GLint = gl.get_integer(enums::NUM_EXTENSIONS);
            for i in 0..count.max(0) as GLuint {
                let name = gl.get_string_i(enums::EXTENSIONS, i);
                if !name.is_empty() {
                    info.extensions.insert(name);
                }
            }
        } else {
            info.extensions = gl
                .get_string(enums::EXTENSIONS)
                .split_whitespace()
                .map(str::to_string)
                .collect();
        }

        info.max_vertex_attribs = limit(gl, enums::MAX_VERTEX_ATTRIBS, 16);
        info.max_draw_buffers = limit(gl, enums::MAX_DRAW_BUFFERS, 1);
        info.max_color_attachments = limit(gl, enums::MAX_COLOR_ATTACHMENTS, 1).min(16);
        info.max_uniform_buffer_bindings = limit(gl, enums::MAX_UNIFORM_BUFFER_BINDINGS, 0);
        info.max_transform_feedback_separate_attribs =
            limit(gl, enums::MAX_TRANSFORM_FEEDBACK_SEPARATE_ATTRIBS, 0);

        tracing::debug!(
            "GL context: version {}.{}, core {}, compatibility {}, {} extensions, renderer {:?}",
            info.major_version,
            info.minor_version,
            info.core_profile,
            info.compatibility_profile,
            info.extensions.len(),
            info.renderer
        );

        info
    }

    pub fn version(&self) -> (u32, u32) {
        (self.major_version, self.minor_version)
    }

    pub fn is_version_at_least(&self, major: u32, minor: u32) -> bool {
        self.version() >= (major, minor)
    }

    pub fn is_core_profile(&self) -> bool {
        self.core_profile
    }

    pub fn is_compatibility_profile(&self) -> bool {
        self.compatibility_profile
    }

    pub fn is_debug_context(&self) -> bool {
        self.debug_context
    }

    /// Check for an extension by its full name, like `GL_ARB_separate_shader_objects`.
    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    pub fn max_vertex_attribs(&self) -> u32 {
        self.max_vertex_attribs
    }

    pub fn max_draw_buffers(&self) -> u32 {
        self.max_draw_buffers
    }

    pub fn max_color_attachments(&self) -> u32 {
        self.max_color_attachments
    }

    pub fn max_uniform_buffer_bindings(&self) -> u32 {
        self.max_uniform_buffer_bindings
    }

    pub fn max_transform_feedback_separate_attribs(&self) -> u32 {
        self.max_transform_feedback_separate_attribs
    }
}

#[test]
fn test_parse_version_string() {
    assert_eq!(parse_version_string("4.5.0 NVIDIA 390.87"), Some((4, 5)));
    assert_eq!(parse_version_string("3.0 Mesa 18.0.5"), Some((3, 0)));
    assert_eq!(parse_version_string("OpenGL ES 3.2 build 1.10"), Some((3, 2)));
    assert_eq!(parse_version_string("garbage"), None);
    assert_eq!(parse_version_string("4"), None);
}

#[test]
fn test_query() {
    let gl = crate::fake_gl::FakeGl::new();
    let info = ContextInfo::query(&gl);
    assert_eq!(info.version(), (4, 5));
    assert!(info.is_compatibility_profile());
    assert!(info.supports_extension("GL_ARB_separate_shader_objects"));
    assert!(!info.supports_extension("GL_NV_nonexistent"));
    assert_eq!(info.max_draw_buffers(), 8);
    assert_eq!(info.max_color_attachments(), 8);
    assert_eq!(info.max_vertex_attribs(), 16);

    let json = serde_json::to_value(&info).unwrap();
    let back: ContextInfo = serde_json::from_value(json).unwrap();
    assert_eq!(back, info);
}
