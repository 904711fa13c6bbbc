//! GL object namespaces, and handle types that carry their namespace.

use gleam::gl::GLuint;
use std::fmt;
use std::str::FromStr;

macro_rules! namespaces {
    ( $( $variant:ident => $name:expr, )* ) => {
        /// A category of GL object names. Handles from different namespaces
        /// may collide numerically; they never name the same object.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Namespace {
            $( $variant, )*
        }

        impl Namespace {
            pub const ALL: &'static [Namespace] = &[ $( Namespace::$variant, )* ];

            /// The stable name used in serialized documents.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Namespace::$variant => $name, )*
                }
            }
        }

        impl FromStr for Namespace {
            type Err = UnknownNamespace;

            fn from_str(s: &str) -> Result<Namespace, UnknownNamespace> {
                match s {
                    $( $name => Ok(Namespace::$variant), )*
                    _ => Err(UnknownNamespace(s.to_string())),
                }
            }
        }
    }
}

namespaces! {
    Framebuffers => "framebuffers",
    Textures => "textures",
    RenderBuffers => "render_buffers",
    Queries => "queries",
    Samplers => "samplers",
    ProgramArb => "program_arb",
    Programs => "programs",
    VertexArrays => "vertex_arrays",
    Lists => "lists",
    Locations => "locations",
    Fences => "fences",
    Syncs => "syncs",
    Pipelines => "pipelines",
    Shaders => "shaders",
    Buffers => "buffers",
    Feedbacks => "feedbacks",
    VertexArraysApple => "vertex_arrays_apple",
    FragmentShaderAti => "fragment_shader_ati",
    GlHandleArb => "glhandlearb",
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownNamespace(pub String);

impl fmt::Display for UnknownNamespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown GL object namespace: {:?}", self.0)
    }
}

impl std::error::Error for UnknownNamespace {}

/// A handle whose type says which namespace it belongs to.
pub trait ObjectHandle: Copy {
    const NAMESPACE: Namespace;

    fn raw(self) -> GLuint;
    fn from_raw(raw: GLuint) -> Self;

    /// True for handle 0, the default object or no object at all.
    fn is_default(self) -> bool {
        self.raw() == 0
    }
}

macro_rules! handle_types {
    ( $( $(#[$attr:meta])* $ty:ident => $ns:ident, )* ) => {
        $(
            $(#[$attr])*
            #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $ty(pub GLuint);

            impl ObjectHandle for $ty {
                const NAMESPACE: Namespace = Namespace::$ns;

                fn raw(self) -> GLuint {
                    self.0
                }

                fn from_raw(raw: GLuint) -> Self {
                    $ty(raw)
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{} {}", Namespace::$ns, self.0)
                }
            }
        )*
    }
}

handle_types! {
    FramebufferHandle => Framebuffers,
    TextureHandle => Textures,
    RenderbufferHandle => RenderBuffers,
    QueryHandle => Queries,
    SamplerHandle => Samplers,
    ProgramHandle => Programs,
    VertexArrayHandle => VertexArrays,
    ListHandle => Lists,
    PipelineHandle => Pipelines,
    ShaderHandle => Shaders,
    BufferHandle => Buffers,
    FeedbackHandle => Feedbacks,
}

#[test]
fn test_namespace_names() {
    for &ns in Namespace::ALL {
        assert_eq!(ns.as_str().parse::<Namespace>(), Ok(ns));
    }
    assert_eq!(Namespace::ALL.len(), 19);
    assert_eq!(Namespace::GlHandleArb.as_str(), "glhandlearb");
    assert!("Textures".parse::<Namespace>().is_err());
}

#[test]
fn test_typed_handles() {
    fn check<H: ObjectHandle>(raw: GLuint, ns: Namespace) {
        let h = H::from_raw(raw);
        assert_eq!(h.raw(), raw);
        assert_eq!(H::NAMESPACE, ns);
        assert_eq!(h.is_default(), raw == 0);
    }

    check::<TextureHandle>(7, Namespace::Textures);
    check::<ProgramHandle>(0, Namespace::Programs);
    check::<PipelineHandle>(3, Namespace::Pipelines);
    assert_eq!(ShaderHandle(12).to_string(), "shaders 12");
}
