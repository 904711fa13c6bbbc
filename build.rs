use gl_generator::{Api, Fallbacks, Profile, Registry, StructGenerator};
use std::env;
use std::fs::File;
use std::path::PathBuf;

// Bindings for the entry points `gleam` doesn't expose. Compatibility
// profile, so the fixed-function calls state savers need are included.
fn main() {
    let dest = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut file = File::create(dest.join("gl_bindings.rs")).unwrap();
    Registry::new(
        Api::Gl,
        (4, 6),
        Profile::Compatibility,
        Fallbacks::All,
        ["GL_ARB_separate_shader_objects", "GL_ARB_program_interface_query"],
    )
    .write_bindings(StructGenerator, &mut file)
    .unwrap();
}
