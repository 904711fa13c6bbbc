use docopt::Docopt;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::{fs, io};
use tracing_subscriber::EnvFilter;

use gl_state::{
    deserialize_objects, BlobManager, FramebufferState, GlEnumTable, GlObjectState, MemoryBlobManager,
    NullBlobManager, ProgramState, ShaderState,
};

const USAGE: &str = "
Summarize a serialized GL object state document.

Usage:
  gl-state-dump [--blobs=<archive>] <document> [--compare=<other>]
  gl-state-dump (-h | --help)

Options:
  --blobs=<archive>   Blob archive holding shader sources and program binaries.
  --compare=<other>   Report objects whose restorable state differs in <other>.
  -h --help           Show this message.

Set RUST_LOG to see warnings from deserialization.
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_document: String,
    flag_blobs: Option<String>,
    flag_compare: Option<String>,
}

fn read_document(path: &str) -> Result<Value, Box<dyn Error>> {
    let file = io::BufReader::new(fs::File::open(path)?);
    Ok(serde_json::from_reader(file)?)
}

fn load_objects(
    path: &str,
    enums: &GlEnumTable,
    blobs: &dyn BlobManager,
) -> Result<Vec<Box<dyn GlObjectState>>, Box<dyn Error>> {
    let document = read_document(path)?;
    deserialize_objects(&document, enums, blobs).map_err(|err| format!("{}: {}", path, err).into())
}

fn describe(state: &dyn GlObjectState, enums: &GlEnumTable) -> String {
    let any = state.as_any();
    if let Some(program) = any.downcast_ref::<ProgramState>() {
        format!(
            "linked: {}, {} uniforms, {} attribs{}",
            program.link_status(),
            program.uniforms().len(),
            program.attribs().len(),
            if program.link_time_snapshot().is_some() { ", with link-time snapshot" } else { "" }
        )
    } else if let Some(shader) = any.downcast_ref::<ShaderState>() {
        format!(
            "{}, compiled: {}, {} bytes of source",
            enums.name(shader.shader_type(), None),
            shader.compile_status(),
            shader.source().len()
        )
    } else if let Some(framebuffer) = any.downcast_ref::<FramebufferState>() {
        format!(
            "{}, {} attachments",
            enums.name(framebuffer.status(), None),
            framebuffer.attachments().len()
        )
    } else {
        String::new()
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let enums = GlEnumTable::standard();
    let archive;
    let blobs: &dyn BlobManager = match &args.flag_blobs {
        Some(path) => {
            archive = MemoryBlobManager::load(path)?;
            &archive
        }
        None => &NullBlobManager,
    };

    let objects = load_objects(&args.arg_document, enums, blobs)?;
    for (i, state) in objects.iter().enumerate() {
        println!(
            "{:4} {:16} {:6} {}",
            i,
            state.object_type().as_str(),
            state.snapshot_handle(),
            describe(&**state, enums)
        );
    }

    if let Some(other) = &args.flag_compare {
        let others = load_objects(other, enums, blobs)?;
        let mut differences = 0;
        for state in &objects {
            let counterpart = others
                .iter()
                .find(|o| o.object_type() == state.object_type() && o.snapshot_handle() == state.snapshot_handle());
            match counterpart {
                None => {
                    println!("{} {}: missing from {}", state.object_type(), state.snapshot_handle(), other);
                    differences += 1;
                }
                Some(o) if !state.compare_restorable_state(&**o) => {
                    println!("{} {}: differs", state.object_type(), state.snapshot_handle());
                    differences += 1;
                }
                Some(_) => {}
            }
        }
        for o in &others {
            if !objects
                .iter()
                .any(|s| s.object_type() == o.object_type() && s.snapshot_handle() == o.snapshot_handle())
            {
                println!("{} {}: only in {}", o.object_type(), o.snapshot_handle(), other);
                differences += 1;
            }
        }
        println!("{} difference(s)", differences);
    }

    Ok(())
}
