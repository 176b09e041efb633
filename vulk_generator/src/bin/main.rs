//! Flagless generation entry point: always regenerates both artifacts from
//! the fixed registry location. Exits non-zero on any unrecoverable parse
//! or preprocessor failure; optional-surface gaps are warnings on stderr.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use vulk_generator::{generator, GenError, Model, Registry};

const REGISTRY_PATH: &str = "vulk_generator/vk.xml";
const HEADER_PATH: &str = "vulk_generator/vulkan.h";
const FAKE_INCLUDE_PATH: &str = "vulk_generator/fake_libc_include";
const BINDINGS_OUT: &str = "vulkan.rs";
const CDEF_OUT: &str = "vulkan.cdef.h";

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("generation failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), GenError> {
    let registry = Registry::parse(File::open(REGISTRY_PATH)?)?;
    let model = Model::build(&registry)?;

    let mut bindings = File::create(BINDINGS_OUT)?;
    bindings.write_all(generator::emit_bindings(&model).as_bytes())?;
    log::info!("wrote {}", BINDINGS_OUT);

    generator::flatten_declarations(
        Path::new(HEADER_PATH),
        Path::new(FAKE_INCLUDE_PATH),
        Path::new(CDEF_OUT),
    )
}
