//! Compute and render program loading.
//!
//! Stages ask a [`ProgramSource`] for fully resolved WGSL by logical path and
//! compile it into a shader module. [`EmbeddedPrograms`] is the bundled
//! source: every program ships inside the binary and `#!import name` lines
//! are replaced by the named file from the same directory.

use std::collections::{HashMap, HashSet};

use rime_common::ProgramError;
use tracing::debug;

/// Directive that pulls another program into the current one.
pub const IMPORT_DIRECTIVE: &str = "#!import";

/// Logical path of the shared definitions.
pub const COMMON_PROGRAM: &str = "shaders/common.wgsl";
/// Logical path of the initialiser.
pub const INITIALISE_PROGRAM: &str = "shaders/initialise.wgsl";
/// Logical path of the diffusion stage.
pub const DIFFUSION_PROGRAM: &str = "shaders/diffusion.wgsl";
/// Logical path of the freezing stage.
pub const FREEZING_PROGRAM: &str = "shaders/freezing.wgsl";
/// Logical path of the raster stage.
pub const RASTER_PROGRAM: &str = "shaders/raster.wgsl";
/// Logical path of the post-render stage.
pub const POST_RENDER_PROGRAM: &str = "shaders/post_render.wgsl";
/// Logical path of the present pass.
pub const PRESENT_PROGRAM: &str = "shaders/present.wgsl";

/// Resolves a logical program path to WGSL with every import inlined.
pub trait ProgramSource: Send {
    /// Returns the resolved source for `path`.
    fn resolve(&self, path: &str) -> Result<String, ProgramError>;
}

/// Programs compiled into the binary.
#[derive(Debug, Clone)]
pub struct EmbeddedPrograms {
    files: HashMap<String, &'static str>,
}

impl Default for EmbeddedPrograms {
    fn default() -> Self {
        let files = [
            (COMMON_PROGRAM, include_str!("../shaders/common.wgsl")),
            (INITIALISE_PROGRAM, include_str!("../shaders/initialise.wgsl")),
            (DIFFUSION_PROGRAM, include_str!("../shaders/diffusion.wgsl")),
            (FREEZING_PROGRAM, include_str!("../shaders/freezing.wgsl")),
            (RASTER_PROGRAM, include_str!("../shaders/raster.wgsl")),
            (POST_RENDER_PROGRAM, include_str!("../shaders/post_render.wgsl")),
            (PRESENT_PROGRAM, include_str!("../shaders/present.wgsl")),
        ];
        Self::from_files(files)
    }
}

impl EmbeddedPrograms {
    /// Builds a source set from `(path, text)` pairs.
    pub fn from_files(files: impl IntoIterator<Item = (&'static str, &'static str)>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(path, text)| (path.to_string(), text))
                .collect(),
        }
    }

    fn expand(
        &self,
        path: &str,
        included: &mut HashSet<String>,
        stack: &mut Vec<String>,
        out: &mut String,
    ) -> Result<(), ProgramError> {
        if stack.iter().any(|p| p == path) {
            return Err(ProgramError::ImportCycle(path.to_string()));
        }
        if !included.insert(path.to_string()) {
            return Ok(());
        }
        let text = self
            .files
            .get(path)
            .ok_or_else(|| ProgramError::NotFound(path.to_string()))?;

        stack.push(path.to_string());
        for line in text.lines() {
            match line.trim().strip_prefix(IMPORT_DIRECTIVE) {
                Some(name) => {
                    let import = import_path(path, name.trim());
                    self.expand(&import, included, stack, out)?;
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        stack.pop();
        Ok(())
    }
}

impl ProgramSource for EmbeddedPrograms {
    fn resolve(&self, path: &str) -> Result<String, ProgramError> {
        let mut out = String::new();
        self.expand(path, &mut HashSet::new(), &mut Vec::new(), &mut out)?;
        Ok(out)
    }
}

/// Path of `name` imported from the program at `from`.
#[must_use]
pub fn import_path(from: &str, name: &str) -> String {
    let dir = from.rfind('/').map_or("", |slash| &from[..=slash]);
    format!("{dir}{name}.wgsl")
}

/// Resolves and compiles the program at `path`.
pub fn load_program(
    device: &wgpu::Device,
    source: &dyn ProgramSource,
    path: &str,
) -> Result<wgpu::ShaderModule, ProgramError> {
    let wgsl = source.resolve(path)?;
    debug!("Compiling program {path} ({} bytes)", wgsl.len());
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(path),
        source: wgpu::ShaderSource::Wgsl(wgsl.into()),
    }))
}
