//! Build pipeline: Inform 7 source text to a runnable Z-machine story file.
//!
//! Two sequential external tool runs inside an isolated temp directory:
//! stage 1 (`ni`) translates the natural-language source into Inform 6
//! code, stage 2 (`inform6`) assembles that into `output.z8`. The temp
//! directory is removed on every exit path, and dropping the in-flight
//! future kills whichever tool is running.

mod tool;

use std::ffi::OsStr;

use thiserror::Error;

pub use tool::{
    run_tool, Toolchain, ToolOutput, DEFAULT_FROTZ, DEFAULT_INFORM6, DEFAULT_INFORM7,
    DEFAULT_INTERNAL,
};

/// Fixed flags for the Inform 6 assembler stage.
const INFORM6_FLAGS: &str = "-E2wSDv8F0Cud2";

/// Failures from the build pipeline. Stage failures carry the tool's
/// captured output so it can be shown to the author.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("could not set up a build directory")]
    Workdir(#[source] std::io::Error),

    #[error("could not write the story source")]
    WriteSource(#[source] std::io::Error),

    #[error("could not run the {tool} compiler: {reason}")]
    Tool {
        tool: &'static str,
        reason: anyhow::Error,
    },

    #[error("Inform 7 rejected the story:\n{diagnostics}")]
    Stage1 { diagnostics: String },

    #[error("Inform 6 rejected the story:\n{diagnostics}")]
    Stage2 { diagnostics: String },

    #[error("the compiled story file was not produced")]
    MissingArtifact,
}

/// Compile Inform 7 source into Z-machine story-file bytes.
pub async fn compile(tools: &Toolchain, source: &[u8]) -> Result<Vec<u8>, CompileError> {
    let dir = tempfile::Builder::new()
        .prefix("fablebot-build-")
        .tempdir()
        .map_err(CompileError::Workdir)?;

    let source_dir = dir.path().join("Source");
    std::fs::create_dir(&source_dir).map_err(CompileError::Workdir)?;
    std::fs::write(source_dir.join("story.ni"), source).map_err(CompileError::WriteSource)?;

    // Stage 1: Inform 7 natural-language compiler. Writes Build/auto.inf
    // under the project directory.
    let stage1_args: [&OsStr; 6] = [
        "--noprogress".as_ref(),
        "--internal".as_ref(),
        tools.internal.as_os_str(),
        "--format=z8".as_ref(),
        "--project".as_ref(),
        dir.path().as_os_str(),
    ];
    let out = run_tool(&tools.inform7, stage1_args)
        .await
        .map_err(|reason| CompileError::Tool {
            tool: "Inform 7",
            reason,
        })?;
    if !out.success() {
        return Err(CompileError::Stage1 {
            diagnostics: out.diagnostics(),
        });
    }

    // Stage 2: Inform 6 assembler, intermediate in, story file out.
    let intermediate = dir.path().join("Build").join("auto.inf");
    let artifact = dir.path().join("Build").join("output.z8");
    let stage2_args: [&OsStr; 3] = [
        INFORM6_FLAGS.as_ref(),
        intermediate.as_os_str(),
        artifact.as_os_str(),
    ];
    let out = run_tool(&tools.inform6, stage2_args)
        .await
        .map_err(|reason| CompileError::Tool {
            tool: "Inform 6",
            reason,
        })?;
    if !out.success() {
        return Err(CompileError::Stage2 {
            diagnostics: out.diagnostics(),
        });
    }

    // Both stages reported success; the artifact must exist.
    let bytes = std::fs::read(&artifact).map_err(|_| CompileError::MissingArtifact)?;
    Ok(bytes)
}
