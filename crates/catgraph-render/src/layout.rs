//! External layout engine

use crate::error::LayoutError;
use async_trait::async_trait;
use catgraph_core::{LayoutAlgorithm, OutputFormat};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Turns diagram source into a rendered file.
///
/// When `image_map` is given, a client-side coordinate map is written
/// there alongside the output.
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    async fn render(
        &self,
        source: &Path,
        output: &Path,
        algorithm: LayoutAlgorithm,
        format: OutputFormat,
        image_map: Option<&Path>,
    ) -> Result<(), LayoutError>;

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// Runs the Graphviz command line tool as a subprocess.
#[derive(Debug, Clone)]
pub struct GraphvizCommand {
    program: String,
}

impl GraphvizCommand {
    pub fn new(program: impl Into<String>) -> Self {
        GraphvizCommand {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command line arguments for one invocation.
    pub fn args(
        source: &Path,
        output: &Path,
        algorithm: LayoutAlgorithm,
        format: OutputFormat,
        image_map: Option<&Path>,
    ) -> Vec<String> {
        let mut args = vec![
            format!("-K{}", algorithm.name()),
            format!("-T{}", format.engine_name()),
            "-o".to_string(),
            output.display().to_string(),
        ];
        if let Some(map) = image_map {
            args.push("-Tcmapx".to_string());
            args.push("-o".to_string());
            args.push(map.display().to_string());
        }
        args.push(source.display().to_string());
        args
    }
}

impl Default for GraphvizCommand {
    fn default() -> Self {
        Self::new("dot")
    }
}

#[async_trait]
impl LayoutEngine for GraphvizCommand {
    async fn render(
        &self,
        source: &Path,
        output: &Path,
        algorithm: LayoutAlgorithm,
        format: OutputFormat,
        image_map: Option<&Path>,
    ) -> Result<(), LayoutError> {
        let args = Self::args(source, output, algorithm, format, image_map);
        debug!("Running {} {}", self.program, args.join(" "));

        let result = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(false)
            .output()
            .await
            .map_err(|e| LayoutError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            warn!("{} failed ({}): {}", self.program, result.status, stderr);
            return Err(LayoutError::Failed {
                status: result.status.to_string(),
                stderr,
            });
        }

        for path in std::iter::once(output).chain(image_map) {
            if !path.exists() {
                return Err(LayoutError::MissingOutput(path.display().to_string()));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}
