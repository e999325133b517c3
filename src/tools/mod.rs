//! Seams to the external programs the pipeline drives.
//!
//! The pipeline never spawns a process directly. It talks to four traits,
//! one per collaborator:
//!
//! | Trait | Default adapter | Used for |
//! |-------|-----------------|----------|
//! | [`ArchiveTool`]  | [`sevenzip::SevenZip`] | extract archives, pack zips |
//! | [`RasterEngine`] | [`magick::Magick`]     | classify, measure, transform pages |
//! | [`DocumentTool`] | [`pdfcpu::PdfCpu`]     | import, viewer prefs, optimise, extract images |
//! | [`Linearizer`]   | [`qpdf::Qpdf`]         | streaming-friendly reordering |
//!
//! Each invocation is a blocking child process wrapped in a tokio timeout;
//! a timeout kills the child and is reported as [`ToolError::Timeout`].
//! Tests substitute in-memory fakes for all four.

pub mod magick;
pub mod pdfcpu;
pub mod qpdf;
pub mod sevenzip;

#[cfg(test)]
pub(crate) mod fakes;

use crate::config::{ConversionConfig, Orientation, PaperSize};
use crate::error::{Arc2PdfError, ToolError};
use crate::transform::TransformSpec;
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tool_locate::{locate, ToolKind};
use tracing::debug;

// ── Collaborator traits ──────────────────────────────────────────────────

/// Unpacks and packs archive containers.
#[async_trait]
pub trait ArchiveTool: Send + Sync {
    /// Unpack `archive` into `dest`, preserving the entry tree.
    async fn extract(&self, archive: &Path, dest: &Path, timeout: Duration)
        -> Result<(), ToolError>;

    /// Pack `files` (relative to `base_dir`) into a new zip at `dest`.
    async fn pack_zip(&self, base_dir: &Path, files: &[PathBuf], dest: &Path)
        -> Result<(), ToolError>;
}

/// Decodes, measures and re-encodes raster images.
#[async_trait]
pub trait RasterEngine: Send + Sync {
    /// Whether `path` is decodable raster content. Errors count as "no".
    async fn is_image(&self, path: &Path) -> bool;

    /// `(width, height)` in pixels.
    async fn dimensions(&self, path: &Path) -> Result<(u32, u32), ToolError>;

    /// Mean HSL saturation in 0–1.
    async fn saturation(&self, path: &Path) -> Result<f64, ToolError>;

    /// Apply `spec` to `input` and write the result to `output`.
    async fn transform(
        &self,
        input: &Path,
        spec: &TransformSpec,
        output: &Path,
    ) -> Result<(), ToolError>;
}

/// Page geometry directive understood by [`DocumentTool::import`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportGeometry {
    Paper(PaperSize, Orientation),
    /// Fixed page box in PDF points.
    Fixed { width_pt: u32, height_pt: u32 },
}

/// Builds and post-processes paginated documents.
#[async_trait]
pub trait DocumentTool: Send + Sync {
    /// Create `output` with one page per image, in the given order.
    async fn import(
        &self,
        pages: &[PathBuf],
        geometry: Option<&ImportGeometry>,
        output: &Path,
    ) -> Result<(), ToolError>;

    /// Ask viewers to show the document title instead of the file name.
    async fn set_display_title(&self, document: &Path) -> Result<(), ToolError>;

    /// Structural optimisation, in place.
    async fn optimize(&self, document: &Path) -> Result<(), ToolError>;

    /// Write every embedded image of `document` into `dest`.
    async fn extract_images(
        &self,
        document: &Path,
        dest: &Path,
        timeout: Duration,
    ) -> Result<(), ToolError>;
}

/// Rewrites a finished document for progressive loading.
#[async_trait]
pub trait Linearizer: Send + Sync {
    async fn linearize(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

// ── Toolchains ───────────────────────────────────────────────────────────

/// Explicit executable paths from the command line; `None` means "search".
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    pub sevenzip: Option<PathBuf>,
    pub magick: Option<PathBuf>,
    pub pdfcpu: Option<PathBuf>,
    pub qpdf: Option<PathBuf>,
}

/// The collaborators one archive conversion needs.
#[derive(Clone)]
pub struct Toolchain {
    pub archiver: Arc<dyn ArchiveTool>,
    pub raster: Arc<dyn RasterEngine>,
    pub document: Arc<dyn DocumentTool>,
    /// Present only when linearisation was requested.
    pub linearizer: Option<Arc<dyn Linearizer>>,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("linearizer", &self.linearizer.is_some())
            .finish_non_exhaustive()
    }
}

impl Toolchain {
    /// Locate the real executables. Any missing required tool is fatal to the run.
    ///
    /// qpdf is required only when `config.linearize` is set.
    pub fn discover(paths: &ToolPaths, config: &ConversionConfig) -> Result<Self, Arc2PdfError> {
        let tool_timeout = Duration::from_secs(config.tool_timeout_secs);
        let sevenzip = locate(ToolKind::SevenZip, paths.sevenzip.as_deref())?;
        let magick = locate(ToolKind::Magick, paths.magick.as_deref())?;
        let pdfcpu = locate(ToolKind::PdfCpu, paths.pdfcpu.as_deref())?;
        let qpdf = if config.linearize {
            Some(locate(ToolKind::Qpdf, paths.qpdf.as_deref())?)
        } else {
            None
        };

        debug!(
            "Tools: 7z={} magick={} pdfcpu={} qpdf={:?}",
            sevenzip.display(),
            magick.display(),
            pdfcpu.display(),
            qpdf
        );

        Ok(Self {
            archiver: Arc::new(sevenzip::SevenZip::new(sevenzip, tool_timeout)),
            raster: Arc::new(magick::Magick::new(
                magick,
                Duration::from_secs(config.identify_timeout_secs),
                tool_timeout,
            )),
            document: Arc::new(pdfcpu::PdfCpu::new(pdfcpu, tool_timeout)),
            linearizer: qpdf.map(|p| Arc::new(qpdf::Qpdf::new(p, tool_timeout)) as Arc<dyn Linearizer>),
        })
    }
}

/// The collaborators the document → archive direction needs.
#[derive(Clone)]
pub struct RepackToolchain {
    pub archiver: Arc<dyn ArchiveTool>,
    pub document: Arc<dyn DocumentTool>,
}

impl RepackToolchain {
    pub fn discover(paths: &ToolPaths, tool_timeout: Duration) -> Result<Self, Arc2PdfError> {
        let sevenzip = locate(ToolKind::SevenZip, paths.sevenzip.as_deref())?;
        let pdfcpu = locate(ToolKind::PdfCpu, paths.pdfcpu.as_deref())?;
        Ok(Self {
            archiver: Arc::new(sevenzip::SevenZip::new(sevenzip, tool_timeout)),
            document: Arc::new(pdfcpu::PdfCpu::new(pdfcpu, tool_timeout)),
        })
    }
}

// ── Process invocation ───────────────────────────────────────────────────

/// A validated argument vector for one external program.
///
/// Arguments are passed as separate OS strings, never through a shell.
#[derive(Debug, Clone)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    ok_codes: Vec<i32>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            ok_codes: vec![0],
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Treat these exit codes as success in addition to 0.
    pub fn accept_exit_codes(mut self, codes: &[i32]) -> Self {
        self.ok_codes.extend_from_slice(codes);
        self
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Run to completion within `timeout`; returns stdout on success.
    pub async fn run(&self, timeout: Duration) -> Result<Vec<u8>, ToolError> {
        let program = self.program_name();
        debug!("exec: {}", self);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Err(_) => {
                return Err(ToolError::Timeout {
                    program,
                    secs: timeout.as_secs(),
                })
            }
            Ok(Err(e)) => {
                return Err(ToolError::Spawn {
                    program,
                    detail: e.to_string(),
                })
            }
            Ok(Ok(output)) => output,
        };

        let accepted = output
            .status
            .code()
            .is_some_and(|c| self.ok_codes.contains(&c));
        if !accepted {
            return Err(ToolError::Failed {
                program,
                code: output.status.to_string(),
                stderr: truncate(String::from_utf8_lossy(&output.stderr).trim(), 400),
            });
        }

        Ok(output.stdout)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for a in &self.args {
            let a = a.to_string_lossy();
            if a.contains(char::is_whitespace) {
                write!(f, " \"{a}\"")?;
            } else {
                write!(f, " {a}")?;
            }
        }
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}\u{2026}")
    }
}

/// `path` with an ImageMagick frame selector appended, e.g. `scan.tif[0]`.
pub(crate) fn first_frame(path: &Path) -> OsString {
    let mut s = path.as_os_str().to_os_string();
    s.push("[0]");
    s
}
