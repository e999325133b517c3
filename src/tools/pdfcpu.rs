//! pdfcpu adapter for [`DocumentTool`].

use super::{CommandLine, DocumentTool, ImportGeometry};
use crate::config::{Orientation, PaperSize};
use crate::error::ToolError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PdfCpu {
    exe: PathBuf,
    timeout: Duration,
}

impl PdfCpu {
    pub fn new(exe: PathBuf, timeout: Duration) -> Self {
        Self { exe, timeout }
    }

    /// `pdfcpu import [-- <description>] <out> <images...>`.
    ///
    /// pdfcpu appends to an existing `output`, so callers pass a fresh path.
    pub fn import_command(
        &self,
        pages: &[PathBuf],
        geometry: Option<&ImportGeometry>,
        output: &Path,
    ) -> CommandLine {
        let mut cmd = CommandLine::new(&self.exe).arg("import");
        if let Some(g) = geometry {
            cmd = cmd.arg("--").arg(import_description(g));
        }
        cmd.arg(output).args(pages)
    }
}

/// pdfcpu import description string for `geometry`; images are centred.
pub fn import_description(geometry: &ImportGeometry) -> String {
    match geometry {
        ImportGeometry::Paper(size, orientation) => {
            let suffix = match orientation {
                Orientation::Portrait => 'P',
                Orientation::Landscape => 'L',
            };
            format!("form:{}{}, pos:c", form_name(*size), suffix)
        }
        ImportGeometry::Fixed {
            width_pt,
            height_pt,
        } => format!("dim:{width_pt} {height_pt}, pos:c"),
    }
}

/// pdfcpu names the B series after the JIS table used for height targets.
fn form_name(size: PaperSize) -> String {
    match size {
        PaperSize::B0
        | PaperSize::B1
        | PaperSize::B2
        | PaperSize::B3
        | PaperSize::B4
        | PaperSize::B5
        | PaperSize::B6
        | PaperSize::B7 => format!("JIS-{size}"),
        _ => size.to_string(),
    }
}

#[async_trait]
impl DocumentTool for PdfCpu {
    async fn import(
        &self,
        pages: &[PathBuf],
        geometry: Option<&ImportGeometry>,
        output: &Path,
    ) -> Result<(), ToolError> {
        self.import_command(pages, geometry, output)
            .run(self.timeout)
            .await
            .map(|_| ())
    }

    async fn set_display_title(&self, document: &Path) -> Result<(), ToolError> {
        CommandLine::new(&self.exe)
            .args(["viewerpref", "set"])
            .arg(document)
            .arg(r#"{"DisplayDocTitle": true}"#)
            .run(self.timeout)
            .await
            .map(|_| ())
    }

    async fn optimize(&self, document: &Path) -> Result<(), ToolError> {
        CommandLine::new(&self.exe)
            .arg("optimize")
            .arg(document)
            .run(self.timeout)
            .await
            .map(|_| ())
    }

    async fn extract_images(
        &self,
        document: &Path,
        dest: &Path,
        timeout: Duration,
    ) -> Result<(), ToolError> {
        CommandLine::new(&self.exe)
            .args(["extract", "-mode", "image"])
            .arg(document)
            .arg(dest)
            .run(timeout)
            .await
            .map(|_| ())
    }
}
