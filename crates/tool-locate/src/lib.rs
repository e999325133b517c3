//! # tool-locate
//!
//! Find the external executables that `jisui-arc2pdf` drives: 7-Zip for
//! archives, ImageMagick for raster work, pdfcpu for building documents and
//! qpdf for linearisation.
//!
//! ## How it works
//!
//! [`locate`] walks a fixed chain and returns the first hit:
//!
//! 1. The explicit path supplied by the caller (e.g. `--magick-path`), if
//!    the file exists.
//! 2. The `ARC2PDF_<TOOL>_PATH` environment variable, if it points at an
//!    existing file.
//! 3. The directory containing the running executable, so a portable
//!    install can ship its tools side by side.
//! 4. Every directory on `PATH`.
//!
//! ```rust,no_run
//! use tool_locate::{locate, ToolKind};
//!
//! let magick = locate(ToolKind::Magick, None).expect("ImageMagick unavailable");
//! println!("using {}", magick.display());
//! ```
//!
//! ## Platform support
//!
//! | Tool      | Unix name | Windows name  |
//! |-----------|-----------|---------------|
//! | 7-Zip     | `7z`      | `7z.exe`      |
//! | ImageMagick | `magick` | `magick.exe` |
//! | pdfcpu    | `pdfcpu`  | `pdfcpu.exe`  |
//! | qpdf      | `qpdf`    | `qpdf.exe`    |

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Tool identities ──────────────────────────────────────────────────────────

/// One of the external programs the converter depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SevenZip,
    Magick,
    PdfCpu,
    Qpdf,
}

impl ToolKind {
    /// All known tools, in the order they are reported to the user.
    pub const ALL: [ToolKind; 4] = [
        ToolKind::SevenZip,
        ToolKind::Magick,
        ToolKind::PdfCpu,
        ToolKind::Qpdf,
    ];

    /// Executable file name for the current platform.
    pub fn executable_name(self) -> &'static str {
        let windows = cfg!(windows);
        match (self, windows) {
            (ToolKind::SevenZip, false) => "7z",
            (ToolKind::SevenZip, true) => "7z.exe",
            (ToolKind::Magick, false) => "magick",
            (ToolKind::Magick, true) => "magick.exe",
            (ToolKind::PdfCpu, false) => "pdfcpu",
            (ToolKind::PdfCpu, true) => "pdfcpu.exe",
            (ToolKind::Qpdf, false) => "qpdf",
            (ToolKind::Qpdf, true) => "qpdf.exe",
        }
    }

    /// Environment variable consulted before the executable directory and `PATH`.
    pub fn env_var(self) -> &'static str {
        match self {
            ToolKind::SevenZip => "ARC2PDF_SEVENZIP_PATH",
            ToolKind::Magick => "ARC2PDF_MAGICK_PATH",
            ToolKind::PdfCpu => "ARC2PDF_PDFCPU_PATH",
            ToolKind::Qpdf => "ARC2PDF_QPDF_PATH",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolKind::SevenZip => "7-Zip",
            ToolKind::Magick => "ImageMagick",
            ToolKind::PdfCpu => "pdfcpu",
            ToolKind::Qpdf => "qpdf",
        };
        f.write_str(name)
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tool lookup.
#[derive(Error, Debug)]
pub enum LocateError {
    /// The tool was not found in any searched location.
    #[error(
        "{tool} ({name}) not found. Searched: {searched}\n\
         Pass its path explicitly, place it next to the executable, or add it to PATH."
    )]
    NotFound {
        tool: ToolKind,
        name: &'static str,
        searched: String,
    },
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Locate `tool`, preferring `explicit` when it names an existing file.
pub fn locate(tool: ToolKind, explicit: Option<&Path>) -> Result<PathBuf, LocateError> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    let env_override = std::env::var_os(tool.env_var()).map(PathBuf::from);
    let search_path = std::env::var_os("PATH");

    locate_in(
        tool,
        explicit,
        env_override.as_deref(),
        exe_dir.as_deref(),
        search_path.as_deref(),
    )
}

/// Lookup with every input made explicit, so it can be exercised without
/// touching the process environment.
pub fn locate_in(
    tool: ToolKind,
    explicit: Option<&Path>,
    env_override: Option<&Path>,
    exe_dir: Option<&Path>,
    search_path: Option<&std::ffi::OsStr>,
) -> Result<PathBuf, LocateError> {
    let name = tool.executable_name();
    let mut searched: Vec<String> = Vec::new();

    if let Some(p) = explicit {
        if p.is_file() {
            return Ok(p.to_path_buf());
        }
        searched.push(format!("explicit path {}", p.display()));
    }

    if let Some(p) = env_override {
        if p.is_file() {
            return Ok(p.to_path_buf());
        }
        searched.push(format!("${} ({})", tool.env_var(), p.display()));
    }

    if let Some(dir) = exe_dir {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
        searched.push(format!("executable directory {}", dir.display()));
    }

    if let Some(paths) = search_path {
        for dir in std::env::split_paths(paths) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        searched.push("PATH".to_string());
    }

    Err(LocateError::NotFound {
        tool,
        name,
        searched: searched.join(", "),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, b"").unwrap();
        p
    }

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = touch(dir.path(), "my-magick");
        let other = tempfile::tempdir().unwrap();
        touch(other.path(), ToolKind::Magick.executable_name());

        let found = locate_in(
            ToolKind::Magick,
            Some(&explicit),
            None,
            Some(other.path()),
            None,
        )
        .unwrap();
        assert_eq!(found, explicit);
    }

    #[test]
    fn missing_explicit_falls_through_to_exe_dir() {
        let dir = tempfile::tempdir().unwrap();
        let expected = touch(dir.path(), ToolKind::PdfCpu.executable_name());

        let found = locate_in(
            ToolKind::PdfCpu,
            Some(Path::new("/definitely/not/here/pdfcpu")),
            None,
            Some(dir.path()),
            None,
        )
        .unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn env_override_precedes_exe_dir() {
        let env_dir = tempfile::tempdir().unwrap();
        let env_tool = touch(env_dir.path(), "qpdf-custom");
        let exe_dir = tempfile::tempdir().unwrap();
        touch(exe_dir.path(), ToolKind::Qpdf.executable_name());

        let found =
            locate_in(ToolKind::Qpdf, None, Some(&env_tool), Some(exe_dir.path()), None).unwrap();
        assert_eq!(found, env_tool);
    }

    #[test]
    fn search_path_is_scanned_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        touch(second.path(), ToolKind::SevenZip.executable_name());
        let expected = touch(first.path(), ToolKind::SevenZip.executable_name());

        let joined =
            std::env::join_paths([first.path(), second.path()]).expect("joinable paths");
        let found = locate_in(ToolKind::SevenZip, None, None, None, Some(&joined)).unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn not_found_lists_search_locations() {
        let empty = tempfile::tempdir().unwrap();
        let err = locate_in(
            ToolKind::Magick,
            Some(Path::new("/nope/magick")),
            None,
            Some(empty.path()),
            None,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ImageMagick"), "got: {msg}");
        assert!(msg.contains("/nope/magick"), "got: {msg}");
        assert!(msg.contains("executable directory"), "got: {msg}");
    }

    #[test]
    fn env_var_names_are_distinct() {
        let mut names: Vec<&str> = ToolKind::ALL.iter().map(|t| t.env_var()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ToolKind::ALL.len());
    }
}
