//! Input resolution: expand user-supplied paths and glob patterns.
//!
//! Shells on Windows do not expand wildcards, so patterns are expanded here
//! with the `glob` crate. A pattern that matches nothing but names an
//! existing file is taken literally, which covers archive names containing
//! `[` or `]`.

use crate::error::Arc2PdfError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Expand `patterns` into a sorted, de-duplicated list of files.
pub fn resolve_inputs<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>, Arc2PdfError> {
    let mut found = BTreeSet::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let mut matched = 0usize;

        match glob::glob(pattern) {
            Ok(paths) => {
                for entry in paths {
                    match entry {
                        Ok(path) if path.is_file() => {
                            found.insert(path);
                            matched += 1;
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Cannot read '{}': {}", e.path().display(), e.error()),
                    }
                }
            }
            Err(e) => debug!("'{}' is not a valid pattern ({}); trying it as a path", pattern, e),
        }

        if matched == 0 {
            let literal = PathBuf::from(pattern);
            if literal.is_file() {
                found.insert(literal);
            } else {
                warn!("No files match '{}'", pattern);
            }
        }
    }

    if found.is_empty() {
        return Err(Arc2PdfError::NoInputs {
            patterns: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    debug!("Resolved {} input file(s)", found.len());
    Ok(found.into_iter().collect())
}

/// `<dir>/<stem>.<extension>` where `dir` is `output_dir` or the input's own directory.
pub fn output_path_for(input: &Path, output_dir: Option<&Path>, extension: &str) -> PathBuf {
    let mut name = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".");
    name.push(extension);
    let dir = match output_dir {
        Some(d) => d.to_path_buf(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn glob_matches_are_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.zip", "a.zip", "c.rar"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let zip_glob = dir.path().join("*.zip").to_string_lossy().into_owned();
        let a = dir.path().join("a.zip").to_string_lossy().into_owned();

        let inputs = resolve_inputs(&[zip_glob, a]).unwrap();
        assert_eq!(
            inputs,
            vec![dir.path().join("a.zip"), dir.path().join("b.zip")]
        );
    }

    #[test]
    fn literal_path_with_brackets() {
        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join("[Author] Title.cbz");
        fs::write(&odd, b"x").unwrap();
        let inputs = resolve_inputs(&[odd.to_string_lossy()]).unwrap();
        assert_eq!(inputs, vec![odd]);
    }

    #[test]
    fn nothing_found_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.zip").to_string_lossy().into_owned();
        let err = resolve_inputs(&[pattern]).unwrap_err();
        assert!(matches!(err, Arc2PdfError::NoInputs { .. }));
    }

    #[test]
    fn output_defaults_next_to_input() {
        let out = output_path_for(Path::new("/books/vol.1.zip"), None, "pdf");
        assert_eq!(out, PathBuf::from("/books/vol.1.pdf"));
        let out = output_path_for(Path::new("/books/a.rar"), Some(Path::new("/out")), "pdf");
        assert_eq!(out, PathBuf::from("/out/a.pdf"));
    }
}
