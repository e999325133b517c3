//! Document assembly and placement of the finished file.
//!
//! Assembly runs entirely inside the archive's working directory. Only the
//! finished document is copied next to the destination (`<name>.pdf.tmp`)
//! and renamed over it, so a failure at any step leaves a previous output
//! untouched.

use crate::config::{ConversionConfig, PageGeometry};
use crate::error::Arc2PdfError;
use crate::page::PageSet;
use crate::tools::{ImportGeometry, RasterEngine, Toolchain};
use std::fs::{File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Windows sharing / lock violations.
const ERROR_SHARING_VIOLATION: i32 = 32;
const ERROR_LOCK_VIOLATION: i32 = 33;

/// Build the document for `set` and move it to `destination`.
///
/// `archive` provides the timestamps copied onto the result.
pub async fn assemble(
    tools: &Toolchain,
    set: &PageSet,
    config: &ConversionConfig,
    work_dir: &Path,
    archive: &Path,
    destination: &Path,
) -> Result<PathBuf, Arc2PdfError> {
    let geometry = resolve_geometry(config, set, tools.raster.as_ref()).await;
    if let Some(ref g) = geometry {
        debug!("Page geometry: {:?}", g);
    }

    let temp = work_dir.join("temp.pdf");
    let paths = set.paths();
    tools
        .document
        .import(&paths, geometry.as_ref(), &temp)
        .await
        .map_err(|e| Arc2PdfError::AssemblyFailed {
            stage: "import",
            detail: e.to_string(),
        })?;
    info!("Imported {} page(s) ({} set)", paths.len(), set.rendition());

    if let Err(e) = tools.document.set_display_title(&temp).await {
        warn!("Could not set viewer preference: {}", e);
    }

    if config.skip_optimization {
        debug!("Optimisation skipped");
    } else {
        tools
            .document
            .optimize(&temp)
            .await
            .map_err(|e| Arc2PdfError::AssemblyFailed {
                stage: "optimize",
                detail: e.to_string(),
            })?;
    }

    let finished = if config.linearize {
        let linearizer = tools.linearizer.as_ref().ok_or_else(|| {
            Arc2PdfError::Internal("linearisation requested but no linearizer configured".into())
        })?;
        let linear = work_dir.join("linearized.pdf");
        linearizer
            .linearize(&temp, &linear)
            .await
            .map_err(|e| Arc2PdfError::AssemblyFailed {
                stage: "linearize",
                detail: e.to_string(),
            })?;
        linear
    } else {
        temp
    };

    place_output(&finished, destination).await?;
    copy_timestamps(archive, destination);
    info!("Wrote {}", destination.display());
    Ok(destination.to_path_buf())
}

/// Turn the configured geometry into an import directive.
///
/// `Auto` measures every page and uses the largest width and height at the
/// stamped density. If nothing can be measured the builder's own per-image
/// sizing is used.
pub async fn resolve_geometry(
    config: &ConversionConfig,
    set: &PageSet,
    engine: &dyn RasterEngine,
) -> Option<ImportGeometry> {
    match config.page_geometry {
        PageGeometry::None => None,
        PageGeometry::Paper(size, orientation) => Some(ImportGeometry::Paper(size, orientation)),
        PageGeometry::Auto => {
            let mut largest: Option<(u32, u32)> = None;
            for page in set.pages() {
                match engine.dimensions(&page.output).await {
                    Ok((w, h)) => {
                        let (lw, lh) = largest.unwrap_or((0, 0));
                        largest = Some((lw.max(w), lh.max(h)));
                    }
                    Err(e) => debug!("Cannot measure {}: {}", page.output.display(), e),
                }
            }
            match largest {
                Some((w, h)) => Some(ImportGeometry::Fixed {
                    width_pt: pixels_to_points(w, config.target.density),
                    height_pt: pixels_to_points(h, config.target.density),
                }),
                None => {
                    warn!("Auto page size unavailable; using per-image sizes");
                    None
                }
            }
        }
    }
}

/// Pixels at `dpi` to PDF points (1/72 inch), rounded up.
pub fn pixels_to_points(pixels: u32, dpi: u32) -> u32 {
    let dpi = dpi.max(1) as u64;
    ((pixels as u64 * 72).div_ceil(dpi)) as u32
}

/// Copy `finished` beside `destination` and rename it into place.
pub async fn place_output(finished: &Path, destination: &Path) -> Result<(), Arc2PdfError> {
    let write_err = |source: io::Error| classify_write_error(destination, source);

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = destination.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    tokio::fs::copy(finished, &tmp).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp, destination).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(write_err(e));
    }
    Ok(())
}

fn classify_write_error(path: &Path, source: io::Error) -> Arc2PdfError {
    // 32 and 33 are unrelated errno values elsewhere (EPIPE, EDOM on Linux).
    let locked = source.kind() == io::ErrorKind::PermissionDenied
        || (cfg!(windows)
            && matches!(
                source.raw_os_error(),
                Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION)
            ));
    if locked {
        Arc2PdfError::DestinationLocked {
            path: path.to_path_buf(),
        }
    } else {
        Arc2PdfError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Give `target` the access and modification times of `source`. Failures only warn.
pub fn copy_timestamps(source: &Path, target: &Path) {
    let result = (|| -> io::Result<()> {
        let meta = std::fs::metadata(source)?;
        let times = FileTimes::new()
            .set_accessed(meta.accessed()?)
            .set_modified(meta.modified()?);
        File::options().write(true).open(target)?.set_times(times)
    })();
    if let Err(e) = result {
        warn!("Could not copy timestamps to '{}': {}", target.display(), e);
    }
}
