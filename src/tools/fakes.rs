//! In-memory tool doubles for unit tests.
//!
//! "Images" are small text files holding `"<width> <height>"`. A transform
//! copies its input to the output path and records the chain it was asked
//! to apply; inputs whose name contains `broken` fail.

use super::RasterEngine;
use crate::error::ToolError;
use crate::transform::{Half, TransformOp, TransformSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct FakeRaster {
    pub saturation: f64,
    pub calls: Mutex<Vec<(PathBuf, TransformSpec)>>,
}

impl FakeRaster {
    pub fn with_saturation(saturation: f64) -> Self {
        Self {
            saturation,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, TransformSpec)> {
        self.calls.lock().unwrap().clone()
    }
}

fn read_dims(path: &Path) -> Result<(u32, u32), ToolError> {
    let bad = || ToolError::BadOutput {
        program: "fake".into(),
        output: path.display().to_string(),
    };
    let text = std::fs::read_to_string(path).map_err(|_| bad())?;
    let mut it = text.split_whitespace().map(str::parse::<u32>);
    match (it.next(), it.next()) {
        (Some(Ok(w)), Some(Ok(h))) => Ok((w, h)),
        _ => Err(bad()),
    }
}

#[async_trait]
impl RasterEngine for FakeRaster {
    async fn is_image(&self, path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("jpg" | "JPG" | "png" | "PNG")
        )
    }

    async fn dimensions(&self, path: &Path) -> Result<(u32, u32), ToolError> {
        read_dims(path)
    }

    async fn saturation(&self, _path: &Path) -> Result<f64, ToolError> {
        Ok(self.saturation)
    }

    async fn transform(
        &self,
        input: &Path,
        spec: &TransformSpec,
        output: &Path,
    ) -> Result<(), ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((input.to_path_buf(), spec.clone()));
        if input.to_string_lossy().contains("broken") {
            return Err(ToolError::Failed {
                program: "fake".into(),
                code: "exit status: 1".into(),
                stderr: "corrupt input".into(),
            });
        }
        let (mut w, h) = read_dims(input).unwrap_or((1, 1));
        for op in spec.ops() {
            if let TransformOp::CropHalf(Half::Left | Half::Right) = op {
                w /= 2;
            }
        }
        std::fs::write(output, format!("{w} {h}")).map_err(|e| ToolError::Spawn {
            program: "fake".into(),
            detail: e.to_string(),
        })
    }
}
