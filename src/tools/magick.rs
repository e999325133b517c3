//! ImageMagick adapter for [`RasterEngine`].

use super::{first_frame, CommandLine, RasterEngine};
use crate::error::ToolError;
use crate::transform::{Half, TransformOp, TransformSpec};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `magick` 7.x driven through its command line.
#[derive(Debug, Clone)]
pub struct Magick {
    exe: PathBuf,
    identify_timeout: Duration,
    timeout: Duration,
}

impl Magick {
    pub fn new(exe: PathBuf, identify_timeout: Duration, timeout: Duration) -> Self {
        Self {
            exe,
            identify_timeout,
            timeout,
        }
    }

    /// Command line that applies `spec` to the first frame of `input` and
    /// writes `output`.
    pub fn transform_command(&self, input: &Path, spec: &TransformSpec, output: &Path) -> CommandLine {
        CommandLine::new(&self.exe)
            .arg(first_frame(input))
            .args(render_ops(spec))
            .arg(output)
    }
}

#[async_trait]
impl RasterEngine for Magick {
    async fn is_image(&self, path: &Path) -> bool {
        CommandLine::new(&self.exe)
            .arg("identify")
            .arg(path)
            .run(self.identify_timeout)
            .await
            .is_ok()
    }

    async fn dimensions(&self, path: &Path) -> Result<(u32, u32), ToolError> {
        let out = CommandLine::new(&self.exe)
            .args(["identify", "-format", "%w %h"])
            .arg(first_frame(path))
            .run(self.identify_timeout)
            .await?;
        parse_dimensions(&String::from_utf8_lossy(&out))
    }

    async fn saturation(&self, path: &Path) -> Result<f64, ToolError> {
        let out = CommandLine::new(&self.exe)
            .arg(first_frame(path))
            .args([
                "-colorspace",
                "HSL",
                "-channel",
                "G",
                "-separate",
                "+channel",
                "-format",
                "%[fx:mean]",
                "info:",
            ])
            .run(self.timeout)
            .await?;
        let text = String::from_utf8_lossy(&out);
        text.trim()
            .parse::<f64>()
            .map(|v| v.clamp(0.0, 1.0))
            .map_err(|_| ToolError::BadOutput {
                program: "magick".into(),
                output: text.trim().to_string(),
            })
    }

    async fn transform(
        &self,
        input: &Path,
        spec: &TransformSpec,
        output: &Path,
    ) -> Result<(), ToolError> {
        self.transform_command(input, spec, output)
            .run(self.timeout)
            .await
            .map(|_| ())
    }
}

/// Render a transform chain as ImageMagick operators, in order.
pub fn render_ops(spec: &TransformSpec) -> Vec<OsString> {
    let mut args: Vec<String> = Vec::new();
    for op in spec.ops() {
        match op {
            TransformOp::Deskew { threshold_percent } => {
                args.extend(["-deskew".into(), format!("{threshold_percent}%")]);
            }
            TransformOp::Trim { fuzz } => {
                args.extend([
                    "-fuzz".into(),
                    fuzz.to_string(),
                    "-trim".into(),
                    "+repage".into(),
                ]);
            }
            TransformOp::CropHalf(half) => {
                let gravity = match half {
                    Half::Left => "West",
                    Half::Right => "East",
                };
                args.extend([
                    "-gravity".into(),
                    gravity.into(),
                    "-crop".into(),
                    "50%x100%+0+0".into(),
                    "+repage".into(),
                    "+gravity".into(),
                ]);
            }
            TransformOp::ResizeToHeight(h) => {
                args.extend(["-resize".into(), format!("x{h}")]);
            }
            TransformOp::Density(d) => {
                args.extend([
                    "-units".into(),
                    "PixelsPerInch".into(),
                    "-density".into(),
                    d.to_string(),
                ]);
            }
            TransformOp::Quality(q) => {
                args.extend(["-quality".into(), q.to_string()]);
            }
            TransformOp::Grayscale => {
                args.extend(["-colorspace".into(), "Gray".into()]);
            }
            TransformOp::Level(level) => {
                args.extend(["-level".into(), level.to_string()]);
            }
            TransformOp::Normalize => args.push("-normalize".into()),
            TransformOp::BrightnessContrast(c) => {
                args.extend(["-brightness-contrast".into(), c.to_string()]);
            }
        }
    }
    args.into_iter().map(OsString::from).collect()
}

fn parse_dimensions(text: &str) -> Result<(u32, u32), ToolError> {
    let bad = || ToolError::BadOutput {
        program: "magick".into(),
        output: text.trim().to_string(),
    };
    let mut parts = text.split_whitespace();
    let w = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    let h = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    if w == 0 || h == 0 {
        return Err(bad());
    }
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{FuzzSpec, LevelSpec};

    fn strs(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn renders_chain_in_order() {
        let spec = TransformSpec::new()
            .then(TransformOp::Deskew { threshold_percent: 40 })
            .then(TransformOp::Trim {
                fuzz: FuzzSpec::default(),
            })
            .then(TransformOp::ResizeToHeight(1683))
            .then(TransformOp::Density(144))
            .then(TransformOp::Quality(85))
            .then(TransformOp::Grayscale)
            .then(TransformOp::Level("10%,90%".parse::<LevelSpec>().unwrap()));

        assert_eq!(
            strs(render_ops(&spec)),
            vec![
                "-deskew", "40%", "-fuzz", "1%", "-trim", "+repage", "-resize", "x1683",
                "-units", "PixelsPerInch", "-density", "144", "-quality", "85", "-colorspace",
                "Gray", "-level", "10%,90%",
            ]
        );
    }

    #[test]
    fn crop_half_uses_gravity() {
        let spec = TransformSpec::new().then(TransformOp::CropHalf(Half::Right));
        let args = strs(render_ops(&spec));
        assert_eq!(args[..2], ["-gravity", "East"]);
        assert!(args.contains(&"50%x100%+0+0".to_string()));
    }

    #[test]
    fn transform_command_wraps_input_and_output() {
        let magick = Magick::new(
            PathBuf::from("magick"),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let spec = TransformSpec::new().then(TransformOp::Normalize);
        let cmd = magick.transform_command(Path::new("in.png"), &spec, Path::new("out.jpg"));
        assert_eq!(cmd.to_string(), "magick in.png[0] -normalize out.jpg");
    }

    #[test]
    fn multi_frame_input_reads_first_frame_only() {
        let magick = Magick::new(
            PathBuf::from("magick"),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let spec = TransformSpec::new().then(TransformOp::Quality(85));
        let cmd = magick.transform_command(Path::new("scan.tif"), &spec, Path::new("0003.jpg"));
        let rendered = cmd.to_string();
        assert!(rendered.starts_with("magick scan.tif[0] "), "got: {rendered}");
        assert!(rendered.ends_with(" 0003.jpg"), "got: {rendered}");
    }

    #[test]
    fn parses_dimension_output() {
        assert_eq!(parse_dimensions("1200 1800").unwrap(), (1200, 1800));
        assert_eq!(parse_dimensions(" 640 480\n").unwrap(), (640, 480));
        assert!(parse_dimensions("640").is_err());
        assert!(parse_dimensions("0 10").is_err());
        assert!(parse_dimensions("abc def").is_err());
    }
}
