//! 7-Zip adapter for [`ArchiveTool`].

use super::{ArchiveTool, CommandLine};
use crate::error::ToolError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SevenZip {
    exe: PathBuf,
    timeout: Duration,
}

impl SevenZip {
    pub fn new(exe: PathBuf, timeout: Duration) -> Self {
        Self { exe, timeout }
    }

    /// `7z x <archive> -o<dest> -y`: full paths, assume yes on overwrite prompts.
    pub fn extract_command(&self, archive: &Path, dest: &Path) -> CommandLine {
        let mut out_flag = OsString::from("-o");
        out_flag.push(dest);
        CommandLine::new(&self.exe)
            .arg("x")
            .arg(archive)
            .arg(out_flag)
            .arg("-y")
    }
}

#[async_trait]
impl ArchiveTool for SevenZip {
    async fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        timeout: Duration,
    ) -> Result<(), ToolError> {
        self.extract_command(archive, dest)
            .run(timeout)
            .await
            .map(|_| ())
    }

    async fn pack_zip(
        &self,
        base_dir: &Path,
        files: &[PathBuf],
        dest: &Path,
    ) -> Result<(), ToolError> {
        CommandLine::new(&self.exe)
            .args(["a", "-tzip", "-y"])
            .arg(dest)
            .args(files)
            .current_dir(base_dir)
            .run(self.timeout)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_command_shape() {
        let z = SevenZip::new(PathBuf::from("7z"), Duration::from_secs(1));
        let cmd = z.extract_command(Path::new("book.cbz"), Path::new("/tmp/w/extracted"));
        assert_eq!(cmd.to_string(), "7z x book.cbz -o/tmp/w/extracted -y");
    }
}
