//! qpdf adapter for [`Linearizer`].

use super::{CommandLine, Linearizer};
use crate::error::ToolError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// qpdf exits 3 when it succeeded with warnings.
const EXIT_WARNINGS: i32 = 3;

#[derive(Debug, Clone)]
pub struct Qpdf {
    exe: PathBuf,
    timeout: Duration,
}

impl Qpdf {
    pub fn new(exe: PathBuf, timeout: Duration) -> Self {
        Self { exe, timeout }
    }

    pub fn linearize_command(&self, input: &Path, output: &Path) -> CommandLine {
        CommandLine::new(&self.exe)
            .arg("--linearize")
            .arg(input)
            .arg(output)
            .accept_exit_codes(&[EXIT_WARNINGS])
    }
}

#[async_trait]
impl Linearizer for Qpdf {
    async fn linearize(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        self.linearize_command(input, output)
            .run(self.timeout)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linearize_command_shape() {
        let q = Qpdf::new(PathBuf::from("qpdf"), Duration::from_secs(1));
        let cmd = q.linearize_command(Path::new("temp.pdf"), Path::new("linear.pdf"));
        assert_eq!(cmd.to_string(), "qpdf --linearize temp.pdf linear.pdf");
    }
}
