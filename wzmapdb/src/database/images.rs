//! Preview image optimization.
//!
//! Best effort: previews are first quantized with `pngquant`, then
//! recompressed with `optipng`. Missing tools or failed runs never fail the
//! update.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::tools::ExternalTools;

/// Previews at least this large are first tried with a 64 color palette.
pub const SMALL_PALETTE_MIN_SIZE: u64 = 8096;

const SMALL_PALETTE: u32 = 64;
const FULL_PALETTE: u32 = 256;
const QUANTIZE_QUALITY: &str = "93-100";

/// Size of an image before and after optimizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Optimized {
    pub before: u64,
    pub after: u64,
}

impl Optimized {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }

    /// Fraction of the original size saved.
    pub fn saved_ratio(&self) -> f64 {
        if self.before == 0 {
            return 0.0;
        }
        (self.before as f64 - self.after as f64) / self.before as f64
    }
}

/// Recompresses preview PNGs in place.
#[derive(Debug, Clone)]
pub struct PngOptimizer {
    pngquant: Option<PathBuf>,
    optipng: Option<PathBuf>,
    runner: CommandRunner,
}

impl PngOptimizer {
    pub fn new(pngquant: Option<PathBuf>, optipng: Option<PathBuf>, runner: CommandRunner) -> Self {
        Self {
            pngquant,
            optipng,
            runner,
        }
    }

    pub fn from_tools(tools: &ExternalTools, runner: CommandRunner) -> Self {
        Self::new(tools.pngquant.clone(), tools.optipng.clone(), runner)
    }

    /// Warn about each missing optimizer.
    pub fn warn_if_incomplete(&self) {
        if self.pngquant.is_none() {
            warn!("pngquant not found, map png previews will not be fully optimized");
        }
        if self.optipng.is_none() {
            warn!("optipng not found, map png previews will not be fully optimized");
        }
    }

    /// Optimize `path` in place. `allow_lossy` enables quantization.
    ///
    /// Returns `None` if the file size cannot be read.
    pub fn optimize(&self, path: &Path, allow_lossy: bool) -> Option<Optimized> {
        let before = file_size(path)?;

        if let (true, Some(pngquant)) = (allow_lossy, &self.pngquant) {
            let quantized = before >= SMALL_PALETTE_MIN_SIZE
                && self.quantize(pngquant, path, SMALL_PALETTE);
            if !quantized {
                self.quantize(pngquant, path, FULL_PALETTE);
            }
        }

        if let Some(optipng) = &self.optipng {
            let spec = CommandSpec::new(optipng).arg("-o7").arg(path);
            match self.runner.run(&spec) {
                Ok(output) if output.success() => {}
                Ok(output) => warn!(
                    "optipng -o7 {} command failed with exit code: {}",
                    path.display(),
                    output.code_display()
                ),
                Err(e) => warn!("{}", e),
            }
        }

        let result = Optimized {
            before,
            after: file_size(path)?,
        };
        if result.changed() {
            info!(
                "Optimized PNG: {:.3} - {}",
                result.saved_ratio(),
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            );
        }
        Some(result)
    }

    /// Run pngquant with a palette size. Returns whether it succeeded.
    fn quantize(&self, pngquant: &Path, path: &Path, colors: u32) -> bool {
        let spec = CommandSpec::new(pngquant)
            .args(["--force", "--skip-if-larger", "--output"])
            .arg(path)
            .args(["--strip", "--quality", QUANTIZE_QUALITY])
            .arg(colors.to_string())
            .arg(path);
        match self.runner.run(&spec) {
            Ok(output) => {
                debug!(colors, code = %output.code_display(), "pngquant finished");
                output.success()
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}

fn file_size(path: &Path) -> Option<u64> {
    match fs::metadata(path) {
        Ok(metadata) => Some(metadata.len()),
        Err(e) => {
            warn!("Failed to read size of {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_saved_ratio() {
        let result = Optimized {
            before: 1000,
            after: 750,
        };
        assert!(result.changed());
        assert!((result.saved_ratio() - 0.25).abs() < 1e-9);
        assert_eq!(Optimized { before: 0, after: 0 }.saved_ratio(), 0.0);
    }

    #[test]
    fn test_without_tools_is_noop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preview.png");
        fs::write(&path, vec![7u8; 10_000]).unwrap();

        let optimizer = PngOptimizer::new(None, None, CommandRunner::new(false));
        let result = optimizer.optimize(&path, true).unwrap();
        assert_eq!(result.before, 10_000);
        assert!(!result.changed());
    }

    #[test]
    fn test_missing_tools_only_warn() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preview.png");
        fs::write(&path, b"png").unwrap();

        let optimizer = PngOptimizer::new(
            Some(PathBuf::from("/nonexistent/pngquant")),
            Some(PathBuf::from("/nonexistent/optipng")),
            CommandRunner::new(false),
        );
        let result = optimizer.optimize(&path, true).unwrap();
        assert!(!result.changed());
    }

    #[test]
    fn test_missing_file() {
        let optimizer = PngOptimizer::new(None, None, CommandRunner::new(false));
        assert!(optimizer
            .optimize(Path::new("/nonexistent/preview.png"), true)
            .is_none());
    }
}
