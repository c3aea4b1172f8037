//! Preservation of failing pages for offline diagnosis.
//!
//! Every halt keeps the last fetched page so the selectors can be fixed
//! against the real markup. The sink is a trait so tests run without
//! touching the filesystem.

use std::path::PathBuf;

/// Receives pages worth keeping: the page behind every halt, plus the
/// search and detail pages on the happy path.
pub trait Diagnostics {
    fn preserve_page(&self, label: &str, html: &str);
}

/// Discards everything.
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn preserve_page(&self, _label: &str, _html: &str) {}
}

/// Writes each page to `<dir>/<label>.html`. Write failures are logged,
/// never propagated; diagnostics must not take down a run.
pub struct FileDiagnostics {
    dir: PathBuf,
}

impl FileDiagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Diagnostics for FileDiagnostics {
    fn preserve_page(&self, label: &str, html: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!("could not create {}: {}", self.dir.display(), e);
            return;
        }
        let path = self.dir.join(format!("{}.html", label));
        match std::fs::write(&path, html) {
            Ok(()) => tracing::info!("saved {} for debugging", path.display()),
            Err(e) => tracing::warn!("could not preserve {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_diagnostics_writes_labeled_page() {
        let dir = std::env::temp_dir().join(format!("courtportal-diag-{}", std::process::id()));
        let diag = FileDiagnostics::new(&dir);
        diag.preserve_page("login_failed", "<html>nope</html>");
        let written = std::fs::read_to_string(dir.join("login_failed.html")).unwrap();
        assert_eq!(written, "<html>nope</html>");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
