//! Secret registration with the host environment.

use std::io::Write;
use std::sync::Mutex;

/// Replacement text for secrets in echoed command lines.
pub const MASK: &str = "***";

/// Something that can hide secret values from the job log.
pub trait SecretMasker: Send + Sync {
    /// Register a value so the host never prints it verbatim.
    fn mask(&self, secret: &str);
}

/// Masker for GitHub Actions, using the `add-mask` workflow command.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionsMasker;

impl SecretMasker for ActionsMasker {
    fn mask(&self, secret: &str) {
        if secret.is_empty() {
            return;
        }
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        // The runner reads workflow commands line by line.
        for line in secret.lines() {
            let _ = writeln!(handle, "::add-mask::{}", line);
        }
    }
}

/// Masker that does nothing, for runs outside a CI host.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMasker;

impl SecretMasker for NoopMasker {
    fn mask(&self, _secret: &str) {}
}

/// Masker that remembers what it was asked to hide.
#[derive(Debug, Default)]
pub struct RecordingMasker {
    masked: Mutex<Vec<String>>,
}

impl RecordingMasker {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Values registered so far.
    pub fn masked(&self) -> Vec<String> {
        self.masked
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl SecretMasker for RecordingMasker {
    fn mask(&self, secret: &str) {
        if let Ok(mut masked) = self.masked.lock() {
            masked.push(secret.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_masker() {
        let masker = RecordingMasker::new();
        masker.mask("hunter2");
        masker.mask("s3cret");
        assert_eq!(masker.masked(), vec!["hunter2", "s3cret"]);
    }
}
