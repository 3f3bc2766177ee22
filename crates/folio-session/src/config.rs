//! Session configuration

use serde::{Deserialize, Serialize};

/// Tunables for an edit session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Validate merged content on every edit.
    pub validate_on_edit: bool,
    /// Folder assigned to virtual documents created without one.
    pub default_folder: String,
    /// Upper bound on dirty documents accepted by one publish.
    pub max_batch_size: usize,
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With edit-time validation on or off
    #[inline]
    #[must_use]
    pub fn with_validate_on_edit(mut self, validate: bool) -> Self {
        self.validate_on_edit = validate;
        self
    }

    /// With default folder for virtual documents
    #[inline]
    #[must_use]
    pub fn with_default_folder(mut self, folder: impl Into<String>) -> Self {
        self.default_folder = folder.into();
        self
    }

    /// With publish batch size limit
    #[inline]
    #[must_use]
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validate_on_edit: true,
            default_folder: "documents".to_string(),
            max_batch_size: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = SessionConfig::new()
            .with_validate_on_edit(false)
            .with_default_folder("drafts")
            .with_max_batch_size(10);
        assert!(!config.validate_on_edit);
        assert_eq!(config.default_folder, "drafts");
        assert_eq!(config.max_batch_size, 10);
    }

    #[test]
    fn defaults_validate_on_edit() {
        assert!(SessionConfig::default().validate_on_edit);
    }
}
