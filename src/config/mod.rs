//! Persisted operator configuration.

/// JSON settings file: output paths, targets, quality toggles and the saved camera.
pub mod settings;
