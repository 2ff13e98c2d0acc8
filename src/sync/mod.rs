//! Synchronization between the script thread and the capturing controller.

/// The frame gate.
pub mod gate;
