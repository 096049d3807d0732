//! Platform capabilities and fallback detection.
//!
//! Two of the algorithms depend on primitives that are not universally
//! available: the single-pass sorted loop needs 64-bit atomic min, and the
//! interlock variant needs a slot-scoped mutual-exclusion primitive. Both
//! are probed once at startup; configuration resolution substitutes the
//! documented fallback (or rejects) before any frame runs.

use once_cell::sync::OnceCell;

static CAPS: OnceCell<OitCaps> = OnceCell::new();

/// Capabilities relevant to algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OitCaps {
    /// 64-bit atomic min is available (single-pass sorted loop).
    pub int64_atomics: bool,
    /// A slot-scoped serialization primitive is available (interlock).
    pub fragment_interlock: bool,
}

impl OitCaps {
    /// Probe the current platform.
    pub fn detect() -> Self {
        Self {
            int64_atomics: cfg!(target_has_atomic = "64"),
            // Modeled with an OS mutex per slot; always present on the CPU.
            // Kept as a probe so the fallback path stays testable.
            fragment_interlock: true,
        }
    }

    /// Cached probe result for the running process.
    pub fn get() -> &'static OitCaps {
        CAPS.get_or_init(OitCaps::detect)
    }

    /// Capabilities with everything available, for tests.
    pub fn all() -> Self {
        Self {
            int64_atomics: true,
            fragment_interlock: true,
        }
    }
}
