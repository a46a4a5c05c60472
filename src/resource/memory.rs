//! Memory probing for the heavy-model slot.
//!
//! [`MemoryProbe`] abstracts "how much RAM is free right now" so the
//! [`ResourceManager`](crate::resource::ResourceManager) can be tested with a
//! fixed value instead of the real machine state.  [`SystemMemoryProbe`] is
//! the production implementation backed by `sysinfo`.

use std::sync::Mutex;

use sysinfo::System;

// ---------------------------------------------------------------------------
// MemoryProbe trait
// ---------------------------------------------------------------------------

/// Reports currently available system memory.
///
/// Implementations must be `Send + Sync` so they can be shared behind an
/// `Arc<dyn MemoryProbe>`.
pub trait MemoryProbe: Send + Sync {
    /// Currently available memory in gigabytes.
    fn available_gb(&self) -> f64;
}

// ---------------------------------------------------------------------------
// SystemMemoryProbe
// ---------------------------------------------------------------------------

/// Production probe that polls the operating system via `sysinfo`.
///
/// The `sysinfo::System` handle is kept behind a mutex so repeated polls
/// reuse the same allocation.
pub struct SystemMemoryProbe {
    system: Mutex<System>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn available_gb(&self) -> f64 {
        match self.system.lock() {
            Ok(mut sys) => {
                sys.refresh_memory();
                sys.available_memory() as f64 / 1e9
            }
            Err(poisoned) => {
                // A poisoned lock only means a panic elsewhere; the System
                // handle itself is still usable.
                let mut sys = poisoned.into_inner();
                sys.refresh_memory();
                sys.available_memory() as f64 / 1e9
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FixedMemoryProbe  (test-only)
// ---------------------------------------------------------------------------

/// Test double that reports a constant amount of available memory.
#[cfg(test)]
pub struct FixedMemoryProbe(pub f64);

#[cfg(test)]
impl MemoryProbe for FixedMemoryProbe {
    fn available_gb(&self) -> f64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_probe_reports_positive_memory() {
        let probe = SystemMemoryProbe::new();
        assert!(probe.available_gb() > 0.0);
    }

    #[test]
    fn fixed_probe_reports_configured_value() {
        let probe = FixedMemoryProbe(4.0);
        assert_eq!(probe.available_gb(), 4.0);
    }

    #[test]
    fn probe_is_object_safe() {
        let _: Box<dyn MemoryProbe> = Box::new(FixedMemoryProbe(1.0));
    }
}
