//! Version Module
//!
//! Schema version reconciliation, run once when a hoard is opened.

use tracing::{info, warn};

use crate::error::{HoardError, Result};
use crate::hoard::Hoard;

// == Version Change Handler ==
/// Decides what happens when the stored version differs from the expected one.
///
/// Only called when both versions exist and differ. Returning `true` commits
/// `expected` as the stored version; `false` leaves the marker alone.
pub trait VersionChangeHandler: Send + Sync {
    fn on_version_change(&self, hoard: &Hoard, expected: &str, actual: &str) -> bool;
}

/// Leaves data and marker untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreVersionChange;

impl VersionChangeHandler for IgnoreVersionChange {
    fn on_version_change(&self, _hoard: &Hoard, _expected: &str, _actual: &str) -> bool {
        false
    }
}

/// Wipes the namespace and commits the new version.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClearingVersionChangeHandler;

impl VersionChangeHandler for ClearingVersionChangeHandler {
    fn on_version_change(&self, hoard: &Hoard, expected: &str, actual: &str) -> bool {
        match hoard.clear() {
            Ok(()) => {
                info!(
                    "Cleared namespace '{}' on version change {} -> {}",
                    hoard.namespace(),
                    actual,
                    expected
                );
                true
            }
            Err(err) => {
                warn!("Could not clear namespace '{}': {}", hoard.namespace(), err);
                false
            }
        }
    }
}

impl<F> VersionChangeHandler for F
where
    F: Fn(&Hoard, &str, &str) -> bool + Send + Sync,
{
    fn on_version_change(&self, hoard: &Hoard, expected: &str, actual: &str) -> bool {
        self(hoard, expected, actual)
    }
}

// == Reconcile ==
/// Brings the stored marker in line with `expected`.
///
/// No expected version: marker untouched. No marker yet: written without
/// consulting the handler. Differing marker: the handler decides.
pub(crate) fn reconcile(
    hoard: &Hoard,
    expected: Option<&str>,
    handler: &dyn VersionChangeHandler,
) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };

    match hoard.stored_version() {
        None => write_marker(hoard, expected),
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => {
            if handler.on_version_change(hoard, expected, &actual) {
                info!(
                    "Namespace '{}' moved from version {} to {}",
                    hoard.namespace(),
                    actual,
                    expected
                );
                write_marker(hoard, expected)
            } else {
                info!(
                    "Namespace '{}' kept version {} (expected {})",
                    hoard.namespace(),
                    actual,
                    expected
                );
                Ok(())
            }
        }
    }
}

fn write_marker(hoard: &Hoard, version: &str) -> Result<()> {
    let key = hoard.key_space().version_key();
    hoard
        .backing_store()
        .set_item(key, version)
        .map_err(|source| HoardError::write_failed(key, source))
}
