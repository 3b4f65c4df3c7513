//! Filter implementations, one module per family.

pub mod fuzzy;
pub mod label;
pub mod limit;
pub mod receiver;
pub mod silence;
pub mod state;
pub mod upstream;

use karma_models::{Alert, AlertmanagerInstance};

/// True when any observation of `alert` passes `check`.
pub(crate) fn any_observation<F>(alert: &Alert, check: F) -> bool
where
    F: Fn(&AlertmanagerInstance) -> bool,
{
    alert.alertmanager.iter().any(check)
}

/// Splits a value on spaces, returning the words only when there are several.
pub(crate) fn words(value: &str) -> Vec<&str> {
    let parts: Vec<&str> = value.split(' ').collect();
    if parts.len() > 1 {
        parts
    } else {
        Vec::new()
    }
}
