//! # karma-models
//!
//! Data model for the karma Alertmanager aggregator.
//!
//! This crate holds the values every other karma crate passes around:
//!
//! - [`Alert`] and its per-upstream [`AlertmanagerInstance`] observations
//! - [`AlertGroup`] with shared label and annotation factoring
//! - [`Silence`] and [`SilenceMatcher`]
//! - label colors and autocomplete hints
//! - request and response bodies of the HTTP API in [`api`]
//!
//! Alert state is never stored. It is derived from the observations every
//! time it is read, so a merged or trimmed alert can't disagree with them.
//!
//! ## Example
//!
//! ```rust
//! use karma_models::{Alert, AlertState, AlertmanagerInstance, Labels};
//!
//! let labels: Labels = [("alertname".to_string(), "Host_Down".to_string())].into();
//! let mut alert = Alert::new(labels, "by-name", chrono::Utc::now());
//! alert.alertmanager.push(AlertmanagerInstance {
//!     name: "am1".to_string(),
//!     state: AlertState::Suppressed,
//!     ..Default::default()
//! });
//! assert_eq!(alert.state(), AlertState::Suppressed);
//! assert_eq!(alert.id.len(), 16);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alert;
pub mod annotation;
pub mod api;
pub mod autocomplete;
pub mod color;
pub mod error;
pub mod fingerprint;
pub mod group;
pub mod natsort;
pub mod regex_util;
pub mod silence;

use std::collections::BTreeMap;

/// Label name to value, ordered by name.
pub type Labels = BTreeMap<String, String>;

pub use alert::{Alert, AlertState, AlertmanagerInstance};
pub use annotation::{Annotation, AnnotationRules};
pub use autocomplete::Autocomplete;
pub use color::{LabelColors, LabelsColorMap, Rgb};
pub use error::{ModelError, Result};
pub use fingerprint::{group_id, labels_fingerprint, sha1_hex};
pub use group::{AlertGroup, Shared, StateCount};
pub use natsort::{natural_cmp, natural_less};
pub use silence::{ManagedSilence, Silence, SilenceMatcher};
