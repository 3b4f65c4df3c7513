//! # karma-filters
//!
//! The filter language used to narrow down alerts, plus autocomplete hints
//! for it.
//!
//! An expression is either `name op value`, where `name` is a label or one of
//! the `@` filters (`@state`, `@receiver`, `@age`, `@limit` ...), or free
//! text that is searched across label values, annotations and silence
//! comments.
//!
//! Invalid expressions never fail a request. They produce a [`Filter`] that
//! reports itself invalid and is skipped when matching, unless every
//! filter in the set is invalid, in which case nothing matches.
//!
//! ## Example
//!
//! ```rust
//! use karma_filters::{filter_alerts, parse_filters};
//! use karma_models::{AlertGroup, Labels};
//!
//! let labels: Labels = [("job".to_string(), "node".to_string())].into();
//! let mut group = AlertGroup::new("default", labels.clone());
//! group.alerts.push(karma_models::Alert::new(labels, "default", chrono::Utc::now()));
//!
//! let mut filters = parse_filters(&["job=node", "@state=xx"]);
//! assert!(filters[0].is_valid());
//! assert!(!filters[1].is_valid());
//!
//! // Alerts without observations are dropped.
//! assert!(filter_alerts(&[group], &mut filters).is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod filter;
pub mod kinds;
pub mod matcher;
pub mod parser;
pub mod pipeline;
pub mod registry;

pub use error::{FilterError, Result};
pub use filter::{parse_filters, AlertFilter, Filter};
pub use matcher::Operator;
pub use pipeline::filter_alerts;
pub use registry::build_autocomplete;
