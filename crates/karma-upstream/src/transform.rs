//! Transforms applied to upstream data while it is pulled.
//!
//! Label, receiver and annotation keep/strip lists decide what is shown at
//! all. Color rules attach label colors, and link detection extracts ticket
//! references from silence comments.

use std::collections::HashMap;

use karma_models::regex_util::{compile_anchored, compile_anchored_all, matches_any};
use karma_models::{AnnotationRules, LabelColors, Labels, LabelsColorMap, Rgb, Silence};
use regex::Regex;

use crate::error::{Result, UpstreamError};

/// Keep and strip lists for one kind of name.
///
/// Empty keep lists keep everything. Strip always wins over keep.
#[derive(Debug, Clone, Default)]
pub struct KeepStrip {
    keep: Vec<String>,
    strip: Vec<String>,
    keep_re: Vec<Regex>,
    strip_re: Vec<Regex>,
}

impl KeepStrip {
    /// Builds the lists, compiling the regex variants anchored.
    pub fn new(keep: Vec<String>, strip: Vec<String>, keep_re: &[String], strip_re: &[String]) -> Result<Self> {
        Ok(Self {
            keep,
            strip,
            keep_re: compile_anchored_all(keep_re)?,
            strip_re: compile_anchored_all(strip_re)?,
        })
    }

    /// Plain name lists only.
    pub fn names(keep: Vec<String>, strip: Vec<String>) -> Self {
        Self {
            keep,
            strip,
            ..Default::default()
        }
    }

    /// Whether nothing is ever removed.
    pub fn is_noop(&self) -> bool {
        self.keep.is_empty() && self.keep_re.is_empty() && self.strip.is_empty() && self.strip_re.is_empty()
    }

    /// Whether `name` survives.
    pub fn allows(&self, name: &str) -> bool {
        let keep_all = self.keep.is_empty() && self.keep_re.is_empty();
        let in_keep = self.keep.iter().any(|k| k == name) || matches_any(name, &self.keep_re);
        let in_strip = self.strip.iter().any(|s| s == name) || matches_any(name, &self.strip_re);
        (keep_all || in_keep) && !in_strip
    }

    /// Filters a label set and trims whitespace around values.
    pub fn apply_labels(&self, labels: &Labels) -> Labels {
        labels
            .iter()
            .filter(|(name, _)| self.allows(name))
            .map(|(name, value)| (name.clone(), value.trim().to_string()))
            .collect()
    }

    /// Filters a raw annotation map.
    pub fn apply_annotations(&self, annotations: &HashMap<String, String>) -> HashMap<String, String> {
        if self.is_noop() {
            return annotations.clone();
        }
        annotations
            .iter()
            .filter(|(name, _)| self.allows(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// A custom color for label values matching a literal or a regex.
#[derive(Debug, Clone)]
pub struct ColorRule {
    value: Option<String>,
    value_re: Option<Regex>,
    color: LabelColors,
}

impl ColorRule {
    /// Builds a rule from config values.
    pub fn new(value: Option<String>, value_re: Option<&str>, color: &str) -> Result<Self> {
        if value.is_none() == value_re.is_none() {
            return Err(UpstreamError::Config {
                reason: "custom color rule needs exactly one of value or value_re".to_string(),
            });
        }
        Ok(Self {
            value,
            value_re: value_re.map(compile_anchored).transpose()?,
            color: Rgb::parse(color)?.to_label_colors(),
        })
    }

    fn matches(&self, value: &str) -> bool {
        self.value.as_deref() == Some(value) || self.value_re.as_ref().is_some_and(|re| re.is_match(value))
    }
}

/// Label color configuration.
#[derive(Debug, Clone, Default)]
pub struct ColorRules {
    /// Labels colored with a generated color per value.
    pub unique: Vec<String>,
    /// Custom colors per label name, first matching rule wins.
    pub custom: HashMap<String, Vec<ColorRule>>,
}

impl ColorRules {
    /// Records a color for `name=value` when a rule applies to it.
    ///
    /// Custom rules take precedence over generated colors. Existing entries
    /// are left alone.
    pub fn color_label(&self, store: &mut LabelsColorMap, name: &str, value: &str) {
        let color = if let Some(rule) = self.custom.get(name).and_then(|rules| rules.iter().find(|r| r.matches(value))) {
            rule.color.clone()
        } else if self.unique.iter().any(|u| u == name) {
            Rgb::unique(name, value).to_label_colors()
        } else {
            return;
        };
        store
            .entry(name.to_string())
            .or_default()
            .entry(value.to_string())
            .or_insert(color);
    }
}

/// Detects a ticket reference in silence comments.
#[derive(Debug, Clone)]
pub struct LinkDetectRule {
    regex: Regex,
    uri_template: String,
}

impl LinkDetectRule {
    /// Builds a rule. The regex is unanchored and `uri_template` may use
    /// `$1..$n` to refer to capture groups.
    pub fn new(regex: &str, uri_template: impl Into<String>) -> Result<Self> {
        let regex = Regex::new(regex).map_err(|e| UpstreamError::Config {
            reason: format!("invalid link detect regex {regex:?}: {e}"),
        })?;
        Ok(Self {
            regex,
            uri_template: uri_template.into(),
        })
    }

    fn detect(&self, comment: &str) -> Option<(String, String)> {
        let caps = self.regex.captures(comment)?;
        let id = caps.get(0)?.as_str().to_string();
        let mut url = String::new();
        caps.expand(&self.uri_template, &mut url);
        Some((id, url))
    }
}

/// Sets `ticket_id` and `ticket_url` from the first matching rule.
pub fn detect_links(rules: &[LinkDetectRule], silence: &mut Silence) {
    if let Some((id, url)) = rules.iter().find_map(|r| r.detect(&silence.comment)) {
        silence.ticket_id = id;
        silence.ticket_url = url;
    }
}

/// Everything applied to upstream data at pull time.
#[derive(Debug, Clone, Default)]
pub struct Transforms {
    /// Label keep/strip lists.
    pub labels: KeepStrip,
    /// Receiver keep/strip lists. Alerts for stripped receivers are dropped.
    pub receivers: KeepStrip,
    /// Annotation keep/strip lists.
    pub annotations: KeepStrip,
    /// Annotation presentation rules.
    pub annotation_rules: AnnotationRules,
    /// Label colors.
    pub colors: ColorRules,
    /// Silence comment link detection.
    pub link_detect: Vec<LinkDetectRule>,
}
