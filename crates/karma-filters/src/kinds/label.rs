//! Plain label filters such as `job=node` or `priority>2`.

use std::collections::BTreeMap;

use karma_models::{Alert, Autocomplete};

use crate::error::Result;
use crate::filter::AlertFilter;
use crate::kinds::words;
use crate::matcher::Operator;
use crate::registry::hint;

#[derive(Debug)]
struct LabelFilter {
    name: String,
    op: Operator,
    value: String,
}

impl AlertFilter for LabelFilter {
    fn matches(&self, alert: &Alert, _matches: usize) -> bool {
        let actual = alert.labels.get(&self.name).map_or("", String::as_str);
        self.op.compare(actual, &self.value)
    }
}

pub(crate) fn new_label_filter(name: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    Ok(Box::new(LabelFilter {
        name: name.to_string(),
        op,
        value: value.to_string(),
    }))
}

pub(crate) fn label_hints(_: &str, operators: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    let mut hints = BTreeMap::new();
    for alert in alerts {
        for (name, value) in &alert.labels {
            for op in operators {
                match op {
                    Operator::Equal | Operator::NotEqual => {
                        let h = hint(name, *op, value, &[value]);
                        hints.insert(h.value.clone(), h);
                    }
                    Operator::Regex | Operator::NegativeRegex => {
                        for word in words(value) {
                            let h = hint(name, *op, word, &[value, word]);
                            hints.insert(h.value.clone(), h);
                        }
                    }
                    Operator::GreaterThan | Operator::LessThan => {
                        if value.parse::<i64>().is_ok() {
                            let h = hint(name, *op, value, &[value]);
                            hints.insert(h.value.clone(), h);
                        }
                    }
                }
            }
        }
    }
    hints.into_values().collect()
}
