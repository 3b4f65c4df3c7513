//! Filtering and ordering for the silences endpoint.

use std::cmp::Ordering;

use karma_models::ManagedSilence;
use karma_upstream::UpstreamRegistry;

/// Query of `GET /silences.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SilenceQuery {
    /// Include expired silences.
    pub show_expired: bool,
    /// Free text search, case-insensitive.
    pub search_term: String,
    /// Oldest first instead of most recent first.
    pub sort_reverse: bool,
}

fn matches_term(silence: &ManagedSilence, term: &str, clusters: &[String]) -> bool {
    let s = &silence.silence;
    if s.id == term {
        return true;
    }
    if format!("@cluster={}", silence.cluster).to_lowercase() == term {
        return true;
    }
    if clusters.iter().any(|c| *c == silence.cluster) {
        return true;
    }
    if s.comment.to_lowercase().contains(term) || s.created_by.to_lowercase().contains(term) {
        return true;
    }
    s.matchers.iter().any(|m| {
        let op = match (m.is_regex, m.is_equal) {
            (false, true) => "=",
            (false, false) => "!=",
            (true, true) => "=~",
            (true, false) => "!~",
        };
        let quoted = format!("{}{op}\"{}\"", m.name, m.value).to_lowercase();
        let plain = format!("{}{op}{}", m.name, m.value).to_lowercase();
        quoted == term || plain.contains(term)
    })
}

fn order(a: &ManagedSilence, b: &ManagedSilence, reverse: bool) -> Ordering {
    let ord = a
        .silence
        .ends_at
        .cmp(&b.silence.ends_at)
        .then_with(|| a.silence.starts_at.cmp(&b.silence.starts_at))
        .then_with(|| a.silence.id.cmp(&b.silence.id));
    if reverse { ord } else { ord.reverse() }
}

/// Applies `query` to the managed silences of `registry`.
pub fn select_silences(
    registry: &UpstreamRegistry,
    silences: Vec<ManagedSilence>,
    query: &SilenceQuery,
) -> Vec<ManagedSilence> {
    let term = query.search_term.to_lowercase();

    // Clusters named by the term, through an upstream name or the cluster itself.
    let clusters: Vec<String> = if term.is_empty() {
        Vec::new()
    } else {
        registry
            .upstreams()
            .iter()
            .filter_map(|u| {
                let cluster = registry.cluster_name(u);
                (u.name().to_lowercase() == term || cluster.to_lowercase() == term).then_some(cluster)
            })
            .collect()
    };

    let mut selected: Vec<ManagedSilence> = silences
        .into_iter()
        .filter(|s| query.show_expired || !s.is_expired)
        .filter(|s| term.is_empty() || matches_term(s, &term, &clusters))
        .collect();
    selected.sort_by(|a, b| order(a, b, query.sort_reverse));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use karma_models::{Silence, SilenceMatcher};
    use karma_upstream::{Transforms, UpstreamConfig};

    fn registry() -> UpstreamRegistry {
        UpstreamRegistry::new(
            vec![
                UpstreamConfig::new("am1", "http://am1:9093"),
                UpstreamConfig::new("am2", "http://am2:9093"),
            ],
            Transforms::default(),
        )
        .unwrap()
    }

    fn managed(id: &str, cluster: &str, end_hour: u32, expired: bool) -> ManagedSilence {
        ManagedSilence {
            cluster: cluster.to_string(),
            alert_count: 0,
            is_expired: expired,
            silence: Silence {
                id: id.to_string(),
                matchers: vec![SilenceMatcher::equal("instance", "web1"), SilenceMatcher::regex("job", "node.*")],
                starts_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                ends_at: Utc.with_ymd_and_hms(2024, 1, 1, end_hour, 0, 0).unwrap(),
                created_by: "John".to_string(),
                comment: format!("Maintenance {id}"),
                ..Default::default()
            },
        }
    }

    fn fixtures() -> Vec<ManagedSilence> {
        vec![
            managed("s1", "am1", 1, false),
            managed("s2", "am2", 3, false),
            managed("s3", "am1", 2, true),
        ]
    }

    fn ids(silences: &[ManagedSilence]) -> Vec<&str> {
        silences.iter().map(|s| s.silence.id.as_str()).collect()
    }

    #[test]
    fn hides_expired_and_sorts_recent_first() {
        let query = SilenceQuery::default();
        assert_eq!(ids(&select_silences(&registry(), fixtures(), &query)), vec!["s2", "s1"]);

        let query = SilenceQuery {
            show_expired: true,
            sort_reverse: true,
            ..Default::default()
        };
        assert_eq!(ids(&select_silences(&registry(), fixtures(), &query)), vec!["s1", "s3", "s2"]);
    }

    #[test]
    fn search_terms() {
        let search = |term: &str| {
            let query = SilenceQuery {
                show_expired: true,
                search_term: term.to_string(),
                sort_reverse: true,
            };
            ids(&select_silences(&registry(), fixtures(), &query))
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        };
        assert_eq!(search("s2"), vec!["s2"]);
        assert_eq!(search("@cluster=am1"), vec!["s1", "s3"]);
        assert_eq!(search("AM2"), vec!["s2"]);
        assert_eq!(search("john"), vec!["s1", "s3", "s2"]);
        assert_eq!(search("maintenance s3"), vec!["s3"]);
        assert_eq!(search("instance=\"web1\"").len(), 3);
        assert_eq!(search("job=~node").len(), 3);
        assert!(search("nothing").is_empty());
    }
}
