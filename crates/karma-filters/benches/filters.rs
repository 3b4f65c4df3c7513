//! Benchmarks for karma-filters.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chrono::Utc;
use karma_filters::{build_autocomplete, filter_alerts, parse_filters};
use karma_models::{Alert, AlertGroup, AlertState, AlertmanagerInstance, Labels};

fn sample_groups(groups: usize, alerts_per_group: usize) -> Vec<AlertGroup> {
    (0..groups)
        .map(|g| {
            let group_labels: Labels = [("alertname".to_string(), format!("Alert{g}"))].into();
            let mut group = AlertGroup::new("default", group_labels.clone());
            for i in 0..alerts_per_group {
                let mut labels = group_labels.clone();
                labels.insert("instance".to_string(), format!("server{i}"));
                labels.insert("cluster".to_string(), ["dev", "staging", "prod"][i % 3].to_string());
                let mut alert = Alert::new(labels, "default", Utc::now());
                alert.alertmanager.push(AlertmanagerInstance {
                    name: "am1".to_string(),
                    cluster: "HA".to_string(),
                    state: AlertState::Active,
                    ..Default::default()
                });
                group.alerts.push(alert);
            }
            group
        })
        .collect()
}

fn benchmark_parse(c: &mut Criterion) {
    c.bench_function("parse_filters", |b| {
        b.iter(|| parse_filters(black_box(&["cluster=~prod", "@state=active", "@age>1h", "server1"])));
    });
}

fn benchmark_filter_alerts(c: &mut Criterion) {
    let groups = sample_groups(100, 20);

    c.bench_function("filter_2000_alerts", |b| {
        b.iter(|| {
            let mut filters = parse_filters(&["cluster=~prod", "@alertmanager=am1", "@limit=500"]);
            filter_alerts(black_box(&groups), &mut filters)
        });
    });
}

fn benchmark_autocomplete(c: &mut Criterion) {
    let alerts: Vec<Alert> = sample_groups(100, 20).into_iter().flat_map(|g| g.alerts).collect();

    c.bench_function("autocomplete_2000_alerts", |b| {
        b.iter(|| build_autocomplete(black_box(&alerts)));
    });
}

criterion_group!(
    benches,
    benchmark_parse,
    benchmark_filter_alerts,
    benchmark_autocomplete
);
criterion_main!(benches);
