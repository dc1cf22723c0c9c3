use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use menu_roulette::config::{ConfigFile, SourceConfig};
use menu_roulette::fetch::FetchJob;
use menu_roulette::resolver::{CandidateList, ResolvePlan, Resolution};
use menu_roulette::selection::{
    Selection, SelectionState, FOCAL_REFRESH_INTERVAL, HISTORY_CAPACITY,
};
use menu_roulette::source::JsonFileSource;
use rand::rngs::StdRng;
use rand::SeedableRng;

const HOST_CONFIG: &str = r#"{
    "table": { "worksheetId": "lunch", "viewId": "all" },
    "controls": [
        { "controlId": "dish", "type": 2 },
        { "controlId": "cook", "type": 26 },
        { "controlId": "price", "type": 8 },
        { "controlId": "style", "type": 11,
          "options": [ { "key": "k1", "value": "Spicy" }, { "key": "other", "value": "Other" } ] }
    ],
    "params": { "field": ["dish", "cook", "price", "style"] }
}"#;

const ROWS: &str = r#"{"data": [
    {"dish": "Laksa", "cook": "[{\"fullname\":\"Mei\"}]", "price": "12.50", "style": "[\"k1\"]"},
    {"dish": "Laksa", "cook": "[]", "price": 7, "style": "[\"other_sour\"]"},
    {"dish": "undefined", "price": "n/a"}
]}"#;

fn resolve_from_file(dir: &std::path::Path) -> CandidateList {
    let rows = dir.join("rows.json");
    fs::write(&rows, ROWS).unwrap();
    let mut config: ConfigFile = serde_json::from_str(HOST_CONFIG).unwrap();
    config.source = Some(SourceConfig::File { path: rows });

    let resolver = config.resolver();
    let ResolvePlan::Fetch(request) = resolver.plan() else {
        panic!("fields are selected, a fetch is expected");
    };
    let source = config.record_source().unwrap();
    let result = FetchJob::spawn(source, request, config.fetch_timeout()).wait();

    let mut candidates = CandidateList::default();
    assert!(candidates.apply(resolver.finish(result)));
    candidates
}

#[test]
fn records_become_a_deduplicated_menu() {
    let dir = tempfile::tempdir().unwrap();
    let candidates = resolve_from_file(dir.path());
    assert_eq!(
        candidates.items(),
        ["Laksa", "Mei", "12.5", "Spicy", "7", "Other", "n/a"].map(String::from)
    );
}

#[test]
fn picks_cycle_through_the_resolved_menu() {
    let dir = tempfile::tempdir().unwrap();
    let candidates = resolve_from_file(dir.path());
    let mut rng = StdRng::seed_from_u64(42);
    let mut selection = Selection::new();
    let mut now = Instant::now();

    for round in 0..HISTORY_CAPACITY + 3 {
        assert_eq!(selection.advance(&candidates, &mut rng, now), SelectionState::Running);
        for _ in 0..5 {
            now += FOCAL_REFRESH_INTERVAL;
            selection.tick(&candidates, &mut rng, now);
            let focal = selection.focal().unwrap();
            assert!(candidates.items().iter().any(|item| item == focal));
        }
        assert_eq!(selection.advance(&candidates, &mut rng, now), SelectionState::Stopped);
        assert!(selection.timers().is_idle());
        assert_eq!(selection.history().len(), (round + 1).min(HISTORY_CAPACITY));
        assert_eq!(selection.history().iter().next(), selection.focal());
    }

    // A stopped selection ignores the clock apart from fading flashes.
    let focal = selection.focal().map(str::to_string);
    selection.tick(&candidates, &mut rng, now + Duration::from_secs(5));
    assert!(selection.flashes().is_empty());
    assert_eq!(selection.focal().map(str::to_string), focal);
}

#[test]
fn missing_file_keeps_builtin_menu() {
    let dir = tempfile::tempdir().unwrap();
    let config: ConfigFile = serde_json::from_str(HOST_CONFIG).unwrap();
    let resolver = config.resolver();
    let source = JsonFileSource::new(dir.path().join("absent.json"));

    let resolution = resolver.resolve_with(Some(&source));
    assert_eq!(resolution, Resolution::Unchanged);

    let mut candidates = CandidateList::default();
    candidates.apply(resolution);
    assert_eq!(candidates, CandidateList::builtin());

    // The same failure through the worker thread.
    let ResolvePlan::Fetch(request) = resolver.plan() else {
        panic!("expected a fetch");
    };
    let job = FetchJob::spawn(Arc::new(source), request, Some(Duration::from_secs(5)));
    assert!(job.wait().is_err());
}
