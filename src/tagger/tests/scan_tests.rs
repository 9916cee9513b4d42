use crate::tagger::catalog::{TagCatalog, TagKey};
use crate::tagger::config::TaggerConfig;
use crate::tagger::keywords::{KeywordIndex, PhraseTable};
use crate::tagger::scan::{ScanCycle, ScanStep};
use crate::tagger::scorer::MatchScorer;
use crate::tagger::tests::fakes::FakeHost;

fn drain(cycle: &mut ScanCycle, now: u64, index: &KeywordIndex, host: &FakeHost, first: ScanStep) -> ScanStep {
    let mut step = first;
    while matches!(step, ScanStep::Yielded) {
        step = cycle.resume(now, index, host);
    }
    step
}

// ============================================================================
// Scoring properties across the standard phrase set
// ============================================================================

#[test]
fn test_boundary_match_scores_one_for_every_phrase() {
    let index = KeywordIndex::standard().unwrap();
    for phrase in index.all_phrases() {
        let label = format!("Event: {} (reviewed)", phrase);
        assert_eq!(MatchScorer::score(&label, phrase), 1.0, "phrase '{}'", phrase);
    }
}

#[test]
fn test_scores_ignore_case_for_every_phrase() {
    let index = KeywordIndex::standard().unwrap();
    let labels = ["TAILGATING ahead", "Lane Cutoff / Cut-off violation", "Seat-Belt", "No Seatbelt!"];
    for label in labels {
        for phrase in index.all_phrases() {
            assert_eq!(
                MatchScorer::score(label, phrase),
                MatchScorer::score(&label.to_lowercase(), &phrase.to_uppercase()),
            );
        }
    }
}

#[test]
fn test_substring_never_beats_boundary() {
    let index = KeywordIndex::standard().unwrap();
    for phrase in index.all_phrases() {
        let boundary = MatchScorer::score(&format!("x {} y", phrase), phrase);
        let substring = MatchScorer::score(&format!("x{}y", phrase), phrase);
        assert!(substring <= boundary, "phrase '{}'", phrase);
    }
}

// ============================================================================
// Cycle scenarios
// ============================================================================

#[test]
fn test_lane_cutoff_scenario_through_cycle() {
    let index = KeywordIndex::standard().unwrap();
    let host = FakeHost::new("Review: lane cutoff at 00:14");
    host.add_control(1, "Lane Cutoff / Cut-off violation", false);
    let mut cycle = ScanCycle::new(&TaggerConfig::default());

    let first = cycle.scan_now(0, &index, &host, &host);
    assert!(matches!(drain(&mut cycle, 0, &index, &host, first), ScanStep::Completed { .. }));

    let snapshot = cycle.snapshot();
    let matches = snapshot.assignments.for_tag(&TagKey::new("f2"));
    assert_eq!(matches.len(), 1);
    assert!(matches[0].score >= 0.8);
    assert!(snapshot.is_detected(&TagKey::new("f2")));
}

#[test]
fn test_120_controls_all_processed_with_yields() {
    let index = KeywordIndex::standard().unwrap();
    let host = FakeHost::new("");
    for i in 0..120 {
        host.add_control(i, &format!("Drowsiness check #{}", i), false);
    }
    let mut cycle = ScanCycle::new(&TaggerConfig::default());

    let first = cycle.scan_now(0, &index, &host, &host);
    assert!(matches!(first, ScanStep::Yielded));
    assert!(matches!(drain(&mut cycle, 0, &index, &host, first), ScanStep::Completed { .. }));

    assert_eq!(cycle.snapshot().assignments.for_tag(&TagKey::new("d3")).len(), 120);
    assert!(cycle.counters().yields > 0);
    assert_eq!(host.model().label_reads, 120);
}

#[test]
fn test_no_second_scan_while_chunks_pending() {
    let index = KeywordIndex::standard().unwrap();
    let host = FakeHost::new("");
    for i in 0..200 {
        host.add_control(i, "Vaping", false);
    }
    let mut cycle = ScanCycle::new(&TaggerConfig::default());

    assert!(matches!(cycle.scan_now(0, &index, &host, &host), ScanStep::Yielded));
    // Host continuation delayed; more triggers arrive
    for t in [10, 20, 30] {
        assert!(matches!(cycle.scan_now(t, &index, &host, &host), ScanStep::Suppressed));
    }
    assert_eq!(cycle.counters().started, 1);

    let first = cycle.resume(40, &index, &host);
    let completions = match drain(&mut cycle, 40, &index, &host, first) {
        ScanStep::Completed { .. } => 1,
        _ => 0,
    };
    assert_eq!(completions, 1);
    assert_eq!(cycle.snapshot().stats.controls_seen, 200);
}

#[test]
fn test_rescan_after_page_mutation_replaces_results() {
    let index = KeywordIndex::standard().unwrap();
    let host = FakeHost::new("tailgating observed");
    host.add_control(1, "Tailgating", false);
    let mut cycle = ScanCycle::new(&TaggerConfig::default());

    let first = cycle.scan_now(0, &index, &host, &host);
    drain(&mut cycle, 0, &index, &host, first);
    assert!(cycle.snapshot().is_detected(&TagKey::new("f1")));

    host.set_text("clean clip");
    host.remove_control(1);
    host.add_control(2, "Smoking", true);
    let second = cycle.scan_now(100, &index, &host, &host);
    drain(&mut cycle, 100, &index, &host, second);

    let snapshot = cycle.snapshot();
    assert!(snapshot.detected.is_empty());
    assert!(snapshot.assignments.for_tag(&TagKey::new("f1")).is_empty());
    assert!(snapshot.assignments.for_tag(&TagKey::new("d5"))[0].control.checked);
    assert_eq!(snapshot.sequence, 2);
}

#[test]
fn test_custom_phrase_table_drives_detection() {
    let catalog = TagCatalog::standard();
    let table = PhraseTable::from_json(r#"[{"tag":"d2","phrases":["handheld device"]}]"#).unwrap();
    let index = KeywordIndex::build(&catalog, &table).unwrap();
    let host = FakeHost::new("Driver holding HANDHELD DEVICE");
    host.add_control(7, "Handheld device", false);
    let mut cycle = ScanCycle::new(&TaggerConfig::default());

    let first = cycle.scan_now(0, &index, &host, &host);
    drain(&mut cycle, 0, &index, &host, first);
    assert_eq!(cycle.snapshot().detected_phrases(), vec!["handheld device".to_string()]);
    assert_eq!(cycle.snapshot().assignments.for_tag(&TagKey::new("d2")).len(), 1);
}
