#![no_main]

use arbitrary::Arbitrary;
use chrono::Utc;
use libfuzzer_sys::fuzz_target;
use uuid::Uuid;

use watchpost_core::pipeline::LineClassifier;
use watchpost_core::types::{AlertSeverity, ThreatRule};
use watchpost_triage::{KeywordClassifier, RuleScanner};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    rules: Vec<FuzzRule>,
    lines: Vec<String>,
}

#[derive(Arbitrary, Debug)]
struct FuzzRule {
    pattern: String,
    severity: u8,
    enabled: bool,
}

fn severity(raw: u8) -> AlertSeverity {
    AlertSeverity::ALL[usize::from(raw) % AlertSeverity::ALL.len()]
}

fuzz_target!(|input: FuzzInput| {
    let mut scanner = RuleScanner::new();
    for (i, r) in input.rules.into_iter().take(8).enumerate() {
        let rule = ThreatRule {
            id: Uuid::new_v4(),
            name: format!("fuzz-rule-{i}"),
            description: String::new(),
            pattern: r.pattern,
            severity: severity(r.severity),
            enabled: r.enabled,
            created_at: Utc::now(),
        };
        // invalid patterns are rejected, never panic
        let _ = scanner.register(rule);
    }

    let classifier = KeywordClassifier::new();
    let entries: Vec<_> = input
        .lines
        .iter()
        .take(64)
        .map(|line| classifier.classify(line, "fuzz.log"))
        .collect();

    let alerts = scanner.scan(&entries);
    assert!(alerts.len() <= entries.len() * scanner.enabled_count());
});
