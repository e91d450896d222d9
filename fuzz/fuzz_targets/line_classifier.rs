#![no_main]

use libfuzzer_sys::fuzz_target;
use watchpost_core::pipeline::LineClassifier;
use watchpost_triage::ingest::non_blank_lines;
use watchpost_triage::KeywordClassifier;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let classifier = KeywordClassifier::new();
    for line in non_blank_lines(&text, 1000) {
        let entry = classifier.classify(line, "fuzz.log");
        assert_eq!(entry.level, KeywordClassifier::level_of(line));
        assert!(!entry.message.trim().is_empty());
    }
});
