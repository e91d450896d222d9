#![no_main]

use libfuzzer_sys::fuzz_target;
use watchpost_triage::detect::loader;
use watchpost_triage::RuleLoader;

fuzz_target!(|data: &[u8]| {
    let Ok(yaml_str) = std::str::from_utf8(data) else {
        return;
    };
    // A rule that parses must also pass standalone validation.
    if let Ok(rule) = RuleLoader::parse_yaml(yaml_str, "fuzz-input.yml") {
        assert!(loader::validate(&rule).is_ok());
    }
});
