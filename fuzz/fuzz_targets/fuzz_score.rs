#![no_main]

use libfuzzer_sys::fuzz_target;
use pitchsmith::scoring::{self, CONVINCE_THRESHOLD};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let score = scoring::score(text);
        assert!(score.clarity <= 20);
        assert!(score.evidence <= 20);
        assert!(score.emotional <= 20);
        assert!(score.objections <= 20);
        assert!(score.overall <= 20);
        assert_eq!(
            score.total,
            score.clarity + score.evidence + score.emotional + score.objections + score.overall
        );
        assert_eq!(score.convinced, score.total >= CONVINCE_THRESHOLD);
        assert!(!score.strengths.is_empty());
        assert!(!score.impression.is_empty());
    }
});
