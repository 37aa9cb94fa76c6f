//! Deterministic request classification.

use super::patterns::{DOMAIN_SIGNALS, DomainSignal};
use crate::models::{Domain, Request};

/// Classifies a request.
///
/// Rules, in order:
///
/// 1. An explicit domain hint wins.
/// 2. Any emergency signal wins over everything else.
/// 3. Medication signals select `Medication`.
/// 4. Communication signals select `General`.
/// 5. No signal at all leaves the request unclassified.
#[must_use]
pub fn classify(request: &Request) -> Option<Domain> {
    if let Some(hint) = request.domain_hint {
        return Some(hint);
    }
    classify_text(&request.text)
}

/// Classifies free text with the keyword rules.
#[must_use]
pub fn classify_text(text: &str) -> Option<Domain> {
    let matched = matched_signals(text);
    [Domain::Emergency, Domain::Medication, Domain::General]
        .into_iter()
        .find(|domain| matched.iter().any(|signal| signal.domain == *domain))
}

/// Signals found in the text, in table order.
#[must_use]
pub fn matched_signals(text: &str) -> Vec<&'static DomainSignal> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    DOMAIN_SIGNALS
        .iter()
        .filter(|signal| signal.pattern.is_match(text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Is it time for my aspirin?", Some(Domain::Medication) ; "drug name")]
    #[test_case("Did I take my pills today", Some(Domain::Medication) ; "intake question")]
    #[test_case("I smell gas in the kitchen", Some(Domain::Emergency) ; "gas")]
    #[test_case("There is smoke, I forgot my medicine on the stove", Some(Domain::Emergency) ; "emergency beats medication")]
    #[test_case("My father fell and can't get up", Some(Domain::Emergency) ; "fall")]
    #[test_case("Tell John I will be late", Some(Domain::General) ; "relay")]
    #[test_case("What a lovely afternoon", None ; "no signal")]
    #[test_case("   ", None ; "blank")]
    fn test_classify_text(text: &str, expected: Option<Domain>) {
        assert_eq!(classify_text(text), expected);
    }

    #[test]
    fn test_hint_wins() {
        let request = Request::new("I smell gas").with_domain_hint(Domain::General);
        assert_eq!(classify(&request), Some(Domain::General));
    }

    #[test]
    fn test_matched_signal_descriptions() {
        let signals = matched_signals("fire alarm is going off");
        let descriptions: Vec<_> = signals.iter().map(|s| s.description).collect();
        assert_eq!(descriptions, vec!["fire/smoke", "alarm triggered"]);
    }
}
