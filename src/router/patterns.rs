//! Domain signal patterns.
//!
//! Static keyword data for deterministic request classification.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::models::Domain;
use regex::Regex;
use std::sync::LazyLock;

/// A keyword signal pointing at a domain.
#[derive(Debug)]
pub struct DomainSignal {
    /// The regex pattern to match.
    pub pattern: Regex,
    /// The domain this pattern indicates.
    pub domain: Domain,
    /// Human-readable description of the signal.
    pub description: &'static str,
}

/// Static domain signals. Order within a domain does not matter.
pub static DOMAIN_SIGNALS: LazyLock<Vec<DomainSignal>> = LazyLock::new(|| {
    vec![
        // Emergency patterns
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(emergency|help\s+me|urgent(ly)?)\b")
                .expect("static regex: emergency"),
            domain: Domain::Emergency,
            description: "emergency/help me",
        },
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(fire|smoke|flames?|burning)\b").expect("static regex: fire"),
            domain: Domain::Emergency,
            description: "fire/smoke",
        },
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(gas\s*(leak|smell)|smell\w*\s+(of\s+)?gas|carbon\s+monoxide)\b")
                .expect("static regex: gas"),
            domain: Domain::Emergency,
            description: "gas leak",
        },
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(flood\w*|burst\s+pipe|pipe\s+burst|water\s*(burst|leak))\b")
                .expect("static regex: water"),
            domain: Domain::Emergency,
            description: "water burst/flood",
        },
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(fell|fallen|fall(ing)?\s+down|can'?t\s+(breathe|get\s+up)|chest\s+pain)\b")
                .expect("static regex: fall"),
            domain: Domain::Emergency,
            description: "fall/medical distress",
        },
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(alarm|sensor)\s+(is\s+)?(going\s+off|triggered|beeping)\b")
                .expect("static regex: alarm"),
            domain: Domain::Emergency,
            description: "alarm triggered",
        },
        // Medication patterns
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(medications?|medicines?|meds|pills?|tablets?|capsules?|doses?|dosage|prescriptions?)\b")
                .expect("static regex: medication nouns"),
            domain: Domain::Medication,
            description: "medication/pill/dose",
        },
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(aspirin|paracetamol|ibuprofen|metformin|insulin|antacid|gastro|vitamins?)\b")
                .expect("static regex: drug names"),
            domain: Domain::Medication,
            description: "common drug names",
        },
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(did\s+i\s+take|take\s+my|taken\s+my|before\s+(meals?|eating|dinner|lunch|breakfast))\b")
                .expect("static regex: intake"),
            domain: Domain::Medication,
            description: "intake phrasing",
        },
        // Communication patterns
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(tell|call|text|message|notify|remind)\s+(my\s+)?\w+")
                .expect("static regex: tell/call"),
            domain: Domain::General,
            description: "tell/call/message someone",
        },
        DomainSignal {
            pattern: Regex::new(r"(?i)\b(let\s+\w+\s+know|send\s+(a\s+)?(message|note|text))\b")
                .expect("static regex: let know"),
            domain: Domain::General,
            description: "let know/send message",
        },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_domain_has_signals() {
        for domain in Domain::all() {
            assert!(
                DOMAIN_SIGNALS.iter().any(|s| s.domain == *domain),
                "no signal for {domain}"
            );
        }
    }
}
