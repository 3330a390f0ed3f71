use polarity::analysis::normalizer::{Normalizer, NormalizerConfig, normalize};
use polarity::error::Result;

const TWEETS: &[&str] = &[
    "@VirginAmerica What @dhepburn said.",
    "@united I LOVE this airline!!! http://t.co/abc123 #BestFlightEver",
    "Flight delayed again &amp; no updates... www.example.com/status",
    "   ",
    "",
    "Is there wifi on the flight?",
    "#JetBlue 2 hours late, gate C12 :(",
    "@SouthwestAir @AmericanAir",
    "Café crème? ¡No!",
];

#[test]
fn test_output_is_clean_lowercase_tokens() {
    for tweet in TWEETS {
        let normalized = normalize(tweet);
        assert!(
            normalized
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' '),
            "{tweet:?} -> {normalized:?}"
        );
        assert!(!normalized.starts_with(' ') && !normalized.ends_with(' '));
        assert!(!normalized.contains("  "));
        assert!(!normalized.contains("http"));
    }
}

#[test]
fn test_normalization_is_idempotent() {
    let normalizer = Normalizer::default();
    for tweet in TWEETS {
        let once = normalizer.normalize(tweet);
        assert_eq!(normalizer.normalize(&once), once, "{tweet:?}");
    }
}

#[test]
fn test_social_media_noise_is_removed() {
    assert_eq!(normalize("@united I LOVE this airline!!! http://t.co/abc123"), "love airline");
    assert_eq!(normalize("#BestFlightEver"), "bestflightever");
    assert_eq!(normalize("@SouthwestAir @AmericanAir"), "");
    assert_eq!(normalize("Flight delayed &amp; no updates"), "flight delayed updates");
    assert_eq!(normalize("2 hours late, gate C12"), "2 hours late gate c12");
}

#[test]
fn test_empty_inputs_yield_empty_output() {
    let normalizer = Normalizer::default();
    assert_eq!(normalizer.normalize(""), "");
    assert_eq!(normalizer.normalize(" \t\n "), "");
    assert_eq!(normalizer.normalize("!!! ??? ..."), "");
    assert_eq!(normalizer.normalize_opt(None), "");
}

#[test]
fn test_stop_word_removal_is_configurable() -> Result<()> {
    let keep = Normalizer::new(NormalizerConfig {
        remove_stop_words: false,
        stop_words: None,
    })?;
    assert_eq!(keep.normalize("It was okay."), "it was okay");

    let default = Normalizer::default();
    assert_eq!(default.normalize("It was okay."), "okay");
    assert_eq!(default.normalize_with("It was okay.", false), "it was okay");

    let custom = Normalizer::new(NormalizerConfig {
        remove_stop_words: true,
        stop_words: Some(vec!["flight".to_string()]),
    })?;
    assert_eq!(custom.normalize("The flight was late"), "the was late");
    Ok(())
}

#[test]
fn test_batch_matches_single() {
    let normalizer = Normalizer::default();
    let batch = normalizer.batch_normalize(TWEETS);
    let singles: Vec<String> = TWEETS.iter().map(|t| normalizer.normalize(t)).collect();
    assert_eq!(batch, singles);
}
