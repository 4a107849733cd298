//! Transcript normalization
//!
//! Raw engine output goes through a fixed sequence of transforms before it
//! may touch the clipboard:
//!
//! 1. trim whitespace and trailing periods
//! 2. recase the first character (config `capitalize`)
//! 3. spoken punctuation substitution ("hello colon" -> "hello:")
//! 4. collapse whitespace left of substituted symbols
//! 5. spoken-language switch, only for single-token transcripts
//! 6. hallucination filtering; a hit empties the text, which suppresses
//!    delivery entirely
//!
//! The order is load-bearing: substitution may merge a multi-word phrase
//! into a single token, which is what makes step 5's no-whitespace guard
//! meaningful.

use crate::config::Config;
use regex::Regex;

/// Rule tables driving normalization, flattened from the config maps.
///
/// `BTreeMap` sources give both tables a stable iteration order; for
/// languages that order decides which code wins when several match.
#[derive(Debug, Clone, Default)]
pub struct NormalizationRules {
    /// Punctuation symbol -> spoken trigger phrases
    pub punctuations: Vec<(String, Vec<String>)>,
    /// Language code -> trigger phrases, in detection priority order
    pub languages: Vec<(String, Vec<String>)>,
    /// Substrings that mark a transcript as a hallucination
    pub hallucination_parts: Vec<String>,
    /// Exact phrases that mark a transcript as a hallucination
    pub hallucinations: Vec<String>,
}

impl NormalizationRules {
    pub fn from_config(config: &Config) -> Self {
        let nonempty = |v: &[String]| -> Vec<String> {
            v.iter()
                .filter(|s| !s.trim().is_empty())
                .cloned()
                .collect()
        };

        Self {
            punctuations: config
                .punctuations
                .iter()
                .map(|(symbol, phrases)| (symbol.clone(), nonempty(phrases)))
                .collect(),
            languages: config
                .languages
                .keys()
                .map(|code| {
                    let phrases = match config.language_triggers.get(code) {
                        Some(configured) if !nonempty(configured).is_empty() => {
                            nonempty(configured)
                        }
                        _ => builtin_trigger_phrases(code),
                    };
                    (code.clone(), phrases)
                })
                .collect(),
            hallucination_parts: nonempty(&config.hallucination_parts),
            hallucinations: nonempty(&config.hallucinations),
        }
    }
}

/// Fallback trigger phrases for languages without a `language_triggers`
/// entry
fn builtin_trigger_phrases(code: &str) -> Vec<String> {
    let names: &[&str] = match code {
        "en" => &["English", "Англий"],
        "ru" => &["Russian", "Rusk", "Русский"],
        "de" => &["German", "Deutsch"],
        "fr" => &["French", "Français"],
        "es" => &["Spanish", "Español"],
        "it" => &["Italian", "Italiano"],
        "uk" => &["Ukrainian", "Українськ"],
        "pl" => &["Polish", "Polski"],
        "pt" => &["Portuguese", "Português"],
        "nl" => &["Dutch", "Nederlands"],
        "ja" => &["Japanese"],
        "zh" => &["Chinese"],
        _ => &[],
    };
    names.iter().map(|n| n.to_string()).collect()
}

/// Result of one normalization pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Final text; empty means "suppress delivery"
    pub text: String,
    /// Language after the pass (unchanged unless the switch fired)
    pub language: String,
    /// Whether the spoken-language switch fired
    pub language_changed: bool,
}

/// Applies the normalization pipeline with precompiled rule tables
pub struct Normalizer {
    capitalize: bool,
    /// One regex per (symbol, phrase) pair: optional leading spaces, the
    /// phrase, then the rest of the word it ran into
    substitutions: Vec<(Regex, String)>,
    /// Whitespace runs directly before any configured symbol
    squeeze: Option<Regex>,
    /// Language code -> lowercased trigger phrases
    languages: Vec<(String, Vec<String>)>,
    hallucination_parts: Vec<String>,
    hallucinations: Vec<String>,
}

impl Normalizer {
    pub fn new(rules: &NormalizationRules, capitalize: bool) -> Self {
        let mut substitutions = Vec::new();
        for (symbol, phrases) in &rules.punctuations {
            for phrase in phrases {
                let pattern = format!(r"(?i) *{}\S*", regex::escape(phrase));
                match Regex::new(&pattern) {
                    Ok(re) => substitutions.push((re, symbol.clone())),
                    Err(e) => tracing::warn!(
                        "Skipping punctuation trigger {:?} for {:?}: {}",
                        phrase,
                        symbol,
                        e
                    ),
                }
            }
        }

        let squeeze = if rules.punctuations.is_empty() {
            None
        } else {
            let alternation = rules
                .punctuations
                .iter()
                .map(|(symbol, _)| regex::escape(symbol))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"\s+({alternation})")).ok()
        };

        let languages = rules
            .languages
            .iter()
            .map(|(code, phrases)| {
                (
                    code.clone(),
                    phrases.iter().map(|p| p.to_lowercase()).collect(),
                )
            })
            .collect();

        Self {
            capitalize,
            substitutions,
            squeeze,
            languages,
            hallucination_parts: rules
                .hallucination_parts
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            hallucinations: rules
                .hallucinations
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    /// Run the full pipeline over one raw transcript.
    ///
    /// `current_language` is carried through unchanged unless the
    /// single-token language switch fires.
    pub fn normalize(&self, raw: &str, current_language: &str) -> Normalized {
        // 1. Trailing periods are engine noise, not dictation
        let trimmed = raw.trim().trim_end_matches('.').trim_end();

        // 2. Only the first character is recased
        let mut text = recase_first(trimmed, self.capitalize);

        // 3. Every (symbol, phrase) pair gets a chance; a phrase match
        // swallows its leading spaces and whatever non-space run follows it
        for (re, symbol) in &self.substitutions {
            if re.is_match(&text) {
                text = re.replace_all(&text, regex::NoExpand(symbol)).into_owned();
            }
        }

        // 4. No space before ":" or "."
        if let Some(re) = &self.squeeze {
            text = re.replace_all(&text, "$1").into_owned();
        }

        // 5. Single-token transcripts may be a spoken language switch; the
        // whitespace guard keeps ordinary sentences from flipping state
        let mut language = current_language.to_string();
        let mut language_changed = false;
        if !text.contains(char::is_whitespace) {
            let lower = text.to_lowercase();
            for (code, phrases) in &self.languages {
                if phrases.iter().any(|p| lower.contains(p.as_str())) {
                    language = code.clone();
                    language_changed = true;
                    break;
                }
            }
        }

        // 6. Known hallucinations never reach the clipboard
        let lower = text.to_lowercase();
        let hallucinated = self
            .hallucination_parts
            .iter()
            .any(|part| lower.contains(part.as_str()))
            || self.hallucinations.iter().any(|exact| *exact == lower);
        if hallucinated {
            tracing::debug!("Dropping hallucinated transcript {:?}", text);
            text.clear();
        }

        Normalized {
            text,
            language,
            language_changed,
        }
    }
}

/// Upper- or lowercase the first character, leaving the rest untouched
fn recase_first(s: &str, upper: bool) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let mapped: String = if upper {
                first.to_uppercase().collect()
            } else {
                first.to_lowercase().collect()
            };
            mapped + chars.as_str()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(
        punctuations: &[(&str, &[&str])],
        languages: &[(&str, &[&str])],
        parts: &[&str],
        exacts: &[&str],
    ) -> NormalizationRules {
        let to_vec = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        NormalizationRules {
            punctuations: punctuations
                .iter()
                .map(|(s, p)| (s.to_string(), to_vec(p)))
                .collect(),
            languages: languages
                .iter()
                .map(|(c, p)| (c.to_string(), to_vec(p)))
                .collect(),
            hallucination_parts: to_vec(parts),
            hallucinations: to_vec(exacts),
        }
    }

    fn normalizer(rules: &NormalizationRules) -> Normalizer {
        Normalizer::new(rules, true)
    }

    #[test]
    fn test_trailing_periods_and_whitespace() {
        let n = normalizer(&rules(&[], &[], &[], &[]));
        assert_eq!(n.normalize("  hello world. ", "en").text, "Hello world");
        assert_eq!(n.normalize("done...", "en").text, "Done");
        // Inner periods survive
        assert_eq!(n.normalize("v1.2 is out.", "en").text, "V1.2 is out");
    }

    #[test]
    fn test_capitalization_flag() {
        let r = rules(&[], &[], &[], &[]);
        let upper = Normalizer::new(&r, true);
        let lower = Normalizer::new(&r, false);
        assert_eq!(upper.normalize("hello World", "en").text, "Hello World");
        assert_eq!(lower.normalize("Hello World", "en").text, "hello World");
        assert_eq!(upper.normalize("", "en").text, "");
    }

    #[test]
    fn test_punctuation_substitution() {
        // "hello colon world" with {":" : ["colon"]} becomes "hello: world"
        let n = normalizer(&rules(&[(":", &["colon"])], &[], &[], &[]));
        assert_eq!(n.normalize("hello colon world", "en").text, "Hello: world");
    }

    #[test]
    fn test_substitution_swallows_trailing_run() {
        // The engine often glues punctuation onto the trigger word
        let n = normalizer(&rules(&[(":", &["colon"])], &[], &[], &[]));
        assert_eq!(n.normalize("hello colon, world", "en").text, "Hello: world");
        assert_eq!(n.normalize("hello Colons world", "en").text, "Hello: world");
    }

    #[test]
    fn test_substitution_multiple_rules_one_pass() {
        let n = normalizer(&rules(
            &[(":", &["colon"]), (".", &["period", "punkt"])],
            &[],
            &[],
            &[],
        ));
        assert_eq!(
            n.normalize("first colon second period", "en").text,
            "First: second."
        );
        assert_eq!(n.normalize("ende punkt", "en").text, "Ende.");
    }

    #[test]
    fn test_substitution_cyrillic_trigger() {
        let n = normalizer(&rules(&[(":", &["двоето", "двойто"])], &[], &[], &[]));
        assert_eq!(n.normalize("привет Двоеточие мир", "en").text, "Привет: мир");
    }

    #[test]
    fn test_substitution_is_idempotent() {
        let n = normalizer(&rules(&[(":", &["colon"]), (".", &["period"])], &[], &[], &[]));
        let once = n.normalize("a colon b period", "en").text;
        let twice = n.normalize(&once, "en").text;
        // Second pass strips the trailing "." (step 1) but substitution
        // itself finds nothing left to rewrite
        assert_eq!(once, "A: b.");
        assert_eq!(twice, "A: b");
    }

    #[test]
    fn test_no_space_before_symbol() {
        let n = normalizer(&rules(&[(":", &["colon"])], &[], &[], &[]));
        // Whitespace left of the symbol collapses even across runs
        assert_eq!(n.normalize("a  colon b", "en").text, "A: b");
    }

    #[test]
    fn test_language_switch_single_word() {
        // "Russian" alone flips the language
        let n = normalizer(&rules(&[], &[("ru", &["Russian"])], &[], &[]));
        let out = n.normalize("Russian", "en");
        assert_eq!(out.language, "ru");
        assert!(out.language_changed);
        assert_eq!(out.text, "Russian");
    }

    #[test]
    fn test_language_switch_case_insensitive_substring() {
        let n = normalizer(&rules(&[], &[("ru", &["русский"])], &[], &[]));
        let out = n.normalize("РУССКИЙ.", "en");
        assert!(out.language_changed);
        assert_eq!(out.language, "ru");
    }

    #[test]
    fn test_language_switch_blocked_by_whitespace() {
        // Multi-word text never changes the language
        let n = normalizer(&rules(&[], &[("ru", &["Russian"])], &[], &[]));
        let out = n.normalize("I speak Russian fluently", "en");
        assert_eq!(out.language, "en");
        assert!(!out.language_changed);
    }

    #[test]
    fn test_language_switch_first_match_wins() {
        // "rusk" matches both tables; iteration order decides
        let n = normalizer(&rules(
            &[],
            &[("de", &["rusk"]), ("ru", &["rusk", "russian"])],
            &[],
            &[],
        ));
        let out = n.normalize("Rusk", "en");
        assert_eq!(out.language, "de");
    }

    #[test]
    fn test_language_switch_after_substitution_merges_tokens() {
        // Substitution can reduce "russian colon" to one token, which then
        // qualifies for detection
        let n = normalizer(&rules(
            &[(":", &["colon"])],
            &[("ru", &["russian"])],
            &[],
            &[],
        ));
        let out = n.normalize("russian colon", "en");
        assert_eq!(out.text, "Russian:");
        assert!(out.language_changed);
    }

    #[test]
    fn test_hallucination_exact_match() {
        let n = normalizer(&rules(&[], &[], &[], &["um", "thank you"]));
        assert_eq!(n.normalize("um", "en").text, "");
        assert_eq!(n.normalize("Um.", "en").text, "");
        assert_eq!(n.normalize("Thank You", "en").text, "");
        // Not an exact match: survives
        assert_eq!(n.normalize("um well", "en").text, "Um well");
    }

    #[test]
    fn test_hallucination_substring() {
        let n = normalizer(&rules(&[], &[], &["subtitles by"], &[]));
        assert_eq!(
            n.normalize("Subtitles by the community", "en").text,
            ""
        );
        assert_eq!(n.normalize("fine text", "en").text, "Fine text");
    }

    #[test]
    fn test_hallucination_preserves_language_switch() {
        // The switch commits even when the text itself is then dropped
        let n = normalizer(&rules(&[], &[("ru", &["russian"])], &["russian"], &[]));
        let out = n.normalize("Russian", "en");
        assert_eq!(out.text, "");
        assert!(out.language_changed);
        assert_eq!(out.language, "ru");
    }

    #[test]
    fn test_empty_input() {
        let n = normalizer(&rules(&[(":", &["colon"])], &[("ru", &["russian"])], &[], &[]));
        let out = n.normalize("   ", "en");
        assert_eq!(out.text, "");
        assert!(!out.language_changed);
        assert_eq!(out.language, "en");
    }

    #[test]
    fn test_rules_from_config_skip_empty_entries() {
        let mut config = Config::default();
        config
            .punctuations
            .insert(":".to_string(), vec!["colon".into(), "  ".into()]);
        config.hallucination_parts = vec![String::new(), "noise".into()];
        let rules = NormalizationRules::from_config(&config);
        assert_eq!(rules.punctuations[0].1, vec!["colon"]);
        assert_eq!(rules.hallucination_parts, vec!["noise"]);
    }

    #[test]
    fn test_rules_from_config_trigger_fallback() {
        let mut config = Config::default();
        config.languages.insert("ru".into(), "ctrl+shift+r".into());
        config.languages.insert("en".into(), "shift+l".into());
        config
            .language_triggers
            .insert("ru".into(), vec!["по-русски".into()]);
        let rules = NormalizationRules::from_config(&config);
        // en falls back to built-in names, ru uses the configured ones
        assert!(rules.languages[0].1.contains(&"English".to_string()));
        assert_eq!(rules.languages[1].1, vec!["по-русски"]);
    }

    #[test]
    fn test_rules_from_config_language_order_is_stable() {
        let mut config = Config::default();
        config.languages.insert("ru".into(), "ctrl+shift+r".into());
        config.languages.insert("en".into(), "shift+l".into());
        config.languages.insert("de".into(), "ctrl+shift+d".into());
        let rules = NormalizationRules::from_config(&config);
        let codes: Vec<&str> = rules.languages.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(codes, vec!["de", "en", "ru"]);
    }
}
