//! End-to-end pipeline test without hardware: key events drive the router,
//! a scripted speech engine stands in for whisper, and the language state
//! follows the same commit rules the daemon applies.

use clipspeak::audio::AudioBuffer;
use clipspeak::config::Config;
use clipspeak::error::TranscribeError;
use clipspeak::hotkey::{HotkeyRouter, KeyCombo, KeyToken};
use clipspeak::text::{NormalizationRules, Normalized, Normalizer};
use clipspeak::transcribe::{Dispatch, LocalDispatcher, SpeechEngine};
use std::sync::{Arc, Mutex};

/// Engine that replays a scripted sequence of transcripts and records the
/// language hint each dispatch handed it
struct ScriptedEngine {
    replies: Mutex<Vec<&'static str>>,
    seen_languages: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEngine {
    fn new(replies: &[&'static str]) -> Self {
        Self::with_log(replies, Arc::new(Mutex::new(Vec::new())))
    }

    fn with_log(replies: &[&'static str], seen_languages: Arc<Mutex<Vec<String>>>) -> Self {
        let mut replies: Vec<_> = replies.to_vec();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            seen_languages,
        }
    }
}

impl SpeechEngine for ScriptedEngine {
    fn transcribe(&self, _samples: &[f32], language: &str) -> Result<String, TranscribeError> {
        self.seen_languages
            .lock()
            .unwrap()
            .push(language.to_string());
        let mut replies = self.replies.lock().unwrap();
        replies
            .pop()
            .map(str::to_string)
            .ok_or_else(|| TranscribeError::Engine("script exhausted".into()))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.languages.insert("en".into(), "shift+l".into());
    config.languages.insert("ru".into(), "ctrl+shift+r".into());
    config
        .punctuations
        .insert(":".into(), vec!["colon".into(), "двоето".into()]);
    config.hallucinations = vec!["um".into()];
    config.hallucination_parts = vec!["subtitles by".into()];
    config
}

fn press(router: &mut HotkeyRouter, key: &str) -> Vec<String> {
    router
        .on_press(KeyToken::new(key))
        .into_iter()
        .map(|b| b.language)
        .collect()
}

fn release(router: &mut HotkeyRouter, key: &str) {
    router.on_release(&KeyToken::new(key));
}

fn half_second_audio() -> AudioBuffer {
    AudioBuffer::from_samples(&vec![2000i16; 8000])
}

/// The daemon's rules, reproduced: the committed language state drives
/// dispatch (the binding only seeds the hint before the first spoken
/// switch), and a successful normalization may move the state, a
/// suppressed delivery included
fn run_once(
    dispatcher: &dyn Dispatch,
    normalizer: &Normalizer,
    language_state: &mut String,
    committed: &mut bool,
    binding_language: &str,
) -> Normalized {
    let hint = if *committed {
        language_state.clone()
    } else {
        binding_language.to_string()
    };
    let result = dispatcher.dispatch(&half_second_audio(), &hint).unwrap();
    let outcome = normalizer.normalize(&result.text, language_state);
    if outcome.language_changed {
        *language_state = outcome.language.clone();
        *committed = true;
    }
    outcome
}

#[test]
fn hotkeys_fire_per_completing_press() {
    let config = test_config();
    let mut router = HotkeyRouter::new();
    for (code, combo) in &config.languages {
        router
            .register(KeyCombo::parse(combo).unwrap(), code.clone())
            .unwrap();
    }

    // shift then l completes the en combo exactly once
    assert!(press(&mut router, "shift").is_empty());
    assert_eq!(press(&mut router, "l"), vec!["en"]);

    // holding shift and re-pressing l fires again
    release(&mut router, "l");
    assert_eq!(press(&mut router, "l"), vec!["en"]);

    release(&mut router, "l");
    release(&mut router, "shift");

    // the three-key ru combo only fires once its last key arrives
    assert!(press(&mut router, "ctrl").is_empty());
    assert!(press(&mut router, "shift").is_empty());
    assert_eq!(press(&mut router, "r"), vec!["ru"]);
}

#[test]
fn transcript_flows_to_normalized_text() {
    let config = test_config();
    let rules = NormalizationRules::from_config(&config);
    let normalizer = Normalizer::new(&rules, config.capitalize);
    let dispatcher = LocalDispatcher::new(Box::new(ScriptedEngine::new(&[
        "hello colon world.",
    ])));

    let mut language = config.default_language.clone();
    let mut committed = false;
    let outcome = run_once(&dispatcher, &normalizer, &mut language, &mut committed, "en");

    assert_eq!(outcome.text, "Hello: world");
    assert!(!outcome.language_changed);
    assert_eq!(language, "en");
}

#[test]
fn spoken_switch_commits_language_state() {
    let config = test_config();
    let rules = NormalizationRules::from_config(&config);
    let normalizer = Normalizer::new(&rules, config.capitalize);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = LocalDispatcher::new(Box::new(ScriptedEngine::with_log(
        &["Russian", "привет мир"],
        seen.clone(),
    )));

    let mut language = config.default_language.clone();
    let mut committed = false;

    // A lone "Russian" flips the state and reports the switch
    let outcome = run_once(&dispatcher, &normalizer, &mut language, &mut committed, "en");
    assert!(outcome.language_changed);
    assert_eq!(outcome.language, "ru");
    assert_eq!(language, "ru");

    // The next dictation dispatches with the committed state even though
    // the same "en" hotkey triggered it
    let outcome = run_once(&dispatcher, &normalizer, &mut language, &mut committed, "en");
    assert!(!outcome.language_changed);
    assert_eq!(language, "ru");
    assert_eq!(outcome.text, "Привет мир");

    // The engine saw the binding's seed first, then the committed switch
    assert_eq!(*seen.lock().unwrap(), vec!["en", "ru"]);
}

#[test]
fn multi_word_transcripts_never_switch() {
    let config = test_config();
    let rules = NormalizationRules::from_config(&config);
    let normalizer = Normalizer::new(&rules, config.capitalize);
    let dispatcher = LocalDispatcher::new(Box::new(ScriptedEngine::new(&[
        "I will speak Russian now",
    ])));

    let mut language = config.default_language.clone();
    let mut committed = false;
    let outcome = run_once(&dispatcher, &normalizer, &mut language, &mut committed, "en");

    assert!(!outcome.language_changed);
    assert_eq!(language, "en");
    assert_eq!(outcome.text, "I will speak Russian now");
}

#[test]
fn hallucinations_suppress_delivery() {
    let config = test_config();
    let rules = NormalizationRules::from_config(&config);
    let normalizer = Normalizer::new(&rules, config.capitalize);
    let dispatcher = LocalDispatcher::new(Box::new(ScriptedEngine::new(&[
        "um",
        "Subtitles by the Amara community",
    ])));

    let mut language = config.default_language.clone();
    let mut committed = false;

    let outcome = run_once(&dispatcher, &normalizer, &mut language, &mut committed, "en");
    assert_eq!(outcome.text, "");

    let outcome = run_once(&dispatcher, &normalizer, &mut language, &mut committed, "en");
    assert_eq!(outcome.text, "");
    assert_eq!(language, "en");
}

#[test]
fn failed_dispatch_leaves_language_state_alone() {
    // Script exhausted immediately: every dispatch fails
    let dispatcher = LocalDispatcher::new(Box::new(ScriptedEngine::new(&[])));

    let language = String::from("en");
    let result = dispatcher.dispatch(&half_second_audio(), &language);
    assert!(result.is_err());

    // The daemon never reaches normalization on a failed dispatch, so the
    // shared language state is untouched
    assert_eq!(language, "en");
}
