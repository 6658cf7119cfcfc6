// Gate state machine tests, driven through scripted methods and a
// scripted UI.

use super::methods::{
    build_methods, AuthMethod, AuthOutcome, CredentialSample, PasswordMethod, VoiceCapture,
    VoiceMethod,
};
use super::verifier;
use super::*;
use crate::config::{AuthMethodKind, Config};
use crate::wipe::WipeProgress;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use zeroize::Zeroizing;

// ==================== SCRIPTED COLLABORATORS ====================

#[derive(Default)]
struct ScriptedUi {
    credentials: VecDeque<Option<&'static str>>,
    logins: Vec<(AuthMethodKind, u32)>,
    failures_shown: Vec<u32>,
    errors: Vec<String>,
}

impl ScriptedUi {
    fn typing(lines: &[Option<&'static str>]) -> Self {
        Self {
            credentials: lines.iter().copied().collect(),
            ..Default::default()
        }
    }
}

impl crate::ui::UserInterface for ScriptedUi {
    fn show_login(&mut self, method: AuthMethodKind, attempt: u32, _max: u32) {
        self.logins.push((method, attempt));
    }

    fn read_credential(&mut self, _prompt: &str) -> Option<Zeroizing<String>> {
        self.credentials
            .pop_front()
            .unwrap_or(None)
            .map(|line| Zeroizing::new(line.to_string()))
    }

    fn read_line(&mut self, _prompt: &str) -> Option<String> {
        None
    }

    fn confirm(&mut self, _prompt: &str, default: bool) -> bool {
        default
    }

    fn show_attempt_failed(&mut self, remaining: u32) {
        self.failures_shown.push(remaining);
    }

    fn show_destruction_warning(&mut self, _seconds_left: u32) {}

    fn progress(&mut self, _update: &WipeProgress) {}

    fn status(&mut self, _message: &str) {}

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

struct MockMethod {
    kind: AuthMethodKind,
    available: bool,
    outcomes: VecDeque<AuthOutcome>,
    verify_calls: Rc<RefCell<u32>>,
}

impl MockMethod {
    fn new(kind: AuthMethodKind, available: bool, outcomes: &[AuthOutcome]) -> Self {
        Self {
            kind,
            available,
            outcomes: outcomes.iter().cloned().collect(),
            verify_calls: Rc::new(RefCell::new(0)),
        }
    }

    fn verify_counter(&self) -> Rc<RefCell<u32>> {
        Rc::clone(&self.verify_calls)
    }
}

impl AuthMethod for MockMethod {
    fn kind(&self) -> AuthMethodKind {
        self.kind
    }

    fn available(&self) -> bool {
        self.available
    }

    fn acquire(
        &mut self,
        _ui: &mut dyn crate::ui::UserInterface,
    ) -> Result<Option<CredentialSample>, String> {
        Ok(Some(CredentialSample::HardwareMatch(true)))
    }

    fn verify(&mut self, _sample: CredentialSample) -> AuthOutcome {
        *self.verify_calls.borrow_mut() += 1;
        self.outcomes.pop_front().unwrap_or(AuthOutcome::Rejected)
    }
}

struct CannedVoice(VecDeque<Result<String, String>>);

impl VoiceCapture for CannedVoice {
    fn available(&self) -> bool {
        true
    }

    fn capture(&mut self) -> Result<String, String> {
        self.0.pop_front().unwrap_or(Ok(String::new()))
    }
}

fn password_config(max_attempts: u32) -> Config {
    Config {
        auth_methods: vec![AuthMethodKind::Password],
        max_attempts,
        password_reference: verifier::hash_password("hunter2").unwrap(),
        target_device: "/dev/sdz".into(),
        ..Config::default()
    }
}

fn password_methods(config: &Config) -> Vec<Box<dyn AuthMethod>> {
    vec![Box::new(PasswordMethod::new(&config.password_reference))]
}

// ==================== END-TO-END SCENARIOS ====================

#[test]
fn happy_path_grants_without_consuming_attempts() {
    let config = password_config(3);
    let mut ui = ScriptedUi::typing(&[Some("hunter2")]);
    let mut gate = AuthGate::new(&config, password_methods(&config));

    assert_eq!(gate.run(&mut ui), GateOutcome::Granted);
    assert_eq!(gate.attempts(), 0);
    assert_eq!(gate.state(), GateState::Granted);
    assert!(ui.failures_shown.is_empty());
}

#[test]
fn exhaustion_after_three_mismatches() {
    let config = password_config(3);
    let mut ui = ScriptedUi::typing(&[Some("wrong"), Some("wrong"), Some("wrong")]);
    let mut gate = AuthGate::new(&config, password_methods(&config));

    assert_eq!(gate.run(&mut ui), GateOutcome::Exhausted);
    assert_eq!(gate.attempts(), 3);
    assert_eq!(gate.state(), GateState::Exhausted);
    // Failure notices disclose only the remaining budget, and none follows
    // the final attempt.
    assert_eq!(ui.failures_shown, vec![2, 1]);
}

#[test]
fn unavailable_method_is_skipped_without_consuming_attempts() {
    let config = password_config(3);
    let absent = MockMethod::new(AuthMethodKind::Fingerprint, false, &[]);
    let absent_verifies = absent.verify_counter();

    let mut methods: Vec<Box<dyn AuthMethod>> = vec![Box::new(absent)];
    methods.extend(password_methods(&config));

    let mut ui = ScriptedUi::typing(&[Some("hunter2")]);
    let mut gate = AuthGate::new(&config, methods);

    assert_eq!(gate.run(&mut ui), GateOutcome::Granted);
    assert_eq!(gate.attempts(), 0);
    assert_eq!(*absent_verifies.borrow(), 0);
    // Only the password method ever reached the login screen.
    assert_eq!(ui.logins, vec![(AuthMethodKind::Password, 1)]);
}

#[test]
fn cancel_counts_as_an_attempt() {
    let config = password_config(3);
    let mut ui = ScriptedUi::typing(&[None, Some("hunter2")]);
    let mut gate = AuthGate::new(&config, password_methods(&config));

    assert_eq!(gate.run(&mut ui), GateOutcome::Granted);
    assert_eq!(gate.attempts(), 1);
    assert_eq!(ui.failures_shown, vec![2]);
}

#[test]
fn empty_input_counts_as_an_attempt() {
    let config = password_config(3);
    let mut ui = ScriptedUi::typing(&[Some(""), Some("hunter2")]);
    let mut gate = AuthGate::new(&config, password_methods(&config));

    assert_eq!(gate.run(&mut ui), GateOutcome::Granted);
    assert_eq!(gate.attempts(), 1);
}

#[test]
fn budget_of_one_fires_on_first_failure() {
    let config = password_config(1);
    let mut ui = ScriptedUi::typing(&[Some("wrong")]);
    let mut gate = AuthGate::new(&config, password_methods(&config));

    assert_eq!(gate.run(&mut ui), GateOutcome::Exhausted);
    assert_eq!(gate.attempts(), 1);
    assert!(ui.failures_shown.is_empty());
}

// ==================== COUNTER AND SELECTION SEMANTICS ====================

#[test]
fn verification_calls_never_exceed_budget() {
    let config = password_config(5);
    let mock = MockMethod::new(
        AuthMethodKind::Password,
        true,
        &vec![AuthOutcome::Rejected; 8],
    );
    let verifies = mock.verify_counter();

    let mut ui = ScriptedUi::default();
    let mut gate = AuthGate::new(&config, vec![Box::new(mock)]);

    assert_eq!(gate.run(&mut ui), GateOutcome::Exhausted);
    assert_eq!(*verifies.borrow(), 5);
}

#[test]
fn backend_error_consumes_an_attempt() {
    let config = password_config(3);
    let mock = MockMethod::new(
        AuthMethodKind::Fingerprint,
        true,
        &[
            AuthOutcome::BackendError("reader unplugged".into()),
            AuthOutcome::Granted,
        ],
    );

    let mut ui = ScriptedUi::default();
    let mut gate = AuthGate::new(&config, vec![Box::new(mock)]);

    assert_eq!(gate.run(&mut ui), GateOutcome::Granted);
    assert_eq!(gate.attempts(), 1);
}

#[test]
fn no_available_method_still_exhausts() {
    let config = password_config(2);
    let absent = MockMethod::new(AuthMethodKind::Voice, false, &[]);

    let mut ui = ScriptedUi::default();
    let mut gate = AuthGate::new(&config, vec![Box::new(absent)]);

    assert_eq!(gate.run(&mut ui), GateOutcome::Exhausted);
    assert_eq!(gate.attempts(), 2);
    assert_eq!(ui.errors.len(), 2);
}

#[test]
fn voice_method_grants_on_similar_utterance() {
    let mut config = password_config(3);
    config.auth_methods = vec![AuthMethodKind::Voice];
    config.password_reference = String::new();
    config.voice_passphrase = "open sesame".into();

    let canned = CannedVoice(VecDeque::from([Ok("open sesame".to_string())]));
    let voice = VoiceMethod::with_backend(&config.voice_passphrase, Box::new(canned));

    let mut ui = ScriptedUi::default();
    let mut gate = AuthGate::new(&config, vec![Box::new(voice)]);

    assert_eq!(gate.run(&mut ui), GateOutcome::Granted);
}

#[test]
fn voice_mismatch_consumes_attempt() {
    let mut config = password_config(2);
    config.auth_methods = vec![AuthMethodKind::Voice];
    config.password_reference = String::new();
    config.voice_passphrase = "open sesame".into();

    let canned = CannedVoice(VecDeque::from([
        Ok("something else entirely".to_string()),
        Ok("open sesame".to_string()),
    ]));
    let voice = VoiceMethod::with_backend(&config.voice_passphrase, Box::new(canned));

    let mut ui = ScriptedUi::default();
    let mut gate = AuthGate::new(&config, vec![Box::new(voice)]);

    assert_eq!(gate.run(&mut ui), GateOutcome::Granted);
    assert_eq!(gate.attempts(), 1);
}

#[test]
fn built_methods_follow_priority_order() {
    let config = Config {
        auth_methods: vec![
            AuthMethodKind::Voice,
            AuthMethodKind::Password,
            AuthMethodKind::Fingerprint,
        ],
        password_reference: verifier::hash_password("pw").unwrap(),
        voice_passphrase: "open sesame".into(),
        target_device: "/dev/sdz".into(),
        ..Config::default()
    };

    let kinds: Vec<AuthMethodKind> = build_methods(&config).iter().map(|m| m.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            AuthMethodKind::Password,
            AuthMethodKind::Fingerprint,
            AuthMethodKind::Voice
        ]
    );
}
