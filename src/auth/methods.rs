//! Authentication method variants.
//!
//! Every enabled method implements the same capability: probe runtime
//! availability, acquire a sample from the user (the cancellable phase),
//! verify the sample (never cancellable). Hardware-backed methods drive
//! their backends' opaque match APIs through the system binaries, the same
//! way the wipe side drives `cryptsetup`.

use super::verifier::{self, VerifyOutcome};
use crate::config::{AuthMethodKind, Config};
use crate::ui::UserInterface;
use log::debug;
use std::process::{Command, Stdio};
use zeroize::Zeroizing;

/// Sample acquired during the prompting phase.
pub enum CredentialSample {
    /// Typed secret (password method). Zeroed on drop.
    Secret(Zeroizing<String>),
    /// Recognized utterance (voice method).
    Utterance(String),
    /// The backend already ran its opaque match (fingerprint method).
    HardwareMatch(bool),
}

/// Verdict of the verifying phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted,
    Rejected,
    BackendError(String),
}

pub trait AuthMethod {
    fn kind(&self) -> AuthMethodKind;

    /// Runtime availability probe. An unavailable method is skipped without
    /// consuming an attempt.
    fn available(&self) -> bool;

    /// Prompting phase. `Ok(None)` is a user cancel; `Err` is a backend
    /// fault. Both consume an attempt.
    fn acquire(&mut self, ui: &mut dyn UserInterface)
        -> Result<Option<CredentialSample>, String>;

    /// Verifying phase.
    fn verify(&mut self, sample: CredentialSample) -> AuthOutcome;
}

/// Password entry checked against the stored reference.
pub struct PasswordMethod {
    reference: String,
}

impl PasswordMethod {
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_string(),
        }
    }
}

impl AuthMethod for PasswordMethod {
    fn kind(&self) -> AuthMethodKind {
        AuthMethodKind::Password
    }

    fn available(&self) -> bool {
        true
    }

    fn acquire(
        &mut self,
        ui: &mut dyn UserInterface,
    ) -> Result<Option<CredentialSample>, String> {
        match ui.read_credential("Password") {
            Some(secret) => Ok(Some(CredentialSample::Secret(secret))),
            None => Ok(None),
        }
    }

    fn verify(&mut self, sample: CredentialSample) -> AuthOutcome {
        let CredentialSample::Secret(secret) = sample else {
            return AuthOutcome::BackendError("password method got a foreign sample".into());
        };

        if secret.is_empty() {
            // Empty input is an ordinary failed attempt.
            return AuthOutcome::Rejected;
        }

        let outcome = match verifier::verify_reference(secret.as_bytes(), &self.reference) {
            VerifyOutcome::Success => AuthOutcome::Granted,
            VerifyOutcome::Failure => AuthOutcome::Rejected,
            VerifyOutcome::Error => {
                AuthOutcome::BackendError("credential reference unusable".into())
            }
        };
        // `secret` drops here; the plaintext is zeroed with it.
        outcome
    }
}

/// Fingerprint verification through the fprintd match API.
pub struct FingerprintMethod {
    user: String,
}

impl Default for FingerprintMethod {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintMethod {
    pub fn new() -> Self {
        Self {
            user: std::env::var("USER").unwrap_or_else(|_| "root".into()),
        }
    }
}

impl AuthMethod for FingerprintMethod {
    fn kind(&self) -> AuthMethodKind {
        AuthMethodKind::Fingerprint
    }

    fn available(&self) -> bool {
        match Command::new("fprintd-list")
            .arg(&self.user)
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) if output.status.success() => {
                let listing = String::from_utf8_lossy(&output.stdout);
                !listing.contains("no fingers enrolled")
            }
            _ => false,
        }
    }

    fn acquire(
        &mut self,
        ui: &mut dyn UserInterface,
    ) -> Result<Option<CredentialSample>, String> {
        ui.status("place your finger on the reader");
        match Command::new("fprintd-verify")
            .arg(&self.user)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => Ok(Some(CredentialSample::HardwareMatch(status.success()))),
            Err(e) => Err(format!("fprintd-verify failed to start: {}", e)),
        }
    }

    fn verify(&mut self, sample: CredentialSample) -> AuthOutcome {
        match sample {
            CredentialSample::HardwareMatch(true) => AuthOutcome::Granted,
            CredentialSample::HardwareMatch(false) => AuthOutcome::Rejected,
            _ => AuthOutcome::BackendError("fingerprint method got a foreign sample".into()),
        }
    }
}

/// Speech capture backend seam. The shipped implementation drives
/// pocketsphinx; tests substitute a canned recognizer.
pub trait VoiceCapture {
    fn available(&self) -> bool;
    fn capture(&mut self) -> Result<String, String>;
}

/// Single-utterance capture via `pocketsphinx_continuous` under a timeout.
pub struct PocketSphinxCapture;

const CAPTURE_SECONDS: &str = "8";

impl VoiceCapture for PocketSphinxCapture {
    fn available(&self) -> bool {
        std::path::Path::new("/dev/snd").exists()
            && Command::new("pocketsphinx_continuous")
                .arg("-h")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok()
    }

    fn capture(&mut self) -> Result<String, String> {
        let output = Command::new("timeout")
            .args([CAPTURE_SECONDS, "pocketsphinx_continuous", "-inmic", "yes"])
            .stderr(Stdio::null())
            .output()
            .map_err(|e| format!("speech engine failed to start: {}", e))?;

        // Recognition results are the plain stdout lines; the engine's own
        // chatter is prefixed.
        let utterance = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.starts_with("INFO:") && !line.starts_with("READY"))
            .filter(|line| !line.trim().is_empty())
            .next_back()
            .unwrap_or_default()
            .trim()
            .to_string();

        debug!("speech engine heard {} characters", utterance.len());
        Ok(utterance)
    }
}

/// Spoken passphrase matched by Levenshtein similarity.
pub struct VoiceMethod {
    passphrase: String,
    backend: Box<dyn VoiceCapture>,
}

impl VoiceMethod {
    pub fn new(passphrase: &str) -> Self {
        Self::with_backend(passphrase, Box::new(PocketSphinxCapture))
    }

    pub fn with_backend(passphrase: &str, backend: Box<dyn VoiceCapture>) -> Self {
        Self {
            passphrase: passphrase.to_string(),
            backend,
        }
    }
}

impl AuthMethod for VoiceMethod {
    fn kind(&self) -> AuthMethodKind {
        AuthMethodKind::Voice
    }

    fn available(&self) -> bool {
        self.backend.available()
    }

    fn acquire(
        &mut self,
        ui: &mut dyn UserInterface,
    ) -> Result<Option<CredentialSample>, String> {
        ui.status("speak your passphrase");
        match self.backend.capture() {
            Ok(utterance) => Ok(Some(CredentialSample::Utterance(utterance))),
            Err(e) => Err(e),
        }
    }

    fn verify(&mut self, sample: CredentialSample) -> AuthOutcome {
        let CredentialSample::Utterance(utterance) = sample else {
            return AuthOutcome::BackendError("voice method got a foreign sample".into());
        };

        if utterance.trim().is_empty() {
            return AuthOutcome::Rejected;
        }

        if verifier::voice_matches(&utterance, &self.passphrase) {
            AuthOutcome::Granted
        } else {
            AuthOutcome::Rejected
        }
    }
}

/// Construct the enabled method set in the fixed priority order: password,
/// then fingerprint, then voice. A backend the host lacks still gets its
/// variant; the per-attempt availability probe is what skips it.
pub fn build_methods(config: &Config) -> Vec<Box<dyn AuthMethod>> {
    let mut methods: Vec<Box<dyn AuthMethod>> = Vec::new();

    if config.auth_methods.contains(&AuthMethodKind::Password) {
        methods.push(Box::new(PasswordMethod::new(&config.password_reference)));
    }
    if config.auth_methods.contains(&AuthMethodKind::Fingerprint) {
        methods.push(Box::new(FingerprintMethod::new()));
    }
    if config.auth_methods.contains(&AuthMethodKind::Voice) {
        methods.push(Box::new(VoiceMethod::new(&config.voice_passphrase)));
    }

    methods
}
