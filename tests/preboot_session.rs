// End-to-end session tests through the public API: configuration on disk,
// the gate, and a wipe against a scratch image.

use std::collections::VecDeque;
use std::io::Read;
use vaultguard::auth::methods::build_methods;
use vaultguard::auth::verifier;
use vaultguard::config::{self, AuthMethodKind};
use vaultguard::ui::UserInterface;
use vaultguard::wipe::{WipeEngine, WipeProgress};
use vaultguard::{AuthGate, Config, GateOutcome, WipeAlgorithm};
use zeroize::Zeroizing;

#[derive(Default)]
struct ScriptedUi {
    credentials: VecDeque<Option<String>>,
    progress_calls: usize,
}

impl ScriptedUi {
    fn typing(lines: &[&str]) -> Self {
        Self {
            credentials: lines.iter().map(|l| Some(l.to_string())).collect(),
            progress_calls: 0,
        }
    }
}

impl UserInterface for ScriptedUi {
    fn show_login(&mut self, _: AuthMethodKind, _: u32, _: u32) {}

    fn read_credential(&mut self, _: &str) -> Option<Zeroizing<String>> {
        self.credentials.pop_front().unwrap_or(None).map(Zeroizing::new)
    }

    fn read_line(&mut self, _: &str) -> Option<String> {
        None
    }

    fn confirm(&mut self, _: &str, default: bool) -> bool {
        default
    }

    fn show_attempt_failed(&mut self, _: u32) {}

    fn show_destruction_warning(&mut self, _: u32) {}

    fn progress(&mut self, _: &WipeProgress) {
        self.progress_calls += 1;
    }

    fn status(&mut self, _: &str) {}

    fn error(&mut self, _: &str) {}
}

fn session_config(device: &str) -> Config {
    Config {
        auth_methods: vec![AuthMethodKind::Password],
        max_attempts: 3,
        password_reference: verifier::hash_password("hunter2").unwrap(),
        voice_passphrase: String::new(),
        target_device: device.to_string(),
        mount_point: String::new(),
        wipe_algorithm: WipeAlgorithm::Zero,
        encrypt_before_wipe: false,
        verify_passes: true,
    }
}

#[test]
fn persisted_config_drives_a_granted_session() {
    let dir = tempfile::tempdir().unwrap();
    let conf_path = dir.path().join("vaultguard.conf");

    config::save(&session_config("/dev/sdz"), &conf_path).unwrap();
    let loaded = config::load(&conf_path).unwrap();
    loaded.validate().unwrap();

    let methods = build_methods(&loaded);
    let mut ui = ScriptedUi::typing(&["nope", "hunter2"]);
    let mut gate = AuthGate::new(&loaded, methods);

    assert_eq!(gate.run(&mut ui), GateOutcome::Granted);
    assert_eq!(gate.attempts(), 1);
}

#[test]
fn exhausted_session_reports_exhaustion_exactly_once() {
    let loaded = session_config("/dev/sdz");
    let methods = build_methods(&loaded);
    let mut ui = ScriptedUi::typing(&["a", "b", "c", "d", "e"]);
    let mut gate = AuthGate::new(&loaded, methods);

    assert_eq!(gate.run(&mut ui), GateOutcome::Exhausted);
    assert_eq!(gate.attempts(), 3);
    // The surplus scripted lines were never consumed.
    assert_eq!(ui.credentials.len(), 2);
}

#[test]
fn configured_wipe_destroys_the_image() {
    let image = tempfile::NamedTempFile::new().unwrap();
    image.as_file().set_len(2 * 1024 * 1024).unwrap();
    {
        use std::os::unix::fs::FileExt;
        image
            .as_file()
            .write_all_at(b"the secret volume header", 0)
            .unwrap();
    }

    let config = session_config(image.path().to_str().unwrap());
    let mut ui = ScriptedUi::default();
    let mut engine = WipeEngine::new(&config.target_device, config.verify_passes);
    let summary = engine.run(config.wipe_algorithm, &mut ui).unwrap();

    assert_eq!(summary.passes_completed, 1);
    assert_eq!(summary.verify_mismatches, 0);
    assert!(ui.progress_calls >= 1);

    let mut data = Vec::new();
    std::fs::File::open(image.path())
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    assert!(data.iter().all(|&b| b == 0));
}
