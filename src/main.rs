use clap::Parser;
use log::{error, info, warn};
use signal_hook::consts::SIGINT;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use vaultguard::auth::methods::build_methods;
use vaultguard::auth::verifier;
use vaultguard::config::{self, cmdline::CmdlineOverrides, AuthMethodKind};
use vaultguard::ui::{ConsoleUi, UserInterface};
use vaultguard::{deadman, platform, AuthGate, Config, GateOutcome, WipeAlgorithm};

#[derive(Parser)]
#[command(name = "vaultguard")]
#[command(about = "Pre-boot authentication gate with a dead-man's switch")]
#[command(version)]
struct Cli {
    /// Run first-time setup, persist the configuration, then reboot
    #[arg(long)]
    setup: bool,

    /// Override the configuration path
    #[arg(long, value_name = "PATH", default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Pre-boot gate mode: on success exit 0 so the boot continues
    #[arg(long)]
    initramfs: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // SIGINT during a prompt becomes a counted cancel instead of a kill.
    let cancel = Arc::new(AtomicBool::new(false));
    if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&cancel)) {
        warn!("could not register SIGINT handler: {}", e);
    }

    let mut ui = ConsoleUi::new(cancel);

    // Keep credential and key material away from swap for the whole session.
    if let Err(e) = platform::lock_memory() {
        warn!("{}", e);
    }

    let overrides = CmdlineOverrides::from_proc();
    let setup_mode = cli.setup || overrides.setup;

    if setup_mode {
        return match run_setup(&mut ui, &cli.config) {
            Ok(true) => {
                ui.status("configuration saved; rebooting");
                platform::reboot();
                ExitCode::SUCCESS
            }
            Ok(false) => {
                ui.status("setup cancelled");
                ExitCode::FAILURE
            }
            Err(e) => {
                error!("setup failed: {}", e);
                ui.error("setup failed");
                ExitCode::FAILURE
            }
        };
    }

    let mut config = match config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            ui.error("configuration missing or unreadable");
            return ExitCode::FAILURE;
        }
    };

    overrides.apply(&mut config);

    if let Err(e) = config.validate() {
        error!("{}", e);
        ui.error("configuration invalid");
        return ExitCode::FAILURE;
    }
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    if cli.initramfs {
        info!("pre-boot gate mode: boot continues on success");
    }

    let methods = build_methods(&config);
    let mut gate = AuthGate::new(&config, methods);

    match gate.run(&mut ui) {
        GateOutcome::Granted => {
            ui.status("access granted");
            ExitCode::SUCCESS
        }
        GateOutcome::Exhausted => deadman::execute(&config, &mut ui),
    }
}

/// First-run wizard. `Ok(false)` means the user cancelled.
fn run_setup(ui: &mut ConsoleUi, path: &Path) -> anyhow::Result<bool> {
    ui.status("vaultguard first-run setup");

    let Some(target_device) = ui.read_line("Target device (whole block device, e.g. /dev/sdb)")
    else {
        return Ok(false);
    };
    if target_device.is_empty() {
        return Ok(false);
    }

    let mount_point = ui
        .read_line("Mount point (blank to skip pre-wipe unmount)")
        .unwrap_or_default();

    let max_attempts: u32 = match ui.read_line("Attempts before destruction (1-99, default 3)") {
        None => return Ok(false),
        Some(line) if line.is_empty() => 3,
        Some(line) => match line.parse() {
            Ok(n) => n,
            Err(_) => {
                ui.error("not a number; using 3");
                3
            }
        },
    };

    let wipe_algorithm = match ui.read_line(
        "Wipe algorithm (gutmann, dod522022m, dodshort, random, zero; default dod522022m)",
    ) {
        None => return Ok(false),
        Some(line) if line.is_empty() => WipeAlgorithm::Dod7,
        Some(line) => match line.parse() {
            Ok(WipeAlgorithm::VerifyOnly) => {
                ui.error("'verify' destroys nothing; pick an overwrite algorithm");
                return Ok(false);
            }
            Ok(algorithm) => algorithm,
            Err(_) => {
                ui.error("unknown algorithm");
                return Ok(false);
            }
        },
    };

    let password_reference = loop {
        let Some(first) = ui.read_credential("New password") else {
            return Ok(false);
        };
        if first.is_empty() {
            ui.error("password must not be empty");
            continue;
        }
        let Some(second) = ui.read_credential("Confirm password") else {
            return Ok(false);
        };
        if *first == *second {
            break verifier::hash_password(&first)?;
        }
        ui.error("passwords do not match");
    };

    let encrypt_before_wipe = ui.confirm("Scramble the volume key before wiping?", true);
    let verify_passes = ui.confirm("Verify pattern passes during the wipe?", false);

    let config = Config {
        auth_methods: vec![AuthMethodKind::Password],
        max_attempts,
        password_reference,
        voice_passphrase: String::new(),
        target_device,
        mount_point,
        wipe_algorithm,
        encrypt_before_wipe,
        verify_passes,
    };

    config.validate()?;
    config::save(&config, path)?;
    Ok(true)
}
