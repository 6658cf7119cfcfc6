pub mod progress;

use crate::config::AuthMethodKind;
use crate::wipe::WipeProgress;
use console::{style, Term};
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use zeroize::Zeroizing;

/// The named screens and sinks the core drives. The core takes one
/// implementation by reference and never knows which backend it talks to.
pub trait UserInterface {
    /// Login screen for `method`. `attempt` is 1-based.
    fn show_login(&mut self, method: AuthMethodKind, attempt: u32, max_attempts: u32);

    /// Read a credential without echo. `None` means the user cancelled.
    fn read_credential(&mut self, prompt: &str) -> Option<Zeroizing<String>>;

    /// Read a visible line of input. `None` means cancel or EOF.
    fn read_line(&mut self, prompt: &str) -> Option<String>;

    /// Yes/no question with a default answer.
    fn confirm(&mut self, prompt: &str, default: bool) -> bool;

    /// Failure notice. Only the remaining attempt count is disclosed.
    fn show_attempt_failed(&mut self, remaining: u32);

    /// Non-cancellable destruction countdown notice.
    fn show_destruction_warning(&mut self, seconds_left: u32);

    /// Advisory progress sink for the wipe engine.
    fn progress(&mut self, update: &WipeProgress);

    /// Status sink.
    fn status(&mut self, message: &str);

    /// Error sink. Receives summary text, never raw diagnostics.
    fn error(&mut self, message: &str);
}

/// Terminal backend.
pub struct ConsoleUi {
    term: Term,
    cancel: Arc<AtomicBool>,
    progress_line_open: bool,
}

impl ConsoleUi {
    /// `cancel` is set by the SIGINT flag handler registered in `main`;
    /// observing it turns an interrupted prompt into a counted cancel.
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            term: Term::stdout(),
            cancel,
            progress_line_open: false,
        }
    }

    fn take_cancel(&self) -> bool {
        self.cancel.swap(false, Ordering::SeqCst)
    }

    fn end_progress_line(&mut self) {
        if self.progress_line_open {
            let _ = self.term.write_line("");
            self.progress_line_open = false;
        }
    }
}

impl UserInterface for ConsoleUi {
    fn show_login(&mut self, method: AuthMethodKind, attempt: u32, max_attempts: u32) {
        self.end_progress_line();
        let _ = self.term.write_line(&format!(
            "\n{}  attempt {} of {}",
            style("vaultguard").cyan().bold(),
            attempt,
            max_attempts
        ));
        let _ = self
            .term
            .write_line(&format!("authenticate with {}", style(method).bold()));
    }

    fn read_credential(&mut self, prompt: &str) -> Option<Zeroizing<String>> {
        let _ = write!(self.term, "{}: ", prompt);
        let _ = self.term.flush();
        match self.term.read_secure_line() {
            Ok(line) if !self.take_cancel() => Some(Zeroizing::new(line)),
            _ => None,
        }
    }

    fn read_line(&mut self, prompt: &str) -> Option<String> {
        let _ = write!(self.term, "{}: ", prompt);
        let _ = self.term.flush();
        match self.term.read_line() {
            Ok(line) if !self.take_cancel() => Some(line.trim().to_string()),
            _ => None,
        }
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> bool {
        let hint = if default { "Y/n" } else { "y/N" };
        match self.read_line(&format!("{} [{}]", prompt, hint)) {
            None => default,
            Some(answer) if answer.is_empty() => default,
            Some(answer) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
        }
    }

    fn show_attempt_failed(&mut self, remaining: u32) {
        self.end_progress_line();
        let _ = self.term.write_line(&format!(
            "{} {} attempt{} remaining",
            style("authentication failed.").red().bold(),
            remaining,
            if remaining == 1 { "" } else { "s" }
        ));
    }

    fn show_destruction_warning(&mut self, seconds_left: u32) {
        self.end_progress_line();
        let _ = self.term.write_line(&format!(
            "{}",
            style(format!(
                "AUTHENTICATION EXHAUSTED: data destruction in {} second{}",
                seconds_left,
                if seconds_left == 1 { "" } else { "s" }
            ))
            .red()
            .bold()
        ));
    }

    fn progress(&mut self, update: &WipeProgress) {
        let line = progress::render_line(update);
        let _ = self.term.clear_line();
        let _ = write!(self.term, "\r{}", line);
        let _ = self.term.flush();
        self.progress_line_open = true;
    }

    fn status(&mut self, message: &str) {
        self.end_progress_line();
        let _ = self.term.write_line(message);
    }

    fn error(&mut self, message: &str) {
        self.end_progress_line();
        let _ = self.term.write_line(&format!("{}", style(message).red()));
    }
}
