//! Owns the terminal while the order book view runs.
//!
//! The view draws on the alternate screen in raw mode. Both must be undone
//! on every exit path, including a panic in the draw loop, or the user's
//! shell is left without echo and line editing.

use std::io::{self, IsTerminal, Stdout};
use std::panic;

use crossterm::{
    cursor, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::Result;
use crate::error::ReplicaError;

/// Terminal drawing the order book to stdout.
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Switches stdout to raw mode on the alternate screen.
///
/// Stdout is checked first so a piped run fails with a clear message
/// instead of corrupting the output stream with escape codes. Raw mode is
/// undone if a later step fails.
///
/// # Errors
///
/// Returns [`ReplicaError::Io`] if stdout is not a TTY or the terminal
/// refuses either mode switch.
pub fn setup_terminal() -> Result<Tui> {
    ensure_interactive(io::stdout().is_terminal())?;

    enable_raw_mode().map_err(|e| ReplicaError::Io(format!("failed to enable raw mode: {e}")))?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| {
        let _ = disable_raw_mode();
        ReplicaError::Io(format!("failed to enter alternate screen: {e}"))
    })?;

    Terminal::new(CrosstermBackend::new(stdout)).map_err(|e| {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
        ReplicaError::Io(format!("failed to create terminal: {e}"))
    })
}

/// Leaves the alternate screen, disables raw mode and shows the cursor.
///
/// # Errors
///
/// Returns [`ReplicaError::Io`] if any of the three steps fails.
pub fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode().map_err(|e| ReplicaError::Io(format!("failed to disable raw mode: {e}")))?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .map_err(|e| ReplicaError::Io(format!("failed to leave alternate screen: {e}")))?;
    terminal
        .show_cursor()
        .map_err(|e| ReplicaError::Io(format!("failed to show cursor: {e}")))
}

/// Chains a panic hook that puts the terminal back before the panic
/// message is printed, so the message lands on the normal screen.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
        previous(info);
    }));
}

fn ensure_interactive(is_terminal: bool) -> Result<()> {
    if is_terminal {
        Ok(())
    } else {
        Err(ReplicaError::Io(
            "order book view requires an interactive terminal (TTY)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piped_stdout_is_refused() {
        let result = ensure_interactive(false);
        assert!(matches!(result, Err(ReplicaError::Io(msg)) if msg.contains("TTY")));
        assert!(ensure_interactive(true).is_ok());
    }

    #[test]
    fn setup_fails_cleanly_without_a_tty() {
        // Test harnesses normally capture stdout.
        if io::stdout().is_terminal() {
            return;
        }
        assert!(matches!(setup_terminal(), Err(ReplicaError::Io(_))));
    }
}
