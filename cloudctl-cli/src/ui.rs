//! Terminal interaction.
//!
//! Everything here writes to stderr so commands whose stdout is consumed
//! by `eval` (notably `switch`) stay clean. The engine talks to the user
//! only through [`UserPrompt`]; this is its terminal implementation.

use std::io::{self, BufRead, Write};

use cloudctl_core::error::CloudCtlError;
use cloudctl_core::UserPrompt;

const MAX_ATTEMPTS: usize = 3;

/// Terminal-backed [`UserPrompt`].
pub struct TermPrompt;

impl UserPrompt for TermPrompt {
    fn mfa_code(&self, mfa_arn: &str) -> Result<String, CloudCtlError> {
        for _ in 0..MAX_ATTEMPTS {
            eprint!("Enter MFA code for {mfa_arn}: ");
            flush_stderr()?;
            let code = read_line()?;
            if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
                return Ok(code);
            }
            eprintln!("MFA codes are six digits.");
        }
        Err(CloudCtlError::Cancelled)
    }

    fn confirm(&self, message: &str) -> Result<bool, CloudCtlError> {
        confirm(message)
    }
}

/// Plain y/N confirmation on stderr.
pub fn confirm(message: &str) -> Result<bool, CloudCtlError> {
    eprint!("{message} [y/N] ");
    flush_stderr()?;
    let answer = read_line()?;
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// Free-form input with an example placeholder.
pub fn input(prompt: &str, placeholder: &str) -> Result<String, CloudCtlError> {
    if placeholder.is_empty() {
        eprint!("{prompt}: ");
    } else {
        eprint!("{prompt} (e.g. {placeholder}): ");
    }
    flush_stderr()?;
    read_line()
}

/// Destructive-action gate: the user must type the literal word `yes`.
pub fn confirm_destructive(message: &str) -> Result<bool, CloudCtlError> {
    eprint!("{message} Type 'yes' to confirm: ");
    flush_stderr()?;
    Ok(read_line()? == "yes")
}

/// Numbered chooser over `options`; returns the selected entry.
pub fn select(title: &str, options: &[String]) -> Result<String, CloudCtlError> {
    if options.is_empty() {
        return Err(CloudCtlError::Cancelled);
    }

    eprintln!("{title}:");
    for (i, option) in options.iter().enumerate() {
        eprintln!("  {}. {option}", i + 1);
    }

    for _ in 0..MAX_ATTEMPTS {
        eprint!("Select [1-{}]: ", options.len());
        flush_stderr()?;
        let answer = read_line()?;
        if let Ok(index) = answer.parse::<usize>() {
            if (1..=options.len()).contains(&index) {
                return Ok(options[index - 1].clone());
            }
        }
        eprintln!("Enter a number between 1 and {}.", options.len());
    }
    Err(CloudCtlError::Cancelled)
}

/// Open a URL in the platform browser.
pub fn open_browser(url: &str) -> io::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        let mut c = std::process::Command::new("open");
        c.arg(url);
        c
    } else if cfg!(target_os = "linux") {
        let mut c = std::process::Command::new("xdg-open");
        c.arg(url);
        c
    } else if cfg!(target_os = "windows") {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", url]);
        c
    } else {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "no browser launcher for this platform",
        ));
    };
    command.spawn()?;
    Ok(())
}

fn read_line() -> Result<String, CloudCtlError> {
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(CloudCtlError::Io)?;
    if read == 0 {
        return Err(CloudCtlError::Cancelled);
    }
    Ok(line.trim().to_string())
}

fn flush_stderr() -> Result<(), CloudCtlError> {
    io::stderr().flush().map_err(CloudCtlError::Io)
}
