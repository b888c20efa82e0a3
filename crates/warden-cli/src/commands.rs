//! Shell command parsing.

use std::fmt;
use std::str::FromStr;

/// One line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Start sign-in, or finish it with the provider's callback URL
    SignIn { callback_url: Option<String> },
    AddGuardian,
    BeginRecovery,
    FinalizeRecovery,
    Guardians,
    Status,
    /// Move the simulated clock forward
    Advance { secs: u64 },
    Reset,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for ShellCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(ParseCommandError("empty command".into()));
        };
        let arg = words.next();
        if words.next().is_some() {
            return Err(ParseCommandError(format!("too many arguments for {name}")));
        }

        let command = match (name, arg) {
            ("sign-in" | "signin", callback) => Self::SignIn {
                callback_url: callback.map(str::to_string),
            },
            ("add-guardian", None) => Self::AddGuardian,
            ("begin-recovery", None) => Self::BeginRecovery,
            ("finalize-recovery", None) => Self::FinalizeRecovery,
            ("guardians", None) => Self::Guardians,
            ("status", None) => Self::Status,
            ("advance", Some(secs)) => Self::Advance {
                secs: secs
                    .parse()
                    .map_err(|_| ParseCommandError(format!("not a number of seconds: {secs}")))?,
            },
            ("advance", None) => {
                return Err(ParseCommandError("usage: advance <secs>".into()));
            }
            ("reset", None) => Self::Reset,
            ("help" | "?", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            (name, Some(_)) if KNOWN.contains(&name) => {
                return Err(ParseCommandError(format!("{name} takes no arguments")));
            }
            (name, _) => {
                return Err(ParseCommandError(format!(
                    "unknown command {name:?} (try `help`)"
                )));
            }
        };
        Ok(command)
    }
}

const KNOWN: &[&str] = &[
    "add-guardian",
    "begin-recovery",
    "finalize-recovery",
    "guardians",
    "status",
    "reset",
    "help",
    "quit",
];

pub const HELP: &str = "\
commands:
  sign-in [callback-url]  sign in with the identity provider
  add-guardian            register the guardian on the protected account (owner-signed)
  begin-recovery          propose recovery to the new owner (guardian-signed)
  finalize-recovery       finalize recovery after the grace period
  guardians               list guardians of the protected account
  status                  show session state and simulated time
  advance <secs>          move the simulated clock forward
  reset                   drop the session
  help                    show this help
  quit                    leave the shell";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions_and_arguments() {
        assert_eq!(
            "sign-in".parse::<ShellCommand>().unwrap(),
            ShellCommand::SignIn { callback_url: None }
        );
        assert_eq!(
            "sign-in http://localhost:5173/?provider=google"
                .parse::<ShellCommand>()
                .unwrap(),
            ShellCommand::SignIn {
                callback_url: Some("http://localhost:5173/?provider=google".into())
            }
        );
        assert_eq!(
            "  advance 259200 ".parse::<ShellCommand>().unwrap(),
            ShellCommand::Advance { secs: 259_200 }
        );
        assert_eq!(
            "finalize-recovery".parse::<ShellCommand>().unwrap(),
            ShellCommand::FinalizeRecovery
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<ShellCommand>().is_err());
        assert!("advance soon".parse::<ShellCommand>().is_err());
        assert!("add-guardian now".parse::<ShellCommand>().is_err());
        assert!("withdraw".parse::<ShellCommand>().is_err());
    }
}
