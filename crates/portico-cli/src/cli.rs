//! Command-line argument parsing.

use anyhow::{anyhow, Result};

pub const USAGE: &str = "\
Usage: portico [COMMAND]

Commands:
  status [--json]   Show who is signed in (default)
  login [EMAIL]     Sign in and store the issued token
  register          Create an account and sign in
  logout            Forget the stored token
  header            Print the Authorization header for API calls
  get PATH          Authenticated GET against the API, printing JSON
  help              Show this message

Environment:
  PORTICO_API_URL   Authentication API base URL
  PORTICO_EMAIL     Email used by `login` when none is given
  PORTICO_PASSWORD  Password used by `login` instead of prompting
  PORTICO_LOG_DIR   Write logs to this directory instead of stderr
  RUST_LOG          Log filter (default: warn)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status { json: bool },
    Login { email: Option<String> },
    Register,
    Logout,
    Header,
    Get { path: String },
    Help,
}

/// Parse arguments, excluding the program name
pub fn parse_args(args: &[String]) -> Result<Command> {
    let mut iter = args.iter().map(String::as_str);
    let command = match iter.next() {
        None | Some("status") => {
            let json = match iter.next() {
                None => false,
                Some("--json") => true,
                Some(other) => return Err(anyhow!("Unknown option for status: {}", other)),
            };
            Command::Status { json }
        }
        Some("--json") => Command::Status { json: true },
        Some("login") => Command::Login {
            email: iter.next().map(str::to_string),
        },
        Some("register") => Command::Register,
        Some("logout") => Command::Logout,
        Some("header") => Command::Header,
        Some("get") => {
            let path = iter
                .next()
                .ok_or_else(|| anyhow!("get requires a PATH"))?;
            Command::Get {
                path: path.to_string(),
            }
        }
        Some("help") | Some("--help") | Some("-h") => Command::Help,
        Some(other) => return Err(anyhow!("Unknown command: {}", other)),
    };

    if let Some(extra) = iter.next() {
        return Err(anyhow!("Unexpected argument: {}", extra));
    }
    Ok(command)
}
