use std::io::{self, Write};

use anyhow::{bail, Result};
use chrono::Local;
use tracing::warn;

use shopkeep_core::{Config, Route, SessionManager, SessionSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Signup(Option<String>),
    Login(Option<String>),
    Logout,
    Status,
    Watch,
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = match args.split_first() {
            Some((name, rest)) => (name.as_str(), rest),
            None => return Ok(Command::Help),
        };

        let command = match name {
            "signup" => Command::Signup(rest.first().cloned()),
            "login" => Command::Login(rest.first().cloned()),
            "logout" => Command::Logout,
            "status" => Command::Status,
            "watch" => Command::Watch,
            "help" | "-h" | "--help" => Command::Help,
            other => bail!("Unknown command: {}", other),
        };

        let max_args = match command {
            Command::Signup(_) | Command::Login(_) => 1,
            _ => 0,
        };
        if rest.len() > max_args {
            bail!("Too many arguments for {}", name);
        }
        Ok(command)
    }
}

pub async fn run(command: Command, manager: &SessionManager, config: &mut Config) -> Result<()> {
    match command {
        Command::Signup(email) => authenticate(manager, config, email, true).await,
        Command::Login(email) => authenticate(manager, config, email, false).await,
        Command::Logout => {
            manager.logout()?;
            println!("Logged out.");
            Ok(())
        }
        Command::Status => {
            print_status(&manager.snapshot());
            Ok(())
        }
        Command::Watch => watch(manager).await,
        Command::Help => Ok(()),
    }
}

async fn authenticate(
    manager: &SessionManager,
    config: &mut Config,
    email: Option<String>,
    signup: bool,
) -> Result<()> {
    // Fail before prompting rather than after the password is typed
    config.api_key()?;

    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    if email.is_empty() {
        bail!("Email required");
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password required");
    }

    println!("\nAuthenticating...");
    let result = if signup {
        manager.signup(&email, &password).await
    } else {
        manager.login(&email, &password).await
    };

    let session = match result {
        Ok(session) => session,
        Err(e) => {
            // The user sees the short message; details go to the log
            warn!(error = %e, "Authentication failed");
            bail!("{}", e.user_message());
        }
    };

    if let Err(e) = config.remember_last_email(&email) {
        warn!(error = %e, "Failed to save last email");
    }

    println!(
        "Logged in as {} (session expires {})",
        session.user_id,
        session.expiry_date.with_timezone(&Local).format("%H:%M:%S")
    );
    Ok(())
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last_email) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

fn print_status(snapshot: &SessionSnapshot) {
    let route = Route::from_snapshot(snapshot);
    println!("Route: {}", route.label());
    match (&snapshot.user_id, snapshot.expiry_date) {
        (Some(user_id), Some(expiry)) if snapshot.is_authenticated() => {
            let minutes = (expiry - chrono::Utc::now()).num_minutes().max(0);
            println!("User: {}", user_id);
            println!(
                "Expires: {} ({}m left)",
                expiry.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                minutes
            );
        }
        _ => println!("Not logged in."),
    }
}

async fn watch(manager: &SessionManager) -> Result<()> {
    let mut rx = manager.subscribe();
    let mut route = Route::from_snapshot(&rx.borrow_and_update());
    print_status(&manager.snapshot());

    if route != Route::Shop {
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = Route::from_snapshot(&rx.borrow_and_update());
                if next != route {
                    println!("Route: {} -> {}", route.label(), next.label());
                    route = next;
                }
                if route != Route::Shop {
                    println!("Session ended.");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&args(&[])).unwrap(), Command::Help);
        assert_eq!(
            Command::parse(&args(&["login", "a@b.c"])).unwrap(),
            Command::Login(Some("a@b.c".into()))
        );
        assert_eq!(Command::parse(&args(&["signup"])).unwrap(), Command::Signup(None));
        assert_eq!(Command::parse(&args(&["logout"])).unwrap(), Command::Logout);
        assert_eq!(Command::parse(&args(&["watch"])).unwrap(), Command::Watch);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&args(&["dance"])).is_err());
        assert!(Command::parse(&args(&["logout", "now"])).is_err());
        assert!(Command::parse(&args(&["login", "a", "b"])).is_err());
    }
}
