//! Application state for the portico terminal front-end.
//!
//! `App` wires configuration, the authentication API client and the single
//! session context of the run together, and implements the sign-in, sign-up
//! and sign-out flows on top of them.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, error, info, warn};

use portico_core::api::{ApiError, AuthClient};
use portico_core::auth::{SessionContext, SessionProvider, SessionState, SystemClock};
use portico_core::config::Config;
use portico_core::forms::{FieldError, LoginForm, RegistrationForm};

// ============================================================================
// Constants
// ============================================================================

const EMAIL_ENV: &str = "PORTICO_EMAIL";
const PASSWORD_ENV: &str = "PORTICO_PASSWORD";

pub struct App {
    pub config: Config,
    api: AuthClient,
    sessions: SessionProvider,
}

impl App {
    /// Create a new application instance and mount its session
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        let api = AuthClient::new(&config.api_base_url())?;
        debug!(origin = %api.origin(), storage = ?config.storage, "Config loaded");
        Ok(Self::with_parts(config, api))
    }

    pub fn with_parts(config: Config, api: AuthClient) -> Self {
        let app = Self {
            config,
            api,
            sessions: SessionProvider::new(),
        };
        let store = app.config.credential_store(app.api.origin());
        app.sessions.mount(store, Arc::new(SystemClock));
        app
    }

    pub fn session(&self) -> Result<&SessionContext> {
        Ok(self.sessions.session()?)
    }

    pub fn api(&self) -> &AuthClient {
        &self.api
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Submit a login form; on success the session is refreshed
    pub async fn attempt_login(&mut self, form: LoginForm) -> Result<SessionState> {
        form.validate().map_err(field_errors)?;

        let token = match self.api.login(&form).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Login failed");
                return Err(anyhow!(user_message(&e, "Login failed")));
            }
        };

        self.remember_email(&form.email);
        self.accept(&token)
    }

    /// Submit a registration form; on success the session is refreshed
    pub async fn attempt_register(&mut self, form: RegistrationForm) -> Result<SessionState> {
        form.validate().map_err(field_errors)?;

        let token = match self.api.register(&form).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Registration failed");
                return Err(anyhow!(user_message(&e, "Registration failed")));
            }
        };

        self.remember_email(&form.email);
        self.accept(&token)
    }

    pub fn logout(&self) -> Result<SessionState> {
        Ok(self.session()?.logout())
    }

    fn accept(&self, token: &str) -> Result<SessionState> {
        let session = self.session()?;
        let state = session.accept_token(token);
        if !state.is_logged_in() {
            if session.credentials().is_available() {
                warn!("Issued token did not produce a valid session");
            } else {
                warn!("No durable storage, session not kept");
            }
        }
        Ok(state)
    }

    fn remember_email(&mut self, email: &str) {
        self.config.last_email = Some(email.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    // =========================================================================
    // Prompts
    // =========================================================================

    /// Interactive login: email from argument, env, or prompt
    pub async fn login_interactive(&mut self, email: Option<String>) -> Result<SessionState> {
        let email = match email.or_else(|| std::env::var(EMAIL_ENV).ok()) {
            Some(email) => email,
            None => match self.config.last_email.clone() {
                Some(last) => {
                    let input = prompt(&format!("Email [{}]: ", last))?;
                    if input.is_empty() {
                        last
                    } else {
                        input
                    }
                }
                None => prompt("Email: ")?,
            },
        };

        let password = match std::env::var(PASSWORD_ENV) {
            Ok(password) => password,
            Err(_) => rpassword::prompt_password("Password: ")?,
        };

        println!("Signing in...");
        let state = self.attempt_login(LoginForm { email, password }).await?;
        info!(logged_in = state.is_logged_in(), "Interactive login finished");
        Ok(state)
    }

    pub async fn register_interactive(&mut self) -> Result<SessionState> {
        let form = RegistrationForm {
            name: prompt("Name: ")?,
            email: prompt("Email: ")?,
            password: rpassword::prompt_password("Password: ")?,
            confirm_password: rpassword::prompt_password("Confirm Password: ")?,
        };

        println!("Creating account...");
        self.attempt_register(form).await
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn field_errors(errors: Vec<FieldError>) -> anyhow::Error {
    let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    anyhow!(lines.join("\n"))
}

/// Message for the person at the keyboard
fn user_message(e: &anyhow::Error, fallback: &str) -> String {
    match e.downcast_ref::<ApiError>() {
        Some(api_error) => api_error.user_message(),
        None => format!("{}: {}", fallback, e),
    }
}

/// One-line description of a session state
pub fn describe(state: &SessionState) -> String {
    match state.user() {
        Some(user) => match &user.role {
            Some(role) => format!("Signed in as {} <{}> ({})", user.display_name(), user.email, role),
            None => format!("Signed in as {} <{}>", user.display_name(), user.email),
        },
        None => "Not signed in".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::auth::UserIdentity;
    use portico_core::config::StorageBackend;

    fn app() -> App {
        let config = Config {
            storage: StorageBackend::Memory,
            ..Default::default()
        };
        let api = AuthClient::new("http://127.0.0.1:9").expect("client");
        App::with_parts(config, api)
    }

    #[test]
    fn test_new_app_is_mounted_and_anonymous() {
        let app = app();
        let state = app.session().expect("mounted").state();
        assert!(!state.loading());
        assert!(!state.is_logged_in());
    }

    #[tokio::test]
    async fn test_invalid_form_is_not_submitted() {
        let mut app = app();
        let err = app
            .attempt_login(LoginForm {
                email: "not-an-email".to_string(),
                password: String::new(),
            })
            .await
            .expect_err("form should be rejected");
        let message = err.to_string();
        assert!(message.contains("Invalid email address"));
        assert!(message.contains("Password is required"));
        assert_eq!(app.config.last_email, None);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let app = app();
        assert!(!app.logout().expect("logout").is_logged_in());
        assert!(!app.logout().expect("logout").is_logged_in());
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&SessionState::anonymous()), "Not signed in");

        let user = UserIdentity {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            name: Some("Ada".to_string()),
            role: Some("admin".to_string()),
        };
        assert_eq!(
            describe(&SessionState::authenticated(user)),
            "Signed in as Ada <a@b.com> (admin)"
        );
    }

    #[test]
    fn test_user_message_falls_back() {
        let e = anyhow!("socket closed");
        assert_eq!(user_message(&e, "Login failed"), "Login failed: socket closed");

        let e: anyhow::Error = ApiError::Rejected("Invalid credentials".to_string()).into();
        assert_eq!(user_message(&e, "Login failed"), "Invalid credentials");
    }
}
