//! Authentication commands.

use super::prompt;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_session::{AuthError, SessionLifecycleController, SignupData};
use serde_json::json;

/// Profile fields collected from the command line for `signup`.
pub struct SignupArgs {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Login with username and password.
pub async fn login(
    controller: &SessionLifecycleController,
    username: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    if let Some(user) = controller.user().filter(|_| controller.is_authenticated()) {
        output::print_success(&format!("Already logged in as {}", user.username), format);
        return Ok(());
    }

    let username = match username {
        Some(username) => username.to_string(),
        None => prompt("Username: ")?,
    };
    if username.is_empty() {
        output::print_error("Username is required", format);
        return Ok(());
    }

    // Prompt for password (hidden)
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    match controller.login(&username, &password).await {
        Ok(navigation) => match format {
            OutputFormat::Text => println!("Logged in as {}", username),
            OutputFormat::Json => output::print_json(&json!({
                "status": "success",
                "username": username,
                "navigate_to": navigation.path(),
            })),
        },
        Err(AuthError::InvalidCredentials(message)) => {
            output::print_error(&format!("Login failed: {}", message), format);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Create an account, then log in with it.
pub async fn signup(
    controller: &SessionLifecycleController,
    args: SignupArgs,
    format: &OutputFormat,
) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }
    let confirmation = rpassword::prompt_password("Confirm password: ")?;
    if confirmation != password {
        output::print_error("Passwords do not match", format);
        return Ok(());
    }

    let data = SignupData {
        username: args.username,
        password,
        email: args.email,
        first_name: args.first_name,
        last_name: args.last_name,
    };

    match controller.signup(&data).await {
        Ok(_) => output::print_success(
            &format!("Account created. Logged in as {}", data.username),
            format,
        ),
        Err(AuthError::SignupFailed(message)) => {
            output::print_error(&format!("Signup failed: {}", message), format);
        }
        Err(AuthError::InvalidCredentials(message)) => {
            output::print_error(
                &format!("Account created but login failed: {}", message),
                format,
            );
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Logout and clear the stored session.
pub fn logout(controller: &SessionLifecycleController, format: &OutputFormat) -> Result<()> {
    controller.logout();
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Check authentication status.
pub fn status(controller: &SessionLifecycleController, format: &OutputFormat) -> Result<()> {
    let snapshot = controller.snapshot();

    match format {
        OutputFormat::Text => {
            if let Some(user) = snapshot.user.as_ref().filter(|_| snapshot.is_authenticated()) {
                output::print_row("Auth", "logged in");
                output::print_row("User", &user.username);
                output::print_row("User ID", &user.id);
                if !user.email.is_empty() {
                    output::print_row("Email", &user.email);
                }
                let expires = snapshot
                    .access_token_expiry
                    .map(|expiry| expiry.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                output::print_row("Expires", &expires);
            } else {
                output::print_row("Auth", "not logged in");
            }
        }
        OutputFormat::Json => {
            output::print_json(&json!({
                "logged_in": snapshot.is_authenticated(),
                "token_valid": controller.is_token_valid(),
                "session": snapshot,
            }));
        }
    }

    Ok(())
}
