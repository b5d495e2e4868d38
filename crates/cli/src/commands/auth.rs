//! Login and logout.

use campus_eats_client::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use campus_eats_client::{AppError, AppState};

/// Sign in and store the session.
pub async fn login(state: &AppState, email: &str, password: Option<&str>) -> Result<(), AppError> {
    let password = password.ok_or_else(|| {
        AppError::BadRequest(
            "password required: pass --password or set CAMPUS_EATS_PASSWORD".to_string(),
        )
    })?;

    let session = state
        .sessions()
        .login(state.backend(), email, password)
        .await?;

    let email = session.user.email.as_ref().map(|e| e.as_str().to_string());
    set_sentry_user(&session.user_id(), email.as_deref());
    add_breadcrumb("auth", "Logged in", None);

    println!("Logged in as {}.", email.as_deref().unwrap_or("(no email)"));
    Ok(())
}

/// Forget the stored session.
pub fn logout(state: &AppState) {
    state.sessions().clear();
    clear_sentry_user();
    println!("Logged out.");
}
