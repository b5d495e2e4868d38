//! Subcommand implementations.
//!
//! Each function prints its result to stdout and returns `AppError` on
//! failure; `main` turns the error into a message and exit code.

pub mod auth;
pub mod cart;
pub mod menu;
pub mod orders;
pub mod vendor;

use campus_eats_client::AppError;
use campus_eats_client::AppState;
use campus_eats_client::backend::Session;

/// The stored session, or `AppError::LoginRequired`.
fn require_session(state: &AppState) -> Result<Session, AppError> {
    state.session().ok_or(AppError::LoginRequired)
}
