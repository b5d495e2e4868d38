//! Sign-in password validation.
//!
//! The password only lives long enough to be sent to the identity service.
//! It is held as a [`SecretString`] so it never shows up in `Debug` output.

use secrecy::SecretString;

/// Errors that can occur when validating a [`Password`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Password must be at least {min} characters.")]
    TooShort { min: usize },
}

/// A password that passed the sign-in length rule.
#[derive(Debug, Clone)]
pub struct Password(SecretString);

impl Password {
    /// Minimum accepted length, in characters.
    pub const MIN_LENGTH: usize = 6;

    /// Validate a password.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordError::TooShort`] below [`Self::MIN_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, PasswordError> {
        if s.chars().count() < Self::MIN_LENGTH {
            return Err(PasswordError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        Ok(Self(SecretString::from(s)))
    }

    #[must_use]
    pub const fn secret(&self) -> &SecretString {
        &self.0
    }
}

impl From<Password> for SecretString {
    fn from(password: Password) -> Self {
        password.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_minimum_length() {
        assert!(matches!(
            Password::parse("12345"),
            Err(PasswordError::TooShort { min: 6 })
        ));
        assert_eq!(
            Password::parse("123456").unwrap().secret().expose_secret(),
            "123456"
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        assert!(Password::parse("ééééé").is_err());
        assert!(Password::parse("éééééé").is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let password = Password::parse("hunter22").unwrap();
        let debug_output = format!("{password:?}");
        assert!(!debug_output.contains("hunter22"));
        assert!(debug_output.contains("REDACTED"));
    }
}
