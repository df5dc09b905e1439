//! Input validation for registration, profile edits and password changes.

use std::sync::LazyLock;

use libra_core::models::profile::ProfileUpdate;
use libra_core::models::role::Role;
use regex::Regex;

use crate::error::AuthError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[\d\s()-]{8,20}$").expect("phone pattern"));

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail)
    }
}

/// Phone numbers are mandatory: an empty value is rejected before the
/// format is checked.
pub fn validate_phone(phone: &str) -> Result<(), AuthError> {
    if phone.is_empty() {
        return Err(AuthError::PhoneRequired);
    }
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(AuthError::InvalidPhone)
    }
}

pub fn validate_new_password(
    password: &str,
    confirm: &str,
    min_length: usize,
) -> Result<(), AuthError> {
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    if password.chars().count() < min_length {
        return Err(AuthError::PasswordTooShort { min: min_length });
    }
    Ok(())
}

/// Only the fields being changed are checked.
pub fn validate_profile_update(update: &ProfileUpdate) -> Result<(), AuthError> {
    if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(AuthError::NameRequired);
    }
    if let Some(email) = &update.email {
        validate_email(email)?;
    }
    if let Some(phone) = &update.phone {
        validate_phone(phone)?;
    }
    Ok(())
}

/// Registration form.
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: String,
    pub role: Role,
}

impl SignUpForm {
    pub fn validate(&self, min_password_length: usize) -> Result<(), AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::NameRequired);
        }
        validate_email(&self.email)?;
        validate_phone(&self.phone)?;
        validate_new_password(&self.password, &self.confirm_password, min_password_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(validate_email("reader@library.org").is_ok());
        assert!(validate_email("a.b+c@sub.example.co").is_ok());
        assert!(matches!(
            validate_email("no-at-sign.org"),
            Err(AuthError::InvalidEmail)
        ));
        assert!(validate_email("two words@example.com").is_err());
        assert!(validate_email("missing@tld").is_err());
    }

    #[test]
    fn phone_is_required_then_formatted() {
        assert!(matches!(validate_phone(""), Err(AuthError::PhoneRequired)));
        assert!(validate_phone("+1 555-123-4567").is_ok());
        assert!(validate_phone("(555) 123 4567").is_ok());
        assert!(matches!(validate_phone("1234"), Err(AuthError::InvalidPhone)));
        assert!(matches!(
            validate_phone("555-CALL-NOW"),
            Err(AuthError::InvalidPhone)
        ));
        assert!(validate_phone("+123456789012345678901").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_new_password("secret1", "secret1", 6).is_ok());
        assert!(matches!(
            validate_new_password("secret1", "secret2", 6),
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            validate_new_password("abc", "abc", 6),
            Err(AuthError::PasswordTooShort { min: 6 })
        ));
    }

    #[test]
    fn mismatch_is_reported_before_length() {
        assert!(matches!(
            validate_new_password("a", "b", 6),
            Err(AuthError::PasswordMismatch)
        ));
    }

    #[test]
    fn profile_update_checks_only_present_fields() {
        assert!(validate_profile_update(&ProfileUpdate::default()).is_ok());
        let bad_phone = ProfileUpdate {
            phone: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            validate_profile_update(&bad_phone),
            Err(AuthError::PhoneRequired)
        ));
        let blank_name = ProfileUpdate {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(
            validate_profile_update(&blank_name),
            Err(AuthError::NameRequired)
        ));
    }

    #[test]
    fn sign_up_form() {
        let mut form = SignUpForm {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            password: "analytical".into(),
            confirm_password: "analytical".into(),
            phone: "+44 20 7946 0958".into(),
            role: Role::Student,
        };
        assert!(form.validate(6).is_ok());

        form.email = "ada".into();
        assert!(matches!(form.validate(6), Err(AuthError::InvalidEmail)));
    }
}
