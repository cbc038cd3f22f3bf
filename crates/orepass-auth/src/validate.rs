//! Input validation for registration and role management.
//!
//! Everything here is rejected before reaching storage, and every
//! rejection names the violated rule. The rules mirror the schema's
//! CHECK constraints so the database never sees input it would
//! refuse.

use orepass_core::error::{OrepassError, OrepassResult};

/// Structural email check: one `@`, a non-empty local part, and a
/// domain with a TLD of at least two letters.
pub fn validate_email(email: &str) -> OrepassResult<()> {
    let valid = email.len() <= 255
        && !email.chars().any(char::is_whitespace)
        && email.split('@').count() == 2
        && {
            let (local, domain) = email.split_once('@').unwrap_or(("", ""));
            !local.is_empty()
                && domain.contains('.')
                && domain
                    .rsplit('.')
                    .next()
                    .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
        };

    if valid {
        Ok(())
    } else {
        Err(OrepassError::Validation(
            "email must be a valid address like name@example.com".into(),
        ))
    }
}

/// Usernames are 3..=100 characters from `[A-Za-z0-9_-]`.
pub fn validate_username(username: &str) -> OrepassResult<()> {
    let valid = (3..=100).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(OrepassError::Validation(
            "username must be 3+ characters of letters, digits, '-' or '_'".into(),
        ))
    }
}

/// Passwords must meet the configured minimum length and contain at
/// least one letter and one digit.
pub fn validate_password(password: &str, min_length: usize) -> OrepassResult<()> {
    if password.len() < min_length {
        return Err(OrepassError::Validation(format!(
            "password must be at least {min_length} characters"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic())
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(OrepassError::Validation(
            "password must contain at least one letter and one digit".into(),
        ));
    }
    Ok(())
}

/// Role names are 1..=50 characters of upper-case letters and
/// underscores.
pub fn validate_role_name(name: &str) -> OrepassResult<()> {
    let valid = (1..=50).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_uppercase() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(OrepassError::Validation(
            "role name must be upper-case letters and underscores".into(),
        ))
    }
}

/// Role priorities live in 0..=1000.
pub fn validate_role_priority(priority: i64) -> OrepassResult<()> {
    if (0..=1000).contains(&priority) {
        Ok(())
    } else {
        Err(OrepassError::Validation(
            "role priority must be between 0 and 1000".into(),
        ))
    }
}
