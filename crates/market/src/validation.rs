//! Input checks applied before any state is read or written.

use validator::ValidateEmail;

/// Validates that the input looks like a valid email address.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Validates a contact phone number.
///
/// Accepts digits with an optional leading `+` and the usual separators
/// (spaces, dashes, dots, parentheses). Between 7 and 15 digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    let body = phone.strip_prefix('+').unwrap_or(phone);

    if body.is_empty()
        || !body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '.' | '(' | ')'))
    {
        return false;
    }

    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
}
