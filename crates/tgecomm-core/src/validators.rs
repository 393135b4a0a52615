//! Input validation and masking helpers

use crate::errors::SessionError;

/// Parse `value` as a strictly positive integer
pub fn validate_positive_integer(value: &str, field_name: &str) -> Result<usize, SessionError> {
    let number: i64 = value
        .trim()
        .parse()
        .map_err(|_| SessionError::validation(format!("{} must be a valid integer", field_name)))?;

    if number <= 0 {
        return Err(SessionError::validation(format!(
            "{} must be a positive number",
            field_name
        )));
    }
    usize::try_from(number)
        .map_err(|_| SessionError::validation(format!("{} is too large", field_name)))
}

/// `+` followed by 10 to 15 digits
pub fn validate_phone_number(phone: &str) -> bool {
    match phone.strip_prefix('+') {
        Some(digits) => {
            (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// 5 to 32 characters of letters, digits and underscores, optional leading `@`
pub fn validate_username(username: &str) -> bool {
    let name = username.trim_start_matches('@');
    (5..=32).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Username, phone number or numeric chat id
pub fn validate_recipient(recipient: &str) -> bool {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return false;
    }

    if recipient.starts_with('@') {
        return validate_username(recipient);
    }
    if recipient.starts_with('+') {
        return validate_phone_number(recipient);
    }

    let unsigned = recipient.trim_start_matches('-');
    if !unsigned.is_empty() && unsigned.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    validate_username(recipient)
}

pub fn validate_api_id(api_id: &str) -> bool {
    let api_id = api_id.trim();
    !api_id.is_empty() && api_id.parse::<i64>().is_ok()
}

/// 32 hexadecimal characters
pub fn validate_api_hash(api_hash: &str) -> bool {
    let api_hash = api_hash.trim();
    api_hash.len() == 32 && api_hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Replace all but the last `visible_chars` characters with `*`
pub fn mask_sensitive_data(data: Option<&str>, visible_chars: usize) -> String {
    let data = match data {
        Some(d) if !d.is_empty() => d,
        _ => return "***".to_string(),
    };

    let len = data.chars().count();
    if len <= visible_chars {
        return "***".to_string();
    }

    let tail: String = data.chars().skip(len - visible_chars).collect();
    format!("{}{}", "*".repeat(len - visible_chars), tail)
}
