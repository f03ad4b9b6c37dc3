use serde::Serialize;

pub const PHONE_DIGITS: usize = 10;
pub const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("phone number must contain at least 10 digits")]
    InvalidPhone,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("phone or email required")]
    Missing,
}

/// The normalized uniqueness key for "one spin per customer". At least one
/// channel is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpinIdentity {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl SpinIdentity {
    /// Canonicalize raw request inputs. Empty or whitespace-only values are
    /// treated as absent; both absent is `Missing`.
    pub fn from_raw(phone: Option<&str>, email: Option<&str>) -> Result<Self, IdentityError> {
        let phone = match phone.map(str::trim).filter(|p| !p.is_empty()) {
            Some(raw) => Some(normalize_phone(raw)?),
            None => None,
        };
        let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(raw) => Some(normalize_email(raw)?),
            None => None,
        };
        if phone.is_none() && email.is_none() {
            return Err(IdentityError::Missing);
        }
        Ok(Self { phone, email })
    }
}

/// Strip everything but digits and keep the last ten, so "+1 (555) 123-4567"
/// and "5551234567" key the same customer.
pub fn normalize_phone(raw: &str) -> Result<String, IdentityError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < PHONE_DIGITS {
        return Err(IdentityError::InvalidPhone);
    }
    Ok(digits[digits.len() - PHONE_DIGITS..].to_string())
}

pub fn normalize_email(raw: &str) -> Result<String, IdentityError> {
    let trimmed = raw.trim();
    if !trimmed.contains('@') || trimmed.len() > MAX_EMAIL_LEN {
        return Err(IdentityError::InvalidEmail);
    }
    Ok(trimmed.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_keeps_last_ten_digits() {
        assert_eq!(normalize_phone("+1 (555) 123-4567").unwrap(), "5551234567");
        assert_eq!(normalize_phone("5551234567").unwrap(), "5551234567");
        assert_eq!(normalize_phone("15551234567").unwrap(), "5551234567");
    }

    #[test]
    fn short_phone_rejected() {
        assert_eq!(normalize_phone("555-1234").unwrap_err(), IdentityError::InvalidPhone);
        assert_eq!(normalize_phone("").unwrap_err(), IdentityError::InvalidPhone);
    }

    #[test]
    fn email_lowercased_and_trimmed() {
        assert_eq!(normalize_email("  Jane@Example.COM ").unwrap(), "jane@example.com");
        assert_eq!(normalize_email("no-at-sign").unwrap_err(), IdentityError::InvalidEmail);
    }

    #[test]
    fn identity_requires_at_least_one_channel() {
        assert_eq!(
            SpinIdentity::from_raw(None, None).unwrap_err(),
            IdentityError::Missing
        );
        assert_eq!(
            SpinIdentity::from_raw(Some("  "), Some("")).unwrap_err(),
            IdentityError::Missing
        );
        let identity = SpinIdentity::from_raw(Some("555-123-4567"), None).unwrap();
        assert_eq!(identity.phone.as_deref(), Some("5551234567"));
        assert!(identity.email.is_none());
    }
}
