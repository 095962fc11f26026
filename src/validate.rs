//! Field validation for contact bundles.
//!
//! Every rule is checked; a bundle is rejected with the full list of failing
//! fields rather than the first one.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::contact::ContactFields;

/// Mobile prefixes accepted in front of the 8 subscriber digits.
pub const PHONE_PREFIXES: [&str; 4] = ["010", "011", "012", "015"];

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z\s]{2,50}$").expect("name pattern is valid")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    // ASCII digits only; `\d` would also accept other scripts' digits.
    let pattern = format!(r"^({})[0-9]{{8}}$", PHONE_PREFIXES.join("|"));
    Regex::new(&pattern).expect("phone pattern is valid")
});

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Phone,
    Email,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Phone => "phone",
            Field::Email => "email",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .field.as_str())]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

/// All fields that failed validation, in form order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    #[cfg(test)]
    pub fn fields(&self) -> Vec<Field> {
        self.0.iter().map(|e| e.field).collect()
    }
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn validate(fields: &ContactFields) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    if !is_valid_name(&fields.name) {
        errors.push(FieldError {
            field: Field::Name,
            message: "must be 2-50 letters or spaces",
        });
    }

    if !is_valid_phone(&fields.phone) {
        errors.push(FieldError {
            field: Field::Phone,
            message: "must be 010, 011, 012 or 015 followed by 8 digits",
        });
    }

    // An empty email is the same as no email.
    if let Some(email) = fields.email.as_deref().filter(|e| !e.is_empty()) {
        if !is_valid_email(email) {
            errors.push(FieldError {
                field: Field::Email,
                message: "must look like name@domain.tld",
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_rule() {
        assert!(is_valid_name("Jane Doe"));
        assert!(is_valid_name("Al"));
        assert!(!is_valid_name("J"));
        assert!(!is_valid_name("Jane Doe 2"));
        assert!(!is_valid_name("O'Brien"));
        assert!(!is_valid_name(&"a".repeat(51)));
        assert!(is_valid_name(&"a".repeat(50)));
    }

    #[test]
    fn test_phone_rule() {
        for prefix in PHONE_PREFIXES {
            assert!(is_valid_phone(&format!("{prefix}12345678")), "{prefix}");
        }
        assert!(!is_valid_phone("09911112222"));
        assert!(!is_valid_phone("0101234567"));
        assert!(!is_valid_phone("010123456789"));
        assert!(!is_valid_phone("0101234567a"));
        assert!(!is_valid_phone(""));
        // Arabic-Indic and fullwidth digits are not phone digits.
        assert!(!is_valid_phone("010\u{661}\u{662}\u{663}\u{664}\u{665}\u{666}\u{667}\u{668}"));
        assert!(!is_valid_phone("011\u{ff11}\u{ff12}\u{ff13}\u{ff14}\u{ff15}\u{ff16}\u{ff17}\u{ff18}"));
    }

    #[test]
    fn test_email_rule() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("jane.doe@mail.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@b.com"));
    }

    #[test]
    fn test_valid_bundle_passes() {
        let mut fields = ContactFields::new("Jane Doe", "01012345678");
        assert!(validate(&fields).is_ok());

        fields.email = Some(String::new());
        assert!(validate(&fields).is_ok());

        fields.email = Some("jane@example.com".into());
        assert!(validate(&fields).is_ok());
    }

    #[test]
    fn test_reports_every_failing_field() {
        let mut fields = ContactFields::new("J", "09911112222");
        fields.email = Some("not-an-email".into());

        let err = validate(&fields).unwrap_err();
        assert_eq!(err.fields(), vec![Field::Name, Field::Phone, Field::Email]);
        let text = err.to_string();
        assert!(text.contains("name:"));
        assert!(text.contains("phone:"));
        assert!(text.contains("email:"));
    }

    #[test]
    fn test_single_failure_reports_only_that_field() {
        let fields = ContactFields::new("Jane Doe", "09911112222");
        let err = validate(&fields).unwrap_err();
        assert_eq!(err.fields(), vec![Field::Phone]);
        assert_eq!(
            err.to_string(),
            "phone: must be 010, 011, 012 or 015 followed by 8 digits"
        );
    }
}
