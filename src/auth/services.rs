use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{FieldErrors, LoginForm, RegisterForm};

pub const NAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 255;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 100;

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const ACCOUNT_BLOCKED: &str = "Your account has been blocked";
pub const EMAIL_TAKEN: &str =
    "This email is already registered. Please use a different email or try logging in.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if email.chars().count() > EMAIL_MAX {
        errors.add("email", format!("Email cannot exceed {EMAIL_MAX} characters"));
    } else if !is_valid_email(email) {
        errors.add("email", "Invalid email address");
    }
}

/// Trim and normalize in place, then report every field problem.
pub fn validate_registration(form: &mut RegisterForm) -> FieldErrors {
    form.name = form.name.trim().to_string();
    form.email = normalize_email(&form.email);

    let mut errors = FieldErrors::new();
    if form.name.is_empty() {
        errors.add("name", "Name is required");
    } else if form.name.chars().count() > NAME_MAX {
        errors.add("name", format!("Name cannot exceed {NAME_MAX} characters"));
    }

    check_email(&form.email, &mut errors);

    let password_len = form.password.chars().count();
    if form.password.is_empty() {
        errors.add("password", "Password is required");
    } else if password_len < PASSWORD_MIN {
        errors.add(
            "password",
            format!("Password must be at least {PASSWORD_MIN} characters"),
        );
    } else if password_len > PASSWORD_MAX {
        errors.add(
            "password",
            format!("Password cannot exceed {PASSWORD_MAX} characters"),
        );
    }

    if form.confirm_password.is_empty() {
        errors.add("confirm_password", "Please confirm your password");
    } else if form.confirm_password != form.password {
        errors.add("confirm_password", "Passwords do not match");
    }
    errors
}

pub fn validate_login(form: &mut LoginForm) -> FieldErrors {
    form.email = normalize_email(&form.email);

    let mut errors = FieldErrors::new();
    check_email(&form.email, &mut errors);
    if form.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("a@b.io"));
        assert!(is_valid_email("first.last+tag@example.co.uk"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn valid_registration_is_normalized() {
        let mut f = form("  Ada  ", "  Ada@Example.COM ", "secret", "secret");
        assert!(validate_registration(&mut f).is_empty());
        assert_eq!(f.name, "Ada");
        assert_eq!(f.email, "ada@example.com");
    }

    #[test]
    fn registration_reports_each_field() {
        let mut f = form("   ", "nope", "12345", "54321");
        let errors = validate_registration(&mut f);
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("email"), Some("Invalid email address"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters")
        );
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
    }

    #[test]
    fn registration_length_limits() {
        let long_name = "n".repeat(NAME_MAX + 1);
        let long_email = format!("{}@example.com", "e".repeat(EMAIL_MAX));
        let long_password = "p".repeat(PASSWORD_MAX + 1);
        let mut f = form(&long_name, &long_email, &long_password, &long_password);
        let errors = validate_registration(&mut f);
        assert_eq!(errors.get("name"), Some("Name cannot exceed 100 characters"));
        assert_eq!(errors.get("email"), Some("Email cannot exceed 255 characters"));
        assert_eq!(
            errors.get("password"),
            Some("Password cannot exceed 100 characters")
        );
        assert!(errors.get("confirm_password").is_none());

        let max_password = "p".repeat(PASSWORD_MAX);
        let mut f = form(&"n".repeat(NAME_MAX), "a@b.io", &max_password, &max_password);
        assert!(validate_registration(&mut f).is_empty());
    }

    #[test]
    fn login_requires_email_and_password() {
        let mut f = LoginForm {
            email: " ".into(),
            password: String::new(),
        };
        let errors = validate_login(&mut f);
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(errors.get("password"), Some("Password is required"));
    }
}
