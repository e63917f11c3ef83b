use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    db::store::FirmStore,
    error::AppError,
    models::{
        auth::{LoginRequest, SignupRequest},
        firm::{Slug, UpdateAccountRequest},
        lead::NewLead,
    },
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub const SLUG_TAKEN: &str = "This firm URL is already taken";
pub const FIRM_EMAIL_TAKEN: &str = "A firm already uses this email";

/// Field-level validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Loose `something@domain.tld` check; the mailbox itself is never verified.
pub fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    match s.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn check_email(errors: &mut FieldErrors, field: &'static str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "Email is required");
    } else if !looks_like_email(value) {
        errors.add(field, "Email is invalid");
    }
}

pub fn validate_login(req: &LoginRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if req.email.trim().is_empty() {
        errors.add("email", "Email is required");
    }
    if req.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()
}

/// Validates the signup form and returns the parsed slug.
pub fn validate_signup(req: &SignupRequest) -> Result<Slug, FieldErrors> {
    let mut errors = FieldErrors::default();
    check_email(&mut errors, "email", &req.email);

    if req.password.is_empty() {
        errors.add("password", "Password is required");
    } else if req.password.len() < MIN_PASSWORD_LEN {
        errors.add("password", format!("Password must be at least {MIN_PASSWORD_LEN} characters"));
    }

    if req.firm_name.trim().is_empty() {
        errors.add("firm_name", "Firm name is required");
    }

    let slug = if req.firm_slug.is_empty() {
        errors.add("firm_slug", "Firm URL is required");
        None
    } else {
        match Slug::parse_for_signup(&req.firm_slug) {
            Ok(slug) => Some(slug),
            Err(e) => {
                errors.add("firm_slug", e.to_string());
                None
            }
        }
    };

    errors.into_result()?;
    slug.ok_or_else(FieldErrors::default)
}

/// Checks a validated signup against existing firms and pending signups.
///
/// The new firm takes the signup email as its contact email, which must be
/// unique across firms, so an email already listed by another firm is
/// rejected here rather than left to fail at provisioning.
pub async fn check_signup_available(
    firms: &dyn FirmStore,
    email: &str,
    slug: &Slug,
) -> Result<(), AppError> {
    let mut errors = FieldErrors::default();
    if firms.slug_taken(slug.as_str()).await? {
        errors.add("firm_slug", SLUG_TAKEN);
    }
    if firms.find_by_owner_email(email).await?.is_some() {
        errors.add("email", FIRM_EMAIL_TAKEN);
    }
    Ok(errors.into_result()?)
}

pub fn validate_lead(lead: &NewLead) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if lead.full_name.trim().is_empty() {
        errors.add("full_name", "Full name is required");
    }
    check_email(&mut errors, "email", &lead.email);
    if lead.phone.trim().is_empty() {
        errors.add("phone", "Phone number is required");
    }
    errors.into_result()
}

/// Password fields are only checked when at least one of them is filled in.
pub fn validate_account_update(req: &UpdateAccountRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if req.firm_name.trim().is_empty() {
        errors.add("firm_name", "Firm name is required");
    }
    check_email(&mut errors, "email", &req.email);

    let current = req.current_password.as_deref().unwrap_or_default();
    let new = req.new_password.as_deref().unwrap_or_default();
    let confirm = req.confirm_password.as_deref().unwrap_or_default();

    if !current.is_empty() || !new.is_empty() || !confirm.is_empty() {
        if current.is_empty() {
            errors.add("current_password", "Current password is required");
        }
        if new.is_empty() {
            errors.add("new_password", "New password is required");
        } else if new.len() < MIN_PASSWORD_LEN {
            errors.add(
                "new_password",
                format!("New password must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }
        if confirm.is_empty() {
            errors.add("confirm_password", "Please confirm your new password");
        } else if new != confirm {
            errors.add("confirm_password", "Passwords do not match");
        }
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(email: &str, password: &str, name: &str, slug: &str) -> SignupRequest {
        SignupRequest {
            email: email.into(),
            password: password.into(),
            firm_name: name.into(),
            firm_slug: slug.into(),
        }
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("a@b.com"));
        assert!(looks_like_email("first.last@law-firm.co.uk"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.com"));
        assert!(!looks_like_email("a b@c.com"));
        assert!(!looks_like_email("a@b."));
    }

    #[test]
    fn valid_signup_yields_slug() {
        let slug = validate_signup(&signup("a@b.com", "secret1", "Acme", "acme")).unwrap();
        assert_eq!(slug.as_str(), "acme");
    }

    #[test]
    fn signup_reports_every_bad_field() {
        let errors = validate_signup(&signup("nope", "123", " ", "Smith_Jones")).unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is invalid"));
        assert_eq!(errors.get("password"), Some("Password must be at least 6 characters"));
        assert_eq!(errors.get("firm_name"), Some("Firm name is required"));
        assert!(errors.get("firm_slug").is_some());
    }

    #[test]
    fn signup_requires_slug() {
        let errors = validate_signup(&signup("a@b.com", "secret1", "Acme", "")).unwrap_err();
        assert_eq!(errors.get("firm_slug"), Some("Firm URL is required"));
    }

    #[tokio::test]
    async fn signup_email_used_by_a_firm_is_rejected() {
        let store = crate::testing::MemoryStore::new();
        store.add_firm("Globex", "globex", "a@b.com");
        let slug = Slug::parse_for_signup("acme").unwrap();

        match check_signup_available(&store, "a@b.com", &slug).await {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("email"), Some(FIRM_EMAIL_TAKEN));
                assert_eq!(errors.get("firm_slug"), None);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(check_signup_available(&store, "c@d.com", &slug).await.is_ok());

        let taken = Slug::parse_for_signup("globex").unwrap();
        match check_signup_available(&store, "c@d.com", &taken).await {
            Err(AppError::Validation(errors)) => assert_eq!(errors.get("firm_slug"), Some(SLUG_TAKEN)),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn lead_requires_all_fields() {
        let lead = NewLead { full_name: "".into(), email: "x".into(), phone: " ".into() };
        let errors = validate_lead(&lead).unwrap_err();
        assert_eq!(errors.get("full_name"), Some("Full name is required"));
        assert_eq!(errors.get("email"), Some("Email is invalid"));
        assert_eq!(errors.get("phone"), Some("Phone number is required"));
    }

    #[test]
    fn password_fields_only_checked_when_present() {
        let mut req = UpdateAccountRequest {
            firm_name: "Acme".into(),
            email: "a@b.com".into(),
            current_password: None,
            new_password: None,
            confirm_password: None,
        };
        assert!(validate_account_update(&req).is_ok());

        req.new_password = Some("newpass".into());
        req.confirm_password = Some("different".into());
        let errors = validate_account_update(&req).unwrap_err();
        assert_eq!(errors.get("current_password"), Some("Current password is required"));
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
        assert_eq!(errors.get("new_password"), None);
    }
}
