use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    db::store::AccountStore,
    error::AppError,
    models::{
        account::{Account, SignupProfile},
        auth::{Claims, Session},
    },
    services::provisioning::ProvisioningQueue,
};

#[cfg(not(test))]
const PASSWORD_HASH_COST: u32 = 12;
#[cfg(test)]
const PASSWORD_HASH_COST: u32 = 4;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct AuthService;

impl AuthService {
    /// Creates the account and hands its signup profile to the provisioner.
    /// The firm row is written later, by a separate step.
    pub async fn register(
        accounts: &dyn AccountStore,
        provisioning: &ProvisioningQueue,
        email: &str,
        password: &str,
        profile: &SignupProfile,
    ) -> Result<Account, AppError> {
        let email = normalize_email(email);
        if accounts.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("An account with this email already exists".into()));
        }

        let password_hash = bcrypt::hash(password, PASSWORD_HASH_COST)
            .map_err(|e| AppError::Backend(e.into()))?;

        // Loses to a concurrent signup on either the email or the pending slug.
        let account = accounts.insert(&email, &password_hash, Some(profile)).await?;

        provisioning.enqueue(account.id);
        tracing::info!(account = %account.id, slug = %profile.firm_slug, "account registered");
        Ok(account)
    }

    /// Creates an account with no signup profile (operators, admins).
    pub async fn create_plain_account(
        accounts: &dyn AccountStore,
        email: &str,
        password: &str,
    ) -> Result<Account, AppError> {
        let password_hash = bcrypt::hash(password, PASSWORD_HASH_COST)
            .map_err(|e| AppError::Backend(e.into()))?;
        Ok(accounts.insert(&normalize_email(email), &password_hash, None).await?)
    }

    pub async fn authenticate(
        accounts: &dyn AccountStore,
        email: &str,
        password: &str,
    ) -> Result<Account, AppError> {
        let account = accounts
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.into()))?;

        let valid = bcrypt::verify(password, &account.password_hash)
            .map_err(|_| AppError::Authentication(INVALID_CREDENTIALS.into()))?;
        if !valid {
            return Err(AppError::Authentication(INVALID_CREDENTIALS.into()));
        }
        Ok(account)
    }

    /// Updates login email and, when `new_password` is set, the password.
    /// `current_password` must match whenever the password changes.
    pub async fn update_credentials(
        accounts: &dyn AccountStore,
        account_id: Uuid,
        new_email: &str,
        current_password: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<(), AppError> {
        let account = accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AppError::NotFound("account"))?;

        let password_hash = match new_password.filter(|p| !p.is_empty()) {
            Some(new_password) => {
                let current = current_password.unwrap_or_default();
                let valid = bcrypt::verify(current, &account.password_hash).unwrap_or(false);
                if !valid {
                    return Err(AppError::Authentication("Current password is incorrect".into()));
                }
                Some(
                    bcrypt::hash(new_password, PASSWORD_HASH_COST)
                        .map_err(|e| AppError::Backend(e.into()))?,
                )
            }
            None => None,
        };

        accounts
            .update_credentials(account.id, &normalize_email(new_email), password_hash.as_deref())
            .await?;
        Ok(())
    }

    pub fn issue_session(account: &Account, secret: &str, ttl_seconds: u64) -> anyhow::Result<Session> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        session_from_claims(token, &claims)
    }
}

pub fn decode_session_token(token: &str, secret: &str) -> anyhow::Result<Session> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &key, &validation)?;
    session_from_claims(token.to_string(), &data.claims)
}

fn session_from_claims(access_token: String, claims: &Claims) -> anyhow::Result<Session> {
    let expires_at = Utc
        .timestamp_opt(claims.exp as i64, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("token expiry out of range"))?;
    Ok(Session {
        access_token,
        account_id: claims.sub.parse()?,
        email: claims.email.clone(),
        expires_at,
    })
}
