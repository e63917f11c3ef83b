use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::store::{AccountStore, FirmStore, LeadStore, MembershipStore, StoreResult};
use crate::models::{
    account::{Account, SignupProfile},
    firm::{Firm, FirmOverview},
    lead::{Lead, NewLead},
    principal::{FirmRef, MembershipRecord, Role},
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FIRM_COLUMNS: &str = "id, name, slug, email, created_at, updated_at";
const ACCOUNT_COLUMNS: &str =
    "id, email, password_hash, pending_firm_name, pending_firm_slug, created_at";

#[async_trait]
impl FirmStore for PgStore {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Firm>> {
        let firm = sqlx::query_as::<_, Firm>(&format!(
            "SELECT {FIRM_COLUMNS} FROM firms WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(firm)
    }

    async fn find_by_owner_email(&self, email: &str) -> StoreResult<Option<Firm>> {
        let firm = sqlx::query_as::<_, Firm>(&format!(
            "SELECT {FIRM_COLUMNS} FROM firms WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(firm)
    }

    async fn slug_taken(&self, slug: &str) -> StoreResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM firms WHERE slug = $1)
                 OR EXISTS(SELECT 1 FROM accounts WHERE pending_firm_slug = $1)",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn list_overview(&self) -> StoreResult<Vec<FirmOverview>> {
        let rows = sqlx::query_as::<_, FirmOverview>(
            "SELECT f.id, f.name, f.email, f.slug,
                    COUNT(l.id)::BIGINT AS lead_count,
                    f.created_at AS signed_up_at
             FROM firms f
             LEFT JOIN leads l ON l.firm_id = f.id
             GROUP BY f.id
             ORDER BY f.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_profile(&self, id: Uuid, name: &str, email: &str) -> StoreResult<Firm> {
        let firm = sqlx::query_as::<_, Firm>(&format!(
            "UPDATE firms SET name = $2, email = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING {FIRM_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(firm)
    }

    async fn provision_for_account(
        &self,
        account_id: Uuid,
        owner_email: &str,
        profile: &SignupProfile,
    ) -> StoreResult<Firm> {
        let mut tx = self.pool.begin().await?;

        let firm = sqlx::query_as::<_, Firm>(&format!(
            "INSERT INTO firms (name, slug, email)
             VALUES ($1, $2, $3)
             RETURNING {FIRM_COLUMNS}"
        ))
        .bind(profile.firm_name.trim())
        .bind(&profile.firm_slug)
        .bind(owner_email)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO memberships (account_id, firm_id, role)
             VALUES ($1, $2, $3)
             ON CONFLICT (account_id) DO UPDATE SET firm_id = EXCLUDED.firm_id",
        )
        .bind(account_id)
        .bind(firm.id)
        .bind(Role::TenantMember.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE accounts
             SET pending_firm_name = NULL, pending_firm_slug = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(firm)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn find_for_account(&self, account_id: Uuid) -> StoreResult<Option<MembershipRecord>> {
        // role is fetched as TEXT and parsed into the closed Role enum
        let row: Option<(Uuid, String, Option<Uuid>, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT m.account_id, m.role, f.id, f.name, f.slug
                 FROM memberships m
                 LEFT JOIN firms f ON f.id = m.firm_id
                 WHERE m.account_id = $1",
            )
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some((account_id, role, firm_id, firm_name, firm_slug)) = row else {
            return Ok(None);
        };

        let firm = match (firm_id, firm_name, firm_slug) {
            (Some(id), Some(name), Some(slug)) => Some(FirmRef { id, name, slug }),
            _ => None,
        };

        Ok(Some(MembershipRecord {
            account_id,
            role: role.parse()?,
            firm,
        }))
    }

    async fn set_role(&self, account_id: Uuid, role: Role) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO memberships (account_id, role)
             VALUES ($1, $2)
             ON CONFLICT (account_id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(account_id)
        .bind(role.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LeadStore for PgStore {
    async fn insert(&self, firm_id: Uuid, lead: &NewLead) -> StoreResult<Lead> {
        let lead = sqlx::query_as::<_, Lead>(
            "INSERT INTO leads (firm_id, full_name, email, phone)
             VALUES ($1, $2, $3, $4)
             RETURNING id, firm_id, full_name, email, phone, submitted_at",
        )
        .bind(firm_id)
        .bind(lead.full_name.trim())
        .bind(lead.email.trim())
        .bind(lead.phone.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(lead)
    }

    async fn list_for_firm(&self, firm_id: Uuid) -> StoreResult<Vec<Lead>> {
        let leads = sqlx::query_as::<_, Lead>(
            "SELECT id, firm_id, full_name, email, phone, submitted_at
             FROM leads WHERE firm_id = $1
             ORDER BY submitted_at DESC",
        )
        .bind(firm_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(leads)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn insert(
        &self,
        email: &str,
        password_hash: &str,
        profile: Option<&SignupProfile>,
    ) -> StoreResult<Account> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (email, password_hash, pending_firm_name, pending_firm_slug)
             VALUES ($1, $2, $3, $4)
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(profile.map(|p| p.firm_name.trim()))
        .bind(profile.map(|p| p.firm_slug.as_str()))
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    async fn update_credentials(
        &self,
        id: Uuid,
        email: &str,
        password_hash: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE accounts SET
               email = $2,
               password_hash = COALESCE($3, password_hash),
               updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_pending(&self) -> StoreResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE pending_firm_slug IS NOT NULL AND pending_firm_name IS NOT NULL
             ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }
}
