//! Postgres-backed credential store.
//!
//! Schema: `crates/infra/migrations/0001_credentials.sql`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` (message chosen by constraint name) |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / timeouts / IO | N/A | `Backend` |
//!
//! Partial updates bind every optional column and resolve it with
//! `COALESCE($n, col)`, so the statement text never depends on the input.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use assettag_auth::{Capability, Role};
use assettag_core::{CategoryId, CompanyId, UserId};

use super::r#trait::{
    CategoryPatch, CategoryRecord, CompanyPatch, CompanyRecord, CredentialStore, NewCategory,
    NewUser, Registered, RegistrationPlan, StoreError, UserPatch, UserRecord, conflict,
};

const COMPANY_COLUMNS: &str = "id, company_code, name, email, phone, address, industry, \
     subscription_plan, is_active, trial_ends_at, created_at, updated_at";

const USER_COLUMNS: &str = "id, company_id, username, email, password_hash, first_name, \
     last_name, role, is_active, last_login, created_at, updated_at";

const CATEGORY_COLUMNS: &str =
    "id, company_id, name, description, color, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self), err)]
    async fn company_by_code(&self, code: &str) -> Result<Option<CompanyRecord>, StoreError> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE company_code = $1");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("company_by_code", e))?;
        row.as_ref()
            .map(company_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("company_by_code", e))
    }

    #[instrument(skip(self), fields(company_id = %id), err)]
    async fn company(&self, id: CompanyId) -> Result<Option<CompanyRecord>, StoreError> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("company", e))?;
        row.as_ref()
            .map(company_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("company", e))
    }

    #[instrument(skip(self), err)]
    async fn company_code_exists(&self, code: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM companies WHERE company_code = $1) AS taken")
            .bind(code)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("company_code_exists", e))?;
        row.try_get("taken")
            .map_err(|e| map_sqlx_error("company_code_exists", e))
    }

    #[instrument(skip(self, email), err)]
    async fn company_email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM companies WHERE email = $1) AS taken")
            .bind(email)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("company_email_exists", e))?;
        row.try_get("taken")
            .map_err(|e| map_sqlx_error("company_email_exists", e))
    }

    #[instrument(
        skip(self, plan),
        fields(company_code = %plan.company.company_code, categories = plan.categories.len()),
        err
    )]
    async fn register_company(&self, plan: RegistrationPlan) -> Result<Registered, StoreError> {
        let now = plan.registered_at;
        let company_id = CompanyId::new();

        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.begin("register_company").await?;

        let sql = format!(
            "INSERT INTO companies (id, company_code, name, email, phone, address, industry, \
             subscription_plan, is_active, trial_ends_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10, $10) \
             RETURNING {COMPANY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .bind(&plan.company.company_code)
            .bind(&plan.company.name)
            .bind(&plan.company.email)
            .bind(&plan.company.phone)
            .bind(&plan.company.address)
            .bind(&plan.company.industry)
            .bind(plan.plan.as_str())
            .bind(plan.trial_ends_at)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("register_company", e))?;
        let company = company_from_row(&row).map_err(|e| map_sqlx_error("register_company", e))?;

        let admin = insert_user(&mut tx, company_id, plan.admin, now).await?;

        for category in plan.categories {
            insert_category(&mut tx, company_id, category, now).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("register_company", e))?;

        Ok(Registered { company, admin })
    }

    #[instrument(skip(self, patch), fields(company_id = %id), err)]
    async fn update_company(
        &self,
        id: CompanyId,
        patch: CompanyPatch,
        at: DateTime<Utc>,
    ) -> Result<CompanyRecord, StoreError> {
        let sql = format!(
            "UPDATE companies SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                phone = COALESCE($4, phone), \
                address = COALESCE($5, address), \
                industry = COALESCE($6, industry), \
                updated_at = $7 \
             WHERE id = $1 \
             RETURNING {COMPANY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(patch.name)
            .bind(patch.email)
            .bind(patch.phone)
            .bind(patch.address)
            .bind(patch.industry)
            .bind(at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_company", e))?
            .ok_or(StoreError::NotFound)?;
        company_from_row(&row).map_err(|e| map_sqlx_error("update_company", e))
    }

    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    async fn active_user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE id = $1 AND company_id = $2 AND is_active = TRUE"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(company_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("active_user", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("active_user", e))
    }

    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    async fn user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND company_id = $2");
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(company_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("user", e))
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn active_user_by_username(
        &self,
        company_id: CompanyId,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE username = $1 AND company_id = $2 AND is_active = TRUE"
        );
        let row = sqlx::query(&sql)
            .bind(username)
            .bind(company_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("active_user_by_username", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("active_user_by_username", e))
    }

    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    async fn record_login(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET last_login = $3 WHERE id = $1 AND company_id = $2")
            .bind(user_id.as_uuid())
            .bind(company_id.as_uuid())
            .bind(at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("record_login", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    async fn capabilities(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Vec<Capability>, StoreError> {
        let rows = sqlx::query(
            "SELECT role FROM user_roles WHERE user_id = $1 AND company_id = $2 ORDER BY role",
        )
        .bind(user_id.as_uuid())
        .bind(company_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("capabilities", e))?;

        let mut grants = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get("role")
                .map_err(|e| map_sqlx_error("capabilities", e))?;
            match name.parse::<Capability>() {
                Ok(cap) => grants.push(cap),
                Err(reason) => tracing::warn!(%reason, "ignoring unknown capability grant"),
            }
        }
        grants.sort();
        Ok(grants)
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn list_users(&self, company_id: CompanyId) -> Result<Vec<UserRecord>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE company_id = $1 AND is_active = TRUE \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        rows.iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_users", e))
    }

    #[instrument(skip(self, user), fields(company_id = %company_id, username = %user.username), err)]
    async fn create_user(
        &self,
        company_id: CompanyId,
        user: NewUser,
        at: DateTime<Utc>,
    ) -> Result<UserRecord, StoreError> {
        let mut tx = self.begin("create_user").await?;
        let record = insert_user(&mut tx, company_id, user, at).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_user", e))?;
        Ok(record)
    }

    #[instrument(skip(self, patch), fields(company_id = %company_id, user_id = %user_id), err)]
    async fn update_user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        patch: UserPatch,
        at: DateTime<Utc>,
    ) -> Result<UserRecord, StoreError> {
        let mut tx = self.begin("update_user").await?;

        let sql = format!(
            "UPDATE users SET \
                email = COALESCE($3, email), \
                first_name = COALESCE($4, first_name), \
                last_name = COALESCE($5, last_name), \
                role = COALESCE($6, role), \
                is_active = COALESCE($7, is_active), \
                password_hash = COALESCE($8, password_hash), \
                updated_at = $9 \
             WHERE id = $1 AND company_id = $2 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(company_id.as_uuid())
            .bind(patch.email)
            .bind(patch.first_name)
            .bind(patch.last_name)
            .bind(patch.role.as_ref().map(Role::as_str))
            .bind(patch.is_active)
            .bind(patch.password_hash)
            .bind(at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?
            .ok_or(StoreError::NotFound)?;
        let record = user_from_row(&row).map_err(|e| map_sqlx_error("update_user", e))?;

        if let Some(capabilities) = patch.capabilities {
            sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND company_id = $2")
                .bind(user_id.as_uuid())
                .bind(company_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_user", e))?;
            insert_grants(&mut tx, company_id, user_id, &capabilities).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?;
        Ok(record)
    }

    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    async fn deactivate_user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET is_active = FALSE, updated_at = $3 \
             WHERE id = $1 AND company_id = $2 AND is_active = TRUE",
        )
        .bind(user_id.as_uuid())
        .bind(company_id.as_uuid())
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("deactivate_user", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn list_categories(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<CategoryRecord>, StoreError> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM asset_categories \
             WHERE company_id = $1 AND is_active = TRUE \
             ORDER BY name"
        );
        let rows = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter()
            .map(category_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_categories", e))
    }

    #[instrument(skip(self, category), fields(company_id = %company_id, name = %category.name), err)]
    async fn create_category(
        &self,
        company_id: CompanyId,
        category: NewCategory,
        at: DateTime<Utc>,
    ) -> Result<CategoryRecord, StoreError> {
        let mut tx = self.begin("create_category").await?;
        let record = insert_category(&mut tx, company_id, category, at).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_category", e))?;
        Ok(record)
    }

    #[instrument(skip(self, patch), fields(company_id = %company_id, category_id = %id), err)]
    async fn update_category(
        &self,
        company_id: CompanyId,
        id: CategoryId,
        patch: CategoryPatch,
        at: DateTime<Utc>,
    ) -> Result<CategoryRecord, StoreError> {
        let sql = format!(
            "UPDATE asset_categories SET \
                name = COALESCE($3, name), \
                description = COALESCE($4, description), \
                color = COALESCE($5, color), \
                is_active = COALESCE($6, is_active), \
                updated_at = $7 \
             WHERE id = $1 AND company_id = $2 \
             RETURNING {CATEGORY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(company_id.as_uuid())
            .bind(patch.name)
            .bind(patch.description)
            .bind(patch.color)
            .bind(patch.is_active)
            .bind(at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_category", e))?
            .ok_or(StoreError::NotFound)?;
        category_from_row(&row).map_err(|e| map_sqlx_error("update_category", e))
    }

    #[instrument(skip(self), fields(company_id = %company_id, category_id = %id), err)]
    async fn deactivate_category(
        &self,
        company_id: CompanyId,
        id: CategoryId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE asset_categories SET is_active = FALSE, updated_at = $3 \
             WHERE id = $1 AND company_id = $2 AND is_active = TRUE",
        )
        .bind(id.as_uuid())
        .bind(company_id.as_uuid())
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("deactivate_category", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

async fn insert_user(
    tx: &mut Transaction<'static, Postgres>,
    company_id: CompanyId,
    user: NewUser,
    now: DateTime<Utc>,
) -> Result<UserRecord, StoreError> {
    let user_id = UserId::new();
    let sql = format!(
        "INSERT INTO users (id, company_id, username, email, password_hash, first_name, \
         last_name, role, is_active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $9) \
         RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(user_id.as_uuid())
        .bind(company_id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
    let record = user_from_row(&row).map_err(|e| map_sqlx_error("insert_user", e))?;

    insert_grants(tx, company_id, user_id, &user.capabilities).await?;
    Ok(record)
}

async fn insert_grants(
    tx: &mut Transaction<'static, Postgres>,
    company_id: CompanyId,
    user_id: UserId,
    capabilities: &[Capability],
) -> Result<(), StoreError> {
    for capability in capabilities {
        sqlx::query(
            "INSERT INTO user_roles (user_id, company_id, role) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, role) DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .bind(company_id.as_uuid())
        .bind(capability.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_grants", e))?;
    }
    Ok(())
}

async fn insert_category(
    tx: &mut Transaction<'static, Postgres>,
    company_id: CompanyId,
    category: NewCategory,
    now: DateTime<Utc>,
) -> Result<CategoryRecord, StoreError> {
    let sql = format!(
        "INSERT INTO asset_categories (id, company_id, name, description, color, is_active, \
         created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6) \
         RETURNING {CATEGORY_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(CategoryId::new().as_uuid())
        .bind(company_id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.color)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
    category_from_row(&row).map_err(|e| map_sqlx_error("insert_category", e))
}

fn company_from_row(row: &PgRow) -> Result<CompanyRecord, sqlx::Error> {
    let plan: String = row.try_get("subscription_plan")?;
    Ok(CompanyRecord {
        id: CompanyId::from_uuid(row.try_get("id")?),
        company_code: row.try_get("company_code")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        industry: row.try_get("industry")?,
        subscription_plan: plan
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
        is_active: row.try_get("is_active")?,
        trial_ends_at: row.try_get("trial_ends_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(UserRecord {
        id: UserId::from_uuid(row.try_get("id")?),
        company_id: CompanyId::from_uuid(row.try_get("company_id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role: Role::new(role),
        is_active: row.try_get("is_active")?,
        last_login: row.try_get("last_login")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn category_from_row(row: &PgRow) -> Result<CategoryRecord, sqlx::Error> {
    Ok(CategoryRecord {
        id: CategoryId::from_uuid(row.try_get("id")?),
        company_id: CompanyId::from_uuid(row.try_get("company_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        color: row.try_get("color")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let message = conflict_message(db_err.constraint());
                tracing::debug!(operation, constraint = ?db_err.constraint(), "unique violation");
                return StoreError::Conflict(message.to_string());
            }
            StoreError::Backend(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("companies_company_code_key") => conflict::COMPANY_CODE,
        Some("companies_email_key") => conflict::COMPANY_EMAIL,
        Some("users_company_username_key") => conflict::USERNAME,
        Some("users_company_email_key") => conflict::USER_EMAIL,
        Some("asset_categories_company_name_key") => conflict::CATEGORY_NAME,
        _ => conflict::OTHER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_names_pick_client_messages() {
        assert_eq!(
            conflict_message(Some("companies_company_code_key")),
            conflict::COMPANY_CODE
        );
        assert_eq!(
            conflict_message(Some("users_company_username_key")),
            conflict::USERNAME
        );
        assert_eq!(conflict_message(None), conflict::OTHER);
    }

    #[test]
    fn non_database_errors_are_backend_failures() {
        let err = map_sqlx_error("list_users", sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Backend(msg) if msg.contains("list_users")));
    }
}
