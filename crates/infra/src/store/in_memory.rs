use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use assettag_auth::{Capability, SubscriptionPlan};
use assettag_core::{CategoryId, CompanyId, UserId};

use super::r#trait::{
    CategoryPatch, CategoryRecord, CompanyPatch, CompanyRecord, CredentialStore, NewCategory,
    NewUser, Registered, RegistrationPlan, StoreError, UserPatch, UserRecord, conflict,
};

#[derive(Debug, Clone, Default)]
struct State {
    companies: HashMap<CompanyId, CompanyRecord>,
    users: HashMap<UserId, UserRecord>,
    grants: HashMap<UserId, BTreeSet<Capability>>,
    categories: HashMap<CategoryId, CategoryRecord>,
}

impl State {
    fn insert_user(
        &mut self,
        company_id: CompanyId,
        user: NewUser,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, StoreError> {
        for existing in self.users.values().filter(|u| u.company_id == company_id) {
            if existing.username == user.username {
                return Err(StoreError::Conflict(conflict::USERNAME.to_string()));
            }
            if existing.email == user.email {
                return Err(StoreError::Conflict(conflict::USER_EMAIL.to_string()));
            }
        }

        let record = UserRecord {
            id: UserId::new(),
            company_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        self.grants
            .insert(record.id, user.capabilities.into_iter().collect());
        self.users.insert(record.id, record.clone());
        Ok(record)
    }

    fn category_name_taken(
        &self,
        company_id: CompanyId,
        name: &str,
        except: Option<CategoryId>,
    ) -> bool {
        self.categories.values().any(|c| {
            c.company_id == company_id && c.name == name && Some(c.id) != except
        })
    }

    fn insert_category(
        &mut self,
        company_id: CompanyId,
        category: NewCategory,
        now: DateTime<Utc>,
    ) -> Result<CategoryRecord, StoreError> {
        if self.category_name_taken(company_id, &category.name, None) {
            return Err(StoreError::Conflict(conflict::CATEGORY_NAME.to_string()));
        }
        let record = CategoryRecord {
            id: CategoryId::new(),
            company_id,
            name: category.name,
            description: category.description,
            color: category.color,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.categories.insert(record.id, record.clone());
        Ok(record)
    }

    fn user_in_company(&mut self, company_id: CompanyId, user_id: UserId) -> Option<&mut UserRecord> {
        self.users
            .get_mut(&user_id)
            .filter(|u| u.company_id == company_id)
    }
}

/// Points inside a registration where a test can force a failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RegistrationStep {
    Company,
    Admin,
    Categories,
}

/// In-memory credential store.
///
/// Intended for tests/dev. Registration stages its writes on a copy of the
/// state and swaps it in only when every step succeeded.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    state: RwLock<State>,
    #[cfg(test)]
    fail_after: Option<RegistrationStep>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn failing_after(step: RegistrationStep) -> Self {
        Self {
            state: RwLock::default(),
            fail_after: Some(step),
        }
    }

    fn checkpoint(&self, _step: RegistrationStep) -> Result<(), StoreError> {
        #[cfg(test)]
        if self.fail_after == Some(_step) {
            return Err(StoreError::Backend(format!("injected failure after {_step:?}")));
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn with_company<F>(&self, id: CompanyId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut CompanyRecord),
    {
        let mut state = self.write()?;
        let company = state.companies.get_mut(&id).ok_or(StoreError::NotFound)?;
        f(company);
        Ok(())
    }

    /// Move a company's trial boundary. Billing-side change with no API route.
    pub fn set_trial_ends_at(
        &self,
        id: CompanyId,
        trial_ends_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.with_company(id, |c| c.trial_ends_at = trial_ends_at)
    }

    /// Suspend or reinstate a company. Billing-side change with no API route.
    pub fn set_company_active(&self, id: CompanyId, is_active: bool) -> Result<(), StoreError> {
        self.with_company(id, |c| c.is_active = is_active)
    }

    pub fn set_subscription_plan(
        &self,
        id: CompanyId,
        plan: SubscriptionPlan,
    ) -> Result<(), StoreError> {
        self.with_company(id, |c| c.subscription_plan = plan)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn company_by_code(&self, code: &str) -> Result<Option<CompanyRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .companies
            .values()
            .find(|c| c.company_code == code)
            .cloned())
    }

    async fn company(&self, id: CompanyId) -> Result<Option<CompanyRecord>, StoreError> {
        Ok(self.read()?.companies.get(&id).cloned())
    }

    async fn company_code_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.companies.values().any(|c| c.company_code == code))
    }

    async fn company_email_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.companies.values().any(|c| c.email == email))
    }

    async fn register_company(&self, plan: RegistrationPlan) -> Result<Registered, StoreError> {
        let mut state = self.write()?;

        if state
            .companies
            .values()
            .any(|c| c.company_code == plan.company.company_code)
        {
            return Err(StoreError::Conflict(conflict::COMPANY_CODE.to_string()));
        }
        if state.companies.values().any(|c| c.email == plan.company.email) {
            return Err(StoreError::Conflict(conflict::COMPANY_EMAIL.to_string()));
        }

        let now = plan.registered_at;
        let mut staged = state.clone();

        let company = CompanyRecord {
            id: CompanyId::new(),
            company_code: plan.company.company_code,
            name: plan.company.name,
            email: plan.company.email,
            phone: plan.company.phone,
            address: plan.company.address,
            industry: plan.company.industry,
            subscription_plan: plan.plan,
            is_active: true,
            trial_ends_at: plan.trial_ends_at,
            created_at: now,
            updated_at: now,
        };
        staged.companies.insert(company.id, company.clone());
        self.checkpoint(RegistrationStep::Company)?;

        let admin = staged.insert_user(company.id, plan.admin, now)?;
        self.checkpoint(RegistrationStep::Admin)?;

        for category in plan.categories {
            staged.insert_category(company.id, category, now)?;
        }
        self.checkpoint(RegistrationStep::Categories)?;

        *state = staged;
        Ok(Registered { company, admin })
    }

    async fn update_company(
        &self,
        id: CompanyId,
        patch: CompanyPatch,
        at: DateTime<Utc>,
    ) -> Result<CompanyRecord, StoreError> {
        let mut state = self.write()?;
        if let Some(email) = &patch.email {
            if state.companies.values().any(|c| c.id != id && &c.email == email) {
                return Err(StoreError::Conflict(conflict::COMPANY_EMAIL.to_string()));
            }
        }

        let company = state.companies.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(v) = patch.name {
            company.name = v;
        }
        if let Some(v) = patch.email {
            company.email = v;
        }
        if let Some(v) = patch.phone {
            company.phone = Some(v);
        }
        if let Some(v) = patch.address {
            company.address = Some(v);
        }
        if let Some(v) = patch.industry {
            company.industry = Some(v);
        }
        company.updated_at = at;
        Ok(company.clone())
    }

    async fn active_user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<UserRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .users
            .get(&user_id)
            .filter(|u| u.company_id == company_id && u.is_active)
            .cloned())
    }

    async fn user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<UserRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .users
            .get(&user_id)
            .filter(|u| u.company_id == company_id)
            .cloned())
    }

    async fn active_user_by_username(
        &self,
        company_id: CompanyId,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .users
            .values()
            .find(|u| u.company_id == company_id && u.username == username && u.is_active)
            .cloned())
    }

    async fn record_login(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let user = state
            .user_in_company(company_id, user_id)
            .ok_or(StoreError::NotFound)?;
        user.last_login = Some(at);
        Ok(())
    }

    async fn capabilities(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Vec<Capability>, StoreError> {
        let state = self.read()?;
        let owned = state
            .users
            .get(&user_id)
            .is_some_and(|u| u.company_id == company_id);
        if !owned {
            return Ok(Vec::new());
        }
        Ok(state
            .grants
            .get(&user_id)
            .map(|g| g.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn list_users(&self, company_id: CompanyId) -> Result<Vec<UserRecord>, StoreError> {
        let state = self.read()?;
        let mut users: Vec<UserRecord> = state
            .users
            .values()
            .filter(|u| u.company_id == company_id && u.is_active)
            .cloned()
            .collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn create_user(
        &self,
        company_id: CompanyId,
        user: NewUser,
        at: DateTime<Utc>,
    ) -> Result<UserRecord, StoreError> {
        let mut state = self.write()?;
        if !state.companies.contains_key(&company_id) {
            return Err(StoreError::NotFound);
        }
        state.insert_user(company_id, user, at)
    }

    async fn update_user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        patch: UserPatch,
        at: DateTime<Utc>,
    ) -> Result<UserRecord, StoreError> {
        let mut state = self.write()?;
        if let Some(email) = &patch.email {
            let taken = state
                .users
                .values()
                .any(|u| u.company_id == company_id && u.id != user_id && &u.email == email);
            if taken {
                return Err(StoreError::Conflict(conflict::USER_EMAIL.to_string()));
            }
        }

        let user = state
            .user_in_company(company_id, user_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(v) = patch.email {
            user.email = v;
        }
        if let Some(v) = patch.first_name {
            user.first_name = Some(v);
        }
        if let Some(v) = patch.last_name {
            user.last_name = Some(v);
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        if let Some(v) = patch.is_active {
            user.is_active = v;
        }
        if let Some(v) = patch.password_hash {
            user.password_hash = v;
        }
        user.updated_at = at;
        let updated = user.clone();

        if let Some(capabilities) = patch.capabilities {
            state
                .grants
                .insert(user_id, capabilities.into_iter().collect());
        }
        Ok(updated)
    }

    async fn deactivate_user(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let user = state
            .user_in_company(company_id, user_id)
            .filter(|u| u.is_active)
            .ok_or(StoreError::NotFound)?;
        user.is_active = false;
        user.updated_at = at;
        Ok(())
    }

    async fn list_categories(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<CategoryRecord>, StoreError> {
        let state = self.read()?;
        let mut categories: Vec<CategoryRecord> = state
            .categories
            .values()
            .filter(|c| c.company_id == company_id && c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(
        &self,
        company_id: CompanyId,
        category: NewCategory,
        at: DateTime<Utc>,
    ) -> Result<CategoryRecord, StoreError> {
        let mut state = self.write()?;
        if !state.companies.contains_key(&company_id) {
            return Err(StoreError::NotFound);
        }
        state.insert_category(company_id, category, at)
    }

    async fn update_category(
        &self,
        company_id: CompanyId,
        id: CategoryId,
        patch: CategoryPatch,
        at: DateTime<Utc>,
    ) -> Result<CategoryRecord, StoreError> {
        let mut state = self.write()?;
        if let Some(name) = &patch.name {
            if state.category_name_taken(company_id, name, Some(id)) {
                return Err(StoreError::Conflict(conflict::CATEGORY_NAME.to_string()));
            }
        }

        let category = state
            .categories
            .get_mut(&id)
            .filter(|c| c.company_id == company_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(v) = patch.name {
            category.name = v;
        }
        if let Some(v) = patch.description {
            category.description = Some(v);
        }
        if let Some(v) = patch.color {
            category.color = v;
        }
        if let Some(v) = patch.is_active {
            category.is_active = v;
        }
        category.updated_at = at;
        Ok(category.clone())
    }

    async fn deactivate_category(
        &self,
        company_id: CompanyId,
        id: CategoryId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let category = state
            .categories
            .get_mut(&id)
            .filter(|c| c.company_id == company_id && c.is_active)
            .ok_or(StoreError::NotFound)?;
        category.is_active = false;
        category.updated_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::registration::AdminAccount;
    use crate::store::NewCompany;
    use assettag_auth::Role;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
    }

    fn plan(code: &str, email: &str) -> RegistrationPlan {
        RegistrationPlan::trial(
            NewCompany {
                company_code: code.to_string(),
                name: "Acme".to_string(),
                email: email.to_string(),
                phone: None,
                address: None,
                industry: None,
            },
            AdminAccount {
                username: "admin".to_string(),
                email: "admin@acme.test".to_string(),
                password_hash: "$2b$10$notarealhash".to_string(),
                first_name: None,
                last_name: None,
            },
            t0(),
        )
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{username}@acme.test"),
            password_hash: "$2b$10$notarealhash".to_string(),
            first_name: None,
            last_name: None,
            role: Role::user(),
            capabilities: vec![Capability::ViewReports],
        }
    }

    #[tokio::test]
    async fn registration_writes_everything() {
        let store = InMemoryCredentialStore::new();
        let reg = store.register_company(plan("ACME0001", "ops@acme.test")).await.unwrap();

        let company = store.company_by_code("ACME0001").await.unwrap().unwrap();
        assert_eq!(company.id, reg.company.id);
        assert_eq!(company.subscription_plan, SubscriptionPlan::Trial);
        assert!(company.trial_ends_at.is_some());

        let admin = store.active_user(company.id, reg.admin.id).await.unwrap().unwrap();
        assert!(admin.role.is_admin());
        assert_eq!(
            store.capabilities(company.id, admin.id).await.unwrap().len(),
            Capability::ALL.len()
        );
        assert!(!store.list_categories(company.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn registration_stamps_rows_with_the_callers_clock() {
        let store = InMemoryCredentialStore::new();
        let reg = store.register_company(plan("ACME0001", "ops@acme.test")).await.unwrap();

        assert_eq!(reg.company.created_at, t0());
        assert_eq!(reg.company.trial_ends_at, Some(t0() + Duration::days(30)));
        assert_eq!(reg.admin.created_at, t0());
        for category in store.list_categories(reg.company.id).await.unwrap() {
            assert_eq!(category.created_at, t0());
        }
    }

    #[tokio::test]
    async fn failed_registration_leaves_nothing_behind() {
        for step in [
            RegistrationStep::Company,
            RegistrationStep::Admin,
            RegistrationStep::Categories,
        ] {
            let store = InMemoryCredentialStore::failing_after(step);
            let err = store
                .register_company(plan("ACME0001", "ops@acme.test"))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::Backend(_)));

            let state = store.read().unwrap();
            assert!(state.companies.is_empty(), "company left after {step:?}");
            assert!(state.users.is_empty(), "user left after {step:?}");
            assert!(state.grants.is_empty(), "grants left after {step:?}");
            assert!(state.categories.is_empty(), "categories left after {step:?}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_with_one_code_admit_one() {
        let store = Arc::new(InMemoryCredentialStore::new());

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .register_company(plan("SAME0001", &format!("ops{i}@acme.test")))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        let mut conflicts = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::Conflict(msg)) => {
                    assert_eq!(msg, conflict::COMPANY_CODE);
                    conflicts += 1;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn users_are_scoped_to_their_company() {
        let store = InMemoryCredentialStore::new();
        let a = store.register_company(plan("AAAA0001", "a@a.test")).await.unwrap();
        let b = store.register_company(plan("BBBB0001", "b@b.test")).await.unwrap();

        assert!(store.active_user(b.company.id, a.admin.id).await.unwrap().is_none());
        assert!(store.capabilities(b.company.id, a.admin.id).await.unwrap().is_empty());
        assert_eq!(
            store.update_user(b.company.id, a.admin.id, UserPatch::default(), t0()).await,
            Err(StoreError::NotFound)
        );
        assert_eq!(
            store.deactivate_user(b.company.id, a.admin.id, t0()).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn usernames_are_unique_per_company_only() {
        let store = InMemoryCredentialStore::new();
        let a = store.register_company(plan("AAAA0001", "a@a.test")).await.unwrap();
        let b = store.register_company(plan("BBBB0001", "b@b.test")).await.unwrap();

        store.create_user(a.company.id, new_user("dana"), t0()).await.unwrap();
        store.create_user(b.company.id, new_user("dana"), t0()).await.unwrap();
        assert_eq!(
            store.create_user(a.company.id, new_user("dana"), t0()).await,
            Err(StoreError::Conflict(conflict::USERNAME.to_string()))
        );
    }

    #[tokio::test]
    async fn deactivated_user_no_longer_resolves() {
        let store = InMemoryCredentialStore::new();
        let reg = store.register_company(plan("ACME0001", "ops@acme.test")).await.unwrap();
        let user = store.create_user(reg.company.id, new_user("erin"), t0()).await.unwrap();

        store.deactivate_user(reg.company.id, user.id, t0()).await.unwrap();
        assert!(store.active_user(reg.company.id, user.id).await.unwrap().is_none());
        assert!(
            store
                .active_user_by_username(reg.company.id, "erin")
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            store.deactivate_user(reg.company.id, user.id, t0()).await,
            Err(StoreError::NotFound)
        );

        let restored = store
            .update_user(
                reg.company.id,
                user.id,
                UserPatch {
                    is_active: Some(true),
                    ..UserPatch::default()
                },
                t0(),
            )
            .await
            .unwrap();
        assert!(restored.is_active);
    }

    #[tokio::test]
    async fn user_lookup_includes_deactivated_rows() {
        let store = InMemoryCredentialStore::new();
        let a = store.register_company(plan("AAAA0001", "a@a.test")).await.unwrap();
        let b = store.register_company(plan("BBBB0001", "b@b.test")).await.unwrap();
        let user = store.create_user(a.company.id, new_user("fay"), t0()).await.unwrap();
        store.deactivate_user(a.company.id, user.id, t0()).await.unwrap();

        let found = store.user(a.company.id, user.id).await.unwrap().unwrap();
        assert!(!found.is_active);
        assert!(store.user(b.company.id, user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn category_patch_keeps_unset_fields() {
        let store = InMemoryCredentialStore::new();
        let reg = store.register_company(plan("ACME0001", "ops@acme.test")).await.unwrap();
        let created = store
            .create_category(
                reg.company.id,
                NewCategory {
                    name: "Lab".to_string(),
                    description: Some("bench gear".to_string()),
                    color: "#111111".to_string(),
                },
                t0(),
            )
            .await
            .unwrap();

        let updated = store
            .update_category(
                reg.company.id,
                created.id,
                CategoryPatch {
                    color: Some("#222222".to_string()),
                    ..CategoryPatch::default()
                },
                t0() + Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Lab");
        assert_eq!(updated.description.as_deref(), Some("bench gear"));
        assert_eq!(updated.color, "#222222");
        assert_eq!(updated.created_at, t0());
        assert_eq!(updated.updated_at, t0() + Duration::hours(1));
    }

    #[tokio::test]
    async fn renaming_onto_an_existing_category_conflicts() {
        let store = InMemoryCredentialStore::new();
        let reg = store.register_company(plan("ACME0001", "ops@acme.test")).await.unwrap();
        let lab = store
            .create_category(
                reg.company.id,
                NewCategory {
                    name: "Lab".to_string(),
                    description: None,
                    color: "#111111".to_string(),
                },
                t0(),
            )
            .await
            .unwrap();

        let err = store
            .update_category(
                reg.company.id,
                lab.id,
                CategoryPatch {
                    name: Some("General".to_string()),
                    ..CategoryPatch::default()
                },
                t0(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict(conflict::CATEGORY_NAME.to_string()));
    }
}
