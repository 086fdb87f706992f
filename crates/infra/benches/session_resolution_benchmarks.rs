use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use chrono::Utc;
use assettag_auth::{Hs256TokenCodec, TokenCodec};
use assettag_core::{CompanyId, UserId};
use assettag_infra::store::{CredentialStore, InMemoryCredentialStore, NewCompany, RegistrationPlan};
use assettag_infra::AdminAccount;
use tokio::runtime::Runtime;

const SECRET: &[u8] = b"bench-secret-0123456789abcdefghijkl";

/// Register `companies` tenants and return the last tenant's `(company, admin)`.
fn seeded_store(rt: &Runtime, companies: usize) -> (InMemoryCredentialStore, CompanyId, UserId) {
    let store = InMemoryCredentialStore::new();
    let now = Utc::now();
    let mut last = None;
    for i in 0..companies {
        let plan = RegistrationPlan::trial(
            NewCompany {
                company_code: format!("BENCH{i:05}"),
                name: format!("Bench {i}"),
                email: format!("ops{i}@bench.test"),
                phone: None,
                address: None,
                industry: None,
            },
            AdminAccount {
                username: "admin".to_string(),
                email: format!("admin{i}@bench.test"),
                // Never verified here; bcrypt cost would dominate setup.
                password_hash: "unused".to_string(),
                first_name: None,
                last_name: None,
            },
            now,
        );
        let registered = rt.block_on(store.register_company(plan)).unwrap();
        last = Some((registered.company.id, registered.admin.id));
    }
    let (company_id, user_id) = last.unwrap();
    (store, company_id, user_id)
}

fn bench_token_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (store, company_id, user_id) = seeded_store(&rt, 1);
    let user = rt.block_on(store.active_user(company_id, user_id)).unwrap().unwrap();
    let codec = Hs256TokenCodec::new(SECRET).unwrap();
    let now = Utc::now();
    let token = codec.issue(&user.identity(), now).unwrap().token;

    let mut group = c.benchmark_group("token");
    group.bench_function("issue", |b| {
        b.iter(|| codec.issue(black_box(&user.identity()), now).unwrap());
    });
    group.bench_function("verify", |b| {
        b.iter(|| codec.verify(black_box(&token), now).unwrap());
    });
    group.finish();
}

/// What every protected request pays before the handler runs.
fn bench_session_resolution(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let codec = Hs256TokenCodec::new(SECRET).unwrap();
    let mut group = c.benchmark_group("session_resolution");

    for companies in [1usize, 100, 1000] {
        let (store, company_id, user_id) = seeded_store(&rt, companies);
        let now = Utc::now();
        let user = rt.block_on(store.active_user(company_id, user_id)).unwrap().unwrap();
        let token = codec.issue(&user.identity(), now).unwrap().token;

        group.bench_with_input(
            BenchmarkId::new("verify_resolve_gate", companies),
            &companies,
            |b, _| {
                b.iter(|| {
                    rt.block_on(async {
                        let claims = codec.verify(black_box(&token), now).unwrap();
                        let user = store
                            .active_user(claims.company_id, claims.sub)
                            .await
                            .unwrap()
                            .unwrap();
                        let company = store.company(user.company_id).await.unwrap().unwrap();
                        black_box(company.trial_state().check_access(now).is_ok())
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_token_roundtrip, bench_session_resolution);
criterion_main!(benches);
