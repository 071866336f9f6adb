//! End-to-end compilation against PostgreSQL.
//!
//! Each test creates an isolated temporary database.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use dissolve_core::catalog::DueRule;
use dissolve_core::{
    CompileError, CompileOutcome, PgStore, RoadmapAggregator, ScheduleCompilerService,
    StepTemplateCatalog,
};
use dissolve_db::models::TaskCategory;
use dissolve_db::queries::companies::{self, NewCompany};
use dissolve_db::queries::tasks;
use dissolve_test_utils::{create_test_db, drop_test_db};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 12, 30, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn compile_persists_plan_once() {
    let (pool, db_name) = create_test_db().await;
    let catalog = StepTemplateCatalog::builtin().unwrap();
    let store = PgStore::new(pool.clone());

    let company = companies::insert_company(
        &pool,
        &NewCompany {
            name: "Acme Widgets Inc.",
            has_employees: true,
            has_financial_obligations: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let service = ScheduleCompilerService::new(&catalog, &store, &store, &store);
    let outcome = service.compile_at(company.id, now()).await.unwrap();
    let CompileOutcome::Compiled {
        tasks: written,
        plan_end,
    } = outcome
    else {
        panic!("expected a compiled plan, got {outcome:?}");
    };

    let stored = tasks::list_tasks_for_company(&pool, company.id, TaskCategory::Dissolution)
        .await
        .unwrap();
    assert_eq!(stored.len() as u64, written);

    let first = &stored[0];
    assert_eq!((first.step_position, first.task_position), (1, 1));
    assert_eq!(first.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(first.due_date, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());

    for task in &stored {
        assert!(task.due_date >= task.start_date);
        assert_eq!(task.progress, 0);
        assert!(!task.is_assigned);
    }
    // No IP, no asset sale.
    for excluded in [9, 10, 11, 12] {
        assert!(stored.iter().all(|t| t.step_position != excluded));
    }
    for step in catalog.all().iter().filter(|s| s.due == DueRule::PlanEnd) {
        assert!(
            stored
                .iter()
                .filter(|t| t.step_position == step.id)
                .all(|t| t.due_date == plan_end)
        );
    }

    // A later call, even on another day, changes nothing.
    let again = service
        .compile_at(company.id, now() + Days::new(10))
        .await
        .unwrap();
    assert_eq!(again, CompileOutcome::AlreadyCompiled);
    let after = tasks::list_tasks_for_company(&pool, company.id, TaskCategory::Dissolution)
        .await
        .unwrap();
    assert_eq!(after, stored);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn concurrent_compiles_write_one_batch() {
    let (pool, db_name) = create_test_db().await;
    let catalog = StepTemplateCatalog::builtin().unwrap();
    let store = PgStore::new(pool.clone());

    let company = companies::insert_company(
        &pool,
        &NewCompany {
            name: "Racey Corp",
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let service = ScheduleCompilerService::new(&catalog, &store, &store, &store);
    let (a, b, c) = tokio::join!(
        service.compile_at(company.id, now()),
        service.compile_at(company.id, now()),
        service.compile_at(company.id, now()),
    );
    let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];
    let compiled = outcomes
        .iter()
        .filter(|o| matches!(o, CompileOutcome::Compiled { .. }))
        .count();
    assert_eq!(compiled, 1);

    let stored = tasks::list_tasks_for_company(&pool, company.id, TaskCategory::Dissolution)
        .await
        .unwrap();
    let mut keys: Vec<(i32, i32)> = stored
        .iter()
        .map(|t| (t.step_position, t.task_position))
        .collect();
    let total = keys.len();
    keys.dedup();
    assert_eq!(keys.len(), total, "duplicate tasks were written");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn unknown_company_is_not_found() {
    let (pool, db_name) = create_test_db().await;
    let catalog = StepTemplateCatalog::builtin().unwrap();
    let store = PgStore::new(pool.clone());

    let err = ScheduleCompilerService::new(&catalog, &store, &store, &store)
        .compile_at(Uuid::new_v4(), now())
        .await
        .unwrap_err();
    assert!(matches!(err, CompileError::NotFound(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn roadmap_reflects_progress_updates() {
    let (pool, db_name) = create_test_db().await;
    let catalog = StepTemplateCatalog::builtin().unwrap();
    let store = PgStore::new(pool.clone());

    let company = companies::insert_company(
        &pool,
        &NewCompany {
            name: "Roadmap Ltd",
            has_intellectual_property: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let aggregator = RoadmapAggregator::new(&catalog, &store);
    assert!(aggregator.roadmap(company.id).await.unwrap().is_empty());

    ScheduleCompilerService::new(&catalog, &store, &store, &store)
        .compile_at(company.id, now())
        .await
        .unwrap();

    let stored = tasks::list_tasks_for_company(&pool, company.id, TaskCategory::Dissolution)
        .await
        .unwrap();
    let kickoff: Vec<_> = stored.iter().filter(|t| t.step_position == 1).collect();
    tasks::update_task_progress(&pool, kickoff[1].id, 50)
        .await
        .unwrap();
    tasks::update_task_progress(&pool, kickoff[2].id, 100)
        .await
        .unwrap();

    let roadmap = aggregator.roadmap(company.id).await.unwrap();
    let positions: Vec<i32> = roadmap.iter().map(|s| s.step_pos).collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
    assert!(positions.contains(&12), "IP transfer step should be present");

    let first = &roadmap[0];
    assert_eq!(first.name, "Engage wind-down facilitator");
    assert_eq!(first.progress, 50);
    assert_eq!(first.duration_in_days, 7);
    assert_eq!(first.tasks.len(), 3);

    let summary = aggregator.summary(company.id).await.unwrap().unwrap();
    assert_eq!(summary.steps, roadmap.len());
    assert_eq!(summary.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    pool.close().await;
    drop_test_db(&db_name).await;
}
