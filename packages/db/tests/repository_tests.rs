#![allow(clippy::disallowed_methods)]

mod common;

use std::collections::HashSet;

use chrono::{Duration, Utc};
use db::DbError;
use db::repositories::JobRepository;
use queue_core::{Job, JobId, JobState, unix_now};

use common::TestResult;

#[test]
fn enqueue_and_lookup() -> TestResult {
    common::run(async {
        let _guard = common::setup_db().await?;

        let job = Job::new("echo hello").with_id("job-1").with_max_retries(5);
        let created = JobRepository::enqueue(&job).await?;
        assert_eq!(created.id, JobId::from("job-1"));
        assert_eq!(created.state, JobState::Pending);
        assert_eq!(created.attempts, 0);
        assert_eq!(created.max_retries, 5);

        let loaded = JobRepository::get(&job.id).await?;
        assert_eq!(loaded.command, "echo hello");
        assert!(loaded.last_error.is_none());
        assert!(loaded.worker_id.is_none());

        let missing = JobRepository::find(&JobId::from("nope")).await?;
        assert!(missing.is_none());
        let missing = JobRepository::get(&JobId::from("nope")).await;
        assert!(matches!(missing, Err(DbError::NotFound(_))));

        let duplicate = JobRepository::enqueue(&Job::new("echo again").with_id("job-1")).await;
        assert!(matches!(duplicate, Err(DbError::DuplicateKey(id)) if id == "job-1"));

        // The first row is untouched by the rejected insert.
        let loaded = JobRepository::get(&job.id).await?;
        assert_eq!(loaded.command, "echo hello");

        Ok(())
    })
}

#[test]
fn claim_takes_oldest_eligible_job() -> TestResult {
    common::run(async {
        let _guard = common::setup_db().await?;

        let base = Utc::now() - Duration::seconds(60);
        let mut newer = Job::new("echo newer").with_id("b-newer");
        newer.created_at = base + Duration::seconds(2);
        let mut older = Job::new("echo older").with_id("c-older");
        older.created_at = base;
        let mut tie = Job::new("echo tie").with_id("d-tie");
        tie.created_at = base;
        let mut future = Job::new("echo later")
            .with_id("a-future")
            .with_run_after(unix_now() + 3600);
        future.created_at = base - Duration::seconds(10);

        for job in [&newer, &tie, &older, &future] {
            JobRepository::enqueue(job).await?;
        }

        let first = JobRepository::claim_next("worker-1").await?.ok_or("expected a job")?;
        assert_eq!(first.id.as_str(), "c-older");
        assert_eq!(first.state, JobState::Processing);
        assert_eq!(first.worker_id.as_deref(), Some("worker-1"));

        let second = JobRepository::claim_next("worker-1").await?.ok_or("expected a job")?;
        assert_eq!(second.id.as_str(), "d-tie");

        let third = JobRepository::claim_next("worker-2").await?.ok_or("expected a job")?;
        assert_eq!(third.id.as_str(), "b-newer");

        // Only the job scheduled for the future remains, and it is not eligible.
        assert!(JobRepository::claim_next("worker-1").await?.is_none());
        let future = JobRepository::get(&future.id).await?;
        assert_eq!(future.state, JobState::Pending);
        assert!(future.worker_id.is_none());

        Ok(())
    })
}

#[test]
fn concurrent_claims_never_share_a_job() -> TestResult {
    common::run(async {
        let _guard = common::setup_db().await?;

        const JOBS: usize = 25;
        const WORKERS: usize = 6;

        for i in 0..JOBS {
            JobRepository::enqueue(&Job::new(format!("echo {i}"))).await?;
        }

        let mut handles = Vec::new();
        for w in 0..WORKERS {
            handles.push(tokio::spawn(async move {
                let worker_id = format!("worker-{w}");
                let mut claimed = Vec::new();
                loop {
                    match JobRepository::claim_next(&worker_id).await? {
                        Some(job) => {
                            assert_eq!(job.worker_id.as_deref(), Some(worker_id.as_str()));
                            JobRepository::mark_completed(&job.id).await?;
                            claimed.push(job.id);
                        }
                        None => {
                            if JobRepository::counts_by_state().await?.pending == 0 {
                                break;
                            }
                            tokio::task::yield_now().await;
                        }
                    }
                }
                Ok::<_, DbError>(claimed)
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await??);
        }

        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), JOBS, "every job claimed exactly once");
        assert_eq!(unique.len(), JOBS, "no job claimed twice");

        let counts = JobRepository::counts_by_state().await?;
        assert_eq!(counts.completed, JOBS as u64);
        assert_eq!(counts.total(), JOBS as u64);

        Ok(())
    })
}

#[test]
fn transitions_are_guarded_by_state() -> TestResult {
    common::run(async {
        let _guard = common::setup_db().await?;

        let job = JobRepository::enqueue(&Job::new("false").with_id("guarded")).await?;

        // Not yet claimed: every worker-side transition is rejected.
        let err = JobRepository::mark_completed(&job.id).await;
        assert!(matches!(
            err,
            Err(DbError::InvalidTransition { ref actual, .. }) if actual == "pending"
        ));
        let err = JobRepository::mark_dead(&job.id, 1, "boom").await;
        assert!(matches!(err, Err(DbError::InvalidTransition { .. })));

        let claimed = JobRepository::claim_next("worker-1").await?.ok_or("expected a job")?;
        let run_after = unix_now() + 4;
        let retried =
            JobRepository::mark_failed_for_retry(&claimed.id, run_after, 1, "exit 1").await?;
        assert_eq!(retried.state, JobState::Pending);
        assert_eq!(retried.attempts, 1);
        assert_eq!(retried.run_after, run_after);
        assert_eq!(retried.last_error.as_deref(), Some("exit 1"));

        // Rescheduled into the future, so it cannot be claimed yet.
        assert!(JobRepository::claim_next("worker-1").await?.is_none());

        let missing = JobRepository::mark_completed(&JobId::from("ghost")).await;
        assert!(matches!(missing, Err(DbError::NotFound(_))));

        Ok(())
    })
}

#[test]
fn completing_twice_is_rejected() -> TestResult {
    common::run(async {
        let _guard = common::setup_db().await?;

        JobRepository::enqueue(&Job::new("true")).await?;
        let claimed = JobRepository::claim_next("worker-1").await?.ok_or("expected a job")?;

        let completed = JobRepository::mark_completed(&claimed.id).await?;
        assert_eq!(completed.state, JobState::Completed);
        assert_eq!(completed.worker_id.as_deref(), Some("worker-1"));

        let again = JobRepository::mark_completed(&claimed.id).await;
        assert!(matches!(
            again,
            Err(DbError::InvalidTransition { expected: "processing", ref actual, .. })
                if actual == "completed"
        ));

        let reloaded = JobRepository::get(&claimed.id).await?;
        assert_eq!(reloaded, completed);

        Ok(())
    })
}

#[test]
fn dead_jobs_can_be_requeued() -> TestResult {
    common::run(async {
        let _guard = common::setup_db().await?;

        let doomed = Job::new("exit 3").with_id("doomed").with_max_retries(1);
        let job = JobRepository::enqueue(&doomed).await?;

        // Only dead jobs may be revived.
        let err = JobRepository::requeue_dead(&job.id).await;
        assert!(matches!(err, Err(DbError::InvalidTransition { expected: "dead", .. })));

        let claimed = JobRepository::claim_next("worker-1").await?.ok_or("expected a job")?;
        let dead = JobRepository::mark_dead(&claimed.id, 1, "exit status 3").await?;
        assert_eq!(dead.state, JobState::Dead);
        assert_eq!(dead.attempts, 1);
        assert_eq!(dead.last_error.as_deref(), Some("exit status 3"));

        let listed = JobRepository::list_by_state(JobState::Dead, 10).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, job.id);

        let before = unix_now();
        let revived = JobRepository::requeue_dead(&job.id).await?;
        assert_eq!(revived.state, JobState::Pending);
        assert_eq!(revived.attempts, 0);
        assert!(revived.run_after >= before && revived.run_after <= unix_now());
        assert!(revived.worker_id.is_none());
        // The diagnostic survives for auditing.
        assert_eq!(revived.last_error.as_deref(), Some("exit status 3"));

        let reclaimed = JobRepository::claim_next("worker-2").await?.ok_or("expected a job")?;
        assert_eq!(reclaimed.id, job.id);

        let missing = JobRepository::requeue_dead(&JobId::from("ghost")).await;
        assert!(matches!(missing, Err(DbError::NotFound(_))));

        Ok(())
    })
}

#[test]
fn listing_and_counts() -> TestResult {
    common::run(async {
        let _guard = common::setup_db().await?;

        let base = Utc::now() - Duration::seconds(30);
        for i in 0..5 {
            let mut job = Job::new(format!("echo {i}")).with_id(format!("job-{i}"));
            job.created_at = base + Duration::seconds(i);
            JobRepository::enqueue(&job).await?;
        }

        let first = JobRepository::claim_next("w").await?.ok_or("expected a job")?;
        JobRepository::mark_completed(&first.id).await?;
        let second = JobRepository::claim_next("w").await?.ok_or("expected a job")?;
        JobRepository::mark_dead(&second.id, 3, "boom").await?;
        let _third = JobRepository::claim_next("w").await?.ok_or("expected a job")?;

        let counts = JobRepository::counts_by_state().await?;
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.dead, 1);
        assert_eq!(counts.failed, 0);
        assert_eq!(counts.total(), 5);

        let pending = JobRepository::list_by_state(JobState::Pending, 10).await?;
        let ids: Vec<_> = pending.iter().map(|job| job.id.as_str()).collect();
        assert_eq!(ids, ["job-3", "job-4"]);

        let limited = JobRepository::list_by_state(JobState::Pending, 1).await?;
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id.as_str(), "job-3");

        assert!(JobRepository::list_by_state(JobState::Failed, 10).await?.is_empty());

        Ok(())
    })
}

#[test]
fn same_instant_jobs_are_taken_in_id_order() -> TestResult {
    common::run(async {
        let _guard = common::setup_db().await?;

        let created_at = Utc::now() - Duration::seconds(5);
        for id in ["zzz", "aaa"] {
            let mut job = Job::new(format!("echo {id}")).with_id(id);
            job.created_at = created_at;
            JobRepository::enqueue(&job).await?;
        }

        let listed = JobRepository::list_by_state(JobState::Pending, 10).await?;
        let ids: Vec<_> = listed.iter().map(|job| job.id.as_str()).collect();
        assert_eq!(ids, ["aaa", "zzz"]);

        let first = JobRepository::claim_next("worker-1").await?.ok_or("expected a job")?;
        assert_eq!(first.id.as_str(), "aaa");
        let second = JobRepository::claim_next("worker-1").await?.ok_or("expected a job")?;
        assert_eq!(second.id.as_str(), "zzz");

        Ok(())
    })
}
