//! Scheduler admission tests
//!
//! Priority ordering, deferral, capacity conservation and release behaviour
//! of the scheduler driven through whole cycles.

use jobledger::{Job, ResourceVector, Scheduler, SchedulerError};

fn vector(pairs: &[(&str, f64)]) -> ResourceVector {
    ResourceVector::new(pairs.iter().copied()).unwrap()
}

fn job(id: &str, priority: i64, cpu: f64, mem: f64) -> Job {
    Job::new(
        id,
        priority,
        "user1",
        vector(&[("cpu_cores", cpu), ("memory_gb", mem)]),
        format!("run {}", id),
    )
}

fn capacity() -> ResourceVector {
    vector(&[("cpu_cores", 8.0), ("memory_gb", 16.0)])
}

/// available + sum(running demand) == total, exactly, per ledger resource
fn assert_conserved(scheduler: &Scheduler) {
    let status = scheduler.status();
    let running = scheduler
        .scheduled_jobs()
        .iter()
        .fold(status.total.zeroed(), |acc, j| acc.saturating_add(&j.resources));

    assert_eq!(status.available.saturating_add(&running), status.total);
    assert_eq!(status.used, running);
}

#[test]
fn test_priority_admission_with_deferral() {
    let mut scheduler = Scheduler::new(capacity());
    scheduler.submit(job("J1", 3, 4.0, 8.0)).unwrap();
    scheduler.submit(job("J2", 1, 2.0, 4.0)).unwrap();
    scheduler.submit(job("J3", 2, 4.0, 10.0)).unwrap();

    let first = scheduler.run_cycle();
    assert_eq!(first.admitted, vec!["J1", "J2"]);
    assert_eq!(first.deferred, vec!["J3"]);
    assert_eq!(
        scheduler.status().available,
        vector(&[("cpu_cores", 2.0), ("memory_gb", 4.0)])
    );
    assert_conserved(&scheduler);

    // Nothing freed: J3 stays queued
    let second = scheduler.run_cycle();
    assert!(second.admitted.is_empty());
    assert_eq!(second.deferred, vec!["J3"]);

    scheduler.complete("J1").unwrap();
    assert_conserved(&scheduler);

    let third = scheduler.run_cycle();
    assert_eq!(third.admitted, vec!["J3"]);
    assert!(scheduler.is_idle());
    assert_conserved(&scheduler);
}

#[test]
fn test_lower_priority_fills_gap() {
    let mut scheduler = Scheduler::new(capacity());
    scheduler.submit(job("big", 5, 8.0, 20.0)).unwrap();
    scheduler.submit(job("small", 1, 1.0, 1.0)).unwrap();

    let report = scheduler.run_cycle();
    assert_eq!(report.admitted, vec!["small"]);
    assert_eq!(report.deferred, vec!["big"]);
}

#[test]
fn test_ties_admitted_in_submission_order() {
    let mut scheduler = Scheduler::new(vector(&[("cpu_cores", 2.0)]));
    for id in ["w", "x", "y", "z"] {
        scheduler
            .submit(Job::new(id, 1, "u", vector(&[("cpu_cores", 1.0)]), "x"))
            .unwrap();
    }

    assert_eq!(scheduler.run_cycle().admitted, vec!["w", "x"]);
    scheduler.complete("w").unwrap();
    scheduler.complete("x").unwrap();
    assert_eq!(scheduler.run_cycle().admitted, vec!["y", "z"]);
}

#[test]
fn test_conservation_through_mixed_lifecycle() {
    let mut scheduler = Scheduler::new(capacity());
    let demands = [(1.0, 2.0), (3.0, 1.0), (2.0, 6.0), (4.0, 4.0), (1.0, 8.0), (2.0, 2.0)];
    for (i, (cpu, mem)) in demands.iter().enumerate() {
        scheduler
            .submit(job(&format!("j{}", i), (i % 3) as i64, *cpu, *mem))
            .unwrap();
    }

    for round in 0..10 {
        scheduler.run_cycle();
        assert_conserved(&scheduler);

        let running: Vec<String> = scheduler
            .scheduled_jobs()
            .iter()
            .map(|j| j.id().to_string())
            .collect();
        if let Some(id) = running.first() {
            if round % 2 == 0 {
                scheduler.complete(id).unwrap();
            } else {
                scheduler.fail(id).unwrap();
            }
        }
        assert_conserved(&scheduler);

        if scheduler.is_idle() && scheduler.scheduled_jobs().is_empty() {
            break;
        }
    }

    assert!(scheduler.is_idle());
}

#[test]
fn test_oversized_job_never_admitted() {
    let mut scheduler = Scheduler::new(capacity());
    scheduler.submit(job("huge", 10, 64.0, 1.0)).unwrap();

    for _ in 0..3 {
        let report = scheduler.run_cycle();
        assert!(report.admitted.is_empty());
        assert_eq!(report.deferred, vec!["huge"]);
    }
    assert_eq!(scheduler.status().available, scheduler.status().total);
}

#[test]
fn test_completed_job_cannot_complete_again() {
    let mut scheduler = Scheduler::new(capacity());
    scheduler.submit(job("J1", 1, 2.0, 2.0)).unwrap();
    scheduler.run_cycle();
    scheduler.complete("J1").unwrap();

    assert!(matches!(
        scheduler.complete("J1"),
        Err(SchedulerError::NotFound(_))
    ));
    assert_eq!(scheduler.status().available, scheduler.status().total);
}

#[test]
fn test_fractional_release_restores_full_capacity() {
    let mut scheduler = Scheduler::new(vector(&[("memory_gb", 1.0)]));
    scheduler
        .submit(Job::new("a", 2, "u", vector(&[("memory_gb", 0.3)]), "x"))
        .unwrap();
    scheduler
        .submit(Job::new("b", 1, "u", vector(&[("memory_gb", 0.1)]), "x"))
        .unwrap();
    assert_eq!(scheduler.run_cycle().admitted, vec!["a", "b"]);
    assert_conserved(&scheduler);

    scheduler.complete("a").unwrap();
    scheduler.complete("b").unwrap();
    assert_eq!(scheduler.status().available, scheduler.status().total);

    scheduler
        .submit(Job::new("full", 1, "u", vector(&[("memory_gb", 1.0)]), "x"))
        .unwrap();
    assert_eq!(scheduler.run_cycle().admitted, vec!["full"]);
}

#[test]
fn test_fractional_demands_fill_capacity_exactly() {
    let mut scheduler = Scheduler::new(vector(&[("memory_gb", 0.3)]));
    scheduler
        .submit(Job::new("a", 2, "u", vector(&[("memory_gb", 0.1)]), "x"))
        .unwrap();
    scheduler
        .submit(Job::new("b", 1, "u", vector(&[("memory_gb", 0.2)]), "x"))
        .unwrap();

    let report = scheduler.run_cycle();
    assert_eq!(report.admitted, vec!["a", "b"]);
    assert!(report.deferred.is_empty());
    assert_conserved(&scheduler);
}
