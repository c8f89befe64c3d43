use std::thread;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::HostConfig;
use crate::error::WorkerError;
use crate::loader::{NameScheme, ScriptLoader};
use crate::stop::StopToken;
use crate::worker::WorkerRuntime;

/// What one worker did over its lifetime, captured just before teardown.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker_id: u64,
    pub cycles: u64,
    pub objects: usize,
    pub live_instances: usize,
    pub instance_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reports: Vec<WorkerReport>,
}

impl RunSummary {
    pub fn total_objects(&self) -> usize {
        self.reports.iter().map(|report| report.objects).sum()
    }

    pub fn total_live_instances(&self) -> usize {
        self.reports.iter().map(|report| report.live_instances).sum()
    }
}

/// Splits the object count across workers (remainder going to the
/// low-indexed ones, always summing exactly) and assigns each object a
/// script drawn uniformly from the configured set with a single seeded
/// generator. A fixed seed reproduces the exact same assignment.
pub fn population_plan(config: &HostConfig) -> Vec<Vec<String>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let base = config.object_count / config.worker_count;
    let remainder = config.object_count % config.worker_count;
    (0..config.worker_count)
        .map(|worker| {
            let count = base + usize::from(worker < remainder);
            (0..count)
                .map(|_| config.scripts[rng.gen_range(0..config.scripts.len())].clone())
                .collect()
        })
        .collect()
}

fn worker_main(
    worker_id: u64,
    worker_count: u64,
    loader: ScriptLoader,
    plan: Vec<String>,
    stop: StopToken,
) -> Result<WorkerReport, WorkerError> {
    let mut worker = WorkerRuntime::new(worker_id, loader, stop.clone(), worker_count);
    let outcome = worker
        .populate(&plan)
        .map_err(WorkerError::from)
        .and_then(|()| worker.run().map_err(WorkerError::from));
    let cycles = match outcome {
        Ok(cycles) => cycles,
        Err(err) => {
            // Fail fast, but wind the sibling workers down first so the
            // supervisor's joins all return.
            stop.request();
            worker.close();
            return Err(err);
        }
    };
    let report = WorkerReport {
        worker_id,
        cycles,
        objects: worker.objects().len(),
        live_instances: worker.instances().live(),
        instance_ids: worker.instance_ids(),
    };
    worker.close();
    Ok(report)
}

/// Runs the pool to completion with a fresh stop token. Returns once every
/// worker has observed the stop signal, finished its final cycle, and been
/// torn down.
pub fn run(config: &HostConfig) -> Result<RunSummary> {
    run_with_stop(config, StopToken::new())
}

/// Same as [`run`] but with a caller-supplied stop token, so the pool can be
/// wound down from outside the script API.
pub fn run_with_stop(config: &HostConfig, stop: StopToken) -> Result<RunSummary> {
    config.validate()?;
    let plans = population_plan(config);
    println!(
        "[host] starting {} workers over {} objects",
        config.worker_count, config.object_count
    );

    let mut handles = Vec::with_capacity(plans.len());
    for (worker_id, plan) in plans.into_iter().enumerate() {
        let loader = ScriptLoader::new(config.script_root.clone(), NameScheme::default());
        let worker_stop = stop.clone();
        let worker_count = config.worker_count as u64;
        let spawned = thread::Builder::new()
            .name(format!("worker-{worker_id}"))
            .spawn(move || worker_main(worker_id as u64, worker_count, loader, plan, worker_stop))
            .with_context(|| format!("spawning worker {worker_id}"));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                // Let the already-running workers drain before bailing.
                stop.request();
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(err);
            }
        }
    }

    let mut reports = Vec::with_capacity(handles.len());
    let mut failure: Option<WorkerError> = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(err)) => {
                eprintln!("[host] worker failed: {err}");
                failure.get_or_insert(err);
            }
            Err(_) => bail!("a worker thread panicked"),
        }
    }
    if let Some(err) = failure {
        return Err(err).context("fatal script error");
    }

    reports.sort_by_key(|report| report.worker_id);
    for report in &reports {
        println!(
            "[host] worker {} ran {} cycles over {} objects",
            report.worker_id, report.cycles, report.objects
        );
    }
    Ok(RunSummary { reports })
}
