use std::sync::Mutex;

use rhai::{CallFnOptions, Dynamic, Engine, Scope, AST, INT};

use crate::cache::ScriptCache;
use crate::error::{InvocationError, LoadError};
use crate::instance::InstanceStore;
use crate::loader::ScriptLoader;
use crate::objects::ObjectTable;
use crate::stop::StopToken;

/// Lifecycle of a worker runtime. Updates only ever run in `Running`;
/// population happens strictly before the first cycle, so every object's
/// descriptor is fully initialized before it can be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Populating,
    Running,
    Stopping,
    Closed,
}

static PRINT_LOCK: Mutex<()> = Mutex::new(());

/// Serialized print shared by every worker. Concurrent calls from different
/// threads never interleave partial lines.
pub fn locked_print(message: &str) {
    let _guard = PRINT_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    println!("[script] {message}");
}

fn register_host_api(engine: &mut Engine, stop: StopToken, worker_count: u64) {
    engine.on_print(|message| locked_print(message));
    engine.register_fn("stop", move || stop.request());
    engine.register_fn("worker_count", move || worker_count as INT);
}

/// One worker: an interpreter instance plus the script cache, instance store,
/// and object table that only this worker's thread ever touches. The stop
/// token is the sole piece of cross-worker state.
pub struct WorkerRuntime {
    engine: Engine,
    scope: Scope<'static>,
    cache: ScriptCache,
    instances: InstanceStore,
    objects: ObjectTable,
    worker_id: u64,
    state: WorkerState,
    stop: StopToken,
}

impl WorkerRuntime {
    pub fn new(worker_id: u64, loader: ScriptLoader, stop: StopToken, worker_count: u64) -> Self {
        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        register_host_api(&mut engine, stop.clone(), worker_count);
        Self {
            engine,
            scope: Scope::new(),
            cache: ScriptCache::new(loader),
            instances: InstanceStore::new(),
            objects: ObjectTable::new(),
            worker_id,
            state: WorkerState::Populating,
            stop,
        }
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn instances(&self) -> &InstanceStore {
        &self.instances
    }

    pub fn cache(&self) -> &ScriptCache {
        &self.cache
    }

    /// Builds this worker's object set: one object per plan entry, each bound
    /// to its script's descriptor and to a fresh instance record whose
    /// `instance_id` counts up from 0 within this worker.
    pub fn populate(&mut self, plan: &[String]) -> Result<(), LoadError> {
        debug_assert_eq!(self.state, WorkerState::Populating);
        for name in plan {
            let script = self.cache.ensure_loaded(&self.engine, &mut self.scope, name)?;
            let instance_id = self.objects.len() as u64;
            let handle = self.instances.allocate(self.worker_id, instance_id);
            self.objects.append(script, handle);
        }
        Ok(())
    }

    /// Runs update cycles until the stop token is observed. The token is
    /// checked only at cycle boundaries: a request lets the in-progress pass
    /// over the object table finish, so objects always see complete cycles.
    /// Returns the number of complete cycles executed.
    pub fn run(&mut self) -> Result<u64, InvocationError> {
        debug_assert_eq!(self.state, WorkerState::Populating);
        self.state = WorkerState::Running;
        let mut cycles = 0u64;
        while !self.stop.is_requested() {
            self.cycle()?;
            cycles += 1;
        }
        self.state = WorkerState::Stopping;
        Ok(cycles)
    }

    /// One pass over the object table in index order, invoking each object's
    /// entry point with its shared instance record as the sole argument.
    fn cycle(&mut self) -> Result<(), InvocationError> {
        for index in 0..self.objects.len() {
            let entry = self.objects.at(index);
            let descriptor = self.cache.descriptor(entry.script);
            let state = self.instances.state(entry.instance).clone();
            self.invoke(&descriptor.entry_point, &descriptor.ast, state)?;
        }
        Ok(())
    }

    fn invoke(&mut self, entry_point: &str, ast: &AST, state: Dynamic) -> Result<(), InvocationError> {
        // The top-level body already ran at load time; eval_ast(false) keeps
        // call_fn from running it again on every invocation.
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        self.engine
            .call_fn_with_options::<()>(options, &mut self.scope, ast, entry_point, (state,))
            .map_err(|err| InvocationError {
                entry_point: entry_point.to_string(),
                message: err.to_string(),
            })
    }

    /// Instance ids of every live object, in table order. Host-side
    /// inspection used for run summaries.
    pub fn instance_ids(&self) -> Vec<i64> {
        self.objects
            .iter()
            .map(|entry| {
                let record = self.instances.snapshot(entry.instance);
                record.get("instance_id").and_then(|value| value.as_int().ok()).unwrap_or(-1)
            })
            .collect()
    }

    /// Tears the runtime down: releases every allocated handle and drops the
    /// interpreter. Returns the number of handles released.
    pub fn close(mut self) -> usize {
        let mut released = 0;
        for index in 0..self.objects.len() {
            let entry = self.objects.at(index);
            self.instances.release(entry.instance);
            released += 1;
        }
        debug_assert_eq!(self.instances.live(), 0);
        self.state = WorkerState::Closed;
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::NameScheme;
    use std::fs;
    use std::path::Path;

    fn write_script(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("write script");
    }

    fn worker_for(dir: &Path, stop: StopToken) -> WorkerRuntime {
        WorkerRuntime::new(0, ScriptLoader::new(dir, NameScheme::default()), stop, 1)
    }

    #[test]
    fn stop_requested_before_run_means_zero_cycles() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(dir.path(), "idle.rhai", "fn idle_update(state) {}");
        let stop = StopToken::new();
        let mut worker = worker_for(dir.path(), stop.clone());
        worker.populate(&["idle.rhai".to_string()]).expect("populate");
        stop.request();
        let cycles = worker.run().expect("run");
        assert_eq!(cycles, 0);
        assert_eq!(worker.state(), WorkerState::Stopping);
    }

    #[test]
    fn script_driven_stop_finishes_the_cycle_it_was_raised_in() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(
            dir.path(),
            "ticker.rhai",
            r#"
                fn ticker_update(state) {
                    let ticks = if "ticks" in state { state.ticks } else { 0 };
                    state.ticks = ticks + 1;
                    if state.instance_id == 0 && state.ticks >= 5 {
                        stop();
                    }
                }
            "#,
        );
        let mut worker = worker_for(dir.path(), StopToken::new());
        let plan: Vec<String> = (0..4).map(|_| "ticker.rhai".to_string()).collect();
        worker.populate(&plan).expect("populate");
        let cycles = worker.run().expect("run");
        assert_eq!(cycles, 5, "stop is observed at the next cycle boundary");
        // Object 0 raised the stop mid-cycle; every later object still got
        // its fifth update before the loop exited.
        for entry in worker.objects().iter() {
            let record = worker.instances().snapshot(entry.instance);
            assert_eq!(record.get("ticks").and_then(|v| v.as_int().ok()), Some(5));
        }
    }

    #[test]
    fn populate_assigns_sequential_instance_ids() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(dir.path(), "idle.rhai", "fn idle_update(state) {}");
        let mut worker = worker_for(dir.path(), StopToken::new());
        let plan: Vec<String> = (0..7).map(|_| "idle.rhai".to_string()).collect();
        worker.populate(&plan).expect("populate");
        assert_eq!(worker.instances().live(), 7);
        assert_eq!(worker.instance_ids(), (0..7).collect::<Vec<i64>>());
    }

    #[test]
    fn missing_entry_point_is_an_invocation_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(dir.path(), "misnamed.rhai", "fn wrong_name(state) {}");
        let stop = StopToken::new();
        let mut worker = worker_for(dir.path(), stop);
        worker.populate(&["misnamed.rhai".to_string()]).expect("populate");
        let err = worker.run().unwrap_err();
        assert!(
            err.entry_point == "misnamed_update",
            "error should name the entry point, got {err}"
        );
    }

    #[test]
    fn entry_point_errors_carry_the_script_message() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(
            dir.path(),
            "faulty.rhai",
            r#"fn faulty_update(state) { throw "object exploded"; }"#,
        );
        let mut worker = worker_for(dir.path(), StopToken::new());
        worker.populate(&["faulty.rhai".to_string()]).expect("populate");
        let err = worker.run().unwrap_err();
        assert!(err.message.contains("object exploded"), "got: {}", err.message);
    }

    #[test]
    fn bad_script_name_surfaces_during_population() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut worker = worker_for(dir.path(), StopToken::new());
        let err = worker.populate(&["no_suffix".to_string()]).unwrap_err();
        assert!(matches!(err, LoadError::BadName { .. }));
    }

    #[test]
    fn scripts_can_query_the_pool_size() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(
            dir.path(),
            "aware.rhai",
            r#"
                fn aware_update(state) {
                    state.pool = worker_count();
                    stop();
                }
            "#,
        );
        let mut worker =
            WorkerRuntime::new(2, ScriptLoader::new(dir.path(), NameScheme::default()), StopToken::new(), 6);
        worker.populate(&["aware.rhai".to_string()]).expect("populate");
        worker.run().expect("run");
        let entry = worker.objects().at(0);
        let record = worker.instances().snapshot(entry.instance);
        assert_eq!(record.get("pool").and_then(|v| v.as_int().ok()), Some(6));
    }

    #[test]
    fn close_releases_every_handle() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(dir.path(), "idle.rhai", "fn idle_update(state) {}");
        let mut worker = worker_for(dir.path(), StopToken::new());
        let plan: Vec<String> = (0..3).map(|_| "idle.rhai".to_string()).collect();
        worker.populate(&plan).expect("populate");
        assert_eq!(worker.close(), 3);
    }

    #[test]
    fn state_mutations_persist_across_cycles() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(
            dir.path(),
            "acc.rhai",
            r#"
                fn acc_update(state) {
                    let total = if "total" in state { state.total } else { 0 };
                    state.total = total + state.instance_id + 1;
                    if state.total >= 3 { stop(); }
                }
            "#,
        );
        let mut worker = worker_for(dir.path(), StopToken::new());
        worker.populate(&["acc.rhai".to_string()]).expect("populate");
        let cycles = worker.run().expect("run");
        assert_eq!(cycles, 3, "instance 0 adds 1 per cycle and stops at 3");
    }
}
