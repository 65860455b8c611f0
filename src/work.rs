//! The build engine: demand-driven target resolution, cache checks, and the
//! driver loop.
//!
//! Everything runs on one cooperative scheduler; engine state is only ever
//! touched between suspension points, so a `RefCell` per structure is
//! enough.  Parallelism comes from overlapping child processes and file
//! I/O, with command execution bounded by the job pool.

use crate::db;
use crate::depfile;
use crate::error::{BuildError, UpdateError, UpdateResult};
use crate::hash::FileHasher;
use crate::jobs::JobPool;
use crate::process;
use crate::task::{self, Key, Pending, Task, TaskKind};
use futures::future::{join_all, LocalBoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Instant;

struct State {
    registry: RefCell<HashMap<String, Rc<Task>>>,
    hasher: FileHasher,
    jobs: JobPool,
    cache_path: String,
    commands_run: Cell<usize>,
    tasks_cached: Cell<usize>,
}

/// Handle to the engine; clones share one registry, hash cache, and job
/// pool.  Cheap to clone into the `'static` futures that back in-flight
/// task updates.
#[derive(Clone)]
pub struct Work {
    state: Rc<State>,
}

impl Work {
    pub fn new(jobs: usize, cache_path: impl Into<String>) -> Self {
        Work {
            state: Rc::new(State {
                registry: RefCell::new(HashMap::new()),
                hasher: FileHasher::new(),
                jobs: JobPool::new(jobs),
                cache_path: cache_path.into(),
                commands_run: Cell::new(0),
                tasks_cached: Cell::new(0),
            }),
        }
    }

    pub fn jobs(&self) -> usize {
        self.state.jobs.count()
    }

    /// Registers `task` as the producer of each of its targets.  A later
    /// registration for a target silently replaces the earlier one.
    pub fn register(&self, task: Task) -> Rc<Task> {
        let task = Rc::new(task);
        let mut registry = self.state.registry.borrow_mut();
        for target in &task.targets {
            registry.insert(target.clone(), Rc::clone(&task));
        }
        task
    }

    pub fn lookup(&self, target: &str) -> Option<Rc<Task>> {
        self.state.registry.borrow().get(target).cloned()
    }

    /// Brings every listed target up to date, concurrently.
    ///
    /// Registered targets share their task's in-flight update; an abstract
    /// target without a task is an error; anything else must name a file
    /// that already exists.
    pub async fn resolve(&self, targets: &[String], requester: &str) -> UpdateResult<()> {
        let mut waits: Vec<LocalBoxFuture<'_, UpdateResult<()>>> = Vec::new();
        for target in targets {
            match self.lookup(target) {
                Some(tsk) => waits.push(self.update_task(tsk, requester).boxed_local()),
                None if task::is_abstract(target) => {
                    let msg = format!("abstract target {} has no task", target);
                    waits.push(async move { Err(BuildError::new(msg).into()) }.boxed_local());
                }
                None => waits.push(check_source(target).boxed_local()),
            }
        }
        for result in join_all(waits).await {
            result?;
        }
        Ok(())
    }

    /// Returns the task's in-flight update, installing one if this is the
    /// first request this run.
    fn update_task(&self, tsk: Rc<Task>, requester: &str) -> Pending {
        let mut pending = tsk.pending.borrow_mut();
        if let Some(p) = pending.as_ref() {
            return p.clone();
        }
        log::debug!("update {} (wanted by {})", tsk.label, requester);
        *tsk.requested_by.borrow_mut() = Some(requester.to_string());

        let this = self.clone();
        let t = Rc::clone(&tsk);
        let p = async move { this.run_task(t).await }.boxed_local().shared();
        *pending = Some(p.clone());
        p
    }

    /// One task update.  A build failure is reported here, once, and every
    /// awaiter observes it as `prerequisite failed`; internal errors pass
    /// through untouched.
    async fn run_task(self, tsk: Rc<Task>) -> UpdateResult<()> {
        match self.update_body(&tsk).await {
            Ok(()) => Ok(()),
            Err(UpdateError::Build(err)) => {
                eprintln!("!!! FAILED [{}] {}", tsk.label, err);
                Err(BuildError::new("prerequisite failed").into())
            }
            Err(err) => Err(err),
        }
    }

    async fn update_body(&self, tsk: &Rc<Task>) -> UpdateResult<()> {
        if tsk.cacheable() {
            let cached = tsk.cached_key.borrow().clone();
            match cached {
                Some(cached) => {
                    let key = self.task_key(tsk).await?;
                    if task::canon(&key) == task::canon(&cached) {
                        log::debug!("cached {}", tsk.label);
                        self.state.tasks_cached.set(self.state.tasks_cached.get() + 1);
                        return Ok(());
                    }
                    log::debug!(
                        "rebuild {} (wanted by {}): key changed",
                        tsk.label,
                        tsk.requested_by.borrow().as_deref().unwrap_or("user"),
                    );
                }
                None => log::debug!(
                    "rebuild {} (wanted by {}): no cached key",
                    tsk.label,
                    tsk.requested_by.borrow().as_deref().unwrap_or("user"),
                ),
            }
        }
        self.task_body(tsk).await?;
        if tsk.cacheable() {
            let key = self.task_key(tsk).await?;
            *tsk.cached_key.borrow_mut() = Some(key);
        }
        Ok(())
    }

    /// Computes the task's cache key.  Prerequisites are brought up to date
    /// first so their files exist to be hashed.
    async fn task_key(&self, tsk: &Rc<Task>) -> UpdateResult<Key> {
        self.resolve(&tsk.prereqs, &tsk.label).await?;
        match &tsk.kind {
            TaskKind::Recipe { recipe } => {
                let mut files = tsk.targets.clone();
                files.extend(tsk.prereqs.iter().cloned());
                let mut key: Vec<Value> = recipe.iter().map(|cmd| cmd.clone().into()).collect();
                key.extend(self.state.hasher.hash_files(&files).await.into_iter().map(Value::from));
                Ok(Value::Array(key))
            }
            TaskKind::Compile {
                object,
                dep_info,
                compile_command,
                probe_command,
            } => {
                let discovered = self.discovered_deps(tsk, dep_info).await?;
                let mut files = vec![object.clone(), dep_info.clone()];
                files.extend(tsk.prereqs.iter().cloned());
                files.extend(discovered);
                let mut key: Vec<Value> =
                    vec![compile_command.clone().into(), probe_command.clone().into()];
                key.extend(self.state.hasher.hash_files(&files).await.into_iter().map(Value::from));
                Ok(Value::Array(key))
            }
            TaskKind::Link { exe, link_command } => {
                let mut files = vec![exe.clone()];
                files.extend(tsk.prereqs.iter().cloned());
                let mut key: Vec<Value> = vec![link_command.clone().into()];
                key.extend(self.state.hasher.hash_files(&files).await.into_iter().map(Value::from));
                Ok(Value::Array(key))
            }
        }
    }

    async fn task_body(&self, tsk: &Rc<Task>) -> UpdateResult<()> {
        self.resolve(&tsk.prereqs, &tsk.label).await?;
        match &tsk.kind {
            TaskKind::Recipe { recipe } => {
                for command in recipe {
                    self.run_command(command, &tsk.label).await?;
                }
                for target in &tsk.targets {
                    self.state.hasher.invalidate(target);
                }
            }
            TaskKind::Compile {
                object,
                dep_info,
                compile_command,
                probe_command,
            } => {
                self.state.hasher.invalidate(object);
                self.state.hasher.invalidate(dep_info);
                make_output_dirs(&[object.as_str(), dep_info.as_str()]).await?;
                self.run_command(compile_command, &tsk.label).await?;
                self.run_command(probe_command, &tsk.label).await?;
                self.state.hasher.invalidate(object);
                self.state.hasher.invalidate(dep_info);
                // Surface bad discovered edges at build time, not at the
                // next key computation.
                self.discovered_deps(tsk, dep_info).await?;
            }
            TaskKind::Link { exe, link_command } => {
                self.state.hasher.invalidate(exe);
                make_output_dirs(&[exe.as_str()]).await?;
                self.run_command(link_command, &tsk.label).await?;
                self.state.hasher.invalidate(exe);
            }
        }
        Ok(())
    }

    /// Dependencies learned from the probe's dep-info file.  Absent file
    /// means none discovered yet (first build); a discovered path produced
    /// by some other task has no ordering edge and is fatal.
    async fn discovered_deps(&self, tsk: &Rc<Task>, dep_info: &str) -> UpdateResult<Vec<String>> {
        let text = match tokio::fs::read_to_string(dep_info).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let deps = depfile::parse(dep_info, &text, &tsk.prereqs)?;
        let registry = self.state.registry.borrow();
        for dep in &deps {
            if let Some(owner) = registry.get(dep) {
                if !Rc::ptr_eq(owner, tsk) {
                    return Err(BuildError::new(format!(
                        "discovered dependency {} of {} is produced by task {}",
                        dep, tsk.label, owner.label
                    ))
                    .into());
                }
            }
        }
        Ok(deps)
    }

    async fn run_command(&self, command: &[String], label: &str) -> UpdateResult<()> {
        self.state.commands_run.set(self.state.commands_run.get() + 1);
        process::run_command(&self.state.jobs, command, label).await?;
        Ok(())
    }

    /// The driver: load the cache, update the given targets, persist the
    /// cache, report.  Returns false when the build failed with a
    /// `BuildError` (already printed).
    pub async fn update(&self, targets: &[String]) -> anyhow::Result<bool> {
        println!(
            "maek v{} with JOBS={}",
            env!("CARGO_PKG_VERSION"),
            self.state.jobs.count()
        );
        let start = Instant::now();
        self.start_run();
        self.load_cache()?;

        let result = self.resolve(targets, "user").await;
        self.save_cache()?;

        match result {
            Ok(()) => {
                println!(
                    "maek: finished in {:.3}s; ran {} commands, {} tasks up to date, {} hash cache hits",
                    start.elapsed().as_secs_f32(),
                    self.state.commands_run.get(),
                    self.state.tasks_cached.get(),
                    self.state.hasher.hits(),
                );
                Ok(true)
            }
            Err(UpdateError::Build(err)) => {
                println!("FAILED: {}", err);
                Ok(false)
            }
            Err(UpdateError::Internal(err)) => anyhow::bail!("{:#}", err),
        }
    }

    /// Per-run state dies with the run: pending handles, hash records,
    /// counters.
    fn start_run(&self) {
        for tsk in self.state.registry.borrow().values() {
            *tsk.pending.borrow_mut() = None;
            *tsk.requested_by.borrow_mut() = None;
        }
        self.state.hasher.reset();
        self.state.commands_run.set(0);
        self.state.tasks_cached.set(0);
    }

    fn load_cache(&self) -> anyhow::Result<()> {
        let registry = self.state.registry.borrow();
        for tsk in registry.values() {
            *tsk.cached_key.borrow_mut() = None;
        }
        let saved = match db::load(&self.state.cache_path)? {
            Some(saved) => saved,
            None => {
                println!("maek: no cache, starting fresh");
                return Ok(());
            }
        };
        let mut assigned = 0;
        let mut stale = 0;
        for (target, key) in saved {
            match registry.get(&target) {
                Some(tsk) => {
                    *tsk.cached_key.borrow_mut() = Some(key);
                    assigned += 1;
                }
                None => stale += 1,
            }
        }
        println!(
            "maek: loaded {} cached keys ({} stale entries dropped)",
            assigned, stale
        );
        Ok(())
    }

    fn save_cache(&self) -> anyhow::Result<()> {
        let registry = self.state.registry.borrow();
        let mut entries = BTreeMap::new();
        for (target, tsk) in registry.iter() {
            if let Some(key) = tsk.cached_key.borrow().as_ref() {
                entries.insert(target.clone(), key.clone());
            }
        }
        db::save(&self.state.cache_path, &entries)
    }
}

/// A target with no task must name a readable file.
async fn check_source(target: &str) -> UpdateResult<()> {
    match tokio::fs::File::open(target).await {
        Ok(_) => Ok(()),
        Err(_) => Err(BuildError::new(format!(
            "target {} has no task and doesn't exist",
            target
        ))
        .into()),
    }
}

/// Output files can live in directories that don't exist yet.
async fn make_output_dirs(paths: &[&str]) -> std::io::Result<()> {
    for path in paths {
        if let Some(dir) = std::path::Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
    }
    Ok(())
}
