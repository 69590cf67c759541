//! Build pipeline: priority-queued, worker-pooled compilation.
//!
//! Single entry point for all compilation requests:
//! - Scan-induced rebuilds → `PRIORITY_SCAN`
//! - User-initiated previews → `PRIORITY_PREVIEW` (waited on)
//!
//! Deduplication happens twice: queued tasks coalesce per component,
//! and in-flight builds coalesce per content hash, so at most one
//! compile runs per hash at any moment. Results land in the cache
//! (failures too) and fan out to subscribers.

mod compiler;
mod pool;
mod stderr;
mod types;

pub use compiler::{
    CommandCompiler, CompileOutput, Compiler, DEFAULT_COMPILE_TIMEOUT, Invocation,
    build_templar_vars, resolve_args, validate_argv,
};
pub use pool::{BufferPool, Scratch};
pub use stderr::parse_stderr;
pub use types::{BuildResult, BuildTask};

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Condvar, Mutex};

use crate::cache::BuildCache;
use crate::component::{ComponentInfo, ComponentRegistry};
use crate::errors::{ErrorCollector, ParsedError};
use crate::plugin::PluginManager;

/// Per-subscriber result buffer capacity.
const RESULT_BUFFER: usize = 100;

/// Queue depth cap; submissions beyond it fail fast.
const MAX_QUEUE: usize = 1000;

/// Pipeline construction parameters, lifted from the config.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub root: PathBuf,
    pub command: String,
    pub args: Vec<String>,
    pub workers: usize,
    pub compile_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl PipelineOptions {
    pub fn from_config(config: &crate::config::TemplarConfig) -> Self {
        Self {
            root: config.root.clone(),
            command: config.build.command.clone(),
            args: config.build.args.clone(),
            workers: config.build.worker_count(),
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            shutdown_grace: Duration::from_secs(config.build.shutdown_grace_secs),
        }
    }
}

/// Point-in-time pipeline counters for /health.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineStats {
    pub queued: usize,
    pub in_flight: usize,
    pub workers: usize,
}

type Waiter = Sender<BuildResult>;

struct QueuedTask {
    name: String,
    priority: i32,
    seq: u64,
    requeued: bool,
}

// Higher priority first; FIFO (smaller seq) within a priority.
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then(other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueuedTask {}

struct Pending {
    priority: i32,
    waiters: Vec<Waiter>,
}

struct ResultSubscriber {
    tx: Sender<BuildResult>,
    steal: Receiver<BuildResult>,
}

struct Inner {
    queue: Mutex<BinaryHeap<QueuedTask>>,
    notify: Condvar,
    /// Queued-task dedup: component name → best priority + waiters.
    pending: DashMap<String, Pending>,
    /// In-flight join: content hash → waiters.
    active: DashMap<String, Vec<Waiter>>,
    cache: Arc<BuildCache>,
    registry: Arc<ComponentRegistry>,
    collector: Arc<ErrorCollector>,
    plugins: Arc<PluginManager>,
    compiler: Box<dyn Compiler>,
    pool: BufferPool,
    subscribers: Mutex<Vec<ResultSubscriber>>,
    seq: AtomicU64,
    shutdown: AtomicBool,
    options: PipelineOptions,
}

/// Multi-worker build executor.
pub struct BuildPipeline {
    inner: Arc<Inner>,
    workers: Mutex<Vec<std::thread::JoinHandle<()>>>,
    started: AtomicBool,
}

impl BuildPipeline {
    pub fn new(
        options: PipelineOptions,
        cache: Arc<BuildCache>,
        registry: Arc<ComponentRegistry>,
        collector: Arc<ErrorCollector>,
        plugins: Arc<PluginManager>,
        compiler: Box<dyn Compiler>,
    ) -> Self {
        let pool = BufferPool::new(options.workers * 2);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(BinaryHeap::new()),
                notify: Condvar::new(),
                pending: DashMap::new(),
                active: DashMap::new(),
                cache,
                registry,
                collector,
                plugins,
                compiler,
                pool,
                subscribers: Mutex::new(Vec::new()),
                seq: AtomicU64::new(0),
                shutdown: AtomicBool::new(false),
                options,
            }),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Start worker threads (idempotent).
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut workers = self.workers.lock();
        for i in 0..self.inner.options.workers {
            let inner = Arc::clone(&self.inner);
            let handle = std::thread::Builder::new()
                .name(format!("templar-build-{i}"))
                .spawn(move || run_worker(&inner))
                .expect("failed to spawn build worker");
            workers.push(handle);
        }
        crate::debug!("build"; "{} worker(s) started", self.inner.options.workers);
    }

    /// Enqueue a task, fire-and-forget.
    pub fn submit(&self, task: BuildTask) {
        self.inner
            .enqueue(task.component_name, task.priority, None);
    }

    /// Enqueue (or join) a build and block until its result arrives.
    ///
    /// The wait is bounded: a worker stuck past the compile deadline
    /// plus a margin yields a failure instead of a hang.
    pub fn build_and_wait(&self, name: &str, priority: i32) -> BuildResult {
        let deadline = self.inner.options.compile_timeout + Duration::from_secs(30);

        // Fast path: current hash already cached.
        if let Some(info) = self.inner.registry.get(name) {
            if let Some(result) = self.inner.cache.get(&info.content_hash) {
                return result.as_cache_hit();
            }
            // Join an in-flight build for the same hash.
            let (tx, rx) = channel::bounded(1);
            if let Some(mut waiters) = self.inner.active.get_mut(&info.content_hash) {
                waiters.push(tx);
                return recv_result(&rx, name, deadline);
            }
            self.inner.enqueue(name.to_string(), priority, Some(tx));
            return recv_result(&rx, name, deadline);
        }

        BuildResult::failure(
            name,
            "",
            vec![ParsedError::new(name, 0, 0, "unknown component")],
            Duration::ZERO,
        )
    }

    /// Subscribe to every published build result.
    ///
    /// The receiver is owned by the caller; a full buffer drops that
    /// subscriber's oldest result.
    pub fn subscribe(&self) -> Receiver<BuildResult> {
        let (tx, rx) = channel::bounded(RESULT_BUFFER);
        self.inner.subscribers.lock().push(ResultSubscriber {
            tx,
            steal: rx.clone(),
        });
        rx
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            queued: self.inner.queue.lock().len(),
            in_flight: self.inner.active.len(),
            workers: self.inner.options.workers,
        }
    }

    /// Stop intake, drain in-flight builds up to the grace period, then
    /// return. Queued-but-unstarted tasks fail with a shutdown error.
    pub fn stop(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.notify.notify_all();

        // Fail queued tasks; their waiters must not hang.
        let drained: Vec<QueuedTask> = {
            let mut queue = self.inner.queue.lock();
            std::mem::take(&mut *queue).into_sorted_vec()
        };
        for task in drained {
            if let Some((_, pending)) = self.inner.pending.remove(&task.name) {
                let result = shutdown_result(&task.name);
                for waiter in &pending.waiters {
                    let _ = waiter.try_send(result.clone());
                }
            }
        }

        // The drain held the queue lock, so every worker is now either
        // parked or running a build; wake the parked ones again.
        self.inner.notify.notify_all();

        let deadline = Instant::now() + self.inner.options.shutdown_grace;
        while !self.inner.active.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        // Join workers that finished inside the grace period; any
        // straggler is abandoned to process teardown.
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }

        self.inner.subscribers.lock().clear();
    }
}

fn shutdown_result(name: &str) -> BuildResult {
    BuildResult::failure(
        name,
        "",
        vec![ParsedError::new(name, 0, 0, "pipeline shutting down")],
        Duration::ZERO,
    )
}

fn recv_result(rx: &Receiver<BuildResult>, name: &str, deadline: Duration) -> BuildResult {
    rx.recv_timeout(deadline).unwrap_or_else(|_| {
        BuildResult::failure(
            name,
            "",
            vec![ParsedError::new(name, 0, 0, "build wait timed out")],
            deadline,
        )
    })
}

// ============================================================================
// Intake
// ============================================================================

impl Inner {
    /// Join pending work for the component or enqueue a new task.
    fn enqueue(&self, name: String, priority: i32, waiter: Option<Waiter>) {
        if self.shutdown.load(Ordering::SeqCst) {
            if let Some(waiter) = waiter {
                let _ = waiter.try_send(shutdown_result(&name));
            }
            return;
        }

        if self.queue.lock().len() >= MAX_QUEUE && !self.pending.contains_key(&name) {
            crate::log!("build"; "queue full, rejecting {}", name);
            if let Some(waiter) = waiter {
                let _ = waiter.try_send(BuildResult::failure(
                    &name,
                    "",
                    vec![ParsedError::new(&name, 0, 0, "build queue full")],
                    Duration::ZERO,
                ));
            }
            return;
        }

        let needs_entry = match self.pending.entry(name.clone()) {
            Entry::Occupied(mut e) => {
                let state = e.get_mut();
                if let Some(waiter) = waiter {
                    state.waiters.push(waiter);
                }
                if priority > state.priority {
                    state.priority = priority;
                    true // priority upgrade: enqueue a fresh heap entry
                } else {
                    false
                }
            }
            Entry::Vacant(e) => {
                e.insert(Pending {
                    priority,
                    waiters: waiter.into_iter().collect(),
                });
                true
            }
        };

        if needs_entry {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            self.queue.lock().push(QueuedTask {
                name,
                priority,
                seq,
                requeued: false,
            });
            self.notify.notify_one();
        }
    }

    fn requeue(&self, name: String, priority: i32, waiters: Vec<Waiter>) {
        self.pending.insert(name.clone(), Pending { priority, waiters });
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.queue.lock().push(QueuedTask {
            name,
            priority,
            seq,
            requeued: true,
        });
        self.notify.notify_one();
    }

    /// Fan a result out to every subscriber, dropping each subscriber's
    /// oldest result when its buffer is full.
    fn publish(&self, result: &BuildResult) {
        let snapshot: Vec<(Sender<BuildResult>, Receiver<BuildResult>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| (s.tx.clone(), s.steal.clone()))
            .collect();

        let mut disconnected = false;
        for (tx, steal) in &snapshot {
            match tx.try_send(result.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(res)) => {
                    let _ = steal.try_recv();
                    if tx.try_send(res).is_err() {
                        disconnected = true;
                    }
                }
                Err(TrySendError::Disconnected(_)) => disconnected = true,
            }
        }
        if disconnected {
            self.subscribers
                .lock()
                .retain(|s| s.steal.receiver_count() > 1);
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

fn run_worker(inner: &Inner) {
    loop {
        let Some(task) = dequeue(inner) else {
            return;
        };
        if let Some((task, info)) = claim(inner, task) {
            execute(inner, task, info);
        }
    }
}

fn dequeue(inner: &Inner) -> Option<QueuedTask> {
    let mut queue = inner.queue.lock();
    while queue.is_empty() {
        if inner.shutdown.load(Ordering::SeqCst) {
            return None;
        }
        inner.notify.wait(&mut queue);
    }
    queue.pop()
}

/// Claim a queued task: resolve its pending entry, the component, the
/// cache, and the in-flight set. Returns work only when a compile is
/// actually needed.
fn claim(inner: &Inner, task: QueuedTask) -> Option<(QueuedTask, ComponentInfo)> {
    let waiters = match inner.pending.entry(task.name.clone()) {
        Entry::Occupied(e) => {
            if e.get().priority > task.priority {
                return None; // stale: a higher-priority entry is queued
            }
            e.remove().waiters
        }
        Entry::Vacant(_) => return None, // already claimed
    };

    let Some(info) = inner.registry.get(&task.name) else {
        let result = BuildResult::failure(
            &task.name,
            "",
            vec![ParsedError::new(&task.name, 0, 0, "unknown component")],
            Duration::ZERO,
        );
        deliver(&waiters, &result);
        return None;
    };

    // Cache hit: emit immediately, skip the compile entirely.
    if let Some(result) = inner.cache.get(&info.content_hash) {
        let result = result.as_cache_hit();
        deliver(&waiters, &result);
        inner.publish(&result);
        return None;
    }

    // In-flight build for the same hash: join it.
    match inner.active.entry(info.content_hash.clone()) {
        Entry::Occupied(mut e) => {
            e.get_mut().extend(waiters);
            None
        }
        Entry::Vacant(e) => {
            e.insert(waiters);
            Some((task, info))
        }
    }
}

fn execute(inner: &Inner, task: QueuedTask, info: ComponentInfo) {
    let hash = info.content_hash.clone();
    let name = info.name.clone();

    // Workers must always release the active slot and answer waiters,
    // even if the compile panics.
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        run_compile(inner, &task, &info)
    }))
    .unwrap_or_else(|_| {
        Outcome::Done(BuildResult::failure(
            &name,
            &hash,
            vec![ParsedError::new(&info.file_path, 0, 0, "compile panicked")],
            Duration::ZERO,
        ))
    });

    let waiters = inner
        .active
        .remove(&hash)
        .map(|(_, w)| w)
        .unwrap_or_default();

    match outcome {
        Outcome::Done(result) => {
            if result.success {
                inner.collector.clear(&name);
            } else {
                inner.collector.add(&name, result.errors.clone());
            }
            inner.cache.put(result.clone());
            deliver(&waiters, &result);
            inner.publish(&result);
        }
        Outcome::NeedsRequeue => {
            if task.requeued {
                let result = BuildResult::failure(
                    &name,
                    &hash,
                    vec![ParsedError::new(
                        &info.file_path,
                        0,
                        0,
                        "scratch pool exhausted",
                    )],
                    Duration::ZERO,
                );
                deliver(&waiters, &result);
                inner.publish(&result);
            } else {
                inner.requeue(task.name, task.priority, waiters);
            }
        }
    }
}

enum Outcome {
    Done(BuildResult),
    NeedsRequeue,
}

fn run_compile(inner: &Inner, _task: &QueuedTask, info: &ComponentInfo) -> Outcome {
    let started = Instant::now();
    let hash = &info.content_hash;

    // Plugin pre-build hooks; an error fails the build, not the host.
    if let Err(e) = inner.plugins.run_pre_build(info) {
        return Outcome::Done(BuildResult::failure(
            &info.name,
            hash,
            vec![ParsedError::new(&info.file_path, 0, 0, e.to_string()).with_rule("plugin")],
            started.elapsed(),
        ));
    }

    let Some(mut scratch) = inner.pool.acquire() else {
        return Outcome::NeedsRequeue;
    };

    // Assemble argv in pooled scratch space.
    let vars = build_templar_vars(info, &inner.options.root);
    scratch
        .argv
        .extend(resolve_args(&inner.options.args, &vars));

    if let Err(e) = validate_argv(&inner.options.command, &scratch.argv) {
        return Outcome::Done(BuildResult::failure(
            &info.name,
            hash,
            vec![ParsedError::new(&info.file_path, 0, 0, e.to_string()).with_rule("argv")],
            started.elapsed(),
        ));
    }

    let invocation = Invocation {
        program: &inner.options.command,
        args: &scratch.argv,
        cwd: &inner.options.root,
        timeout: inner.options.compile_timeout,
    };

    let mut result = match inner.compiler.compile(&invocation) {
        Ok(output) => {
            scratch.output.extend_from_slice(&output.stdout);
            if output.success {
                BuildResult::success(
                    &info.name,
                    hash,
                    scratch.output.clone(),
                    started.elapsed(),
                )
            } else {
                BuildResult::failure(
                    &info.name,
                    hash,
                    parse_stderr(&info.file_path, &output.stderr),
                    started.elapsed(),
                )
            }
        }
        Err(e) => BuildResult::failure(
            &info.name,
            hash,
            vec![ParsedError::new(&info.file_path, 0, 0, e.to_string())],
            started.elapsed(),
        ),
    };

    // Plugin post-build hooks observe (and may annotate) the result.
    if let Err(e) = inner.plugins.run_post_build(&mut result) {
        crate::log!("plugin"; "post_build failed: {}", e);
        result
            .errors
            .push(ParsedError::new(&info.file_path, 0, 0, e.to_string()).with_rule("plugin"));
    }

    Outcome::Done(result)
}

fn deliver(waiters: &[Waiter], result: &BuildResult) {
    for waiter in waiters {
        let _ = waiter.try_send(result.clone());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PRIORITY_PREVIEW, PRIORITY_SCAN};
    use crate::errors::TemplarError;
    use std::sync::atomic::AtomicUsize;

    /// Compiler fake: records invocations, optionally sleeps.
    struct FakeCompiler {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl FakeCompiler {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    impl Compiler for Arc<FakeCompiler> {
        fn compile(&self, invocation: &Invocation<'_>) -> Result<CompileOutput, TemplarError> {
            validate_argv(invocation.program, invocation.args)?;
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            if self.fail {
                return Ok(CompileOutput {
                    success: false,
                    stdout: Vec::new(),
                    stderr: "button.templ:3:1: error: boom\n".to_string(),
                });
            }
            Ok(CompileOutput {
                success: true,
                stdout: b"<button>ok</button>".to_vec(),
                stderr: String::new(),
            })
        }
    }

    struct Fixture {
        pipeline: BuildPipeline,
        registry: Arc<ComponentRegistry>,
        compiler: Arc<FakeCompiler>,
    }

    fn fixture(compiler: FakeCompiler) -> Fixture {
        let registry = Arc::new(ComponentRegistry::new());
        let compiler = Arc::new(compiler);
        let options = PipelineOptions {
            root: PathBuf::from("/tmp"),
            command: "templ".to_string(),
            args: vec!["generate".to_string(), "-f".to_string(), "$TEMPLAR_FILE".to_string()],
            workers: 4,
            compile_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        };
        let pipeline = BuildPipeline::new(
            options,
            Arc::new(BuildCache::default()),
            Arc::clone(&registry),
            Arc::new(ErrorCollector::new()),
            Arc::new(PluginManager::new()),
            Box::new(Arc::clone(&compiler)),
        );
        Fixture {
            pipeline,
            registry,
            compiler,
        }
    }

    fn register(registry: &ComponentRegistry, name: &str, hash: &str) {
        let mut info = ComponentInfo::new(name, format!("/tmp/{name}.templ"));
        info.content_hash = hash.to_string();
        registry.register(info);
    }

    #[test]
    fn test_build_success_delivers_output() {
        let f = fixture(FakeCompiler::new());
        register(&f.registry, "Button", "aaaa");
        f.pipeline.start();

        let result = f.pipeline.build_and_wait("Button", PRIORITY_PREVIEW);
        assert!(result.success);
        assert!(!result.cache_hit);
        assert_eq!(result.output_bytes.unwrap(), b"<button>ok</button>");
        f.pipeline.stop();
    }

    #[test]
    fn test_second_build_is_cache_hit() {
        let f = fixture(FakeCompiler::new());
        register(&f.registry, "Button", "aaaa");
        f.pipeline.start();

        let first = f.pipeline.build_and_wait("Button", PRIORITY_PREVIEW);
        let second = f.pipeline.build_and_wait("Button", PRIORITY_PREVIEW);

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(f.compiler.calls.load(Ordering::SeqCst), 1);
        f.pipeline.stop();
    }

    #[test]
    fn test_concurrent_duplicates_coalesce_to_one_compile() {
        let f = fixture(FakeCompiler::slow(Duration::from_millis(150)));
        register(&f.registry, "Button", "aaaa");
        f.pipeline.start();

        let results: Vec<BuildResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..5)
                .map(|_| scope.spawn(|| f.pipeline.build_and_wait("Button", PRIORITY_PREVIEW)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.success));
        assert!(
            results
                .iter()
                .all(|r| r.content_hash == results[0].content_hash)
        );
        // Exactly one compiler invocation for five requests.
        assert_eq!(f.compiler.calls.load(Ordering::SeqCst), 1);
        f.pipeline.stop();
    }

    #[test]
    fn test_failed_build_caches_and_reports() {
        let f = fixture(FakeCompiler::failing());
        register(&f.registry, "Button", "bbbb");
        f.pipeline.start();

        let first = f.pipeline.build_and_wait("Button", PRIORITY_PREVIEW);
        assert!(!first.success);
        assert_eq!(first.errors.len(), 1);
        assert_eq!(first.errors[0].line, 3);

        // Failure is cached: no second invocation for the same hash.
        let second = f.pipeline.build_and_wait("Button", PRIORITY_PREVIEW);
        assert!(second.cache_hit);
        assert!(!second.success);
        assert_eq!(f.compiler.calls.load(Ordering::SeqCst), 1);
        f.pipeline.stop();
    }

    #[test]
    fn test_unknown_component_fails_fast() {
        let f = fixture(FakeCompiler::new());
        f.pipeline.start();

        let result = f.pipeline.build_and_wait("Ghost", PRIORITY_SCAN);
        assert!(!result.success);
        assert!(result.errors[0].message.contains("unknown"));
        f.pipeline.stop();
    }

    #[test]
    fn test_hash_change_invalidates_cache_path() {
        let f = fixture(FakeCompiler::new());
        register(&f.registry, "Button", "aaaa");
        f.pipeline.start();

        f.pipeline.build_and_wait("Button", PRIORITY_PREVIEW);
        register(&f.registry, "Button", "cccc");
        let rebuilt = f.pipeline.build_and_wait("Button", PRIORITY_PREVIEW);

        assert!(!rebuilt.cache_hit);
        assert_eq!(rebuilt.content_hash, "cccc");
        assert_eq!(f.compiler.calls.load(Ordering::SeqCst), 2);
        f.pipeline.stop();
    }

    #[test]
    fn test_subscribers_receive_results() {
        let f = fixture(FakeCompiler::new());
        register(&f.registry, "Button", "aaaa");
        let results = f.pipeline.subscribe();
        f.pipeline.start();

        f.pipeline.submit(BuildTask::new("Button", PRIORITY_SCAN));

        let result = results
            .recv_timeout(Duration::from_secs(5))
            .expect("subscriber should receive the build result");
        assert_eq!(result.component_name, "Button");
        assert!(result.success);
        f.pipeline.stop();
    }

    #[test]
    fn test_queue_orders_by_priority_then_fifo() {
        let mut heap = BinaryHeap::new();
        heap.push(QueuedTask { name: "low-1".into(), priority: 0, seq: 1, requeued: false });
        heap.push(QueuedTask { name: "high".into(), priority: 10, seq: 2, requeued: false });
        heap.push(QueuedTask { name: "low-0".into(), priority: 0, seq: 0, requeued: false });

        assert_eq!(heap.pop().unwrap().name, "high");
        assert_eq!(heap.pop().unwrap().name, "low-0");
        assert_eq!(heap.pop().unwrap().name, "low-1");
    }

    #[test]
    fn test_stop_fails_queued_waiters() {
        let f = fixture(FakeCompiler::new());
        register(&f.registry, "Button", "aaaa");
        // Workers never started: the queue cannot drain.
        f.pipeline.submit(BuildTask::new("Button", PRIORITY_SCAN));
        f.pipeline.stop();

        let result = f.pipeline.build_and_wait("Button", PRIORITY_PREVIEW);
        assert!(!result.success);
    }
}
