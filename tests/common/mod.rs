//! Shared test doubles: tasks, nodes, and a controller environment of
//! whatever shape a scenario needs.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use forge_queue::core::{
    Environment, Executable, ExecutorHandle, ExecutorId, Label, Mode, Node, Queue, QueueError,
    ResourceActivity, ResourceList, Task, TaskHandle, TaskKey,
};

/// A task the tests can reconfigure while it sits in the queue.
pub struct TestTask {
    name: String,
    label: Option<Label>,
    last_built_on: Option<String>,
    blocked: AtomicBool,
    resources: ResourceList,
    estimated_ms: i64,
    quiet: Duration,
    abortable: bool,
}

impl TestTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            last_built_on: None,
            blocked: AtomicBool::new(false),
            resources: ResourceList::empty(),
            estimated_ms: -1,
            quiet: Duration::ZERO,
            abortable: true,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(Label::new(label));
        self
    }

    pub fn with_last_built_on(mut self, node: &str) -> Self {
        self.last_built_on = Some(node.to_string());
        self
    }

    pub fn with_resources(mut self, resources: ResourceList) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_estimated_ms(mut self, ms: i64) -> Self {
        self.estimated_ms = ms;
        self
    }

    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_abortable(mut self, abortable: bool) -> Self {
        self.abortable = abortable;
        self
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::Release);
    }
}

impl ResourceActivity for TestTask {
    fn resource_list(&self) -> ResourceList {
        self.resources.clone()
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

impl Task for TestTask {
    fn key(&self) -> TaskKey {
        TaskKey::new(&self.name)
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn assigned_label(&self) -> Option<Label> {
        self.label.clone()
    }

    fn last_built_on(&self) -> Option<String> {
        self.last_built_on.clone()
    }

    fn is_build_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire)
    }

    fn why_blocked(&self) -> String {
        "held back by the test".to_string()
    }

    fn estimated_duration_ms(&self) -> i64 {
        self.estimated_ms
    }

    fn quiet_period(&self) -> Duration {
        self.quiet
    }

    fn create_executable(&self) -> Result<Box<dyn Executable>, QueueError> {
        Ok(Box::new(NoopExecutable))
    }

    fn has_abort_permission(&self) -> bool {
        self.abortable
    }
}

struct NoopExecutable;

impl Executable for NoopExecutable {
    fn run(&mut self) {}
}

pub fn task(name: &str) -> Arc<TestTask> {
    Arc::new(TestTask::new(name))
}

/// A node whose offline state tests can flip.
pub struct TestNode {
    name: String,
    mode: Mode,
    controller: bool,
    offline: AtomicBool,
    labels: Vec<String>,
}

impl TestNode {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }
}

impl Node for TestNode {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn is_controller(&self) -> bool {
        self.controller
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    fn has_label(&self, label: &Label) -> bool {
        self.labels.iter().any(|l| l == label.name())
    }
}

pub fn controller_node() -> Arc<TestNode> {
    Arc::new(TestNode {
        name: "controller".into(),
        mode: Mode::Normal,
        controller: true,
        offline: AtomicBool::new(false),
        labels: Vec::new(),
    })
}

pub fn agent_node(name: &str, labels: &[&str]) -> Arc<TestNode> {
    Arc::new(TestNode {
        name: name.into(),
        mode: Mode::Normal,
        controller: false,
        offline: AtomicBool::new(false),
        labels: labels.iter().map(|l| (*l).to_string()).collect(),
    })
}

pub fn exclusive_node(name: &str, labels: &[&str]) -> Arc<TestNode> {
    Arc::new(TestNode {
        name: name.into(),
        mode: Mode::Exclusive,
        controller: false,
        offline: AtomicBool::new(false),
        labels: labels.iter().map(|l| (*l).to_string()).collect(),
    })
}

/// Controller environment with an adjustable shape and a task registry for
/// snapshot resolution.
pub struct TestEnv {
    quieting: AtomicBool,
    agents: AtomicUsize,
    registry: Mutex<HashMap<String, TaskHandle>>,
}

impl TestEnv {
    pub fn set_quieting(&self, quieting: bool) {
        self.quieting.store(quieting, Ordering::Release);
    }

    pub fn set_agent_count(&self, agents: usize) {
        self.agents.store(agents, Ordering::Release);
    }

    pub fn register(&self, task: TaskHandle) {
        self.registry.lock().insert(task.name(), task);
    }
}

impl Environment for TestEnv {
    fn is_quieting_down(&self) -> bool {
        self.quieting.load(Ordering::Acquire)
    }

    fn agent_count(&self) -> usize {
        self.agents.load(Ordering::Acquire)
    }

    fn resolve_task(&self, name: &str) -> Option<TaskHandle> {
        self.registry.lock().get(name).cloned()
    }
}

pub fn test_env() -> Arc<TestEnv> {
    Arc::new(TestEnv {
        quieting: AtomicBool::new(false),
        agents: AtomicUsize::new(1),
        registry: Mutex::new(HashMap::new()),
    })
}

pub fn executor(id: u64, name: &str, node: Arc<TestNode>) -> ExecutorHandle {
    ExecutorHandle::new(ExecutorId(id), name, node)
}

/// Runs `pop` on its own thread, delivering the result through a channel so
/// tests can wait with a timeout.
pub fn spawn_pop(
    queue: &Arc<Queue>,
    exec: &ExecutorHandle,
) -> mpsc::Receiver<Result<TaskHandle, QueueError>> {
    let (tx, rx) = mpsc::channel();
    let queue = Arc::clone(queue);
    let exec = exec.clone();
    thread::spawn(move || {
        let _ = tx.send(queue.pop(&exec));
    });
    rx
}

/// Generous bound for anything that should complete promptly.
pub const WAIT: Duration = Duration::from_secs(5);

/// Long enough to conclude that a parked executor was *not* handed work.
pub const SETTLE: Duration = Duration::from_millis(300);
