//! The build queue: three-stage scheduling state machine and the
//! executor-dispatch rendezvous.
//!
//! Items move through the stages below; at any stage an item can be removed
//! by [`Queue::cancel`].
//!
//! ```text
//! (enter) --> waiting --+--> blocked
//!                       |       ^
//!                       |       |
//!                       |       v
//!                       +--> buildable ---> (dispatched)
//! ```
//!
//! The queue is a monitor: one lock guards the stage collections, the
//! parked-executor table, and the id counter. The single suspension point is
//! the parked wait inside [`Queue::pop`], taken with the monitor released.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::core::env::Environment;
use crate::core::error::QueueError;
use crate::core::item::{BlockedItem, BuildableItem, Item, WaitingItem};
use crate::core::node::{ExecutorHandle, ExecutorId, Mode, Node};
use crate::core::resources::ResourceController;
use crate::core::task::{Task, TaskHandle, TaskKey};
use crate::event::OneShotEvent;
use crate::infra::snapshot;
use crate::util::clock::Clock;

/// Parking slot created for each idle executor: an offer from the queue to
/// that executor, eventually filled with an item to build.
struct JobOffer {
    executor: ExecutorHandle,
    /// Wakes the parked executor, either with work or to re-run maintenance.
    event: OneShotEvent,
    /// The item this executor will build, once assigned. Only touched with
    /// the queue monitor held.
    item: Mutex<Option<BuildableItem>>,
}

impl JobOffer {
    fn new(executor: ExecutorHandle) -> Self {
        Self {
            executor,
            event: OneShotEvent::new(),
            item: Mutex::new(None),
        }
    }

    fn assign(&self, item: BuildableItem) {
        let mut slot = self.item.lock();
        debug_assert!(slot.is_none(), "offer assigned twice");
        *slot = Some(item);
        self.event.signal();
    }

    fn take_item(&self) -> Option<BuildableItem> {
        self.item.lock().take()
    }

    fn is_assigned(&self) -> bool {
        self.item.lock().is_some()
    }

    fn is_available(&self) -> bool {
        !self.is_assigned() && !self.executor.node().is_offline()
    }

    fn node(&self) -> &Arc<dyn Node> {
        self.executor.node()
    }

    fn accepts_any_task(&self) -> bool {
        self.node().mode() == Mode::Normal
    }
}

/// Everything the queue monitor guards.
struct State {
    /// Items still inside their quiet period, ordered by (due, id).
    waiting: BTreeSet<WaitingItem>,
    /// Past the quiet period but held back; at most one entry per task.
    blocked: HashMap<TaskKey, BlockedItem>,
    /// Ready to run; insertion-ordered so no ready task starves.
    buildable: IndexMap<TaskKey, BuildableItem>,
    /// Offers for the executors currently parked in [`Queue::pop`].
    parked: HashMap<ExecutorId, Arc<JobOffer>>,
    /// Next waiting-item id; strictly increasing for the queue's lifetime.
    iota: u64,
}

impl State {
    fn contains(&self, key: &TaskKey) -> bool {
        self.blocked.contains_key(key)
            || self.buildable.contains_key(key)
            || self.waiting.iter().any(|w| w.task.key() == *key)
    }

    /// Signals one parked offer that has no work assigned yet. Silent noop
    /// when every offer is already taken; the next executor to park runs
    /// maintenance itself.
    fn wake_one(&self) {
        for offer in self.parked.values() {
            if !offer.is_assigned() {
                offer.event.signal();
                return;
            }
        }
    }
}

/// The build queue.
///
/// Producers [`add`](Queue::add) tasks; executor worker threads call
/// [`pop`](Queue::pop) to claim the next one. Construction starts a
/// maintenance ticker thread; [`close`](Queue::close) stops and joins it.
pub struct Queue {
    state: Mutex<State>,
    resources: ResourceController,
    env: Arc<dyn Environment>,
    config: QueueConfig,
    clock: Clock,
    ticker: Mutex<Option<Ticker>>,
}

impl Queue {
    /// Creates a queue against the given environment, on the system clock.
    pub fn new(env: Arc<dyn Environment>, config: QueueConfig) -> Arc<Self> {
        Self::with_clock(env, config, Clock::system())
    }

    /// Creates a queue with an injected clock. Tests drive time through the
    /// clock to make quiet periods deterministic.
    pub fn with_clock(env: Arc<dyn Environment>, config: QueueConfig, clock: Clock) -> Arc<Self> {
        let interval = config.maintenance_interval();
        let queue = Arc::new_cyclic(|weak: &Weak<Self>| {
            // If every executor is busy, nothing else wakes the dispatcher
            // when a quiet period expires; the ticker is that safety net.
            let ticker = Ticker::start(weak.clone(), interval);
            Self {
                state: Mutex::new(State {
                    waiting: BTreeSet::new(),
                    blocked: HashMap::new(),
                    buildable: IndexMap::new(),
                    parked: HashMap::new(),
                    iota: 0,
                }),
                resources: ResourceController::new(),
                env,
                config,
                clock,
                ticker: Mutex::new(Some(ticker)),
            }
        });
        info!(
            interval_secs = interval.as_secs(),
            "build queue initialized"
        );
        queue
    }

    /// The resource controller backing the mutual-exclusion interlock.
    #[must_use]
    pub fn resources(&self) -> &ResourceController {
        &self.resources
    }

    /// Schedules a task using its own default quiet period.
    pub fn schedule(&self, task: TaskHandle) -> bool {
        let quiet_period = task.quiet_period();
        self.add(task, quiet_period)
    }

    /// Schedules an execution of a task after `quiet_period`.
    ///
    /// A task already moving toward execution (blocked or buildable) is left
    /// alone. A task still waiting keeps its entry: the due date can only be
    /// pulled in, never pushed out, so rapid re-triggers coalesce into the
    /// earliest requested instant.
    ///
    /// Returns true iff the queue state changed.
    pub fn add(&self, task: TaskHandle, quiet_period: Duration) -> bool {
        let key = task.key();
        let due = self
            .clock
            .now_ms()
            .saturating_add(u64::try_from(quiet_period.as_millis()).unwrap_or(u64::MAX));

        let mut state = self.state.lock();
        if state.blocked.contains_key(&key) || state.buildable.contains_key(&key) {
            // already in the blocked or buildable stage, no need to requeue
            return false;
        }

        if let Some(existing) = state.waiting.iter().find(|w| w.task.key() == key).cloned() {
            if existing.due_at_ms <= due {
                return false; // no double queueing
            }
            // pull the due date in; same id, re-inserted to keep the set order
            state.waiting.remove(&existing);
            state
                .waiting
                .insert(WaitingItem::new(task, due, existing.id));
            debug!(task = %key, due_at_ms = due, "due date pulled in");
        } else {
            let id = state.iota;
            state.iota += 1;
            state.waiting.insert(WaitingItem::new(task, due, id));
            debug!(task = %key, due_at_ms = due, id, "task added to queue");
        }

        // let an executor know that a new item is in the queue
        state.wake_one();
        true
    }

    /// Cancels a queued task, whatever stage it is in.
    ///
    /// Returns true if the task was in the queue and was removed. Has no
    /// effect on an already-dispatched executable.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::PermissionDenied`] from the task's own abort
    /// check, unchanged, before anything is removed.
    pub fn cancel(&self, task: &dyn Task) -> Result<bool, QueueError> {
        task.check_abort_permission()?;
        let key = task.key();
        debug!(task = %key, "cancelling queued task");
        let mut state = self.state.lock();
        if let Some(existing) = state.waiting.iter().find(|w| w.task.key() == key).cloned() {
            state.waiting.remove(&existing);
            return Ok(true);
        }
        // both stages are tried; either removal counts as success
        let blocked = state.blocked.remove(&key).is_some();
        let buildable = state.buildable.shift_remove(&key).is_some();
        Ok(blocked | buildable)
    }

    /// True if the queue holds an item for this task in any stage.
    pub fn contains(&self, task: &dyn Task) -> bool {
        self.state.lock().contains(&task.key())
    }

    /// True when all three stages are empty.
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.waiting.is_empty() && state.blocked.is_empty() && state.buildable.is_empty()
    }

    /// The queue item for the given task, if queued.
    pub fn item_for(&self, task: &dyn Task) -> Option<Item> {
        let key = task.key();
        let state = self.state.lock();
        if let Some(item) = state.blocked.get(&key) {
            return Some(Item::Blocked(item.clone()));
        }
        if let Some(item) = state.buildable.get(&key) {
            return Some(Item::Buildable(item.clone()));
        }
        state
            .waiting
            .iter()
            .find(|w| w.task.key() == key)
            .map(|w| Item::Waiting(w.clone()))
    }

    /// Snapshot of every queued item: waiting items in due order, then
    /// blocked, then buildable in dispatch order.
    pub fn items(&self) -> Vec<Item> {
        let state = self.state.lock();
        let mut items =
            Vec::with_capacity(state.waiting.len() + state.blocked.len() + state.buildable.len());
        items.extend(state.waiting.iter().cloned().map(Item::Waiting));
        items.extend(state.blocked.values().cloned().map(Item::Blocked));
        items.extend(state.buildable.values().cloned().map(Item::Buildable));
        items
    }

    /// The buildable items the given node is eligible to run, in dispatch
    /// order. A labelled task is only offered to nodes inside its label.
    pub fn buildable_items_for(&self, node: &dyn Node) -> Vec<BuildableItem> {
        let state = self.state.lock();
        state
            .buildable
            .values()
            .filter(|item| match item.task.assigned_label() {
                Some(label) => node.has_label(&label),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Human-readable reason the item is still queued, for status displays.
    #[must_use]
    pub fn why(&self, item: &Item) -> String {
        match item {
            Item::Waiting(w) => w.why(self.clock.now_ms()),
            Item::Blocked(b) => b.why(&self.resources),
            Item::Buildable(b) => b.why(self.env.as_ref()),
        }
    }

    /// Wakes exactly one idle parked executor so it re-runs maintenance.
    ///
    /// Call whenever conditions that could unblock a task have changed (a
    /// build finished, a resource was released, a node came online). Noop if
    /// nothing is parked; the next executor to park maintains the queue
    /// itself.
    pub fn schedule_maintenance(&self) {
        self.state.lock().wake_one();
    }

    /// Requests interruption of an executor's pending [`Queue::pop`] and
    /// wakes it if it is parked.
    pub fn interrupt(&self, executor: &ExecutorHandle) {
        executor.request_interrupt();
        let state = self.state.lock();
        if let Some(offer) = state.parked.get(&executor.id()) {
            offer.event.signal();
        }
    }

    /// Called by an executor to fetch its next task; blocks until one is
    /// assigned to this executor.
    ///
    /// The executor parks, runs maintenance, hands out ready items to parked
    /// executors (possibly including itself), then sleeps until signalled —
    /// with work, by [`Queue::schedule_maintenance`], or by the ticker — and
    /// loops until it has an assignment.
    ///
    /// # Errors
    ///
    /// - [`QueueError::AlreadyParked`] if this executor is already inside
    ///   `pop`.
    /// - [`QueueError::Interrupted`] if [`Queue::interrupt`] was called; any
    ///   item assigned in the meantime is re-queued and another executor is
    ///   woken to pick it up.
    pub fn pop(&self, executor: &ExecutorHandle) -> Result<TaskHandle, QueueError> {
        loop {
            let offer = Arc::new(JobOffer::new(executor.clone()));
            let sleep;
            {
                let mut state = self.state.lock();
                if executor.take_interrupt() {
                    // interrupted before parking; nothing to clean up
                    return Err(QueueError::Interrupted(executor.name().to_string()));
                }
                if state.parked.contains_key(&executor.id()) {
                    return Err(QueueError::AlreadyParked(executor.name().to_string()));
                }
                state.parked.insert(executor.id(), Arc::clone(&offer));

                // reuse this executor's thread for a round of maintenance,
                // then hand out whatever became buildable
                self.maintain_locked(&mut state);
                self.allocate_locked(&mut state);

                // sleep no longer than the earliest upcoming due date
                sleep = state.waiting.first().map(|head| {
                    let remaining = head.due_at_ms.saturating_sub(self.clock.now_ms());
                    Duration::from_millis(remaining.max(self.config.min_park_ms))
                });
            }

            // wait outside the monitor so other executors can maintain the
            // queue while this one sleeps; returns immediately if this
            // executor assigned work to itself above
            match sleep {
                Some(duration) => {
                    offer.event.wait_for(duration);
                }
                None => offer.event.wait(),
            }

            let mut state = self.state.lock();
            state.parked.remove(&executor.id());

            if executor.take_interrupt() {
                // someone else must build whatever was assigned meanwhile;
                // a concurrent add may already have re-introduced the task
                if let Some(item) = offer.take_item() {
                    let key = item.task.key();
                    if !state.contains(&key) {
                        state.buildable.insert(key, item);
                    }
                }
                state.wake_one();
                warn!(executor = executor.name(), "pop interrupted");
                return Err(QueueError::Interrupted(executor.name().to_string()));
            }

            if let Some(item) = offer.take_item() {
                debug!(
                    executor = executor.name(),
                    task = %item.task.key(),
                    "pop returning task"
                );
                // this executor may have been the one chosen for maintenance;
                // pass the duty on. Worst case is one pointless maintenance.
                state.wake_one();
                return Ok(item.task);
            }
            // woken without work: a timer tick or a maintenance request.
            // loop around to re-park and re-examine the queue.
        }
    }

    /// A task is blocked when it says so itself or when its resources cannot
    /// be acquired right now.
    fn is_build_blocked(&self, task: &TaskHandle) -> bool {
        task.is_build_blocked() || !self.resources.can_acquire(&task.resource_list())
    }

    /// Runs one maintenance round: re-examine blocked items, then drain due
    /// waiting items into blocked or buildable. Never dispatches; dispatch
    /// happens in [`Queue::pop`].
    pub fn maintain(&self) {
        let mut state = self.state.lock();
        self.maintain_locked(&mut state);
    }

    fn maintain_locked(&self, state: &mut State) {
        debug!("queue maintenance started");

        let unblocked: Vec<TaskKey> = state
            .blocked
            .iter()
            .filter(|(_, item)| !self.is_build_blocked(&item.task))
            .map(|(key, _)| key.clone())
            .collect();
        for key in unblocked {
            if let Some(item) = state.blocked.remove(&key) {
                debug!(task = %key, "no longer blocked");
                state.buildable.insert(key, item.into_buildable());
            }
        }

        let now = self.clock.now_ms();
        loop {
            match state.waiting.first() {
                Some(head) if head.due_at_ms <= now => {}
                _ => break, // every remaining item is still in its quiet period
            }
            let Some(head) = state.waiting.pop_first() else {
                break;
            };
            let key = head.task.key();
            if self.is_build_blocked(&head.task) {
                debug!(task = %key, "due but blocked");
                state.blocked.insert(key, head.into_blocked(now));
            } else {
                debug!(task = %key, "ready to build");
                state.buildable.insert(key, head.into_buildable(now));
            }
        }
    }

    /// Hands buildable items to parked executors, in insertion order. Items
    /// that turn out to be blocked are demoted; items no parked executor fits
    /// stay put so later items can still match other executors.
    fn allocate_locked(&self, state: &mut State) {
        let keys: Vec<TaskKey> = state.buildable.keys().cloned().collect();
        for key in keys {
            let Some(task) = state.buildable.get(&key).map(|item| item.task.clone()) else {
                continue;
            };

            // one last check before committing an executor to this item
            if self.is_build_blocked(&task) {
                if let Some(item) = state.buildable.shift_remove(&key) {
                    debug!(task = %key, "blocked at dispatch, demoting");
                    state.blocked.insert(key, item.into_blocked());
                }
                continue;
            }

            let Some(offer) = self.choose_locked(state, &task) else {
                continue;
            };
            if let Some(item) = state.buildable.shift_remove(&key) {
                debug!(
                    task = %key,
                    executor = offer.executor.name(),
                    "assigned to executor"
                );
                offer.assign(item);
            }
        }
    }

    /// Picks a parked executor fit to run the given task, or `None`.
    ///
    /// Policy, first match wins: nothing while the controller quiets down; a
    /// labelled task only matches nodes in its label; then affinity to the
    /// node of the previous build; then, for large deployments or long
    /// builds, agents are preferred and the controller node is kept free for
    /// coordination; finally any non-exclusive node.
    fn choose_locked(&self, state: &State, task: &TaskHandle) -> Option<Arc<JobOffer>> {
        if self.env.is_quieting_down() {
            // leave every executor free so the controller can wind down
            return None;
        }

        if let Some(label) = task.assigned_label() {
            return state
                .parked
                .values()
                .find(|offer| offer.is_available() && offer.node().has_label(&label))
                .cloned();
        }

        let large = self.env.agent_count() > self.config.large_deployment_agents;
        let long = task.estimated_duration_ms()
            > i64::try_from(self.config.long_task_ms).unwrap_or(i64::MAX);
        let prefer_agents = large || long;

        // the node of the last build usually has an up-to-date workspace
        if let Some(last) = task.last_built_on() {
            for offer in state.parked.values() {
                if offer.is_available()
                    && offer.node().name() == last
                    && offer.node().mode() == Mode::Normal
                {
                    if large && offer.node().is_controller() {
                        break; // the controller is reserved for coordination
                    }
                    return Some(Arc::clone(offer));
                }
            }
        }

        if prefer_agents {
            if let Some(offer) = state.parked.values().find(|offer| {
                offer.is_available() && offer.accepts_any_task() && !offer.node().is_controller()
            }) {
                return Some(Arc::clone(offer));
            }
        }

        state
            .parked
            .values()
            .find(|offer| {
                offer.is_available()
                    && offer.accepts_any_task()
                    && !(prefer_agents && offer.node().is_controller())
            })
            .cloned()
    }

    /// Persists the names of all queued items, one per line. Best-effort: an
    /// I/O failure is logged and swallowed.
    pub fn save(&self) {
        let names: Vec<String> = {
            let state = self.state.lock();
            let mut names =
                Vec::with_capacity(state.waiting.len() + state.blocked.len() + state.buildable.len());
            names.extend(state.waiting.iter().map(|i| i.task.name()));
            names.extend(state.blocked.values().map(|i| i.task.name()));
            names.extend(state.buildable.values().map(|i| i.task.name()));
            names
        };
        let path = self.config.snapshot_path();
        if let Err(error) = snapshot::write_names(&path, &names) {
            warn!(path = %path.display(), %error, "failed to write the queue snapshot");
        }
    }

    /// Restores a previously saved snapshot: each name that still resolves is
    /// re-scheduled with its own quiet period, unknown names are skipped, and
    /// the file is deleted once consumed. Best-effort; on failure the queue
    /// starts empty.
    pub fn load(&self) {
        let path = self.config.snapshot_path();
        let names = match snapshot::read_names(&path) {
            Ok(Some(names)) => names,
            Ok(None) => return,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to load the queue snapshot");
                return;
            }
        };
        let mut restored = 0usize;
        for name in names {
            match self.env.resolve_task(&name) {
                Some(task) => {
                    self.schedule(task);
                    restored += 1;
                }
                None => debug!(task = %name, "snapshot names an unknown task, skipping"),
            }
        }
        info!(restored, "queue snapshot loaded");
        snapshot::discard(&path);
    }

    /// Stops the maintenance ticker and joins its thread. Idempotent.
    pub fn close(&self) {
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.stop();
        }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        // Signal the ticker but do not join it here; close() is the graceful
        // path. A detached ticker observes the dropped sender and exits.
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.detach();
        }
    }
}

/// Periodic maintenance: a dedicated thread that re-evaluates due dates
/// every few seconds. It holds only a weak reference; once the queue is
/// gone, or the stop side of the channel is dropped, the thread exits.
struct Ticker {
    stop_tx: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Ticker {
    fn start(queue: Weak<Queue>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("queue-maintenance".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(queue) = queue.upgrade() else { break };
                        queue.maintain();
                        queue.schedule_maintenance();
                    }
                }
            })
            .ok();
        if handle.is_none() {
            warn!("failed to spawn the maintenance ticker thread");
        }
        Self { stop_tx, handle }
    }

    /// Stops the ticker and waits for the thread to exit.
    fn stop(mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Stops the ticker without joining.
    fn detach(mut self) {
        let _ = self.stop_tx.try_send(());
        self.handle.take();
    }
}
