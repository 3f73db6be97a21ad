//! Benchmarks for the build queue.
//!
//! Covers the producer path (add/cancel), the maintenance sweep, and the
//! full park-and-dispatch rendezvous.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use forge_queue::config::QueueConfig;
use forge_queue::core::{
    Environment, Executable, ExecutorHandle, ExecutorId, Label, Mode, Node, Queue, QueueError,
    ResourceActivity, ResourceList, Task, TaskHandle, TaskKey,
};
use forge_queue::util::clock::Clock;

// ============================================================================
// Bench doubles
// ============================================================================

struct BenchTask {
    name: String,
}

impl ResourceActivity for BenchTask {
    fn resource_list(&self) -> ResourceList {
        ResourceList::empty()
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

impl Task for BenchTask {
    fn key(&self) -> TaskKey {
        TaskKey::new(&self.name)
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_build_blocked(&self) -> bool {
        false
    }

    fn why_blocked(&self) -> String {
        String::new()
    }

    fn create_executable(&self) -> Result<Box<dyn Executable>, QueueError> {
        Ok(Box::new(NoopExecutable))
    }
}

struct NoopExecutable;

impl Executable for NoopExecutable {
    fn run(&mut self) {}
}

struct BenchNode;

impl Node for BenchNode {
    fn name(&self) -> String {
        "agent-1".into()
    }

    fn mode(&self) -> Mode {
        Mode::Normal
    }

    fn is_controller(&self) -> bool {
        false
    }

    fn is_offline(&self) -> bool {
        false
    }

    fn has_label(&self, _label: &Label) -> bool {
        false
    }
}

struct BenchEnv;

impl Environment for BenchEnv {
    fn is_quieting_down(&self) -> bool {
        false
    }

    fn agent_count(&self) -> usize {
        1
    }

    fn resolve_task(&self, _name: &str) -> Option<TaskHandle> {
        None
    }
}

fn bench_queue() -> Arc<Queue> {
    let (clock, _) = Clock::manual(1_000_000_000);
    Queue::with_clock(Arc::new(BenchEnv), QueueConfig::default(), clock)
}

fn bench_task(i: usize) -> TaskHandle {
    Arc::new(BenchTask {
        name: format!("job-{i}"),
    })
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_add_cancel(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_cancel");
    for size in [16usize, 256, 1024] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let tasks: Vec<TaskHandle> = (0..size).map(bench_task).collect();
            b.iter(|| {
                let queue = bench_queue();
                for task in &tasks {
                    black_box(queue.add(Arc::clone(task), Duration::from_secs(60)));
                }
                for task in &tasks {
                    black_box(queue.cancel(task.as_ref()).expect("cancel"));
                }
                queue.close();
            });
        });
    }
    group.finish();
}

fn bench_maintenance_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("maintenance");
    for size in [16usize, 256, 1024] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let queue = bench_queue();
                for i in 0..size {
                    queue.add(bench_task(i), Duration::ZERO);
                }
                queue.maintain();
                black_box(queue.items().len());
                queue.close();
            });
        });
    }
    group.finish();
}

fn bench_dispatch_rendezvous(c: &mut Criterion) {
    c.bench_function("dispatch_rendezvous", |b| {
        let queue = bench_queue();
        let exec = ExecutorHandle::new(ExecutorId(0), "agent-1 #0", Arc::new(BenchNode));
        let mut i = 0usize;
        b.iter(|| {
            queue.add(bench_task(i), Duration::ZERO);
            let task = queue.pop(&exec).expect("dispatch");
            black_box(task.name());
            i += 1;
        });
        queue.close();
    });
}

criterion_group!(
    benches,
    bench_add_cancel,
    bench_maintenance_sweep,
    bench_dispatch_rendezvous
);
criterion_main!(benches);
