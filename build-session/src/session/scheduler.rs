//! Deferred completion scheduling
//!
//! A scheduled task runs once, after its delay, on the loop that owns the
//! [`BuildSession`], so it never overlaps with console chunk delivery.
//! There is no cancellation: tasks are bound to a build id and turn into
//! no-ops once that build is gone.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use super::state::BuildSession;

/// Callback run against the session when its delay has elapsed
pub type DeferredTask = Box<dyn FnOnce(&mut BuildSession) + Send + 'static>;

/// Arranges for a task to run later on the session's own loop
pub trait Scheduler: Send {
    fn schedule(&self, delay: Duration, task: DeferredTask);
}

/// Tokio timer that posts the task back into the session driver's queue
#[derive(Clone)]
pub struct LoopScheduler {
    sender: mpsc::UnboundedSender<DeferredTask>,
}

impl LoopScheduler {
    /// The scheduler and the queue its tasks arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DeferredTask>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Scheduler for LoopScheduler {
    /// Must be called from within a Tokio runtime.
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(task).is_err() {
                debug!("Deferred task dropped: session loop has stopped");
            }
        });
    }
}

struct QueuedTask {
    due: Duration,
    seq: u64,
    task: DeferredTask,
}

#[derive(Default)]
struct ManualQueue {
    now: Duration,
    next_seq: u64,
    tasks: Vec<QueuedTask>,
}

/// Virtual-clock scheduler for hosts that drive their own loop.
///
/// Tasks run only from [`ManualScheduler::advance`], in due order (ties in
/// scheduling order).
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<ManualQueue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed so far
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of tasks not yet run
    pub fn pending(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Move the clock forward by `by`, running every task that falls due.
    /// Returns how many tasks ran.
    pub fn advance(&self, by: Duration, session: &mut BuildSession) -> usize {
        let target = self.lock().now.saturating_add(by);
        let mut ran = 0;

        loop {
            // Release the lock before running: tasks may schedule more tasks
            let next = {
                let mut queue = self.lock();
                let due_index = queue
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.seq))
                    .map(|(i, _)| i);
                match due_index {
                    Some(i) => {
                        let queued = queue.tasks.remove(i);
                        queue.now = queued.due;
                        Some(queued.task)
                    }
                    None => {
                        queue.now = target;
                        None
                    }
                }
            };
            let Some(task) = next else {
                return ran;
            };
            task(session);
            ran += 1;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        let mut queue = self.lock();
        // Saturates at Duration::MAX
        let due = queue.now.saturating_add(delay);
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.tasks.push(QueuedTask { due, seq, task });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::BuildSession;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session(scheduler: &ManualScheduler) -> BuildSession {
        BuildSession::builder(SessionConfig::default()).build(scheduler.clone())
    }

    #[test]
    fn test_manual_runs_in_due_order_once() {
        let scheduler = ManualScheduler::new();
        let mut session = session(&scheduler);
        let order = Arc::new(Mutex::new(Vec::new()));

        for (delay, label) in [(300, "c"), (100, "a"), (200, "b"), (100, "a2")] {
            let order = order.clone();
            scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move |_: &mut BuildSession| order.lock().unwrap().push(label)),
            );
        }

        assert_eq!(scheduler.advance(Duration::from_millis(99), &mut session), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(101), &mut session), 3);
        assert_eq!(scheduler.now(), Duration::from_millis(200));
        assert_eq!(scheduler.advance(Duration::from_secs(1), &mut session), 1);
        assert_eq!(scheduler.advance(Duration::from_secs(1), &mut session), 0);

        assert_eq!(*order.lock().unwrap(), vec!["a", "a2", "b", "c"]);
    }

    #[test]
    fn test_tasks_may_schedule_tasks() {
        let scheduler = ManualScheduler::new();
        let mut session = session(&scheduler);
        let count = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = scheduler.clone();
        let inner_count = count.clone();
        scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move |_: &mut BuildSession| {
                inner_count.fetch_add(1, Ordering::SeqCst);
                let c = inner_count.clone();
                inner_scheduler.schedule(
                    Duration::from_millis(10),
                    Box::new(move |_: &mut BuildSession| {
                        c.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        assert_eq!(scheduler.advance(Duration::from_millis(25), &mut session), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let scheduler = ManualScheduler::new();
        let mut session = session(&scheduler);
        scheduler.advance(Duration::from_secs(1), &mut session);

        scheduler.schedule(
            Duration::from_secs(u64::MAX),
            Box::new(|_: &mut BuildSession| {}),
        );
        assert_eq!(scheduler.advance(Duration::from_secs(3600), &mut session), 0);
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.advance(Duration::MAX, &mut session), 1);
        assert_eq!(scheduler.now(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_scheduler_posts_after_delay() {
        let (scheduler, mut receiver) = LoopScheduler::channel();
        let started = tokio::time::Instant::now();

        scheduler.schedule(Duration::from_millis(200), Box::new(|_: &mut BuildSession| {}));

        assert!(receiver.try_recv().is_err());
        let _task = receiver.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
