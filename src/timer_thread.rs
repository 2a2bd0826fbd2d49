use crossbeam_channel::{Sender, select, unbounded};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::OnceLock;
use std::task::Waker;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum TimerCommand {
    WakeAt { when: Instant, waker: Waker },
}

static TIMER_THREAD: OnceLock<Option<Sender<TimerCommand>>> = OnceLock::new();

/// Wakes `waker` once `when` has passed.
///
/// Backed by one lazily spawned thread shared by every pending evaluation in
/// the process. If the thread cannot be spawned the waker fires immediately
/// and the caller ends up polling.
pub fn wake_at(when: Instant, waker: Waker) {
    match TIMER_THREAD.get_or_init(spawn_timer_thread) {
        Some(tx) => {
            if let Err(e) = tx.send(TimerCommand::WakeAt { when, waker }) {
                log::warn!("timer thread is gone, waking immediately");
                let TimerCommand::WakeAt { waker, .. } = e.into_inner();
                waker.wake();
            }
        }
        None => waker.wake(),
    }
}

/// Wakers parked until their deadline, earliest first.
#[derive(Default)]
struct WakeQueue {
    // min-heap of (deadline, sequence)
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    wakers: HashMap<u64, Waker>,
    seq: u64,
}

impl WakeQueue {
    fn push(&mut self, cmd: TimerCommand) {
        let TimerCommand::WakeAt { when, waker } = cmd;
        self.seq += 1;
        self.heap.push(Reverse((when, self.seq)));
        self.wakers.insert(self.seq, waker);
    }

    fn wake_expired(&mut self, now: Instant) {
        while let Some(Reverse((when, id))) = self.heap.peek().copied() {
            if when > now {
                break;
            }
            self.heap.pop();
            if let Some(waker) = self.wakers.remove(&id) {
                waker.wake();
            }
        }
    }

    fn next_timeout(&self, now: Instant) -> Option<Duration> {
        self.heap.peek().map(|Reverse((when, _))| when.saturating_duration_since(now))
    }
}

fn spawn_timer_thread() -> Option<Sender<TimerCommand>> {
    let (cmd_tx, cmd_rx) = unbounded::<TimerCommand>();

    let spawned = thread::Builder::new().name("js-timer-thread".to_string()).spawn(move || {
        let mut queue = WakeQueue::default();
        loop {
            let now = Instant::now();
            queue.wake_expired(now);
            match queue.next_timeout(now) {
                Some(t) => {
                    select! {
                        recv(cmd_rx) -> msg => match msg {
                            Ok(cmd) => queue.push(cmd),
                            Err(_) => break,
                        },
                        default(t.max(Duration::from_millis(1))) => {}
                    }
                }
                // nothing scheduled: block until a command arrives
                None => match cmd_rx.recv() {
                    Ok(cmd) => queue.push(cmd),
                    Err(_) => break,
                },
            }
        }
    });

    match spawned {
        Ok(_) => Some(cmd_tx),
        Err(e) => {
            log::warn!("failed to spawn timer thread: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::Wake;

    struct Flag(AtomicBool);

    impl Wake for Flag {
        fn wake(self: Arc<Self>) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn wakes_after_deadline() {
        let flag = Arc::new(Flag(AtomicBool::new(false)));
        wake_at(Instant::now() + Duration::from_millis(20), Waker::from(flag.clone()));
        let started = Instant::now();
        while !flag.0.load(Ordering::SeqCst) {
            assert!(started.elapsed() < Duration::from_secs(5), "timer thread never fired");
            thread::sleep(Duration::from_millis(2));
        }
        assert!(started.elapsed() >= Duration::from_millis(15));
    }
}
