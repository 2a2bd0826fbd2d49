//! Drives suspended evaluations.
//!
//! Every async function body and every top-level program runs as a task on
//! the realm's [`Executor`]. A task is polled once when spawned; if it
//! reaches an `await` on a pending promise it parks, and the promise
//! reaction that settles the await wakes it through the ready queue. Code
//! that never awaits completes inside that first poll, which keeps plain
//! evaluation synchronous.

use crate::core::call_stack::{StackFrame, with_stack_headroom};
use crate::core::context::{ConsoleLevel, Context};
use crate::core::js_error::{EvalError, EvalResult, describe_thrown};
use crate::core::realm::Realm;
use crate::core::value::Value;
use crate::js_function::{arg, new_native_function};
use crate::js_promise::{perform_then, promise_resolve, report_unhandled_rejections, run_job};
use crate::{JSError, raise_side_effect};
use crossbeam_channel::{Receiver, Sender, unbounded};
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll, Wake, Waker};
use std::time::{Duration, Instant};

/// Upper bound on how long a pending evaluation sleeps before re-checking
/// its deadline and the interrupt flag.
const MAX_IDLE: Duration = Duration::from_millis(100);

struct Task {
    future: LocalBoxFuture<'static, ()>,
    /// The task's own frame, restored while it is polled.
    frame: StackFrame,
}

struct TaskWaker {
    id: u64,
    sender: Sender<u64>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        // The receiver lives as long as the realm; a send after that is moot.
        let _ = self.sender.send(self.id);
    }
}

/// Single-threaded executor for evaluation tasks.
pub struct Executor {
    tasks: RefCell<HashMap<u64, Task>>,
    next_id: Cell<u64>,
    sender: Sender<u64>,
    receiver: Receiver<u64>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Executor {
            tasks: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            sender,
            receiver,
        }
    }

    /// Spawns a task and polls it right away, inside `frame`.
    ///
    /// Fails without running anything if entering the frame would exceed the
    /// maximum call depth.
    pub fn spawn_now(&self, realm: &Realm, frame: StackFrame, future: LocalBoxFuture<'static, ()>) -> Result<(), JSError> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let guard = realm.call_stack.enter(frame.clone())?;
        log::trace!("spawned task {id}");
        self.poll_task(id, Task { future, frame }, guard);
        Ok(())
    }

    fn poll_task(&self, id: u64, mut task: Task, guard: crate::core::call_stack::FrameGuard<'_>) {
        let waker = Waker::from(Arc::new(TaskWaker {
            id,
            sender: self.sender.clone(),
        }));
        let mut cx = TaskContext::from_waker(&waker);
        let poll = with_stack_headroom(|| task.future.as_mut().poll(&mut cx));
        if let Some(frame) = guard.current() {
            task.frame = frame;
        }
        drop(guard);
        match poll {
            Poll::Ready(()) => log::trace!("task {id} finished"),
            Poll::Pending => {
                self.tasks.borrow_mut().insert(id, task);
            }
        }
    }

    /// Polls every task that has been woken. Returns whether any ran.
    pub fn poll_ready(&self, realm: &Realm) -> bool {
        let mut ran = false;
        while let Ok(id) = self.receiver.try_recv() {
            let Some(task) = self.tasks.borrow_mut().remove(&id) else {
                continue;
            };
            ran = true;
            let guard = realm.call_stack.enter_unchecked(task.frame.clone());
            self.poll_task(id, task, guard);
        }
        ran
    }

    pub fn has_ready(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Number of parked tasks.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }
}

struct AwaitSlot {
    result: Option<Result<Value, Value>>,
    waker: Option<Waker>,
}

impl AwaitSlot {
    fn fill(&mut self, result: Result<Value, Value>) {
        if self.result.is_none() {
            self.result = Some(result);
            if let Some(w) = self.waker.take() {
                w.wake();
            }
        }
    }
}

/// Resolves once the awaited promise settles; a rejection resumes as a throw.
pub struct AwaitFuture {
    slot: Rc<RefCell<AwaitSlot>>,
}

impl Future for AwaitFuture {
    type Output = EvalResult<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match slot.result.take() {
            Some(Ok(v)) => Poll::Ready(Ok(v)),
            Some(Err(reason)) => Poll::Ready(Err(EvalError::Throw(reason))),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Registers the reactions of an `await` on `value`.
///
/// A dry run never suspends: the continuation would run after the
/// evaluation's effects had to be judged.
pub fn await_value(ctx: &Rc<Context>, value: Value) -> EvalResult<AwaitFuture> {
    if ctx.is_dry_run() {
        return Err(raise_side_effect!("await").into());
    }
    let promise = promise_resolve(ctx, value)?;
    let slot = Rc::new(RefCell::new(AwaitSlot { result: None, waker: None }));
    let intrinsics = &ctx.realm.intrinsics;
    let on_fulfilled = {
        let slot = slot.clone();
        new_native_function(intrinsics, "", 1, move |_ctx, _this, args| {
            slot.borrow_mut().fill(Ok(arg(args, 0)));
            Ok(Value::Undefined)
        })
    };
    let on_rejected = {
        let slot = slot.clone();
        new_native_function(intrinsics, "", 1, move |_ctx, _this, args| {
            slot.borrow_mut().fill(Err(arg(args, 0)));
            Ok(Value::Undefined)
        })
    };
    perform_then(ctx, &promise, Value::Object(on_fulfilled), Value::Object(on_rejected), None)?;
    Ok(AwaitFuture { slot })
}

/// Microtask checkpoint: runs woken tasks and queued jobs until both are empty.
pub fn run_microtasks(ctx: &Rc<Context>) -> Result<(), JSError> {
    let realm = &ctx.realm;
    loop {
        realm.executor.poll_ready(realm);
        if let Some(fatal) = realm.take_fatal() {
            return Err(fatal);
        }
        let job = realm.jobs.borrow_mut().pop_front();
        let Some(job) = job else {
            if realm.executor.has_ready() {
                continue;
            }
            break;
        };
        ctx.check_interrupts()?;
        match run_job(ctx, job) {
            Ok(()) => {}
            Err(EvalError::Js(e)) if e.is_internal() => return Err(e),
            Err(e) => {
                let thrown = crate::core::js_error::into_thrown_value(ctx, e)?;
                ctx.console(ConsoleLevel::Error, &format!("Uncaught {}", describe_thrown(&thrown)));
            }
        }
        if let Some(fatal) = realm.take_fatal() {
            return Err(fatal);
        }
    }
    report_unhandled_rejections(ctx);
    Ok(())
}

/// Runs the earliest timer if it is due. Returns whether one ran.
fn run_due_timer(ctx: &Rc<Context>) -> Result<bool, JSError> {
    let timer = ctx.realm.timers.borrow_mut().pop_due(Instant::now());
    let Some(timer) = timer else {
        return Ok(false);
    };
    match crate::js_timers::run_timer(ctx, timer) {
        Ok(()) => {}
        Err(EvalError::Js(e)) => return Err(e),
        Err(EvalError::Throw(v)) => ctx.console(ConsoleLevel::Error, &format!("Uncaught {}", describe_thrown(&v))),
    }
    run_microtasks(ctx)?;
    Ok(true)
}

/// Runs jobs and timers until none are left, sleeping until each timer is due.
pub fn run_event_loop(ctx: &Rc<Context>) -> Result<(), JSError> {
    loop {
        run_microtasks(ctx)?;
        if run_due_timer(ctx)? {
            continue;
        }
        let next = ctx.realm.timers.borrow().next_deadline();
        match next {
            Some(when) => {
                ctx.check_interrupts()?;
                let now = Instant::now();
                if when > now {
                    std::thread::sleep((when - now).min(MAX_IDLE));
                }
            }
            None => return Ok(()),
        }
    }
}

/// Where the result of a spawned top-level program lands.
pub(crate) type ResultSlot = Rc<RefCell<Option<Result<Value, JSError>>>>;

/// A top-level evaluation that suspended at an `await`.
///
/// Polling it runs microtasks and due timers of its realm; between timers it
/// asks the timer thread to wake it.
pub struct PendingEvaluation {
    ctx: Rc<Context>,
    slot: ResultSlot,
}

impl PendingEvaluation {
    pub(crate) fn new(ctx: Rc<Context>, slot: ResultSlot) -> Self {
        PendingEvaluation { ctx, slot }
    }

    /// Blocks the calling thread until the evaluation finishes.
    pub fn run_to_completion(self) -> Result<Value, JSError> {
        futures::executor::block_on(self)
    }

    pub fn realm(&self) -> &Rc<Realm> {
        &self.ctx.realm
    }

    fn step(&self, cx: &mut TaskContext<'_>) -> Poll<Result<Value, JSError>> {
        let ctx = &self.ctx;
        loop {
            run_microtasks(ctx)?;
            if let Some(result) = self.slot.borrow_mut().take() {
                return Poll::Ready(result);
            }
            ctx.check_interrupts()?;
            if run_due_timer(ctx)? {
                continue;
            }
            let next_timer = ctx.realm.timers.borrow().next_deadline();
            let deadline = ctx.deadline.map(|d| d.instant());
            let wake = match (next_timer, deadline) {
                (None, None) => {
                    log::debug!("evaluation stalled with {} parked task(s)", ctx.realm.executor.pending_tasks());
                    return Poll::Ready(Err(JSError::Stalled));
                }
                (Some(t), Some(d)) => t.min(d),
                (Some(t), None) => t,
                (None, Some(d)) => d,
            };
            let wake = wake.min(Instant::now() + MAX_IDLE);
            crate::timer_thread::wake_at(wake, cx.waker().clone());
            return Poll::Pending;
        }
    }
}

impl Future for PendingEvaluation {
    type Output = Result<Value, JSError>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        self.step(cx)
    }
}

impl std::fmt::Debug for PendingEvaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingEvaluation").field("filename", &self.ctx.source.filename).finish()
    }
}
