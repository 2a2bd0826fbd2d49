use crate::core::context::{ConsoleLevel, Context};
use crate::core::conversion::to_number;
use crate::core::js_error::{EvalResult, describe_thrown, into_thrown_value};
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, Value};
use crate::js_function::{arg, call_function, define_method};
use crate::js_promise::Job;
use crate::raise_type_error;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub struct Timer {
    pub id: u64,
    pub callback: Value,
    pub args: Vec<Value>,
    /// `Some` for `setInterval`.
    pub interval: Option<Duration>,
}

/// Pending timers ordered by deadline, then by creation.
#[derive(Default)]
pub struct TimerQueue {
    timers: BTreeMap<(Instant, u64), Timer>,
    seq: u64,
    next_id: u64,
}

impl TimerQueue {
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.keys().next().map(|(when, _)| *when)
    }

    /// Id the next scheduled timer will get.
    pub fn peek_id(&self) -> u64 {
        self.next_id + 1
    }

    pub fn schedule(&mut self, when: Instant, callback: Value, args: Vec<Value>, interval: Option<Duration>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.insert(when, Timer { id, callback, args, interval });
        id
    }

    fn insert(&mut self, when: Instant, timer: Timer) {
        self.seq += 1;
        self.timers.insert((when, self.seq), timer);
    }

    pub fn cancel(&mut self, id: u64) -> bool {
        let key = self.timers.iter().find(|(_, t)| t.id == id).map(|(k, _)| *k);
        match key {
            Some(k) => self.timers.remove(&k).is_some(),
            None => false,
        }
    }

    /// Removes and returns the earliest timer whose deadline has passed.
    pub fn pop_due(&mut self, now: Instant) -> Option<Timer> {
        let key = *self.timers.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.timers.remove(&key)
    }

    /// Drops timers with an id of at least `first_id`.
    pub fn discard_from(&mut self, first_id: u64) {
        self.timers.retain(|_, t| t.id < first_id);
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

/// Runs one due timer, re-arming intervals before the callback so that
/// `clearInterval` inside it takes effect.
pub fn run_timer(ctx: &Rc<Context>, timer: Timer) -> EvalResult<()> {
    log::debug!("running timer {}", timer.id);
    if let Some(interval) = timer.interval {
        let rearmed = Timer {
            id: timer.id,
            callback: timer.callback.clone(),
            args: timer.args.clone(),
            interval: timer.interval,
        };
        ctx.realm.timers.borrow_mut().insert(Instant::now() + interval, rearmed);
    }
    if let Err(e) = call_function(ctx, &timer.callback, &Value::Undefined, &timer.args) {
        let thrown = into_thrown_value(ctx, e)?;
        ctx.console(ConsoleLevel::Error, &format!("Uncaught {}", describe_thrown(&thrown)));
    }
    Ok(())
}

fn delay_of(ctx: &Rc<Context>, v: &Value) -> EvalResult<Duration> {
    let ms = if v.is_undefined() { 0.0 } else { to_number(ctx, v)? };
    let ms = if ms.is_finite() && ms > 0.0 { ms } else { 0.0 };
    Ok(Duration::from_micros((ms * 1000.0) as u64))
}

fn schedule(ctx: &Rc<Context>, args: &[Value], repeat: bool) -> EvalResult<Value> {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(raise_type_error!("The \"callback\" argument must be of type function").into());
    }
    ctx.check_object_write(&ctx.realm.global_object, "scheduling a timer")?;
    let delay = delay_of(ctx, &arg(args, 1))?;
    let extra = args.iter().skip(2).cloned().collect();
    let interval = repeat.then_some(delay.max(Duration::from_millis(1)));
    let id = ctx.realm.timers.borrow_mut().schedule(Instant::now() + delay, callback, extra, interval);
    log::debug!("scheduled timer {id} in {delay:?}");
    Ok(Value::Number(id as f64))
}

fn clear(ctx: &Rc<Context>, args: &[Value]) -> EvalResult<Value> {
    if let Value::Number(n) = arg(args, 0) {
        ctx.check_object_write(&ctx.realm.global_object, "clearing a timer")?;
        ctx.realm.timers.borrow_mut().cancel(n as u64);
    }
    Ok(Value::Undefined)
}

pub fn initialize_timers(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    define_method(intrinsics, global, "setTimeout", 2, |ctx, _this, args| schedule(ctx, args, false));
    define_method(intrinsics, global, "setInterval", 2, |ctx, _this, args| schedule(ctx, args, true));
    define_method(intrinsics, global, "clearTimeout", 1, |ctx, _this, args| clear(ctx, args));
    define_method(intrinsics, global, "clearInterval", 1, |ctx, _this, args| clear(ctx, args));
    define_method(intrinsics, global, "queueMicrotask", 1, |ctx, _this, args| {
        let callback = arg(args, 0);
        if !callback.is_callable() {
            return Err(raise_type_error!("The \"callback\" argument must be of type function").into());
        }
        ctx.check_object_write(&ctx.realm.global_object, "queueing a microtask")?;
        ctx.realm.enqueue_job(Job::Callback { callback });
        Ok(Value::Undefined)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_deadline_then_creation() {
        let mut q = TimerQueue::default();
        let now = Instant::now();
        let late = q.schedule(now + Duration::from_millis(5), Value::Undefined, vec![], None);
        let first = q.schedule(now, Value::Undefined, vec![], None);
        let second = q.schedule(now, Value::Undefined, vec![], None);
        let later = now + Duration::from_millis(10);
        assert_eq!(q.pop_due(later).map(|t| t.id), Some(first));
        assert_eq!(q.pop_due(later).map(|t| t.id), Some(second));
        assert_eq!(q.pop_due(later).map(|t| t.id), Some(late));
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_and_discard() {
        let mut q = TimerQueue::default();
        let now = Instant::now();
        let a = q.schedule(now, Value::Undefined, vec![], None);
        let b = q.schedule(now, Value::Undefined, vec![], None);
        assert!(q.cancel(a));
        assert!(!q.cancel(a));
        q.discard_from(b);
        assert!(q.is_empty());
        assert!(q.pop_due(now).is_none());
    }
}
