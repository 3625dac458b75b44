use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use async_executor::Executor;
use futures_lite::FutureExt as _;
use simple_error::{SimpleError, SimpleResult};

use crate::error::Error;
use crate::outcome::Try;
use crate::state::{lock, Slot, State};

// Tasks queued on the executor own a `Shared`, so it only points back weakly.
type ExecutorRef = Weak<Executor<'static>>;

struct Shared<A> {
    executor: ExecutorRef,
    slot: Mutex<Slot<A>>,
}

impl<A> Shared<A> {
    // Runs waiters in registration order until the queue is empty.
    fn drain(&self)
    where
        A: Clone,
    {
        loop {
            let Some((waiter, outcome)) = lock(&self.slot).next_waiter() else {
                log::trace!("deferred drained");
                return;
            };
            if let Try::Failure(err) = Try::catch_unwind(|| waiter(outcome)) {
                log::error!("deferred callback panicked err = {err:?}");
            }
        }
    }
}

pub struct Deferred<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for Deferred<A> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<A> fmt::Debug for Deferred<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("state", &self.state()).finish()
    }
}

impl<A> Deferred<A> {
    pub fn state(&self) -> State {
        lock(&self.shared.slot).state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() != State::Pending
    }

    // None once the executor has been dropped
    pub fn executor(&self) -> Option<Arc<Executor<'static>>> {
        self.shared.executor.upgrade()
    }
}

impl<A: Clone + Send + 'static> Deferred<A> {
    fn with_slot(executor: ExecutorRef, slot: Slot<A>) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor,
                slot: Mutex::new(slot),
            }),
        }
    }

    // an instance on the same executor as `self`, settled by a combinator
    fn chained<B: Clone + Send + 'static>(&self) -> Deferred<B> {
        Deferred::with_slot(self.shared.executor.clone(), Slot::default())
    }

    pub fn new(executor: &Arc<Executor<'static>>) -> Self {
        Self::with_slot(Arc::downgrade(executor), Slot::default())
    }

    pub fn value(executor: &Arc<Executor<'static>>, value: A) -> Self {
        Self::from_try(executor, Try::Success(value))
    }

    pub fn error(executor: &Arc<Executor<'static>>, err: impl Into<Error>) -> Self {
        Self::from_try(executor, Try::Failure(err.into()))
    }

    pub fn from_try(executor: &Arc<Executor<'static>>, outcome: Try<A>) -> Self {
        Self::with_slot(Arc::downgrade(executor), Slot::settled(outcome))
    }

    pub fn spawn<F, E>(executor: &Arc<Executor<'static>>, future: F) -> Self
    where
        F: Future<Output = Result<A, E>> + Send + 'static,
        E: Into<Error>,
    {
        let deferred = Self::new(executor);

        let task = executor.spawn({
            let settler = deferred.clone();
            async move {
                // a panic inside `future` rejects
                let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(result) => Try::from(result),
                    Err(payload) => Try::Failure(Error::from_panic(payload)),
                };
                settler.settle_on_behalf(outcome);
            }
        });

        // run in background
        task.detach();

        deferred
    }

    pub fn settle_value(&self, value: A) -> SimpleResult<()> {
        self.settle(Try::Success(value))
    }

    pub fn settle_error(&self, err: impl Into<Error>) -> SimpleResult<()> {
        self.settle(Try::Failure(err.into()))
    }

    pub fn settle(&self, outcome: Try<A>) -> SimpleResult<()> {
        let (state, wakers, drain) = {
            let mut slot = lock(&self.shared.slot);
            // usage fault, the first outcome stays
            if let Err(rejected) = slot.fill(outcome) {
                let attempted = if rejected.is_success() { "value" } else { "error" };
                return Err(SimpleError::new(format!(
                    "can't set {attempted} of a non-pending deferred, state = {}",
                    slot.state()
                )));
            }
            (slot.state(), std::mem::take(&mut slot.wakers), slot.claim_drain())
        };
        log::trace!("deferred settled state = {state}");

        for waker in wakers {
            waker.wake();
        }
        if drain {
            self.schedule_drain();
        }
        Ok(())
    }

    // Settlement of instances this crate handed out from a combinator.
    fn settle_on_behalf(&self, outcome: Try<A>) {
        if let Err(err) = self.settle(outcome) {
            log::error!("chained deferred was settled by someone else err = {err:?}");
        }
    }

    fn schedule_drain(&self) {
        let Some(executor) = self.shared.executor.upgrade() else {
            let dropped = lock(&self.shared.slot).abandon();
            log::warn!("executor is gone, dropping {} deferred callbacks", dropped.len());
            return;
        };
        let shared = self.shared.clone();
        executor.spawn(async move { shared.drain() }).detach();
    }

    pub fn poll_outcome(&self) -> Option<Try<A>> {
        lock(&self.shared.slot).snapshot()
    }

    // callbacks on one instance run in registration order
    pub fn respond<F>(&self, f: F)
    where
        F: FnOnce(Try<A>) + Send + 'static,
    {
        let drain = {
            let mut slot = lock(&self.shared.slot);
            slot.waiters.push_back(Box::new(f));
            slot.claim_drain()
        };
        if drain {
            self.schedule_drain();
        }
    }

    fn forward_to(&self, target: Deferred<A>) {
        self.respond(move |outcome| target.settle_on_behalf(outcome));
    }

    pub fn flat_map<B, F>(&self, f: F) -> Deferred<B>
    where
        B: Clone + Send + 'static,
        F: FnOnce(A) -> Deferred<B> + Send + 'static,
    {
        let next = self.chained();
        let settler = next.clone();
        self.respond(move |outcome| {
            match outcome.flat_map(|value| guarded(|| f(value))) {
                Try::Success(inner) => inner.forward_to(settler),
                Try::Failure(err) => settler.settle_on_behalf(Try::Failure(err)),
            }
        });
        next
    }

    pub fn map<B, F>(&self, f: F) -> Deferred<B>
    where
        B: Clone + Send + 'static,
        F: FnOnce(A) -> B + Send + 'static,
    {
        let executor = self.shared.executor.clone();
        self.flat_map(move |value| {
            Deferred::with_slot(executor, Slot::settled(Try::Success(f(value))))
        })
    }

    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: FnOnce(&A) -> bool + Send + 'static,
    {
        let executor = self.shared.executor.clone();
        self.flat_map(move |value| {
            let outcome = if predicate(&value) {
                Try::Success(value)
            } else {
                Try::Failure(Error::filtered_out())
            };
            Deferred::with_slot(executor, Slot::settled(outcome))
        })
    }

    // only rejects if `recover` itself panics
    pub fn handle<F>(&self, recover: F) -> Self
    where
        F: FnOnce(Error) -> A + Send + 'static,
    {
        let next = self.chained();
        let settler = next.clone();
        self.respond(move |outcome| {
            let outcome = match outcome {
                Try::Success(value) => Try::Success(value),
                Try::Failure(err) => guarded(|| recover(err)),
            };
            settler.settle_on_behalf(outcome);
        });
        next
    }

    pub fn rescue<F>(&self, recover: F) -> Self
    where
        F: FnOnce(Error) -> Deferred<A> + Send + 'static,
    {
        let next = self.chained();
        let settler = next.clone();
        self.respond(move |outcome| match outcome {
            Try::Success(value) => settler.settle_on_behalf(Try::Success(value)),
            Try::Failure(err) => match guarded(|| recover(err)) {
                Try::Success(attempt) => attempt.forward_to(settler),
                Try::Failure(err) => settler.settle_on_behalf(Try::Failure(err)),
            },
        });
        next
    }

    pub fn lift_to_try(&self) -> Deferred<Try<A>> {
        self.map(Try::Success).handle(Try::Failure)
    }
}

impl<B: Clone + Send + 'static> Deferred<Deferred<B>> {
    pub fn flatten(&self) -> Deferred<B> {
        self.flat_map(|inner| inner)
    }
}

impl<A: Clone + Send + 'static> Deferred<Try<A>> {
    pub fn lower_from_try(&self) -> Deferred<A> {
        let executor = self.shared.executor.clone();
        self.flat_map(move |outcome| Deferred::with_slot(executor, Slot::settled(outcome)))
    }
}

impl<A: Clone + Send + 'static> Future for Deferred<A> {
    type Output = Try<A>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = lock(&self.shared.slot);
        if let Some(outcome) = slot.snapshot() {
            return Poll::Ready(outcome);
        }
        slot.register_waker(cx.waker());
        Poll::Pending
    }
}

// User closures run inside executor tasks; a panic there would otherwise
// leave the downstream instance pending forever.
fn guarded<T, F: FnOnce() -> T>(f: F) -> Try<T> {
    let outcome = Try::catch_unwind(f);
    if let Try::Failure(err) = &outcome {
        log::warn!("deferred continuation panicked err = {err:?}");
    }
    outcome
}
