use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::Waker;

use crate::outcome::Try;
use crate::types::Continuation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Pending,
    Resolved,
    Rejected,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Pending => "pending",
            State::Resolved => "resolved",
            State::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

// Single-assignment slot behind a `Deferred`, plus everything waiting on it.
pub(crate) struct Slot<A> {
    pub(crate) outcome: Option<Try<A>>,
    pub(crate) waiters: VecDeque<Continuation<A>>,
    pub(crate) wakers: Vec<Waker>,
    // a drain task is queued on the executor and will pick up new waiters
    pub(crate) draining: bool,
}

impl<A> Slot<A> {
    pub(crate) fn settled(outcome: Try<A>) -> Self {
        Self {
            outcome: Some(outcome),
            ..Self::default()
        }
    }

    pub(crate) fn state(&self) -> State {
        match &self.outcome {
            None => State::Pending,
            Some(Try::Success(_)) => State::Resolved,
            Some(Try::Failure(_)) => State::Rejected,
        }
    }

    // hands the outcome back if the slot was already settled
    pub(crate) fn fill(&mut self, outcome: Try<A>) -> Result<(), Try<A>> {
        if self.outcome.is_some() {
            return Err(outcome);
        }
        self.outcome = Some(outcome);
        Ok(())
    }

    // true at most once until `next_waiter` runs dry
    pub(crate) fn claim_drain(&mut self) -> bool {
        if self.outcome.is_none() || self.waiters.is_empty() || self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    pub(crate) fn next_waiter(&mut self) -> Option<(Continuation<A>, Try<A>)>
    where
        A: Clone,
    {
        match (self.outcome.clone(), self.waiters.pop_front()) {
            (Some(outcome), Some(waiter)) => Some((waiter, outcome)),
            (_, waiter) => {
                if let Some(waiter) = waiter {
                    self.waiters.push_front(waiter);
                }
                self.draining = false;
                None
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Option<Try<A>>
    where
        A: Clone,
    {
        self.outcome.as_ref().map(|outcome| outcome.as_ref().map(A::clone))
    }

    // waiters that can never run, handed out so they drop outside the lock
    pub(crate) fn abandon(&mut self) -> VecDeque<Continuation<A>> {
        self.draining = false;
        std::mem::take(&mut self.waiters)
    }

    pub(crate) fn register_waker(&mut self, waker: &Waker) {
        if !self.wakers.iter().any(|known| known.will_wake(waker)) {
            self.wakers.push(waker.clone());
        }
    }
}

impl<A> Default for Slot<A> {
    fn default() -> Self {
        Self {
            outcome: None,
            waiters: VecDeque::new(),
            wakers: Vec::new(),
            draining: false,
        }
    }
}

pub(crate) fn lock<A>(slot: &Mutex<Slot<A>>) -> MutexGuard<'_, Slot<A>> {
    // continuations never run under the lock, so poisoning only follows a bug in this crate
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
