use std::panic::{self, AssertUnwindSafe};

use crate::error::Error;

#[derive(Clone, Debug)]
pub enum Try<A> {
    Success(A),
    Failure(Error),
}

impl<A> Try<A> {
    pub fn apply<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<A, E>,
        E: Into<Error>,
    {
        match f() {
            Ok(value) => Try::Success(value),
            Err(err) => Try::Failure(err.into()),
        }
    }

    pub fn catch_unwind<F>(f: F) -> Self
    where
        F: FnOnce() -> A,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Try::Success(value),
            Err(payload) => Try::Failure(Error::from_panic(payload)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Try::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Try::Failure(_))
    }

    pub fn value(&self) -> Option<&A> {
        match self {
            Try::Success(value) => Some(value),
            Try::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Try::Success(_) => None,
            Try::Failure(err) => Some(err),
        }
    }

    pub fn as_ref(&self) -> Try<&A> {
        match self {
            Try::Success(value) => Try::Success(value),
            Try::Failure(err) => Try::Failure(err.clone()),
        }
    }

    pub fn get(self) -> Result<A, Error> {
        match self {
            Try::Success(value) => Ok(value),
            Try::Failure(err) => Err(err),
        }
    }

    pub fn map<B, F>(self, f: F) -> Try<B>
    where
        F: FnOnce(A) -> B,
    {
        match self {
            Try::Success(value) => Try::Success(f(value)),
            Try::Failure(err) => Try::Failure(err),
        }
    }

    pub fn flat_map<B, F>(self, f: F) -> Try<B>
    where
        F: FnOnce(A) -> Try<B>,
    {
        match self {
            Try::Success(value) => f(value),
            Try::Failure(err) => Try::Failure(err),
        }
    }

    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: FnOnce(&A) -> bool,
    {
        match self {
            Try::Success(value) if predicate(&value) => Try::Success(value),
            Try::Success(_) => Try::Failure(Error::filtered_out()),
            Try::Failure(err) => Try::Failure(err),
        }
    }

    pub fn handle<F>(self, recover: F) -> Self
    where
        F: FnOnce(Error) -> A,
    {
        match self {
            Try::Success(value) => Try::Success(value),
            Try::Failure(err) => Try::Success(recover(err)),
        }
    }

    // `recover` may fail again
    pub fn rescue<F>(self, recover: F) -> Self
    where
        F: FnOnce(Error) -> Try<A>,
    {
        match self {
            Try::Success(value) => Try::Success(value),
            Try::Failure(err) => recover(err),
        }
    }
}

impl<B> Try<Try<B>> {
    pub fn flatten(self) -> Try<B> {
        self.flat_map(|inner| inner)
    }
}

impl<A, E> From<Result<A, E>> for Try<A>
where
    E: Into<Error>,
{
    fn from(result: Result<A, E>) -> Self {
        Try::apply(|| result)
    }
}

impl<A> From<Try<A>> for Result<A, Error> {
    fn from(outcome: Try<A>) -> Self {
        outcome.get()
    }
}
