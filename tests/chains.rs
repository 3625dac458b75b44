use std::sync::Arc;

use async_executor::Executor;
use deferred::{BoxError, Deferred, Error, State, Try};

fn executor() -> Arc<Executor<'static>> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(Executor::new())
}

#[test]
fn end_to_end_chains() {
    let executor = executor();

    let outcome = smol::block_on(executor.run(async {
        let ex = executor.clone();
        let six = Deferred::value(&executor, 5).flat_map(move |x| Deferred::value(&ex, x + 1));
        let filtered = Deferred::value(&executor, 5).filter(|x| *x > 10);
        let ex = executor.clone();
        let rescued = Deferred::error(&executor, Error::msg("x"))
            .rescue(move |_| Deferred::value(&ex, 0));

        (six.await, filtered.await, rescued.await)
    }));

    let (six, filtered, rescued) = outcome;
    assert_eq!(six.value(), Some(&6));
    assert_eq!(filtered.error().map(|err| err.to_string()), Some("filtered out".to_string()));
    assert_eq!(rescued.value(), Some(&0));
}

#[test]
fn producer_settles_from_another_task() {
    let executor = executor();
    let deferred = Deferred::<String>::new(&executor);

    let doubled = deferred.map(|text| text.repeat(2));

    executor
        .spawn({
            let deferred = deferred.clone();
            async move {
                futures_lite::future::yield_now().await;
                deferred.settle_value("ab".to_string()).unwrap();
            }
        })
        .detach();

    let outcome = smol::block_on(executor.run(doubled));
    assert_eq!(outcome.get().unwrap(), "abab");
    assert_eq!(deferred.state(), State::Resolved);
}

#[test]
fn failures_short_circuit_long_chains() {
    let executor = executor();
    let err = Error::msg("root cause");

    let ex = executor.clone();
    let chain = Deferred::<u32>::error(&executor, err.clone())
        .map(|x| x + 1)
        .filter(|x| *x > 0)
        .flat_map(move |x| Deferred::value(&ex, x * 2))
        .map(|x| x.to_string());

    let outcome = smol::block_on(executor.run(chain));
    assert!(Error::ptr_eq(outcome.error().unwrap(), &err));
}

#[test]
fn lifted_outcomes_can_be_inspected_and_lowered() {
    let executor = executor();

    let lifted = Deferred::<u32>::error(&executor, Error::msg("bad input"))
        .lift_to_try()
        .map(|outcome| outcome.handle(|_| 0).map(|x| x + 100));

    let outcome = smol::block_on(executor.run(lifted.lower_from_try()));
    assert_eq!(outcome.value(), Some(&100));
}

#[test]
fn multi_threaded_executor_drives_chains() {
    let executor = executor();
    let deferred = Deferred::<u64>::new(&executor);
    let total = deferred.map(|x| (1..=x).sum::<u64>());

    let (stop, shutdown) = shutdown_signal();
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let executor = executor.clone();
            let shutdown = shutdown.clone();
            std::thread::spawn(move || smol::block_on(executor.run(shutdown)))
        })
        .collect();

    deferred.settle_value(10).unwrap();
    let outcome = futures_lite::future::block_on(total);
    stop.settle_value(()).unwrap();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(outcome.value(), Some(&55));
}

// A pending instance doubles as a shutdown signal for worker threads.
fn shutdown_signal() -> (Deferred<()>, Deferred<()>) {
    let signal = Deferred::new(&Arc::new(Executor::new()));
    (signal.clone(), signal)
}

#[test]
fn get_feeds_boxed_error_stacks() {
    fn parse(outcome: Try<&str>) -> Result<u32, BoxError> {
        let text = outcome.get()?;
        Ok(text.parse()?)
    }

    assert_eq!(parse(Try::Success("12")).unwrap(), 12);
    let err = parse(Try::Failure(Error::msg("no input"))).unwrap_err();
    assert_eq!(err.to_string(), "no input");
}
