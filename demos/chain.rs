use std::sync::Arc;

use async_executor::Executor;
use deferred::{BoxError, Deferred, Error};

fn lookup_price(executor: &Arc<Executor<'static>>, symbol: &str) -> Deferred<u64> {
    let symbol = symbol.to_string();
    Deferred::spawn(executor, async move {
        futures_lite::future::yield_now().await;
        match symbol.as_str() {
            "BTC" => Ok(67_000),
            "ETH" => Ok(3_400),
            _ => Err(Error::msg(format!("unknown symbol {symbol}"))),
        }
    })
}

async fn async_main(executor: Arc<Executor<'static>>) -> Result<(), BoxError> {
    // logging
    env_logger::init();

    // chain a lookup into a conversion, falling back on a default quote
    let ex = executor.clone();
    let quote = lookup_price(&executor, "DOGE")
        .rescue(move |err| {
            log::warn!("lookup failed err = {err:?}");
            lookup_price(&ex, "ETH")
        })
        .map(|cents| cents as f64 / 100.0)
        .filter(|price| *price > 0.0);

    let price = quote.await.get()?;
    log::info!("price = {price}");

    // settle by hand and inspect the outcome as data
    let manual = Deferred::<u64>::new(&executor);
    let lifted = manual.lift_to_try();
    manual.settle_error(Error::msg("market closed"))?;
    match lifted.await.get()?.get() {
        Ok(value) => log::info!("manual value = {value}"),
        Err(err) => log::info!("manual error = {err:?}"),
    }

    Ok(())
}

fn main() -> Result<(), BoxError> {
    let executor = Arc::new(Executor::new());
    smol::block_on(executor.run(async_main(executor.clone())))
}
