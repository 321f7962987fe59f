use std::{collections::HashMap, future::Future};

use futures::future::join_all;
use tracing::warn;

use crate::error::Error;

/// Runs `task` for one chain, or concurrently for all `chains`, and
/// collects the results by chain.
///
/// An explicitly requested chain propagates its error. Across several
/// chains the failed ones are logged and left out, an error is returned
/// only when every chain failed.
pub async fn run<T, F, Fut>(
    chains: &[String],
    chain: Option<&str>,
    task: F,
) -> Result<HashMap<String, T>, Error>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    if let Some(chain) = chain {
        let value = task(chain.to_owned()).await?;
        return Ok(HashMap::from([(chain.to_owned(), value)]));
    }

    let results = join_all(chains.iter().map(|chain| {
        let future = task(chain.to_owned());
        async move { (chain.to_owned(), future.await) }
    }))
    .await;

    let mut values = HashMap::new();
    let mut first_error = None;

    for (chain, result) in results {
        match result {
            Ok(value) => {
                values.insert(chain, value);
            },
            Err(e) => {
                warn!("Chain {} failed: {}", chain, e);
                first_error.get_or_insert(e);
            },
        }
    }

    match first_error {
        Some(e) if values.is_empty() => Err(e),
        _ => Ok(values),
    }
}
