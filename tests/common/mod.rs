#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;
use tokio::task::LocalSet;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs a `!Send` test body on a fresh `LocalSet` so it can `spawn_local`.
pub async fn run_local<F: Future>(fut: F) -> F::Output {
  LocalSet::new().run_until(fut).await
}
