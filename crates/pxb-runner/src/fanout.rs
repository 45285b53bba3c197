use std::any::Any;
use std::collections::HashMap;
use std::future::Future;

use tokio::task::{Id, JoinError, JoinSet};
use tracing::warn;

/// A task whose result could not be collected.
#[derive(Debug, Clone)]
pub struct Dropped<K> {
    pub key: K,
    pub reason: String,
}

/// Every spawned task ends up in exactly one of the two lists.
#[derive(Debug)]
pub struct Settled<K, T> {
    pub values: Vec<(K, T)>,
    pub dropped: Vec<Dropped<K>>,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn describe(err: JoinError) -> String {
    if err.is_panic() {
        format!("task panicked: {}", panic_message(err.into_panic()))
    } else {
        err.to_string()
    }
}

/// Run all futures concurrently and wait for every one of them.
///
/// Results are keyed by the caller's key, not by completion order. A task that panics or
/// is cancelled is reported in `dropped` instead of failing the whole set.
pub async fn settle_all<K, T, F>(tasks: Vec<(K, F)>) -> Settled<K, T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let mut set = JoinSet::new();
    let mut keys: HashMap<Id, K> = HashMap::with_capacity(tasks.len());
    for (key, fut) in tasks {
        let handle = set.spawn(fut);
        keys.insert(handle.id(), key);
    }

    let mut settled = Settled {
        values: Vec::with_capacity(keys.len()),
        dropped: vec![],
    };
    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((id, value)) => match keys.remove(&id) {
                Some(key) => settled.values.push((key, value)),
                None => warn!(task_id = %id, "completed task has no registered key"),
            },
            Err(err) => {
                let id = err.id();
                let reason = describe(err);
                match keys.remove(&id) {
                    Some(key) => settled.dropped.push(Dropped { key, reason }),
                    None => warn!(task_id = %id, reason = %reason, "failed task has no registered key"),
                }
            }
        }
    }
    settled
}
