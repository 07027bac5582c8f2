//! Concurrency helper: one unit of work per item, item 0 on the calling thread and the rest
//! on spawned scoped threads, with a join barrier before anything is returned.

use crate::error::TallyError;
use anyhow::Result;
use std::any::Any;
use std::thread;

/// Run `work(i, &items[i])` for every item concurrently and wait for all of them.
///
/// Results come back in item order. A spawned unit that errors or panics is reported as
/// `TallyError::Worker`; a unit that cannot be started as `TallyError::Spawn`, in which
/// case nothing further is started (already running units are still joined).
pub fn fan_out<T, R, F>(items: &[T], work: F) -> Vec<Result<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> Result<R> + Sync,
{
    let Some(first) = items.first() else { return Vec::new() };
    let work = &work;

    thread::scope(|s| {
        let mut handles = Vec::with_capacity(items.len().saturating_sub(1));
        let mut spawn_err = None;
        for (i, item) in items.iter().enumerate().skip(1) {
            let spawned = thread::Builder::new()
                .name(format!("tally-{i}"))
                .spawn_scoped(s, move || work(i, item));
            match spawned {
                Ok(h) => handles.push((i, h)),
                Err(source) => {
                    spawn_err = Some(TallyError::Spawn { worker: i, source });
                    break;
                }
            }
        }

        let mut out = Vec::with_capacity(items.len());
        match spawn_err {
            Some(e) => out.push(Err(e.into())),
            None => out.push(work(0, first)),
        }
        for (i, h) in handles {
            let r = match h.join() {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(TallyError::Worker { worker: i, reason: format!("{e:#}") }.into()),
                Err(panic) => Err(TallyError::Worker { worker: i, reason: panic_message(panic.as_ref()) }.into()),
            };
            out.push(r);
        }
        out
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
