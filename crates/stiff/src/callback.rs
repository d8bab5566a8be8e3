//! Pull-style iteration over a push-style producer.
//!
//! The producer runs on its own thread and hands items over a queue of
//! depth one, so at most one item is in flight. Dropping the iterator early
//! closes the queue; the producer sees its next hand-off refused, stops,
//! and is joined within [`JOIN_DEADLINE`].

use std::ops::ControlFlow;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::warn;

pub const JOIN_DEADLINE: Duration = Duration::from_secs(2);

enum Msg<T, E> {
    Item(T),
    Failed(E),
}

pub struct CallbackIter<T, E> {
    rx: Option<Receiver<Msg<T, E>>>,
    handle: Option<JoinHandle<()>>,
}

/// Run `producer` on a thread; every value it emits is yielded in order.
///
/// The emitter returns [`ControlFlow::Break`] once the consumer is gone;
/// producers should stop at that point.
pub fn iter_from_callback<T, E, F>(producer: F) -> CallbackIter<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce(&mut dyn FnMut(T) -> ControlFlow<()>) -> Result<(), E> + Send + 'static,
{
    let (tx, rx) = sync_channel::<Msg<T, E>>(1);
    let handle = thread::spawn(move || run_producer(producer, tx));
    CallbackIter {
        rx: Some(rx),
        handle: Some(handle),
    }
}

fn run_producer<T, E, F>(producer: F, tx: SyncSender<Msg<T, E>>)
where
    F: FnOnce(&mut dyn FnMut(T) -> ControlFlow<()>) -> Result<(), E>,
{
    let mut emit = |item: T| match tx.send(Msg::Item(item)) {
        Ok(()) => ControlFlow::Continue(()),
        Err(_) => ControlFlow::Break(()),
    };
    if let Err(err) = producer(&mut emit) {
        // Nobody may be listening any more; that is fine.
        let _ = tx.send(Msg::Failed(err));
    }
}

impl<T, E> Iterator for CallbackIter<T, E> {
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let rx = self.rx.as_ref()?;
        match rx.recv() {
            Ok(Msg::Item(item)) => Some(Ok(item)),
            Ok(Msg::Failed(err)) => {
                self.release();
                Some(Err(err))
            }
            Err(_) => {
                self.release();
                None
            }
        }
    }
}

impl<T, E> CallbackIter<T, E> {
    /// Close the queue and wait briefly for the producer to notice.
    fn release(&mut self) {
        drop(self.rx.take());
        let Some(handle) = self.handle.take() else {
            return;
        };
        let deadline = Instant::now() + JOIN_DEADLINE;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("producer thread did not stop in time; detaching it");
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if handle.join().is_err() {
            warn!("producer thread panicked");
        }
    }
}

impl<T, E> Drop for CallbackIter<T, E> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn yields_items_then_error() {
        let iter = iter_from_callback(|emit: &mut dyn FnMut(u32) -> ControlFlow<()>| {
            for i in 0..3 {
                if emit(i).is_break() {
                    return Ok(());
                }
            }
            Err("boom".to_string())
        });
        let got: Vec<Result<u32, String>> = iter.collect();
        assert_eq!(got, vec![Ok(0), Ok(1), Ok(2), Err("boom".to_string())]);
    }

    #[test]
    fn early_drop_stops_producer() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&produced);
        let mut iter = iter_from_callback(move |emit: &mut dyn FnMut(usize) -> ControlFlow<()>| {
            for i in 0.. {
                counter.fetch_add(1, Ordering::SeqCst);
                if emit(i).is_break() {
                    break;
                }
            }
            Ok::<(), ()>(())
        });
        assert_eq!(iter.next(), Some(Ok(0)));
        drop(iter);
        // One item in the queue, one refused, at most one more in flight.
        assert!(produced.load(Ordering::SeqCst) <= 4);
    }
}
