//! Catch frames.
//!
//! A catch frame marks the current thread as having a handler on the stack
//! that will recover from a panic. The panic hook leaves such panics to the
//! frame (stashing their location for it) and routes every other panic to the
//! uncaught channel.

use crate::failure::{Failure, Location};
use pin_project_lite::pin_project;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::pin::Pin;
use std::task::{Context, Poll};

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static STASHED: RefCell<Option<Location>> = const { RefCell::new(None) };
}

struct Frame;

impl Frame {
    fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        Frame
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn in_frame() -> bool {
    DEPTH.try_with(|depth| depth.get() > 0).unwrap_or(false)
}

fn take_stashed() -> Option<Location> {
    STASHED.with(|stashed| stashed.borrow_mut().take())
}

/// Runs `f`, turning a panic into a [`Failure`].
pub fn catch<F, R>(f: F) -> Result<R, Failure>
where
    F: FnOnce() -> R,
{
    let _frame = Frame::enter();
    // A panic recovered by code inside an earlier frame leaves its location behind.
    take_stashed();
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| Failure::from_panic(payload.as_ref(), take_stashed()))
}

/// Wraps a future so a panic while polling it resolves to a [`Failure`].
///
/// The frame is entered on every poll, so the future may move between
/// worker threads.
pub fn catch_future<F: Future>(future: F) -> CatchPanic<F> {
    CatchPanic { inner: future }
}

pin_project! {
    pub struct CatchPanic<F> {
        #[pin]
        inner: F,
    }
}

impl<F: Future> Future for CatchPanic<F> {
    type Output = Result<F::Output, Failure>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.project().inner;
        match catch(|| inner.poll(cx)) {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(failure) => Poll::Ready(Err(failure)),
        }
    }
}

/// The process panic hook while an uncaught handler is installed.
pub(crate) fn dispatch_panic(info: &PanicHookInfo<'_>) {
    let location = info.location().map(Location::from);

    if in_frame() {
        let _ = STASHED.try_with(|stashed| *stashed.borrow_mut() = location);
        return;
    }

    let failure = Failure::from_panic(info.payload(), location);
    super::emit_uncaught(&failure);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_passes_value_through() {
        assert_eq!(catch(|| 21 * 2).unwrap(), 42);
        assert!(!in_frame());
    }

    #[test]
    fn test_catch_converts_panic() {
        let failure = catch(|| -> u8 { panic!("boom") }).unwrap_err();
        assert_eq!(failure.message(), "boom");
        assert!(!in_frame());
    }

    #[test]
    fn test_nested_frames_unwind_depth() {
        let outer = catch(|| {
            let inner = catch(|| -> () { panic!("inner") });
            assert!(in_frame());
            inner.unwrap_err().message().to_string()
        });
        assert_eq!(outer.unwrap(), "inner");
        assert!(!in_frame());
    }

    #[tokio::test]
    async fn test_catch_future_across_await() {
        let ok = catch_future(async {
            tokio::task::yield_now().await;
            "done"
        })
        .await;
        assert_eq!(ok.unwrap(), "done");

        let failure = catch_future(async {
            tokio::task::yield_now().await;
            if std::hint::black_box(true) {
                panic!("late boom");
            }
            0_u8
        })
        .await
        .unwrap_err();
        assert_eq!(failure.message(), "late boom");
    }
}
