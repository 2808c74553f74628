//! Zone propagation through continuation chains.
//!
//! Every continuation registration is a scheduling point of its own: a link
//! added with `then` re-enters the zone that was active when `then` was
//! called, not the zone that started the chain or the one active when it
//! settles.

use crate::error::ZoneError;
use crate::zone::{self, Zone};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

pub type OnFulfilled<T> = Box<dyn FnOnce(T) -> anyhow::Result<T> + Send>;
pub type OnRejected<T> = Box<dyn FnOnce(anyhow::Error) -> anyhow::Result<T> + Send>;

/// A promise-like value that accepts continuations.
pub trait Thenable: Sized {
    type Output: Send + 'static;

    /// Register continuations; the returned thenable settles with the result
    /// of whichever continuation runs. A missing rejection handler passes the
    /// error through.
    fn then(
        self,
        on_fulfilled: OnFulfilled<Self::Output>,
        on_rejected: Option<OnRejected<Self::Output>>,
    ) -> Self;
}

/// Thenable whose continuations are bound at registration time
pub struct ZonedThenable<P> {
    inner: P,
    zoned: bool,
}

impl<P: Thenable> ZonedThenable<P> {
    pub fn new(inner: P) -> Self {
        Self { inner, zoned: true }
    }

    /// Continuations run wherever the host runs them.
    pub fn passthrough(inner: P) -> Self {
        Self {
            inner,
            zoned: false,
        }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    pub fn then<F>(self, on_fulfilled: F) -> Self
    where
        F: FnOnce(P::Output) -> anyhow::Result<P::Output> + Send + 'static,
    {
        self.then_or_else(on_fulfilled, None::<fn(anyhow::Error) -> anyhow::Result<P::Output>>)
    }

    pub fn then_or_else<F, G>(self, on_fulfilled: F, on_rejected: Option<G>) -> Self
    where
        F: FnOnce(P::Output) -> anyhow::Result<P::Output> + Send + 'static,
        G: FnOnce(anyhow::Error) -> anyhow::Result<P::Output> + Send + 'static,
    {
        if !self.zoned {
            let rejected = on_rejected.map(|g| Box::new(g) as OnRejected<P::Output>);
            return Self::passthrough(self.inner.then(Box::new(on_fulfilled), rejected));
        }
        let zone = zone::current();
        let fulfilled = bind_once(&zone, on_fulfilled);
        let rejected = on_rejected.map(|g| bind_once(&zone, g));
        Self::new(self.inner.then(fulfilled, rejected))
    }
}

impl<P: Thenable> Thenable for ZonedThenable<P> {
    type Output = P::Output;

    fn then(
        self,
        on_fulfilled: OnFulfilled<Self::Output>,
        on_rejected: Option<OnRejected<Self::Output>>,
    ) -> Self {
        self.then_or_else(on_fulfilled, on_rejected)
    }
}

fn bind_once<A, T, F>(zone: &Arc<Zone>, f: F) -> Box<dyn FnOnce(A) -> anyhow::Result<T> + Send>
where
    A: Send + 'static,
    T: Send + 'static,
    F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
{
    let zone = Arc::clone(zone);
    Box::new(move |value| match zone.run(|| f(value)) {
        Ok(Some(next)) => Ok(next),
        Ok(None) => Err(ZoneError::Handled { zone: zone.id() }.into()),
        Err(err) => Err(err.into()),
    })
}

impl Zone {
    /// Wrap a thenable-returning function so it runs in this zone and every
    /// continuation later attached to its result is bound where attached.
    pub fn bind_promise_fn<A, P, F>(
        self: &Arc<Self>,
        f: F,
    ) -> impl FnMut(A) -> Result<ZonedThenable<P>, ZoneError>
    where
        P: Thenable,
        F: FnMut(A) -> anyhow::Result<P>,
    {
        let zone = Arc::clone(self);
        let mut bound = self.bind(f);
        move |args| match bound(args)? {
            Some(inner) => Ok(ZonedThenable::new(inner)),
            None => Err(ZoneError::Handled { zone: zone.id() }),
        }
    }
}

/// [`Zone::bind_promise_fn`] on the active zone.
pub fn bind_promise_fn<A, P, F>(f: F) -> impl FnMut(A) -> Result<ZonedThenable<P>, ZoneError>
where
    P: Thenable,
    F: FnMut(A) -> anyhow::Result<P>,
{
    zone::current().bind_promise_fn(f)
}

/// A future that re-enters its zone around every poll.
pub struct ZonedFuture<F> {
    zone: Arc<Zone>,
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for ZonedFuture<F> {
    type Output = Result<F::Output, ZoneError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let inner = &mut this.inner;
        match this.zone.run(|| Ok(inner.as_mut().poll(cx))) {
            Ok(Some(Poll::Ready(output))) => Poll::Ready(Ok(output)),
            Ok(Some(Poll::Pending)) => Poll::Pending,
            Ok(None) => Poll::Ready(Err(ZoneError::Handled {
                zone: this.zone.id(),
            })),
            Err(err) => Poll::Ready(Err(err)),
        }
    }
}

pub trait ZoneFutureExt: Future + Sized {
    fn in_zone(self, zone: Arc<Zone>) -> ZonedFuture<Self> {
        ZonedFuture {
            zone,
            inner: Box::pin(self),
        }
    }

    fn in_current_zone(self) -> ZonedFuture<Self> {
        self.in_zone(zone::current())
    }
}

impl<F: Future> ZoneFutureExt for F {}
