//! Injection point for monitoring and steering the solvers.

/// Receives solver events and optionally returns a control action.
///
/// Closures `FnMut(&E) -> Option<A>` implement this trait, and `()` is a no-op
/// observer that never acts.
pub trait Observer<E, A> {
    /// Observe an event; `Some(action)` asks the solver to act on it.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where F: FnMut(&E) -> Option<A>
{
    fn observe(&mut self, event: &E) -> Option<A> { self(event) }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> { None }
}
