/// Receives events from a solver and optionally steers it.
///
/// Solvers emit an event `E` at well-defined points and give the observer a
/// chance to return an action `A`. Returning `None` lets the solver continue
/// unchanged.
///
/// Two implementations are provided:
///
/// - `()` ignores every event, for unobserved runs.
/// - Any `FnMut(&E) -> Option<A>` closure, for quick inline observers.
///
/// # Example
///
/// ```
/// use twine_core::Observer;
///
/// #[derive(Debug, PartialEq)]
/// enum Action {
///     Stop,
/// }
///
/// fn first_stop<Obs: Observer<usize, Action>>(mut observer: Obs, events: &[usize]) -> Option<usize> {
///     events.iter().copied().find(|event| observer.observe(event).is_some())
/// }
///
/// let stop_above_two = |event: &usize| (*event > 2).then_some(Action::Stop);
///
/// assert_eq!(first_stop(stop_above_two, &[1, 2, 3, 4]), Some(3));
/// assert_eq!(first_stop((), &[1, 2, 3, 4]), None);
/// ```
pub trait Observer<E, A> {
    /// Observes an event and returns an optional action.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}
