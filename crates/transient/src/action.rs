use uom::si::f64::Time;

/// Control actions an observer can return to the time loop.
///
/// Actions take effect at the top of the next loop iteration. A solve in
/// progress always runs to completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Stop the run and finalize normally.
    StopEarly,

    /// Land a future step exactly on the given time.
    SetTargetTime(Time),
}
