//! Notification sinks supplied by the host

/// Receives phase transitions from an idle timer.
///
/// `on_idle` fires exactly once per Active -> Idle transition. `on_active`
/// fires when a reset brings the timer back from Idle and is optional.
pub trait SessionObserver {
    fn on_idle(&mut self);

    fn on_active(&mut self) {}
}

/// Observer built from closures
pub struct FnObserver<I, A> {
    on_idle: I,
    on_active: Option<A>,
}

impl<I> FnObserver<I, fn()>
where
    I: FnMut(),
{
    /// Observer that only cares about idle transitions
    pub fn idle_only(on_idle: I) -> Self {
        Self {
            on_idle,
            on_active: None,
        }
    }
}

impl<I, A> FnObserver<I, A>
where
    I: FnMut(),
    A: FnMut(),
{
    pub fn new(on_idle: I, on_active: A) -> Self {
        Self {
            on_idle,
            on_active: Some(on_active),
        }
    }
}

impl<I, A> SessionObserver for FnObserver<I, A>
where
    I: FnMut(),
    A: FnMut(),
{
    fn on_idle(&mut self) {
        (self.on_idle)();
    }

    fn on_active(&mut self) {
        if let Some(on_active) = self.on_active.as_mut() {
            on_active();
        }
    }
}
