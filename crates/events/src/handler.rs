use crate::Event;

/// Reacts to an event by deciding which effects must be applied.
///
/// Handlers are pure: they perform no IO. The caller that raised the event
/// (typically a store, inside its transaction) applies the returned effects,
/// so the triggering write and its consequences commit or roll back together.
pub trait EventHandler: Send + Sync {
    type Ev: Event;
    type Effect: Clone + core::fmt::Debug + Send;

    fn handle(&self, event: &Self::Ev) -> Vec<Self::Effect>;
}

/// Run several handlers of the same shape against one event, in order.
pub fn collect_effects<H>(handlers: &[&H], event: &H::Ev) -> Vec<H::Effect>
where
    H: EventHandler + ?Sized,
{
    handlers.iter().flat_map(|h| h.handle(event)).collect()
}
