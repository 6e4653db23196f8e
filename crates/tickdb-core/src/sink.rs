//! Output seam between the coordinator and whoever renders its events

use crate::event::Event;

/// Receiver of coordinator events, in emission order
pub trait EventSink {
    /// Accept one event
    fn emit(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: Event) {
        (**self).emit(event);
    }
}
