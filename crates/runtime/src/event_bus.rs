use foundation::Id;

/// Handle of a registered listener, used to unregister it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(Id);

/// What a registration change did to the bus as a whole.
///
/// Owners use the edges to (un)subscribe from whatever upstream source feeds
/// the bus, so that the source is only watched while someone listens.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Activation {
    /// First listener registered.
    Activated,
    /// Last listener removed.
    Deactivated,
    Unchanged,
}

/// Listener registry for one event type.
///
/// Listeners are called synchronously, in registration order.
pub struct EventBus<E> {
    listeners: Vec<(ListenerId, Box<dyn FnMut(&E)>)>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&E) + 'static) -> (ListenerId, Activation) {
        let id = ListenerId(Id::next());
        self.listeners.push((id, Box::new(listener)));
        let edge = if self.listeners.len() == 1 {
            Activation::Activated
        } else {
            Activation::Unchanged
        };
        (id, edge)
    }

    /// Removes `id`. Unknown ids leave the bus untouched.
    pub fn unsubscribe(&mut self, id: ListenerId) -> Activation {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        if before > 0 && self.listeners.is_empty() {
            Activation::Deactivated
        } else {
            Activation::Unchanged
        }
    }

    pub fn emit(&mut self, event: &E) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{Activation, EventBus};

    #[test]
    fn reports_activation_edges() {
        let mut bus: EventBus<u32> = EventBus::new();
        let (a, edge) = bus.subscribe(|_| {});
        assert_eq!(edge, Activation::Activated);
        let (b, edge) = bus.subscribe(|_| {});
        assert_eq!(edge, Activation::Unchanged);

        assert_eq!(bus.unsubscribe(a), Activation::Unchanged);
        assert_eq!(bus.unsubscribe(a), Activation::Unchanged);
        assert_eq!(bus.unsubscribe(b), Activation::Deactivated);
        assert_eq!(bus.unsubscribe(b), Activation::Unchanged);
        assert!(bus.is_empty());
    }

    #[test]
    fn emits_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus: EventBus<u32> = EventBus::new();
        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            bus.subscribe(move |n| seen.borrow_mut().push(format!("{tag}:{n}")));
        }
        bus.emit(&7);
        assert_eq!(*seen.borrow(), vec!["first:7", "second:7"]);
    }
}
