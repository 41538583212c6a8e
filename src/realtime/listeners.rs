use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub type Listener<M> = Rc<dyn Fn(&M)>;

/// Ordered set of callbacks keyed by `Rc` identity.
///
/// Adding a callback that is already present is a no-op, so one
/// `unsubscribe` always leaves it with zero registrations.
pub struct ListenerRegistry<M> {
    entries: Rc<RefCell<Vec<Listener<M>>>>,
}

impl<M> Default for ListenerRegistry<M> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<M: 'static> ListenerRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Listener<M>) -> Subscription {
        {
            let mut entries = self.entries.borrow_mut();
            if !entries.iter().any(|l| Rc::ptr_eq(l, &listener)) {
                entries.push(listener.clone());
            }
        }

        let entries: Weak<RefCell<Vec<Listener<M>>>> = Rc::downgrade(&self.entries);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(entries) = entries.upgrade() {
                    entries.borrow_mut().retain(|l| !Rc::ptr_eq(l, &listener));
                }
            })),
        }
    }

    /// Calls every listener in registration order. Listeners may
    /// subscribe or unsubscribe while this runs; the change applies from
    /// the next message.
    pub fn emit(&self, message: &M) {
        let snapshot: Vec<Listener<M>> = self.entries.borrow().clone();
        for listener in snapshot {
            listener(message);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by `subscribe`. Dropping it does not unsubscribe.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn emits_in_registration_order() {
        let registry = ListenerRegistry::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = seen.clone();
        let _a = registry.subscribe(Rc::new(move |m: &u32| first.borrow_mut().push(("a", *m))));
        let second = seen.clone();
        let _b = registry.subscribe(Rc::new(move |m: &u32| second.borrow_mut().push(("b", *m))));

        registry.emit(&1);
        registry.emit(&2);

        assert_eq!(*seen.borrow(), vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn unsubscribe_removes_exactly_that_listener() {
        let registry = ListenerRegistry::<u32>::new();
        let hits = Rc::new(Cell::new(0));
        let other_hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let mut sub = registry.subscribe(Rc::new(move |_: &u32| h.set(h.get() + 1)));
        let o = other_hits.clone();
        let _other = registry.subscribe(Rc::new(move |_: &u32| o.set(o.get() + 1)));

        sub.unsubscribe();
        registry.emit(&0);

        assert_eq!(hits.get(), 0);
        assert_eq!(other_hits.get(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn double_registration_is_idempotent() {
        let registry = ListenerRegistry::<u32>::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let listener: Listener<u32> = Rc::new(move |_: &u32| h.set(h.get() + 1));
        let mut first = registry.subscribe(listener.clone());
        let mut second = registry.subscribe(listener);

        registry.emit(&0);
        assert_eq!(hits.get(), 1);
        assert_eq!(registry.len(), 1);

        first.unsubscribe();
        registry.emit(&0);
        assert_eq!(hits.get(), 1);
        assert!(registry.is_empty());

        second.unsubscribe();
        first.unsubscribe();
        assert!(registry.is_empty());
    }

    #[test]
    fn listener_can_unsubscribe_itself_mid_emit() {
        let registry = ListenerRegistry::<u32>::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let s = slot.clone();
        let h = hits.clone();
        let sub = registry.subscribe(Rc::new(move |_: &u32| {
            h.set(h.get() + 1);
            if let Some(mut sub) = s.borrow_mut().take() {
                sub.unsubscribe();
            }
        }));
        *slot.borrow_mut() = Some(sub);

        registry.emit(&0);
        registry.emit(&0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn unsubscribe_after_registry_dropped_is_harmless() {
        let registry = ListenerRegistry::<u32>::new();
        let mut sub = registry.subscribe(Rc::new(|_: &u32| {}));
        drop(registry);
        sub.unsubscribe();
    }
}
