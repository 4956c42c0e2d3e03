use std::fmt;

/// What caused a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A bundle replaced the present project and cleared history.
    Loaded,
    Undo,
    Redo,
    /// An editor finished a batch of edits to the present project.
    Edited,
}

/// Handle returned by [`Observers::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback<T> = Box<dyn FnMut(&Change, &T)>;

/// Registered change observers, notified in subscription order.
pub struct Observers<T> {
    entries: Vec<(SubscriptionId, Callback<T>)>,
    next_id: u64,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl<T> Observers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&Change, &T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(callback)));
        id
    }

    /// Remove an observer. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn notify(&mut self, change: &Change, present: &T) {
        tracing::trace!(?change, observers = self.entries.len(), "notifying observers");
        for (_, callback) in &mut self.entries {
            callback(change, present);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn notifies_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut observers = Observers::<u32>::new();

        let first = Rc::clone(&log);
        observers.subscribe(move |change, value| first.borrow_mut().push((1, *change, *value)));
        let second = Rc::clone(&log);
        observers.subscribe(move |change, value| second.borrow_mut().push((2, *change, *value)));

        observers.notify(&Change::Undo, &7);
        assert_eq!(
            *log.borrow(),
            vec![(1, Change::Undo, 7), (2, Change::Undo, 7)]
        );
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let count = Rc::new(RefCell::new(0));
        let mut observers = Observers::<()>::new();

        let counter = Rc::clone(&count);
        let id = observers.subscribe(move |_, _| *counter.borrow_mut() += 1);
        observers.notify(&Change::Edited, &());
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.notify(&Change::Edited, &());

        assert_eq!(*count.borrow(), 1);
        assert!(observers.is_empty());
    }
}
