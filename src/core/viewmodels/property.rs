use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::watch;

/// Observable value shared between the session controller and its observers.
///
/// The controller is the only writer. Clones share the same underlying value,
/// so a UI or coordinator can hold a read side without owning session state.
pub struct Property<T: Clone + Send + Sync> {
    sender: Arc<watch::Sender<T>>,
    name: Arc<str>,
}

pub struct PropertySubscriber<T> {
    receiver: watch::Receiver<T>,
}

// PropertySubscriber intentionally does not implement Clone.
// Each subscriber tracks its own "seen" version; call Property::subscribe() again.

impl<T: Clone + Send + Sync> PropertySubscriber<T> {
    /// Waits for the next change. Returns false once the property is gone.
    pub async fn wait_for_change(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Returns true if the value changed since this subscriber last looked.
    pub fn try_recv(&mut self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Current value, marking it as seen.
    pub fn current(&mut self) -> T {
        self.receiver.borrow_and_update().clone()
    }
}

impl<T: Clone + Send + Sync> Property<T> {
    pub fn new(initial_value: T, name: impl Into<String>) -> Self {
        let (sender, _) = watch::channel(initial_value);
        Self {
            sender: Arc::new(sender),
            name: Arc::from(name.into()),
        }
    }

    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    pub fn set(&self, new_value: T) {
        self.sender.send_replace(new_value);
    }

    pub fn update<F>(&self, updater: F)
    where
        F: FnOnce(&mut T),
    {
        self.sender.send_modify(updater);
    }

    pub fn subscribe(&self) -> PropertySubscriber<T> {
        PropertySubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Clone + Send + Sync + PartialEq> Property<T> {
    /// Stores the value only if it differs, so subscribers see one notification
    /// per real change. Returns whether a change was published.
    pub fn set_if_changed(&self, new_value: T) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == new_value {
                false
            } else {
                *current = new_value;
                true
            }
        })
    }
}

impl<T: Clone + Send + Sync> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            name: self.name.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + Debug> Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Property({} = {:?})", self.name, *self.sender.borrow())
    }
}
