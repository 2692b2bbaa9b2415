//! Page lifecycle events.
//!
//! Handlers run synchronously in registration order, and dispatch never
//! propagates a return value; the only observable effect a listener can
//! have is in-place mutation of a shared payload. The payload is an explicit
//! tagged type with two kinds:
//!
//! - [`Payload::Page`]: a shared, lockable page. Listener edits are visible
//!   to the dispatching caller. Used by `Loaded`.
//! - [`Payload::Slug`]: a snapshot. Each listener sees its own copy and
//!   cannot affect the caller. Used by `Loading`, `Saving` and `Saved`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::trace;

use crate::domain::entities::Page;
use crate::util::lock::{read_guard, write_guard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageEvent {
    Loading,
    Loaded,
    Saving,
    Saved,
}

impl PageEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            PageEvent::Loading => "page.loading",
            PageEvent::Loaded => "page.loaded",
            PageEvent::Saving => "page.saving",
            PageEvent::Saved => "page.saved",
        }
    }
}

#[derive(Clone)]
pub enum Payload {
    /// Shared mutable page; edits through the lock reach the caller.
    Page(Arc<Mutex<Page>>),
    /// Independent snapshot of the slug being operated on.
    Slug(String),
}

type Handler = Box<dyn Fn(&Payload) + Send + Sync>;

#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<HashMap<PageEvent, Vec<Handler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self, event: PageEvent, handler: impl Fn(&Payload) + Send + Sync + 'static) {
        write_guard(&self.listeners, "listen")
            .entry(event)
            .or_default()
            .push(Box::new(handler));
    }

    pub fn dispatch(&self, event: PageEvent, payload: &Payload) {
        let listeners = read_guard(&self.listeners, "dispatch");
        let Some(handlers) = listeners.get(&event) else {
            return;
        };
        trace!(event = event.as_str(), listeners = handlers.len(), "dispatching event");
        for handler in handlers {
            // Snapshot payloads are cloned per listener so no listener can
            // leak mutations to another through the payload itself.
            match payload {
                Payload::Page(_) => handler(payload),
                Payload::Slug(slug) => handler(&Payload::Slug(slug.clone())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::slug::Slug;

    #[test]
    fn handlers_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            dispatcher.listen(PageEvent::Saving, move |_| {
                order.lock().expect("order lock").push(label);
            });
        }

        dispatcher.dispatch(PageEvent::Saving, &Payload::Slug("about".to_string()));
        assert_eq!(
            *order.lock().expect("order lock"),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn shared_page_mutations_are_visible_to_the_dispatcher() {
        let dispatcher = EventDispatcher::new();
        dispatcher.listen(PageEvent::Loaded, |payload| {
            if let Payload::Page(page) = payload {
                page.lock().expect("page lock").title = "Rewritten".to_string();
            }
        });

        let page = Arc::new(Mutex::new(Page::new(
            Slug::new("about").expect("valid slug"),
            "Original",
            "",
        )));
        dispatcher.dispatch(PageEvent::Loaded, &Payload::Page(Arc::clone(&page)));

        assert_eq!(page.lock().expect("page lock").title, "Rewritten");
    }

    #[test]
    fn unrelated_events_do_not_fire() {
        let dispatcher = EventDispatcher::new();
        let fired = Arc::new(Mutex::new(false));
        {
            let fired = Arc::clone(&fired);
            dispatcher.listen(PageEvent::Saved, move |_| {
                *fired.lock().expect("fired lock") = true;
            });
        }

        dispatcher.dispatch(PageEvent::Loading, &Payload::Slug("about".to_string()));
        assert!(!*fired.lock().expect("fired lock"));
    }
}
