//! Typeahead: jump to an item by typing the start of its label.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::UnboundedReceiver;
use log::{debug, trace};
use tokio::time::Instant;

use crate::emitter::Emitter;
use crate::keys::KeyCombo;

/// Default quiet period before buffered keystrokes are resolved.
pub const DEFAULT_TYPEAHEAD_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(200);

/// Items that can be matched by typeahead.
pub trait TypeaheadItem {
    /// The text typed characters are matched against.
    fn label(&self) -> String;
}

/// Predicate deciding whether an item is passed over.
pub type SkipPredicate<I> = Arc<dyn Fn(&I) -> bool + Send + Sync>;

/// Typeahead settings.
pub struct TypeaheadConfig<I> {
    /// Quiet period after the last keystroke before the buffer is resolved.
    pub debounce_interval: Duration,
    /// Items for which this returns true are never matched.
    pub skip_predicate: Option<SkipPredicate<I>>,
}

impl<I> Default for TypeaheadConfig<I> {
    fn default() -> Self {
        Self {
            debounce_interval: DEFAULT_TYPEAHEAD_DEBOUNCE_INTERVAL,
            skip_predicate: None,
        }
    }
}

impl<I> TypeaheadConfig<I> {
    /// Set the debounce interval.
    pub fn debounce_interval(mut self, interval: Duration) -> Self {
        self.debounce_interval = interval;
        self
    }

    /// Set the skip predicate.
    pub fn skip_predicate(mut self, predicate: impl Fn(&I) -> bool + Send + Sync + 'static) -> Self {
        self.skip_predicate = Some(Arc::new(predicate));
        self
    }
}

/// Buffers typed characters and resolves them to an item once typing pauses.
///
/// Time is passed in explicitly: the owner feeds keystrokes with
/// [`handle_key`](Self::handle_key), sleeps until [`deadline`](Self::deadline)
/// and then calls [`poll`](Self::poll).
pub struct Typeahead<I> {
    items: Vec<I>,
    selected_index: Option<usize>,
    pressed: Vec<char>,
    last_keystroke: Option<Instant>,
    debounce_interval: Duration,
    skip_predicate: Option<SkipPredicate<I>>,
    selected_item: Emitter<I>,
}

impl<I: TypeaheadItem + Clone> Typeahead<I> {
    /// Create a typeahead over `items`.
    pub fn new(items: Vec<I>, config: TypeaheadConfig<I>) -> Self {
        Self {
            items,
            selected_index: None,
            pressed: Vec::new(),
            last_keystroke: None,
            debounce_interval: config.debounce_interval,
            skip_predicate: config.skip_predicate,
            selected_item: Emitter::new(),
        }
    }

    /// Replace the searchable items. The buffer is kept.
    pub fn set_items(&mut self, items: Vec<I>) {
        self.items = items;
    }

    /// Tell the typeahead which item is currently selected; searches start
    /// right after it.
    pub fn set_current_selected_item_index(&mut self, index: Option<usize>) {
        self.selected_index = index;
    }

    /// Stream of items picked by typeahead.
    pub fn selected_item(&self) -> UnboundedReceiver<I> {
        self.selected_item.subscribe()
    }

    /// Buffer the character typed by `key`.
    ///
    /// Returns false (and buffers nothing) for keys that do not type a
    /// character.
    pub fn handle_key(&mut self, key: &KeyCombo, now: Instant) -> bool {
        let Some(c) = key.printable_char() else {
            return false;
        };
        self.pressed.extend(c.to_uppercase());
        self.last_keystroke = Some(now);
        trace!("Typeahead buffer: {:?}", self.pressed);
        true
    }

    /// Whether characters are waiting to be resolved.
    pub fn is_typing(&self) -> bool {
        !self.pressed.is_empty()
    }

    /// When the buffer resolves if no further key arrives.
    pub fn deadline(&self) -> Option<Instant> {
        if self.pressed.is_empty() {
            return None;
        }
        self.last_keystroke.map(|t| t + self.debounce_interval)
    }

    /// Resolve the buffer if the debounce interval has elapsed.
    ///
    /// The buffer is cleared whether or not an item matched. A match is also
    /// sent to [`selected_item`](Self::selected_item) subscribers.
    pub fn poll(&mut self, now: Instant) -> Option<I> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }

        let query: String = self.pressed.drain(..).collect();
        self.last_keystroke = None;

        let found = self.find_match(&query);
        match &found {
            Some(item) => {
                debug!("Typeahead '{}' matched '{}'", query, item.label());
                self.selected_item.emit(item.clone());
            }
            None => debug!("Typeahead '{}' matched nothing", query),
        }
        found
    }

    /// Drop buffered characters.
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.last_keystroke = None;
    }

    /// Drop buffered characters and end the selection stream.
    pub fn destroy(&mut self) {
        self.reset();
        self.selected_item.complete();
    }

    fn find_match(&self, query: &str) -> Option<I> {
        let len = self.items.len();
        let start = self.selected_index.map_or(0, |i| i + 1);
        (0..len)
            .map(|offset| &self.items[(start + offset) % len])
            .filter(|item| !self.skip_predicate.as_ref().is_some_and(|skip| skip(item)))
            .find(|item| item.label().trim().to_uppercase().starts_with(query))
            .cloned()
    }
}

impl<I> fmt::Debug for Typeahead<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typeahead")
            .field("items", &self.items.len())
            .field("selected_index", &self.selected_index)
            .field("pressed", &self.pressed)
            .field("debounce_interval", &self.debounce_interval)
            .finish_non_exhaustive()
    }
}
