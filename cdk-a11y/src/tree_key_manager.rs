//! Keyboard navigation for tree-shaped widgets.
//!
//! [`TreeKeyManager`] works on a flat, ordered list of the items that are
//! currently navigable (usually the visible rows of a tree). It moves focus
//! with the arrow/Home/End keys, expands and collapses with the horizontal
//! arrows, activates with Enter/Space, expands a whole level with `*`, and
//! forwards printable characters to a [`Typeahead`].
//!
//! Boundaries do not wrap: ArrowDown on the last available item and ArrowUp
//! on the first one leave focus where it is.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::UnboundedReceiver;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use log::{debug, trace};
use tokio::time::Instant;

use crate::children::Children;
use crate::config::{KeyNavConfig, Orientation};
use crate::emitter::Emitter;
use crate::keys::{EventResult, Key, KeyCombo};
use crate::typeahead::{SkipPredicate, Typeahead, TypeaheadConfig, TypeaheadItem};

/// Capabilities an item must offer to be driven by a [`TreeKeyManager`].
pub trait TreeKeyManagerItem: TypeaheadItem + Clone + PartialEq + Send + Sync + 'static {
    /// Give the item focus.
    fn focus(&self);
    /// Take focus away from the item.
    fn unfocus(&self);
    /// Perform the item's primary action.
    fn activate(&self);
    /// Expand the item. No-op for leaves.
    fn expand(&self);
    /// Collapse the item.
    fn collapse(&self);
    /// Whether the item is expanded.
    fn is_expanded(&self) -> bool;
    /// Whether the item is disabled. Disabled items are not picked for
    /// initial focus.
    fn is_disabled(&self) -> bool {
        false
    }
    /// The item's parent, if it has one.
    fn parent(&self) -> Option<Self>;
    /// The item's direct children.
    fn children(&self) -> Children<Self>;
}

/// Equality used to recognize the same item across item list updates.
pub type TrackBy<I> = Arc<dyn Fn(&I, &I) -> bool + Send + Sync>;

/// Options for [`TreeKeyManager`].
pub struct TreeKeyManagerOptions<I> {
    /// Activate items as soon as they receive focus.
    pub activation_follows_focus: bool,
    /// Reading direction.
    pub orientation: Orientation,
    /// Items for which this returns true are never focused by navigation.
    pub skip_predicate: Option<SkipPredicate<I>>,
    /// Item identity; defaults to `PartialEq`.
    pub track_by: Option<TrackBy<I>>,
    /// Typeahead debounce; `None` disables typeahead.
    pub typeahead: Option<Duration>,
}

impl<I> Default for TreeKeyManagerOptions<I> {
    fn default() -> Self {
        Self {
            activation_follows_focus: false,
            orientation: Orientation::Ltr,
            skip_predicate: None,
            track_by: None,
            typeahead: None,
        }
    }
}

impl<I> TreeKeyManagerOptions<I> {
    /// Options from a serializable config.
    pub fn from_config(config: &KeyNavConfig) -> Self {
        Self {
            activation_follows_focus: config.activation_follows_focus,
            orientation: config.orientation,
            typeahead: config.typeahead_debounce(),
            ..Self::default()
        }
    }

    /// Activate items as soon as they receive focus.
    pub fn activation_follows_focus(mut self, follows: bool) -> Self {
        self.activation_follows_focus = follows;
        self
    }

    /// Set the reading direction.
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set the skip predicate.
    pub fn skip_predicate(mut self, predicate: impl Fn(&I) -> bool + Send + Sync + 'static) -> Self {
        self.skip_predicate = Some(Arc::new(predicate));
        self
    }

    /// Set the identity function.
    pub fn track_by(mut self, track_by: impl Fn(&I, &I) -> bool + Send + Sync + 'static) -> Self {
        self.track_by = Some(Arc::new(track_by));
        self
    }

    /// Enable typeahead with the given debounce.
    pub fn typeahead(mut self, debounce: Duration) -> Self {
        self.typeahead = Some(debounce);
        self
    }
}

/// What to focus.
#[derive(Debug, Clone)]
pub enum FocusTarget<I> {
    /// The item at this index of the item list.
    Index(usize),
    /// The item identical (by track-by) to this one.
    Item(I),
}

impl<I> From<usize> for FocusTarget<I> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl<I: Clone> From<&I> for FocusTarget<I> {
    fn from(item: &I) -> Self {
        Self::Item(item.clone())
    }
}

/// Options for [`TreeKeyManager::focus_item_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusOptions {
    /// Emit on the change stream when focus moves.
    pub emit_change_event: bool,
}

impl Default for FocusOptions {
    fn default() -> Self {
        Self {
            emit_change_event: true,
        }
    }
}

/// A lookup waiting on a child sequence that had not emitted yet.
enum PendingLookup<I> {
    /// Focus the first available child.
    FocusFirstChild(BoxFuture<'static, Vec<I>>),
    /// Expand every item in the sequence.
    ExpandAll(BoxFuture<'static, Vec<I>>),
}

/// Keyboard state machine over a flat list of tree items.
pub struct TreeKeyManager<I: TreeKeyManagerItem> {
    items: Vec<I>,
    item_stream: Option<BoxStream<'static, Vec<I>>>,
    active_index: Option<usize>,
    active_item: Option<I>,
    has_initial_focused: bool,
    activation_follows_focus: bool,
    orientation: Orientation,
    skip_predicate: Option<SkipPredicate<I>>,
    track_by: Option<TrackBy<I>>,
    typeahead: Option<Typeahead<I>>,
    pending: Vec<PendingLookup<I>>,
    change: Emitter<Option<I>>,
}

impl<I: TreeKeyManagerItem> TreeKeyManager<I> {
    /// Create a manager over a fixed item list and focus the first available
    /// item.
    pub fn new(items: Vec<I>, options: TreeKeyManagerOptions<I>) -> Self {
        let mut manager = Self::with_options(options);
        manager.items = items;
        if let Some(typeahead) = manager.typeahead.as_mut() {
            typeahead.set_items(manager.items.clone());
        }
        manager.initialize_focus();
        manager
    }

    /// Create a manager whose items arrive on a stream.
    ///
    /// Emissions that are already available are applied immediately; later
    /// ones are picked up by [`poll_items`](Self::poll_items),
    /// [`next_items`](Self::next_items) and before each key press.
    pub fn with_stream(
        items: impl Stream<Item = Vec<I>> + Send + 'static,
        options: TreeKeyManagerOptions<I>,
    ) -> Self {
        let mut manager = Self::with_options(options);
        manager.item_stream = Some(items.boxed());
        manager.poll_items();
        manager
    }

    fn with_options(options: TreeKeyManagerOptions<I>) -> Self {
        let typeahead = options.typeahead.map(|debounce| {
            let mut config = TypeaheadConfig::default().debounce_interval(debounce);
            config.skip_predicate = options.skip_predicate.clone();
            Typeahead::new(Vec::new(), config)
        });
        Self {
            items: Vec::new(),
            item_stream: None,
            active_index: None,
            active_item: None,
            has_initial_focused: false,
            activation_follows_focus: options.activation_follows_focus,
            orientation: options.orientation,
            skip_predicate: options.skip_predicate,
            track_by: options.track_by,
            typeahead,
            pending: Vec::new(),
            change: Emitter::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    /// The current item list.
    pub fn items(&self) -> &[I] {
        &self.items
    }

    /// Replace the item list.
    ///
    /// The active item keeps its focus if it is still present (its index is
    /// updated); if it is gone, the active state is cleared.
    pub fn set_items(&mut self, items: Vec<I>) {
        trace!("TreeKeyManager: {} items", items.len());
        self.items = items;
        if let Some(typeahead) = self.typeahead.as_mut() {
            typeahead.set_items(self.items.clone());
        }
        self.update_active_item_index();
        self.initialize_focus();
    }

    /// Apply every item list emission that is already available.
    ///
    /// Returns true if the item list changed.
    pub fn poll_items(&mut self) -> bool {
        let mut latest = None;
        if let Some(stream) = self.item_stream.as_mut() {
            while let Some(next) = stream.next().now_or_never() {
                match next {
                    Some(items) => latest = Some(items),
                    None => {
                        self.item_stream = None;
                        break;
                    }
                }
            }
        }
        match latest {
            Some(items) => {
                self.set_items(items);
                true
            }
            None => false,
        }
    }

    /// Wait for the next item list emission and apply it.
    ///
    /// Returns false once the item stream has ended (or if there is none).
    pub async fn next_items(&mut self) -> bool {
        let Some(stream) = self.item_stream.as_mut() else {
            return false;
        };
        match stream.next().await {
            Some(items) => {
                self.set_items(items);
                true
            }
            None => {
                self.item_stream = None;
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Active item
    // -------------------------------------------------------------------------

    /// Index of the active item, if any.
    pub fn active_item_index(&self) -> Option<usize> {
        self.active_index
    }

    /// The active item, if any.
    pub fn active_item(&self) -> Option<&I> {
        self.active_item.as_ref()
    }

    /// Stream of newly focused items.
    pub fn change(&self) -> UnboundedReceiver<Option<I>> {
        self.change.subscribe()
    }

    /// Focus an item (or the item at an index), emitting a change event.
    pub fn focus_item(&mut self, target: impl Into<FocusTarget<I>>) {
        self.focus_item_with(target, FocusOptions::default());
    }

    /// Focus an item (or the item at an index).
    ///
    /// Unknown items and out-of-range indices are ignored, as is focusing the
    /// item that is already active.
    pub fn focus_item_with(&mut self, target: impl Into<FocusTarget<I>>, options: FocusOptions) {
        let index = match target.into() {
            FocusTarget::Index(index) => Some(index),
            FocusTarget::Item(item) => self.index_of(&item),
        };
        let Some(index) = index.filter(|&i| i < self.items.len()) else {
            return;
        };
        let item = self.items[index].clone();

        if self
            .active_item
            .as_ref()
            .is_some_and(|active| self.same_item(active, &item))
        {
            return;
        }

        debug!("TreeKeyManager: focus index {}", index);
        let previous = self.active_item.replace(item.clone());
        self.active_index = Some(index);
        if let Some(typeahead) = self.typeahead.as_mut() {
            typeahead.set_current_selected_item_index(Some(index));
        }

        item.focus();
        if let Some(previous) = previous {
            previous.unfocus();
        }

        if options.emit_change_event {
            self.change.emit(Some(item));
        }

        if self.activation_follows_focus {
            self.activate_current_item();
        }
    }

    // -------------------------------------------------------------------------
    // Keyboard
    // -------------------------------------------------------------------------

    /// Handle a key press.
    pub fn on_keydown(&mut self, key: &KeyCombo) -> EventResult {
        self.on_keydown_at(key, Instant::now())
    }

    /// Handle a key press that happened at `now`.
    ///
    /// Navigation keys are consumed and clear the typeahead buffer. Tab and
    /// typed characters are left to the host.
    pub fn on_keydown_at(&mut self, key: &KeyCombo, now: Instant) -> EventResult {
        self.poll_items();
        self.poll_pending();
        self.poll_typeahead(now);

        trace!("TreeKeyManager: key {:?}", key.key);
        match key.key {
            Key::Tab => return EventResult::Ignored,
            Key::Down => self.focus_next_item(),
            Key::Up => self.focus_previous_item(),
            Key::Right => match self.orientation {
                Orientation::Rtl => self.collapse_current_item(),
                Orientation::Ltr => self.expand_current_item(),
            },
            Key::Left => match self.orientation {
                Orientation::Rtl => self.expand_current_item(),
                Orientation::Ltr => self.collapse_current_item(),
            },
            Key::Home => self.focus_first_item(),
            Key::End => self.focus_last_item(),
            Key::Enter | Key::Space => self.activate_current_item(),
            Key::Char('*') => self.expand_all_items_at_current_item_level(),
            _ => {
                if let Some(typeahead) = self.typeahead.as_mut() {
                    typeahead.handle_key(key, now);
                }
                return EventResult::Ignored;
            }
        }

        if let Some(typeahead) = self.typeahead.as_mut() {
            typeahead.reset();
        }
        EventResult::Consumed
    }

    /// When the typeahead buffer resolves if no further key arrives.
    pub fn typeahead_deadline(&self) -> Option<Instant> {
        self.typeahead.as_ref().and_then(Typeahead::deadline)
    }

    /// Resolve the typeahead buffer if its debounce has elapsed, focusing the
    /// matched item.
    pub fn poll_typeahead(&mut self, now: Instant) -> bool {
        let Some(item) = self.typeahead.as_mut().and_then(|t| t.poll(now)) else {
            return false;
        };
        self.focus_item(&item);
        true
    }

    /// Whether typed characters are waiting to be resolved.
    pub fn is_typing(&self) -> bool {
        self.typeahead.as_ref().is_some_and(Typeahead::is_typing)
    }

    /// Whether work is waiting on a child sequence or the typeahead debounce.
    pub fn has_pending_work(&self) -> bool {
        !self.pending.is_empty() || self.is_typing()
    }

    /// Finish every parked lookup and the typeahead debounce.
    pub async fn settle(&mut self) {
        for lookup in std::mem::take(&mut self.pending) {
            match lookup {
                PendingLookup::FocusFirstChild(children) => {
                    let children = children.await;
                    self.focus_first_available(&children);
                }
                PendingLookup::ExpandAll(items) => {
                    for item in items.await {
                        item.expand();
                    }
                }
            }
        }
        if let Some(deadline) = self.typeahead_deadline() {
            tokio::time::sleep_until(deadline).await;
            self.poll_typeahead(deadline);
        }
    }

    /// Tear down the change stream and typeahead.
    pub fn destroy(&mut self) {
        self.pending.clear();
        self.item_stream = None;
        if let Some(typeahead) = self.typeahead.as_mut() {
            typeahead.destroy();
        }
        self.change.complete();
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn initialize_focus(&mut self) {
        if self.has_initial_focused || self.items.is_empty() {
            return;
        }
        let index = self
            .items
            .iter()
            .position(|item| !self.is_skipped(item) && !item.is_disabled())
            .unwrap_or(0);
        self.focus_item(index);
        self.has_initial_focused = true;
    }

    fn update_active_item_index(&mut self) {
        let Some(active) = self.active_item.clone() else {
            return;
        };
        match self.index_of(&active) {
            Some(index) => {
                if self.active_index != Some(index) {
                    self.active_index = Some(index);
                    if let Some(typeahead) = self.typeahead.as_mut() {
                        typeahead.set_current_selected_item_index(Some(index));
                    }
                }
                self.active_item = Some(self.items[index].clone());
            }
            None => {
                debug!("TreeKeyManager: active item left the list");
                self.active_index = None;
                self.active_item = None;
                if let Some(typeahead) = self.typeahead.as_mut() {
                    typeahead.set_current_selected_item_index(None);
                }
            }
        }
    }

    fn same_item(&self, a: &I, b: &I) -> bool {
        match &self.track_by {
            Some(track_by) => track_by(a, b),
            None => a == b,
        }
    }

    fn index_of(&self, item: &I) -> Option<usize> {
        self.items.iter().position(|i| self.same_item(i, item))
    }

    fn is_skipped(&self, item: &I) -> bool {
        self.skip_predicate.as_ref().is_some_and(|skip| skip(item))
    }

    fn focus_first_item(&mut self) {
        if let Some(index) = self.find_next_available_item_index(None) {
            self.focus_item(index);
        }
    }

    fn focus_last_item(&mut self) {
        if let Some(index) = self.find_previous_available_item_index(self.items.len()) {
            self.focus_item(index);
        }
    }

    fn focus_next_item(&mut self) {
        if let Some(index) = self.find_next_available_item_index(self.active_index) {
            self.focus_item(index);
        }
    }

    fn focus_previous_item(&mut self) {
        let start = self.active_index.unwrap_or(0);
        if let Some(index) = self.find_previous_available_item_index(start) {
            self.focus_item(index);
        }
    }

    /// First non-skipped index after `start` (from the top when `None`).
    /// `None` means focus stays where it is.
    fn find_next_available_item_index(&self, start: Option<usize>) -> Option<usize> {
        let from = start.map_or(0, |i| i + 1);
        (from..self.items.len()).find(|&i| !self.is_skipped(&self.items[i]))
    }

    /// Last non-skipped index before `start`. `None` means focus stays where
    /// it is.
    fn find_previous_available_item_index(&self, start: usize) -> Option<usize> {
        (0..start.min(self.items.len()))
            .rev()
            .find(|&i| !self.is_skipped(&self.items[i]))
    }

    fn collapse_current_item(&mut self) {
        let Some(active) = self.active_item.clone() else {
            return;
        };
        if active.is_expanded() {
            active.collapse();
            return;
        }
        let Some(parent) = active.parent() else {
            return;
        };
        if self.is_skipped(&parent) {
            return;
        }
        self.focus_item(&parent);
    }

    fn expand_current_item(&mut self) {
        let Some(active) = self.active_item.clone() else {
            return;
        };
        if !active.is_expanded() {
            active.expand();
            return;
        }
        match active.children().try_first() {
            Ok(children) => self.focus_first_available(&children),
            Err(pending) => {
                trace!("TreeKeyManager: children not ready, parking focus");
                self.pending
                    .push(PendingLookup::FocusFirstChild(pending.first().boxed()));
            }
        }
    }

    fn focus_first_available(&mut self, children: &[I]) {
        if let Some(child) = children.iter().find(|c| !self.is_skipped(c)) {
            let child = child.clone();
            self.focus_item(&child);
        }
    }

    fn expand_all_items_at_current_item_level(&mut self) {
        let Some(active) = self.active_item.clone() else {
            return;
        };
        let siblings = match active.parent() {
            None => Children::ready(
                self.items
                    .iter()
                    .filter(|item| item.parent().is_none())
                    .cloned()
                    .collect(),
            ),
            Some(parent) => parent.children(),
        };
        match siblings.try_first() {
            Ok(items) => {
                for item in items {
                    item.expand();
                }
            }
            Err(pending) => {
                self.pending
                    .push(PendingLookup::ExpandAll(pending.first().boxed()));
            }
        }
    }

    fn activate_current_item(&self) {
        if let Some(active) = &self.active_item {
            active.activate();
        }
    }

    fn poll_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut still_pending = Vec::new();
        for lookup in std::mem::take(&mut self.pending) {
            match lookup {
                PendingLookup::FocusFirstChild(mut children) => match (&mut children).now_or_never() {
                    Some(children) => self.focus_first_available(&children),
                    None => still_pending.push(PendingLookup::FocusFirstChild(children)),
                },
                PendingLookup::ExpandAll(mut items) => match (&mut items).now_or_never() {
                    Some(items) => {
                        for item in items {
                            item.expand();
                        }
                    }
                    None => still_pending.push(PendingLookup::ExpandAll(items)),
                },
            }
        }
        self.pending = still_pending;
    }
}

impl<I: TreeKeyManagerItem> fmt::Debug for TreeKeyManager<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeKeyManager")
            .field("items", &self.items.len())
            .field("active_index", &self.active_index)
            .field("orientation", &self.orientation)
            .field("activation_follows_focus", &self.activation_follows_focus)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
