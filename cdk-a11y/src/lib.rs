//! Keyboard interaction primitives for hierarchical widgets.
//!
//! - [`TreeKeyManager`] drives focus, expansion and activation over a flat
//!   list of tree items.
//! - [`Typeahead`] resolves typed characters to an item by label prefix.
//! - [`Children`] is the lazily resolved child sequence both of them consume.

pub mod children;
pub mod config;
pub mod emitter;
pub mod keys;
pub mod tree_key_manager;
pub mod typeahead;

pub use children::Children;
pub use config::{KeyNavConfig, Orientation};
pub use emitter::Emitter;
pub use keys::{EventResult, Key, KeyCombo, Modifiers, convert_key_event};
pub use tree_key_manager::{
    FocusOptions, FocusTarget, TrackBy, TreeKeyManager, TreeKeyManagerItem, TreeKeyManagerOptions,
};
pub use typeahead::{
    DEFAULT_TYPEAHEAD_DEBOUNCE_INTERVAL, SkipPredicate, Typeahead, TypeaheadConfig, TypeaheadItem,
};

pub mod prelude {
    pub use crate::children::Children;
    pub use crate::config::{KeyNavConfig, Orientation};
    pub use crate::keys::{EventResult, Key, KeyCombo, Modifiers};
    pub use crate::tree_key_manager::{TreeKeyManager, TreeKeyManagerItem, TreeKeyManagerOptions};
    pub use crate::typeahead::{Typeahead, TypeaheadConfig, TypeaheadItem};
}
