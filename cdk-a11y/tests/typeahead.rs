use std::time::Duration;

use cdk_a11y::{Key, KeyCombo, Typeahead, TypeaheadConfig, TypeaheadItem};
use futures::{FutureExt, StreamExt};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
struct Fruit(&'static str);

impl TypeaheadItem for Fruit {
    fn label(&self) -> String {
        self.0.to_string()
    }
}

fn fruits(labels: &[&'static str]) -> Vec<Fruit> {
    labels.iter().copied().map(Fruit).collect()
}

fn press(typeahead: &mut Typeahead<Fruit>, c: char, at: Instant) {
    assert!(typeahead.handle_key(&KeyCombo::key(Key::Char(c)), at));
}

const AFTER_DEBOUNCE: Duration = Duration::from_millis(201);

#[test]
fn test_single_letter_selects_matching_item() {
    let mut typeahead = Typeahead::new(fruits(&["Apple", "Banana", "Cherry"]), TypeaheadConfig::default());
    let t0 = Instant::now();
    press(&mut typeahead, 'b', t0);
    assert_eq!(typeahead.poll(t0 + AFTER_DEBOUNCE), Some(Fruit("Banana")));
}

#[test]
fn test_no_match_clears_buffer() {
    let mut typeahead = Typeahead::new(fruits(&["Apple", "Banana", "Cherry"]), TypeaheadConfig::default());
    let t0 = Instant::now();
    press(&mut typeahead, 'z', t0);
    assert!(typeahead.is_typing());
    assert_eq!(typeahead.poll(t0 + AFTER_DEBOUNCE), None);
    assert!(!typeahead.is_typing());
}

#[test]
fn test_poll_waits_for_debounce() {
    let mut typeahead = Typeahead::new(fruits(&["Apple", "Banana"]), TypeaheadConfig::default());
    let t0 = Instant::now();
    press(&mut typeahead, 'a', t0);
    assert_eq!(typeahead.deadline(), Some(t0 + Duration::from_millis(200)));
    assert_eq!(typeahead.poll(t0 + Duration::from_millis(100)), None);
    assert!(typeahead.is_typing());

    // A new keystroke pushes the deadline out.
    press(&mut typeahead, 'p', t0 + Duration::from_millis(150));
    assert_eq!(typeahead.poll(t0 + Duration::from_millis(250)), None);
    assert_eq!(
        typeahead.poll(t0 + Duration::from_millis(350)),
        Some(Fruit("Apple"))
    );
}

#[test]
fn test_multiple_letters_are_joined() {
    let mut typeahead = Typeahead::new(fruits(&["Cat", "Cherry", "Coconut"]), TypeaheadConfig::default());
    let t0 = Instant::now();
    press(&mut typeahead, 'c', t0);
    press(&mut typeahead, 'h', t0 + Duration::from_millis(50));
    assert_eq!(typeahead.poll(t0 + Duration::from_millis(300)), Some(Fruit("Cherry")));
}

#[test]
fn test_search_starts_after_selection_and_wraps() {
    let mut typeahead = Typeahead::new(
        fruits(&["Apple", "Avocado", "Banana"]),
        TypeaheadConfig::default(),
    );
    let t0 = Instant::now();

    typeahead.set_current_selected_item_index(Some(0));
    press(&mut typeahead, 'a', t0);
    assert_eq!(typeahead.poll(t0 + AFTER_DEBOUNCE), Some(Fruit("Avocado")));

    typeahead.set_current_selected_item_index(Some(1));
    press(&mut typeahead, 'a', t0);
    assert_eq!(typeahead.poll(t0 + AFTER_DEBOUNCE), Some(Fruit("Apple")));
}

#[test]
fn test_skip_predicate_excludes_items() {
    let config = TypeaheadConfig::default().skip_predicate(|f: &Fruit| f.0 == "Banana");
    let mut typeahead = Typeahead::new(fruits(&["Banana", "Blueberry"]), config);
    let t0 = Instant::now();
    press(&mut typeahead, 'b', t0);
    assert_eq!(typeahead.poll(t0 + AFTER_DEBOUNCE), Some(Fruit("Blueberry")));
}

#[test]
fn test_labels_are_trimmed_and_case_insensitive() {
    let mut typeahead = Typeahead::new(fruits(&["  date", "Elderberry"]), TypeaheadConfig::default());
    let t0 = Instant::now();
    press(&mut typeahead, 'D', t0);
    assert_eq!(typeahead.poll(t0 + AFTER_DEBOUNCE), Some(Fruit("  date")));
}

#[test]
fn test_reset_drops_buffer() {
    let mut typeahead = Typeahead::new(fruits(&["Apple"]), TypeaheadConfig::default());
    let t0 = Instant::now();
    press(&mut typeahead, 'a', t0);
    typeahead.reset();
    assert_eq!(typeahead.deadline(), None);
    assert_eq!(typeahead.poll(t0 + AFTER_DEBOUNCE), None);
}

#[test]
fn test_non_character_keys_are_not_buffered() {
    let mut typeahead = Typeahead::new(fruits(&["Apple"]), TypeaheadConfig::default());
    let t0 = Instant::now();
    assert!(!typeahead.handle_key(&KeyCombo::key(Key::Down), t0));
    assert!(!typeahead.handle_key(&KeyCombo::key(Key::Char('a')).ctrl(), t0));
    assert!(!typeahead.is_typing());
}

#[test]
fn test_set_items_keeps_buffer() {
    let mut typeahead = Typeahead::new(fruits(&["Apple"]), TypeaheadConfig::default());
    let t0 = Instant::now();
    press(&mut typeahead, 'k', t0);
    typeahead.set_items(fruits(&["Apple", "Kiwi"]));
    assert_eq!(typeahead.poll(t0 + AFTER_DEBOUNCE), Some(Fruit("Kiwi")));
}

#[test]
fn test_custom_debounce_interval() {
    let config = TypeaheadConfig::default().debounce_interval(Duration::from_millis(500));
    let mut typeahead = Typeahead::new(fruits(&["Apple"]), config);
    let t0 = Instant::now();
    press(&mut typeahead, 'a', t0);
    assert_eq!(typeahead.poll(t0 + AFTER_DEBOUNCE), None);
    assert_eq!(typeahead.poll(t0 + Duration::from_millis(500)), Some(Fruit("Apple")));
}

#[test]
fn test_selected_item_stream_emits_matches() {
    let mut typeahead = Typeahead::new(fruits(&["Apple", "Banana"]), TypeaheadConfig::default());
    let mut selected = typeahead.selected_item();
    let t0 = Instant::now();
    press(&mut typeahead, 'b', t0);
    typeahead.poll(t0 + AFTER_DEBOUNCE);
    assert_eq!(selected.next().now_or_never(), Some(Some(Fruit("Banana"))));

    typeahead.destroy();
    assert_eq!(selected.next().now_or_never(), Some(None));
}
