//! Layer selection and keyboard input
//!
//! Selection never crosses the sync boundary: it lives next to the store in
//! the editor and is dropped with it. Keyboard events reach the store through
//! an explicit subscription whose lifetime the editor owns.

use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use tracing::debug;

use crate::constants::nudge;
use crate::layer::LayerId;
use crate::store::ResourceStore;

/// Set of currently selected layer ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<LayerId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Click on a layer
    ///
    /// Additive toggles membership. Non-additive replaces the selection with
    /// `{id}`, except when `id` is already part of a multi-selection, which is
    /// kept so the whole group can be dragged.
    pub fn select(&mut self, id: &LayerId, additive: bool) {
        if additive {
            if !self.ids.remove(id) {
                self.ids.insert(id.clone());
            }
            return;
        }
        if self.ids.len() > 1 && self.ids.contains(id) {
            return;
        }
        self.ids.clear();
        self.ids.insert(id.clone());
    }

    /// Click on empty canvas
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop an id that no longer exists in the store
    pub fn remove(&mut self, id: &LayerId) {
        self.ids.remove(id);
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_multi(&self) -> bool {
        self.ids.len() > 1
    }

    /// The selected id when exactly one layer is selected
    pub fn single(&self) -> Option<&LayerId> {
        if self.ids.len() == 1 { self.ids.iter().next() } else { None }
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.ids.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Delete,
    Other,
}

/// Where keyboard focus was when the key went down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Canvas,
    /// Text field, text area or other editable content
    TextInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    /// Large-step modifier (Shift) held
    pub modifier: bool,
    pub focus: Focus,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifier: false,
            focus: Focus::Canvas,
        }
    }

    pub fn with_modifier(mut self) -> Self {
        self.modifier = true;
        self
    }

    pub fn in_text_input(mut self) -> Self {
        self.focus = Focus::TextInput;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    Nudge { dx: f64, dy: f64 },
    DeleteSelected,
}

/// Map a key press to an editor action for the given selection
///
/// Nothing happens while typing in a text input or with an empty selection.
pub fn key_action(selection: &Selection, input: &KeyInput) -> Option<KeyAction> {
    if input.focus == Focus::TextInput || selection.is_empty() {
        return None;
    }
    let step = if input.modifier { nudge::STEP_LARGE } else { nudge::STEP };
    match input.key {
        Key::ArrowUp => Some(KeyAction::Nudge { dx: 0.0, dy: -step }),
        Key::ArrowDown => Some(KeyAction::Nudge { dx: 0.0, dy: step }),
        Key::ArrowLeft => Some(KeyAction::Nudge { dx: -step, dy: 0.0 }),
        Key::ArrowRight => Some(KeyAction::Nudge { dx: step, dy: 0.0 }),
        Key::Delete => Some(KeyAction::DeleteSelected),
        Key::Other => None,
    }
}

/// Producer half handed to whatever reads the keyboard
#[derive(Debug, Clone)]
pub struct InputSender {
    sender: Sender<KeyInput>,
}

impl InputSender {
    /// Forward a key press; false once the editor has torn the subscription down
    pub fn send(&self, input: KeyInput) -> bool {
        self.sender.send(input).is_ok()
    }
}

/// Editor-owned end of the keyboard subscription
///
/// Dropping it unsubscribes: later sends report failure to the producer.
#[derive(Debug)]
pub struct InputSubscription {
    receiver: Receiver<KeyInput>,
}

/// Subscribe the editor to keyboard input
pub fn subscribe() -> (InputSender, InputSubscription) {
    let (sender, receiver) = mpsc::channel();
    (InputSender { sender }, InputSubscription { receiver })
}

impl InputSubscription {
    /// Apply every pending key press to the store without blocking
    ///
    /// Returns how many presses produced an action.
    pub fn pump(&self, store: &mut ResourceStore) -> usize {
        let mut handled = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(input) => {
                    if store.handle_key(&input) {
                        handled += 1;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Keyboard input source disconnected");
                    break;
                }
            }
        }
        handled
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> LayerId {
        LayerId::from(s)
    }

    #[test]
    fn test_select_replaces() {
        let mut selection = Selection::new();
        selection.select(&id("a"), false);
        selection.select(&id("b"), false);
        assert_eq!(selection.ids(), vec![id("b")]);
        assert_eq!(selection.single(), Some(&id("b")));
    }

    #[test]
    fn test_additive_toggles() {
        let mut selection = Selection::new();
        selection.select(&id("a"), false);
        selection.select(&id("b"), true);
        assert_eq!(selection.len(), 2);
        assert!(selection.single().is_none());

        selection.select(&id("a"), true);
        assert_eq!(selection.ids(), vec![id("b")]);
    }

    #[test]
    fn test_click_member_keeps_group() {
        let mut selection = Selection::new();
        selection.select(&id("a"), false);
        selection.select(&id("b"), true);

        selection.select(&id("a"), false);
        assert_eq!(selection.len(), 2);

        // A non-member still replaces the group
        selection.select(&id("c"), false);
        assert_eq!(selection.ids(), vec![id("c")]);
    }

    #[test]
    fn test_key_action_mapping() {
        let mut selection = Selection::new();
        assert_eq!(key_action(&selection, &KeyInput::new(Key::ArrowUp)), None);

        selection.select(&id("a"), false);
        assert_eq!(
            key_action(&selection, &KeyInput::new(Key::ArrowUp)),
            Some(KeyAction::Nudge { dx: 0.0, dy: -1.0 })
        );
        assert_eq!(
            key_action(&selection, &KeyInput::new(Key::ArrowRight).with_modifier()),
            Some(KeyAction::Nudge { dx: 10.0, dy: 0.0 })
        );
        assert_eq!(
            key_action(&selection, &KeyInput::new(Key::Delete)),
            Some(KeyAction::DeleteSelected)
        );
        assert_eq!(
            key_action(&selection, &KeyInput::new(Key::ArrowLeft).in_text_input()),
            None
        );
        assert_eq!(key_action(&selection, &KeyInput::new(Key::Other)), None);
    }

    #[test]
    fn test_dropped_subscription_rejects_sends() {
        let (sender, subscription) = subscribe();
        assert!(sender.send(KeyInput::new(Key::ArrowUp)));
        subscription.unsubscribe();
        assert!(!sender.send(KeyInput::new(Key::ArrowUp)));
    }
}
