use std::{thread, time::Duration};

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyName {
    Alt,
    Control,
    Shift,
    Meta,
    Tab,
    Escape,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
}

impl KeyName {
    fn to_enigo(self) -> Key {
        match self {
            KeyName::Alt => Key::Alt,
            KeyName::Control => Key::Control,
            KeyName::Shift => Key::Shift,
            KeyName::Meta => Key::Meta,
            KeyName::Tab => Key::Tab,
            KeyName::Escape => Key::Escape,
            KeyName::Left => Key::LeftArrow,
            KeyName::Right => Key::RightArrow,
            KeyName::Up => Key::UpArrow,
            KeyName::Down => Key::DownArrow,
            KeyName::PageUp => Key::PageUp,
            KeyName::PageDown => Key::PageDown,
            KeyName::Home => Key::Home,
            KeyName::End => Key::End,
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("input backend unavailable: {0}")]
    Unavailable(String),
    #[error("failed to {action} {key:?}: {reason}")]
    Rejected {
        action: &'static str,
        key: KeyName,
        reason: String,
    },
}

/// Receiver of synthetic keyboard input.
pub trait ActionSink {
    fn press_modifier(&mut self, key: KeyName) -> Result<(), ActionError>;
    fn release_modifier(&mut self, key: KeyName) -> Result<(), ActionError>;
    /// Press and release in one go.
    fn press_key(&mut self, key: KeyName) -> Result<(), ActionError>;
}

impl<S: ActionSink + ?Sized> ActionSink for Box<S> {
    fn press_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
        (**self).press_modifier(key)
    }

    fn release_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
        (**self).release_modifier(key)
    }

    fn press_key(&mut self, key: KeyName) -> Result<(), ActionError> {
        (**self).press_key(key)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    #[serde(default)]
    pub modifiers: Vec<KeyName>,
    pub key: KeyName,
}

impl KeyChord {
    pub fn new(modifiers: &[KeyName], key: KeyName) -> Self {
        Self {
            modifiers: modifiers.to_vec(),
            key,
        }
    }

    /// Holds the modifiers, taps the key, then releases the modifiers in
    /// reverse order. Modifiers that went down are released even when a
    /// later step fails; the first error is returned.
    pub fn send<S: ActionSink + ?Sized>(&self, sink: &mut S) -> Result<(), ActionError> {
        let mut held = Vec::with_capacity(self.modifiers.len());
        let mut result = Ok(());

        for &modifier in &self.modifiers {
            match sink.press_modifier(modifier) {
                Ok(()) => held.push(modifier),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        if result.is_ok() {
            result = sink.press_key(self.key);
        }

        for &modifier in held.iter().rev() {
            if let Err(err) = sink.release_modifier(modifier) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        result
    }
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{modifier:?}+")?;
        }
        write!(f, "{:?}", self.key)
    }
}

pub struct EnigoSink {
    enigo: Enigo,
}

impl EnigoSink {
    pub fn new() -> Result<Self, ActionError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|err| ActionError::Unavailable(format!("{err:?}")))?;
        Ok(Self { enigo })
    }

    fn key(&mut self, action: &'static str, key: KeyName, direction: Direction) -> Result<(), ActionError> {
        self.enigo
            .key(key.to_enigo(), direction)
            .map_err(|err| ActionError::Rejected {
                action,
                key,
                reason: format!("{err:?}"),
            })
    }
}

impl ActionSink for EnigoSink {
    fn press_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
        self.key("press", key, Direction::Press)
    }

    fn release_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
        self.key("release", key, Direction::Release)
    }

    fn press_key(&mut self, key: KeyName) -> Result<(), ActionError> {
        self.key("tap", key, Direction::Click)
    }
}

/// Logs input instead of injecting it.
#[derive(Debug, Default)]
pub struct DryRunSink;

impl ActionSink for DryRunSink {
    fn press_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
        log::info!("[dry-run] hold {key:?}");
        Ok(())
    }

    fn release_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
        log::info!("[dry-run] release {key:?}");
        Ok(())
    }

    fn press_key(&mut self, key: KeyName) -> Result<(), ActionError> {
        log::info!("[dry-run] tap {key:?}");
        Ok(())
    }
}

/// Sleeps after every event; the OS drops modifier chords sent back to back.
pub struct Paced<S> {
    inner: S,
    spacing: Duration,
}

impl<S: ActionSink> Paced<S> {
    pub fn new(inner: S, spacing: Duration) -> Self {
        Self { inner, spacing }
    }

    fn pause(&self) {
        if !self.spacing.is_zero() {
            thread::sleep(self.spacing);
        }
    }
}

impl<S: ActionSink> ActionSink for Paced<S> {
    fn press_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
        let result = self.inner.press_modifier(key);
        self.pause();
        result
    }

    fn release_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
        let result = self.inner.release_modifier(key);
        self.pause();
        result
    }

    fn press_key(&mut self, key: KeyName) -> Result<(), ActionError> {
        let result = self.inner.press_key(key);
        self.pause();
        result
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Action {
        Hold(KeyName),
        Release(KeyName),
        Tap(KeyName),
    }

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub actions: Vec<Action>,
        /// Keys whose events are rejected, to exercise failure paths.
        pub failing: Vec<KeyName>,
    }

    impl RecordingSink {
        pub fn taps(&self, key: KeyName) -> usize {
            self.actions
                .iter()
                .filter(|a| **a == Action::Tap(key))
                .count()
        }

        fn record(&mut self, action: Action, key: KeyName) -> Result<(), ActionError> {
            if self.failing.contains(&key) {
                return Err(ActionError::Rejected {
                    action: "record",
                    key,
                    reason: "configured to fail".to_string(),
                });
            }
            self.actions.push(action);
            Ok(())
        }
    }

    impl ActionSink for RecordingSink {
        fn press_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
            self.record(Action::Hold(key), key)
        }

        fn release_modifier(&mut self, key: KeyName) -> Result<(), ActionError> {
            self.record(Action::Release(key), key)
        }

        fn press_key(&mut self, key: KeyName) -> Result<(), ActionError> {
            self.record(Action::Tap(key), key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Action, RecordingSink};
    use super::*;

    #[test]
    fn chord_releases_modifiers_in_reverse() {
        let mut sink = RecordingSink::default();
        let chord = KeyChord::new(&[KeyName::Control, KeyName::Meta], KeyName::Right);
        chord.send(&mut sink).unwrap();
        assert_eq!(
            sink.actions,
            vec![
                Action::Hold(KeyName::Control),
                Action::Hold(KeyName::Meta),
                Action::Tap(KeyName::Right),
                Action::Release(KeyName::Meta),
                Action::Release(KeyName::Control),
            ]
        );
    }

    #[test]
    fn chord_releases_held_modifiers_when_key_fails() {
        let mut sink = RecordingSink {
            failing: vec![KeyName::Left],
            ..Default::default()
        };
        let chord = KeyChord::new(&[KeyName::Alt], KeyName::Left);
        assert!(chord.send(&mut sink).is_err());
        assert_eq!(
            sink.actions,
            vec![Action::Hold(KeyName::Alt), Action::Release(KeyName::Alt)]
        );
    }

    #[test]
    fn chord_stops_at_failed_modifier() {
        let mut sink = RecordingSink {
            failing: vec![KeyName::Meta],
            ..Default::default()
        };
        let chord = KeyChord::new(&[KeyName::Control, KeyName::Meta], KeyName::Left);
        assert!(chord.send(&mut sink).is_err());
        assert_eq!(
            sink.actions,
            vec![
                Action::Hold(KeyName::Control),
                Action::Release(KeyName::Control)
            ]
        );
    }

    #[test]
    fn chord_display_lists_modifiers_first() {
        let chord = KeyChord::new(&[KeyName::Alt], KeyName::Tab);
        assert_eq!(chord.to_string(), "Alt+Tab");
    }

    #[test]
    fn paced_sink_forwards_events() {
        let mut paced = Paced::new(RecordingSink::default(), Duration::ZERO);
        paced.press_key(KeyName::PageDown).unwrap();
        assert_eq!(paced.inner.actions, vec![Action::Tap(KeyName::PageDown)]);
    }
}
