use super::{BindingTable, KeyCombo};
use crate::error::Result;
use crate::soundboard::Soundboard;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerInput {
    Combo(KeyCombo),
    Exit,
}

/// Turns key presses into playback for as long as the session lasts.
///
/// The binding table is resolved once when the listener is built. Failures
/// are logged and the loop keeps going.
pub struct HotkeyListener<'a> {
    board: &'a Soundboard,
    table: BindingTable,
}

impl<'a> HotkeyListener<'a> {
    pub fn new(board: &'a Soundboard) -> Self {
        for (combo, sound) in board.dangling_bindings() {
            warn!("Hotkey {} points at missing sound '{}'", combo, sound);
        }
        Self {
            table: board.bindings(),
            board,
        }
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.table
    }

    /// Play whatever `combo` is bound to. Unbound combos are ignored.
    pub fn trigger(&self, combo: &KeyCombo) -> Result<Option<String>> {
        let Some(sound) = self.table.sound_for(combo) else {
            return Ok(None);
        };
        self.board.play(sound)?;
        info!("{} -> '{}'", combo, sound);
        Ok(Some(sound.to_string()))
    }

    pub async fn run(&self, mut inputs: mpsc::UnboundedReceiver<ListenerInput>) {
        info!("Hotkey listener started with {} bindings", self.table.len());
        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(ListenerInput::Combo(combo)) => {
                        if let Err(e) = self.trigger(&combo) {
                            warn!("{}: {}", combo, e);
                        }
                    }
                    Some(ListenerInput::Exit) | None => break,
                },
                Some(event) = self.board.next_event() => {
                    if let Err(e) = self.board.handle_event(event) {
                        warn!("Playback stopped: {}", e);
                    }
                }
            }
        }
        self.board.stop();
        info!("Hotkey listener stopped");
    }
}

#[cfg(feature = "listener")]
pub mod terminal {
    use super::ListenerInput;
    use crate::hotkeys::{BaseKey, KeyCombo, Modifier, NamedKey};
    use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
    use crossterm::terminal;
    use std::io;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tracing::debug;

    /// Raw mode for as long as this lives.
    pub struct RawModeGuard;

    impl RawModeGuard {
        pub fn enable() -> io::Result<Self> {
            terminal::enable_raw_mode()?;
            Ok(Self)
        }
    }

    impl Drop for RawModeGuard {
        fn drop(&mut self) {
            let _ = terminal::disable_raw_mode();
        }
    }

    pub fn key_to_input(key: KeyEvent) -> Option<ListenerInput> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        let mut modifiers = Vec::new();
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            modifiers.push(Modifier::Ctrl);
        }
        if key.modifiers.contains(KeyModifiers::ALT) {
            modifiers.push(Modifier::Alt);
        }
        if key.modifiers.contains(KeyModifiers::SHIFT) {
            modifiers.push(Modifier::Shift);
        }
        if key.modifiers.intersects(KeyModifiers::SUPER | KeyModifiers::META) {
            modifiers.push(Modifier::Cmd);
        }

        let base = match key.code {
            KeyCode::Esc => return Some(ListenerInput::Exit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Some(ListenerInput::Exit)
            }
            KeyCode::Char(' ') => BaseKey::Named(NamedKey::Space),
            KeyCode::Char(c) if c.is_ascii_graphic() && c != '+' => {
                if c.is_ascii_uppercase() && !modifiers.contains(&Modifier::Shift) {
                    modifiers.push(Modifier::Shift);
                }
                BaseKey::Char(c.to_ascii_lowercase())
            }
            KeyCode::F(n) if (1..=24).contains(&n) => BaseKey::Function(n),
            KeyCode::Tab => BaseKey::Named(NamedKey::Tab),
            KeyCode::Enter => BaseKey::Named(NamedKey::Enter),
            KeyCode::Backspace => BaseKey::Named(NamedKey::Backspace),
            KeyCode::Delete => BaseKey::Named(NamedKey::Delete),
            KeyCode::Insert => BaseKey::Named(NamedKey::Insert),
            KeyCode::Home => BaseKey::Named(NamedKey::Home),
            KeyCode::End => BaseKey::Named(NamedKey::End),
            KeyCode::PageUp => BaseKey::Named(NamedKey::PageUp),
            KeyCode::PageDown => BaseKey::Named(NamedKey::PageDown),
            KeyCode::Up => BaseKey::Named(NamedKey::Up),
            KeyCode::Down => BaseKey::Named(NamedKey::Down),
            KeyCode::Left => BaseKey::Named(NamedKey::Left),
            KeyCode::Right => BaseKey::Named(NamedKey::Right),
            _ => return None,
        };
        Some(ListenerInput::Combo(KeyCombo::new(base, modifiers)))
    }

    /// Read terminal keys on a blocking thread until the receiver goes away or Esc is hit.
    /// With `exit_only`, combos are left to another key source and only Esc/Ctrl+C get through.
    pub fn spawn_key_reader(
        tx: mpsc::UnboundedSender<ListenerInput>,
        exit_only: bool,
    ) -> tokio::task::JoinHandle<io::Result<()>> {
        tokio::task::spawn_blocking(move || {
            while !tx.is_closed() {
                if !event::poll(Duration::from_millis(50))? {
                    continue;
                }
                if let Event::Key(key) = event::read()? {
                    let Some(input) = key_to_input(key) else {
                        continue;
                    };
                    debug!("Key input {:?}", input);
                    let exit = input == ListenerInput::Exit;
                    if exit_only && !exit {
                        continue;
                    }
                    if tx.send(input).is_err() || exit {
                        break;
                    }
                }
            }
            Ok(())
        })
    }

}

/// System-wide key hook, so hotkeys fire while a game or any other window has focus.
#[cfg(feature = "global-keys")]
pub mod global {
    use super::ListenerInput;
    use crate::hotkeys::{BaseKey, KeyCombo, Modifier, NamedKey};
    use rdev::{EventType, Key};
    use std::thread;
    use tokio::sync::mpsc;
    use tracing::{debug, info, warn};

    fn modifier(key: Key) -> Option<Modifier> {
        match key {
            Key::ControlLeft | Key::ControlRight => Some(Modifier::Ctrl),
            Key::Alt | Key::AltGr => Some(Modifier::Alt),
            Key::ShiftLeft | Key::ShiftRight => Some(Modifier::Shift),
            Key::MetaLeft | Key::MetaRight => Some(Modifier::Cmd),
            _ => None,
        }
    }

    fn base_key(key: Key) -> Option<BaseKey> {
        let c = match key {
            Key::F1 => return Some(BaseKey::Function(1)),
            Key::F2 => return Some(BaseKey::Function(2)),
            Key::F3 => return Some(BaseKey::Function(3)),
            Key::F4 => return Some(BaseKey::Function(4)),
            Key::F5 => return Some(BaseKey::Function(5)),
            Key::F6 => return Some(BaseKey::Function(6)),
            Key::F7 => return Some(BaseKey::Function(7)),
            Key::F8 => return Some(BaseKey::Function(8)),
            Key::F9 => return Some(BaseKey::Function(9)),
            Key::F10 => return Some(BaseKey::Function(10)),
            Key::F11 => return Some(BaseKey::Function(11)),
            Key::F12 => return Some(BaseKey::Function(12)),
            Key::Space => return Some(BaseKey::Named(NamedKey::Space)),
            Key::Tab => return Some(BaseKey::Named(NamedKey::Tab)),
            Key::Return | Key::KpReturn => return Some(BaseKey::Named(NamedKey::Enter)),
            Key::Backspace => return Some(BaseKey::Named(NamedKey::Backspace)),
            Key::Delete => return Some(BaseKey::Named(NamedKey::Delete)),
            Key::Insert => return Some(BaseKey::Named(NamedKey::Insert)),
            Key::Home => return Some(BaseKey::Named(NamedKey::Home)),
            Key::End => return Some(BaseKey::Named(NamedKey::End)),
            Key::PageUp => return Some(BaseKey::Named(NamedKey::PageUp)),
            Key::PageDown => return Some(BaseKey::Named(NamedKey::PageDown)),
            Key::UpArrow => return Some(BaseKey::Named(NamedKey::Up)),
            Key::DownArrow => return Some(BaseKey::Named(NamedKey::Down)),
            Key::LeftArrow => return Some(BaseKey::Named(NamedKey::Left)),
            Key::RightArrow => return Some(BaseKey::Named(NamedKey::Right)),
            Key::KeyA => 'a',
            Key::KeyB => 'b',
            Key::KeyC => 'c',
            Key::KeyD => 'd',
            Key::KeyE => 'e',
            Key::KeyF => 'f',
            Key::KeyG => 'g',
            Key::KeyH => 'h',
            Key::KeyI => 'i',
            Key::KeyJ => 'j',
            Key::KeyK => 'k',
            Key::KeyL => 'l',
            Key::KeyM => 'm',
            Key::KeyN => 'n',
            Key::KeyO => 'o',
            Key::KeyP => 'p',
            Key::KeyQ => 'q',
            Key::KeyR => 'r',
            Key::KeyS => 's',
            Key::KeyT => 't',
            Key::KeyU => 'u',
            Key::KeyV => 'v',
            Key::KeyW => 'w',
            Key::KeyX => 'x',
            Key::KeyY => 'y',
            Key::KeyZ => 'z',
            Key::Num0 | Key::Kp0 => '0',
            Key::Num1 | Key::Kp1 => '1',
            Key::Num2 | Key::Kp2 => '2',
            Key::Num3 | Key::Kp3 => '3',
            Key::Num4 | Key::Kp4 => '4',
            Key::Num5 | Key::Kp5 => '5',
            Key::Num6 | Key::Kp6 => '6',
            Key::Num7 | Key::Kp7 => '7',
            Key::Num8 | Key::Kp8 => '8',
            Key::Num9 | Key::Kp9 => '9',
            Key::Minus | Key::KpMinus => '-',
            Key::Equal => '=',
            Key::KpDivide | Key::Slash => '/',
            Key::LeftBracket => '[',
            Key::RightBracket => ']',
            Key::SemiColon => ';',
            Key::Quote => '\'',
            Key::BackSlash | Key::IntlBackslash => '\\',
            Key::Comma => ',',
            Key::Dot => '.',
            Key::BackQuote => '`',
            _ => return None,
        };
        Some(BaseKey::Char(c))
    }

    /// Folds raw press/release events into combos.
    ///
    /// A base key held down fires once; auto-repeat presses are dropped until it is released.
    #[derive(Debug, Default)]
    pub struct KeyTracker {
        modifiers: Vec<Key>,
        down: Vec<Key>,
    }

    impl KeyTracker {
        pub fn feed(&mut self, event: &EventType) -> Option<KeyCombo> {
            match event {
                EventType::KeyPress(key) => {
                    let key = *key;
                    if modifier(key).is_some() {
                        if !self.modifiers.contains(&key) {
                            self.modifiers.push(key);
                        }
                        return None;
                    }
                    if self.down.contains(&key) {
                        return None;
                    }
                    let base = base_key(key)?;
                    self.down.push(key);
                    let held = self.modifiers.iter().filter_map(|k| modifier(*k));
                    Some(KeyCombo::new(base, held))
                }
                EventType::KeyRelease(key) => {
                    self.modifiers.retain(|k| k != key);
                    self.down.retain(|k| k != key);
                    None
                }
                _ => None,
            }
        }
    }

    /// Hook the keyboard on its own thread and forward every combo to `tx`.
    ///
    /// The OS hook cannot be removed once installed. After the receiver is dropped
    /// events are ignored, and the hook goes away with the process.
    pub fn spawn_global_reader(tx: mpsc::UnboundedSender<ListenerInput>) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let mut tracker = KeyTracker::default();
            info!("Global key hook installed");
            let hooked = rdev::listen(move |event| {
                if tx.is_closed() {
                    return;
                }
                if let Some(combo) = tracker.feed(&event.event_type) {
                    debug!("Global key {}", combo);
                    let _ = tx.send(ListenerInput::Combo(combo));
                }
            });
            if let Err(e) = hooked {
                warn!("Global key hook failed: {:?}", e);
            }
        })
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn combo(s: &str) -> Option<KeyCombo> {
            Some(KeyCombo::parse(s).unwrap())
        }

        #[test]
        fn test_tracks_held_modifiers() {
            let mut tracker = KeyTracker::default();
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::ControlLeft)), None);
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::ShiftRight)), None);
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::KeyA)), combo("ctrl+shift+a"));
            tracker.feed(&EventType::KeyRelease(Key::KeyA));
            tracker.feed(&EventType::KeyRelease(Key::ControlLeft));
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::Num1)), combo("shift+1"));
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::F5)), combo("shift+f5"));
        }

        #[test]
        fn test_auto_repeat_fires_once() {
            let mut tracker = KeyTracker::default();
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::F1)), combo("f1"));
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::F1)), None);
            tracker.feed(&EventType::KeyRelease(Key::F1));
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::F1)), combo("f1"));
        }

        #[test]
        fn test_escape_and_unknown_keys_are_ignored() {
            let mut tracker = KeyTracker::default();
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::Escape)), None);
            assert_eq!(tracker.feed(&EventType::KeyPress(Key::CapsLock)), None);
        }
    }
}
