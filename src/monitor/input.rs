use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// Dashboard commands decoded from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    /// Start the loop if stopped, stop it if running
    ToggleRun,
    Reset,
    FrameRateUp,
    FrameRateDown,
    ToggleHelp,
    /// Any key while help is shown
    CloseHelp,
    Resize { width: u16, height: u16 },
    None,
}

/// Frame rate change per `+`/`-` press.
pub const FRAME_RATE_STEP: f64 = 5.0;

pub struct InputHandler {
    help_visible: bool,
}

impl InputHandler {
    pub fn new() -> Self {
        Self {
            help_visible: false,
        }
    }

    pub fn set_help_visible(&mut self, visible: bool) {
        self.help_visible = visible;
    }

    /// Non-blocking when `timeout` is zero.
    pub fn poll(&mut self, timeout: Duration) -> Option<InputEvent> {
        if event::poll(timeout).ok()? {
            match event::read().ok()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => Some(self.handle_key(key)),
                Event::Resize(width, height) => Some(InputEvent::Resize { width, height }),
                _ => None,
            }
        } else {
            None
        }
    }

    fn handle_key(&self, event: KeyEvent) -> InputEvent {
        if event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL) {
            return InputEvent::Quit;
        }
        if self.help_visible {
            return InputEvent::CloseHelp;
        }

        match event.code {
            KeyCode::Char('q') | KeyCode::Esc => InputEvent::Quit,
            KeyCode::Char(' ') => InputEvent::ToggleRun,
            KeyCode::Char('r') => InputEvent::Reset,
            KeyCode::Char('+') | KeyCode::Char('=') => InputEvent::FrameRateUp,
            KeyCode::Char('-') | KeyCode::Char('_') => InputEvent::FrameRateDown,
            KeyCode::Char('?') => InputEvent::ToggleHelp,
            _ => InputEvent::None,
        }
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_bindings() {
        let handler = InputHandler::new();
        assert_eq!(handler.handle_key(key(KeyCode::Char('q'))), InputEvent::Quit);
        assert_eq!(handler.handle_key(key(KeyCode::Char(' '))), InputEvent::ToggleRun);
        assert_eq!(handler.handle_key(key(KeyCode::Char('r'))), InputEvent::Reset);
        assert_eq!(handler.handle_key(key(KeyCode::Char('+'))), InputEvent::FrameRateUp);
        assert_eq!(handler.handle_key(key(KeyCode::Char('='))), InputEvent::FrameRateUp);
        assert_eq!(handler.handle_key(key(KeyCode::Char('-'))), InputEvent::FrameRateDown);
        assert_eq!(handler.handle_key(key(KeyCode::Char('?'))), InputEvent::ToggleHelp);
        assert_eq!(handler.handle_key(key(KeyCode::Char('x'))), InputEvent::None);
    }

    #[test]
    fn test_help_swallows_keys_except_ctrl_c() {
        let mut handler = InputHandler::new();
        handler.set_help_visible(true);
        assert_eq!(handler.handle_key(key(KeyCode::Char('q'))), InputEvent::CloseHelp);
        assert_eq!(
            handler.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            InputEvent::Quit
        );
    }
}
