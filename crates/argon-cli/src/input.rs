//! Input mode handling for the TUI.
//!
//! Outside line mode each key is a shortcut; the trigger key opens a
//! command line that collects text until Enter.

use argon_core::{ Shortcut, INPUT_TRIGGER };
use crossterm::event::KeyCode;


/// Current input mode of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum InputMode {
    /// Normal mode - keyboard shortcuts active.
    #[default]
    Normal,

    /// Line mode - typing a command.
    Command,
}


/// What a key press asks the application to do.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum KeyOutcome {
    /// Nothing beyond redrawing.
    None,
    Shortcut( Shortcut ),
    /// A finished command line.
    Submit( String ),
}


/// Input buffer for command text entry.
#[derive( Debug, Default )]
pub struct InputBuffer {
    content: String,
    cursor: usize,
}


impl InputBuffer {
    /// Creates a new empty input buffer.
    pub fn new() -> Self {
        Self::default()
    }


    /// Inserts a character at the cursor position.
    pub fn insert( &mut self, c: char ) {
        self.content.insert( self.cursor, c );
        self.cursor += c.len_utf8();
    }


    /// Deletes the character before the cursor.
    pub fn backspace( &mut self ) {
        if let Some( prev ) = self.prev_boundary() {
            self.content.remove( prev );
            self.cursor = prev;
        }
    }


    /// Deletes the character at the cursor position.
    pub fn delete( &mut self ) {
        if self.cursor < self.content.len() {
            self.content.remove( self.cursor );
        }
    }


    pub fn move_left( &mut self ) {
        if let Some( prev ) = self.prev_boundary() {
            self.cursor = prev;
        }
    }


    pub fn move_right( &mut self ) {
        if let Some( c ) = self.content[ self.cursor.. ].chars().next() {
            self.cursor += c.len_utf8();
        }
    }


    pub fn move_home( &mut self ) {
        self.cursor = 0;
    }


    pub fn move_end( &mut self ) {
        self.cursor = self.content.len();
    }


    /// Empties the buffer, returning what it held.
    pub fn take( &mut self ) -> String {
        self.cursor = 0;
        std::mem::take( &mut self.content )
    }


    pub fn clear( &mut self ) {
        self.content.clear();
        self.cursor = 0;
    }


    /// Gets the current content.
    pub fn content( &self ) -> &str {
        &self.content
    }


    /// Gets the cursor position as character count (for display).
    pub fn cursor_char_pos( &self ) -> usize {
        self.content[ ..self.cursor ].chars().count()
    }


    pub fn is_empty( &self ) -> bool {
        self.content.is_empty()
    }


    fn prev_boundary( &self ) -> Option<usize> {
        self.content[ ..self.cursor ].char_indices().last().map( |( i, _ )| i )
    }
}


/// Input mode plus the line being typed.
#[derive( Debug, Default )]
pub struct InputState {
    pub mode: InputMode,
    pub buffer: InputBuffer,
}


impl InputState {
    /// Routes a key press according to the current mode.
    pub fn handle_key( &mut self, code: KeyCode ) -> KeyOutcome {
        match self.mode {
            InputMode::Normal => self.handle_normal_key( code ),
            InputMode::Command => self.handle_command_key( code ),
        }
    }


    fn handle_normal_key( &mut self, code: KeyCode ) -> KeyOutcome {
        let key = match code {
            KeyCode::Char( c ) => c,
            KeyCode::Enter => '\n',
            _ => return KeyOutcome::None,
        };

        if key == INPUT_TRIGGER {
            self.mode = InputMode::Command;
            self.buffer.clear();
            return KeyOutcome::None;
        }

        Shortcut::from_key( key )
            .map( KeyOutcome::Shortcut )
            .unwrap_or( KeyOutcome::None )
    }


    fn handle_command_key( &mut self, code: KeyCode ) -> KeyOutcome {
        match code {
            KeyCode::Enter => {
                self.mode = InputMode::Normal;
                return KeyOutcome::Submit( self.buffer.take() );
            }
            KeyCode::Esc => {
                self.mode = InputMode::Normal;
                self.buffer.clear();
            }
            KeyCode::Backspace => {
                if self.buffer.is_empty() {
                    self.mode = InputMode::Normal;
                } else {
                    self.buffer.backspace();
                }
            }
            KeyCode::Delete => self.buffer.delete(),
            KeyCode::Left => self.buffer.move_left(),
            KeyCode::Right => self.buffer.move_right(),
            KeyCode::Home => self.buffer.move_home(),
            KeyCode::End => self.buffer.move_end(),
            KeyCode::Char( c ) => self.buffer.insert( c ),
            _ => {}
        }
        KeyOutcome::None
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn type_text( state: &mut InputState, text: &str ) {
        for c in text.chars() {
            state.handle_key( KeyCode::Char( c ) );
        }
    }


    #[test]
    fn test_buffer_editing_multibyte() {
        let mut buffer = InputBuffer::new();
        for c in "añb".chars() {
            buffer.insert( c );
        }
        buffer.move_left();
        buffer.backspace();
        assert_eq!( buffer.content(), "ab" );
        assert_eq!( buffer.cursor_char_pos(), 1 );

        buffer.move_home();
        buffer.delete();
        assert_eq!( buffer.content(), "b" );
        buffer.move_end();
        buffer.move_right();
        assert_eq!( buffer.cursor_char_pos(), 1 );
    }


    #[test]
    fn test_shortcuts_in_normal_mode() {
        let mut state = InputState::default();
        assert_eq!( state.handle_key( KeyCode::Char( ' ' ) ), KeyOutcome::Shortcut( Shortcut::TogglePlay ) );
        assert_eq!( state.handle_key( KeyCode::Enter ), KeyOutcome::Shortcut( Shortcut::TogglePlay ) );
        assert_eq!( state.handle_key( KeyCode::Char( 'B' ) ), KeyOutcome::Shortcut( Shortcut::PlayPrevious ) );
        assert_eq!( state.handle_key( KeyCode::Char( 'z' ) ), KeyOutcome::None );
        assert_eq!( state.handle_key( KeyCode::Up ), KeyOutcome::None );
    }


    #[test]
    fn test_trigger_collects_line_until_enter() {
        let mut state = InputState::default();
        state.handle_key( KeyCode::Char( INPUT_TRIGGER ) );
        assert_eq!( state.mode, InputMode::Command );

        type_text( &mut state, "p 2" );
        assert_eq!( state.buffer.content(), "p 2" );

        assert_eq!( state.handle_key( KeyCode::Enter ), KeyOutcome::Submit( "p 2".to_string() ) );
        assert_eq!( state.mode, InputMode::Normal );
        assert!( state.buffer.is_empty() );
    }


    #[test]
    fn test_shortcut_keys_are_text_in_line_mode() {
        let mut state = InputState::default();
        state.handle_key( KeyCode::Char( INPUT_TRIGGER ) );
        assert_eq!( state.handle_key( KeyCode::Char( 's' ) ), KeyOutcome::None );
        assert_eq!( state.buffer.content(), "s" );
    }


    #[test]
    fn test_escape_and_backspace_leave_line_mode() {
        let mut state = InputState::default();
        state.handle_key( KeyCode::Char( INPUT_TRIGGER ) );
        type_text( &mut state, "add" );
        state.handle_key( KeyCode::Esc );
        assert_eq!( state.mode, InputMode::Normal );
        assert!( state.buffer.is_empty() );

        state.handle_key( KeyCode::Char( INPUT_TRIGGER ) );
        state.handle_key( KeyCode::Backspace );
        assert_eq!( state.mode, InputMode::Normal );
    }
}
