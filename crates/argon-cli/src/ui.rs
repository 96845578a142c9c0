//! Screen rendering.
//!
//! Every frame is drawn from scratch from the session state: the playback
//! bar (top left), the main panel with the command line (bottom left) and
//! the playlist (right). Anything that does not fit is clipped.

use std::io;
use std::thread;
use std::time::Duration;

use argon_core::{ AudioFormat, PlaybackState, Session, TrackTags, TrackTime, UiMode };
use ratatui::{
    prelude::*,
    widgets::{ Block, Borders, Clear, List, ListItem, ListState, Paragraph },
};

use crate::input::{ InputMode, InputState };


pub const SPLASH_TEXT: &str = "Welcome to Argon Music Player!";

const PLAYBACK_BAR_HEIGHT: u16 = 5;
const PROMPT: &str = ": ";
const UNKNOWN: &str = "Unknown";


/// Everything a frame is drawn from.
pub struct Screen<'a> {
    pub session: &'a Session,
    pub input: &'a InputState,
    /// Last command output, shown until the next key press.
    pub message: Option<&'a str>,
}


/// Draws the whole UI.
pub fn draw( frame: &mut Frame, screen: &Screen ) {
    let [ left, playlist ] = Layout::horizontal([
        Constraint::Ratio( 3, 4 ),
        Constraint::Ratio( 1, 4 ),
    ]).areas( frame.area() );

    let [ playback, main ] = Layout::vertical([
        Constraint::Length( PLAYBACK_BAR_HEIGHT ),
        Constraint::Min( 0 ),
    ]).areas( left );

    draw_playback( frame, screen.session, playback );
    draw_main( frame, screen, main );
    draw_playlist( frame, screen.session, playlist );
}


fn header_line( text: String, width: u16 ) -> Line<'static> {
    let width = width.saturating_sub( 2 ) as usize;
    Line::from( format!( "{:<width$}", text, width = width ) ).reversed()
}


fn draw_playback( frame: &mut Frame, session: &Session, area: Rect ) {
    let player = session.player();
    let state = player.state();
    let elapsed = player.elapsed();
    let total = player.total();

    let block = Block::default()
        .borders( Borders::ALL )
        .title( header_line( format!( " NOW PLAYING: {}", state.name() ), area.width ) );
    let inner = block.inner( area );

    let label = match ( state, player.current_track() ) {
        ( PlaybackState::Stopped, _ ) | ( _, None ) => String::new(),
        ( _, Some( path ) ) => path.display().to_string(),
    };

    let bar_width = inner.width.saturating_sub( 2 ) as usize;
    let cells = progress_cells( &elapsed, &total, bar_width );

    let lines = vec![
        Line::from( format!( " {}", label ) ),
        Line::from( format!( " {}", spread( &elapsed.timestamp(), &total.timestamp(), bar_width ) ) ),
        Line::from( vec![
            Span::raw( "[" ),
            Span::raw( " ".repeat( cells ) ).reversed(),
            Span::raw( " ".repeat( bar_width - cells ) ),
            Span::raw( "]" ),
        ]),
    ];

    frame.render_widget( Paragraph::new( lines ).block( block ), area );
}


fn draw_main( frame: &mut Frame, screen: &Screen, area: Rect ) {
    let block = Block::default()
        .borders( Borders::ALL )
        .title( header_line( mode_header( screen.session.mode() ), area.width ) );
    let inner = block.inner( area );
    frame.render_widget( block, area );

    let [ content, rule, status ] = Layout::vertical([
        Constraint::Min( 0 ),
        Constraint::Length( 1 ),
        Constraint::Length( 1 ),
    ]).areas( inner );

    let lines: Vec<Line> = match screen.session.mode() {
        UiMode::Help => argon_core::command::help_text()
            .iter()
            .map( |l| Line::from( format!( " {}", l ) ) )
            .collect(),
        UiMode::Details => {
            let player = screen.session.player();
            let ( tags, format ) = player.metadata();
            detail_lines( tags.as_ref(), format.as_ref(), &player.total() )
                .into_iter()
                .map( |l| Line::from( format!( " {}", l ) ) )
                .collect()
        }
    };
    frame.render_widget( Paragraph::new( lines ), content );

    frame.render_widget( Paragraph::new( "_".repeat( rule.width as usize ) ), rule );

    let text = status_text( screen.input, screen.message );
    frame.render_widget( Paragraph::new( text ), status );

    if screen.input.mode == InputMode::Command {
        let offset = PROMPT.len() + screen.input.buffer.cursor_char_pos();
        if offset < status.width as usize {
            frame.set_cursor_position(( status.x + offset as u16, status.y ));
        }
    }
}


fn draw_playlist( frame: &mut Frame, session: &Session, area: Rect ) {
    let playlist = session.player().playlist();
    let cursor = playlist.cursor();

    let items: Vec<ListItem> = playlist
        .tracks()
        .iter()
        .enumerate()
        .map( |( i, path )| {
            let name = path
                .file_name()
                .map( |n| n.to_string_lossy().into_owned() )
                .unwrap_or_else( || path.display().to_string() );
            ListItem::new( format!( "{}. {}", i + 1, name ) )
        })
        .collect();

    let list = List::new( items )
        .block(
            Block::default()
                .borders( Borders::ALL )
                .title( header_line( " PLAYLIST".to_string(), area.width ) )
        )
        .highlight_style( Style::default().add_modifier( Modifier::REVERSED ) );

    // A parked cursor highlights nothing. The list scrolls to keep the
    // selection in view.
    let mut state = ListState::default().with_selected( ( cursor < playlist.len() ).then_some( cursor ) );
    frame.render_stateful_widget( list, area, &mut state );
}


/// Lists every mode, the active one in brackets.
pub fn mode_header( active: UiMode ) -> String {
    UiMode::ALL
        .iter()
        .map( |mode| {
            if *mode == active {
                format!( " [{}] ", mode.label() )
            } else {
                format!( " {} ", mode.label() )
            }
        })
        .collect()
}


/// Number of filled cells in a progress bar `width` cells wide.
///
/// Any progress at all on a track of known length shows at least one cell.
pub fn progress_cells( elapsed: &TrackTime, total: &TrackTime, width: usize ) -> usize {
    if total.is_zero() {
        return 0;
    }
    let cells = ( width as f64 * elapsed.ratio_of( total ) ) as usize + 1;
    cells.min( width )
}


/// Places `left` and `right` at either end of a `width`-wide row. Never
/// shorter than the two texts separated by a space.
pub fn spread( left: &str, right: &str, width: usize ) -> String {
    let used = left.chars().count() + right.chars().count();
    let gap = width.saturating_sub( used ).max( 1 );
    format!( "{}{}{}", left, " ".repeat( gap ), right )
}


/// Detail-mode rows, falling back to "Unknown" for anything missing.
pub fn detail_lines( tags: Option<&TrackTags>, format: Option<&AudioFormat>, total: &TrackTime ) -> Vec<String> {
    fn or_unknown<T: ToString>( value: Option<T> ) -> String {
        value.map( |v| v.to_string() ).unwrap_or_else( || UNKNOWN.to_string() )
    }

    let tag = |get: fn( &TrackTags ) -> Option<String>| or_unknown( tags.and_then( get ) );
    let duration = ( !total.is_zero() ).then( || total.timestamp() );

    vec![
        format!( "Title: {}", tag( |t| t.title.clone() ) ),
        format!( "Artist: {}", tag( |t| t.artist.clone() ) ),
        format!( "Album: {}", tag( |t| t.album.clone() ) ),
        format!( "Year: {}", or_unknown( tags.and_then( |t| t.year ) ) ),
        format!( "Track: {}", or_unknown( tags.and_then( |t| t.track_number ) ) ),
        format!( "Duration: {}", or_unknown( duration ) ),
        format!( "Genre: {}", tag( |t| t.genre.clone() ) ),
        String::new(),
        format!( "Channels: {}", or_unknown( format.and_then( |f| f.channels ) ) ),
        format!( "Sample rate: {}", or_unknown( format.and_then( |f| f.sample_rate ) ) ),
        format!( "Sample size: {}", or_unknown( format.and_then( |f| f.sample_size ) ) ),
    ]
}


/// Text for the command line: the prompt while typing, otherwise the last
/// message.
pub fn status_text( input: &InputState, message: Option<&str> ) -> String {
    match ( input.mode, message ) {
        ( InputMode::Command, _ ) => format!( "{}{}", PROMPT, input.buffer.content() ),
        ( InputMode::Normal, Some( msg ) ) => format!( "< {} >", msg ),
        ( InputMode::Normal, None ) => String::new(),
    }
}


/// Types the welcome text into a centered box, one character at a time.
pub fn splash<B: Backend>( terminal: &mut Terminal<B> ) -> io::Result<()> {
    let total = SPLASH_TEXT.chars().count();
    terminal.draw( |frame| draw_splash( frame, 0 ) )?;
    thread::sleep( Duration::from_millis( 500 ) );

    for shown in 1..=total {
        terminal.draw( |frame| draw_splash( frame, shown ) )?;
        thread::sleep( Duration::from_millis( 30 ) );
    }

    thread::sleep( Duration::from_secs( 1 ) );
    Ok(())
}


fn draw_splash( frame: &mut Frame, shown: usize ) {
    let area = frame.area();
    frame.render_widget( Block::default().borders( Borders::ALL ), area );

    let width = ( SPLASH_TEXT.chars().count() as u16 + 6 ).min( area.width );
    let height = 5.min( area.height );
    let boxed = Rect {
        x: area.x + ( area.width - width ) / 2,
        y: area.y + ( area.height - height ) / 2,
        width,
        height,
    };

    let text: String = SPLASH_TEXT.chars().take( shown ).collect();
    let splash = Paragraph::new( vec![ Line::default(), Line::from( text ).bold() ] )
        .alignment( Alignment::Center )
        .block( Block::default().borders( Borders::ALL ) );

    frame.render_widget( Clear, boxed );
    frame.render_widget( splash, boxed );
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use argon_core::{ Player, SymphoniaBackend };
    use ratatui::backend::TestBackend;


    fn session() -> Session {
        Session::new( Player::new( Box::new( SymphoniaBackend::new() ) ) )
    }


    #[test]
    fn test_mode_header_brackets_active() {
        assert_eq!( mode_header( UiMode::Help ), " [HELP]  DETAILS " );
        assert_eq!( mode_header( UiMode::Details ), " HELP  [DETAILS] " );
    }


    #[test]
    fn test_progress_cells() {
        let total = TrackTime::from_secs( 100 );
        assert_eq!( progress_cells( &TrackTime::ZERO, &TrackTime::ZERO, 40 ), 0 );
        assert_eq!( progress_cells( &TrackTime::ZERO, &total, 40 ), 1 );
        assert_eq!( progress_cells( &TrackTime::from_secs( 50 ), &total, 40 ), 21 );
        assert_eq!( progress_cells( &TrackTime::from_secs( 100 ), &total, 40 ), 40 );
        assert_eq!( progress_cells( &TrackTime::from_secs( 10 ), &total, 0 ), 0 );
    }


    #[test]
    fn test_spread() {
        assert_eq!( spread( "ab", "cd", 8 ), "ab    cd" );
        assert_eq!( spread( "ab", "cd", 2 ), "ab cd" );
    }


    #[test]
    fn test_detail_lines_fall_back_to_unknown() {
        let lines = detail_lines( None, None, &TrackTime::ZERO );
        assert_eq!( lines[ 0 ], "Title: Unknown" );
        assert_eq!( lines[ 5 ], "Duration: Unknown" );
        assert_eq!( lines[ 10 ], "Sample size: Unknown" );
    }


    #[test]
    fn test_detail_lines_with_data() {
        let tags = TrackTags {
            title: Some( "Song".into() ),
            year: Some( 1999 ),
            ..TrackTags::default()
        };
        let format = AudioFormat { channels: Some( 2 ), sample_rate: Some( 44_100 ), sample_size: None };
        let lines = detail_lines( Some( &tags ), Some( &format ), &TrackTime::from_secs( 61 ) );

        assert_eq!( lines[ 0 ], "Title: Song" );
        assert_eq!( lines[ 1 ], "Artist: Unknown" );
        assert_eq!( lines[ 3 ], "Year: 1999" );
        assert_eq!( lines[ 5 ], "Duration: 00:01:01" );
        assert_eq!( lines[ 8 ], "Channels: 2" );
        assert_eq!( lines[ 9 ], "Sample rate: 44100" );
    }


    #[test]
    fn test_status_text() {
        let mut input = InputState::default();
        assert_eq!( status_text( &input, None ), "" );
        assert_eq!( status_text( &input, Some( "Playlist cleared" ) ), "< Playlist cleared >" );

        input.mode = InputMode::Command;
        input.buffer.insert( 'q' );
        assert_eq!( status_text( &input, Some( "ignored" ) ), ": q" );
    }


    #[test]
    fn test_draw_survives_tiny_terminals() {
        let session = session();
        let input = InputState::default();
        for ( w, h ) in [ ( 1, 1 ), ( 4, 3 ), ( 12, 6 ), ( 80, 24 ) ] {
            let mut terminal = Terminal::new( TestBackend::new( w, h ) ).unwrap();
            terminal
                .draw( |frame| draw( frame, &Screen { session: &session, input: &input, message: Some( "hi" ) } ) )
                .unwrap();
            terminal.draw( |frame| draw_splash( frame, 5 ) ).unwrap();
        }
    }


    fn rows( terminal: &Terminal<TestBackend> ) -> Vec<String> {
        let buffer = terminal.backend().buffer();
        ( 0..buffer.area.height )
            .map( |y| ( 0..buffer.area.width ).map( |x| buffer[ ( x, y ) ].symbol().to_string() ).collect() )
            .collect()
    }


    #[test]
    fn test_playlist_scrolls_to_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let tracks: Vec<PathBuf> = ( 1..=50 )
            .map( |i| {
                let path = dir.path().join( format!( "{}.mp3", i ) );
                fs::write( &path, b"x" ).unwrap();
                path
            })
            .collect();

        let mut session = session();
        assert_eq!( session.player_mut().add( &tracks ), 50 );
        for _ in 0..40 {
            session.player_mut().select_next();
        }
        assert_eq!( session.player().playlist().cursor(), 40 );

        let input = InputState::default();
        let mut terminal = Terminal::new( TestBackend::new( 100, 24 ) ).unwrap();
        terminal
            .draw( |frame| draw( frame, &Screen { session: &session, input: &input, message: None } ) )
            .unwrap();

        let rows = rows( &terminal );
        let y = rows
            .iter()
            .position( |row| row.contains( "41. 41.mp3" ) )
            .expect( "current entry on screen" );
        assert!( !rows.iter().any( |row| row.contains( "1. 1.mp3" ) ) );

        let buffer = terminal.backend().buffer();
        let byte = rows[ y ].find( "41. 41.mp3" ).unwrap();
        let x = rows[ y ][ ..byte ].chars().count() as u16;
        assert!( buffer[ ( x, y as u16 ) ].modifier.contains( Modifier::REVERSED ) );
    }


    #[test]
    fn test_draw_survives_overlong_command_line() {
        let session = session();
        let mut input = InputState::default();
        input.mode = InputMode::Command;
        for _ in 0..70_000 {
            input.buffer.insert( 'x' );
        }

        let mut terminal = Terminal::new( TestBackend::new( 80, 24 ) ).unwrap();
        terminal
            .draw( |frame| draw( frame, &Screen { session: &session, input: &input, message: None } ) )
            .unwrap();
    }


    #[test]
    fn test_draw_shows_state_and_mode() {
        let session = session();
        let input = InputState::default();
        let mut terminal = Terminal::new( TestBackend::new( 100, 30 ) ).unwrap();
        terminal
            .draw( |frame| draw( frame, &Screen { session: &session, input: &input, message: None } ) )
            .unwrap();

        let buffer = terminal.backend().buffer();
        let row = |y: u16| -> String {
            ( 0..buffer.area.width ).map( |x| buffer[ ( x, y ) ].symbol().to_string() ).collect()
        };
        assert!( row( 0 ).contains( "NOW PLAYING: STOPPED" ) );
        assert!( row( 0 ).contains( "PLAYLIST" ) );
        assert!( row( 5 ).contains( "[HELP]" ) );
    }
}
