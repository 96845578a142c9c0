//! Argon CLI - Terminal music player

mod cli;
mod input;
mod logging;
mod ui;

use std::any::Any;
use std::io::{ self, Stdout };
use std::panic::{ self, AssertUnwindSafe };
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    cursor::Show,
    event::{ self, Event, KeyCode, KeyEventKind },
    terminal::{ disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen },
    ExecutableCommand,
};
use ratatui::prelude::*;

use argon_core::{ CommandError, Player, Session, SymphoniaBackend };
use cli::Args;
use input::{ InputState, KeyOutcome };
use ui::Screen;


/// How long to wait for a key before checking for finished tracks.
const POLL_INTERVAL: Duration = Duration::from_millis( 100 );


/// Raw mode and the alternate screen, undone on drop.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}


impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        io::stdout().execute( EnterAlternateScreen )?;
        let terminal = Terminal::new( CrosstermBackend::new( io::stdout() ) )?;
        Ok( Self { terminal } )
    }
}


impl Drop for TerminalGuard {
    fn drop( &mut self ) {
        restore_terminal();
    }
}


/// Leaves raw mode and the alternate screen. Safe to call more than once.
fn restore_terminal() {
    if let Err( e ) = disable_raw_mode() {
        tracing::warn!( "Failed to leave raw mode: {}", e );
    }
    let mut stdout = io::stdout();
    if let Err( e ) = stdout.execute( LeaveAlternateScreen ).and_then( |out| out.execute( Show ).map( |_| () ) ) {
        tracing::warn!( "Failed to restore screen: {}", e );
    }
}


/// Sends panic reports to the log instead of the screen.
///
/// The hook runs on whichever thread panicked, decode and device threads
/// included, so it leaves the terminal alone. Worker panics are seen by
/// whoever joins the thread. A main-thread panic unwinds into [`catch_failure`],
/// which stops playback and restores the terminal before `main` prints it.
fn install_panic_hook() {
    panic::set_hook( Box::new( |info| {
        let thread = thread::current();
        tracing::error!( "Panic on thread {}: {}", thread.name().unwrap_or( "<unnamed>" ), info );
    }));
}


/// Runs `f`, turning an error or a panic into a message. Everything `f`
/// owns is dropped before this returns.
fn catch_failure<F>( f: F ) -> Option<String>
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind( AssertUnwindSafe( f ) ) {
        Ok( Ok(()) ) => None,
        Ok( Err( e ) ) => Some( format!( "{:#}", e ) ),
        Err( payload ) => Some( panic_message( payload.as_ref() ) ),
    }
}


fn panic_message( payload: &( dyn Any + Send ) ) -> String {
    payload
        .downcast_ref::<&str>()
        .map( |s| s.to_string() )
        .or_else( || payload.downcast_ref::<String>().cloned() )
        .unwrap_or_else( || "panic".to_string() )
}


/// Application state.
struct App {
    session: Session,
    input: InputState,
    message: Option<String>,
    should_quit: bool,
    redraw: bool,
}


impl App {
    fn new( args: &Args ) -> Self {
        let player = Player::new( Box::new( SymphoniaBackend::new() ) );
        let mut session = Session::new( player );

        let mut message = None;
        if !args.files.is_empty() {
            let added = session.add_startup_paths( &args.files );
            tracing::info!( "Added {} startup track(s)", added );
            message = Some( format!( "Added {} file(s) to playlist", added ) );
        }

        let mut app = Self {
            session,
            input: InputState::default(),
            message,
            should_quit: false,
            redraw: false,
        };

        if args.play {
            if let Err( e ) = app.session.player_mut().play_current() {
                app.report( &e );
            }
        }
        app
    }


    /// Applies finished-track events from the audio backend.
    fn tick( &mut self ) {
        if let Err( e ) = self.session.pump_events() {
            self.report( &e );
        }
    }


    fn handle_key( &mut self, code: KeyCode ) {
        // Output stays up until the next key.
        self.message = None;

        match self.input.handle_key( code ) {
            KeyOutcome::None => {}
            KeyOutcome::Shortcut( shortcut ) => {
                if let Err( e ) = self.session.shortcut( shortcut ) {
                    self.report( &e );
                }
            }
            KeyOutcome::Submit( line ) => self.execute_command( &line ),
        }
    }


    fn execute_command( &mut self, line: &str ) {
        match self.session.execute_line( line ) {
            Ok( reply ) => {
                self.message = reply.message;
                self.redraw |= reply.redraw;
                self.should_quit |= reply.quit;
            }
            Err( CommandError::Unknown( name ) ) => {
                tracing::info!( "Unrecognized command: {:?}", name );
                self.message = Some( "Unrecognized command.".to_string() );
            }
            Err( e ) if e.is_parse_error() => {
                tracing::info!( "Invalid input {:?}: {}", line, e );
                self.message = Some( format!( "Invalid input: {}", e ) );
            }
            Err( e ) => self.report( &e ),
        }
    }


    fn report( &mut self, e: &dyn std::error::Error ) {
        tracing::warn!( "{}", e );
        self.message = Some( format!( "Error: {}", e ) );
    }


    fn screen( &self ) -> Screen<'_> {
        Screen {
            session: &self.session,
            input: &self.input,
            message: self.message.as_deref(),
        }
    }
}


fn run( args: &Args ) -> Result<()> {
    let mut guard = TerminalGuard::enter()?;

    if !args.no_splash {
        ui::splash( &mut guard.terminal )?;
    }

    let mut app = App::new( args );

    loop {
        app.tick();

        if app.redraw {
            guard.terminal.clear()?;
            app.redraw = false;
        }
        guard.terminal.draw( |frame| ui::draw( frame, &app.screen() ) )?;

        if app.should_quit {
            break;
        }

        // Resize is an event too, and the next pass redraws at the new size.
        if event::poll( POLL_INTERVAL )? {
            if let Event::Key( key ) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key( key.code );
                }
            }
        }
    }

    tracing::info!( "Quitting" );
    Ok(())
}


fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match logging::init( args.log_dir.as_deref() ) {
        Ok( guard ) => guard,
        Err( e ) => {
            eprintln!( "Logging disabled: {:#}", e );
            None
        }
    };

    install_panic_hook();

    // The app and its player drop inside `run`, stopping playback, and the
    // terminal guard drops last.
    let Some( failure ) = catch_failure( || run( &args ) ) else {
        return ExitCode::SUCCESS;
    };

    tracing::error!( "Unexpected failure: {}", failure );
    eprintln!( "Unexpected failure! Safely handled.\nException: {}", failure );
    ExitCode::FAILURE
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;


    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }


    impl Drop for Recorder {
        fn drop( &mut self ) {
            self.log.borrow_mut().push( self.name );
        }
    }


    #[test]
    fn test_catch_failure_success() {
        assert_eq!( catch_failure( || Ok(()) ), None );
    }


    #[test]
    fn test_catch_failure_reports_error() {
        let failure = catch_failure( || Err( anyhow::anyhow!( "no terminal" ) ) );
        assert_eq!( failure.as_deref(), Some( "no terminal" ) );
    }


    #[test]
    fn test_catch_failure_unwinds_before_reporting() {
        let log = Rc::new( RefCell::new( Vec::new() ) );

        let failure = catch_failure( || {
            // Same declaration order as `run`: terminal guard, then app.
            let _terminal = Recorder { name: "restore", log: Rc::clone( &log ) };
            let _player = Recorder { name: "stop", log: Rc::clone( &log ) };
            panic!( "decoder exploded" );
        });

        assert_eq!( failure.as_deref(), Some( "decoder exploded" ) );
        assert_eq!( *log.borrow(), vec![ "stop", "restore" ] );
    }


    #[test]
    fn test_panic_message_from_worker_thread() {
        let worker = thread::Builder::new()
            .name( "argon-decode-1".into() )
            .spawn( || panic!( "bad packet" ) )
            .unwrap();
        let payload = worker.join().unwrap_err();
        assert_eq!( panic_message( payload.as_ref() ), "bad packet" );

        let formatted = std::panic::catch_unwind( || panic!( "code {}", 7 ) ).unwrap_err();
        assert_eq!( panic_message( formatted.as_ref() ), "code 7" );
    }
}
