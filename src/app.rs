use std::{
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use tracing::{debug, info};

use crate::{
    error::Result,
    host::HostSystem,
    input::{Input, Keyboard, LineDiscipline, RawModeGuard},
    monitor::Monitor,
    render::{self, TerminalGeometry},
};

/// Longest single keyboard wait, so an external interrupt is noticed promptly.
const POLL_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle { deadline: Instant },
    Rendering,
    Terminating,
}

pub struct App<'a, H: HostSystem, K: Keyboard, W: Write> {
    monitor: Monitor<H>,
    keyboard: K,
    out: W,
    delay: Duration,
    geometry: fn() -> TerminalGeometry,
    interrupted: &'a AtomicBool,
}

impl<'a, H: HostSystem, K: Keyboard, W: Write> App<'a, H, K, W> {
    pub fn new(
        monitor: Monitor<H>,
        keyboard: K,
        out: W,
        delay: Duration,
        interrupted: &'a AtomicBool,
    ) -> Self {
        Self {
            monitor,
            keyboard,
            out,
            delay,
            geometry: TerminalGeometry::query,
            interrupted,
        }
    }

    /// Draws a single screen and leaves the terminal mode untouched.
    pub fn run_once(&mut self) -> Result<()> {
        self.draw()?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }

    /// Redraws every `delay` until quit or interrupted, holding raw mode throughout.
    pub fn run_interactive<D: LineDiscipline>(&mut self, discipline: D) -> Result<()> {
        let mut raw_mode = RawModeGuard::acquire(discipline)?;
        let outcome = self.refresh_loop();
        let restored = raw_mode.release();

        writeln!(self.out)?;
        self.out.flush()?;
        outcome?;
        restored?;
        Ok(())
    }

    fn refresh_loop(&mut self) -> Result<()> {
        let mut state = State::Idle {
            deadline: Instant::now() + self.delay,
        };
        loop {
            state = match state {
                State::Idle { deadline } => self.idle(deadline)?,
                State::Rendering => {
                    self.draw()?;
                    State::Idle {
                        deadline: Instant::now() + self.delay,
                    }
                }
                State::Terminating => return Ok(()),
            };
        }
    }

    /// Waits for the deadline while watching the keyboard and the interrupt flag.
    fn idle(&mut self, deadline: Instant) -> Result<State> {
        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                info!("interrupted");
                return Ok(State::Terminating);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(State::Rendering);
            }
            match self.keyboard.poll(remaining.min(POLL_SLICE))? {
                Some(Input::Quit) => {
                    info!("quit requested");
                    return Ok(State::Terminating);
                }
                Some(Input::Interrupt) => {
                    info!("interrupted from keyboard");
                    return Ok(State::Terminating);
                }
                Some(Input::Refresh) => {
                    debug!("manual refresh");
                    return Ok(State::Rendering);
                }
                None => {}
            }
        }
    }

    fn draw(&mut self) -> Result<()> {
        let screen = self.monitor.screen();
        render::render(&mut self.out, &screen, (self.geometry)())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::MonitorError,
        host::fake::FakeHost,
        input::fake::{RecordingDiscipline, ScriptedKeyboard},
        users::BuildUserDirectory,
    };

    const PASSWD: &str = "\
nixbld1:x:30001:30000::/var/empty:/bin/false
nixbld2:x:30002:30000::/var/empty:/bin/false
nixbld3:x:30003:30000::/var/empty:/bin/false
";

    static NOT_INTERRUPTED: AtomicBool = AtomicBool::new(false);
    const NO_KEYS: [Option<Input>; 0] = [];

    fn app<'a>(
        host: FakeHost,
        keys: impl IntoIterator<Item = Option<Input>>,
        delay: Duration,
        interrupted: &'a AtomicBool,
    ) -> App<'a, FakeHost, ScriptedKeyboard, Vec<u8>> {
        let monitor = Monitor::new(host, BuildUserDirectory::new("nixbld"));
        let mut app = App::new(
            monitor,
            ScriptedKeyboard::new(keys),
            Vec::new(),
            delay,
            interrupted,
        );
        app.geometry = || TerminalGeometry {
            width: 80,
            height: 24,
        };
        app
    }

    fn building_host() -> FakeHost {
        FakeHost::with_accounts(PASSWD)
            .process(101, 30002)
            .process(102, 30002)
            .environ(101, &["out=/store/abc"])
    }

    fn output(app: &App<'_, FakeHost, ScriptedKeyboard, Vec<u8>>) -> String {
        String::from_utf8_lossy(&app.out).into_owned()
    }

    #[test]
    fn once_renders_a_single_screen_without_raw_mode() {
        let mut app = app(building_host(), NO_KEYS, Duration::from_secs(10), &NOT_INTERRUPTED);
        app.run_once().unwrap();

        let out = output(&app);
        assert!(out.contains("   2 /store/abc"));
        assert!(out.contains("nixbld2: /store/abc"));
        assert!(out.ends_with("\x1b[J\n"));
        assert_eq!(app.monitor.host().refreshes, 1);
        assert_eq!(app.keyboard.polls, 0);
    }

    #[test]
    fn once_with_nothing_building_draws_the_separator() {
        let host = FakeHost::with_accounts(PASSWD);
        let mut app = app(host, NO_KEYS, Duration::from_secs(1), &NOT_INTERRUPTED);
        app.run_once().unwrap();
        assert_eq!(output(&app), "\x1b[1;1H\x1b[K\r\n----\x1b[K\r\n\x1b[K\x1b[J\n");
    }

    #[test]
    fn quit_key_ends_before_the_deadline() {
        let discipline = RecordingDiscipline::default();
        let log = discipline.log.clone();
        let mut app = app(
            building_host(),
            [Some(Input::Quit)],
            Duration::from_secs(30),
            &NOT_INTERRUPTED,
        );

        let started = Instant::now();
        app.run_interactive(discipline).unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(*log.borrow(), ["raw", "restore"]);
        assert_eq!(output(&app), "\n");
        assert_eq!(app.monitor.host().refreshes, 0);
    }

    #[test]
    fn any_other_key_refreshes_immediately() {
        let mut app = app(
            building_host(),
            [Some(Input::Refresh), Some(Input::Refresh), Some(Input::Quit)],
            Duration::from_secs(30),
            &NOT_INTERRUPTED,
        );
        app.run_interactive(RecordingDiscipline::default()).unwrap();

        assert_eq!(app.monitor.host().refreshes, 2);
        assert_eq!(output(&app).matches("   2 /store/abc").count(), 2);
    }

    #[test]
    fn deadline_triggers_redraws() {
        let mut app = app(
            building_host(),
            [None, None, Some(Input::Quit)],
            Duration::from_millis(20),
            &NOT_INTERRUPTED,
        );
        app.run_interactive(RecordingDiscipline::default()).unwrap();

        assert_eq!(app.monitor.host().refreshes, 2);
        assert_eq!(app.keyboard.polls, 3);
    }

    #[test]
    fn interrupt_flag_terminates_and_restores() {
        let interrupted = AtomicBool::new(true);
        let discipline = RecordingDiscipline::default();
        let log = discipline.log.clone();
        let mut app = app(building_host(), NO_KEYS, Duration::from_secs(30), &interrupted);

        app.run_interactive(discipline).unwrap();

        assert_eq!(*log.borrow(), ["raw", "restore"]);
        assert_eq!(app.keyboard.polls, 0);
    }

    #[test]
    fn ctrl_c_key_terminates() {
        let mut app = app(
            building_host(),
            [Some(Input::Interrupt), Some(Input::Refresh)],
            Duration::from_secs(30),
            &NOT_INTERRUPTED,
        );
        app.run_interactive(RecordingDiscipline::default()).unwrap();
        assert_eq!(app.keyboard.polls, 1);
        assert_eq!(app.monitor.host().refreshes, 0);
    }

    #[test]
    fn failed_key_read_still_restores_the_terminal() {
        let discipline = RecordingDiscipline::default();
        let log = discipline.log.clone();
        let mut app = app(building_host(), NO_KEYS, Duration::from_secs(30), &NOT_INTERRUPTED);
        app.keyboard.detached = true;

        let err = app.run_interactive(discipline).unwrap_err();

        assert!(matches!(err, MonitorError::Terminal(_)));
        assert_eq!(*log.borrow(), ["raw", "restore"]);
        assert_eq!(output(&app), "\n");
    }

    #[test]
    fn unreadable_accounts_mid_session_do_not_end_it() {
        let mut app = app(
            FakeHost::default(),
            [Some(Input::Refresh), Some(Input::Quit)],
            Duration::from_secs(30),
            &NOT_INTERRUPTED,
        );

        app.run_interactive(RecordingDiscipline::default()).unwrap();

        assert_eq!(app.monitor.host().refreshes, 1);
        assert!(output(&app).contains("----"));
    }

    #[test]
    fn once_finishes_its_pass_when_interrupted() {
        let interrupted = AtomicBool::new(true);
        let mut app = app(building_host(), NO_KEYS, Duration::from_secs(10), &interrupted);

        app.run_once().unwrap();

        assert!(output(&app).contains("   2 /store/abc"));
        assert!(output(&app).ends_with('\n'));
    }
}
