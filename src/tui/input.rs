//! Keyboard handling: key events become [`Action`]s, actions become session
//! changes.

use crate::monitor::model::TargetId;
use crate::monitor::session::Session;
use crate::monitor::portcheck::{spawn_port_check, PortCheck};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::Arc;
use tracing::debug;

/// Something the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    TogglePause,
    NextTarget,
    PreviousTarget,
    /// Zero-based target index
    SelectTarget(usize),
    SpeedUp,
    SlowDown,
    ShrinkHistory,
    GrowHistory,
    ToggleJitter,
    Reset,
    WebCheck,
    PortScan,
    ToggleHelp,
}

/// Whether the dashboard keeps running after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Map a key event to an action. Releases and repeats of non-navigation keys
/// are ignored. While the help overlay is open `Esc` closes it instead of
/// quitting.
pub fn map_key(key: KeyEvent, help_open: bool) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }

    let action = match key.code {
        KeyCode::Esc if help_open => Action::ToggleHelp,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p') | KeyCode::Char(' ') => Action::TogglePause,
        KeyCode::Tab => Action::NextTarget,
        KeyCode::BackTab => Action::PreviousTarget,
        KeyCode::Char(c @ '1'..='9') => Action::SelectTarget(c as usize - '1' as usize),
        KeyCode::Up => Action::SpeedUp,
        KeyCode::Down => Action::SlowDown,
        KeyCode::Left => Action::ShrinkHistory,
        KeyCode::Right => Action::GrowHistory,
        KeyCode::Char('j') => Action::ToggleJitter,
        KeyCode::Char('r') => Action::Reset,
        KeyCode::Char('w') => Action::WebCheck,
        KeyCode::Char('s') => Action::PortScan,
        KeyCode::Char('?') => Action::ToggleHelp,
        _ => return None,
    };

    // holding a toggle key must not flip it back and forth
    let repeatable = matches!(
        action,
        Action::SpeedUp | Action::SlowDown | Action::ShrinkHistory | Action::GrowHistory
    );
    if key.kind == KeyEventKind::Repeat && !repeatable {
        return None;
    }
    Some(action)
}

/// Apply an action to the session.
pub fn apply(session: &Arc<Session>, action: Action) -> Control {
    debug!(?action, "Applying input action");
    match action {
        Action::Quit => {
            session.shutdown();
            return Control::Quit;
        }
        Action::TogglePause => {
            session.toggle_pause();
        }
        Action::NextTarget => session.next_target(),
        Action::PreviousTarget => session.previous_target(),
        Action::SelectTarget(index) => session.select_target(index),
        Action::SpeedUp => {
            session.speed_up();
        }
        Action::SlowDown => {
            session.slow_down();
        }
        Action::ShrinkHistory => {
            session.shrink_history();
        }
        Action::GrowHistory => {
            session.grow_history();
        }
        Action::ToggleJitter => session.toggle_jitter_panel(),
        Action::Reset => session.reset_active(),
        Action::WebCheck | Action::PortScan => {
            let kind = if action == Action::PortScan {
                PortCheck::Scan
            } else {
                PortCheck::Web
            };
            let active: TargetId = session.state().view().active;
            spawn_port_check(session, active, kind);
        }
        Action::ToggleHelp => session.toggle_help(),
    }
    Control::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::constants::INTERVAL_STEP;
    use crate::monitor::model::Target;
    use crate::monitor::session::{NoticeBoard, SessionSettings};
    use crate::probe::MockProber;
    use crossterm::event::KeyEventState;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn session(targets: u8) -> Arc<Session> {
        let targets = (1..=targets)
            .map(|i| Target::new(format!("10.0.0.{}", i), IpAddr::V4(Ipv4Addr::new(10, 0, 0, i))))
            .collect();
        Session::new(
            targets,
            Arc::new(MockProber::new()),
            Arc::new(NoticeBoard::new()),
            SessionSettings {
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(1),
                capacity: 100,
                count: None,
            },
        )
    }

    #[test]
    fn test_quit_keys() {
        assert_eq!(map_key(key(KeyCode::Char('q')), false), Some(Action::Quit));
        assert_eq!(map_key(key(KeyCode::Esc), false), Some(Action::Quit));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_c, false), Some(Action::Quit));
        assert_eq!(map_key(ctrl_c, true), Some(Action::Quit));
    }

    #[test]
    fn test_escape_closes_help_first() {
        assert_eq!(map_key(key(KeyCode::Esc), true), Some(Action::ToggleHelp));
        assert_eq!(map_key(key(KeyCode::Char('q')), true), Some(Action::Quit));
    }

    #[test]
    fn test_digit_selects_target() {
        assert_eq!(map_key(key(KeyCode::Char('1')), false), Some(Action::SelectTarget(0)));
        assert_eq!(map_key(key(KeyCode::Char('9')), false), Some(Action::SelectTarget(8)));
        assert_eq!(map_key(key(KeyCode::Char('0')), false), None);
    }

    #[test]
    fn test_release_and_repeat_filtering() {
        let mut release = key(KeyCode::Char('p'));
        release.kind = KeyEventKind::Release;
        assert_eq!(map_key(release, false), None);

        let repeat = KeyEvent::new_with_kind_and_state(
            KeyCode::Char('p'),
            KeyModifiers::NONE,
            KeyEventKind::Repeat,
            KeyEventState::NONE,
        );
        assert_eq!(map_key(repeat, false), None);

        let repeat_up = KeyEvent::new_with_kind_and_state(
            KeyCode::Up,
            KeyModifiers::NONE,
            KeyEventKind::Repeat,
            KeyEventState::NONE,
        );
        assert_eq!(map_key(repeat_up, false), Some(Action::SpeedUp));
    }

    #[test]
    fn test_apply_mutates_session() {
        let session = session(3);

        assert_eq!(apply(&session, Action::TogglePause), Control::Continue);
        assert!(session.state().is_paused());

        apply(&session, Action::SelectTarget(2));
        assert_eq!(session.state().view().active, TargetId(2));
        apply(&session, Action::NextTarget);
        assert_eq!(session.state().view().active, TargetId(0));

        apply(&session, Action::SpeedUp);
        assert_eq!(session.state().interval(), Duration::from_secs(1) - INTERVAL_STEP);

        apply(&session, Action::ToggleJitter);
        assert!(!session.state().view().show_jitter);
        apply(&session, Action::ToggleHelp);
        assert!(session.state().view().show_help);
    }

    #[test]
    fn test_check_keys() {
        assert_eq!(map_key(key(KeyCode::Char('w')), false), Some(Action::WebCheck));
        assert_eq!(map_key(key(KeyCode::Char('s')), false), Some(Action::PortScan));
    }

    #[tokio::test]
    async fn test_port_scan_starts_on_active_target() {
        let session = session(2);
        apply(&session, Action::SelectTarget(1));
        apply(&session, Action::PortScan);

        assert!(session.targets()[0].port_check().is_none());
        let report = session.targets()[1].port_check().expect("scan was started");
        assert_eq!(report.kind, PortCheck::Scan);
        session.shutdown();
    }

    #[test]
    fn test_quit_shuts_session_down() {
        let session = session(1);
        assert_eq!(apply(&session, Action::Quit), Control::Quit);
        assert!(session.is_shutting_down());
    }
}
