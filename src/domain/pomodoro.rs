use serde::{Deserialize, Serialize};

/// Standard length of one focus session.
pub const FOCUS_SESSION_SECONDS: u32 = 25 * 60;

const DEFAULT_BREAK_SECONDS: u32 = 3 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    Work,
    BreakChoice,
    Break,
    Ready,
    Done,
}

/// Break lengths the user may pick after a finished focus session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakLength {
    ThreeMinutes,
    FiveMinutes,
}

impl BreakLength {
    pub fn seconds(self) -> u32 {
        match self {
            Self::ThreeMinutes => 3 * 60,
            Self::FiveMinutes => 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// One simulated second.
    Tick,
    ToggleRunning,
    ChooseBreak(BreakLength),
    StartNext,
    SkipBreak,
}

/// Chimes attached to phase entry. Emitted at most once per entered phase
/// instance, never per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chime {
    Soft,
    Celebrate,
}

pub fn entry_chime(phase: SessionPhase) -> Option<Chime> {
    match phase {
        SessionPhase::BreakChoice | SessionPhase::Ready => Some(Chime::Soft),
        SessionPhase::Done => Some(Chime::Celebrate),
        SessionPhase::Work | SessionPhase::Break => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub seconds_left: u32,
    pub running: bool,
    pub session_duration_s: u32,
    /// Completed focus time, accumulated when a work session reaches zero.
    pub worked_s: u32,
    pub pomodoro_count: u32,
    pub break_duration_s: u32,
}

/// Pure transition function for one task's focus session. All I/O (chimes,
/// notifications) lives in the driver layer; the machine only maps
/// `(state, action)` to the next state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMachine {
    total_work_s: u32,
}

impl SessionMachine {
    pub fn new(total_work_s: u32) -> Self {
        Self { total_work_s }
    }

    pub fn total_work_s(&self) -> u32 {
        self.total_work_s
    }

    pub fn initial_state(&self) -> SessionState {
        let first_session_s = FOCUS_SESSION_SECONDS.min(self.total_work_s);
        SessionState {
            phase: SessionPhase::Work,
            seconds_left: first_session_s,
            running: false,
            session_duration_s: first_session_s,
            worked_s: 0,
            pomodoro_count: 0,
            break_duration_s: DEFAULT_BREAK_SECONDS,
        }
    }

    pub fn apply(&self, state: &SessionState, action: SessionAction) -> SessionState {
        // `done` is terminal.
        if state.phase == SessionPhase::Done {
            return state.clone();
        }

        match action {
            SessionAction::Tick => self.apply_tick(state),
            SessionAction::ToggleRunning => {
                if state.phase != SessionPhase::Work {
                    return state.clone();
                }
                SessionState {
                    running: !state.running,
                    ..state.clone()
                }
            }
            SessionAction::ChooseBreak(length) => {
                if state.phase != SessionPhase::BreakChoice {
                    return state.clone();
                }
                SessionState {
                    phase: SessionPhase::Break,
                    break_duration_s: length.seconds(),
                    seconds_left: length.seconds(),
                    running: true,
                    ..state.clone()
                }
            }
            SessionAction::StartNext => {
                if state.phase != SessionPhase::Ready {
                    return state.clone();
                }
                let next_session_s = self.next_session_s(state.worked_s);
                SessionState {
                    phase: SessionPhase::Work,
                    session_duration_s: next_session_s,
                    seconds_left: next_session_s,
                    running: true,
                    ..state.clone()
                }
            }
            SessionAction::SkipBreak => {
                if state.phase != SessionPhase::Break {
                    return state.clone();
                }
                let next_session_s = self.next_session_s(state.worked_s);
                SessionState {
                    phase: SessionPhase::Ready,
                    running: false,
                    session_duration_s: next_session_s,
                    seconds_left: next_session_s,
                    ..state.clone()
                }
            }
        }
    }

    fn apply_tick(&self, state: &SessionState) -> SessionState {
        if !state.running || state.seconds_left == 0 {
            return state.clone();
        }

        let left = state.seconds_left - 1;
        if left > 0 {
            return SessionState {
                seconds_left: left,
                ..state.clone()
            };
        }

        // Hit zero: the phase transitions and running stops.
        match state.phase {
            SessionPhase::Work => {
                let worked_s = state.worked_s + state.session_duration_s;
                let phase = if worked_s >= self.total_work_s {
                    SessionPhase::Done
                } else {
                    SessionPhase::BreakChoice
                };
                SessionState {
                    phase,
                    seconds_left: 0,
                    running: false,
                    worked_s,
                    pomodoro_count: state.pomodoro_count + 1,
                    ..state.clone()
                }
            }
            SessionPhase::Break => SessionState {
                phase: SessionPhase::Ready,
                seconds_left: 0,
                running: false,
                ..state.clone()
            },
            _ => SessionState {
                seconds_left: 0,
                running: false,
                ..state.clone()
            },
        }
    }

    fn next_session_s(&self, worked_s: u32) -> u32 {
        FOCUS_SESSION_SECONDS.min(self.total_work_s.saturating_sub(worked_s))
    }

    /// Seconds of the current work session already behind us; zero outside work.
    pub fn elapsed_in_work(&self, state: &SessionState) -> u32 {
        if state.phase == SessionPhase::Work {
            state.session_duration_s.saturating_sub(state.seconds_left)
        } else {
            0
        }
    }

    /// Share of the whole task finished, counting the running work session.
    pub fn overall_progress(&self, state: &SessionState) -> f64 {
        if self.total_work_s == 0 {
            return 1.0;
        }
        let done = f64::from(state.worked_s + self.elapsed_in_work(state));
        (done / f64::from(self.total_work_s)).min(1.0)
    }

    /// Share of the current session or break already elapsed.
    pub fn session_progress(&self, state: &SessionState) -> f64 {
        let duration = if state.phase == SessionPhase::Break {
            state.break_duration_s
        } else {
            state.session_duration_s
        };
        if duration == 0 {
            return 1.0;
        }
        (1.0 - f64::from(state.seconds_left) / f64::from(duration)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run_out_phase(machine: &SessionMachine, mut state: SessionState) -> SessionState {
        let seconds = state.seconds_left;
        for _ in 0..seconds {
            state = machine.apply(&state, SessionAction::Tick);
        }
        state
    }

    #[test]
    fn fifty_minute_task_completes_after_two_full_sessions() {
        let machine = SessionMachine::new(50 * 60);
        let mut state = machine.initial_state();
        assert_eq!(state.session_duration_s, FOCUS_SESSION_SECONDS);

        state = machine.apply(&state, SessionAction::ToggleRunning);
        state = run_out_phase(&machine, state);
        assert_eq!(state.phase, SessionPhase::BreakChoice);
        assert_eq!(state.worked_s, 1500);
        assert_eq!(state.pomodoro_count, 1);
        assert!(!state.running);

        state = machine.apply(&state, SessionAction::ChooseBreak(BreakLength::ThreeMinutes));
        assert_eq!(state.phase, SessionPhase::Break);
        assert_eq!(state.seconds_left, 180);
        assert!(state.running);

        state = run_out_phase(&machine, state);
        assert_eq!(state.phase, SessionPhase::Ready);
        assert!(!state.running);

        state = machine.apply(&state, SessionAction::StartNext);
        assert_eq!(state.phase, SessionPhase::Work);
        assert_eq!(state.session_duration_s, 1500);
        assert!(state.running);

        state = run_out_phase(&machine, state);
        assert_eq!(state.phase, SessionPhase::Done);
        assert_eq!(state.worked_s, 3000);
        assert_eq!(state.pomodoro_count, 2);
    }

    #[test]
    fn final_session_is_capped_to_remaining_work() {
        let machine = SessionMachine::new(30 * 60);
        let mut state = machine.initial_state();
        state = machine.apply(&state, SessionAction::ToggleRunning);
        state = run_out_phase(&machine, state);
        assert_eq!(state.phase, SessionPhase::BreakChoice);

        state = machine.apply(&state, SessionAction::ChooseBreak(BreakLength::FiveMinutes));
        state = run_out_phase(&machine, state);
        state = machine.apply(&state, SessionAction::StartNext);
        assert_eq!(state.session_duration_s, 5 * 60);

        state = run_out_phase(&machine, state);
        assert_eq!(state.phase, SessionPhase::Done);
        assert_eq!(state.worked_s, 30 * 60);
    }

    #[test]
    fn skip_break_goes_straight_to_ready_without_credit() {
        let machine = SessionMachine::new(50 * 60);
        let mut state = machine.initial_state();
        state = machine.apply(&state, SessionAction::ToggleRunning);
        state = run_out_phase(&machine, state);
        state = machine.apply(&state, SessionAction::ChooseBreak(BreakLength::FiveMinutes));

        let before = state.clone();
        state = machine.apply(&state, SessionAction::SkipBreak);
        assert_eq!(state.phase, SessionPhase::Ready);
        assert!(!state.running);
        assert_eq!(state.worked_s, before.worked_s);
        assert_eq!(state.pomodoro_count, before.pomodoro_count);
        assert_eq!(state.session_duration_s, 1500);
    }

    #[test]
    fn toggle_running_is_a_noop_outside_work() {
        let machine = SessionMachine::new(50 * 60);
        let mut state = machine.initial_state();
        state = machine.apply(&state, SessionAction::ToggleRunning);
        state = run_out_phase(&machine, state);
        assert_eq!(state.phase, SessionPhase::BreakChoice);

        let toggled = machine.apply(&state, SessionAction::ToggleRunning);
        assert_eq!(toggled, state);
    }

    #[test]
    fn actions_in_wrong_phase_leave_state_unchanged() {
        let machine = SessionMachine::new(50 * 60);
        let initial = machine.initial_state();

        assert_eq!(
            machine.apply(&initial, SessionAction::ChooseBreak(BreakLength::ThreeMinutes)),
            initial
        );
        assert_eq!(machine.apply(&initial, SessionAction::StartNext), initial);
        assert_eq!(machine.apply(&initial, SessionAction::SkipBreak), initial);
    }

    #[test]
    fn done_is_terminal() {
        let machine = SessionMachine::new(25 * 60);
        let mut state = machine.initial_state();
        state = machine.apply(&state, SessionAction::ToggleRunning);
        state = run_out_phase(&machine, state);
        assert_eq!(state.phase, SessionPhase::Done);

        for action in [
            SessionAction::Tick,
            SessionAction::ToggleRunning,
            SessionAction::ChooseBreak(BreakLength::FiveMinutes),
            SessionAction::StartNext,
            SessionAction::SkipBreak,
        ] {
            assert_eq!(machine.apply(&state, action), state);
        }
    }

    #[test]
    fn paused_work_does_not_tick() {
        let machine = SessionMachine::new(50 * 60);
        let mut state = machine.initial_state();
        state = machine.apply(&state, SessionAction::ToggleRunning);
        state = machine.apply(&state, SessionAction::Tick);
        state = machine.apply(&state, SessionAction::ToggleRunning);
        let paused = state.clone();
        state = machine.apply(&state, SessionAction::Tick);
        assert_eq!(state, paused);
    }

    #[test]
    fn progress_accounts_for_running_session() {
        let machine = SessionMachine::new(50 * 60);
        let mut state = machine.initial_state();
        state = machine.apply(&state, SessionAction::ToggleRunning);
        for _ in 0..300 {
            state = machine.apply(&state, SessionAction::Tick);
        }
        assert_eq!(machine.elapsed_in_work(&state), 300);
        assert!((machine.overall_progress(&state) - 0.1).abs() < 1e-9);
        assert!((machine.session_progress(&state) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn entry_chimes_only_for_pause_points_and_done() {
        assert_eq!(entry_chime(SessionPhase::Work), None);
        assert_eq!(entry_chime(SessionPhase::Break), None);
        assert_eq!(entry_chime(SessionPhase::BreakChoice), Some(Chime::Soft));
        assert_eq!(entry_chime(SessionPhase::Ready), Some(Chime::Soft));
        assert_eq!(entry_chime(SessionPhase::Done), Some(Chime::Celebrate));
    }

    proptest! {
        // The pomodoro counter and worked time never move backwards, no matter
        // the action sequence.
        #[test]
        fn counters_are_monotone(
            total_minutes in 25u32..120u32,
            actions in proptest::collection::vec(0u8..5u8, 0..2000)
        ) {
            let machine = SessionMachine::new(total_minutes * 60);
            let mut state = machine.initial_state();
            for code in actions {
                let action = match code {
                    0 => SessionAction::Tick,
                    1 => SessionAction::ToggleRunning,
                    2 => SessionAction::ChooseBreak(BreakLength::ThreeMinutes),
                    3 => SessionAction::StartNext,
                    _ => SessionAction::SkipBreak,
                };
                let next = machine.apply(&state, action);
                prop_assert!(next.pomodoro_count >= state.pomodoro_count);
                prop_assert!(next.worked_s >= state.worked_s);
                let progress = machine.overall_progress(&next);
                prop_assert!((0.0..=1.0).contains(&progress));
                state = next;
            }
        }
    }
}
