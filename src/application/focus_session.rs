use crate::domain::countdown::CountdownTimer;
use crate::domain::models::Task;
use crate::domain::pomodoro::{
    BreakLength, Chime, FOCUS_SESSION_SECONDS, SessionAction, SessionMachine, SessionPhase,
    SessionState, entry_chime,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

const ENCOURAGEMENT_INTERVAL_S: u32 = 10 * 60;

const ENCOURAGEMENTS: [(&str, &str); 4] = [
    ("💪", "Du gjør det bra!"),
    ("🌟", "Kjempefint fokus!"),
    ("🔥", "Du er i flytsonen!"),
    ("🧠", "Hjernen din jobber hardt!"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Emitted once per entered phase instance, never per tick.
    PhaseChanged {
        phase: SessionPhase,
        chime: Option<Chime>,
    },
    /// Mid-work cheer, at most once per 10 full minutes of a session.
    Encouragement {
        emoji: &'static str,
        text: &'static str,
    },
    Completed {
        pomodoro_count: u32,
    },
}

/// Boundary towards the UI/notification layer; implementations must not
/// block, the driver publishes from its tick path.
pub trait SessionEventSink: Send + Sync {
    fn publish(&self, event: SessionEvent);
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub seconds_left: u32,
    pub running: bool,
    pub pomodoro_count: u32,
    pub worked_s: u32,
    pub overall_progress: f64,
    pub session_progress: f64,
}

enum TimerCore {
    Pomodoro {
        machine: SessionMachine,
        state: SessionState,
    },
    Countdown(CountdownTimer),
}

struct SessionShared {
    core: Mutex<TimerCore>,
    sink: Arc<dyn SessionEventSink>,
}

impl SessionShared {
    fn lock_core(&self) -> MutexGuard<'_, TimerCore> {
        // A panicked tick holder leaves consistent state; keep going.
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot_of(core: &TimerCore) -> SessionSnapshot {
        match core {
            TimerCore::Pomodoro { machine, state } => SessionSnapshot {
                phase: state.phase,
                seconds_left: state.seconds_left,
                running: state.running,
                pomodoro_count: state.pomodoro_count,
                worked_s: state.worked_s,
                overall_progress: machine.overall_progress(state),
                session_progress: machine.session_progress(state),
            },
            TimerCore::Countdown(timer) => SessionSnapshot {
                phase: if timer.remaining() == 0 {
                    SessionPhase::Done
                } else {
                    SessionPhase::Work
                },
                seconds_left: timer.remaining(),
                running: timer.running(),
                pomodoro_count: 0,
                worked_s: timer.total_seconds() - timer.remaining(),
                overall_progress: timer.progress(),
                session_progress: timer.progress(),
            },
        }
    }

    /// Applies one pomodoro action, publishing phase-entry events.
    fn apply(&self, action: SessionAction) -> SessionSnapshot {
        let mut events = Vec::new();
        let snapshot = {
            let mut core = self.lock_core();
            match &mut *core {
                TimerCore::Pomodoro { machine, state } => {
                    let before = state.phase;
                    *state = machine.apply(state, action);
                    push_phase_events(&mut events, before, state);
                }
                TimerCore::Countdown(timer) => match action {
                    SessionAction::ToggleRunning => {
                        if timer.running() {
                            timer.pause();
                        } else {
                            timer.start();
                        }
                    }
                    // Breaks do not exist in plain countdown mode.
                    _ => {}
                },
            }
            Self::snapshot_of(&core)
        };
        self.publish_all(events);
        snapshot
    }

    /// One driver tick. Returns whether the session is finished.
    fn tick(&self, shown: &mut HashSet<(u32, u32)>) -> bool {
        let mut events = Vec::new();
        let done = {
            let mut core = self.lock_core();
            match &mut *core {
                TimerCore::Pomodoro { machine, state } => {
                    let before = state.phase;
                    *state = machine.apply(state, SessionAction::Tick);
                    push_phase_events(&mut events, before, state);

                    if state.phase == SessionPhase::Work && state.running && state.seconds_left > 0
                    {
                        let elapsed = machine.elapsed_in_work(state);
                        let slot = elapsed / ENCOURAGEMENT_INTERVAL_S;
                        if slot > 0 && shown.insert((state.pomodoro_count, slot)) {
                            let index = (state.pomodoro_count + slot) as usize % ENCOURAGEMENTS.len();
                            let (emoji, text) = ENCOURAGEMENTS[index];
                            events.push(SessionEvent::Encouragement { emoji, text });
                        }
                    }
                    state.phase == SessionPhase::Done
                }
                TimerCore::Countdown(timer) => {
                    if timer.tick() {
                        events.push(SessionEvent::PhaseChanged {
                            phase: SessionPhase::Done,
                            chime: None,
                        });
                    }
                    // A countdown can be reset and rerun, so the driver stays.
                    false
                }
            }
        };
        self.publish_all(events);
        done
    }

    fn publish_all(&self, events: Vec<SessionEvent>) {
        for event in events {
            self.sink.publish(event);
        }
    }
}

fn push_phase_events(events: &mut Vec<SessionEvent>, before: SessionPhase, state: &SessionState) {
    if state.phase == before {
        return;
    }
    events.push(SessionEvent::PhaseChanged {
        phase: state.phase,
        chime: entry_chime(state.phase),
    });
    if state.phase == SessionPhase::Done {
        events.push(SessionEvent::Completed {
            pomodoro_count: state.pomodoro_count,
        });
    }
}

/// One open timer view. Sessions of 25 minutes or more get the full pomodoro
/// cycle; shorter tasks run a plain countdown. The driver applies one tick per
/// second, re-arming only after the previous tick's effect is applied, and
/// stops the moment the session finishes or the view closes.
pub struct FocusSession {
    shared: Arc<SessionShared>,
    driver: JoinHandle<()>,
}

impl FocusSession {
    pub fn for_task(task: &Task, sink: Arc<dyn SessionEventSink>) -> Self {
        let total_work_s = task.duration_minutes * 60;
        let core = if total_work_s >= FOCUS_SESSION_SECONDS {
            let machine = SessionMachine::new(total_work_s);
            TimerCore::Pomodoro {
                state: machine.initial_state(),
                machine,
            }
        } else {
            TimerCore::Countdown(CountdownTimer::new(total_work_s))
        };

        let shared = Arc::new(SessionShared {
            core: Mutex::new(core),
            sink,
        });

        let driver_shared = Arc::clone(&shared);
        let driver = tokio::spawn(async move {
            let mut shown = HashSet::new();
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if driver_shared.tick(&mut shown) {
                    break;
                }
            }
        });

        Self { shared, driver }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionShared::snapshot_of(&self.shared.lock_core())
    }

    pub fn toggle_running(&self) -> SessionSnapshot {
        self.shared.apply(SessionAction::ToggleRunning)
    }

    pub fn choose_break(&self, length: BreakLength) -> SessionSnapshot {
        self.shared.apply(SessionAction::ChooseBreak(length))
    }

    pub fn start_next(&self) -> SessionSnapshot {
        self.shared.apply(SessionAction::StartNext)
    }

    pub fn skip_break(&self) -> SessionSnapshot {
        self.shared.apply(SessionAction::SkipBreak)
    }

    /// Restarts a plain countdown from the top; no-op for pomodoro sessions.
    pub fn reset(&self) -> SessionSnapshot {
        let mut core = self.shared.lock_core();
        if let TimerCore::Countdown(timer) = &mut *core {
            timer.reset();
        }
        SessionShared::snapshot_of(&core)
    }

    /// Stops the driver synchronously; no tick or effect lands afterwards.
    pub fn close(&self) {
        self.driver.abort();
    }
}

impl Drop for FocusSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
