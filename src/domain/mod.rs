pub mod countdown;
pub mod models;
pub mod pomodoro;
pub mod schedule;
pub mod time;
