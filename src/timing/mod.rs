pub mod countdown;
pub mod schedule;

pub use countdown::{format_mm_ss, Countdown, CountdownSnapshot, CountdownStatus, CountdownTicker};
pub use schedule::{RevealSchedule, ScheduleHandle};
