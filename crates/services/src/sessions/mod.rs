mod driver;
mod progress;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use driver::SessionHandle;
pub use progress::{SessionProgress, SessionSnapshot};
pub use service::{ExamSession, TickOutcome};
pub use view::{
    LOW_TIME_THRESHOLD_SECS, OptionView, QuestionView, ResultView, TopicRow, format_percentage,
    format_remaining, is_low_time,
};
pub use workflow::ExamLoopService;
