#![forbid(unsafe_code)]

pub mod countdown;
pub mod error;
pub mod sessions;

pub use exam_core::WallClock;
pub use sessions as session;

pub use countdown::Countdown;
pub use error::{FailureKind, LoaderError, SessionError, SubmissionFailure};

pub use sessions::{
    ExamLoopService, ExamSession, QuestionView, ResultView, SessionHandle, SessionProgress,
    SessionSnapshot, TickOutcome,
};
