mod exam;
mod ids;
mod ledger;
mod result;
mod session;

pub use ids::{ExamCode, OptionLabel, ParseIdError, ResultId};

pub use exam::{Exam, ExamError, Question, QuestionError, DEFAULT_TOPIC};
pub use ledger::{AnswerLedger, AnswerSheet, LedgerError};
pub use result::{PASS_THRESHOLD_PERCENT, ResultError, SubmissionResult, TopicScore, TopicStatus};
pub use session::SessionPhase;
