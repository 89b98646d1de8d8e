pub mod loaders;
pub mod question;

pub use loaders::{list_bank_folders, load_question_bank, load_section};
pub use question::{AnswerOption, ImageRef, Question, QuestionBank, RichText, Section, Span, Table};
