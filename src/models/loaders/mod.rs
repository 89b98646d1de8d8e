pub mod bank_loader;
pub mod record;

pub use bank_loader::{list_bank_folders, load_question_bank, load_section};
pub use record::{QuestionRecord, RecordFormat};
