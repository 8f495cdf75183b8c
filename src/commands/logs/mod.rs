pub mod delete_log_entry_command;
pub mod edit_log_memo_command;

pub use delete_log_entry_command::DeleteLogEntryCommand;
pub use edit_log_memo_command::EditLogMemoCommand;
