//! CLI command handlers, one file per subcommand.

mod completions;
mod delete;
mod edit;
mod list;
mod login;
mod prompt;
mod show;
mod upload;

pub use completions::run_completions;
pub use delete::run_delete;
pub use edit::run_edit;
pub use list::run_list;
pub use login::run_login;
pub use show::run_show;
pub use upload::run_upload;
