pub mod accounts;
pub mod completions;
pub mod configure;

pub use accounts::{AccountsCommand, OutputFormat, RoleArgs};
pub use completions::CompletionsCommand;
pub use configure::ConfigureCommand;
