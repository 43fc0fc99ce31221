use crate::app::cli::{Cli, Command};
use crate::app::command_support::{init_tracing, CommandContext};
use clap::error::ErrorKind;
use clap::Parser;

pub mod auth;
pub mod automation;
pub mod calls;
pub mod companies;
pub mod contacts;
pub mod events;
pub mod pipelines;
pub mod reports;
pub mod tasks;

/// Parses `args` (without the program name), loads settings and runs the
/// command. Help and version text come back as `Ok`; every failure is an
/// `error: ...` line.
pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let cli = match Cli::try_parse_from(std::iter::once("bigin".to_string()).chain(args)) {
        Ok(cli) => cli,
        Err(err) => {
            let rendered = err.render().to_string().trim_end().to_string();
            return match err.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Ok(rendered),
                _ => Err(rendered),
            };
        }
    };
    let context = CommandContext::load(cli.config.as_deref(), cli.verbose)
        .map_err(|err| format!("error: {err}"))?;
    init_tracing(context.verbosity);
    run_with_context(cli.command, &context).map_err(|err| format!("error: {err}"))
}

pub fn run_with_context(command: Command, context: &CommandContext) -> Result<String, String> {
    match command {
        Command::Auth { command } => auth::cmd_auth(command, context),
        Command::Pipelines { command } => pipelines::cmd_pipelines(command, context),
        Command::Contacts { command } => contacts::cmd_contacts(command, context),
        Command::Companies { command } => companies::cmd_companies(command, context),
        Command::Tasks { command } => tasks::cmd_tasks(command, context),
        Command::Events { command } => events::cmd_events(command, context),
        Command::Calls { command } => calls::cmd_calls(command, context),
        Command::Automation { command } => automation::cmd_automation(command, context),
        Command::Reports { command } => reports::cmd_reports(command, context),
    }
}
