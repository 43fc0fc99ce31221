use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bigin CRM automation from the command line.
#[derive(Parser, Debug)]
#[command(name = "bigin", version, about = "Bigin CRM pipelines, contacts and follow-ups")]
pub struct Cli {
    /// Raise log verbosity (-v normal, -vv debug with bodies)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (defaults to $BIGIN_CONFIG or ~/.openclaw/bigin-crm.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// OAuth login, status and revocation
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// Deals and their stage transitions
    Pipelines {
        #[command(subcommand)]
        command: PipelineCommand,
    },
    Contacts {
        #[command(subcommand)]
        command: ContactCommand,
    },
    /// Companies (the Accounts module)
    Companies {
        #[command(subcommand)]
        command: CompanyCommand,
    },
    Tasks {
        #[command(subcommand)]
        command: TaskCommand,
    },
    Events {
        #[command(subcommand)]
        command: EventCommand,
    },
    Calls {
        #[command(subcommand)]
        command: CallCommand,
    },
    /// Batch workflows over open pipelines
    Automation {
        #[command(subcommand)]
        command: AutomationCommand,
    },
    Reports {
        #[command(subcommand)]
        command: ReportCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Open the browser flow and wait for the redirect
    Login {
        /// Exchange an authorization code directly instead of listening
        #[arg(long)]
        code: Option<String>,
        /// Seconds to wait for the redirect
        #[arg(long)]
        timeout: Option<u64>,
    },
    Status,
    /// Organization of the authenticated user
    Whoami,
    Revoke,
    /// Print the authorization URL only
    Url,
}

#[derive(Subcommand, Debug)]
pub enum PipelineCommand {
    Create {
        #[arg(long)]
        contact_id: Option<String>,
        #[arg(long)]
        company_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "Qualification")]
        stage: String,
        #[arg(long, default_value_t = 0.0)]
        amount: f64,
        #[arg(long)]
        closing_date: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        sub_pipeline: Option<String>,
    },
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        stage: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        probability: Option<u8>,
        #[arg(long)]
        closing_date: Option<String>,
    },
    Get {
        #[arg(long)]
        id: String,
    },
    List {
        #[arg(long)]
        stage: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 200)]
        limit: u32,
    },
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        stage: Option<String>,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Move to the next stage, or to --stage
    Advance {
        #[arg(long)]
        id: String,
        #[arg(long)]
        stage: Option<String>,
    },
    Win {
        #[arg(long)]
        id: String,
    },
    Lose {
        #[arg(long)]
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Move every pipeline in --stage to --new-stage
    BulkUpdate {
        #[arg(long)]
        stage: String,
        #[arg(long)]
        new_stage: String,
        /// e.g. probability-gt-50 or amount-ge-10000
        #[arg(long)]
        criteria: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContactCommand {
    Create {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        company_id: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        company_id: Option<String>,
    },
    Get {
        #[arg(long)]
        id: String,
    },
    List {
        #[arg(long, default_value_t = 200)]
        limit: u32,
    },
    Search {
        #[arg(long)]
        query: String,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Create one contact per CSV row
    Import {
        #[arg(long)]
        file: PathBuf,
        /// JSON object mapping CSV columns to contact fields
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CompanyFields {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub industry: Option<String>,
    #[arg(long)]
    pub website: Option<String>,
    #[arg(long)]
    pub employees: Option<u32>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum CompanyCommand {
    Create(CompanyFields),
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        industry: Option<String>,
    },
    Get {
        #[arg(long)]
        id: String,
        #[arg(long)]
        include_contacts: bool,
    },
    List {
        #[arg(long, default_value_t = 200)]
        limit: u32,
    },
    Search {
        #[arg(long)]
        query: String,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Reuse a company with the same name or create it
    FindOrCreate(CompanyFields),
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    Create {
        #[arg(long)]
        subject: String,
        /// Related record as Module:id
        #[arg(long)]
        related_to: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        #[arg(long, default_value = "Normal")]
        priority: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    Complete {
        #[arg(long)]
        id: String,
    },
    Get {
        #[arg(long)]
        id: String,
    },
    List {
        #[arg(long, default_value = "Open")]
        status: String,
        #[arg(long)]
        due_before: Option<String>,
        #[arg(long)]
        due_after: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 200)]
        limit: u32,
    },
    Upcoming {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long, default_value = "Open")]
        status: String,
    },
    Overdue {
        #[arg(long)]
        owner: Option<String>,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
    FollowUp {
        #[arg(long)]
        related_to: String,
        #[arg(long, default_value = "Follow up")]
        subject: String,
        #[arg(long, default_value_t = 3)]
        days: u32,
        #[arg(long, default_value = "Normal")]
        priority: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum EventCommand {
    Create {
        #[arg(long)]
        title: String,
        /// "YYYY-MM-DD HH:MM"
        #[arg(long)]
        start: String,
        #[arg(long, default_value_t = 60)]
        duration: u32,
        #[arg(long)]
        related_to: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Attendee emails, comma separated
        #[arg(long, value_delimiter = ',')]
        attendees: Vec<String>,
    },
    List {
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
        #[arg(long, default_value_t = 200)]
        limit: u32,
    },
    Upcoming {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ContactCall {
    #[arg(long)]
    pub contact_id: String,
    #[arg(long)]
    pub subject: String,
    #[arg(long, default_value_t = 0)]
    pub duration: u32,
    #[arg(long)]
    pub outcome: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum CallCommand {
    Create {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        related_to: Option<String>,
        #[arg(long = "type", default_value = "Outbound")]
        call_type: String,
        #[arg(long, default_value_t = 0)]
        duration: u32,
        #[arg(long)]
        outcome: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },
    List {
        #[arg(long)]
        related_to: Option<String>,
        #[arg(long = "type")]
        call_type: Option<String>,
        #[arg(long, default_value_t = 200)]
        limit: u32,
    },
    /// Log an outbound call against a contact
    Outbound(ContactCall),
    /// Log an inbound call against a contact
    Inbound(ContactCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssignMode {
    RoundRobin,
    Random,
}

#[derive(Subcommand, Debug)]
pub enum AutomationCommand {
    /// Give every unassigned pipeline an owner
    Assign {
        /// Owner emails, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        owners: Vec<String>,
        #[arg(long, value_enum, default_value_t = AssignMode::RoundRobin)]
        mode: AssignMode,
    },
    /// List pipelines without recent activity
    FollowUp {
        #[arg(long, default_value_t = 7)]
        stale_days: u32,
        /// Create a follow-up task for each stale pipeline
        #[arg(long)]
        create_tasks: bool,
    },
    /// Advance pipelines matching --criteria
    Advance {
        #[arg(long, default_value = "proposal-sent-and-7-days")]
        criteria: String,
        #[arg(long)]
        target_stage: Option<String>,
    },
    /// Pipelines unchanged for --days, with a suggested next action
    Stuck {
        #[arg(long, default_value_t = 14)]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    Pipeline {
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        by_stage: bool,
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        by_owner: bool,
        /// Write the report as CSV to this file instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Weighted forecast; --month is YYYY-MM
    Forecast {
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Performance {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Activity {
        #[arg(long, default_value = "me")]
        user: String,
        #[arg(long)]
        week: Option<String>,
        #[arg(long)]
        include_calls: bool,
        #[arg(long)]
        include_tasks: bool,
        #[arg(long)]
        include_events: bool,
    },
}
