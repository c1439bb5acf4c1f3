use clap::{Parser, Subcommand};

const VERSION: &str = env!("GIT_VERSION");

#[derive(Parser)]
#[command(
    name = "firmflow",
    version = VERSION,
    about = "Workflow template & task dependency engine",
    after_help = "\
NOTE:
  Data lives at <root>/.firmflow/firmflow.db, found by walking up from the
  current directory. Run `firmflow init` before any other command.

EXIT CODES:
  0  Success
  1  Error (validation, cycle, stale cascade, database, ...)

CASCADE RULES:
  Cascading applies to template-origin tasks of projects in dependency mode.
  Completing the task at stage k completes stages 1..k-1; reopening it
  resets stages k+1..N to the default stage. Recurring masters regenerate
  their next occurrence on completion and via `recurring sweep`."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Firm by name or id (defaults to the active firm)
    #[arg(long, global = true)]
    pub firm: Option<String>,

    /// Actor recorded in the activity log
    #[arg(long, global = true, default_value = "cli")]
    pub actor: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize firmflow in this directory
    Init,

    /// Firm management
    #[command(subcommand)]
    Firm(FirmCommands),

    /// Client management
    #[command(subcommand)]
    Client(ClientCommands),

    /// Workflow template management
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Recurring task generation
    #[command(subcommand)]
    Recurring(RecurringCommands),

    /// Show recent activity of the active firm
    Activity {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum FirmCommands {
    /// Create a new firm
    Create { name: String },
    /// List firms
    List,
    /// Set the active firm
    Use { name: String },
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Add a client to the active firm
    Add {
        name: String,
        /// Create the client inactive
        #[arg(long)]
        inactive: bool,
    },
    /// List clients of the active firm
    List,
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Load a template from stdin JSON
    #[command(after_help = "\
STDIN FORMAT:
  {\"name\":\"slug\", \"dependency_mode\":true,
   \"tasks\":[{\"id\":\"t1\", \"title\":\"...\", \"days_from_start\":0,
              \"after\":[...]}]}

NOTE:
  Atomic: all-or-nothing. Validates duplicate ids, unknown refs, cycles,
  recurrence rules, and the days_from_start/recurrence exclusivity.
  `days_from_start` and `recurrence` are mutually exclusive per task.")]
    Load,
    /// List templates
    List,
    /// Show a template and its compiled stages
    Show { reference: String },
    /// Compile a template into a work type with ordered stages
    Compile { reference: String },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Instantiate a project from a template
    Create {
        #[arg(long)]
        template: String,
        #[arg(long)]
        client: String,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Project-level due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Override the template's dependency mode
        #[arg(long)]
        dependency_mode: Option<bool>,
        #[arg(long)]
        name: Option<String>,
    },
    /// List projects
    List,
    /// Show a project and its tasks
    Show { reference: String },
    /// Show a project's kanban column
    Column { reference: String },
    /// Move a project to a kanban column (stage position or "completed")
    Move { reference: String, target: String },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List tasks (optionally scoped to a project)
    List {
        #[arg(long)]
        project: Option<String>,
    },
    /// Show task details
    Show { id: String },
    /// Move a task to the stage at a position of its project's work type
    SetStage { id: String, position: i64 },
    /// Complete a task (terminal stage; cascades in dependency mode)
    Complete { id: String },
    /// Reopen a task (default stage; cascades in dependency mode)
    Reopen { id: String },
    /// Manage task dependencies
    #[command(subcommand)]
    Dep(DepCommands),
}

#[derive(Subcommand)]
pub enum DepCommands {
    /// Add a dependency (rejected if it would create a cycle)
    Add {
        /// Task id
        id: String,
        /// Task it depends on
        dep_id: String,
    },
    /// Remove a dependency
    Remove {
        id: String,
        dep_id: String,
    },
}

#[derive(Subcommand)]
pub enum RecurringCommands {
    /// Generate the next occurrence of a recurring master
    Generate { id: String },
    /// Sweep all due recurring masters of the active firm
    Sweep {
        /// Sweep as of this date (YYYY-MM-DD, default today)
        #[arg(long)]
        as_of: Option<String>,
    },
}
