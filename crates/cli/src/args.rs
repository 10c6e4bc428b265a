//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use postpilot_domain::{AiModel, ClockTime, Frequency, PostStatus};
use std::path::PathBuf;
use uuid::Uuid;

/// postpilot: style-matched post generation and scheduled auto-posting for Threads
#[derive(Parser, Debug)]
#[command(name = "postpilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute due rules and scheduled posts, once or on an interval
    Run(RunArgs),

    /// Manage connected Threads accounts
    Accounts(AccountsArgs),

    /// Per-account generation settings
    Settings(SettingsArgs),

    /// Manage auto-post rules
    Rules(RulesArgs),

    /// Manage posts
    Posts(PostsArgs),

    /// Analyze own or competitor posts
    Analyze(AnalyzeArgs),

    /// Generate a draft post from the latest analysis
    Generate(GenerateArgs),

    /// Fetch and list post engagement metrics
    Analytics(AnalyticsArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run one sweep and exit
    #[arg(long)]
    pub once: bool,

    /// Only execute due auto-post rules
    #[arg(long, conflicts_with = "posts_only")]
    pub rules_only: bool,

    /// Only publish due scheduled posts
    #[arg(long, conflicts_with = "rules_only")]
    pub posts_only: bool,
}

#[derive(Args, Debug)]
pub struct AccountsArgs {
    #[command(subcommand)]
    pub command: AccountsCommands,
}

#[derive(Subcommand, Debug)]
pub enum AccountsCommands {
    /// Register an account with a long-lived access token
    Add {
        /// Threads user id
        #[arg(long)]
        user_id: String,

        /// Threads username
        #[arg(long)]
        username: String,

        /// Access token
        #[arg(long, env = "THREADS_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List connected accounts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove an account and everything it owns
    Remove {
        /// Account id
        id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommands,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show the settings of an account
    Show {
        /// Account id
        #[arg(long)]
        account: Uuid,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update settings; an empty value clears a field
    Set {
        /// Account id
        #[arg(long)]
        account: Uuid,

        /// Prompt prepended to every generation
        #[arg(long)]
        base_prompt: Option<String>,

        #[arg(long)]
        theme: Option<String>,

        #[arg(long)]
        default_schedule: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommands,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommands {
    /// Create a rule
    Create(RuleCreateArgs),

    /// Update fields of a rule
    Update(RuleUpdateArgs),

    /// List the rules of an account
    List {
        /// Account id
        #[arg(long)]
        account: Uuid,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one rule
    Show {
        /// Rule id
        id: Uuid,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a rule
    Delete {
        /// Rule id
        id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct RuleCreateArgs {
    /// Account id
    #[arg(long)]
    pub account: Uuid,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub description: Option<String>,

    /// HOURLY, DAILY, WEEKLY, MONTHLY or CUSTOM
    #[arg(long)]
    pub frequency: Frequency,

    /// Local HH:MM times, comma separated
    #[arg(long = "times", value_delimiter = ',')]
    pub times: Vec<ClockTime>,

    /// IANA timezone name [default: Asia/Tokyo]
    #[arg(long)]
    pub timezone: Option<String>,

    /// Generation topic
    #[arg(long)]
    pub topic: Option<String>,

    /// Extra instructions for every generation
    #[arg(long)]
    pub custom_prompt: Option<String>,

    /// Generate threads instead of single posts
    #[arg(long)]
    pub thread: bool,

    /// Content generation backend
    #[arg(long, default_value = "openai")]
    pub model: AiModel,

    /// Stop after this many runs
    #[arg(long)]
    pub max_runs: Option<u32>,

    /// Create the rule disabled
    #[arg(long)]
    pub disabled: bool,

    /// Record runs without generating posts
    #[arg(long)]
    pub no_generate: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RuleUpdateArgs {
    /// Rule id
    pub id: Uuid,

    #[arg(long)]
    pub name: Option<String>,

    /// New description; empty clears it
    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    #[arg(long, conflicts_with = "enable")]
    pub disable: bool,

    #[arg(long)]
    pub frequency: Option<Frequency>,

    /// Local HH:MM times, comma separated
    #[arg(long = "times", value_delimiter = ',')]
    pub times: Option<Vec<ClockTime>>,

    #[arg(long)]
    pub timezone: Option<String>,

    /// New topic; empty clears it
    #[arg(long)]
    pub topic: Option<String>,

    /// New custom prompt; empty clears it
    #[arg(long)]
    pub custom_prompt: Option<String>,

    /// Whether the rule generates threads
    #[arg(long)]
    pub thread: Option<bool>,

    /// Whether runs generate posts
    #[arg(long)]
    pub auto_generate: Option<bool>,

    #[arg(long)]
    pub model: Option<AiModel>,

    /// New run limit; 0 removes the limit
    #[arg(long)]
    pub max_runs: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PostsArgs {
    #[command(subcommand)]
    pub command: PostsCommands,
}

#[derive(Subcommand, Debug)]
pub enum PostsCommands {
    /// Create a draft by hand
    Create {
        /// Account id
        #[arg(long)]
        account: Uuid,

        /// Post text
        #[arg(long)]
        content: String,

        /// Follow-up thread segment; repeat for more
        #[arg(long = "segment")]
        segments: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the posts of an account
    List {
        /// Account id
        #[arg(long)]
        account: Uuid,

        /// Only posts with this status
        #[arg(long)]
        status: Option<PostStatus>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one post
    Show {
        /// Post id
        id: Uuid,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Schedule a post for publication
    Schedule {
        /// Post id
        id: Uuid,

        /// RFC 3339 timestamp
        #[arg(long)]
        at: String,
    },

    /// Publish a post now
    Publish {
        /// Post id
        id: Uuid,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a post
    Delete {
        /// Post id
        id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub command: AnalyzeCommands,
}

#[derive(Subcommand, Debug)]
pub enum AnalyzeCommands {
    /// Analyze the account's own recent posts
    #[command(name = "self")]
    Own {
        /// Account id
        #[arg(long)]
        account: Uuid,

        /// Content generation backend [default: llm.default_model]
        #[arg(long)]
        model: Option<AiModel>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze posts of other accounts
    Competitors {
        /// Account id
        #[arg(long)]
        account: Uuid,

        /// Competitor username; repeat for more
        #[arg(long = "username", required = true)]
        usernames: Vec<String>,

        /// Content generation backend [default: llm.default_model]
        #[arg(long)]
        model: Option<AiModel>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored analyses, newest first
    List {
        /// Account id
        #[arg(long)]
        account: Uuid,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Account id
    #[arg(long)]
    pub account: Uuid,

    #[arg(long)]
    pub topic: Option<String>,

    /// Generate a thread
    #[arg(long)]
    pub thread: bool,

    /// Analysis to imitate [default: newest]
    #[arg(long)]
    pub analysis: Option<Uuid>,

    /// Use the viral generator when the analysis has viral elements
    #[arg(long)]
    pub viral: bool,

    /// Content generation backend [default: llm.default_model]
    #[arg(long)]
    pub model: Option<AiModel>,

    /// Extra instructions for this draft
    #[arg(long)]
    pub instructions: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AnalyticsArgs {
    #[command(subcommand)]
    pub command: AnalyticsCommands,
}

#[derive(Subcommand, Debug)]
pub enum AnalyticsCommands {
    /// Fetch metrics for one published post
    Fetch {
        /// Post id
        post: Uuid,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch metrics for every published post of an account
    Refresh {
        /// Account id
        #[arg(long)]
        account: Uuid,
    },

    /// List stored snapshots
    List {
        /// Account id
        #[arg(long)]
        account: Uuid,

        /// RFC 3339 lower bound on fetch time
        #[arg(long)]
        from: Option<String>,

        /// RFC 3339 upper bound on fetch time
        #[arg(long)]
        to: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
