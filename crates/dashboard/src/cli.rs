use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crm-dashboard", version, about = "CRM dashboard client")]
pub(crate) struct Args {
    #[arg(
        long,
        global = true,
        env = "CRM_DASHBOARD_CONFIG",
        default_value = "~/.crm-dashboard/config.toml"
    )]
    pub(crate) config: String,
    #[arg(long, global = true, env = "CRM_DASHBOARD_BASE_URL")]
    pub(crate) base_url: Option<String>,
    /// Overrides the workspace selected with `workspaces use`.
    #[arg(long, global = true)]
    pub(crate) workspace: Option<String>,
    /// Render views as HTML fragments instead of text tables.
    #[arg(long, global = true, default_value_t = false)]
    pub(crate) html: bool,
    /// Also write JSON logs to a daily-rolling file in this directory.
    #[arg(long, global = true)]
    pub(crate) log_dir: Option<PathBuf>,
    #[arg(long, short, global = true, default_value_t = false)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Sign in (or register with --register) and store the token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CRM_DASHBOARD_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value_t = false)]
        register: bool,
        #[arg(long)]
        name: Option<String>,
    },
    Logout,
    Whoami,
    #[command(subcommand)]
    Workspaces(WorkspacesCommand),
    #[command(subcommand)]
    Config(DocumentCommand),
    #[command(subcommand)]
    Session(SessionCommand),
    /// Poll the active workspace and print updates until Ctrl-C.
    Watch {
        /// Also follow this contact's live chat.
        #[arg(long)]
        chat: Option<String>,
    },
    #[command(subcommand)]
    Campaign(CampaignCommand),
    Leads,
    Report {
        /// Print the CSV download link instead of the table.
        #[arg(long, default_value_t = false)]
        csv_url: bool,
    },
    #[command(subcommand)]
    Templates(TemplatesCommand),
    #[command(subcommand)]
    Automation(AutomationCommand),
    #[command(subcommand)]
    Agent(DocumentCommand),
    Alerts,
    Billing,
    #[command(subcommand)]
    Media(MediaCommand),
    #[command(subcommand)]
    Recipients(RecipientsCommand),
    #[command(subcommand)]
    Schedules(SchedulesCommand),
    #[command(subcommand)]
    Chat(ChatCommand),
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
pub(crate) enum WorkspacesCommand {
    List,
    Create { name: String },
    Delete { id: String },
    /// Make a workspace the default for later commands.
    Use { id: String },
}

/// Free-form JSON documents (workspace config, agent settings).
#[derive(Subcommand, Debug)]
pub(crate) enum DocumentCommand {
    Show,
    Set {
        /// JSON file holding the new document.
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum SessionCommand {
    Status,
    Start,
    Stop,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CampaignCommand {
    Send {
        #[arg(long = "message", short = 'm')]
        messages: Vec<String>,
        #[arg(long)]
        media: Option<String>,
        #[arg(long)]
        template: Option<String>,
        /// RFC 3339 instant; schedules the campaign instead of sending now.
        #[arg(long)]
        send_at: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum TemplatesCommand {
    List,
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        body: String,
    },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub(crate) enum AutomationCommand {
    Show,
    /// Update toggles given as `name=on` or `name=off`.
    Set {
        #[arg(required = true, value_parser = parse_toggle)]
        toggles: Vec<(String, bool)>,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum MediaCommand {
    List,
    Upload { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub(crate) enum RecipientsCommand {
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub(crate) enum SchedulesCommand {
    List,
    Cancel { id: String },
}

#[derive(Subcommand, Debug)]
pub(crate) enum ChatCommand {
    Show { contact: String },
    Send { contact: String, body: String },
    Takeover {
        contact: String,
        /// Hand the conversation back to automation.
        #[arg(long, default_value_t = false)]
        release: bool,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum AdminCommand {
    Workspaces,
    SetPlan { id: String, plan: String },
    Suspend {
        id: String,
        #[arg(long, default_value_t = false)]
        lift: bool,
    },
}

pub(crate) fn parse_toggle(raw: &str) -> Result<(String, bool), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=on|off, got {raw}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing toggle name in {raw}"));
    }
    let enabled = match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => true,
        "off" | "false" | "0" | "no" => false,
        other => return Err(format!("invalid toggle value {other} for {name}")),
    };
    Ok((name.to_string(), enabled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn toggles_parse_on_off() {
        assert_eq!(parse_toggle("autoReply=on"), Ok(("autoReply".to_string(), true)));
        assert_eq!(parse_toggle("followUp = off"), Ok(("followUp".to_string(), false)));
        assert!(parse_toggle("autoReply").is_err());
        assert!(parse_toggle("=on").is_err());
        assert!(parse_toggle("x=maybe").is_err());
    }

    #[test]
    fn campaign_send_collects_repeated_messages() {
        let args = Args::try_parse_from([
            "crm-dashboard",
            "--workspace",
            "ws-1",
            "campaign",
            "send",
            "-m",
            "hello",
            "-m",
            "second",
        ])
        .expect("parse");
        assert_eq!(args.workspace.as_deref(), Some("ws-1"));
        match args.command {
            Command::Campaign(CampaignCommand::Send { messages, .. }) => {
                assert_eq!(messages, vec!["hello", "second"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
