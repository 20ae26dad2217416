use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use protocol::ChatMessage;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cli::{
    AdminCommand, Args, AutomationCommand, CampaignCommand, ChatCommand, Command, DocumentCommand,
    MediaCommand, RecipientsCommand, SchedulesCommand, SessionCommand, TemplatesCommand,
    WorkspacesCommand,
};
use crate::config::ResolvedConfig;
use crate::controller::DashboardController;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::ApiError;
use crate::events::DashboardEvent;
use crate::render::{html, tables, text, TextTable};
use crate::runtime::{format_send_at, CampaignDraft, CampaignReport, RefreshOutcome};
use crate::state::StatusView;

struct CommandContext {
    api: Arc<ApiClient>,
    store: CredentialStore,
    controller: DashboardController,
    credentials: Option<Credentials>,
    workspace_flag: Option<String>,
    html: bool,
}

pub(crate) async fn run(args: Args, config: ResolvedConfig) -> anyhow::Result<()> {
    let store = CredentialStore::new(&config.state_dir);
    let credentials = store.load()?;
    let api = Arc::new(ApiClient::new(&config.base_url, &config.http)?);
    if let Some(credentials) = &credentials {
        api.set_token(Some(credentials.token.clone()));
    }
    let controller = DashboardController::new(api.clone(), store.clone(), config.runtime.clone());
    if let Some(credentials) = &credentials {
        controller.sign_in(credentials.email.clone()).await;
    }
    info!(
        event = "cli.start",
        base_url = %config.base_url,
        logged_in = credentials.is_some(),
        "running command"
    );
    let ctx = CommandContext {
        api,
        store,
        controller,
        credentials,
        workspace_flag: args.workspace,
        html: args.html,
    };

    match args.command {
        Command::Login {
            email,
            password,
            register,
            name,
        } => ctx.login(&email, &password, register, name).await,
        Command::Logout => ctx.logout().await,
        Command::Whoami => ctx.whoami().await,
        Command::Workspaces(command) => ctx.workspaces(command).await,
        Command::Config(command) => ctx.workspace_config(command).await,
        Command::Session(command) => ctx.session(command).await,
        Command::Watch { chat } => ctx.watch(chat).await,
        Command::Campaign(command) => ctx.campaign(command).await,
        Command::Leads => ctx.leads().await,
        Command::Report { csv_url } => ctx.report(csv_url).await,
        Command::Templates(command) => ctx.templates(command).await,
        Command::Automation(command) => ctx.automation(command).await,
        Command::Agent(command) => ctx.agent(command).await,
        Command::Alerts => ctx.alerts().await,
        Command::Billing => ctx.billing().await,
        Command::Media(command) => ctx.media(command).await,
        Command::Recipients(command) => ctx.recipients(command).await,
        Command::Schedules(command) => ctx.schedules(command).await,
        Command::Chat(command) => ctx.chat(command).await,
        Command::Admin(command) => ctx.admin(command).await,
    }
}

impl CommandContext {
    fn require_login(&self) -> anyhow::Result<&Credentials> {
        self.credentials
            .as_ref()
            .context("not logged in; run `crm-dashboard login` first")
    }

    fn workspace(&self) -> anyhow::Result<String> {
        let credentials = self.require_login()?;
        self.workspace_flag
            .clone()
            .or_else(|| credentials.active_workspace.clone())
            .context("no workspace selected; run `crm-dashboard workspaces use <id>`")
    }

    /// Passes an API result through the expired-session handling.
    async fn call<T>(&self, result: Result<T, ApiError>) -> anyhow::Result<T> {
        Ok(self.controller.check(result).await?)
    }

    fn output(&self, html: impl FnOnce() -> String, text: impl FnOnce() -> String) {
        if self.html {
            println!("{}", html());
        } else {
            print!("{}", text());
        }
    }

    /// Writes the operator log gathered during this invocation to stderr.
    async fn print_event_log(&self) {
        let log = self.controller.event_log().await;
        if !log.is_empty() {
            eprint!("{log}");
        }
    }

    async fn login(
        &self,
        email: &str,
        password: &str,
        register: bool,
        name: Option<String>,
    ) -> anyhow::Result<()> {
        let auth = if register {
            self.api.register(email, password, name).await?
        } else {
            self.api.login(email, password).await?
        };
        let active_workspace = self
            .credentials
            .as_ref()
            .filter(|previous| previous.email.as_deref() == Some(auth.user.email.as_str()))
            .and_then(|previous| previous.active_workspace.clone());
        self.store.save(&Credentials {
            token: auth.token,
            email: Some(auth.user.email.clone()),
            active_workspace,
        })?;
        info!(event = "auth.login", email = %auth.user.email, "logged in");
        println!("Logged in as {}", auth.user.email);
        Ok(())
    }

    async fn logout(&self) -> anyhow::Result<()> {
        let email = self.controller.session_email().await;
        self.controller.logout().await;
        match email {
            Some(email) => println!("Logged out {email}"),
            None => println!("Logged out"),
        }
        Ok(())
    }

    async fn whoami(&self) -> anyhow::Result<()> {
        let credentials = self.require_login()?;
        let user = self.call(self.api.me().await).await?;
        println!("{} ({})", user.email, if user.is_admin() { "admin" } else { "member" });
        if let Some(name) = user.name.as_deref() {
            println!("name: {name}");
        }
        match self
            .workspace_flag
            .as_deref()
            .or(credentials.active_workspace.as_deref())
        {
            Some(workspace) => println!("workspace: {workspace}"),
            None => println!("workspace: (none selected)"),
        }
        Ok(())
    }

    async fn workspaces(&self, command: WorkspacesCommand) -> anyhow::Result<()> {
        let credentials = self.require_login()?;
        match command {
            WorkspacesCommand::List => {
                let mut workspaces = self.call(self.api.list_workspaces().await).await?;
                tables::sort_workspaces(&mut workspaces);
                let active = credentials.active_workspace.as_deref();
                self.output(
                    || html::admin_workspaces_table(&workspaces),
                    || {
                        let mut table = TextTable::new(&["", "ID", "NAME", "PLAN", "STATE"]);
                        for workspace in &workspaces {
                            let marker = if Some(workspace.id.as_str()) == active { "*" } else { "" };
                            table.push_row(vec![
                                marker.to_string(),
                                workspace.id.clone(),
                                workspace.name.clone(),
                                workspace.plan.clone().unwrap_or_default(),
                                suspended_label(workspace.suspended).to_string(),
                            ]);
                        }
                        table_or(&table, "No workspaces yet.")
                    },
                );
            }
            WorkspacesCommand::Create { name } => {
                let workspace = self.call(self.api.create_workspace(&name).await).await?;
                println!("Created workspace {} ({})", workspace.name, workspace.id);
            }
            WorkspacesCommand::Delete { id } => {
                self.call(self.api.delete_workspace(&id).await).await?;
                if credentials.active_workspace.as_deref() == Some(id.as_str()) {
                    self.store.set_active_workspace(None)?;
                }
                println!("Deleted workspace {id}");
            }
            WorkspacesCommand::Use { id } => {
                let workspaces = self.call(self.api.list_workspaces().await).await?;
                let Some(workspace) = workspaces.iter().find(|workspace| workspace.id == id) else {
                    bail!("unknown workspace {id}");
                };
                self.store.set_active_workspace(Some(workspace.id.clone()))?;
                println!("Using workspace {} ({})", workspace.name, workspace.id);
            }
        }
        Ok(())
    }

    async fn workspace_config(&self, command: DocumentCommand) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        match command {
            DocumentCommand::Show => {
                let config = self.call(self.api.workspace_config(&workspace_id).await).await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            DocumentCommand::Set { file } => {
                let config = read_json_file(&file)?;
                self.call(self.api.save_workspace_config(&workspace_id, &config).await)
                    .await?;
                println!("Saved workspace config");
            }
        }
        Ok(())
    }

    async fn agent(&self, command: DocumentCommand) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        match command {
            DocumentCommand::Show => {
                let config = self.call(self.api.agent_config(&workspace_id).await).await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            DocumentCommand::Set { file } => {
                let config = read_json_file(&file)?;
                self.call(self.api.save_agent_config(&workspace_id, &config).await)
                    .await?;
                println!("Saved agent settings");
            }
        }
        Ok(())
    }

    async fn session(&self, command: SessionCommand) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        match command {
            SessionCommand::Status => {
                let view = self.current_status(&workspace_id).await;
                self.print_event_log().await;
                let view = view?;
                self.output(
                    || html::status_card(&view),
                    || format!("{}\n", text::status_line(&view)),
                );
            }
            SessionCommand::Start => {
                self.call(self.api.start_session(&workspace_id).await).await?;
                println!("Session starting; run `crm-dashboard watch` to follow pairing");
            }
            SessionCommand::Stop => {
                self.call(self.api.stop_session(&workspace_id).await).await?;
                println!("Session stopped");
            }
        }
        Ok(())
    }

    /// One reconcile pass through the controller; returns the rendered view.
    async fn current_status(&self, workspace_id: &str) -> anyhow::Result<StatusView> {
        let mut rx = self.controller.subscribe();
        self.controller.select_workspace(workspace_id).await;
        let outcome = self.controller.refresh_status().await?;
        let mut view = None;
        while let Ok(event) = rx.try_recv() {
            if let DashboardEvent::StatusUpdated { view: update } = event {
                view = Some(update);
            }
        }
        if !self.controller.is_authenticated().await {
            return Err(ApiError::Unauthorized.into());
        }
        match (outcome, view) {
            (RefreshOutcome::Applied, Some(view)) => Ok(view),
            _ => bail!("could not read session status for {workspace_id}"),
        }
    }

    async fn watch(&self, chat: Option<String>) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        let mut rx = self.controller.subscribe();
        self.controller.select_workspace(&workspace_id).await;
        self.controller.start_polling().await?;
        if let Some(contact) = chat.as_deref() {
            self.controller.open_live_chat(contact).await?;
        }
        if let Some(contact) = self.controller.live_chat_contact() {
            println!("Following chat with {contact}");
        }
        let mut seen = HashSet::new();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            let event = tokio::select! {
                _ = &mut ctrl_c => {
                    info!("shutdown signal received");
                    break;
                }
                event = rx.recv() => event,
            };
            match event {
                Ok(DashboardEvent::ChatMessages {
                    contact_id,
                    mut messages,
                    takeover,
                }) => {
                    tables::sort_chat(&mut messages);
                    if self.html {
                        println!("{}", html::chat_transcript(&contact_id, &messages, takeover));
                        continue;
                    }
                    for message in messages.iter().filter(|message| seen.insert(chat_key(message))) {
                        println!("[chat {contact_id}] {}", text::chat_line(message));
                    }
                }
                Ok(DashboardEvent::StatusUpdated { view }) if self.html => {
                    println!("{}", html::status_card(&view));
                }
                Ok(event) => {
                    if let Some(line) = text::describe_event(&event) {
                        println!("{line}");
                    }
                    if matches!(event, DashboardEvent::LoggedOut) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "watch output fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        self.controller.close_live_chat();
        self.controller.stop_polling();
        Ok(())
    }

    async fn campaign(&self, command: CampaignCommand) -> anyhow::Result<()> {
        let CampaignCommand::Send {
            messages,
            media,
            template,
            send_at,
        } = command;
        let workspace_id = self.workspace()?;
        let draft = CampaignDraft {
            messages,
            media_id: media,
            template_id: template,
            send_at,
        };
        draft.validate()?;
        // Learn whether the workspace is already sending before dispatching.
        self.current_status(&workspace_id).await?;

        let mut rx = self.controller.subscribe();
        let send = self.controller.send_campaign(draft);
        tokio::pin!(send);
        let result = loop {
            tokio::select! {
                result = &mut send => break result,
                Ok(event) = rx.recv() => print_progress(&event),
            }
        };
        while let Ok(event) = rx.try_recv() {
            print_progress(&event);
        }
        self.print_event_log().await;
        match result? {
            CampaignReport::Scheduled { send_at } => println!("Campaign scheduled for {send_at}"),
            CampaignReport::Sent { total } => println!("Campaign sent: {total} messages"),
        }
        Ok(())
    }

    async fn leads(&self) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        let mut leads = self.call(self.api.leads(&workspace_id).await).await?;
        tables::sort_leads(&mut leads);
        self.output(
            || html::leads_table(&leads),
            || {
                let mut table =
                    TextTable::new(&["NAME", "PHONE", "STATUS", "TAGS", "UNREAD", "LAST MESSAGE"]);
                for lead in &leads {
                    table.push_row(vec![
                        lead.display_name().to_string(),
                        lead.phone.clone(),
                        lead.status.clone().unwrap_or_default(),
                        lead.tags.join(", "),
                        lead.unread.to_string(),
                        lead.last_message_at.clone().unwrap_or_default(),
                    ]);
                }
                table_or(&table, "No leads yet.")
            },
        );
        Ok(())
    }

    async fn report(&self, csv_url: bool) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        if csv_url {
            println!("{}", self.api.reports_csv_url(&workspace_id)?);
            return Ok(());
        }
        let mut days = self.call(self.api.report(&workspace_id).await).await?;
        tables::sort_report_days(&mut days);
        self.output(
            || html::report_table(&days),
            || {
                let mut table = TextTable::new(&["DAY", "SENT", "DELIVERED", "FAILED", "REPLIES"]);
                for day in &days {
                    table.push_row(vec![
                        day.day.clone(),
                        day.sent.to_string(),
                        day.delivered.to_string(),
                        day.failed.to_string(),
                        day.replies.to_string(),
                    ]);
                }
                if table.is_empty() {
                    return "No campaign activity yet.\n".to_string();
                }
                let totals = tables::report_totals(&days);
                table.push_row(vec![
                    "TOTAL".to_string(),
                    totals.sent.to_string(),
                    totals.delivered.to_string(),
                    totals.failed.to_string(),
                    totals.replies.to_string(),
                ]);
                table.render()
            },
        );
        Ok(())
    }

    async fn templates(&self, command: TemplatesCommand) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        match command {
            TemplatesCommand::List => {
                let mut templates = self.call(self.api.list_templates(&workspace_id).await).await?;
                tables::sort_templates(&mut templates);
                self.output(
                    || html::templates_list(&templates),
                    || {
                        let mut table = TextTable::new(&["ID", "NAME", "BODY"]);
                        for template in &templates {
                            table.push_row(vec![
                                template.id.clone(),
                                template.name.clone(),
                                template.body.clone(),
                            ]);
                        }
                        table_or(&table, "No templates saved.")
                    },
                );
            }
            TemplatesCommand::Save { name, body } => {
                self.call(self.api.save_template(&workspace_id, &name, &body).await)
                    .await?;
                println!("Saved template {name}");
            }
            TemplatesCommand::Delete { id } => {
                self.call(self.api.delete_template(&workspace_id, &id).await)
                    .await?;
                println!("Deleted template {id}");
            }
        }
        Ok(())
    }

    async fn automation(&self, command: AutomationCommand) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        let settings = match command {
            AutomationCommand::Show => self.call(self.api.automation(&workspace_id).await).await?,
            AutomationCommand::Set { toggles } => {
                let mut settings = self.call(self.api.automation(&workspace_id).await).await?;
                settings.toggles.extend(toggles);
                self.call(self.api.set_automation(&workspace_id, &settings).await)
                    .await?
            }
        };
        self.output(
            || html::automation_table(&settings),
            || {
                let mut table = TextTable::new(&["TOGGLE", "STATE"]);
                for (name, enabled) in &settings.toggles {
                    table.push_row(vec![
                        name.clone(),
                        if *enabled { "on" } else { "off" }.to_string(),
                    ]);
                }
                table_or(&table, "No automation toggles.")
            },
        );
        Ok(())
    }

    async fn alerts(&self) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        let mut alerts = self.call(self.api.alerts(&workspace_id).await).await?;
        tables::sort_alerts(&mut alerts);
        self.output(
            || html::alerts_list(&alerts),
            || {
                let mut table = TextTable::new(&["AT", "LEVEL", "MESSAGE"]);
                for alert in &alerts {
                    table.push_row(vec![
                        alert.at.clone().unwrap_or_default(),
                        alert.level.as_str().to_string(),
                        alert.message.clone(),
                    ]);
                }
                table_or(&table, "No alerts.")
            },
        );
        Ok(())
    }

    async fn billing(&self) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        let billing = self.call(self.api.billing(&workspace_id).await).await?;
        self.output(
            || html::billing_card(&billing),
            || {
                let limit = billing
                    .messages_limit
                    .map(|limit| limit.to_string())
                    .unwrap_or_else(|| "unlimited".to_string());
                let mut out = format!(
                    "plan: {}\nstatus: {}\nusage: {} / {}\n",
                    billing.plan,
                    billing.status.as_deref().unwrap_or("active"),
                    billing.messages_used,
                    limit
                );
                if let Some(renews_at) = billing.renews_at.as_deref() {
                    out.push_str(&format!("renews: {renews_at}\n"));
                }
                out
            },
        );
        Ok(())
    }

    async fn media(&self, command: MediaCommand) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        match command {
            MediaCommand::List => {
                let media = self.call(self.api.list_media(&workspace_id).await).await?;
                self.output(
                    || html::media_table(&media),
                    || {
                        let mut table = TextTable::new(&["ID", "FILE", "TYPE", "SIZE"]);
                        for item in &media {
                            table.push_row(vec![
                                item.id.clone(),
                                item.file_name.clone(),
                                item.mime_type.clone().unwrap_or_default(),
                                item.size.map(|size| size.to_string()).unwrap_or_default(),
                            ]);
                        }
                        table_or(&table, "No media uploaded.")
                    },
                );
            }
            MediaCommand::Upload { file } => {
                let item = self.call(self.api.upload_media(&workspace_id, &file).await).await?;
                println!("Uploaded {} ({})", item.file_name, item.id);
            }
        }
        Ok(())
    }

    async fn recipients(&self, command: RecipientsCommand) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        let RecipientsCommand::Import { file } = command;
        let response = self
            .call(self.api.import_recipients(&workspace_id, &file).await)
            .await?;
        println!(
            "Imported {} recipients ({} skipped)",
            response.imported, response.skipped
        );
        Ok(())
    }

    async fn schedules(&self, command: SchedulesCommand) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        match command {
            SchedulesCommand::List => {
                let schedules = self.call(self.api.list_schedules(&workspace_id).await).await?;
                self.output(
                    || html::schedules_table(&schedules),
                    || {
                        let mut table =
                            TextTable::new(&["ID", "SEND AT", "RECIPIENTS", "MESSAGES"]);
                        for schedule in &schedules {
                            table.push_row(vec![
                                schedule.id.clone().unwrap_or_default(),
                                format_send_at(&schedule.send_at),
                                schedule
                                    .recipients
                                    .map(|count| count.to_string())
                                    .unwrap_or_default(),
                                schedule.messages.len().to_string(),
                            ]);
                        }
                        table_or(&table, "No scheduled campaigns.")
                    },
                );
            }
            SchedulesCommand::Cancel { id } => {
                self.call(self.api.cancel_schedule(&workspace_id, &id).await)
                    .await?;
                println!("Cancelled schedule {id}");
            }
        }
        Ok(())
    }

    async fn chat(&self, command: ChatCommand) -> anyhow::Result<()> {
        let workspace_id = self.workspace()?;
        match command {
            ChatCommand::Show { contact } => {
                let mut chat = self.call(self.api.fetch_chat(&workspace_id, &contact).await).await?;
                tables::sort_chat(&mut chat.messages);
                self.output(
                    || html::chat_transcript(&contact, &chat.messages, chat.takeover),
                    || {
                        let mut out = String::new();
                        if chat.takeover {
                            out.push_str("(agent takeover active)\n");
                        }
                        for message in &chat.messages {
                            out.push_str(&text::chat_line(message));
                            out.push('\n');
                        }
                        if chat.messages.is_empty() {
                            out.push_str("No messages yet.\n");
                        }
                        out
                    },
                );
            }
            ChatCommand::Send { contact, body } => {
                self.call(self.api.send_chat_message(&workspace_id, &contact, &body).await)
                    .await?;
                println!("Sent");
            }
            ChatCommand::Takeover { contact, release } => {
                self.call(self.api.set_takeover(&workspace_id, &contact, !release).await)
                    .await?;
                if release {
                    println!("Released {contact} back to automation");
                } else {
                    println!("Took over conversation with {contact}");
                }
            }
        }
        Ok(())
    }

    async fn admin(&self, command: AdminCommand) -> anyhow::Result<()> {
        self.require_login()?;
        let user = self.call(self.api.me().await).await?;
        if !user.is_admin() {
            bail!("admin role required");
        }
        match command {
            AdminCommand::Workspaces => {
                let mut workspaces = self.call(self.api.admin_workspaces().await).await?;
                tables::sort_workspaces(&mut workspaces);
                self.output(
                    || html::admin_workspaces_table(&workspaces),
                    || {
                        let mut table = TextTable::new(&["ID", "NAME", "OWNER", "PLAN", "STATE"]);
                        for workspace in &workspaces {
                            table.push_row(vec![
                                workspace.id.clone(),
                                workspace.name.clone(),
                                workspace.owner_email.clone().unwrap_or_default(),
                                workspace.plan.clone().unwrap_or_default(),
                                suspended_label(workspace.suspended).to_string(),
                            ]);
                        }
                        table_or(&table, "No workspaces.")
                    },
                );
            }
            AdminCommand::SetPlan { id, plan } => {
                self.call(self.api.admin_set_plan(&id, &plan).await).await?;
                println!("Workspace {id} moved to plan {plan}");
            }
            AdminCommand::Suspend { id, lift } => {
                self.call(self.api.admin_suspend(&id, !lift).await).await?;
                println!("Workspace {id} {}", if lift { "reactivated" } else { "suspended" });
            }
        }
        Ok(())
    }
}

fn print_progress(event: &DashboardEvent) {
    if let DashboardEvent::Progress { .. } = event {
        if let Some(line) = text::describe_event(event) {
            eprintln!("{line}");
        }
    }
}

fn table_or(table: &TextTable, empty: &str) -> String {
    if table.is_empty() {
        format!("{empty}\n")
    } else {
        table.render()
    }
}

fn suspended_label(suspended: bool) -> &'static str {
    if suspended {
        "suspended"
    } else {
        "active"
    }
}

fn chat_key(message: &ChatMessage) -> String {
    if message.id.is_empty() {
        format!("{}|{}", message.at.as_deref().unwrap_or(""), message.body)
    } else {
        message.id.clone()
    }
}

fn read_json_file(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
