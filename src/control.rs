use std::io::BufRead;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::dispatcher::{AlertDispatcher, DispatchOutcome};
use crate::scheduler::MonitorScheduler;
use crate::state::{RuntimeFlags, TargetStateStore};
use crate::utils::error::AppError;

const COMMAND_HELP: [(&str, &str); 9] = [
    ("commands", "show this list"),
    ("start_alerts", "enable alerts and run the initial check"),
    ("check_stock", "check every product now without alerting"),
    ("test_webhook", "send a test message to every group"),
    ("status", "show alert flags and the last known stock status"),
    ("list", "list all groups and products"),
    ("send_alert_list", "send each group the list of products it watches"),
    ("stop_oos / start_oos", "mute or unmute out-of-stock alerts"),
    ("quit", "stop monitoring and exit"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    StartAlerts,
    CheckStock,
    TestWebhook,
    Status,
    List,
    SendAlertList,
    StopOutOfStock,
    StartOutOfStock,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let input = line.trim().to_lowercase();
        let command = match input.as_str() {
            "" => return None,
            "commands" | "help" => Command::Help,
            "start_alerts" => Command::StartAlerts,
            "check_stock" => Command::CheckStock,
            "test_webhook" => Command::TestWebhook,
            "status" => Command::Status,
            "list" => Command::List,
            "send_alert_list" => Command::SendAlertList,
            "stop_oos" => Command::StopOutOfStock,
            "start_oos" => Command::StartOutOfStock,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(line.trim().to_string()),
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub flow: Flow,
}

impl Reply {
    fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            flow: Flow::Continue,
        }
    }

    fn line(line: impl Into<String>) -> Self {
        Self::lines(vec![line.into()])
    }
}

/// Operator command loop running alongside the scheduler.
pub struct ControlSurface {
    scheduler: Arc<MonitorScheduler>,
    dispatcher: Arc<AlertDispatcher>,
    states: Arc<TargetStateStore>,
    flags: Arc<RuntimeFlags>,
}

impl ControlSurface {
    pub fn new(
        scheduler: Arc<MonitorScheduler>,
        dispatcher: Arc<AlertDispatcher>,
        states: Arc<TargetStateStore>,
        flags: Arc<RuntimeFlags>,
    ) -> Self {
        Self {
            scheduler,
            dispatcher,
            states,
            flags,
        }
    }

    /// Read commands from `commands` until `quit` or the channel closes.
    ///
    /// Failed deliveries and checks are reported in the reply and the loop
    /// continues. Only a failed write to `out` ends it early.
    pub async fn run<W>(
        &self,
        mut commands: mpsc::Receiver<String>,
        out: &mut W,
    ) -> Result<(), AppError>
    where
        W: AsyncWrite + Unpin,
    {
        write_lines(out, &self.banner()).await?;

        while let Some(line) = commands.recv().await {
            let Some(command) = Command::parse(&line) else {
                continue;
            };
            tracing::debug!("Received command: {:?}", command);

            let reply = self.execute(&command).await;
            write_lines(out, &reply.lines).await?;
            if reply.flow == Flow::Quit {
                return Ok(());
            }
        }

        tracing::info!("Command input closed, stopping");
        Ok(())
    }

    pub async fn execute(&self, command: &Command) -> Reply {
        match command {
            Command::Help => Reply::lines(help_lines()),
            Command::StartAlerts => self.start_alerts().await,
            Command::CheckStock => self.check_stock().await,
            Command::TestWebhook => self.test_webhook().await,
            Command::Status => self.status().await,
            Command::List => self.list(),
            Command::SendAlertList => self.send_alert_list().await,
            Command::StopOutOfStock => self.set_suppression(true),
            Command::StartOutOfStock => self.set_suppression(false),
            Command::Quit => Reply {
                lines: vec!["👋 Stopping monitor".to_string()],
                flow: Flow::Quit,
            },
            Command::Unknown(input) => Reply::line(format!(
                "❓ Unknown command '{}'. Type 'commands' to see what is available.",
                input
            )),
        }
    }

    fn banner(&self) -> Vec<String> {
        let groups = self.scheduler.groups();
        let targets: usize = groups.iter().map(|g| g.targets.len()).sum();

        let mut lines = vec![
            format!(
                "🔔 Restock Watcher watching {} products in {} groups",
                targets,
                groups.len()
            ),
            "Alerts are off until you run 'start_alerts'.".to_string(),
        ];
        lines.extend(help_lines());
        lines
    }

    async fn start_alerts(&self) -> Reply {
        match self.scheduler.enable_and_seed().await {
            Some(summary) => Reply::lines(vec![
                "✅ Alerts enabled".to_string(),
                format!("Initial check: {}", summary),
            ]),
            None => {
                tracing::warn!("start_alerts ignored, alerts already enabled");
                Reply::line("⚠️ Alerts are already enabled")
            }
        }
    }

    async fn check_stock(&self) -> Reply {
        let checks = self.scheduler.check_all().await;
        let lines = checks
            .iter()
            .map(|check| {
                let mut line = format!(
                    "{} [{}] {}: {}",
                    check.report.availability.emoji(),
                    check.group,
                    check.target.name,
                    check.report.availability
                );
                if let Some(price) = &check.report.price {
                    line.push_str(&format!(" ({})", price));
                }
                line
            })
            .collect();
        Reply::lines(lines)
    }

    async fn test_webhook(&self) -> Reply {
        let mut lines = Vec::new();
        for group in self.scheduler.groups() {
            let outcome = self.dispatcher.send_test(group).await;
            lines.push(outcome_line(&group.name, "test message", &outcome));
        }
        Reply::lines(lines)
    }

    async fn send_alert_list(&self) -> Reply {
        let mut lines = Vec::new();
        for group in self.scheduler.groups() {
            let outcome = self.dispatcher.send_summary(group).await;
            lines.push(outcome_line(&group.name, "product list", &outcome));
        }
        Reply::lines(lines)
    }

    async fn status(&self) -> Reply {
        let on_off = |enabled: bool| if enabled { "on" } else { "off" };
        let mut lines = vec![
            format!("Alerts: {}", on_off(self.flags.alerts_enabled())),
            format!(
                "Out-of-stock alerts: {}",
                if self.flags.suppress_out_of_stock() { "muted" } else { "on" }
            ),
            format!("Scheduler: {}", self.scheduler.phase().await),
        ];

        let snapshot = self.states.snapshot().await;
        for group in self.scheduler.groups() {
            lines.push(format!("[{}]", group.name));
            for target in &group.targets {
                let state = snapshot.get(&target.url).copied().unwrap_or_default();
                lines.push(format!("  {}: {}", target.name, state));
            }
        }

        Reply::lines(lines)
    }

    fn list(&self) -> Reply {
        let mut lines = Vec::new();
        for group in self.scheduler.groups() {
            lines.push(format!("[{}] {} products", group.name, group.targets.len()));
            for target in &group.targets {
                lines.push(format!("  {} - {}", target.name, target.url));
            }
        }
        Reply::lines(lines)
    }

    fn set_suppression(&self, suppress: bool) -> Reply {
        let changed = self.flags.set_suppress_out_of_stock(suppress);
        match (changed, suppress) {
            (true, true) => {
                tracing::info!("Out-of-stock alerts muted");
                Reply::line("🔕 Out-of-stock alerts muted")
            }
            (true, false) => {
                tracing::info!("Out-of-stock alerts unmuted");
                Reply::line("🔔 Out-of-stock alerts unmuted")
            }
            (false, true) => {
                tracing::warn!("stop_oos ignored, out-of-stock alerts already muted");
                Reply::line("⚠️ Out-of-stock alerts are already muted")
            }
            (false, false) => {
                tracing::warn!("start_oos ignored, out-of-stock alerts already on");
                Reply::line("⚠️ Out-of-stock alerts are already on")
            }
        }
    }
}

/// Forward input lines to `commands` until EOF, a read error, or the receiver
/// going away. Bytes that are not UTF-8 are replaced rather than ending input.
pub fn forward_lines<R: BufRead>(mut input: R, commands: mpsc::Sender<String>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Failed to read command input: {}", e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        if commands.blocking_send(line).is_err() {
            break;
        }
    }
}

fn help_lines() -> Vec<String> {
    let mut lines = vec!["Commands:".to_string()];
    lines.extend(
        COMMAND_HELP
            .iter()
            .map(|(name, description)| format!("  {:<22} {}", name, description)),
    );
    lines
}

fn outcome_line(group: &str, what: &str, outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Sent => format!("✅ [{}] {} sent", group, what),
        DispatchOutcome::Skipped => format!("⏭️ [{}] {} skipped", group, what),
        DispatchOutcome::Failed { reason } => {
            format!("❌ [{}] {} failed: {}", group, what, reason)
        }
    }
}

async fn write_lines<W>(out: &mut W, lines: &[String]) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    for line in lines {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await?;
    Ok(())
}
