//! Command router — the bridge between a conversation channel and the
//! engine.
//!
//! Maps incoming events (slash commands, button presses, free text) to
//! engine operations and renders the replies. Every external failure
//! degrades to a plain-text message for the user; only the in-flight
//! session is lost, never the process.

use crate::machine::{ceiling_prompt, Step, TrackerMachine, Turn};
use crate::registry::MeasurementRegistry;
use crate::sink::RecordSink;
use std::sync::Arc;
use tallygram_config::TrackingMode;
use tallygram_core::channel::{Button, Channel, ChannelEvent, EventKind, Keyboard};
use tallygram_core::error::{Error, LedgerError, SessionError};
use tallygram_core::measurement::{legacy_fields, FixedField, MeasurementKind, UserId};
use tracing::{info, warn};

const GREETING: &str = "Hi! I record your daily measurements into your own spreadsheet.\n\n\
Connect a sheet with /setsheet, then use /track to start logging.";

const HELP: &str = "Commands:\n\
/setsheet <link> — connect a Google Sheet\n\
/newsheet [title] — create and connect a fresh sheet\n\
/track — start recording a new entry\n\
/status — show the connected sheet\n\
/addmeasure — define a custom measurement\n\
/measures — list your measurements\n\
/delmeasure <id> — delete a measurement\n\
/inittemplate — write the header row to the connected sheet\n\
/help — this message";

const NO_BINDING: &str =
    "No sheet connected yet. Send /setsheet <link> to connect one, or /newsheet to create one.";

const NO_MEASUREMENTS: &str =
    "You have no measurements defined yet. Use /addmeasure to create one, then /track again.";

const STORE_FAILURE: &str = "I couldn't reach the database right now. Please try again later.";

const LEDGER_FAILURE: &str =
    "Writing to your sheet failed. Your answers were not saved — please run /track again.";

const SAVED: &str = "Saved! Want to record another entry?";

const IDLE_HINT: &str = "I'm not asking anything right now. Use /track to start an entry.";

/// Extract a spreadsheet id from a Google Sheets URL, or accept a bare id.
pub fn extract_sheet_id(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(idx) = input.find("/d/") {
        let rest = &input[idx + 3..];
        let end = rest.find('/').unwrap_or(rest.len());
        let id = &rest[..end];
        return (!id.is_empty()).then(|| id.to_string());
    }
    if !input.is_empty() && !input.contains('/') && !input.contains(' ') {
        return Some(input.to_string());
    }
    None
}

pub struct Router {
    channel: Arc<dyn Channel>,
    machine: TrackerMachine,
    registry: MeasurementRegistry,
    bindings: Arc<tallygram_store::BindingCache>,
    sink: RecordSink,
    mode: TrackingMode,
    fixed_fields: Vec<FixedField>,
}

impl Router {
    pub fn new(
        channel: Arc<dyn Channel>,
        bindings: Arc<tallygram_store::BindingCache>,
        registry: MeasurementRegistry,
        sink: RecordSink,
        mode: TrackingMode,
    ) -> Self {
        Self {
            channel,
            machine: TrackerMachine::new(),
            registry,
            bindings,
            sink,
            mode,
            fixed_fields: legacy_fields(),
        }
    }

    /// Override the legacy questionnaire.
    pub fn with_fixed_fields(mut self, fields: Vec<FixedField>) -> Self {
        self.fixed_fields = fields;
        self
    }

    fn main_keyboard() -> Keyboard {
        Keyboard::new(vec![
            vec![
                Button::new("📊 Record entry", "track_data"),
                Button::new("📈 Status", "check_status"),
            ],
            vec![
                Button::new("❓ Help", "show_help"),
                Button::new("🔗 Change sheet", "change_sheet"),
            ],
        ])
    }

    fn track_keyboard() -> Keyboard {
        Keyboard::new(vec![
            vec![Button::new("📊 Record entry", "track_data")],
            vec![Button::new("🔙 Back", "main_menu")],
        ])
    }

    /// Handle one channel event end to end.
    pub async fn handle_event(&self, event: ChannelEvent) -> Result<(), Error> {
        let user_id = event.user_id.clone();
        match event.kind {
            EventKind::Action(token) => self.handle_action(&user_id, &token, event.message_ref).await,
            EventKind::Text(text) => self.handle_text(&user_id, &text).await,
        }
    }

    async fn handle_action(
        &self,
        user_id: &UserId,
        token: &str,
        message_ref: Option<String>,
    ) -> Result<(), Error> {
        info!(user_id = %user_id, action = %token, "Button pressed");
        match token {
            "track_data" => self.cmd_track(user_id).await,
            "check_status" => self.cmd_status(user_id, message_ref).await,
            "show_help" => {
                self.reply(user_id, message_ref, HELP, Some(&Self::main_keyboard()))
                    .await
            }
            "change_sheet" => {
                self.reply(
                    user_id,
                    message_ref,
                    "Send the new sheet link with /setsheet <link>.",
                    Some(&Self::main_keyboard()),
                )
                .await
            }
            "main_menu" => {
                self.reply(user_id, message_ref, GREETING, Some(&Self::main_keyboard()))
                    .await
            }
            other => {
                warn!(user_id = %user_id, action = %other, "Unknown action token");
                Ok(())
            }
        }
    }

    async fn handle_text(&self, user_id: &UserId, text: &str) -> Result<(), Error> {
        let trimmed = text.trim();
        if let Some(stripped) = trimmed.strip_prefix('/') {
            let mut parts = stripped.splitn(2, char::is_whitespace);
            let command = parts
                .next()
                .unwrap_or_default()
                .split('@')
                .next()
                .unwrap_or_default();
            let rest = parts.next().unwrap_or("").trim();
            return self.dispatch_command(user_id, command, rest).await;
        }

        if self.machine.is_active(user_id).await {
            // Answers are passed through untrimmed; the machine records the
            // raw text and validation does its own trimming.
            return self.handle_answer(user_id, text).await;
        }

        self.send(user_id, IDLE_HINT, Some(&Self::main_keyboard()))
            .await
    }

    async fn dispatch_command(
        &self,
        user_id: &UserId,
        command: &str,
        rest: &str,
    ) -> Result<(), Error> {
        info!(user_id = %user_id, command = %command, "Command received");
        match command {
            "start" => {
                self.send(user_id, GREETING, Some(&Self::main_keyboard()))
                    .await
            }
            "help" => self.send(user_id, HELP, None).await,
            "status" => self.cmd_status(user_id, None).await,
            "setsheet" => self.cmd_setsheet(user_id, rest).await,
            "newsheet" => self.cmd_newsheet(user_id, rest).await,
            "track" => self.cmd_track(user_id).await,
            "addmeasure" => {
                let turn = self.machine.begin_define(user_id).await;
                self.apply_turn(user_id, turn).await
            }
            "measures" => self.cmd_measures(user_id).await,
            "delmeasure" => self.cmd_delmeasure(user_id, rest).await,
            "inittemplate" => self.cmd_init_template(user_id).await,
            _ => self.send(user_id, HELP, None).await,
        }
    }

    async fn cmd_status(&self, user_id: &UserId, message_ref: Option<String>) -> Result<(), Error> {
        let text = match self.bindings.get(user_id).await {
            Some(ledger_id) => format!(
                "✅ Sheet connected\n📊 Sheet id: {ledger_id}\n\nUse /track to record an entry."
            ),
            None => format!("❌ {NO_BINDING}"),
        };
        self.reply(user_id, message_ref, &text, Some(&Self::main_keyboard()))
            .await
    }

    async fn cmd_setsheet(&self, user_id: &UserId, rest: &str) -> Result<(), Error> {
        let Some(sheet_id) = extract_sheet_id(rest) else {
            return self
                .send(user_id, "Usage: /setsheet <Google Sheets link>", None)
                .await;
        };

        match self.bindings.set(user_id, &sheet_id).await {
            Ok(()) => {
                info!(user_id = %user_id, ledger_id = %sheet_id, "Sheet bound");
                self.send(
                    user_id,
                    "✅ Sheet connected! You can record entries now.",
                    Some(&Self::track_keyboard()),
                )
                .await
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Binding write failed");
                self.send(user_id, STORE_FAILURE, None).await
            }
        }
    }

    async fn cmd_newsheet(&self, user_id: &UserId, rest: &str) -> Result<(), Error> {
        let title = if rest.is_empty() { "Tallygram" } else { rest };
        let columns = match self.template_columns(user_id).await {
            Ok(columns) => columns,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Template column lookup failed");
                return self.send(user_id, STORE_FAILURE, None).await;
            }
        };

        let ledger_id = match self.sink.create_with_template(title, &columns).await {
            Ok(id) => id,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Sheet creation failed");
                return self.send(user_id, LEDGER_FAILURE, None).await;
            }
        };

        match self.bindings.set(user_id, &ledger_id).await {
            Ok(()) => {
                self.send(
                    user_id,
                    &format!("✅ Created and connected sheet {ledger_id}."),
                    Some(&Self::track_keyboard()),
                )
                .await
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Binding write failed");
                self.send(user_id, STORE_FAILURE, None).await
            }
        }
    }

    async fn cmd_init_template(&self, user_id: &UserId) -> Result<(), Error> {
        let Some(ledger_id) = self.bindings.get(user_id).await else {
            return self.send(user_id, NO_BINDING, None).await;
        };
        let columns = match self.template_columns(user_id).await {
            Ok(columns) => columns,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Template column lookup failed");
                return self.send(user_id, STORE_FAILURE, None).await;
            }
        };

        match self.sink.init_template(&ledger_id, &columns).await {
            Ok(count) => {
                self.send(
                    user_id,
                    &format!("✅ Header written ({count} columns)."),
                    None,
                )
                .await
            }
            Err(LedgerError::NotEmpty(_)) => {
                self.send(
                    user_id,
                    "Your sheet already has content — the header template only applies to a fresh sheet.",
                    None,
                )
                .await
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Template init failed");
                self.send(user_id, LEDGER_FAILURE, None).await
            }
        }
    }

    /// The header names for the current mode, timestamp column excluded.
    async fn template_columns(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<String>, tallygram_core::error::StoreError> {
        match self.mode {
            TrackingMode::Legacy => Ok(self
                .fixed_fields
                .iter()
                .map(|f| f.name.clone())
                .collect()),
            TrackingMode::Dynamic => Ok(self
                .registry
                .list(user_id)
                .await?
                .iter()
                .map(|m| m.name.clone())
                .collect()),
        }
    }

    async fn cmd_track(&self, user_id: &UserId) -> Result<(), Error> {
        // Guard: a session cannot start without a resolved binding.
        if self.bindings.get(user_id).await.is_none() {
            info!(user_id = %user_id, "Track refused: {}", SessionError::NoBinding(user_id.0.clone()));
            return self.send(user_id, NO_BINDING, None).await;
        }

        let (plan, dynamic): (Vec<Step>, bool) = match self.mode {
            TrackingMode::Legacy => (self.fixed_fields.iter().map(Step::from).collect(), false),
            TrackingMode::Dynamic => {
                let measurements = match self.registry.list(user_id).await {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Registry read failed");
                        return self.send(user_id, STORE_FAILURE, None).await;
                    }
                };
                if measurements.is_empty() {
                    info!(user_id = %user_id, "Track refused: {}", SessionError::NoMeasurements(user_id.0.clone()));
                    return self.send(user_id, NO_MEASUREMENTS, None).await;
                }
                (measurements.iter().map(Step::from).collect(), true)
            }
        };

        let turn = self.machine.start(user_id, plan, dynamic).await;
        self.apply_turn(user_id, turn).await
    }

    async fn cmd_measures(&self, user_id: &UserId) -> Result<(), Error> {
        let measurements = match self.registry.list(user_id).await {
            Ok(m) => m,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Registry read failed");
                return self.send(user_id, STORE_FAILURE, None).await;
            }
        };

        if measurements.is_empty() {
            return self.send(user_id, NO_MEASUREMENTS, None).await;
        }

        let mut text = String::from("Your measurements:\n");
        for m in &measurements {
            match m.kind {
                MeasurementKind::Numeric => {
                    text.push_str(&format!("{}. {} ({}-{})\n", m.id, m.name, m.min, m.max))
                }
                MeasurementKind::Text => text.push_str(&format!("{}. {} (text)\n", m.id, m.name)),
            }
        }
        text.push_str("\nDelete one with /delmeasure <id>.");
        self.send(user_id, &text, None).await
    }

    async fn cmd_delmeasure(&self, user_id: &UserId, rest: &str) -> Result<(), Error> {
        let Ok(id) = rest.parse::<i64>() else {
            return self.send(user_id, "Usage: /delmeasure <id>", None).await;
        };

        match self.registry.remove(user_id, id).await {
            Ok(true) => self.send(user_id, "✅ Measurement deleted.", None).await,
            Ok(false) => self.send(user_id, "No measurement with that id.", None).await,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Registry remove failed");
                self.send(user_id, STORE_FAILURE, None).await
            }
        }
    }

    async fn handle_answer(&self, user_id: &UserId, text: &str) -> Result<(), Error> {
        let turn = match self.machine.answer(user_id, text).await {
            Ok(turn) => turn,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Answer without session");
                return self
                    .send(user_id, IDLE_HINT, Some(&Self::main_keyboard()))
                    .await;
            }
        };
        self.apply_turn(user_id, turn).await
    }

    async fn apply_turn(&self, user_id: &UserId, turn: Turn) -> Result<(), Error> {
        match turn {
            Turn::Prompt(prompt) => self.send(user_id, &prompt, None).await,
            Turn::Rejected { notice, prompt } => {
                self.send(user_id, &format!("{notice}\n{prompt}"), None).await
            }
            Turn::CeilingPrompt { name } => {
                self.send(user_id, &ceiling_prompt(&name), None).await
            }
            Turn::Completed { answers } => self.finish_record(user_id, answers).await,
            Turn::Defined { name, kind, max } => {
                self.finish_define(user_id, &name, kind, max).await
            }
        }
    }

    /// A completed dialogue: assemble and append. The session is already
    /// cleared — a failed write is reported once, never retried.
    async fn finish_record(
        &self,
        user_id: &UserId,
        answers: Vec<(String, String)>,
    ) -> Result<(), Error> {
        let Some(ledger_id) = self.bindings.get(user_id).await else {
            // Binding vanished mid-session; surfaced like any other failure.
            return self.send(user_id, NO_BINDING, None).await;
        };

        let result = match self.mode {
            TrackingMode::Legacy => {
                self.sink
                    .submit_legacy(&ledger_id, &self.fixed_fields, &answers)
                    .await
            }
            TrackingMode::Dynamic => self.sink.submit_dynamic(&ledger_id, &answers).await,
        };

        match result {
            Ok(row) => {
                info!(user_id = %user_id, cells = row.len(), "Entry recorded");
                self.send(
                    user_id,
                    &format!("✅ {SAVED}"),
                    Some(&Self::track_keyboard()),
                )
                .await
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Entry write failed");
                self.send(user_id, &format!("❌ {LEDGER_FAILURE}"), None).await
            }
        }
    }

    /// A completed measurement-creation sub-dialogue: persist the definition
    /// and extend the ledger header.
    async fn finish_define(
        &self,
        user_id: &UserId,
        name: &str,
        kind: MeasurementKind,
        max: i64,
    ) -> Result<(), Error> {
        let measurement = match self.registry.add(user_id, name, kind, max).await {
            Ok(m) => m,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Measurement persist failed");
                return self.send(user_id, STORE_FAILURE, None).await;
            }
        };

        if let Some(ledger_id) = self.bindings.get(user_id).await {
            if let Err(e) = self.sink.add_header_column(&ledger_id, &measurement.name).await {
                warn!(user_id = %user_id, error = %e, "Header column add failed");
                return self
                    .send(
                        user_id,
                        "Measurement saved, but I couldn't extend your sheet's header.",
                        None,
                    )
                    .await;
            }
        }

        self.send(
            user_id,
            &format!("✅ Measurement '{}' saved.", measurement.name),
            None,
        )
        .await
    }

    async fn send(
        &self,
        user_id: &UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), Error> {
        self.channel.send(user_id, text, keyboard).await?;
        Ok(())
    }

    async fn reply(
        &self,
        user_id: &UserId,
        message_ref: Option<String>,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), Error> {
        match message_ref {
            Some(ref mref) => self.channel.edit(user_id, mref, text, keyboard).await?,
            None => self.channel.send(user_id, text, keyboard).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tallygram_core::error::ChannelError;
    use tallygram_core::ledger::Ledger;
    use tallygram_core::store::RecordStore;
    use tallygram_ledger::InMemoryLedger;
    use tallygram_store::{BindingCache, InMemoryStore};

    /// Captures every outgoing message for assertions.
    struct CaptureChannel {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl CaptureChannel {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> String {
            self.sent
                .lock()
                .unwrap()
                .last()
                .map(|(_, text)| text.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl Channel for CaptureChannel {
        fn name(&self) -> &str {
            "capture"
        }

        async fn start(
            &self,
        ) -> Result<
            tokio::sync::mpsc::Receiver<Result<ChannelEvent, ChannelError>>,
            ChannelError,
        > {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }

        async fn send(
            &self,
            user_id: &UserId,
            text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((user_id.0.clone(), text.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        router: Router,
        channel: Arc<CaptureChannel>,
        ledger: Arc<InMemoryLedger>,
        store: Arc<InMemoryStore>,
    }

    async fn fixture(mode: TrackingMode) -> Fixture {
        let channel = Arc::new(CaptureChannel::new());
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let bindings = Arc::new(BindingCache::load(store.clone()).await.unwrap());
        let router = Router::new(
            channel.clone(),
            bindings,
            MeasurementRegistry::new(store.clone()),
            RecordSink::new(ledger.clone()),
            mode,
        );
        Fixture {
            router,
            channel,
            ledger,
            store,
        }
    }

    fn text_event(user: &str, text: &str) -> ChannelEvent {
        ChannelEvent {
            user_id: user.into(),
            sender_name: None,
            kind: EventKind::Text(text.into()),
            message_ref: None,
        }
    }

    fn action_event(user: &str, token: &str) -> ChannelEvent {
        ChannelEvent {
            user_id: user.into(),
            sender_name: None,
            kind: EventKind::Action(token.into()),
            message_ref: None,
        }
    }

    async fn say(f: &Fixture, user: &str, text: &str) {
        f.router.handle_event(text_event(user, text)).await.unwrap();
    }

    #[test]
    fn sheet_id_extraction() {
        assert_eq!(
            extract_sheet_id("https://docs.google.com/spreadsheets/d/abc123XYZ/edit#gid=0"),
            Some("abc123XYZ".into())
        );
        assert_eq!(
            extract_sheet_id("https://docs.google.com/spreadsheets/d/abc123XYZ"),
            Some("abc123XYZ".into())
        );
        assert_eq!(extract_sheet_id("abc123XYZ"), Some("abc123XYZ".into()));
        assert_eq!(extract_sheet_id(""), None);
        assert_eq!(extract_sheet_id("not a url"), None);
        assert_eq!(extract_sheet_id("https://example.com/other"), None);
    }

    #[tokio::test]
    async fn track_without_binding_never_starts() {
        let f = fixture(TrackingMode::Legacy).await;
        say(&f, "42", "/track").await;

        assert!(f.channel.last().contains("No sheet connected"));
        assert!(!f.router.machine.is_active(&"42".into()).await);
    }

    #[tokio::test]
    async fn legacy_flow_appends_full_row() {
        let f = fixture(TrackingMode::Legacy).await;
        let id = f.ledger.create("Journal").await.unwrap();
        say(&f, "42", &format!("/setsheet {id}")).await;

        say(&f, "42", "/track").await;
        assert!(f.channel.last().contains("Fatigue"));

        for answer in ["5", "7", "ok", "3", "4", "none", "-"] {
            say(&f, "42", answer).await;
        }

        assert!(f.channel.last().contains("Saved"));
        let rows = f.ledger.rows(&id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1..], &["5", "7", "ok", "3", "4", "none", "-"]);
    }

    #[tokio::test]
    async fn dynamic_flow_reconciles_header() {
        let f = fixture(TrackingMode::Dynamic).await;
        let id = f.ledger.create("Journal").await.unwrap();
        f.ledger
            .seed(&id, vec![vec!["Время".into(), "Energy Level".into()]])
            .await;
        say(&f, "7", &format!("/setsheet {id}")).await;

        f.store
            .add_measurement(&"7".into(), "Energy", MeasurementKind::Numeric, 0, 10)
            .await
            .unwrap();

        say(&f, "7", "/track").await;
        assert!(f.channel.last().contains("Energy (0-10)?"));

        say(&f, "7", "7").await;
        assert!(f.channel.last().contains("Saved"));

        let rows = f.ledger.rows(&id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "7");
        assert_eq!(rows[1].len(), 2);
    }

    #[tokio::test]
    async fn dynamic_track_with_empty_registry_refused() {
        let f = fixture(TrackingMode::Dynamic).await;
        let id = f.ledger.create("Journal").await.unwrap();
        say(&f, "7", &format!("/setsheet {id}")).await;

        say(&f, "7", "/track").await;
        assert!(f.channel.last().contains("no measurements"));
        assert!(!f.router.machine.is_active(&"7".into()).await);
    }

    #[tokio::test]
    async fn out_of_range_answer_reprompts_without_recording() {
        let f = fixture(TrackingMode::Legacy).await;
        let id = f.ledger.create("Journal").await.unwrap();
        say(&f, "42", &format!("/setsheet {id}")).await;
        say(&f, "42", "/track").await;

        say(&f, "42", "15").await;
        let last = f.channel.last();
        assert!(last.contains("between 0 and 10"));
        assert!(last.contains("Fatigue"));

        let session = f.router.machine.snapshot(&"42".into()).await.unwrap();
        assert!(session.answers.is_empty());
    }

    #[tokio::test]
    async fn append_failure_reports_and_clears_session() {
        let f = fixture(TrackingMode::Legacy).await;
        let id = f.ledger.create("Journal").await.unwrap();
        say(&f, "42", &format!("/setsheet {id}")).await;
        say(&f, "42", "/track").await;

        for answer in ["5", "7", "ok", "3", "4", "none"] {
            say(&f, "42", answer).await;
        }

        f.ledger.set_failing(true);
        say(&f, "42", "all good").await;

        assert!(f.channel.last().contains("failed"));
        // Session cleared; answers discarded, not retried
        assert!(!f.router.machine.is_active(&"42".into()).await);

        f.ledger.set_failing(false);
        say(&f, "42", "/track").await;
        let session = f.router.machine.snapshot(&"42".into()).await.unwrap();
        assert!(session.answers.is_empty());
    }

    #[tokio::test]
    async fn restart_mid_session_discards_answers() {
        let f = fixture(TrackingMode::Legacy).await;
        let id = f.ledger.create("Journal").await.unwrap();
        say(&f, "42", &format!("/setsheet {id}")).await;
        say(&f, "42", "/track").await;
        say(&f, "42", "5").await;
        say(&f, "42", "7").await;

        say(&f, "42", "/track").await;
        let session = f.router.machine.snapshot(&"42".into()).await.unwrap();
        assert!(session.answers.is_empty());
        assert_eq!(session.cursor(), Some(0));
    }

    #[tokio::test]
    async fn users_do_not_interfere() {
        let f = fixture(TrackingMode::Legacy).await;
        let id_a = f.ledger.create("A").await.unwrap();
        let id_b = f.ledger.create("B").await.unwrap();
        say(&f, "alice", &format!("/setsheet {id_a}")).await;
        say(&f, "bob", &format!("/setsheet {id_b}")).await;

        say(&f, "alice", "/track").await;
        say(&f, "alice", "5").await;

        say(&f, "bob", "/track").await;

        let alice = f.router.machine.snapshot(&"alice".into()).await.unwrap();
        assert_eq!(alice.answers.len(), 1);
        let bob = f.router.machine.snapshot(&"bob".into()).await.unwrap();
        assert!(bob.answers.is_empty());
    }

    #[tokio::test]
    async fn addmeasure_persists_and_extends_header() {
        let f = fixture(TrackingMode::Dynamic).await;
        let id = f.ledger.create("Journal").await.unwrap();
        f.ledger.seed(&id, vec![vec!["Time".into()]]).await;
        say(&f, "7", &format!("/setsheet {id}")).await;

        say(&f, "7", "/addmeasure").await;
        assert!(f.channel.last().contains("called"));
        say(&f, "7", "Energy").await;
        assert!(f.channel.last().contains("ceiling"));
        say(&f, "7", "10").await;
        assert!(f.channel.last().contains("saved"));

        let measurements = f.store.list_measurements(&"7".into()).await.unwrap();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].name, "Energy");
        assert_eq!(measurements[0].max, 10);

        let rows = f.ledger.rows(&id).await.unwrap();
        assert_eq!(rows[0], vec!["Time", "Energy"]);
    }

    #[tokio::test]
    async fn newsheet_creates_binds_and_templates() {
        let f = fixture(TrackingMode::Legacy).await;
        say(&f, "42", "/newsheet Wellbeing").await;

        assert!(f.channel.last().contains("Created and connected"));
        say(&f, "42", "/track").await;
        assert!(f.channel.last().contains("Fatigue"));
    }

    #[tokio::test]
    async fn buttons_mirror_commands() {
        let f = fixture(TrackingMode::Legacy).await;
        f.router
            .handle_event(action_event("42", "check_status"))
            .await
            .unwrap();
        assert!(f.channel.last().contains("No sheet connected"));

        let id = f.ledger.create("Journal").await.unwrap();
        say(&f, "42", &format!("/setsheet {id}")).await;
        f.router
            .handle_event(action_event("42", "track_data"))
            .await
            .unwrap();
        assert!(f.channel.last().contains("Fatigue"));
    }

    #[tokio::test]
    async fn free_text_while_idle_gets_hint() {
        let f = fixture(TrackingMode::Legacy).await;
        say(&f, "42", "hello there").await;
        assert!(f.channel.last().contains("/track"));
    }

    #[tokio::test]
    async fn measures_and_delmeasure() {
        let f = fixture(TrackingMode::Dynamic).await;
        let m = f
            .store
            .add_measurement(&"7".into(), "Energy", MeasurementKind::Numeric, 0, 10)
            .await
            .unwrap();

        say(&f, "7", "/measures").await;
        assert!(f.channel.last().contains("Energy (0-10)"));

        say(&f, "7", &format!("/delmeasure {}", m.id)).await;
        assert!(f.channel.last().contains("deleted"));
        assert!(f.store.list_measurements(&"7".into()).await.unwrap().is_empty());
    }
}
