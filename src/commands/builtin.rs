//! The built-in German command set.
//!
//! Registration order matters: the dispatcher picks the first command whose
//! keywords match, so "guten tag" greets rather than telling the date.

use chrono::{Datelike, Local, NaiveDate, NaiveTime};

use super::{ActionRunner, Command, CommandError, CommandType};
use crate::config::CommandsConfig;

// ---------------------------------------------------------------------------
// Keyword tables
// ---------------------------------------------------------------------------

static GREETING_KEYWORDS: &[&str] = &["hallo", "guten", "morgen", "tag", "abend"];
static CALCULATOR_KEYWORDS: &[&str] = &["taschenrechner", "rechner", "calc"];
static EDITOR_KEYWORDS: &[&str] = &["editor", "notepad", "notizen"];
static EXPLORER_KEYWORDS: &[&str] = &["explorer", "dateien", "ordner", "datei"];
static BROWSER_KEYWORDS: &[&str] = &["firefox", "browser"];
static CHATGPT_KEYWORDS: &[&str] = &["chatgpt", "chat", "gpt"];
static TIME_KEYWORDS: &[&str] = &["uhrzeit", "spät"];
static DATE_KEYWORDS: &[&str] = &["datum", "heute", "welcher tag"];
static HELP_KEYWORDS: &[&str] = &["hilfe", "was kannst", "befehle"];
static CANCEL_KEYWORDS: &[&str] = &[
    "abbrechen", "stopp", "stop", "vergiss", "egal", "nichts", "danke",
];

const CHATGPT_URL: &str = "https://chat.openai.com";

static WEEKDAYS: [&str; 7] = [
    "Montag",
    "Dienstag",
    "Mittwoch",
    "Donnerstag",
    "Freitag",
    "Samstag",
    "Sonntag",
];

static MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

// ---------------------------------------------------------------------------
// builtin_commands
// ---------------------------------------------------------------------------

/// All built-ins in dispatch order, minus the groups disabled in `config`.
pub fn builtin_commands(config: &CommandsConfig) -> Vec<Box<dyn Command>> {
    let all: Vec<Box<dyn Command>> = vec![
        Box::new(ReplyCommand {
            name: "greeting",
            kind: CommandType::Greeting,
            keywords: GREETING_KEYWORDS,
            reply: "Hallo! Wie kann ich helfen?",
        }),
        Box::new(LaunchCommand {
            name: "calculator",
            kind: CommandType::System,
            keywords: CALCULATOR_KEYWORDS,
            program: config.calculator.clone(),
            response: "Öffne den Taschenrechner",
        }),
        Box::new(LaunchCommand {
            name: "editor",
            kind: CommandType::System,
            keywords: EDITOR_KEYWORDS,
            program: config.editor.clone(),
            response: "Öffne Notepad",
        }),
        Box::new(LaunchCommand {
            name: "explorer",
            kind: CommandType::System,
            keywords: EXPLORER_KEYWORDS,
            program: config.file_manager.clone(),
            response: "Öffne den Explorer",
        }),
        Box::new(LaunchCommand {
            name: "browser",
            kind: CommandType::Web,
            keywords: BROWSER_KEYWORDS,
            program: config.browser.clone(),
            response: "Öffne Firefox",
        }),
        Box::new(ChatGptCommand),
        Box::new(TimeCommand),
        Box::new(DateCommand),
        Box::new(ReplyCommand {
            name: "help",
            kind: CommandType::Help,
            keywords: HELP_KEYWORDS,
            reply: "Ich kann Programme öffnen, Webseiten starten, die Uhrzeit sagen und vieles mehr. Frag einfach!",
        }),
        Box::new(CancelCommand),
    ];

    all.into_iter()
        .filter(|c| match c.kind() {
            CommandType::System => config.enable_system_commands,
            CommandType::Web => config.enable_web_commands,
            _ => true,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

/// Answers with a fixed sentence.
struct ReplyCommand {
    name: &'static str,
    kind: CommandType,
    keywords: &'static [&'static str],
    reply: &'static str,
}

impl Command for ReplyCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> CommandType {
        self.kind
    }

    fn keywords(&self) -> &[&'static str] {
        self.keywords
    }

    fn execute(&self, _text: &str, _actions: &dyn ActionRunner) -> Result<String, CommandError> {
        Ok(self.reply.to_string())
    }
}

/// Starts a desktop program.
struct LaunchCommand {
    name: &'static str,
    kind: CommandType,
    keywords: &'static [&'static str],
    program: String,
    response: &'static str,
}

impl Command for LaunchCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> CommandType {
        self.kind
    }

    fn keywords(&self) -> &[&'static str] {
        self.keywords
    }

    fn execute(&self, _text: &str, actions: &dyn ActionRunner) -> Result<String, CommandError> {
        actions.launch(&self.program)?;
        Ok(self.response.to_string())
    }
}

struct ChatGptCommand;

impl Command for ChatGptCommand {
    fn name(&self) -> &str {
        "chatgpt"
    }

    fn kind(&self) -> CommandType {
        CommandType::Web
    }

    fn keywords(&self) -> &[&'static str] {
        CHATGPT_KEYWORDS
    }

    /// "chatgpt", or "chat" and "gpt" as separate words.
    fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        lower.contains("chatgpt") || (lower.contains("chat") && lower.contains("gpt"))
    }

    fn execute(&self, _text: &str, actions: &dyn ActionRunner) -> Result<String, CommandError> {
        actions.open_url(CHATGPT_URL)?;
        Ok("Öffne ChatGPT".to_string())
    }
}

struct TimeCommand;

impl Command for TimeCommand {
    fn name(&self) -> &str {
        "time"
    }

    fn kind(&self) -> CommandType {
        CommandType::Utility
    }

    fn keywords(&self) -> &[&'static str] {
        TIME_KEYWORDS
    }

    fn execute(&self, _text: &str, _actions: &dyn ActionRunner) -> Result<String, CommandError> {
        Ok(spoken_time(Local::now().time()))
    }
}

struct DateCommand;

impl Command for DateCommand {
    fn name(&self) -> &str {
        "date"
    }

    fn kind(&self) -> CommandType {
        CommandType::Utility
    }

    fn keywords(&self) -> &[&'static str] {
        DATE_KEYWORDS
    }

    fn execute(&self, _text: &str, _actions: &dyn ActionRunner) -> Result<String, CommandError> {
        Ok(spoken_date(Local::now().date_naive()))
    }
}

/// Acknowledges "never mind" and thanks; the wording depends on the trigger.
struct CancelCommand;

impl Command for CancelCommand {
    fn name(&self) -> &str {
        "cancel"
    }

    fn kind(&self) -> CommandType {
        CommandType::Control
    }

    fn keywords(&self) -> &[&'static str] {
        CANCEL_KEYWORDS
    }

    fn execute(&self, text: &str, _actions: &dyn ActionRunner) -> Result<String, CommandError> {
        let lower = text.to_lowercase();
        let reply = if lower.contains("danke") {
            "Gern geschehen!"
        } else if lower.contains("abbrechen") || lower.contains("stopp") {
            "Okay, abgebrochen"
        } else {
            "Alles klar"
        };
        Ok(reply.to_string())
    }
}

// ---------------------------------------------------------------------------
// German phrasing
// ---------------------------------------------------------------------------

/// "Es ist 09:05 Uhr"
pub fn spoken_time(time: NaiveTime) -> String {
    format!("Es ist {} Uhr", time.format("%H:%M"))
}

/// "Heute ist Montag, der 19. Oktober 2026"
pub fn spoken_date(date: NaiveDate) -> String {
    format!(
        "Heute ist {}, der {}. {} {}",
        WEEKDAYS[date.weekday().num_days_from_monday() as usize],
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
