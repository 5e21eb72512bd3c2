//! Client side of the chat: an append-only conversation log and the controller
//! that sends questions to the gateway.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::constants::{GENERIC_ERROR_MESSAGE, NO_REPLY_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<String>>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            rules: None,
        }
    }

    pub fn assistant(text: impl Into<String>, rules: Option<Vec<String>>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            rules,
        }
    }
}

/// Reply body of `POST /api/ask`, as seen by the widget.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(default)]
    pub rules: Option<Vec<String>>,
}

struct ConversationInner {
    messages: Mutex<Vec<Message>>,
    changed: watch::Sender<usize>,
}

/// Ordered, append-only message log shared between the controller and its
/// in-flight replies. Every append bumps a watch channel carrying the new length.
#[derive(Clone)]
pub struct Conversation {
    inner: Arc<ConversationInner>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            inner: Arc::new(ConversationInner {
                messages: Mutex::new(Vec::new()),
                changed,
            }),
        }
    }

    fn messages(&self) -> MutexGuard<'_, Vec<Message>> {
        // Appends never leave the log half-written, so a poisoned lock is still usable.
        self.inner.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, message: Message) {
        let len = {
            let mut messages = self.messages();
            messages.push(message);
            messages.len()
        };
        self.inner.changed.send_replace(len);
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages().clone()
    }

    /// Messages appended at or after position `index`.
    pub fn since(&self, index: usize) -> Vec<Message> {
        self.messages().iter().skip(index).cloned().collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.inner.changed.subscribe()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("failed to reach the gateway: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode gateway reply: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Something that can answer a question on behalf of the widget.
pub trait AskClient: Send + Sync + 'static {
    /// `Ok(None)` means the gateway answered successfully but with an empty body.
    fn ask(&self, question: String) -> impl Future<Output = Result<Option<Answer>, AskError>> + Send;
}

/// Talks to a running gateway over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAskClient {
    http: Client,
    ask_url: String,
}

impl HttpAskClient {
    pub fn new(gateway_url: &str) -> Self {
        Self {
            http: Client::new(),
            ask_url: format!("{}/api/ask", gateway_url.trim_end_matches('/')),
        }
    }
}

impl AskClient for HttpAskClient {
    fn ask(&self, question: String) -> impl Future<Output = Result<Option<Answer>, AskError>> + Send {
        let http = self.http.clone();
        let ask_url = self.ask_url.clone();
        async move {
            let response = http
                .post(&ask_url)
                .json(&serde_json::json!({ "question": question }))
                .send()
                .await
                .map_err(AskError::Transport)?;

            let status = response.status();
            let body = response.text().await.map_err(AskError::Transport)?;
            if !status.is_success() {
                return Err(AskError::Status { status, body });
            }
            debug!(%body, "Gateway reply");

            if body.trim().is_empty() {
                return Ok(None);
            }
            serde_json::from_str::<Option<Answer>>(&body).map_err(AskError::Decode)
        }
    }
}

/// Drives one conversation: holds the input line and the log, and turns each
/// send into one request whose reply is appended when it resolves.
pub struct ChatController<C> {
    client: Arc<C>,
    conversation: Conversation,
    input: String,
}

impl<C: AskClient> ChatController<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            conversation: Conversation::new(),
            input: String::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Sends the current input. Blank input is ignored and left in place.
    ///
    /// Otherwise the user message is appended before this returns and the input
    /// is cleared; the returned task appends exactly one assistant message. Sends
    /// may overlap, in which case replies land in completion order.
    pub fn send(&mut self) -> Option<JoinHandle<()>> {
        if self.input.trim().is_empty() {
            return None;
        }

        let question = std::mem::take(&mut self.input);
        self.conversation.append(Message::user(question.clone()));

        let client = Arc::clone(&self.client);
        let conversation = self.conversation.clone();
        Some(tokio::spawn(async move {
            let reply = match client.ask(question).await {
                Ok(Some(answer)) => Message::assistant(answer.text, answer.rules),
                Ok(None) => Message::assistant(NO_REPLY_MESSAGE, None),
                Err(e) => {
                    error!("Ask request failed: {}", e);
                    Message::assistant(GENERIC_ERROR_MESSAGE, None)
                }
            };
            conversation.append(reply);
        }))
    }
}

/// Terminal rendering that follows the newest entry: each call prints only what
/// was appended since the previous one.
#[derive(Debug, Default)]
pub struct Transcript {
    rendered: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn render_message(message: &Message) -> Vec<String> {
        let mut lines = Vec::new();
        let prefix = match message.sender {
            Sender::User => "vous  > ",
            Sender::Assistant => "arbitre> ",
        };
        let mut text_lines = message.text.lines();
        lines.push(format!("{}{}", prefix, text_lines.next().unwrap_or_default()));
        for line in text_lines {
            lines.push(format!("{:width$}{}", "", line, width = prefix.len()));
        }

        if let Some(rules) = &message.rules {
            lines.push("         Règles utilisées :".to_string());
            for rule in rules {
                lines.push(format!("         - {}", rule));
            }
        }
        lines
    }

    pub fn render_new<W: Write>(&mut self, conversation: &Conversation, out: &mut W) -> io::Result<()> {
        let fresh = conversation.since(self.rendered);
        for message in &fresh {
            for line in Self::render_message(message) {
                writeln!(out, "{}", line)?;
            }
        }
        self.rendered += fresh.len();
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingClient {
        calls: AtomicUsize,
    }

    impl AskClient for CountingClient {
        fn ask(&self, _question: String) -> impl Future<Output = Result<Option<Answer>, AskError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(None))
        }
    }

    #[test]
    fn test_conversation_appends_in_order() {
        let conversation = Conversation::new();
        conversation.append(Message::user("Hello"));
        conversation.append(Message::assistant("Hi there!", Some(vec!["R1".into()])));

        let messages = conversation.snapshot();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].text, "Hello");
        assert_eq!(messages[1].sender, Sender::Assistant);
        assert_eq!(messages[1].rules, Some(vec!["R1".to_string()]));
    }

    #[test]
    fn test_conversation_since() {
        let conversation = Conversation::new();
        for text in ["a", "b", "c"] {
            conversation.append(Message::user(text));
        }
        let tail: Vec<_> = conversation.since(1).into_iter().map(|m| m.text).collect();
        assert_eq!(tail, vec!["b", "c"]);
        assert!(conversation.since(3).is_empty());
    }

    #[test]
    fn test_conversation_signals_changes() {
        let conversation = Conversation::new();
        let rx = conversation.subscribe();
        conversation.append(Message::user("a"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow(), 1);
    }

    #[tokio::test]
    async fn test_blank_input_is_not_sent() {
        let mut controller = ChatController::new(CountingClient::default());
        controller.set_input("   ");
        assert!(controller.send().is_none());
        assert!(controller.conversation().is_empty());
        assert_eq!(controller.input(), "   ");
        assert_eq!(controller.client.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_message_serializes_without_rules() {
        let json = serde_json::to_value(Message::user("Salut")).unwrap();
        assert_eq!(json, serde_json::json!({ "sender": "user", "text": "Salut" }));
    }

    #[test]
    fn test_render_message_with_rules() {
        let lines = Transcript::render_message(&Message::assistant(
            "Oui\nmais non",
            Some(vec!["R1".into(), "R2".into()]),
        ));
        assert_eq!(lines[0], "arbitre> Oui");
        assert_eq!(lines[1], "         mais non");
        assert_eq!(lines[2], "         Règles utilisées :");
        assert_eq!(lines[3], "         - R1");
        assert_eq!(lines[4], "         - R2");
    }

    #[test]
    fn test_transcript_renders_only_new_messages() {
        let conversation = Conversation::new();
        let mut transcript = Transcript::new();
        let mut out = Vec::new();

        conversation.append(Message::user("first"));
        transcript.render_new(&conversation, &mut out).unwrap();
        conversation.append(Message::assistant("second", None));
        transcript.render_new(&conversation, &mut out).unwrap();
        transcript.render_new(&conversation, &mut out).unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert_eq!(printed, "vous  > first\narbitre> second\n");
        assert_eq!(transcript.rendered(), 2);
    }
}
