//! Extraction of the labelled sections from the model's free-text reply.
//!
//! The reply is expected to follow the format requested by
//! [`SYSTEM_PROMPT`](crate::constants::SYSTEM_PROMPT): a synthetic answer under
//! `**Réponse synthétique :**` and a bullet list under `**Règles utilisées :**`.
//! Models do not always comply, so each section is looked up independently and
//! a missing one falls back to a fixed placeholder instead of failing.

use serde::{Deserialize, Serialize};

pub const ANSWER_HEADER: &str = "**Réponse synthétique :**";
pub const RULES_HEADER: &str = "**Règles utilisées :**";

/// Any bold marker ends the current section, including headers we don't extract.
const SECTION_MARK: &str = "**";

pub const ANSWER_FALLBACK: &str = "Je n'ai pas pu générer de réponse synthétique.";
pub const RULES_FALLBACK: &str = "Aucune règle spécifiée.";

/// Structured reply returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub text: String,
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Answer,
    Rules,
}

impl SectionKind {
    pub fn header(self) -> &'static str {
        match self {
            SectionKind::Answer => ANSWER_HEADER,
            SectionKind::Rules => RULES_HEADER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section<'a> {
    Present(&'a str),
    Absent,
}

/// Finds the body of `kind` in `message`.
///
/// The body starts after the first occurrence of the header (leading whitespace
/// skipped) and stops at the next `**` or at the end of the text. The body keeps
/// its trailing whitespace; a blank body is reported as [`Section::Absent`].
pub fn find_section(message: &str, kind: SectionKind) -> Section<'_> {
    let header = kind.header();
    let Some(start) = message.find(header) else {
        return Section::Absent;
    };

    let rest = message[start + header.len()..].trim_start();
    let end = rest.find(SECTION_MARK).unwrap_or(rest.len());
    let body = &rest[..end];
    if body.trim().is_empty() {
        Section::Absent
    } else {
        Section::Present(body)
    }
}

/// Splits a rules body into individual rules, dropping `- ` bullets and blank lines.
pub fn split_rules(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| {
            let line = line.trim_start();
            line.strip_prefix("- ").unwrap_or(line).trim()
        })
        .filter(|rule| !rule.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses an assistant message into a [`ParsedResponse`]. Never fails.
pub fn parse_assistant_response(message: &str) -> ParsedResponse {
    let text = match find_section(message, SectionKind::Answer) {
        Section::Present(body) => body.trim().to_string(),
        Section::Absent => ANSWER_FALLBACK.to_string(),
    };

    let rules = match find_section(message, SectionKind::Rules) {
        Section::Present(body) => split_rules(body),
        Section::Absent => Vec::new(),
    };
    let rules = if rules.is_empty() {
        vec![RULES_FALLBACK.to_string()]
    } else {
        rules
    };

    ParsedResponse { text, rules }
}
