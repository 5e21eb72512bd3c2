// Constants, loaded from the environment where a deployment may want to override them.

use std::env;

/// Sampling temperature sent with every completion request.
pub const TEMPERATURE: f32 = 0.5;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:3000";

/// Fixed messages returned to (or shown by) the chat widget.
pub const INVALID_QUESTION_MESSAGE: &str = "Question invalide.";
pub const GENERIC_ERROR_MESSAGE: &str = "Une erreur est survenue.";
pub const NO_REPLY_MESSAGE: &str = "Aucune réponse reçue.";

/// Instruction sent as the system turn. The section headers must stay in sync with `parser`.
pub const SYSTEM_PROMPT: &str = r#"
Tu es un arbitre expert de Magic: The Gathering. Lorsque tu réponds, suis ce format:

**Réponse synthétique :**
[Ta réponse ici]

**Règles utilisées :**
- [Règle 1]
- [Règle 2]

** Cartes concernées (si cartes sont mentionnées) :**
- [Nom de la carte 1]
- [Nom de la carte 2]

Ne fournis aucune explication supplémentaire en dehors de ce format.
"#;

lazy_static::lazy_static! {
    pub static ref OPENAI_API_KEY: String = env::var("OPENAI_API_KEY").unwrap_or_default();
    pub static ref OPENAI_BASE_URL: String = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    pub static ref ARBITER_MODEL: String = env::var("ARBITER_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
}
