//! The assistant persona

pub const DEFAULT_PERSONA_NAME: &str = "Benjamin Franklin";

/// Greeting seeded as the first message of every conversation
pub const DEFAULT_GREETING: &str = "Greetings! I am Benjamin Franklin, your financial advisor from the $100 bill. An investment in knowledge pays the best interest - how may I help grow your wealth today?";

/// Who the assistant is
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Persona {
    /// Display name used in notifications and indicators
    pub name: String,

    /// First assistant message of the session
    pub greeting: String,

    /// Optional persona prompt forwarded with each completion request
    pub prompt: Option<String>,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: DEFAULT_PERSONA_NAME.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            prompt: None,
        }
    }
}

impl Persona {
    pub fn new(name: impl Into<String>, greeting: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            greeting: greeting.into(),
            prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}
