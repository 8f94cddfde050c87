/// GoEmotions label names, indexed by class id (27 emotions + neutral).
pub const GO_EMOTIONS_LABELS: [&str; 28] = [
    "admiration",
    "amusement",
    "anger",
    "annoyance",
    "approval",
    "caring",
    "confusion",
    "curiosity",
    "desire",
    "disappointment",
    "disapproval",
    "disgust",
    "embarrassment",
    "excitement",
    "fear",
    "gratitude",
    "grief",
    "joy",
    "love",
    "nervousness",
    "optimism",
    "pride",
    "realization",
    "relief",
    "remorse",
    "sadness",
    "surprise",
    "neutral",
];

/// Maps class ids to label names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    #[must_use]
    pub fn go_emotions() -> Self {
        Self::new(GO_EMOTIONS_LABELS.iter().map(|s| (*s).to_string()).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label name for a class id; unknown ids render as `label_<id>`.
    #[must_use]
    pub fn name(&self, id: usize) -> String {
        self.names.get(id).cloned().unwrap_or_else(|| format!("label_{id}"))
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::go_emotions()
    }
}
