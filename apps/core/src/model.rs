use std::fmt;
use std::sync::Arc;

/// Opaque payload attached to a candidate. Only consulted when the
/// display title is empty.
pub trait Payload: Send + Sync {
    fn serialize(&self) -> String;
}

impl Payload for String {
    fn serialize(&self) -> String {
        self.clone()
    }
}

/// One selectable menu entry. Identity (for de-duplication and
/// equality) is the computed title, never the payload pointer.
#[derive(Clone)]
pub struct Candidate {
    title: String,
    payload: Option<Arc<dyn Payload>>,
    computed_title: String,
    normalized_title: String,
}

impl Candidate {
    pub fn new(title: &str) -> Self {
        Self::build(title.to_string(), None)
    }

    pub fn with_payload(title: &str, payload: Arc<dyn Payload>) -> Self {
        Self::build(title.to_string(), Some(payload))
    }

    fn build(title: String, payload: Option<Arc<dyn Payload>>) -> Self {
        let computed_title = if title.is_empty() {
            payload.as_ref().map(|p| p.serialize()).unwrap_or_default()
        } else {
            title.clone()
        };
        let normalized_title = normalize_for_search(&computed_title);
        Self {
            title,
            payload,
            computed_title,
            normalized_title,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn payload(&self) -> Option<&Arc<dyn Payload>> {
        self.payload.as_ref()
    }

    pub fn computed_title(&self) -> &str {
        &self.computed_title
    }

    pub fn normalized_title(&self) -> &str {
        &self.normalized_title
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("title", &self.computed_title)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.computed_title == other.computed_title
    }
}

impl Eq for Candidate {}

pub fn normalize_for_search(input: &str) -> String {
    input.chars().flat_map(|c| c.to_lowercase()).collect()
}
