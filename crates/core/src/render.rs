//! Display collaborator.

/// Accepts finished text for output. Fire-and-forget: nothing comes back.
pub trait Render: Send + Sync {
    fn render(&self, text: &str);
}
