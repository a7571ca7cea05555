//! Session state carried across reconnects

/// What a RESUME needs after the socket drops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub session_id: Option<String>,
    /// Gateway URL to dial when resuming
    pub resume_url: Option<String>,
    /// Last dispatch sequence seen
    pub sequence: Option<u64>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a RESUME can be attempted
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    /// Record the session announced by READY
    pub fn establish(&mut self, session_id: String, resume_url: Option<String>) {
        self.session_id = Some(session_id);
        if resume_url.is_some() {
            self.resume_url = resume_url;
        }
    }

    /// Record a dispatch sequence number
    ///
    /// The sequence only moves forward; replayed or stale numbers are ignored.
    pub fn observe(&mut self, sequence: u64) {
        if self.sequence.is_none_or(|current| sequence > current) {
            self.sequence = Some(sequence);
        }
    }

    /// Forget the sequence before a fresh IDENTIFY
    pub fn clear_sequence(&mut self) {
        self.sequence = None;
    }

    /// Forget everything; the next connection must IDENTIFY
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
