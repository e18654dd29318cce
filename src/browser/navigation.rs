use parking_lot::Mutex;
use url::Url;

/// Top-level navigation (`window.location.href = ...`).
pub trait Navigator: Send + Sync {
    fn assign(&self, location: &str);
}

/// Embedded frame whose address the shell controls.
pub trait Frame: Send + Sync {
    fn load(&self, url: &Url);
}

/// Navigator that records every requested location.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.visits.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn assign(&self, location: &str) {
        self.visits.lock().push(location.to_string());
    }
}

/// Frame that records every address it was pointed at.
#[derive(Debug, Default)]
pub struct RecordingFrame {
    loads: Mutex<Vec<Url>>,
}

impl RecordingFrame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn loads(&self) -> Vec<Url> {
        self.loads.lock().clone()
    }
}

impl Frame for RecordingFrame {
    fn load(&self, url: &Url) {
        self.loads.lock().push(url.clone());
    }
}
