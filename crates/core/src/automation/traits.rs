//! The capability set the reservation flow drives a page through.

use std::time::Duration;

use async_trait::async_trait;

use super::error::AutomationError;

/// Opaque handle to an element found on the current page load.
///
/// Handles are only meaningful to the implementation that issued them and
/// do not survive a reload or navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How JavaScript dialogs (`alert`, `confirm`, `prompt`) are answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DialogPolicy {
    /// Press "OK".
    Accept,
    /// Press "Cancel". Unattended browsers behave this way.
    #[default]
    Dismiss,
}

/// Named keys understood by [`PageAutomation::press_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
    Escape,
    Backspace,
}

impl Key {
    pub fn name(self) -> &'static str {
        match self {
            Key::Tab => "Tab",
            Key::Enter => "Enter",
            Key::Escape => "Escape",
            Key::Backspace => "Backspace",
        }
    }
}

/// A live page that can be filled in, clicked and inspected.
///
/// Selectors are CSS selectors; a trailing `:has-text('…')` keeps only
/// elements whose text contains the quoted string. Missing or unresponsive
/// elements surface as [`AutomationError`]s and never panic.
#[async_trait]
pub trait PageAutomation: Send + Sync {
    /// Implementation name, for logs.
    fn name(&self) -> &str;

    /// Focus the first matching input and set its value.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), AutomationError>;

    /// Choose the option with `value` in the first matching select control.
    async fn select(&self, selector: &str, value: &str) -> Result<(), AutomationError>;

    /// Click the first matching element.
    async fn click(&self, selector: &str) -> Result<(), AutomationError>;

    /// Focus the first matching element and press `key` on it.
    async fn press(&self, selector: &str, key: Key) -> Result<(), AutomationError>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize, AutomationError>;

    /// All elements matching `selector`, in document order.
    async fn locate_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AutomationError>;

    /// Descendants of `parent` matching `selector`, in document order.
    async fn locate_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, AutomationError>;

    /// Text content of an element.
    async fn text_content(&self, element: &ElementHandle) -> Result<String, AutomationError>;

    /// Click a previously located element.
    async fn click_element(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    /// Wait until nothing matching `selector` is visible, or fail with
    /// [`AutomationError::Timeout`] once `timeout` elapses.
    async fn wait_for_hidden(&self, selector: &str, timeout: Duration)
        -> Result<(), AutomationError>;

    /// URL of the current document.
    async fn current_url(&self) -> Result<String, AutomationError>;

    /// Type `text` into whatever currently has focus, one keystroke per character.
    async fn type_keystrokes(&self, text: &str) -> Result<(), AutomationError>;

    /// Press a key on whatever currently has focus.
    async fn press_key(&self, key: Key) -> Result<(), AutomationError>;

    /// Reload the current document and wait for it to load.
    async fn reload(&self) -> Result<(), AutomationError>;

    /// Open `url` and wait for it to load.
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// Decide how dialogs opened from now on are answered.
    async fn set_dialog_policy(&self, policy: DialogPolicy) -> Result<(), AutomationError>;

    /// Release the session. Further calls fail with [`AutomationError::SessionClosed`].
    async fn close(&self) -> Result<(), AutomationError>;
}
