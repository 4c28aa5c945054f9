//! Mock page for testing the reservation flow.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::automation::{AutomationError, DialogPolicy, ElementHandle, Key, PageAutomation};
use crate::reservation::selectors;

/// URL after the reserve button sends a visitor to the login page.
pub const LOGIN_URL: &str = "https://etk.srail.kr/cmc/01/selectLoginForm.do?pageId=TK0701000000";
/// URL of the guest reservation form.
pub const RESERVATION_FORM_URL: &str =
    "https://etk.srail.kr/hpg/hra/02/selectReservationForm.do?pageId=TK0101030000";
/// URL after a successful member login.
pub const MEMBER_CONFIRM_URL: &str =
    "https://etk.srail.kr/hpg/hra/02/confirmReservationInfo.do?pageId=TK0101030000";

/// One cell of a scripted results row.
#[derive(Debug, Clone, Default)]
pub struct MockCell {
    /// Text of the cell's `em` element, if it has one.
    pub text: Option<String>,
    pub sold_out: bool,
    /// Whether the cell holds a reserve button.
    pub reservable: bool,
}

/// A scripted results row.
#[derive(Debug, Clone, Default)]
pub struct MockRow {
    pub cells: Vec<MockCell>,
}

/// How the queue gate behaves on a page load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GateBehavior {
    #[default]
    Absent,
    /// Shown, then hidden after the given time.
    ClearsAfter(Duration),
    /// Shown and never hidden.
    Stuck,
}

/// A recorded page operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCall {
    Fill(String, String),
    Select(String, String),
    Click(String),
    Press(String, Key),
    Count(String),
    LocateAll(String),
    ClickElement(String),
    WaitForHidden(String),
    TypeKeystrokes(String),
    PressKey(Key),
    Reload,
    Navigate(String),
    SetDialogPolicy(DialogPolicy),
    Close,
}

#[derive(Debug)]
struct MockPageState {
    /// Results per page load; the last one repeats.
    loads: Vec<Vec<MockRow>>,
    /// Gate behaviour per page load; the last one repeats.
    gates: Vec<GateBehavior>,
    load_index: Option<usize>,
    /// Bumped on every load so older handles go stale.
    generation: u64,
    gate_cleared: bool,
    url: String,
    login_accepted: bool,
    logged_in: bool,
    change_later_prompt: bool,
    dialog_policy: DialogPolicy,
    navigation_error: Option<AutomationError>,
    failures: HashMap<String, AutomationError>,
    calls: Vec<PageCall>,
    reload_count: usize,
    close_count: usize,
    closed: bool,
}

/// Mock implementation of the PageAutomation trait.
///
/// Provides controllable behavior for testing:
/// - Scripted result tables per page load
/// - Queue gate that is absent, clears, or never clears
/// - Accepted or rejected member login
/// - Failures injected per selector
/// - Recorded calls, reloads and closes
///
/// Page loads are counted from the first `navigate` or `reload`; before
/// either, the first scripted load is shown.
///
/// # Example
///
/// ```rust,ignore
/// use railbook_core::testing::{fixtures, MockPage};
///
/// let page = MockPage::new();
/// page.push_results(vec![fixtures::row("10:37", "12:07")]).await;
///
/// // Run the orchestrator against it...
///
/// assert_eq!(page.reload_count().await, 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockPage {
    state: Arc<RwLock<MockPageState>>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    /// Create a new mock page with no results and no gate.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockPageState {
                loads: Vec::new(),
                gates: Vec::new(),
                load_index: None,
                generation: 0,
                gate_cleared: false,
                url: "about:blank".to_string(),
                login_accepted: true,
                logged_in: false,
                change_later_prompt: false,
                dialog_policy: DialogPolicy::Dismiss,
                navigation_error: None,
                failures: HashMap::new(),
                calls: Vec::new(),
                reload_count: 0,
                close_count: 0,
                closed: false,
            })),
        }
    }

    /// Add the results table shown on the next page load.
    pub async fn push_results(&self, rows: Vec<MockRow>) {
        self.state.write().await.loads.push(rows);
    }

    /// Use the same gate behaviour on every load.
    pub async fn set_gate(&self, gate: GateBehavior) {
        self.state.write().await.gates = vec![gate];
    }

    /// Gate behaviour per page load; the last entry repeats.
    pub async fn set_gate_sequence(&self, gates: Vec<GateBehavior>) {
        self.state.write().await.gates = gates;
    }

    /// Whether member logins succeed (default: true).
    pub async fn set_login_accepted(&self, accepted: bool) {
        self.state.write().await.login_accepted = accepted;
    }

    /// Show the one-time "change password later" prompt after login.
    pub async fn set_change_later_prompt(&self, shown: bool) {
        self.state.write().await.change_later_prompt = shown;
    }

    /// Make `navigate` fail with this error.
    pub async fn set_navigation_error(&self, error: AutomationError) {
        self.state.write().await.navigation_error = Some(error);
    }

    /// Make every operation on `selector` fail with this error.
    pub async fn set_failure(&self, selector: &str, error: AutomationError) {
        self.state
            .write()
            .await
            .failures
            .insert(selector.to_string(), error);
    }

    /// Remove an injected failure.
    pub async fn clear_failure(&self, selector: &str) {
        self.state.write().await.failures.remove(selector);
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<PageCall> {
        self.state.read().await.calls.clone()
    }

    /// Get the number of reloads performed.
    pub async fn reload_count(&self) -> usize {
        self.state.read().await.reload_count
    }

    /// Get the number of close calls.
    pub async fn close_count(&self) -> usize {
        self.state.read().await.close_count
    }

    /// Current URL.
    pub async fn url(&self) -> String {
        self.state.read().await.url.clone()
    }

    /// Current dialog policy.
    pub async fn dialog_policy(&self) -> DialogPolicy {
        self.state.read().await.dialog_policy
    }
}

impl MockPageState {
    fn check(&self, selector: &str) -> Result<(), AutomationError> {
        if self.closed {
            return Err(AutomationError::SessionClosed);
        }
        match self.failures.get(selector) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn current_index(&self) -> usize {
        self.load_index.unwrap_or(0)
    }

    fn rows(&self) -> &[MockRow] {
        if self.loads.is_empty() {
            return &[];
        }
        let index = self.current_index().min(self.loads.len() - 1);
        &self.loads[index]
    }

    fn gate(&self) -> GateBehavior {
        if self.gates.is_empty() {
            return GateBehavior::Absent;
        }
        self.gates[self.current_index().min(self.gates.len() - 1)]
    }

    fn gate_visible(&self) -> bool {
        self.gate() != GateBehavior::Absent && !self.gate_cleared
    }

    fn next_load(&mut self) {
        self.load_index = Some(self.load_index.map_or(0, |i| i + 1));
        self.generation += 1;
        self.gate_cleared = false;
    }

    fn handle(&self, parts: &[String]) -> ElementHandle {
        ElementHandle::new(format!("{}/{}", self.generation, parts.join("/")))
    }

    /// Split a handle into its path, rejecting handles from earlier loads.
    fn resolve(&self, handle: &ElementHandle) -> Result<Vec<String>, AutomationError> {
        let stale = || AutomationError::StaleElement {
            handle: handle.to_string(),
        };
        let (generation, path) = handle.id().split_once('/').ok_or_else(stale)?;
        if generation.parse::<u64>().ok() != Some(self.generation) {
            return Err(stale());
        }
        Ok(path.split('/').map(str::to_string).collect())
    }

    fn cell(&self, row: &str, cell: &str) -> Option<&MockCell> {
        let row: usize = row.parse().ok()?;
        let cell: usize = cell.parse().ok()?;
        self.rows().get(row)?.cells.get(cell)
    }
}

#[async_trait]
impl PageAutomation for MockPage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check(selector)?;
        state
            .calls
            .push(PageCall::Fill(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn select(&self, selector: &str, value: &str) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check(selector)?;
        state
            .calls
            .push(PageCall::Select(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check(selector)?;
        state.calls.push(PageCall::Click(selector.to_string()));

        // The guest route asks for confirmation; a dismissed dialog keeps
        // the visitor on the login page.
        if selector == selectors::GUEST_ROUTE
            && state.url.contains(selectors::LOGIN_PAGE_MARKER)
            && state.dialog_policy == DialogPolicy::Accept
        {
            state.url = RESERVATION_FORM_URL.to_string();
        }
        if selector == selectors::CHANGE_LATER {
            state.change_later_prompt = false;
        }
        Ok(())
    }

    async fn press(&self, selector: &str, key: Key) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check(selector)?;
        state.calls.push(PageCall::Press(selector.to_string(), key));

        let is_login_submit = key == Key::Enter
            && crate::request::LoginKind::ALL
                .iter()
                .any(|kind| selectors::login_form(*kind).password == selector);
        if is_login_submit {
            if state.login_accepted {
                state.logged_in = true;
                state.url = MEMBER_CONFIRM_URL.to_string();
            } else {
                state.url = LOGIN_URL.to_string();
            }
        }
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize, AutomationError> {
        let mut state = self.state.write().await;
        state.check(selector)?;
        state.calls.push(PageCall::Count(selector.to_string()));

        let count = match selector {
            selectors::GATE => usize::from(state.gate_visible()),
            selectors::CHANGE_LATER => usize::from(state.logged_in && state.change_later_prompt),
            selectors::RESULT_ROWS => state.rows().len(),
            _ => 0,
        };
        Ok(count)
    }

    async fn locate_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AutomationError> {
        let mut state = self.state.write().await;
        state.check(selector)?;
        state.calls.push(PageCall::LocateAll(selector.to_string()));

        if selector != selectors::RESULT_ROWS {
            return Ok(Vec::new());
        }
        Ok((0..state.rows().len())
            .map(|i| state.handle(&["row".to_string(), i.to_string()]))
            .collect())
    }

    async fn locate_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, AutomationError> {
        let state = self.state.read().await;
        state.check(selector)?;
        let path = state.resolve(parent)?;

        let handles = match (path.as_slice(), selector) {
            ([kind, row], selectors::ROW_CELLS) if kind == "row" => {
                let cells = row
                    .parse::<usize>()
                    .ok()
                    .and_then(|r| state.rows().get(r))
                    .map_or(0, |r| r.cells.len());
                (0..cells)
                    .map(|c| state.handle(&["cell".to_string(), row.clone(), c.to_string()]))
                    .collect()
            }
            ([kind, row, cell], _) if kind == "cell" => {
                let Some(mock) = state.cell(row, cell) else {
                    return Ok(Vec::new());
                };
                let child = match selector {
                    selectors::CELL_TIME if mock.text.is_some() => Some("em"),
                    selectors::SOLD_OUT if mock.sold_out => Some("sold"),
                    selectors::RESERVE_BUTTON if mock.reservable && !mock.sold_out => {
                        Some("reserve")
                    }
                    _ => None,
                };
                child
                    .map(|c| state.handle(&[c.to_string(), row.clone(), cell.clone()]))
                    .into_iter()
                    .collect()
            }
            _ => Vec::new(),
        };
        Ok(handles)
    }

    async fn text_content(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        let state = self.state.read().await;
        state.check("")?;
        match state.resolve(element)?.as_slice() {
            [kind, row, cell] if kind == "em" => Ok(state
                .cell(row, cell)
                .and_then(|c| c.text.clone())
                .unwrap_or_default()),
            _ => Ok(String::new()),
        }
    }

    async fn click_element(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check("")?;
        let path = state.resolve(element)?;
        state.calls.push(PageCall::ClickElement(element.to_string()));

        if path.first().map(String::as_str) == Some("reserve") {
            state.url = LOGIN_URL.to_string();
        }
        Ok(())
    }

    async fn wait_for_hidden(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        let gate = {
            let mut state = self.state.write().await;
            state.check(selector)?;
            state.calls.push(PageCall::WaitForHidden(selector.to_string()));
            if selector == selectors::GATE && state.gate_visible() {
                state.gate()
            } else {
                GateBehavior::Absent
            }
        };

        match gate {
            GateBehavior::Absent => Ok(()),
            GateBehavior::ClearsAfter(after) if after <= timeout => {
                tokio::time::sleep(after).await;
                self.state.write().await.gate_cleared = true;
                Ok(())
            }
            _ => {
                tokio::time::sleep(timeout).await;
                Err(AutomationError::timeout(
                    format!("waiting for {selector} to disappear"),
                    timeout,
                ))
            }
        }
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        let state = self.state.read().await;
        state.check("")?;
        Ok(state.url.clone())
    }

    async fn type_keystrokes(&self, text: &str) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check("")?;
        state.calls.push(PageCall::TypeKeystrokes(text.to_string()));
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check("")?;
        state.calls.push(PageCall::PressKey(key));
        Ok(())
    }

    async fn reload(&self) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check("")?;
        state.calls.push(PageCall::Reload);
        state.reload_count += 1;
        state.next_load();
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check("")?;
        state.calls.push(PageCall::Navigate(url.to_string()));
        if let Some(error) = state.navigation_error.clone() {
            return Err(error);
        }
        state.url = url.to_string();
        state.next_load();
        Ok(())
    }

    async fn set_dialog_policy(&self, policy: DialogPolicy) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.check("")?;
        state.calls.push(PageCall::SetDialogPolicy(policy));
        state.dialog_policy = policy;
        Ok(())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        let mut state = self.state.write().await;
        state.calls.push(PageCall::Close);
        state.close_count += 1;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_handles_go_stale_after_reload() {
        let page = MockPage::new();
        page.push_results(vec![fixtures::row("10:37", "12:07")]).await;

        let rows = page.locate_all(selectors::RESULT_ROWS).await.unwrap();
        assert_eq!(rows.len(), 1);
        page.reload().await.unwrap();

        let result = page.locate_within(&rows[0], selectors::ROW_CELLS).await;
        assert!(matches!(result, Err(AutomationError::StaleElement { .. })));
    }

    #[tokio::test]
    async fn test_loads_advance_and_last_repeats() {
        let page = MockPage::new();
        page.push_results(vec![]).await;
        page.push_results(vec![fixtures::row("10:37", "12:07")]).await;

        page.navigate("https://etk.srail.kr").await.unwrap();
        assert_eq!(page.count(selectors::RESULT_ROWS).await.unwrap(), 0);
        page.reload().await.unwrap();
        assert_eq!(page.count(selectors::RESULT_ROWS).await.unwrap(), 1);
        page.reload().await.unwrap();
        assert_eq!(page.count(selectors::RESULT_ROWS).await.unwrap(), 1);
        assert_eq!(page.reload_count().await, 2);
    }

    #[tokio::test]
    async fn test_cell_text() {
        let page = MockPage::new();
        page.push_results(vec![fixtures::row("10:37", "12:07")]).await;
        let rows = page.locate_all(selectors::RESULT_ROWS).await.unwrap();
        let cells = page
            .locate_within(&rows[0], selectors::ROW_CELLS)
            .await
            .unwrap();
        assert_eq!(cells.len(), 7);
        let ems = page
            .locate_within(&cells[selectors::DEPARTURE_CELL], selectors::CELL_TIME)
            .await
            .unwrap();
        assert_eq!(page.text_content(&ems[0]).await.unwrap(), "10:37");
    }

    #[tokio::test]
    async fn test_dismissed_dialog_keeps_login_page() {
        let page = MockPage::new();
        page.state.write().await.url = LOGIN_URL.to_string();
        page.click(selectors::GUEST_ROUTE).await.unwrap();
        assert_eq!(page.url().await, LOGIN_URL);

        page.set_dialog_policy(DialogPolicy::Accept).await.unwrap();
        page.click(selectors::GUEST_ROUTE).await.unwrap();
        assert_eq!(page.url().await, RESERVATION_FORM_URL);
    }

    #[tokio::test]
    async fn test_closed_page_rejects_calls() {
        let page = MockPage::new();
        page.close().await.unwrap();
        let result = page.click(selectors::SEARCH_BUTTON).await;
        assert!(matches!(result, Err(AutomationError::SessionClosed)));
    }
}
