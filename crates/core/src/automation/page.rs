//! [`PageAutomation`] over a Chrome DevTools connection.
//!
//! DOM work is done by short page scripts evaluated with `Runtime.evaluate`.
//! Located elements are parked in a page-side registry (`window.__railbook`)
//! and referred to by id, so a reload naturally invalidates every handle.
//! Keyboard input goes through `Input.dispatchKeyEvent` so the page sees
//! real keystrokes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Child;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cdp::{CdpClient, CdpEvent};
use super::error::AutomationError;
use super::launcher::LaunchedBrowser;
use super::selector::{js_string, TextSelector};
use super::traits::{DialogPolicy, ElementHandle, Key, PageAutomation};
use crate::config::BrowserConfig;

/// Page-side element registry, created on first use after every load.
const REGISTRY: &str = "(window.__railbook ??= { seq: 0, els: new Map() })";

/// Poll interval for [`PageAutomation::wait_for_hidden`].
const HIDDEN_POLL: Duration = Duration::from_millis(250);

/// A Chrome page driven over DevTools.
pub struct CdpPage {
    client: Arc<CdpClient>,
    accept_dialogs: Arc<AtomicBool>,
    dialog_task: JoinHandle<()>,
    navigation_timeout: Duration,
    owns_target: bool,
    process: Mutex<Option<Child>>,
    closed: AtomicBool,
}

impl CdpPage {
    /// Connect to a launched (or attached) browser's page target.
    pub async fn open(
        browser: LaunchedBrowser,
        config: &BrowserConfig,
    ) -> Result<Self, AutomationError> {
        let owns_target = browser.owns_target();
        let client = Arc::new(
            CdpClient::connect(
                &browser.ws_url,
                Duration::from_millis(config.command_timeout_ms),
            )
            .await?,
        );
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;

        let accept_dialogs = Arc::new(AtomicBool::new(false));
        let dialog_task = tokio::spawn(answer_dialogs(
            Arc::clone(&client),
            client.subscribe(),
            Arc::clone(&accept_dialogs),
        ));

        Ok(Self {
            client,
            accept_dialogs,
            dialog_task,
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            owns_target,
            process: Mutex::new(browser.process),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), AutomationError> {
        if self.closed.load(Ordering::SeqCst) || self.client.is_closed() {
            Err(AutomationError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Evaluate an expression and return its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value, AutomationError> {
        self.ensure_open()?;
        let result = self
            .client
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| exception.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception")
                .to_string();
            return Err(AutomationError::Script { message });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Evaluate a script that returns `true` when it found its element.
    async fn evaluate_found(&self, expression: &str, selector: &str) -> Result<(), AutomationError> {
        match self.evaluate(expression).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(AutomationError::not_found(selector)),
        }
    }

    async fn dispatch_key(&self, event: Value) -> Result<(), AutomationError> {
        self.ensure_open()?;
        self.client.send("Input.dispatchKeyEvent", event).await?;
        Ok(())
    }

    /// Run `command` and wait for the next `Page.loadEventFired`.
    async fn load(&self, method: &str, params: Value) -> Result<(), AutomationError> {
        self.ensure_open()?;
        let mut events = self.client.subscribe();
        let result = self.client.send(method, params).await?;
        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(AutomationError::Protocol {
                detail: format!("{method} failed: {error}"),
            });
        }
        wait_for_event(&mut events, "Page.loadEventFired", self.navigation_timeout).await
    }
}

#[async_trait]
impl PageAutomation for CdpPage {
    fn name(&self) -> &str {
        "cdp"
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), AutomationError> {
        debug!(selector, "fill");
        let matches = TextSelector::parse(selector).to_js("document");
        let script = format!(
            "(() => {{ const el = {matches}[0]; if (!el) return false; \
             el.focus(); el.value = {value}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            value = js_string(value),
        );
        self.evaluate_found(&script, selector).await
    }

    async fn select(&self, selector: &str, value: &str) -> Result<(), AutomationError> {
        debug!(selector, value, "select");
        let matches = TextSelector::parse(selector).to_js("document");
        let script = format!(
            "(() => {{ const el = {matches}[0]; if (!el) return 'missing'; \
             const v = {value}; \
             if (!Array.from(el.options || []).some(o => o.value === v)) return 'no-option'; \
             el.value = v; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return 'ok'; }})()",
            value = js_string(value),
        );
        match self.evaluate(&script).await?.as_str() {
            Some("ok") => Ok(()),
            Some("no-option") => Err(AutomationError::OptionNotFound {
                selector: selector.to_string(),
                value: value.to_string(),
            }),
            _ => Err(AutomationError::not_found(selector)),
        }
    }

    async fn click(&self, selector: &str) -> Result<(), AutomationError> {
        debug!(selector, "click");
        let matches = TextSelector::parse(selector).to_js("document");
        let script = format!(
            "(() => {{ const el = {matches}[0]; if (!el) return false; \
             el.scrollIntoView({{ block: 'center' }}); el.click(); return true; }})()"
        );
        self.evaluate_found(&script, selector).await
    }

    async fn press(&self, selector: &str, key: Key) -> Result<(), AutomationError> {
        debug!(selector, key = key.name(), "press");
        let matches = TextSelector::parse(selector).to_js("document");
        let script =
            format!("(() => {{ const el = {matches}[0]; if (!el) return false; el.focus(); return true; }})()");
        self.evaluate_found(&script, selector).await?;
        self.press_key(key).await
    }

    async fn count(&self, selector: &str) -> Result<usize, AutomationError> {
        let matches = TextSelector::parse(selector).to_js("document");
        let value = self.evaluate(&format!("{matches}.length")).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| AutomationError::Protocol {
                detail: format!("count of {selector} was not a number: {value}"),
            })
    }

    async fn locate_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AutomationError> {
        let matches = TextSelector::parse(selector).to_js("document");
        let script = format!("(() => {{ const reg = {REGISTRY}; return {}; }})()", register(&matches));
        handles_from(self.evaluate(&script).await?, selector)
    }

    async fn locate_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, AutomationError> {
        let matches = TextSelector::parse(selector).to_js("root");
        let script = format!(
            "(() => {{ const reg = {REGISTRY}; const root = reg.els.get({id}); \
             if (!root || !root.isConnected) return null; return {}; }})()",
            register(&matches),
            id = js_string(parent.id()),
        );
        match self.evaluate(&script).await? {
            Value::Null => Err(AutomationError::StaleElement {
                handle: parent.to_string(),
            }),
            value => handles_from(value, selector),
        }
    }

    async fn text_content(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        let script = format!(
            "(() => {{ const el = {REGISTRY}.els.get({id}); \
             return el && el.isConnected ? (el.textContent || '') : null; }})()",
            id = js_string(element.id()),
        );
        match self.evaluate(&script).await? {
            Value::String(text) => Ok(text),
            _ => Err(AutomationError::StaleElement {
                handle: element.to_string(),
            }),
        }
    }

    async fn click_element(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        debug!(element = element.id(), "click element");
        let script = format!(
            "(() => {{ const el = {REGISTRY}.els.get({id}); \
             if (!el || !el.isConnected) return false; \
             el.scrollIntoView({{ block: 'center' }}); el.click(); return true; }})()",
            id = js_string(element.id()),
        );
        match self.evaluate(&script).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(AutomationError::StaleElement {
                handle: element.to_string(),
            }),
        }
    }

    async fn wait_for_hidden(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        let matches = TextSelector::parse(selector).to_js("document");
        let visible = format!(
            "{matches}.filter(e => e.offsetWidth > 0 || e.offsetHeight > 0 || e.getClientRects().length > 0).length"
        );
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.evaluate(&visible).await?.as_u64() == Some(0) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::timeout(
                    format!("waiting for {selector} to disappear"),
                    timeout,
                ));
            }
            tokio::time::sleep(HIDDEN_POLL).await;
        }
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        match self.evaluate("window.location.href").await? {
            Value::String(url) => Ok(url),
            other => Err(AutomationError::Protocol {
                detail: format!("location.href was not a string: {other}"),
            }),
        }
    }

    async fn type_keystrokes(&self, text: &str) -> Result<(), AutomationError> {
        for ch in text.chars() {
            let ch = ch.to_string();
            self.dispatch_key(json!({
                "type": "keyDown",
                "text": ch,
                "unmodifiedText": ch,
                "key": ch,
            }))
            .await?;
            self.dispatch_key(json!({ "type": "keyUp", "key": ch })).await?;
        }
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        let (code, text) = key_definition(key);
        let mut down = json!({
            "type": if text.is_some() { "keyDown" } else { "rawKeyDown" },
            "key": key.name(),
            "code": key.name(),
            "windowsVirtualKeyCode": code,
            "nativeVirtualKeyCode": code,
        });
        if let Some(text) = text {
            down["text"] = json!(text);
            down["unmodifiedText"] = json!(text);
        }
        self.dispatch_key(down).await?;
        self.dispatch_key(json!({
            "type": "keyUp",
            "key": key.name(),
            "code": key.name(),
            "windowsVirtualKeyCode": code,
            "nativeVirtualKeyCode": code,
        }))
        .await
    }

    async fn reload(&self) -> Result<(), AutomationError> {
        info!("Reloading page");
        self.load("Page.reload", json!({ "ignoreCache": true })).await
    }

    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        info!(url, "Navigating");
        self.load("Page.navigate", json!({ "url": url })).await
    }

    async fn set_dialog_policy(&self, policy: DialogPolicy) -> Result<(), AutomationError> {
        self.ensure_open()?;
        self.accept_dialogs
            .store(policy == DialogPolicy::Accept, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.dialog_task.abort();

        if self.owns_target && !self.client.is_closed() {
            if let Err(e) = self.client.send("Page.close", json!({})).await {
                debug!(error = %e, "Page.close failed");
            }
        }
        self.client.shutdown().await;

        if let Some(mut process) = self.process.lock().await.take() {
            if let Err(e) = process.kill().await {
                warn!(error = %e, "Failed to stop browser process");
            }
        }
        info!("Browser session closed");
        Ok(())
    }
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        self.dialog_task.abort();
    }
}

/// Wrap an element-array expression so it registers each element and returns ids.
fn register(matches: &str) -> String {
    format!("{matches}.map(e => {{ const id = 'e' + (++reg.seq); reg.els.set(id, e); return id; }})")
}

fn handles_from(value: Value, selector: &str) -> Result<Vec<ElementHandle>, AutomationError> {
    let ids = value.as_array().ok_or_else(|| AutomationError::Protocol {
        detail: format!("locating {selector} did not return a list"),
    })?;
    Ok(ids
        .iter()
        .filter_map(Value::as_str)
        .map(ElementHandle::new)
        .collect())
}

/// Windows virtual key code and produced text for a named key.
fn key_definition(key: Key) -> (u32, Option<&'static str>) {
    match key {
        Key::Tab => (9, None),
        Key::Enter => (13, Some("\r")),
        Key::Escape => (27, None),
        Key::Backspace => (8, None),
    }
}

async fn wait_for_event(
    events: &mut broadcast::Receiver<CdpEvent>,
    method: &str,
    timeout: Duration,
) -> Result<(), AutomationError> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if event.method == method => return Ok(()),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event receiver lagged"),
                Err(RecvError::Closed) => return Err(AutomationError::SessionClosed),
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| AutomationError::timeout(format!("waiting for {method}"), timeout))?
}

/// Answer every JavaScript dialog according to the current policy.
async fn answer_dialogs(
    client: Arc<CdpClient>,
    mut events: broadcast::Receiver<CdpEvent>,
    accept: Arc<AtomicBool>,
) {
    loop {
        match events.recv().await {
            Ok(event) if event.method == "Page.javascriptDialogOpening" => {
                let accept = accept.load(Ordering::SeqCst);
                let message = event.params["message"].as_str().unwrap_or_default();
                info!(message, accept, "Answering page dialog");
                if let Err(e) = client
                    .send("Page.handleJavaScriptDialog", json!({ "accept": accept }))
                    .await
                {
                    warn!(error = %e, "Failed to answer page dialog");
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Dialog watcher lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_wraps_matches() {
        let js = register("Array.from(document.querySelectorAll(\"tbody > tr\"))");
        assert!(js.starts_with("Array.from(document.querySelectorAll(\"tbody > tr\")).map("));
        assert!(js.contains("reg.els.set(id, e)"));
    }

    #[test]
    fn test_handles_from_list() {
        let handles = handles_from(json!(["e1", "e2", 3]), "tbody > tr").unwrap();
        assert_eq!(handles, vec![ElementHandle::new("e1"), ElementHandle::new("e2")]);
    }

    #[test]
    fn test_handles_from_rejects_non_list() {
        assert!(matches!(
            handles_from(json!({ "ids": [] }), "td"),
            Err(AutomationError::Protocol { .. })
        ));
    }

    #[test]
    fn test_key_definitions() {
        assert_eq!(key_definition(Key::Tab), (9, None));
        assert_eq!(key_definition(Key::Enter), (13, Some("\r")));
    }

    #[tokio::test]
    async fn test_wait_for_event_matches_method() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(CdpEvent {
            method: "Page.frameNavigated".to_string(),
            params: Value::Null,
        })
        .unwrap();
        tx.send(CdpEvent {
            method: "Page.loadEventFired".to_string(),
            params: Value::Null,
        })
        .unwrap();
        let result = wait_for_event(&mut rx, "Page.loadEventFired", Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_event_times_out() {
        let (_tx, mut rx) = broadcast::channel::<CdpEvent>(8);
        let result = wait_for_event(&mut rx, "Page.loadEventFired", Duration::from_millis(20)).await;
        assert!(matches!(result, Err(AutomationError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_wait_for_event_closed_channel() {
        let (tx, mut rx) = broadcast::channel::<CdpEvent>(8);
        drop(tx);
        let result = wait_for_event(&mut rx, "Page.loadEventFired", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(AutomationError::SessionClosed)));
    }
}
