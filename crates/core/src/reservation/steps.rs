//! The step pipeline of a single reservation attempt.
//!
//! Steps assume nothing about the page beyond what the previous step of the
//! same attempt left behind.

use std::time::Duration;

use tracing::{debug, info};

use super::gate::{wait_for_gate, GateWait};
use super::selectors::{self, login_form};
use super::types::ReservationError;
use crate::automation::{AutomationError, DialogPolicy, ElementHandle, Key, PageAutomation};
use crate::config::ReservationConfig;
use crate::request::{phone_parts, IdentityMode, LoginKind, PassengerRequest};

/// Sleep unless the pause is configured away.
pub(crate) async fn settle(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// One pass through the pipeline against a page.
pub(crate) struct Steps<'a> {
    page: &'a dyn PageAutomation,
    config: &'a ReservationConfig,
    request: &'a PassengerRequest,
}

impl<'a> Steps<'a> {
    pub fn new(
        page: &'a dyn PageAutomation,
        config: &'a ReservationConfig,
        request: &'a PassengerRequest,
    ) -> Self {
        Self {
            page,
            config,
            request,
        }
    }

    /// Run every step in order.
    pub async fn run(&self) -> Result<(), ReservationError> {
        self.set_stations().await?;
        self.select_date().await?;
        self.search().await?;
        self.pass_gate().await?;
        self.find_train().await?;
        settle(self.config.pre_reserve_settle()).await;
        self.reserve().await?;
        self.choose_route().await?;
        self.confirm_identity().await?;
        self.fill_guest_form().await
    }

    /// Step 1: departure and arrival stations.
    pub async fn set_stations(&self) -> Result<(), ReservationError> {
        info!(
            departure = %self.request.departure_station,
            arrival = %self.request.arrival_station,
            "Setting stations"
        );
        self.enter_text(selectors::DEPARTURE_STATION, &self.request.departure_station)
            .await?;
        self.enter_text(selectors::ARRIVAL_STATION, &self.request.arrival_station)
            .await?;
        Ok(())
    }

    /// Step 2: travel date.
    pub async fn select_date(&self) -> Result<(), ReservationError> {
        info!(date = %self.request.travel_date, "Selecting travel date");
        self.page
            .select(selectors::TRAVEL_DATE, &self.request.travel_date)
            .await?;
        Ok(())
    }

    /// Step 3: submit the search and give the results time to render.
    pub async fn search(&self) -> Result<(), ReservationError> {
        info!("Searching trains");
        self.page.click(selectors::SEARCH_BUTTON).await?;
        settle(self.config.search_settle()).await;
        Ok(())
    }

    /// Step 4: queue gate.
    pub async fn pass_gate(&self) -> Result<(), ReservationError> {
        let wait = wait_for_gate(
            self.page,
            self.config.gate_timeout(),
            self.config.gate_pulse(),
        )
        .await?;
        if let GateWait::Cleared(_) = wait {
            settle(self.config.post_gate_settle()).await;
        }
        Ok(())
    }

    /// Step 5: index of the first row whose times match the request.
    pub async fn find_train(&self) -> Result<usize, ReservationError> {
        info!(
            departure = %self.request.departure_time,
            arrival = %self.request.arrival_time,
            "Looking for matching train"
        );
        match self.matching_row(selectors::ARRIVAL_CELL + 1).await? {
            Some((index, _)) => {
                info!(row = index, "Matching train found");
                Ok(index)
            }
            None => Err(self.no_match()),
        }
    }

    /// Step 6: press the reserve button of the first matching row that has
    /// one. A sold-out match ends the attempt; rows without an action cell,
    /// without a button, or whose click fails are passed over.
    pub async fn reserve(&self) -> Result<(), ReservationError> {
        let departure = &self.request.departure_time;
        let rows = self.page.locate_all(selectors::RESULT_ROWS).await?;

        for (row, handle) in rows.iter().enumerate() {
            let Some(cells) = self
                .matching_cells(handle, selectors::ACTION_CELL + 1)
                .await?
            else {
                continue;
            };
            let action = &cells[selectors::ACTION_CELL];

            if !self
                .page
                .locate_within(action, selectors::SOLD_OUT)
                .await?
                .is_empty()
            {
                info!(row, "Train is sold out");
                return Err(ReservationError::SoldOut {
                    departure: departure.clone(),
                });
            }

            let buttons = self
                .page
                .locate_within(action, selectors::RESERVE_BUTTON)
                .await?;
            let Some(button) = buttons.first() else {
                debug!(row, "No reserve button");
                continue;
            };
            match self.page.click_element(button).await {
                Ok(()) => {
                    info!(row, "Reserve button pressed");
                    return Ok(());
                }
                Err(e) if e.is_session_lost() => return Err(e.into()),
                Err(e) => debug!(row, error = %e, "Reserve click failed"),
            }
        }

        Err(ReservationError::ReserveActionUnavailable {
            departure: departure.clone(),
        })
    }

    /// Step 7: guests take the unregistered-customer route.
    pub async fn choose_route(&self) -> Result<(), ReservationError> {
        match &self.request.identity {
            IdentityMode::Unregistered { .. } => {
                settle(self.config.route_settle()).await;
                info!("Taking guest checkout route");
                self.page.set_dialog_policy(DialogPolicy::Accept).await?;
                self.page.click(selectors::GUEST_ROUTE).await?;
                Ok(())
            }
            IdentityMode::LoggedIn { .. } => Ok(()),
        }
    }

    /// Step 8: guests must be on the reservation form; members log in.
    pub async fn confirm_identity(&self) -> Result<(), ReservationError> {
        match &self.request.identity {
            IdentityMode::Unregistered { .. } => {
                let url = self.page.current_url().await?;
                if !url.contains(selectors::RESERVATION_FORM_MARKER) {
                    return Err(ReservationError::Identity(format!(
                        "guest reservation form not reached (current URL: {url})"
                    )));
                }
                info!("Guest reservation form reached");
                Ok(())
            }
            IdentityMode::LoggedIn {
                kind,
                identifier,
                password,
            } => self.log_in(*kind, identifier, password).await,
        }
    }

    async fn log_in(
        &self,
        kind: LoginKind,
        identifier: &str,
        password: &str,
    ) -> Result<(), ReservationError> {
        info!(kind = %kind, "Logging in");
        let form = login_form(kind);
        self.page.click(form.tab).await?;
        self.page.fill(form.identifier, identifier).await?;
        self.page.fill(form.password, password).await?;
        self.page.press(form.password, Key::Enter).await?;
        settle(self.config.login_settle()).await;

        let url = self.page.current_url().await?;
        if url.contains(selectors::LOGIN_PAGE_MARKER) {
            return Err(ReservationError::Identity(format!(
                "login with {kind} was rejected"
            )));
        }

        if self.page.count(selectors::CHANGE_LATER).await? > 0 {
            debug!("Dismissing password change prompt");
            self.page.click(selectors::CHANGE_LATER).await?;
        }
        info!("Logged in");
        Ok(())
    }

    /// Step 9: guest details, typed field by field, then submitted.
    pub async fn fill_guest_form(&self) -> Result<(), ReservationError> {
        let IdentityMode::Unregistered {
            name,
            phone,
            password,
        } = &self.request.identity
        else {
            return Ok(());
        };

        info!("Filling guest details");
        self.page.click(selectors::GUEST_AGREE).await?;
        self.enter_text(selectors::GUEST_NAME, name).await?;

        let [head, middle, tail] =
            phone_parts(phone).map_err(|e| ReservationError::Identity(e.to_string()))?;
        for value in [head, middle, tail, password.as_str(), password.as_str()] {
            self.page.type_keystrokes(value).await?;
            self.page.press_key(Key::Tab).await?;
        }

        self.page.set_dialog_policy(DialogPolicy::Accept).await?;
        self.page.press_key(Key::Enter).await?;
        info!("Guest details submitted");
        Ok(())
    }

    /// Click, clear, fill and commit a text input with Tab.
    async fn enter_text(&self, selector: &str, value: &str) -> Result<(), AutomationError> {
        self.page.click(selector).await?;
        self.page.fill(selector, "").await?;
        self.page.fill(selector, value).await?;
        self.page.press(selector, Key::Tab).await
    }

    /// First row, in document order, with at least `min_cells` cells whose
    /// departure and arrival cells contain the requested times.
    async fn matching_row(
        &self,
        min_cells: usize,
    ) -> Result<Option<(usize, Vec<ElementHandle>)>, ReservationError> {
        let rows = self.page.locate_all(selectors::RESULT_ROWS).await?;
        debug!(rows = rows.len(), "Scanning results");

        for (index, row) in rows.iter().enumerate() {
            if let Some(cells) = self.matching_cells(row, min_cells).await? {
                return Ok(Some((index, cells)));
            }
        }
        Ok(None)
    }

    /// The row's cells if it is wide enough and its times match.
    async fn matching_cells(
        &self,
        row: &ElementHandle,
        min_cells: usize,
    ) -> Result<Option<Vec<ElementHandle>>, ReservationError> {
        let cells = self.page.locate_within(row, selectors::ROW_CELLS).await?;
        if cells.len() < min_cells.max(selectors::ARRIVAL_CELL + 1) {
            return Ok(None);
        }

        let (Some(departure), Some(arrival)) = (
            self.cell_time(&cells[selectors::DEPARTURE_CELL]).await?,
            self.cell_time(&cells[selectors::ARRIVAL_CELL]).await?,
        ) else {
            return Ok(None);
        };
        debug!(%departure, %arrival, "Result row");

        let matches = departure.contains(&self.request.departure_time)
            && arrival.contains(&self.request.arrival_time);
        Ok(matches.then_some(cells))
    }

    /// Text of the time element in a cell. Unreadable cells yield `None`;
    /// a lost session is still an error.
    async fn cell_time(&self, cell: &ElementHandle) -> Result<Option<String>, ReservationError> {
        let read = async {
            let ems = self.page.locate_within(cell, selectors::CELL_TIME).await?;
            match ems.first() {
                Some(em) => self.page.text_content(em).await.map(Some),
                None => Ok::<_, AutomationError>(None),
            }
        };
        match read.await {
            Ok(text) => Ok(text),
            Err(e) if e.is_session_lost() => Err(e.into()),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable cell");
                Ok(None)
            }
        }
    }

    fn no_match(&self) -> ReservationError {
        ReservationError::NoMatchingTrain {
            departure: self.request.departure_time.clone(),
            arrival: self.request.arrival_time.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockPage, PageCall};

    #[tokio::test]
    async fn test_set_stations_commits_with_tab() {
        let page = MockPage::new();
        let config = fixtures::fast_config();
        let request = fixtures::guest_request();
        Steps::new(&page, &config, &request)
            .set_stations()
            .await
            .unwrap();

        let calls = page.calls().await;
        assert_eq!(
            &calls[..4],
            &[
                PageCall::Click(selectors::DEPARTURE_STATION.to_string()),
                PageCall::Fill(selectors::DEPARTURE_STATION.to_string(), String::new()),
                PageCall::Fill(
                    selectors::DEPARTURE_STATION.to_string(),
                    request.departure_station.clone()
                ),
                PageCall::Press(selectors::DEPARTURE_STATION.to_string(), Key::Tab),
            ]
        );
    }

    #[tokio::test]
    async fn test_find_train_first_match_wins() {
        let page = MockPage::new();
        page.push_results(vec![
            fixtures::row("09:00", "10:30"),
            fixtures::row("10:37", "12:07"),
            fixtures::row("10:37", "12:07"),
        ])
        .await;
        let config = fixtures::fast_config();
        let request = fixtures::guest_request();
        let index = Steps::new(&page, &config, &request)
            .find_train()
            .await
            .unwrap();
        assert_eq!(index, 1);
    }

    #[tokio::test]
    async fn test_find_train_skips_short_rows() {
        let page = MockPage::new();
        let mut short = fixtures::row("10:37", "12:07");
        short.cells.truncate(4);
        page.push_results(vec![short]).await;
        let config = fixtures::fast_config();
        let request = fixtures::guest_request();
        let result = Steps::new(&page, &config, &request).find_train().await;
        assert!(matches!(
            result,
            Err(ReservationError::NoMatchingTrain { .. })
        ));
    }

    #[tokio::test]
    async fn test_reserve_sold_out() {
        let page = MockPage::new();
        page.push_results(vec![fixtures::sold_out_row("10:37", "12:07")])
            .await;
        let config = fixtures::fast_config();
        let request = fixtures::guest_request();
        let result = Steps::new(&page, &config, &request).reserve().await;
        assert!(matches!(result, Err(ReservationError::SoldOut { .. })));
    }

    #[tokio::test]
    async fn test_reserve_without_button() {
        let page = MockPage::new();
        let mut row = fixtures::row("10:37", "12:07");
        row.cells[selectors::ACTION_CELL].reservable = false;
        page.push_results(vec![row]).await;
        let config = fixtures::fast_config();
        let request = fixtures::guest_request();
        let result = Steps::new(&page, &config, &request).reserve().await;
        assert!(matches!(
            result,
            Err(ReservationError::ReserveActionUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_reserve_skips_matching_row_without_action_cell() {
        let page = MockPage::new();
        let mut short = fixtures::row("10:37", "12:07");
        short.cells.truncate(5);
        page.push_results(vec![short, fixtures::row("10:37", "12:07")])
            .await;
        let config = fixtures::fast_config();
        let request = fixtures::guest_request();
        let steps = Steps::new(&page, &config, &request);

        assert_eq!(steps.find_train().await.unwrap(), 0);
        steps.reserve().await.unwrap();

        let clicked: Vec<String> = page
            .calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                PageCall::ClickElement(handle) => Some(handle),
                _ => None,
            })
            .collect();
        assert_eq!(clicked.len(), 1);
        assert!(clicked[0].ends_with("reserve/1/6"));
    }

    #[tokio::test]
    async fn test_reserve_passes_over_row_without_button() {
        let page = MockPage::new();
        let mut no_button = fixtures::row("10:37", "12:07");
        no_button.cells[selectors::ACTION_CELL].reservable = false;
        page.push_results(vec![no_button, fixtures::row("10:37", "12:07")])
            .await;
        let config = fixtures::fast_config();
        let request = fixtures::guest_request();
        Steps::new(&page, &config, &request)
            .reserve()
            .await
            .unwrap();
        assert_eq!(page.url().await, crate::testing::LOGIN_URL);
    }

    #[tokio::test]
    async fn test_absent_gate_adds_no_settle() {
        let page = MockPage::new();
        let config = ReservationConfig {
            post_gate_settle_ms: 60_000,
            ..fixtures::fast_config()
        };
        let request = fixtures::guest_request();
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            Steps::new(&page, &config, &request).pass_gate(),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_guest_form_types_phone_parts() {
        let page = MockPage::new();
        let config = fixtures::fast_config();
        let request = fixtures::guest_request();
        Steps::new(&page, &config, &request)
            .fill_guest_form()
            .await
            .unwrap();

        let typed: Vec<String> = page
            .calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                PageCall::TypeKeystrokes(text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(typed, vec!["010", "1234", "5678", "12345", "12345"]);

        let calls = page.calls().await;
        assert_eq!(calls.last(), Some(&PageCall::PressKey(Key::Enter)));
        assert!(calls.contains(&PageCall::SetDialogPolicy(DialogPolicy::Accept)));
    }

    #[tokio::test]
    async fn test_guest_form_skipped_for_member() {
        let page = MockPage::new();
        let config = fixtures::fast_config();
        let request = fixtures::member_request();
        Steps::new(&page, &config, &request)
            .fill_guest_form()
            .await
            .unwrap();
        assert!(page.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_guest_form_not_reached() {
        let page = MockPage::new();
        let config = fixtures::fast_config();
        let request = fixtures::guest_request();
        let result = Steps::new(&page, &config, &request)
            .confirm_identity()
            .await;
        assert!(matches!(result, Err(ReservationError::Identity(_))));
    }

    #[tokio::test]
    async fn test_rejected_login() {
        let page = MockPage::new();
        page.set_login_accepted(false).await;
        let config = fixtures::fast_config();
        let request = fixtures::member_request();
        let result = Steps::new(&page, &config, &request)
            .confirm_identity()
            .await;
        assert!(matches!(result, Err(ReservationError::Identity(_))));
    }

    #[tokio::test]
    async fn test_login_dismisses_change_later_prompt() {
        let page = MockPage::new();
        page.set_change_later_prompt(true).await;
        let config = fixtures::fast_config();
        let request = fixtures::member_request();
        Steps::new(&page, &config, &request)
            .confirm_identity()
            .await
            .unwrap();
        assert!(page
            .calls()
            .await
            .contains(&PageCall::Click(selectors::CHANGE_LATER.to_string())));
    }
}
