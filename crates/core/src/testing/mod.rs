//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the page and notifier
//! traits, so the whole reservation flow can be exercised without a browser
//! or a mail server.
//!
//! # Example
//!
//! ```rust,ignore
//! use railbook_core::testing::{fixtures, MockNotifier, MockPage};
//!
//! let page = MockPage::new();
//! let notifier = MockNotifier::new();
//!
//! // Script the results table of the first page load
//! page.push_results(fixtures::rows(&[("09:00", "10:30"), ("10:37", "12:07")])).await;
//!
//! // Build a ReservationSession around them...
//! ```

mod mock_notifier;
mod mock_page;

pub use mock_notifier::MockNotifier;
pub use mock_page::{
    GateBehavior, MockCell, MockPage, MockRow, PageCall, LOGIN_URL, MEMBER_CONFIRM_URL,
    RESERVATION_FORM_URL,
};

/// Test fixtures and helper functions.
pub mod fixtures {
    use super::{MockCell, MockRow};
    use crate::config::ReservationConfig;
    use crate::request::{IdentityMode, LoginKind, PassengerRequest};

    /// A guest request: 동탄 10:37 -> 전주 12:07 on 2025-06-22.
    pub fn guest_request() -> PassengerRequest {
        PassengerRequest {
            departure_station: "동탄".to_string(),
            arrival_station: "전주".to_string(),
            departure_time: "10:37".to_string(),
            arrival_time: "12:07".to_string(),
            travel_date: "20250622".to_string(),
            identity: IdentityMode::Unregistered {
                name: "홍길동".to_string(),
                phone: "01012345678".to_string(),
                password: "12345".to_string(),
            },
            notify_email: None,
        }
    }

    /// The same journey booked by a member logging in with an email address.
    pub fn member_request() -> PassengerRequest {
        PassengerRequest {
            identity: IdentityMode::LoggedIn {
                kind: LoginKind::Email,
                identifier: "member@example.com".to_string(),
                password: "correct-horse".to_string(),
            },
            ..guest_request()
        }
    }

    /// Default budget of 10 attempts with every pause removed.
    pub fn fast_config() -> ReservationConfig {
        ReservationConfig {
            reload_settle_ms: 0,
            retry_delay_ms: 0,
            search_settle_ms: 0,
            gate_timeout_ms: 200,
            gate_pulse_ms: 0,
            post_gate_settle_ms: 0,
            pre_reserve_settle_ms: 0,
            route_settle_ms: 0,
            login_settle_ms: 0,
            hold_after_success_secs: 0,
            ..ReservationConfig::default()
        }
    }

    /// A bookable results row with the given departure and arrival times.
    pub fn row(departure: &str, arrival: &str) -> MockRow {
        let text = |t: &str| MockCell {
            text: Some(t.to_string()),
            ..Default::default()
        };
        MockRow {
            cells: vec![
                text("SRT"),
                text("381"),
                text("SRT"),
                text(departure),
                text(arrival),
                text("특실"),
                MockCell {
                    reservable: true,
                    ..Default::default()
                },
            ],
        }
    }

    /// A results row whose seats are sold out.
    pub fn sold_out_row(departure: &str, arrival: &str) -> MockRow {
        let mut row = row(departure, arrival);
        row.cells[6] = MockCell {
            sold_out: true,
            ..Default::default()
        };
        row
    }

    /// Bookable rows for each `(departure, arrival)` pair, in order.
    pub fn rows(times: &[(&str, &str)]) -> Vec<MockRow> {
        times.iter().map(|(d, a)| row(d, a)).collect()
    }
}
