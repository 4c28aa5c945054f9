//! Selectors and URL markers for the SRT booking site.

use crate::request::LoginKind;

// Schedule search
pub const DEPARTURE_STATION: &str = "input#dptRsStnCdNm";
pub const ARRIVAL_STATION: &str = "input#arvRsStnCdNm";
pub const TRAVEL_DATE: &str = "select#dptDt";
pub const SEARCH_BUTTON: &str = "input[value='조회하기']";

/// Queueing interstitial shown while the site rate-limits searches.
pub const GATE: &str = "div#NetFunnel_Skin_Top";

// Results table
pub const RESULT_ROWS: &str = "tbody > tr";
pub const ROW_CELLS: &str = "td";
pub const CELL_TIME: &str = "em";
pub const DEPARTURE_CELL: usize = 3;
pub const ARRIVAL_CELL: usize = 4;
pub const ACTION_CELL: usize = 6;
pub const SOLD_OUT: &str = "span:has-text('매진')";
pub const RESERVE_BUTTON: &str = "a > span:has-text('예약하기')";

// Guest checkout
pub const GUEST_ROUTE: &str = "a.btn_midium.btn_pastel1:has-text('미등록고객 예매')";
pub const RESERVATION_FORM_MARKER: &str = "selectReservationForm";
pub const GUEST_AGREE: &str = "input#agreeY";
pub const GUEST_NAME: &str = "input#custNm";

// Member login
pub const LOGIN_PAGE_MARKER: &str = "selectLoginForm";
pub const CHANGE_LATER: &str = "a:has-text('다음에 변경')";

/// Controls of the login tab for one [`LoginKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginForm {
    pub tab: &'static str,
    pub identifier: &'static str,
    pub password: &'static str,
}

pub fn login_form(kind: LoginKind) -> LoginForm {
    match kind {
        LoginKind::MemberId => LoginForm {
            tab: "input#srchDvCd1",
            identifier: "input#srchDvNm01",
            password: "input#hmpgPwdCphd01",
        },
        LoginKind::Email => LoginForm {
            tab: "input#srchDvCd2",
            identifier: "input#srchDvNm02",
            password: "input#hmpgPwdCphd02",
        },
        LoginKind::Phone => LoginForm {
            tab: "input#srchDvCd3",
            identifier: "input#srchDvNm03",
            password: "input#hmpgPwdCphd03",
        },
    }
}
