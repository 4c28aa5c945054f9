//! Outcome email composition.

use crate::request::{IdentityMode, PassengerRequest};
use crate::reservation::RunOutcome;

/// A plain-text email ready to hand to a [`Notifier`](super::Notifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Build the outcome email for `request`, or `None` when it asked for no
/// notification.
pub fn compose_message(outcome: &RunOutcome, request: &PassengerRequest) -> Option<EmailMessage> {
    let to = request.notify_email.as_deref()?.trim();
    if to.is_empty() {
        return None;
    }

    let (subject, body) = match outcome {
        RunOutcome::Reserved { attempt } => (
            "SRT 예약 성공".to_string(),
            format!(
                "SRT 예약이 완료되었습니다.\n\n\
                 {details}\
                 - 예약자: {holder}\n\
                 - 시도 횟수: {attempt}\n\n\
                 결제 기한은 10분입니다. 지금 열려 있는 브라우저에서 결제를 완료하세요.\n",
                details = journey_details(request),
                holder = holder(&request.identity),
            ),
        ),
        RunOutcome::Exhausted {
            attempts,
            last_error,
        } => (
            "SRT 예약 실패".to_string(),
            format!(
                "SRT 예약에 실패했습니다.\n\n\
                 {details}\
                 - 시도 횟수: {attempts}\n\n\
                 오류: {last_error}\n\n\
                 다시 실행하거나 직접 예약해 주세요.\n",
                details = journey_details(request),
            ),
        ),
        RunOutcome::Aborted { attempt, reason } => (
            "SRT 예약 중단".to_string(),
            format!(
                "SRT 예약이 {attempt}번째 시도 중에 중단되었습니다.\n\n\
                 {details}\n\
                 오류: {reason}\n",
                details = journey_details(request),
            ),
        ),
    };

    Some(EmailMessage {
        to: to.to_string(),
        subject,
        body,
    })
}

fn journey_details(request: &PassengerRequest) -> String {
    format!(
        "- 출발: {} ({})\n- 도착: {} ({})\n- 날짜: {}\n",
        request.departure_station,
        request.departure_time,
        request.arrival_station,
        request.arrival_time,
        request.travel_date,
    )
}

fn holder(identity: &IdentityMode) -> String {
    match identity {
        IdentityMode::Unregistered { name, .. } => name.clone(),
        IdentityMode::LoggedIn { kind, .. } => format!("회원 ({kind})"),
    }
}
