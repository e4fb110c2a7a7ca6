//! Auto-disbursement policy.
//!
//! Decides whether a withdrawal may be paid out the same day without an
//! admin. Withdrawal creation, the payout consumers and the affiliate
//! commission consumer all go through `should_auto_approve`.

use crate::models::withdrawal::CASH_CHANNEL;

/// Whether a withdrawal qualifies for unattended approval.
///
/// True iff the channel is not cash, the user's approved count for today is
/// within `count_cap`, and `min <= amount <= max`.
pub fn should_auto_approve(
    todays_approved_count: i64,
    amount: i64,
    channel: &str,
    min: i64,
    max: i64,
    count_cap: i64,
) -> bool {
    channel != CASH_CHANNEL
        && todays_approved_count <= count_cap
        && min <= amount
        && amount <= max
}
