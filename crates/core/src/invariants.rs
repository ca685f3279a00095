//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{Bill, BillPaymentStatus, Meal, MealToken, RateTable, TokenStatus, MAX_SPECIALS};

/// Validate that a rate table carries no negative amounts
pub fn assert_rate_table_invariants(rates: &RateTable) {
    debug_assert!(
        rates.breakfast_rate >= 0
            && rates.lunch_rate >= 0
            && rates.dinner_rate >= 0
            && rates.special_item_rate >= 0
            && rates.semester_hostel_fee >= 0
            && rates.basic_monthly_charge >= 0,
        "Rate table contains a negative amount: {:?}",
        rates
    );
}

/// Validate that a token's captured pricing and state are consistent
pub fn assert_token_invariants(token: &MealToken) {
    debug_assert!(
        token.amount == token.rate + token.special_rate,
        "Token {} amount {} does not match rate {} + special_rate {}",
        token.id,
        token.amount,
        token.rate,
        token.special_rate
    );

    debug_assert!(
        token.specials <= MAX_SPECIALS,
        "Token {} has {} specials, max is {}",
        token.id,
        token.specials,
        MAX_SPECIALS
    );

    debug_assert!(
        token.expires_at > token.generated_at,
        "Token {} expires at {} before generation at {}",
        token.id,
        token.expires_at,
        token.generated_at
    );

    // used_at is set exactly by the active -> used transition
    debug_assert!(
        (token.status == TokenStatus::Used) == token.used_at.is_some(),
        "Token {} status {:?} inconsistent with used_at {:?}",
        token.id,
        token.status,
        token.used_at
    );
}

/// Validate that a meal record's breakdown sums up
pub fn assert_meal_invariants(meal: &Meal) {
    debug_assert!(
        meal.total_amount == meal.rate + meal.special_rate,
        "Meal {} total {} does not match rate {} + special_rate {}",
        meal.id,
        meal.total_amount,
        meal.rate,
        meal.special_rate
    );

    debug_assert!(
        meal.specials <= MAX_SPECIALS,
        "Meal {} has {} specials, max is {}",
        meal.id,
        meal.specials,
        MAX_SPECIALS
    );
}

/// Validate that a bill's derived figures are internally consistent
pub fn assert_bill_invariants(bill: &Bill) {
    debug_assert!(
        (1..=12).contains(&bill.month),
        "Bill {} has month {}",
        bill.id,
        bill.month
    );

    debug_assert!(
        bill.total == bill.subtotal + bill.semester_hostel_fee,
        "Bill {} total {} does not match subtotal {} + fee {}",
        bill.id,
        bill.total,
        bill.subtotal,
        bill.semester_hostel_fee
    );

    debug_assert!(
        bill.due_amount == bill.total - bill.total_paid(),
        "Bill {} due {} does not match total {} - paid {}",
        bill.id,
        bill.due_amount,
        bill.total,
        bill.total_paid()
    );

    debug_assert!(
        bill.meal_count.total() as usize == bill.meals.len(),
        "Bill {} counts {} meals but snapshot holds {}",
        bill.id,
        bill.meal_count.total(),
        bill.meals.len()
    );

    debug_assert!(
        bill.payment_status != BillPaymentStatus::Paid || bill.paid_at.is_some(),
        "Bill {} is paid but paid_at is unset",
        bill.id
    );
}
