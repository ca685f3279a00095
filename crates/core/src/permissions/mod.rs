//! Permission system for mess operations

use crate::models::Role;

/// Actions that can be performed against the mess system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessAction {
    // Token lifecycle
    IssueToken,
    RedeemToken,
    ViewOwnTokens,

    // Meals
    ViewOwnMeals,
    ViewDailyMeals,

    // Billing
    ViewOwnBills,
    ViewAllBills,
    GenerateBill,
    RecordPayment,

    // Administration
    UpdateRates,
    VerifyStudent,
    ListStudents,
    ToggleOwnCard,
}

/// Permission matrix for account roles
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role has permission to perform an action
    pub fn can_perform(role: Role, action: MessAction) -> bool {
        match action {
            // Students act on their own card and tokens
            MessAction::IssueToken => role == Role::Student,
            MessAction::ToggleOwnCard => role == Role::Student,

            // Counter staff scan and redeem
            MessAction::RedeemToken => matches!(role, Role::Admin | Role::Organization),

            // Everyone sees their own records and settles their own bills
            MessAction::ViewOwnTokens
            | MessAction::ViewOwnMeals
            | MessAction::ViewOwnBills
            | MessAction::GenerateBill
            | MessAction::RecordPayment => true,

            // Cross-student views are operator-only
            MessAction::ViewDailyMeals
            | MessAction::ViewAllBills
            | MessAction::ListStudents => matches!(role, Role::Admin | Role::Organization),

            // Only the organization edits its own rate table
            MessAction::UpdateRates => role == Role::Organization,

            // Category/PwD verification is an admin decision
            MessAction::VerifyStudent => role == Role::Admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_permissions() {
        assert!(PermissionMatrix::can_perform(Role::Student, MessAction::IssueToken));
        assert!(PermissionMatrix::can_perform(Role::Student, MessAction::ViewOwnBills));
        assert!(PermissionMatrix::can_perform(Role::Student, MessAction::RecordPayment));
        assert!(!PermissionMatrix::can_perform(Role::Student, MessAction::RedeemToken));
        assert!(!PermissionMatrix::can_perform(Role::Student, MessAction::ViewAllBills));
        assert!(!PermissionMatrix::can_perform(Role::Student, MessAction::UpdateRates));
    }

    #[test]
    fn test_admin_permissions() {
        assert!(PermissionMatrix::can_perform(Role::Admin, MessAction::RedeemToken));
        assert!(PermissionMatrix::can_perform(Role::Admin, MessAction::ViewDailyMeals));
        assert!(PermissionMatrix::can_perform(Role::Admin, MessAction::VerifyStudent));
        assert!(!PermissionMatrix::can_perform(Role::Admin, MessAction::IssueToken));
        assert!(!PermissionMatrix::can_perform(Role::Admin, MessAction::UpdateRates));
    }

    #[test]
    fn test_organization_permissions() {
        assert!(PermissionMatrix::can_perform(Role::Organization, MessAction::UpdateRates));
        assert!(PermissionMatrix::can_perform(Role::Organization, MessAction::ViewAllBills));
        assert!(!PermissionMatrix::can_perform(Role::Organization, MessAction::VerifyStudent));
        assert!(!PermissionMatrix::can_perform(Role::Organization, MessAction::IssueToken));
    }
}
