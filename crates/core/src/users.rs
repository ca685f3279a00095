//! User profile, card, and verification flows

use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Category, User};
use crate::permissions::{MessAction, PermissionMatrix};
use crate::storage::Database;

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub category: Option<Category>,
    pub verification_documents: Option<String>,
}

/// Profile and administration flows over user accounts
pub struct UserService<'a> {
    db: &'a Database,
}

impl<'a> UserService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Fetch a user's own profile
    pub fn profile(&self, user_id: Uuid) -> Result<User> {
        self.db
            .users()
            .find_by_id(user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
    }

    /// Apply a self-service profile update
    #[instrument(skip(self, update))]
    pub fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<User> {
        let mut user = self.profile(user_id)?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidInput("name must not be empty".to_string()));
            }
            user.name = name;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(category) = update.category {
            user.category = category;
        }
        if let Some(documents) = update.verification_documents {
            user.verification_documents = Some(documents);
        }

        self.db.users().update(&user)?;
        Ok(user)
    }

    /// Switch the mess card on or off
    pub fn set_card_active(&self, user_id: Uuid, active: bool) -> Result<User> {
        // Fails early with NotFound rather than silently updating no rows
        self.profile(user_id)?;
        self.db.users().set_card_active(user_id, active)?;
        info!(%user_id, active, "Toggled mess card");
        self.profile(user_id)
    }

    /// Admin decision on a student's verification flags
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub fn verify(
        &self,
        actor: &User,
        user_id: Uuid,
        is_verified: Option<bool>,
        is_pwd_verified: Option<bool>,
    ) -> Result<User> {
        if !PermissionMatrix::can_perform(actor.role, MessAction::VerifyStudent) {
            return Err(Error::PermissionDenied(
                "verification requires an admin account".to_string(),
            ));
        }

        let mut user = self.profile(user_id)?;
        if is_pwd_verified == Some(true) && user.category != Category::Pwd {
            return Err(Error::PreconditionFailed(
                "user category is not PwD".to_string(),
            ));
        }

        if let Some(verified) = is_verified {
            user.is_verified = verified;
        }
        if let Some(pwd_verified) = is_pwd_verified {
            user.is_pwd_verified = pwd_verified;
        }

        self.db.users().update(&user)?;
        info!(%user_id, "Updated verification flags");
        Ok(user)
    }

    /// Operator lookup by the student number printed on the card
    pub fn by_student_no(&self, actor: &User, student_no: &str) -> Result<User> {
        if !PermissionMatrix::can_perform(actor.role, MessAction::ListStudents) {
            return Err(Error::PermissionDenied(
                "student lookup requires an admin or organization account".to_string(),
            ));
        }
        self.db
            .users()
            .find_by_student_no(student_no)?
            .ok_or_else(|| Error::NotFound(format!("student '{}'", student_no)))
    }

    /// Operator listing of all accounts
    pub fn list(&self, actor: &User) -> Result<Vec<User>> {
        if !PermissionMatrix::can_perform(actor.role, MessAction::ListStudents) {
            return Err(Error::PermissionDenied(
                "user listing requires an admin or organization account".to_string(),
            ));
        }
        self.db.users().list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn setup() -> (Database, User, User) {
        let db = Database::open_in_memory().unwrap();

        let student = User::new(
            "Asha".to_string(),
            "asha@campus.test".to_string(),
            "hash".to_string(),
        )
        .with_student_no("S-1042".to_string());
        db.users().create(&student).unwrap();

        let admin = User::new(
            "Warden".to_string(),
            "warden@campus.test".to_string(),
            "hash".to_string(),
        )
        .with_role(Role::Admin);
        db.users().create(&admin).unwrap();

        (db, student, admin)
    }

    #[test]
    fn test_update_profile() {
        let (db, student, _) = setup();
        let service = UserService::new(&db);

        let updated = service
            .update_profile(
                student.id,
                ProfileUpdate {
                    phone: Some("555-0101".to_string()),
                    category: Some(Category::Obc),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("555-0101"));
        assert_eq!(updated.category, Category::Obc);
        // Untouched fields survive
        assert_eq!(updated.name, "Asha");

        let stored = db.users().find_by_id(student.id).unwrap().unwrap();
        assert_eq!(stored.category, Category::Obc);
    }

    #[test]
    fn test_card_toggle_roundtrip() {
        let (db, student, _) = setup();
        let service = UserService::new(&db);

        let off = service.set_card_active(student.id, false).unwrap();
        assert!(!off.is_card_active);

        let on = service.set_card_active(student.id, true).unwrap();
        assert!(on.is_card_active);

        assert!(matches!(
            service.set_card_active(Uuid::new_v4(), false),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_verify_is_admin_only() {
        let (db, student, admin) = setup();
        let service = UserService::new(&db);

        assert!(matches!(
            service.verify(&student, student.id, Some(true), None),
            Err(Error::PermissionDenied(_))
        ));

        let verified = service.verify(&admin, student.id, Some(true), None).unwrap();
        assert!(verified.is_verified);
    }

    #[test]
    fn test_pwd_verification_requires_pwd_category() {
        let (db, student, admin) = setup();
        let service = UserService::new(&db);

        // General-category student cannot be marked PwD-verified
        assert!(matches!(
            service.verify(&admin, student.id, None, Some(true)),
            Err(Error::PreconditionFailed(_))
        ));

        service
            .update_profile(
                student.id,
                ProfileUpdate {
                    category: Some(Category::Pwd),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();

        let verified = service.verify(&admin, student.id, None, Some(true)).unwrap();
        assert!(verified.is_pwd_verified);
    }

    #[test]
    fn test_student_no_lookup() {
        let (db, student, admin) = setup();
        let service = UserService::new(&db);

        let found = service.by_student_no(&admin, "S-1042").unwrap();
        assert_eq!(found.id, student.id);

        assert!(matches!(
            service.by_student_no(&admin, "S-9999"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.by_student_no(&student, "S-1042"),
            Err(Error::PermissionDenied(_))
        ));
    }
}
