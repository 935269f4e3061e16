//! Authorization rules for resource access. Authentication proves identity;
//! these checks decide scope.

use crate::error::AppError;
use crate::middleware::auth::AuthPrincipal;
use crate::models::PrincipalKind;
use crate::services::database::Database;

/// Owners see everything. Coaches see students on their own batch rosters.
/// Students see only themselves.
pub async fn ensure_student_access(
    db: &Database,
    actor: &AuthPrincipal,
    student_id: i32,
) -> Result<(), AppError> {
    match actor.kind {
        PrincipalKind::Owner => Ok(()),
        PrincipalKind::Coach => {
            if db.coach_has_student(actor.id, student_id).await? {
                Ok(())
            } else {
                Err(AppError::Forbidden(
                    "Student is not assigned to any of your batches".to_string(),
                ))
            }
        }
        PrincipalKind::Student => {
            if actor.id == student_id {
                Ok(())
            } else {
                Err(AppError::Forbidden(
                    "You can only access your own record".to_string(),
                ))
            }
        }
    }
}

/// Gate for owner-only surfaces such as the login history feed.
pub fn ensure_owner(actor: &AuthPrincipal) -> Result<(), AppError> {
    if actor.kind == PrincipalKind::Owner {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "This resource requires owner access".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(kind: PrincipalKind, id: i32) -> AuthPrincipal {
        AuthPrincipal {
            id,
            kind,
            email: "test@test.com".into(),
            role: kind.as_str().into(),
            jti: "test-jti".into(),
            exp: 0,
        }
    }

    #[test]
    fn test_owner_gate() {
        assert!(ensure_owner(&actor(PrincipalKind::Owner, 1)).is_ok());
        assert!(matches!(
            ensure_owner(&actor(PrincipalKind::Coach, 1)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_owner(&actor(PrincipalKind::Student, 1)),
            Err(AppError::Forbidden(_))
        ));
    }
}
