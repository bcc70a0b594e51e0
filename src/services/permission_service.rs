//! Permission resolution.
//!
//! Maps (role, permission) to allow or deny. The reserved `admin` role
//! passes every check here, before any storage access; this is the only
//! place in the crate that grants the bypass. Grant lookups that fail for
//! operational reasons deny rather than allow.

use crate::error::{AppError, Result};
use crate::models::permission::Permission;
use crate::models::role::ADMIN_ROLE;
use sqlx::PgPool;

/// Resolves role grants against the closed permission catalog.
#[derive(Clone)]
pub struct PermissionService {
    db: PgPool,
}

impl PermissionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Whether `role_id` holds `permission`.
    ///
    /// Admin short-circuits to allow without touching storage. For every
    /// other role the answer comes from the grant table; a lookup error
    /// logs a warning and denies.
    pub async fn has_permission(&self, role_id: &str, permission: Permission) -> bool {
        if role_id == ADMIN_ROLE {
            return true;
        }

        let lookup = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM role_permissions WHERE role_id = $1 AND permission = $2",
        )
        .bind(role_id)
        .bind(permission.slug())
        .fetch_one(&self.db)
        .await;

        match lookup {
            Ok(count) => count > 0,
            Err(e) => {
                tracing::warn!(
                    role = role_id,
                    permission = permission.slug(),
                    error = %e,
                    "Permission lookup failed, denying"
                );
                false
            }
        }
    }

    /// Slugs granted to a role, sorted. Admin reports the whole catalog.
    pub async fn role_permissions(&self, role_id: &str) -> Result<Vec<String>> {
        if role_id == ADMIN_ROLE {
            return Ok(Permission::ALL
                .iter()
                .map(|p| p.slug().to_string())
                .collect());
        }

        sqlx::query_scalar::<_, String>(
            "SELECT permission FROM role_permissions WHERE role_id = $1 ORDER BY permission",
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Startup check: every stored grant must name a catalog permission.
    ///
    /// A grant outside the catalog means the database and the binary
    /// disagree about what exists; refusing to start is safer than
    /// silently never matching it.
    pub async fn validate_grants(&self) -> Result<()> {
        let stored: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT permission FROM role_permissions")
                .fetch_all(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        for slug in &stored {
            if Permission::from_slug(slug).is_none() {
                return Err(AppError::Config(format!(
                    "Grant table references unknown permission '{}'",
                    slug
                )));
            }
        }
        Ok(())
    }
}
