//! Permission catalog.
//!
//! Closed set of capability identifiers gating dashboard views and actions.
//! Roles hold slugs from this catalog via the `role_permissions` table; a
//! slug outside the catalog can neither be granted nor checked, and startup
//! fails if the grant table contains one.

use serde::Serialize;
use utoipa::ToSchema;

/// Atomic capability gating one view or action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    DashboardView,
    IdeasView,
    IdeasManage,
    PostsView,
    PostsManage,
    PostsSchedule,
    AccountsView,
    AccountsManage,
    ProjectsView,
    ProjectsManage,
    UsersView,
    UsersManage,
    RolesView,
    RolesManage,
    RolesDelete,
    ActivityView,
}

impl Permission {
    /// Every permission in the catalog, in display order.
    pub const ALL: [Permission; 16] = [
        Permission::DashboardView,
        Permission::IdeasView,
        Permission::IdeasManage,
        Permission::PostsView,
        Permission::PostsManage,
        Permission::PostsSchedule,
        Permission::AccountsView,
        Permission::AccountsManage,
        Permission::ProjectsView,
        Permission::ProjectsManage,
        Permission::UsersView,
        Permission::UsersManage,
        Permission::RolesView,
        Permission::RolesManage,
        Permission::RolesDelete,
        Permission::ActivityView,
    ];

    /// Stable identifier stored in grants and named in 403 responses.
    pub fn slug(&self) -> &'static str {
        match self {
            Permission::DashboardView => "dashboard.view",
            Permission::IdeasView => "ideas.view",
            Permission::IdeasManage => "ideas.manage",
            Permission::PostsView => "posts.view",
            Permission::PostsManage => "posts.manage",
            Permission::PostsSchedule => "posts.schedule",
            Permission::AccountsView => "accounts.view",
            Permission::AccountsManage => "accounts.manage",
            Permission::ProjectsView => "projects.view",
            Permission::ProjectsManage => "projects.manage",
            Permission::UsersView => "users.view",
            Permission::UsersManage => "users.manage",
            Permission::RolesView => "roles.view",
            Permission::RolesManage => "roles.manage",
            Permission::RolesDelete => "roles.delete",
            Permission::ActivityView => "activity.view",
        }
    }

    /// Dashboard module the permission belongs to.
    pub fn group(&self) -> &'static str {
        match self {
            Permission::DashboardView => "dashboard",
            Permission::IdeasView | Permission::IdeasManage => "ideas",
            Permission::PostsView | Permission::PostsManage | Permission::PostsSchedule => "posts",
            Permission::AccountsView | Permission::AccountsManage => "accounts",
            Permission::ProjectsView | Permission::ProjectsManage => "projects",
            Permission::UsersView | Permission::UsersManage => "users",
            Permission::RolesView | Permission::RolesManage | Permission::RolesDelete => "roles",
            Permission::ActivityView => "activity",
        }
    }

    /// Human-readable name shown in the role editor.
    pub fn label(&self) -> &'static str {
        match self {
            Permission::DashboardView => "View dashboard",
            Permission::IdeasView => "View content ideas",
            Permission::IdeasManage => "Create and edit content ideas",
            Permission::PostsView => "View posts",
            Permission::PostsManage => "Create and edit posts",
            Permission::PostsSchedule => "Schedule posts",
            Permission::AccountsView => "View connected accounts",
            Permission::AccountsManage => "Manage connected accounts",
            Permission::ProjectsView => "View projects",
            Permission::ProjectsManage => "Manage projects",
            Permission::UsersView => "View users",
            Permission::UsersManage => "Manage users",
            Permission::RolesView => "View roles",
            Permission::RolesManage => "Create and edit roles",
            Permission::RolesDelete => "Delete roles",
            Permission::ActivityView => "View activity log",
        }
    }

    /// Parse a stored or submitted slug. Unknown slugs are rejected.
    pub fn from_slug(slug: &str) -> Option<Permission> {
        Permission::ALL.iter().copied().find(|p| p.slug() == slug)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}
