use serde::{Deserialize, Serialize};

/// How the acting user authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProviderKind {
    /// Locally-authenticated account (staff, trusted, never metered).
    Local,
    /// Demo link user.
    Demo,
    /// External identity provider that does not reveal who the user is.
    ExternalAnonymous,
    /// External identity provider with a known identity (Google, GitHub, ...).
    ExternalIdentified,
    /// Launched from an LTI consumer.
    Lti,
}

/// The user's role inside the active class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassRole {
    Student,
    Instructor,
}

/// The acting principal and its scope, threaded explicitly through every
/// access and orchestration call.
///
/// `class_id` is `None` for a free-standing user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub user_id: String,
    #[serde(default)]
    pub class_id: Option<String>,
    pub auth_provider: AuthProviderKind,
    #[serde(default)]
    pub is_admin: bool,
    /// Role inside `class_id`, when known.
    #[serde(default)]
    pub role: Option<ClassRole>,
}

impl TenantContext {
    /// A free-standing user (no active class).
    pub fn user(user_id: impl Into<String>, auth_provider: AuthProviderKind) -> Self {
        Self {
            user_id: user_id.into(),
            class_id: None,
            auth_provider,
            is_admin: false,
            role: None,
        }
    }

    /// The same user operating inside a class with the given role.
    pub fn in_class(mut self, class_id: impl Into<String>, role: ClassRole) -> Self {
        self.class_id = Some(class_id.into());
        self.role = Some(role);
        self
    }

    pub fn is_student(&self) -> bool {
        self.role == Some(ClassRole::Student)
    }
}
