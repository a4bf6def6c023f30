// src/types/role.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Company,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Company, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Company => "company",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "company" => Ok(Role::Company),
            "admin" => Ok(Role::Admin),
            other => anyhow::bail!("Unknown role: {}", other),
        }
    }
}

/// Identity of the caller, resolved once at the HTTP boundary and passed
/// explicitly into every core operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: String,
    pub role: Role,
    /// Student id for students, company id for companies, `None` for admins
    /// or for users whose profile row does not exist yet.
    pub scope_id: Option<String>,
}

impl CallerContext {
    pub fn student(user_id: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Student,
            scope_id: Some(student_id.into()),
        }
    }

    pub fn company(user_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Company,
            scope_id: Some(company_id.into()),
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
            scope_id: None,
        }
    }

    pub fn student_id(&self) -> Option<&str> {
        match self.role {
            Role::Student => self.scope_id.as_deref(),
            _ => None,
        }
    }

    pub fn company_id(&self) -> Option<&str> {
        match self.role {
            Role::Company => self.scope_id.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!("recruiter".parse::<Role>().is_err());
    }

    #[test]
    fn test_scope_accessors_follow_role() {
        let student = CallerContext::student("u1", "s1");
        assert_eq!(student.student_id(), Some("s1"));
        assert_eq!(student.company_id(), None);

        let admin = CallerContext::admin("u2");
        assert_eq!(admin.student_id(), None);
        assert_eq!(admin.company_id(), None);
    }
}
