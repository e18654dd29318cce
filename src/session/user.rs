use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User record as returned by the backend.
///
/// No schema is enforced: the whole object is kept and round-trips through
/// storage unchanged. Accessors read the fields the shell cares about.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Role {
    pub role: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub client: Option<RoleClient>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RoleClient {
    pub name: String,
}

impl UserRecord {
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// String (or numeric) field by key; empty strings count as absent.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(value) if !value.is_empty() => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.field("id")
    }

    #[must_use]
    pub fn first_name(&self) -> Option<String> {
        self.field("first_name")
    }

    #[must_use]
    pub fn last_name(&self) -> Option<String> {
        self.field("last_name")
    }

    #[must_use]
    pub fn email(&self) -> Option<String> {
        self.field("email")
    }

    #[must_use]
    pub fn phone(&self) -> Option<String> {
        self.field("phone")
    }

    #[must_use]
    pub fn profile_image(&self) -> Option<String> {
        self.field("profileImage")
    }

    /// Bearer credential for the SSO handoff: `accessToken`, else `token`.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.field("accessToken").or_else(|| self.field("token"))
    }

    /// Roles that parse; malformed entries are skipped.
    #[must_use]
    pub fn roles(&self) -> Vec<Role> {
        self.0
            .get("roles")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(|role| Role::deserialize(role).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Present name parts joined with a space.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<String> = [self.first_name(), self.last_name()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for UserRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
