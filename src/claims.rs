use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// The `aud` claim, which issuers send either as a single string or as an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// Whether `audience` is one of the values in this claim.
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(value) => value == audience,
            Self::Many(values) => values.iter().any(|value| value == audience),
        }
    }

    /// Every audience value, in the order the issuer listed them
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        };
        values.iter().map(String::as_str)
    }
}

/// Decoded claims of a verified token.
///
/// Registered claims are typed; everything else the issuer put in the payload
/// is kept in `extra` so handlers can make their own authorization decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, typically the user ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Intended recipients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiration time as Unix timestamp
    pub exp: i64,
    /// Not-before time as Unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Issued-at time as Unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Every other claim in the payload
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Look up any claim that is not one of the registered ones.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// The `preferred_username` claim
    pub fn preferred_username(&self) -> Option<&str> {
        self.get("preferred_username").and_then(Value::as_str)
    }

    /// The `email` claim
    pub fn email(&self) -> Option<&str> {
        self.get("email").and_then(Value::as_str)
    }

    /// OAuth scopes from the space-separated `scope` claim.
    pub fn scopes(&self) -> Vec<&str> {
        self.get("scope")
            .and_then(Value::as_str)
            .map(|scope| scope.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Roles granted to the subject.
    ///
    /// Realm roles from `realm_access.roles` come first, followed by the roles
    /// of every client listed under `resource_access`.
    pub fn roles(&self) -> Vec<&str> {
        let mut roles = Vec::new();

        if let Some(realm_access) = self.get("realm_access") {
            roles.extend(role_names(realm_access));
        }

        if let Some(Value::Object(clients)) = self.get("resource_access") {
            for client in clients.values() {
                roles.extend(role_names(client));
            }
        }

        roles
    }

    /// Whether `role` is granted as a realm or client role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles().contains(&role)
    }

    /// Whether at least one of `roles` is granted
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        let granted = self.roles();
        roles.iter().any(|role| granted.contains(&role.as_ref()))
    }

    /// Whether every one of `roles` is granted
    pub fn has_all_roles<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        let granted = self.roles();
        roles.iter().all(|role| granted.contains(&role.as_ref()))
    }
}

fn role_names(access: &Value) -> impl Iterator<Item = &str> {
    access
        .get("roles")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}
