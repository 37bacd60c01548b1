//! User profile projection carried in the session.

use serde::{Deserialize, Deserializer, Serialize};

/// The subset of the upstream user that the storefront keeps around.
///
/// Every field is optional: login returns the full projection, while
/// registration and some refresh variants return only a few fields. Use
/// [`SessionUser::merge`] to fold a partial update over a known profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub database_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_roles")]
    pub roles: Option<Vec<String>>,
}

impl SessionUser {
    /// Overlay the fields present in `update` on top of `self`.
    #[must_use]
    pub fn merge(self, update: Self) -> Self {
        Self {
            id: update.id.or(self.id),
            database_id: update.database_id.or(self.database_id),
            username: update.username.or(self.username),
            email: update.email.or(self.email),
            first_name: update.first_name.or(self.first_name),
            last_name: update.last_name.or(self.last_name),
            display_name: update.display_name.or(self.display_name),
            roles: update.roles.or(self.roles),
        }
    }

    /// Best label for greeting the user.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.email.as_deref())
    }
}

/// Flatten the shapes a role list arrives in.
///
/// The commerce API returns roles as a connection (`{"nodes": [{"name": ..}]}`),
/// older plugins return a plain list of names or of `{name}` objects, and the
/// session client reads back what was persisted (a plain list). Anything
/// unrecognised yields an empty list rather than an error.
#[must_use]
pub fn normalize_roles(value: &serde_json::Value) -> Vec<String> {
    use serde_json::Value;

    fn role_name(item: &Value) -> Option<String> {
        match item {
            Value::String(name) => Some(name.clone()),
            Value::Object(map) => map
                .get("name")
                .or_else(|| map.get("displayName"))
                .and_then(Value::as_str)
                .map(str::to_owned),
            _ => None,
        }
    }

    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("nodes").or_else(|| map.get("edges")) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) if map.contains_key("node") => map.get("node").and_then(role_name),
            other => role_name(other),
        })
        .filter(|name| !name.trim().is_empty())
        .collect()
}

fn deserialize_roles<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !v.is_null())
        .map(|v| normalize_roles(&v)))
}
