use std::fmt;
use std::str::FromStr;

/// The permission class an action needs before the gateway lets it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionClass {
    Read,
    Write,
    Management,
}

impl PermissionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionClass::Read => "read",
            PermissionClass::Write => "write",
            PermissionClass::Management => "user_management",
        }
    }
}

impl fmt::Display for PermissionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    FindOne,
    Find,
    Count,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    UserManagement,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::FindOne,
        Action::Find,
        Action::Count,
        Action::InsertOne,
        Action::InsertMany,
        Action::UpdateOne,
        Action::UpdateMany,
        Action::DeleteOne,
        Action::DeleteMany,
        Action::UserManagement,
    ];

    pub fn required_class(&self) -> PermissionClass {
        match self {
            Action::FindOne | Action::Find | Action::Count => PermissionClass::Read,
            Action::InsertOne
            | Action::InsertMany
            | Action::UpdateOne
            | Action::UpdateMany
            | Action::DeleteOne
            | Action::DeleteMany => PermissionClass::Write,
            Action::UserManagement => PermissionClass::Management,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::FindOne => "find_one",
            Action::Find => "find",
            Action::Count => "count",
            Action::InsertOne => "insert_one",
            Action::InsertMany => "insert_many",
            Action::UpdateOne => "update_one",
            Action::UpdateMany => "update_many",
            Action::DeleteOne => "delete_one",
            Action::DeleteMany => "delete_many",
            Action::UserManagement => "user_management",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "find_one" => Ok(Action::FindOne),
            "find" => Ok(Action::Find),
            "count" | "count_documents" => Ok(Action::Count),
            "insert_one" => Ok(Action::InsertOne),
            "insert_many" => Ok(Action::InsertMany),
            "update_one" => Ok(Action::UpdateOne),
            "update_many" => Ok(Action::UpdateMany),
            "delete_one" => Ok(Action::DeleteOne),
            "delete_many" => Ok(Action::DeleteMany),
            "user_management" => Ok(Action::UserManagement),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}
