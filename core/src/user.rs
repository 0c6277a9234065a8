// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// A directory user. Only the fields this crate looks at are typed, the
/// vendor sends many more.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub primary_email: String,

    #[serde(default)]
    pub name: UserName,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub suspended: bool,

    #[serde(default)]
    pub archived: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_time: Option<DateTime<Utc>>,
}

/// Response of `users.list`
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserList {
    #[serde(default)]
    pub users: Vec<User>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl From<UserList> for Page<User> {
    fn from(list: UserList) -> Page<User> {
        Page::new(list.users, list.next_page_token)
    }
}
