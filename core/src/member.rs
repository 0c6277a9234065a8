// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

#[derive(
    Serialize,
    Deserialize,
    JsonSchema,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    Owner,
    Manager,
    #[default]
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "OWNER",
            MemberRole::Manager => "MANAGER",
            MemberRole::Member => "MEMBER",
        }
    }

    /// The comma separated form the `roles` query parameter takes
    pub fn join(roles: &[MemberRole]) -> String {
        roles.iter().map(MemberRole::as_str).collect::<Vec<_>>().join(",")
    }
}

// Roles are upper case on the wire but accepted in any case from users.
impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(r: &str) -> Result<Self, Self::Err> {
        match r.trim().to_ascii_uppercase().as_str() {
            "OWNER" => Ok(MemberRole::Owner),
            "MANAGER" => Ok(MemberRole::Manager),
            "MEMBER" => Ok(MemberRole::Member),
            _ => Err(format!("{r} not a valid member role")),
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A group membership record
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub email: String,

    #[serde(default)]
    pub role: MemberRole,

    /// USER, GROUP, CUSTOMER or EXTERNAL
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub member_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Member {
    pub fn new(email: &str, role: MemberRole) -> Self {
        Self { email: email.to_string(), role, ..Default::default() }
    }
}

/// Response of `members.list`
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemberList {
    #[serde(default)]
    pub members: Vec<Member>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl From<MemberList> for Page<Member> {
    fn from(list: MemberList) -> Page<Member> {
        Page::new(list.members, list.next_page_token)
    }
}
