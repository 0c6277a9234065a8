// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    // An int64 sent as a JSON string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_members_count: Option<String>,

    #[serde(default)]
    pub admin_created: bool,
}

impl Group {
    pub fn direct_members_count(&self) -> Option<u64> {
        self.direct_members_count.as_deref()?.parse().ok()
    }
}

/// Response of `groups.list`
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroupList {
    #[serde(default)]
    pub groups: Vec<Group>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl From<GroupList> for Page<Group> {
    fn from(list: GroupList) -> Page<Group> {
        Page::new(list.groups, list.next_page_token)
    }
}

/// One group a user belongs to, with the user's membership record in it
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GroupMembership {
    pub group: Group,
    pub member: Member,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_direct_members_count_is_parsed_from_string() {
        let group: Group = serde_json::from_value(serde_json::json!({
            "id": "01abc",
            "email": "sales@dundermifflin.com",
            "name": "Sales",
            "directMembersCount": "12",
            "adminCreated": true
        }))
        .unwrap();

        assert_eq!(group.direct_members_count(), Some(12));
        assert!(group.admin_created);

        let group = Group { direct_members_count: None, ..group };
        assert_eq!(group.direct_members_count(), None);
    }
}
