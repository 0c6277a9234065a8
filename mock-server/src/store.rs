// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::Utc;
use gadmin_rs::Group;
use gadmin_rs::LicenseAssignment;
use gadmin_rs::Member;
use gadmin_rs::MemberRole;
use gadmin_rs::User;
use gadmin_rs::UserName;
use gadmin_rs::product_by_sku_id;
use iddqd::IdOrdItem;
use iddqd::IdOrdMap;
use iddqd::id_upcast;
use uuid::Uuid;

use super::*;

#[derive(Clone, Debug)]
struct StoredMember {
    key: String,
    member: Member,
}

impl IdOrdItem for StoredMember {
    type Key<'a> = &'a str;

    fn key(&self) -> Self::Key<'_> {
        &self.key
    }

    id_upcast!();
}

#[derive(Clone, Debug)]
struct StoredGroup {
    group: Group,
    members: IdOrdMap<StoredMember>,
}

impl StoredGroup {
    fn view(&self) -> Group {
        Group {
            direct_members_count: Some(self.members.len().to_string()),
            ..self.group.clone()
        }
    }
}

/// A license key: product ID, SKU ID, lower cased user ID
type LicenseKey = (String, String, String);

fn key_of(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn domain_suffix(domain: &str) -> String {
    format!("@{}", key_of(domain))
}

/// Everything the mock server knows about one customer
#[derive(Debug)]
pub struct MockState {
    customer_id: String,
    users: BTreeMap<String, User>,
    groups: BTreeMap<String, StoredGroup>,
    subscriptions: BTreeSet<String>,
    licenses: BTreeMap<LicenseKey, LicenseAssignment>,
}

impl MockState {
    pub fn new(customer_id: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            users: BTreeMap::new(),
            groups: BTreeMap::new(),
            subscriptions: BTreeSet::new(),
            licenses: BTreeMap::new(),
        }
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    // Seeding

    pub fn add_user(&mut self, mut user: User) -> User {
        if user.id.is_empty() {
            user.id = Uuid::new_v4().simple().to_string();
        }
        if user.customer_id.is_none() {
            user.customer_id = Some(self.customer_id.clone());
        }
        if user.org_unit_path.is_none() {
            user.org_unit_path = Some("/".to_string());
        }
        if user.creation_time.is_none() {
            user.creation_time = Some(Utc::now());
        }
        if user.name.full_name.is_none() {
            let full_name = [&user.name.given_name, &user.name.family_name]
                .into_iter()
                .flatten()
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            if !full_name.is_empty() {
                user.name.full_name = Some(full_name);
            }
        }

        self.users.insert(key_of(&user.primary_email), user.clone());
        user
    }

    pub fn add_group(&mut self, email: &str, name: &str) -> Group {
        let group = Group {
            id: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            admin_created: true,
            ..Default::default()
        };

        self.groups.insert(
            key_of(email),
            StoredGroup { group: group.clone(), members: IdOrdMap::new() },
        );
        group
    }

    pub fn subscribe(&mut self, product_id: &str) {
        self.subscriptions.insert(product_id.to_string());
    }

    // Users

    fn find_user(&self, user_key: &str) -> Option<&User> {
        self.users
            .get(&key_of(user_key))
            .or_else(|| self.users.values().find(|u| u.id == user_key))
    }

    pub fn get_user(&self, user_key: &str) -> Result<User, ApiFailure> {
        self.find_user(user_key)
            .cloned()
            .ok_or_else(|| ApiFailure::not_found(user_key))
    }

    pub fn list_users(
        &self,
        domain: Option<&str>,
        customer: Option<&str>,
        query: Option<&str>,
    ) -> Result<Vec<User>, ApiFailure> {
        let filters = match query {
            Some(query) => UserFilter::parse_all(query)?,
            None => vec![],
        };

        let scope = match (domain, customer) {
            (Some(domain), _) => Scope::Domain(domain_suffix(domain)),
            (None, Some(customer))
                if customer == "my_customer" || customer == self.customer_id =>
            {
                Scope::Customer
            }
            (None, Some(customer)) => {
                return Err(ApiFailure::invalid(format!(
                    "Invalid customer {customer}"
                )));
            }
            (None, None) => {
                return Err(ApiFailure::invalid(
                    "Bad Request: domain or customer required".to_string(),
                ));
            }
        };

        Ok(self
            .users
            .iter()
            .filter(|(key, _)| match &scope {
                Scope::Domain(suffix) => key.ends_with(suffix.as_str()),
                Scope::Customer => true,
            })
            .map(|(_, user)| user)
            .filter(|user| filters.iter().all(|f| f.matches(user)))
            .cloned()
            .collect())
    }

    // Groups

    fn group(&self, group_key: &str) -> Result<&StoredGroup, ApiFailure> {
        self.groups
            .get(&key_of(group_key))
            .or_else(|| self.groups.values().find(|g| g.group.id == group_key))
            .ok_or_else(|| ApiFailure::not_found(group_key))
    }

    fn group_mut(
        &mut self,
        group_key: &str,
    ) -> Result<&mut StoredGroup, ApiFailure> {
        let key = match self.groups.contains_key(&key_of(group_key)) {
            true => key_of(group_key),
            false => self
                .groups
                .iter()
                .find(|(_, g)| g.group.id == group_key)
                .map(|(key, _)| key.clone())
                .ok_or_else(|| ApiFailure::not_found(group_key))?,
        };

        self.groups
            .get_mut(&key)
            .ok_or_else(|| ApiFailure::not_found(group_key))
    }

    pub fn get_group(&self, group_key: &str) -> Result<Group, ApiFailure> {
        Ok(self.group(group_key)?.view())
    }

    /// Supports `memberKey=<email>` and `email:<prefix>*` queries
    pub fn list_groups(
        &self,
        domain: Option<&str>,
        query: Option<&str>,
    ) -> Result<Vec<Group>, ApiFailure> {
        let suffix = domain.map(domain_suffix);
        let member_key = match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => None,
            Some(query) => match query.split_once('=') {
                Some(("memberKey", email)) => {
                    Some(GroupFilter::Member(key_of(email)))
                }
                _ => match query.strip_prefix("email:") {
                    Some(pattern) => {
                        Some(GroupFilter::Email(pattern.to_string()))
                    }
                    None => {
                        return Err(ApiFailure::invalid(format!(
                            "Invalid Input: {query}"
                        )));
                    }
                },
            },
        };

        Ok(self
            .groups
            .iter()
            .filter(|(key, _)| {
                suffix.as_ref().is_none_or(|s| key.ends_with(s.as_str()))
            })
            .filter(|(key, stored)| match &member_key {
                None => true,
                Some(GroupFilter::Member(email)) => {
                    stored.members.get(email.as_str()).is_some()
                }
                Some(GroupFilter::Email(pattern)) => {
                    matches_pattern(key, pattern)
                }
            })
            .map(|(_, stored)| stored.view())
            .collect())
    }

    // Members

    pub fn get_member(
        &self,
        group_key: &str,
        member_key: &str,
    ) -> Result<Member, ApiFailure> {
        self.group(group_key)?
            .members
            .get(key_of(member_key).as_str())
            .map(|stored| stored.member.clone())
            .ok_or_else(|| ApiFailure::not_found(member_key))
    }

    pub fn list_members(
        &self,
        group_key: &str,
        roles: Option<&str>,
    ) -> Result<Vec<Member>, ApiFailure> {
        let roles = match roles.filter(|r| !r.trim().is_empty()) {
            None => None,
            Some(roles) => Some(
                roles
                    .split(',')
                    .map(str::parse::<MemberRole>)
                    .collect::<Result<BTreeSet<_>, _>>()
                    .map_err(ApiFailure::invalid)?,
            ),
        };

        Ok(self
            .group(group_key)?
            .members
            .iter()
            .filter(|stored| {
                roles.as_ref().is_none_or(|r| r.contains(&stored.member.role))
            })
            .map(|stored| stored.member.clone())
            .collect())
    }

    pub fn insert_member(
        &mut self,
        group_key: &str,
        member: Member,
    ) -> Result<Member, ApiFailure> {
        if member.email.trim().is_empty() {
            return Err(ApiFailure::invalid(
                "Missing required field: memberKey".to_string(),
            ));
        }

        let key = key_of(&member.email);
        let (id, member_type) = match self.find_user(&key) {
            Some(user) => (user.id.clone(), "USER"),
            None => match self.groups.get(&key) {
                Some(stored) => (stored.group.id.clone(), "GROUP"),
                None => (Uuid::new_v4().simple().to_string(), "USER"),
            },
        };

        let member = Member {
            id: Some(id),
            email: member.email,
            role: member.role,
            member_type: Some(member_type.to_string()),
            status: Some("ACTIVE".to_string()),
        };

        let group = self.group_mut(group_key)?;
        group
            .members
            .insert_unique(StoredMember { key, member: member.clone() })
            .map_err(|_| ApiFailure::duplicate("Member already exists."))?;

        Ok(member)
    }

    pub fn delete_member(
        &mut self,
        group_key: &str,
        member_key: &str,
    ) -> Result<(), ApiFailure> {
        self.group_mut(group_key)?
            .members
            .remove(key_of(member_key).as_str())
            .map(|_| ())
            .ok_or_else(|| ApiFailure::not_found(member_key))
    }

    // Licenses

    fn check_customer(&self, customer_id: &str) -> Result<(), ApiFailure> {
        if customer_id == self.customer_id {
            Ok(())
        } else {
            Err(ApiFailure::invalid(format!(
                "Invalid customerId {customer_id}"
            )))
        }
    }

    fn check_subscription(&self, product_id: &str) -> Result<(), ApiFailure> {
        if self.subscriptions.contains(product_id) {
            Ok(())
        } else {
            Err(ApiFailure::invalid(format!(
                "Invalid productId {product_id}"
            )))
        }
    }

    /// Unsubscribed products answer 400, as the Licensing API does.
    pub fn list_licenses(
        &self,
        customer_id: &str,
        product_id: &str,
        sku_id: Option<&str>,
    ) -> Result<Vec<LicenseAssignment>, ApiFailure> {
        self.check_customer(customer_id)?;
        self.check_subscription(product_id)?;

        Ok(self
            .licenses
            .iter()
            .filter(|((product, sku, _), _)| {
                product == product_id && sku_id.is_none_or(|s| s == sku)
            })
            .map(|(_, assignment)| assignment.clone())
            .collect())
    }

    pub fn get_license(
        &self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> Result<LicenseAssignment, ApiFailure> {
        let key =
            (product_id.to_string(), sku_id.to_string(), key_of(user_id));

        self.licenses
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiFailure::not_found(user_id))
    }

    fn assignment(
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> LicenseAssignment {
        let product = product_by_sku_id(sku_id);

        LicenseAssignment {
            product_id: product_id.to_string(),
            product_name: product.map(|p| p.product_name.to_string()),
            sku_id: sku_id.to_string(),
            sku_name: product.map(|p| p.sku_name.to_string()),
            user_id: user_id.to_string(),
            etags: Some(Uuid::new_v4().simple().to_string()),
            self_link: Some(format!(
                "/apps/licensing/v1/product/{product_id}/sku/{sku_id}/user/\
                 {user_id}"
            )),
        }
    }

    pub fn insert_license(
        &mut self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> Result<LicenseAssignment, ApiFailure> {
        if user_id.trim().is_empty() {
            return Err(ApiFailure::invalid(
                "Missing required field: userId".to_string(),
            ));
        }

        let key =
            (product_id.to_string(), sku_id.to_string(), key_of(user_id));
        if self.licenses.contains_key(&key) {
            return Err(ApiFailure::duplicate(
                "User already has a license for the specified product and SKU",
            ));
        }

        let assignment = Self::assignment(product_id, sku_id, user_id);
        self.subscribe(product_id);
        self.licenses.insert(key, assignment.clone());
        Ok(assignment)
    }

    /// Move the assignment at `(product_id, sku_id, user_id)` to the SKU
    /// named in `target`.
    pub fn update_license(
        &mut self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
        target: &LicenseAssignment,
    ) -> Result<LicenseAssignment, ApiFailure> {
        if target.sku_id.is_empty() {
            return Err(ApiFailure::invalid(
                "Missing required field: skuId".to_string(),
            ));
        }

        let key =
            (product_id.to_string(), sku_id.to_string(), key_of(user_id));
        if !self.licenses.contains_key(&key) {
            return Err(ApiFailure::not_found(user_id));
        }

        let target_product = match target.product_id.is_empty() {
            true => product_id,
            false => target.product_id.as_str(),
        };
        let new_key =
            (target_product.to_string(), target.sku_id.clone(), key.2.clone());
        if new_key != key && self.licenses.contains_key(&new_key) {
            return Err(ApiFailure::duplicate(
                "User already has a license for the specified product and SKU",
            ));
        }

        self.licenses.remove(&key);
        let assignment =
            Self::assignment(target_product, &target.sku_id, user_id);
        self.subscribe(target_product);
        self.licenses.insert(new_key, assignment.clone());
        Ok(assignment)
    }

    pub fn delete_license(
        &mut self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> Result<(), ApiFailure> {
        let key =
            (product_id.to_string(), sku_id.to_string(), key_of(user_id));

        self.licenses
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| ApiFailure::not_found(user_id))
    }
}

enum Scope {
    Domain(String),
    Customer,
}

enum GroupFilter {
    Member(String),
    Email(String),
}

/// `prefix*` matches by prefix, anything else matches exactly.
fn matches_pattern(value: &str, pattern: &str) -> bool {
    let pattern = key_of(pattern);
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => value == pattern,
    }
}

/// One term of a `users.list` query
#[derive(Debug, PartialEq)]
enum UserFilter {
    Email(String),
    GivenName(String),
    FamilyName(String),
    Suspended(bool),
    Archived(bool),
    IsAdmin(bool),
    OrgUnitPath(String),
}

impl UserFilter {
    fn parse_all(query: &str) -> Result<Vec<UserFilter>, ApiFailure> {
        query.split_whitespace().map(UserFilter::parse).collect()
    }

    fn parse(term: &str) -> Result<UserFilter, ApiFailure> {
        let invalid = || ApiFailure::invalid(format!("Invalid Input: {term}"));

        let (field, value) = term
            .split_once(':')
            .or_else(|| term.split_once('='))
            .ok_or_else(invalid)?;
        let value = value.trim_matches('\'');

        let flag = |value: &str| match value.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(invalid()),
        };

        Ok(match field {
            "email" => UserFilter::Email(value.to_string()),
            "givenName" => UserFilter::GivenName(value.to_string()),
            "familyName" => UserFilter::FamilyName(value.to_string()),
            "isSuspended" => UserFilter::Suspended(flag(value)?),
            "isArchived" => UserFilter::Archived(flag(value)?),
            "isAdmin" => UserFilter::IsAdmin(flag(value)?),
            "orgUnitPath" => UserFilter::OrgUnitPath(value.to_string()),
            _ => return Err(invalid()),
        })
    }

    fn matches(&self, user: &User) -> bool {
        let name = |part: &Option<String>, pattern: &str| {
            part.as_deref()
                .is_some_and(|p| matches_pattern(&key_of(p), pattern))
        };

        match self {
            UserFilter::Email(pattern) => {
                matches_pattern(&key_of(&user.primary_email), pattern)
            }
            UserFilter::GivenName(p) => name(&user.name.given_name, p),
            UserFilter::FamilyName(p) => name(&user.name.family_name, p),
            UserFilter::Suspended(flag) => user.suspended == *flag,
            UserFilter::Archived(flag) => user.archived == *flag,
            UserFilter::IsAdmin(flag) => user.is_admin == *flag,
            UserFilter::OrgUnitPath(path) => {
                user.org_unit_path.as_deref().unwrap_or("/") == path
            }
        }
    }
}

/// A user with just an email and a name, for seeding
pub fn user(email: &str, given_name: &str, family_name: &str) -> User {
    User {
        primary_email: email.to_string(),
        name: UserName {
            given_name: Some(given_name.to_string()),
            family_name: Some(family_name.to_string()),
            full_name: None,
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use gadmin_rs::BUSINESS_STANDARD;
    use gadmin_rs::ENTERPRISE_PLUS;

    use super::*;

    fn state() -> MockState {
        let mut state = MockState::new("C0test");
        state.add_user(user("mscott@dundermifflin.com", "Michael", "Scott"));
        state.add_user(User {
            suspended: true,
            ..user("tflenderson@dundermifflin.com", "Toby", "Flenderson")
        });
        state.add_user(user("dwallace@dundermifflin.org", "David", "Wallace"));
        state.add_group("sales@dundermifflin.com", "Sales");
        state
    }

    #[test]
    fn test_user_queries() {
        let state = state();

        let all = state
            .list_users(Some("dundermifflin.com"), None, None)
            .unwrap();
        assert_eq!(all.len(), 2);

        let suspended = state
            .list_users(
                Some("dundermifflin.com"),
                None,
                Some("isSuspended=true"),
            )
            .unwrap();
        assert_eq!(suspended.len(), 1);
        assert_eq!(suspended[0].primary_email, "tflenderson@dundermifflin.com");

        let by_prefix = state
            .list_users(None, Some("my_customer"), Some("email:dw*"))
            .unwrap();
        assert_eq!(by_prefix.len(), 1);

        assert!(
            state
                .list_users(Some("dundermifflin.com"), None, Some("bogus"))
                .is_err()
        );
    }

    #[test]
    fn test_member_lifecycle() {
        let mut state = state();

        let member = state
            .insert_member(
                "sales@dundermifflin.com",
                Member::new("MScott@dundermifflin.com", MemberRole::Owner),
            )
            .unwrap();
        assert_eq!(member.member_type.as_deref(), Some("USER"));

        let duplicate = state
            .insert_member(
                "sales@dundermifflin.com",
                Member::new("mscott@dundermifflin.com", MemberRole::Member),
            )
            .unwrap_err();
        assert_eq!(duplicate.status, StatusCode::CONFLICT);

        let groups = state
            .list_groups(None, Some("memberKey=mscott@dundermifflin.com"))
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].direct_members_count(), Some(1));

        let owners = state
            .list_members("sales@dundermifflin.com", Some("OWNER"))
            .unwrap();
        assert_eq!(owners.len(), 1);
        let managers = state
            .list_members("sales@dundermifflin.com", Some("MANAGER"))
            .unwrap();
        assert!(managers.is_empty());

        state
            .delete_member(
                "sales@dundermifflin.com",
                "mscott@dundermifflin.com",
            )
            .unwrap();
        let missing = state
            .delete_member(
                "sales@dundermifflin.com",
                "mscott@dundermifflin.com",
            )
            .unwrap_err();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_license_lifecycle() {
        let mut state = state();
        let sku = BUSINESS_STANDARD.sku();

        // Nothing subscribed yet
        assert!(
            state.list_licenses("C0test", sku.product_id, None).is_err()
        );

        let user = "mscott@dundermifflin.com";
        let assignment =
            state.insert_license(sku.product_id, sku.sku_id, user).unwrap();
        assert_eq!(
            assignment.sku_name.as_deref(),
            Some("Google Workspace Business Standard")
        );

        let again = state.insert_license(sku.product_id, sku.sku_id, user);
        assert!(again.is_err());

        let target = LicenseAssignment {
            product_id: ENTERPRISE_PLUS.product_id.to_string(),
            sku_id: ENTERPRISE_PLUS.sku_id.to_string(),
            ..Default::default()
        };
        state
            .update_license(sku.product_id, sku.sku_id, user, &target)
            .unwrap();

        assert!(state.get_license(sku.product_id, sku.sku_id, user).is_err());
        assert_eq!(
            state
                .list_licenses("C0test", ENTERPRISE_PLUS.product_id, None)
                .unwrap()
                .len(),
            1
        );
        assert!(
            state
                .list_licenses("C0other", ENTERPRISE_PLUS.product_id, None)
                .is_err()
        );
    }
}
