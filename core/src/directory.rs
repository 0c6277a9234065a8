// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ops::ControlFlow;

use slog::Logger;
use slog::debug;
use slog::info;
use slog::o;
use tokio::sync::mpsc;

use super::*;

/// The largest page `users.list` serves
pub const USERS_PAGE_SIZE: u32 = 500;

/// The largest page `members.list` serves
pub const MEMBERS_PAGE_SIZE: u32 = 200;

/// The largest page `groups.list` serves
pub const GROUPS_PAGE_SIZE: u32 = 200;

/// Users, groups and group memberships of the administrator's domain
#[derive(Clone)]
pub struct DirectoryApi {
    log: Logger,
    client: AdminClient,
    customer_id: String,
    admin_email: String,
    domain: String,
}

impl std::fmt::Debug for DirectoryApi {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DirectoryApi")
            .field("customer_id", &self.customer_id)
            .field("admin_email", &self.admin_email)
            .field("domain", &self.domain)
            .finish()
    }
}

impl DirectoryApi {
    /// Look up the administrator to learn the customer ID every other call
    /// is scoped by.
    pub async fn build(
        log: &Logger,
        client: AdminClient,
        admin_email: &str,
    ) -> Result<Self, Error> {
        let domain = domain_of(admin_email)?;

        let url = client.url(
            Api::Directory,
            &["users", admin_email],
            &[("fields", "customerId".to_string())],
        )?;
        let admin: User = client.get_json(url).await?;

        let customer_id = admin
            .customer_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MissingCustomerId(admin_email.to_string()))?;

        let log = log.new(o!("api" => "directory"));
        info!(log, "directory api built";
            "customer_id" => &customer_id,
            "admin_email" => admin_email,
            "domain" => &domain
        );

        Ok(Self {
            log,
            client,
            customer_id,
            admin_email: admin_email.to_string(),
            domain,
        })
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    // Users

    async fn users_page(
        &self,
        query: &str,
        page_token: Option<String>,
    ) -> Result<Page<User>, Error> {
        let mut params = vec![
            ("domain", self.domain.clone()),
            ("maxResults", USERS_PAGE_SIZE.to_string()),
        ];
        if !query.is_empty() {
            params.push(("query", query.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let url = self.client.url(Api::Directory, &["users"], &params)?;
        let list: UserList = self.client.get_json(url).await?;
        Ok(list.into())
    }

    /// Every user of the domain matching `query` (empty for all users).
    pub async fn list_users(&self, query: &str) -> Result<Vec<User>, Error> {
        let mut so_far = 0;
        collect_pages(PageEnd::NoToken, async |token| {
            let page = self.users_page(query, token).await?;
            so_far += page.items.len();
            info!(self.log, "listing users";
                "query" => query,
                "so_far" => so_far
            );
            Ok(page)
        })
        .await
    }

    /// Like `list_users`, but hands each page to `tx` as soon as it arrives.
    /// The next page is not requested until the receiver has room for it.
    /// Returns the number of users the receiver was handed. A dropped
    /// receiver ends the listing early.
    pub async fn stream_users(
        &self,
        query: &str,
        tx: mpsc::Sender<Vec<User>>,
    ) -> Result<usize, Error> {
        let mut so_far = 0;
        let mut delivered = 0;
        walk_pages(
            PageEnd::NoToken,
            async |token| {
                let page = self.users_page(query, token).await?;
                so_far += page.items.len();
                info!(self.log, "streaming users";
                    "query" => query,
                    "page" => page.items.len(),
                    "so_far" => so_far
                );
                Ok(page)
            },
            async |users: Vec<User>| {
                let count = users.len();
                match tx.send(users).await {
                    Ok(()) => {
                        delivered += count;
                        ControlFlow::Continue(())
                    }
                    Err(_) => {
                        debug!(self.log, "user page receiver dropped";
                            "query" => query,
                            "delivered" => delivered
                        );
                        ControlFlow::Break(())
                    }
                }
            },
        )
        .await?;

        Ok(delivered)
    }

    pub async fn get_user(&self, user_key: &str) -> Result<User, Error> {
        let url = self.client.url(Api::Directory, &["users", user_key], &[])?;
        self.client.get_json(url).await
    }

    // Groups

    /// Every group of the domain, optionally narrowed by a search query.
    pub async fn list_groups(
        &self,
        query: Option<&str>,
    ) -> Result<Vec<Group>, Error> {
        let mut so_far = 0;
        collect_pages(PageEnd::NoToken, async |token| {
            let mut params = vec![
                ("domain", self.domain.clone()),
                ("maxResults", GROUPS_PAGE_SIZE.to_string()),
            ];
            if let Some(query) = query.filter(|q| !q.is_empty()) {
                params.push(("query", query.to_string()));
            }
            if let Some(token) = token {
                params.push(("pageToken", token));
            }

            let url = self.client.url(Api::Directory, &["groups"], &params)?;
            let page: Page<Group> =
                self.client.get_json::<GroupList>(url).await?.into();

            so_far += page.items.len();
            info!(self.log, "listing groups";
                "query" => query.unwrap_or_default(),
                "so_far" => so_far
            );
            Ok(page)
        })
        .await
    }

    pub async fn get_group(&self, group_email: &str) -> Result<Group, Error> {
        let url =
            self.client.url(Api::Directory, &["groups", group_email], &[])?;
        self.client.get_json(url).await
    }

    /// Every group `user_email` is a direct member of, with the user's
    /// membership record in each.
    pub async fn groups_for_user(
        &self,
        user_email: &str,
    ) -> Result<Vec<GroupMembership>, Error> {
        let groups =
            self.list_groups(Some(&format!("memberKey={user_email}"))).await?;

        let count = groups.len();
        let mut memberships = Vec::with_capacity(count);

        for (index, group) in groups.into_iter().enumerate() {
            let member = self.get_member(&group.email, user_email).await?;
            debug!(self.log, "membership";
                "user" => user_email,
                "group" => &group.email,
                "role" => %member.role,
                "index" => index + 1,
                "of" => count
            );
            memberships.push(GroupMembership { group, member });
        }

        Ok(memberships)
    }

    // Members

    pub async fn get_member(
        &self,
        group_email: &str,
        member_key: &str,
    ) -> Result<Member, Error> {
        let url = self.client.url(
            Api::Directory,
            &["groups", group_email, "members", member_key],
            &[],
        )?;
        self.client.get_json(url).await
    }

    /// Members of a group holding any of `roles`, or every member when
    /// `roles` is empty.
    pub async fn list_members(
        &self,
        group_email: &str,
        roles: &[MemberRole],
    ) -> Result<Vec<Member>, Error> {
        let roles = MemberRole::join(roles);
        info!(self.log, "listing members";
            "group" => group_email,
            "roles" => &roles
        );

        let mut so_far = 0;
        let members = collect_pages(PageEnd::NoToken, async |token| {
            let mut params =
                vec![("maxResults", MEMBERS_PAGE_SIZE.to_string())];
            if !roles.is_empty() {
                params.push(("roles", roles.clone()));
            }
            if let Some(token) = token {
                params.push(("pageToken", token));
            }

            let url = self.client.url(
                Api::Directory,
                &["groups", group_email, "members"],
                &params,
            )?;
            let page: Page<Member> =
                self.client.get_json::<MemberList>(url).await?.into();

            so_far += page.items.len();
            debug!(self.log, "members so far";
                "group" => group_email,
                "so_far" => so_far
            );
            Ok(page)
        })
        .await?;

        info!(self.log, "listed members";
            "group" => group_email,
            "count" => members.len()
        );

        Ok(members)
    }

    /// Add a member to a group. Returns `None` when they already were one.
    pub async fn insert_member(
        &self,
        group_email: &str,
        member: &Member,
    ) -> Result<Option<Member>, Error> {
        let url = self.client.url(
            Api::Directory,
            &["groups", group_email, "members"],
            &[],
        )?;

        match self.client.post_json::<_, Member>(url, member).await {
            Ok(inserted) => {
                info!(self.log, "member inserted";
                    "group" => group_email,
                    "member" => &member.email,
                    "role" => %member.role
                );
                Ok(Some(inserted))
            }

            Err(error) if error.is_duplicate() => {
                info!(self.log, "member already present, skipping";
                    "group" => group_email,
                    "member" => &member.email
                );
                Ok(None)
            }

            Err(error) => Err(error),
        }
    }

    pub async fn insert_member_by_email(
        &self,
        group_email: &str,
        email: &str,
        role: MemberRole,
    ) -> Result<Option<Member>, Error> {
        self.insert_member(group_email, &Member::new(email, role)).await
    }

    /// Insert many members with at most `max_concurrency` requests in
    /// flight. Members that already belonged to the group are reported as
    /// unchanged.
    pub async fn insert_members(
        &self,
        group_email: &str,
        members: Vec<Member>,
        max_concurrency: usize,
    ) -> BatchReport<Member> {
        info!(self.log, "inserting members";
            "group" => group_email,
            "count" => members.len()
        );

        let api = self.clone();
        let group = group_email.to_string();

        run_bounded(
            &self.log,
            "insert member",
            members,
            max_concurrency,
            move |member: Member| {
                let api = api.clone();
                let group = group.clone();
                async move {
                    match api.insert_member(&group, &member).await? {
                        Some(_) => Ok(Outcome::Applied),
                        None => Ok(Outcome::Unchanged),
                    }
                }
            },
        )
        .await
    }

    /// Remove a member from a group. Removing someone who is not a member
    /// is `Outcome::Unchanged`. A missing group is an error: the group is
    /// looked up after a 404 to tell the two apart.
    pub async fn delete_member(
        &self,
        group_email: &str,
        member_email: &str,
    ) -> Result<Outcome, Error> {
        let url = self.client.url(
            Api::Directory,
            &["groups", group_email, "members", member_email],
            &[],
        )?;

        match self.client.delete(url).await {
            Ok(()) => {
                info!(self.log, "member deleted";
                    "group" => group_email,
                    "member" => member_email
                );
                Ok(Outcome::Applied)
            }

            Err(error) if error.is_not_found() => {
                self.get_group(group_email).await?;
                info!(self.log, "member already absent, skipping";
                    "group" => group_email,
                    "member" => member_email
                );
                Ok(Outcome::Unchanged)
            }

            Err(error) => Err(error),
        }
    }

    pub async fn delete_members(
        &self,
        group_email: &str,
        member_emails: Vec<String>,
        max_concurrency: usize,
    ) -> BatchReport<String> {
        info!(self.log, "deleting members";
            "group" => group_email,
            "count" => member_emails.len()
        );

        let api = self.clone();
        let group = group_email.to_string();

        run_bounded(
            &self.log,
            "delete member",
            member_emails,
            max_concurrency,
            move |email: String| {
                let api = api.clone();
                let group = group.clone();
                async move { api.delete_member(&group, &email).await }
            },
        )
        .await
    }
}
