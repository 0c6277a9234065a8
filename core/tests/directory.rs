// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use gadmin_mock_server::Fault;
use gadmin_mock_server::MockState;
use gadmin_mock_server::user;
use gadmin_rs::DirectoryApi;
use gadmin_rs::Member;
use gadmin_rs::MemberRole;
use gadmin_rs::User;
use reqwest::StatusCode;
use tokio::sync::mpsc;

mod common;
use common::*;

async fn directory(server: &TestServer) -> DirectoryApi {
    DirectoryApi::build(&server.log, server.client(), ADMIN_EMAIL)
        .await
        .unwrap()
}

fn seed_users(state: &mut MockState, count: usize, domain: &str) {
    for i in 0..count {
        let email = format!("user{i:04}@{domain}");
        state.add_user(user(&email, "User", &i.to_string()));
    }
}

fn seed_member(
    state: &mut MockState,
    group: &str,
    email: &str,
    role: MemberRole,
) {
    state.insert_member(group, Member::new(email, role)).unwrap();
}

#[tokio::test]
async fn test_build_learns_customer_id() {
    let server = TestServer::start(|_| {});
    let directory = directory(&server).await;

    assert_eq!(directory.customer_id(), CUSTOMER_ID);
    assert_eq!(directory.domain(), DOMAIN);
    assert_eq!(directory.admin_email(), ADMIN_EMAIL);
}

#[tokio::test]
async fn test_build_fails_for_unknown_admin() {
    let server = TestServer::start(|_| {});

    let error = DirectoryApi::build(
        &server.log,
        server.client(),
        "cminer@dundermifflin.com",
    )
    .await
    .unwrap_err();

    assert!(error.is_not_found());
}

#[tokio::test]
async fn test_list_users_walks_every_page() {
    let server = TestServer::start(|state| {
        seed_users(state, 1100, DOMAIN);
        seed_users(state, 3, "sabre.com");
    });
    let directory = directory(&server).await;
    let before = server.context.request_count();

    let users = directory.list_users("").await.unwrap();

    // 1100 plus the administrator, nobody from the other domain
    assert_eq!(users.len(), 1101);
    assert!(
        users
            .iter()
            .all(|u| u.primary_email.ends_with("@dundermifflin.com"))
    );

    // Pages of 500
    assert_eq!(server.context.request_count() - before, 3);
}

#[tokio::test]
async fn test_list_users_passes_query() {
    let server = TestServer::start(|state| {
        seed_users(state, 5, DOMAIN);
        state.add_user(User {
            suspended: true,
            ..user("tflenderson@dundermifflin.com", "Toby", "Flenderson")
        });
    });
    let directory = directory(&server).await;

    let suspended = directory.list_users("isSuspended=true").await.unwrap();
    assert_eq!(suspended.len(), 1);
    assert_eq!(suspended[0].primary_email, "tflenderson@dundermifflin.com");

    let error = directory.list_users("shoeSize=12").await.unwrap_err();
    assert_eq!(error.api().unwrap().status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_users_hands_over_each_page() {
    let server = TestServer::start(|state| seed_users(state, 1100, DOMAIN));
    let directory = directory(&server).await;

    let (tx, mut rx) = mpsc::channel(1);
    let (streamed, pages) = tokio::join!(directory.stream_users("", tx), async {
        let mut pages = vec![];
        while let Some(page) = rx.recv().await {
            pages.push(page.len());
        }
        pages
    });

    assert_eq!(streamed.unwrap(), 1101);
    assert_eq!(pages, vec![500, 500, 101]);
}

#[tokio::test]
async fn test_stream_users_stops_when_receiver_goes_away() {
    let server = TestServer::start(|state| seed_users(state, 1100, DOMAIN));
    let directory = directory(&server).await;
    let before = server.context.request_count();

    let (tx, mut rx) = mpsc::channel(1);
    let (streamed, first) =
        tokio::join!(directory.stream_users("", tx), async move {
            let first = rx.recv().await;
            drop(rx);
            first
        });

    // The second page was fetched but never received
    assert_eq!(first.unwrap().len(), 500);
    assert_eq!(streamed.unwrap(), 500);

    // The third page is never asked for
    assert_eq!(server.context.request_count() - before, 2);
}

#[tokio::test]
async fn test_groups_for_user() {
    let server = TestServer::start(|state| {
        state.add_group("sales@dundermifflin.com", "Sales");
        state.add_group("accounting@dundermifflin.com", "Accounting");
        state.add_group("management@dundermifflin.com", "Management");

        seed_member(
            state,
            "sales@dundermifflin.com",
            ADMIN_EMAIL,
            MemberRole::Owner,
        );
        seed_member(
            state,
            "management@dundermifflin.com",
            ADMIN_EMAIL,
            MemberRole::Member,
        );
        seed_member(
            state,
            "accounting@dundermifflin.com",
            "omartinez@dundermifflin.com",
            MemberRole::Member,
        );
    });
    let directory = directory(&server).await;

    let mut memberships = directory.groups_for_user(ADMIN_EMAIL).await.unwrap();
    memberships.sort_by(|a, b| a.group.email.cmp(&b.group.email));

    assert_eq!(memberships.len(), 2);
    assert_eq!(memberships[0].group.email, "management@dundermifflin.com");
    assert_eq!(memberships[0].member.role, MemberRole::Member);
    assert_eq!(memberships[1].group.email, "sales@dundermifflin.com");
    assert_eq!(memberships[1].member.role, MemberRole::Owner);

    let none = directory
        .groups_for_user("cbratton@dundermifflin.com")
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_list_members_filters_roles_across_pages() {
    let server = TestServer::start(|state| {
        state.add_group("everyone@dundermifflin.com", "Everyone");
        for i in 0..250 {
            let role = match i % 10 {
                0 => MemberRole::Owner,
                1 | 2 => MemberRole::Manager,
                _ => MemberRole::Member,
            };
            seed_member(
                state,
                "everyone@dundermifflin.com",
                &format!("user{i:04}@dundermifflin.com"),
                role,
            );
        }
    });
    let directory = directory(&server).await;
    let group = "everyone@dundermifflin.com";

    let all = directory.list_members(group, &[]).await.unwrap();
    assert_eq!(all.len(), 250);

    let owners =
        directory.list_members(group, &[MemberRole::Owner]).await.unwrap();
    assert_eq!(owners.len(), 25);
    assert!(owners.iter().all(|m| m.role == MemberRole::Owner));

    let leads = directory
        .list_members(group, &[MemberRole::Owner, MemberRole::Manager])
        .await
        .unwrap();
    assert_eq!(leads.len(), 75);

    let group = directory.get_group(group).await.unwrap();
    assert_eq!(group.direct_members_count(), Some(250));
}

#[tokio::test]
async fn test_insert_member_twice() {
    let server = TestServer::start(|state| {
        state.add_group("sales@dundermifflin.com", "Sales");
    });
    let directory = directory(&server).await;

    let inserted = directory
        .insert_member_by_email(
            "sales@dundermifflin.com",
            "jhalpert@dundermifflin.com",
            MemberRole::Manager,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(inserted.role, MemberRole::Manager);
    assert!(inserted.id.is_some());

    let again = directory
        .insert_member_by_email(
            "sales@dundermifflin.com",
            "jhalpert@dundermifflin.com",
            MemberRole::Member,
        )
        .await
        .unwrap();
    assert!(again.is_none());
}

#[tokio::test]
async fn test_insert_members_skips_existing_and_bounds_concurrency() {
    let server = TestServer::start(|state| {
        state.add_group("sales@dundermifflin.com", "Sales");
        seed_member(
            state,
            "sales@dundermifflin.com",
            "user0003@dundermifflin.com",
            MemberRole::Member,
        );
        seed_member(
            state,
            "sales@dundermifflin.com",
            "user0017@dundermifflin.com",
            MemberRole::Member,
        );
    });
    let directory = directory(&server).await;
    server.context.set_write_latency(Duration::from_millis(20));

    let members: Vec<Member> = (0..30)
        .map(|i| {
            Member::new(
                &format!("user{i:04}@dundermifflin.com"),
                MemberRole::Member,
            )
        })
        .collect();

    let report = directory
        .insert_members("sales@dundermifflin.com", members, 4)
        .await;

    assert!(report.is_success());
    assert_eq!(report.applied.len(), 28);
    assert_eq!(report.total(), 30);

    let unchanged: Vec<&str> =
        report.unchanged.iter().map(|m| m.email.as_str()).collect();
    assert_eq!(
        unchanged,
        vec!["user0003@dundermifflin.com", "user0017@dundermifflin.com"]
    );

    let peak = server.context.peak_in_flight();
    assert!(peak <= 4, "peak in flight was {peak}");
    assert!(peak > 1, "writes never overlapped");

    let members = directory
        .list_members("sales@dundermifflin.com", &[])
        .await
        .unwrap();
    assert_eq!(members.len(), 30);
}

#[tokio::test]
async fn test_insert_members_into_missing_group_fails_each() {
    let server = TestServer::start(|_| {});
    let directory = directory(&server).await;

    let members = vec![
        Member::new("kkapoor@dundermifflin.com", MemberRole::Member),
        Member::new("rhoward@dundermifflin.com", MemberRole::Member),
    ];
    let report = directory
        .insert_members("party-planning@dundermifflin.com", members, 2)
        .await;

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().all(|f| f.error.is_not_found()));
    assert_eq!(report.failed[0].item.email, "kkapoor@dundermifflin.com");
}

#[tokio::test]
async fn test_delete_members_treats_absent_as_unchanged() {
    let server = TestServer::start(|state| {
        state.add_group("sales@dundermifflin.com", "Sales");
        let group = "sales@dundermifflin.com";
        for email in ["abernard@dundermifflin.com", "pvance@dundermifflin.com"]
        {
            seed_member(state, group, email, MemberRole::Member);
        }
    });
    let directory = directory(&server).await;

    let report = directory
        .delete_members(
            "sales@dundermifflin.com",
            vec![
                "abernard@dundermifflin.com".to_string(),
                "dphilbin@dundermifflin.com".to_string(),
                "pvance@dundermifflin.com".to_string(),
            ],
            2,
        )
        .await;

    assert!(report.is_success());
    assert_eq!(
        report.applied,
        vec!["abernard@dundermifflin.com", "pvance@dundermifflin.com"]
    );
    assert_eq!(report.unchanged, vec!["dphilbin@dundermifflin.com"]);

    let members = directory
        .list_members("sales@dundermifflin.com", &[])
        .await
        .unwrap();
    assert!(members.is_empty());
}

#[tokio::test]
async fn test_delete_members_from_missing_group_fails_each() {
    let server = TestServer::start(|_| {});
    let directory = directory(&server).await;

    let report = directory
        .delete_members(
            "party-planning@dundermifflin.com",
            vec![
                "abernard@dundermifflin.com".to_string(),
                "pvance@dundermifflin.com".to_string(),
            ],
            2,
        )
        .await;

    assert!(!report.is_success());
    assert!(report.unchanged.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().all(|f| f.error.is_not_found()));
    assert_eq!(report.failed[1].item, "pvance@dundermifflin.com");
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let server = TestServer::start(|state| {
        state.add_group("sales@dundermifflin.com", "Sales");
    });
    let directory = directory(&server).await;
    let before = server.context.request_count();

    server.context.push_fault(Fault::RateLimited);
    server.context.push_fault(Fault::Unavailable);
    let group = directory.get_group("sales@dundermifflin.com").await.unwrap();
    assert_eq!(group.name, "Sales");
    assert_eq!(server.context.request_count() - before, 3);

    server.context.push_fault(Fault::QuotaExceeded);
    directory.get_group("sales@dundermifflin.com").await.unwrap();
    assert_eq!(server.context.request_count() - before, 5);
}

#[tokio::test]
async fn test_retries_give_up() {
    let server = TestServer::start(|state| {
        state.add_group("sales@dundermifflin.com", "Sales");
    });
    let directory = directory(&server).await;
    let before = server.context.request_count();

    // The test client makes three attempts
    server.context.script_faults([Some(Fault::Unavailable); 3]);
    let error =
        directory.get_group("sales@dundermifflin.com").await.unwrap_err();

    assert!(error.is_retryable());
    assert_eq!(error.api().unwrap().status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(server.context.request_count() - before, 3);
}

#[tokio::test]
async fn test_permanent_errors_are_not_retried() {
    let server = TestServer::start(|state| {
        state.add_group("sales@dundermifflin.com", "Sales");
    });
    let directory = directory(&server).await;
    let before = server.context.request_count();

    server.context.push_fault(Fault::Forbidden);
    let error =
        directory.get_group("sales@dundermifflin.com").await.unwrap_err();

    let api = error.api().unwrap();
    assert_eq!(api.status, StatusCode::FORBIDDEN);
    assert!(api.has_reason("forbidden"));
    assert!(!error.is_retryable());
    assert_eq!(server.context.request_count() - before, 1);
}
