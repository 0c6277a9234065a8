// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use gadmin_rs::GroupList;
use gadmin_rs::Member;
use gadmin_rs::MemberList;
use gadmin_rs::UserList;

use super::*;

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    domain: Option<String>,
    customer: Option<String>,
    query: Option<String>,
    max_results: Option<u32>,
    page_token: Option<String>,
}

#[endpoint {
    method = GET,
    path = "/admin/directory/v1/users"
}]
pub async fn list_users(
    rqctx: RequestContext<Arc<ServerContext>>,
    query_params: Query<ListUsersQuery>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let query = query_params.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, false, |state| {
            let users = state.list_users(
                query.domain.as_deref(),
                query.customer.as_deref(),
                query.query.as_deref(),
            )?;
            let (users, next_page_token) = paginate(
                users,
                query.page_token.as_deref(),
                query.max_results,
                100,
                500,
            )?;
            Ok(UserList { users, next_page_token })
        })
        .await
}

#[derive(Deserialize, JsonSchema)]
pub struct UserPathParam {
    user_key: String,
}

#[endpoint {
    method = GET,
    path = "/admin/directory/v1/users/{user_key}"
}]
pub async fn get_user(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<UserPathParam>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let path_param = path_param.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, false, |state| {
            state.get_user(&path_param.user_key)
        })
        .await
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListGroupsQuery {
    domain: Option<String>,
    query: Option<String>,
    max_results: Option<u32>,
    page_token: Option<String>,
}

#[endpoint {
    method = GET,
    path = "/admin/directory/v1/groups"
}]
pub async fn list_groups(
    rqctx: RequestContext<Arc<ServerContext>>,
    query_params: Query<ListGroupsQuery>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let query = query_params.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, false, |state| {
            let groups = state
                .list_groups(query.domain.as_deref(), query.query.as_deref())?;
            let (groups, next_page_token) = paginate(
                groups,
                query.page_token.as_deref(),
                query.max_results,
                200,
                200,
            )?;
            Ok(GroupList { groups, next_page_token })
        })
        .await
}

#[derive(Deserialize, JsonSchema)]
pub struct GroupPathParam {
    group_key: String,
}

#[endpoint {
    method = GET,
    path = "/admin/directory/v1/groups/{group_key}"
}]
pub async fn get_group(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<GroupPathParam>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let path_param = path_param.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, false, |state| {
            state.get_group(&path_param.group_key)
        })
        .await
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListMembersQuery {
    roles: Option<String>,
    max_results: Option<u32>,
    page_token: Option<String>,
}

#[endpoint {
    method = GET,
    path = "/admin/directory/v1/groups/{group_key}/members"
}]
pub async fn list_members(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<GroupPathParam>,
    query_params: Query<ListMembersQuery>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let path_param = path_param.into_inner();
    let query = query_params.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, false, |state| {
            let members = state
                .list_members(&path_param.group_key, query.roles.as_deref())?;
            let (members, next_page_token) = paginate(
                members,
                query.page_token.as_deref(),
                query.max_results,
                200,
                200,
            )?;
            Ok(MemberList { members, next_page_token })
        })
        .await
}

#[endpoint {
    method = POST,
    path = "/admin/directory/v1/groups/{group_key}/members"
}]
pub async fn insert_member(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<GroupPathParam>,
    body: TypedBody<Member>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let path_param = path_param.into_inner();
    let member = body.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, true, |state| {
            state.insert_member(&path_param.group_key, member)
        })
        .await
}

#[derive(Deserialize, JsonSchema)]
pub struct MemberPathParam {
    group_key: String,
    member_key: String,
}

#[endpoint {
    method = GET,
    path = "/admin/directory/v1/groups/{group_key}/members/{member_key}"
}]
pub async fn get_member(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<MemberPathParam>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let path_param = path_param.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, false, |state| {
            state.get_member(&path_param.group_key, &path_param.member_key)
        })
        .await
}

#[endpoint {
    method = DELETE,
    path = "/admin/directory/v1/groups/{group_key}/members/{member_key}"
}]
pub async fn delete_member(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<MemberPathParam>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let path_param = path_param.into_inner();

    apictx
        .serve(&rqctx, StatusCode::NO_CONTENT, true, |state| {
            state.delete_member(&path_param.group_key, &path_param.member_key)
        })
        .await
}
