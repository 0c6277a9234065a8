// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use gadmin_rs::LicenseAssignment;
use gadmin_rs::LicenseAssignmentInsert;
use gadmin_rs::LicenseAssignmentList;

use super::*;

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListLicensesQuery {
    customer_id: String,
    max_results: Option<u32>,
    page_token: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ProductPathParam {
    product_id: String,
}

fn list_page(
    state: &mut MockState,
    query: &ListLicensesQuery,
    product_id: &str,
    sku_id: Option<&str>,
) -> Result<LicenseAssignmentList, ApiFailure> {
    let items = state.list_licenses(&query.customer_id, product_id, sku_id)?;
    let (items, next_page_token) = paginate(
        items,
        query.page_token.as_deref(),
        query.max_results,
        DEFAULT_PAGE_SIZE,
        MAX_PAGE_SIZE,
    )?;
    Ok(LicenseAssignmentList { items, next_page_token })
}

#[endpoint {
    method = GET,
    path = "/apps/licensing/v1/product/{product_id}/users"
}]
pub async fn list_for_product(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<ProductPathParam>,
    query_params: Query<ListLicensesQuery>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let path_param = path_param.into_inner();
    let query = query_params.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, false, |state| {
            list_page(state, &query, &path_param.product_id, None)
        })
        .await
}

#[derive(Deserialize, JsonSchema)]
pub struct SkuPathParam {
    product_id: String,
    sku_id: String,
}

#[endpoint {
    method = GET,
    path = "/apps/licensing/v1/product/{product_id}/sku/{sku_id}/users"
}]
pub async fn list_for_product_and_sku(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<SkuPathParam>,
    query_params: Query<ListLicensesQuery>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let path_param = path_param.into_inner();
    let query = query_params.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, false, |state| {
            list_page(
                state,
                &query,
                &path_param.product_id,
                Some(&path_param.sku_id),
            )
        })
        .await
}

#[endpoint {
    method = POST,
    path = "/apps/licensing/v1/product/{product_id}/sku/{sku_id}/user"
}]
pub async fn insert_license(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<SkuPathParam>,
    body: TypedBody<LicenseAssignmentInsert>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let path_param = path_param.into_inner();
    let request = body.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, true, |state| {
            state.insert_license(
                &path_param.product_id,
                &path_param.sku_id,
                &request.user_id,
            )
        })
        .await
}

#[derive(Deserialize, JsonSchema)]
pub struct AssignmentPathParam {
    product_id: String,
    sku_id: String,
    user_id: String,
}

#[endpoint {
    method = GET,
    path = "/apps/licensing/v1/product/{product_id}/sku/{sku_id}/user/{user_id}"
}]
pub async fn get_license(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<AssignmentPathParam>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let p = path_param.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, false, |state| {
            state.get_license(&p.product_id, &p.sku_id, &p.user_id)
        })
        .await
}

#[endpoint {
    method = PUT,
    path = "/apps/licensing/v1/product/{product_id}/sku/{sku_id}/user/{user_id}"
}]
pub async fn update_license(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<AssignmentPathParam>,
    body: TypedBody<LicenseAssignment>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let p = path_param.into_inner();
    let target = body.into_inner();

    apictx
        .serve(&rqctx, StatusCode::OK, true, |state| {
            state.update_license(&p.product_id, &p.sku_id, &p.user_id, &target)
        })
        .await
}

#[endpoint {
    method = DELETE,
    path = "/apps/licensing/v1/product/{product_id}/sku/{sku_id}/user/{user_id}"
}]
pub async fn delete_license(
    rqctx: RequestContext<Arc<ServerContext>>,
    path_param: Path<AssignmentPathParam>,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let p = path_param.into_inner();

    apictx
        .serve(&rqctx, StatusCode::NO_CONTENT, true, |state| {
            state.delete_license(&p.product_id, &p.sku_id, &p.user_id)
        })
        .await
}
