// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use reqwest::Url;
use slog::Logger;
use slog::debug;
use slog::info;
use slog::o;
use slog::warn;

use super::*;

/// The page size the Licensing API uses when none is given
pub const DEFAULT_LICENSE_PAGE_SIZE: u32 = 100;

/// The largest page the Licensing API serves
pub const MAX_LICENSE_PAGE_SIZE: u32 = 1000;

/// `maxResults` to request: zero means the default page, anything else is
/// capped at the largest page the API serves.
fn page_size(max_results: u32) -> u32 {
    match max_results {
        0 => DEFAULT_LICENSE_PAGE_SIZE,
        n => n.min(MAX_LICENSE_PAGE_SIZE),
    }
}

/// License assignments of the administrator's customer
#[derive(Clone)]
pub struct LicensingApi {
    log: Logger,
    client: AdminClient,
    admin_email: String,
    domain: String,
}

impl std::fmt::Debug for LicensingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("LicensingApi")
            .field("admin_email", &self.admin_email)
            .field("domain", &self.domain)
            .finish()
    }
}

impl LicensingApi {
    pub fn new(
        log: &Logger,
        client: AdminClient,
        admin_email: &str,
    ) -> Result<Self, Error> {
        let domain = domain_of(admin_email)?;
        let log = log.new(o!("api" => "licensing"));

        info!(log, "licensing api built";
            "admin_email" => admin_email,
            "domain" => &domain
        );

        Ok(Self {
            log,
            client,
            admin_email: admin_email.to_string(),
            domain,
        })
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Walk one of the `listFor*` endpoints. A 400 ends the listing with
    /// what was collected so far: the API answers that way for products
    /// the customer has no subscription to.
    async fn list(
        &self,
        path: &[&str],
        customer_id: &str,
        max_results: u32,
    ) -> Result<Vec<LicenseAssignment>, Error> {
        let listing = path.join("/");
        let max_results = page_size(max_results);
        let mut sku_name = String::new();
        let mut so_far = 0;

        let assignments =
            collect_pages(PageEnd::NoTokenOrEmptyPage, async |token| {
                let mut params = vec![
                    ("customerId", customer_id.to_string()),
                    ("maxResults", max_results.to_string()),
                ];
                if let Some(token) = token {
                    params.push(("pageToken", token));
                }

                let url = self.client.url(Api::Licensing, path, &params)?;
                let page: Page<LicenseAssignment> = match self
                    .client
                    .get_json::<LicenseAssignmentList>(url)
                    .await
                {
                    Ok(list) => list.into(),

                    Err(error)
                        if error.api().is_some_and(|e| {
                            e.status == StatusCode::BAD_REQUEST
                        }) =>
                    {
                        warn!(self.log, "listing rejected, keeping results";
                            "listing" => &listing,
                            "customer_id" => customer_id,
                            "error" => %error
                        );
                        Page::last_empty()
                    }

                    Err(error) => return Err(error),
                };

                if let Some(name) =
                    page.items.first().and_then(|a| a.sku_name.as_ref())
                {
                    sku_name = name.clone();
                }

                so_far += page.items.len();
                debug!(self.log, "licenses so far";
                    "listing" => &listing,
                    "sku_name" => &sku_name,
                    "so_far" => so_far
                );
                Ok(page)
            })
            .await?;

        info!(self.log, "listed licenses";
            "listing" => &listing,
            "sku_name" => &sku_name,
            "count" => assignments.len()
        );

        Ok(assignments)
    }

    /// Every assignment of any SKU of a product
    pub async fn list_for_product(
        &self,
        product_id: &str,
        customer_id: &str,
        max_results: u32,
    ) -> Result<Vec<LicenseAssignment>, Error> {
        self.list(&["product", product_id, "users"], customer_id, max_results)
            .await
    }

    pub async fn list_for_product_and_sku(
        &self,
        product_id: &str,
        sku_id: &str,
        customer_id: &str,
        max_results: u32,
    ) -> Result<Vec<LicenseAssignment>, Error> {
        self.list(
            &["product", product_id, "sku", sku_id, "users"],
            customer_id,
            max_results,
        )
        .await
    }

    /// Assignments of every SKU in `products`, concatenated in the order
    /// the products are given.
    pub async fn all_domain_licenses(
        &self,
        customer_id: &str,
        products: &[Product],
        max_results: u32,
    ) -> Result<Vec<LicenseAssignment>, Error> {
        let mut assignments = vec![];

        for product in products {
            let mut found =
                self.list_product_sku(customer_id, product, max_results).await?;
            assignments.append(&mut found);
        }

        Ok(assignments)
    }

    /// Assignments keyed by SKU ID. Every requested product gets an entry,
    /// empty when nobody holds it.
    pub async fn all_domain_licenses_by_product(
        &self,
        customer_id: &str,
        products: &[Product],
        max_results: u32,
    ) -> Result<BTreeMap<String, Vec<LicenseAssignment>>, Error> {
        let mut by_product = BTreeMap::new();

        for product in products {
            let found =
                self.list_product_sku(customer_id, product, max_results).await?;
            by_product.insert(product.sku_id.to_string(), found);
        }

        Ok(by_product)
    }

    async fn list_product_sku(
        &self,
        customer_id: &str,
        product: &Product,
        max_results: u32,
    ) -> Result<Vec<LicenseAssignment>, Error> {
        info!(self.log, "querying licenses"; "sku_name" => product.sku_name);

        self.list_for_product_and_sku(
            product.product_id,
            product.sku_id,
            customer_id,
            max_results,
        )
        .await
    }

    fn user_url(&self, sku: Sku<'_>, user_id: &str) -> Result<Url, Error> {
        self.client.url(
            Api::Licensing,
            &["product", sku.product_id, "sku", sku.sku_id, "user", user_id],
            &[],
        )
    }

    /// The user's assignment of `sku`, or `None` if they do not hold it.
    pub async fn get(
        &self,
        sku: Sku<'_>,
        user_id: &str,
    ) -> Result<Option<LicenseAssignment>, Error> {
        let url = self.user_url(sku, user_id)?;

        match self.client.get_json(url).await {
            Ok(assignment) => Ok(Some(assignment)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub async fn insert(
        &self,
        sku: Sku<'_>,
        user_id: &str,
    ) -> Result<LicenseAssignment, Error> {
        let url = self.client.url(
            Api::Licensing,
            &["product", sku.product_id, "sku", sku.sku_id, "user"],
            &[],
        )?;

        let body = LicenseAssignmentInsert { user_id: user_id.to_string() };
        let assignment = self.client.post_json(url, &body).await?;

        info!(self.log, "license assigned";
            "sku" => %sku,
            "user_id" => user_id
        );

        Ok(assignment)
    }

    /// Move a user from the SKU they hold to another one.
    pub async fn reassign(
        &self,
        current: Sku<'_>,
        target: Sku<'_>,
        user_id: &str,
    ) -> Result<LicenseAssignment, Error> {
        let url = self.user_url(current, user_id)?;

        let body = LicenseAssignment {
            product_id: target.product_id.to_string(),
            sku_id: target.sku_id.to_string(),
            user_id: user_id.to_string(),
            ..Default::default()
        };
        let assignment = self.client.put_json(url, &body).await?;

        info!(self.log, "license reassigned";
            "from" => %current,
            "to" => %target,
            "user_id" => user_id
        );

        Ok(assignment)
    }

    /// Convert an archived-user license back to the SKU it was archived
    /// from.
    pub async fn unarchive(
        &self,
        product: &Product,
        user_id: &str,
    ) -> Result<LicenseAssignment, Error> {
        let target = product
            .unarchival_sku()
            .ok_or_else(|| Error::NotArchived(product.sku_name.to_string()))?;

        self.reassign(product.sku(), target, user_id).await
    }

    pub async fn delete(
        &self,
        sku: Sku<'_>,
        user_id: &str,
    ) -> Result<(), Error> {
        let url = self.user_url(sku, user_id)?;
        self.client.delete(url).await?;

        info!(self.log, "license removed";
            "sku" => %sku,
            "user_id" => user_id
        );

        Ok(())
    }

    /// Assign `product` to every user with at most `max_concurrency`
    /// requests in flight. Users who already hold it are unchanged.
    pub async fn insert_many(
        &self,
        product: &Product,
        user_ids: Vec<String>,
        max_concurrency: usize,
    ) -> BatchReport<String> {
        let api = self.clone();
        let product = product.clone();

        run_bounded(
            &self.log,
            "assign license",
            user_ids,
            max_concurrency,
            move |user_id: String| {
                let api = api.clone();
                let product = product.clone();
                async move {
                    match api.insert(product.sku(), &user_id).await {
                        Ok(_) => Ok(Outcome::Applied),
                        Err(error) if error.is_duplicate() => {
                            Ok(Outcome::Unchanged)
                        }
                        Err(error) => Err(error),
                    }
                }
            },
        )
        .await
    }

    /// Remove `product` from every user. Users who do not hold it are
    /// unchanged.
    pub async fn delete_many(
        &self,
        product: &Product,
        user_ids: Vec<String>,
        max_concurrency: usize,
    ) -> BatchReport<String> {
        let api = self.clone();
        let product = product.clone();

        run_bounded(
            &self.log,
            "remove license",
            user_ids,
            max_concurrency,
            move |user_id: String| {
                let api = api.clone();
                let product = product.clone();
                async move {
                    match api.delete(product.sku(), &user_id).await {
                        Ok(()) => Ok(Outcome::Applied),
                        Err(error) if error.is_not_found() => {
                            Ok(Outcome::Unchanged)
                        }
                        Err(error) => Err(error),
                    }
                }
            },
        )
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_page_size() {
        assert_eq!(page_size(0), DEFAULT_LICENSE_PAGE_SIZE);
        assert_eq!(page_size(1), 1);
        assert_eq!(page_size(250), 250);
        assert_eq!(page_size(5_000), MAX_LICENSE_PAGE_SIZE);
    }
}
