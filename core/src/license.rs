// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

/// One user's license for one product SKU
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LicenseAssignment {
    pub product_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    pub sku_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku_name: Option<String>,

    /// The user's primary email or unique ID
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etags: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

impl LicenseAssignment {
    pub fn sku(&self) -> Sku<'_> {
        Sku { product_id: &self.product_id, sku_id: &self.sku_id }
    }
}

/// Body of `licenseAssignments.insert`
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LicenseAssignmentInsert {
    pub user_id: String,
}

/// Response of the `licenseAssignments.listFor*` calls
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LicenseAssignmentList {
    #[serde(default)]
    pub items: Vec<LicenseAssignment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl From<LicenseAssignmentList> for Page<LicenseAssignment> {
    fn from(list: LicenseAssignmentList) -> Page<LicenseAssignment> {
        Page::new(list.items, list.next_page_token)
    }
}
