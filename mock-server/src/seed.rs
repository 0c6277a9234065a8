// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use gadmin_rs::Member;
use gadmin_rs::User;
use gadmin_rs::lookup_product;

use super::*;

/// Initial contents for the mock server, loaded from JSON:
///
/// ```json
/// {
///   "users": [{ "primaryEmail": "mscott@dundermifflin.com" }],
///   "groups": [{
///     "email": "sales@dundermifflin.com",
///     "name": "Sales",
///     "members": [{ "email": "mscott@dundermifflin.com", "role": "OWNER" }]
///   }],
///   "licenses": [
///     { "product": "1010020028", "userId": "mscott@dundermifflin.com" }
///   ],
///   "subscriptions": ["Google-Vault"]
/// }
/// ```
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<User>,

    #[serde(default)]
    pub groups: Vec<SeedGroup>,

    #[serde(default)]
    pub licenses: Vec<SeedLicense>,

    /// Products to accept listings for even without assignments
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SeedGroup {
    pub email: String,
    pub name: String,

    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SeedLicense {
    /// A SKU ID or SKU name from the catalog
    pub product: String,
    pub user_id: String,
}

impl Seed {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Seed> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn apply(self, state: &mut MockState) -> anyhow::Result<()> {
        for user in self.users {
            state.add_user(user);
        }

        for group in self.groups {
            state.add_group(&group.email, &group.name);
            for member in group.members {
                state
                    .insert_member(&group.email, member)
                    .map_err(|f| {
                        anyhow!("seeding {}: {}", group.email, f.message)
                    })?;
            }
        }

        for license in self.licenses {
            let product = lookup_product(&license.product)
                .ok_or_else(|| anyhow!("unknown product {}", license.product))?;
            let user_id = &license.user_id;
            state
                .insert_license(product.product_id, product.sku_id, user_id)
                .map_err(|f| anyhow!("seeding {user_id}: {}", f.message))?;
        }

        for product_id in self.subscriptions {
            state.subscribe(&product_id);
        }

        Ok(())
    }
}
