// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

/// A product / SKU pair as the Licensing API addresses it
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Sku<'a> {
    pub product_id: &'a str,
    pub sku_id: &'a str,
}

impl std::fmt::Display for Sku<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.product_id, self.sku_id)
    }
}

/// A licensable product tier. Archived-user SKUs also name the SKU they
/// convert back to when the user is unarchived.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: &'static str,
    pub product_name: &'static str,
    pub sku_id: &'static str,
    pub sku_name: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unarchival_product_id: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unarchival_sku_id: Option<&'static str>,
}

impl Product {
    const fn new(
        product_id: &'static str,
        product_name: &'static str,
        sku_id: &'static str,
        sku_name: &'static str,
    ) -> Self {
        Self {
            product_id,
            product_name,
            sku_id,
            sku_name,
            unarchival_product_id: None,
            unarchival_sku_id: None,
        }
    }

    const fn archived(
        sku_id: &'static str,
        sku_name: &'static str,
        unarchival_product_id: &'static str,
        unarchival_sku_id: &'static str,
    ) -> Self {
        Self {
            product_id: "101034",
            product_name: "Google Workspace Archived User",
            sku_id,
            sku_name,
            unarchival_product_id: Some(unarchival_product_id),
            unarchival_sku_id: Some(unarchival_sku_id),
        }
    }

    pub fn sku(&self) -> Sku<'static> {
        Sku { product_id: self.product_id, sku_id: self.sku_id }
    }

    pub fn unarchival_sku(&self) -> Option<Sku<'static>> {
        match (self.unarchival_product_id, self.unarchival_sku_id) {
            (Some(product_id), Some(sku_id)) => {
                Some(Sku { product_id, sku_id })
            }
            _ => None,
        }
    }

    pub fn is_archived_user(&self) -> bool {
        self.unarchival_sku().is_some()
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} <{}>", self.sku_name, self.sku_id)
    }
}

pub const BUSINESS_STARTER: Product = Product::new(
    "Google-Apps",
    "Google Workspace",
    "1010020027",
    "Google Workspace Business Starter",
);

pub const BUSINESS_STANDARD: Product = Product::new(
    "Google-Apps",
    "Google Workspace",
    "1010020028",
    "Google Workspace Business Standard",
);

pub const BUSINESS_PLUS: Product = Product::new(
    "Google-Apps",
    "Google Workspace",
    "1010020025",
    "Google Workspace Business Plus",
);

pub const ENTERPRISE_ESSENTIALS: Product = Product::new(
    "Google-Apps",
    "Google Workspace",
    "1010060003",
    "Google Workspace Enterprise Essentials",
);

pub const ENTERPRISE_STANDARD: Product = Product::new(
    "Google-Apps",
    "Google Workspace",
    "1010020026",
    "Google Workspace Enterprise Standard",
);

pub const ENTERPRISE_PLUS: Product = Product::new(
    "Google-Apps",
    "Google Workspace",
    "1010020020",
    "Google Workspace Enterprise Plus (formerly G Suite Enterprise)",
);

pub const ESSENTIALS: Product = Product::new(
    "Google-Apps",
    "Google Workspace",
    "1010060001",
    "Google Workspace Essentials (formerly G Suite Essentials)",
);

pub const FRONTLINE: Product = Product::new(
    "Google-Apps",
    "Google Workspace",
    "1010020030",
    "Google Workspace Frontline",
);

pub const VAULT: Product =
    Product::new(
        "Google-Vault",
        "Google Vault",
        "Google-Vault",
        "Google Vault",
    );

pub const VAULT_FORMER_EMPLOYEE: Product = Product::new(
    "Google-Vault",
    "Google Vault",
    "Google-Vault-Former-Employee",
    "Google Vault - Former Employee",
);

pub const ENTERPRISE_PLUS_ARCHIVED: Product = Product::archived(
    "1010340001",
    "Google Workspace Enterprise Plus - Archived User",
    "Google-Apps",
    "1010020020",
);

pub const BUSINESS_ARCHIVED: Product = Product::archived(
    "1010340002",
    "G Suite Business - Archived User",
    "Google-Apps",
    "Google-Apps-Unlimited",
);

pub const BUSINESS_PLUS_ARCHIVED: Product = Product::archived(
    "1010340003",
    "Google Workspace Business Plus - Archived User",
    "Google-Apps",
    "1010020025",
);

pub const ENTERPRISE_STANDARD_ARCHIVED: Product = Product::archived(
    "1010340004",
    "Google Workspace Enterprise Standard - Archived User",
    "Google-Apps",
    "1010020026",
);

/// Every product this crate knows about, in the order they are queried when
/// listing all licenses of a domain.
pub static ALL_PRODUCTS: &[Product] = &[
    BUSINESS_STARTER,
    BUSINESS_STANDARD,
    BUSINESS_PLUS,
    ENTERPRISE_ESSENTIALS,
    ENTERPRISE_STANDARD,
    ENTERPRISE_PLUS,
    ESSENTIALS,
    FRONTLINE,
    VAULT,
    VAULT_FORMER_EMPLOYEE,
    ENTERPRISE_PLUS_ARCHIVED,
    BUSINESS_ARCHIVED,
    BUSINESS_PLUS_ARCHIVED,
    ENTERPRISE_STANDARD_ARCHIVED,
];

pub fn product_by_sku_id(sku_id: &str) -> Option<&'static Product> {
    ALL_PRODUCTS.iter().find(|product| product.sku_id == sku_id)
}

pub fn product_by_sku_name(sku_name: &str) -> Option<&'static Product> {
    ALL_PRODUCTS.iter().find(|product| product.sku_name == sku_name)
}

/// Resolve either a SKU ID or a SKU name, IDs first.
pub fn lookup_product(sku: &str) -> Option<&'static Product> {
    product_by_sku_id(sku).or_else(|| product_by_sku_name(sku))
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_lookup_by_sku_id_and_name() {
        assert_eq!(product_by_sku_id("1010020020"), Some(&ENTERPRISE_PLUS));
        assert_eq!(
            product_by_sku_name("Google Vault - Former Employee"),
            Some(&VAULT_FORMER_EMPLOYEE)
        );

        // Names and IDs are matched exactly
        assert_eq!(product_by_sku_name("google vault"), None);
        assert_eq!(product_by_sku_id("1010020020 "), None);

        assert_eq!(lookup_product("Google-Vault"), Some(&VAULT));
        assert_eq!(
            lookup_product("Google Workspace Frontline"),
            Some(&FRONTLINE)
        );
        assert_eq!(lookup_product("nope"), None);
    }

    #[test]
    fn test_catalog_sku_ids_are_unique() {
        let ids: HashSet<&str> =
            ALL_PRODUCTS.iter().map(|p| p.sku_id).collect();
        assert_eq!(ids.len(), ALL_PRODUCTS.len());
        assert_eq!(ALL_PRODUCTS.len(), 14);
    }

    #[test]
    fn test_unarchival_sku() {
        assert_eq!(
            ENTERPRISE_STANDARD_ARCHIVED.unarchival_sku(),
            Some(ENTERPRISE_STANDARD.sku())
        );

        // The legacy business SKU is not part of the catalog but still
        // addressable.
        let legacy = BUSINESS_ARCHIVED.unarchival_sku().unwrap();
        assert_eq!(legacy.sku_id, "Google-Apps-Unlimited");
        assert_eq!(product_by_sku_id(legacy.sku_id), None);

        assert!(BUSINESS_PLUS_ARCHIVED.is_archived_user());
        assert!(!BUSINESS_PLUS.is_archived_user());
        assert_eq!(VAULT.unarchival_sku(), None);
    }
}
