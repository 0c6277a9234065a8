// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thin async wrappers over the Google Workspace Admin SDK Directory and
//! Licensing APIs: authenticated requests, page-token walking, and bounded
//! fan-out for bulk membership and license changes.

use chrono::DateTime;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

mod auth;
mod batch;
mod client;
mod config;
mod directory;
mod error;
mod group;
mod license;
mod licensing;
mod member;
mod paginate;
mod product;
mod retry;
mod user;

pub use auth::*;
pub use batch::*;
pub use client::*;
pub use config::*;
pub use directory::*;
pub use error::*;
pub use group::*;
pub use license::*;
pub use licensing::*;
pub use member::*;
pub use paginate::*;
pub use product::*;
pub use retry::*;
pub use user::*;

/// Split an administrator email into its domain, rejecting anything that is
/// not a plain `local@domain` address.
pub fn domain_of(admin_email: &str) -> Result<String, Error> {
    match admin_email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@') =>
        {
            Ok(domain.to_string())
        }

        _ => Err(Error::InvalidAdminEmail(admin_email.to_string())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("admin@example.com").unwrap(), "example.com");

        for bad in ["admin", "@example.com", "admin@", "a@b@c", ""] {
            assert!(
                matches!(domain_of(bad), Err(Error::InvalidAdminEmail(_))),
                "{bad} should be rejected"
            );
        }
    }
}
