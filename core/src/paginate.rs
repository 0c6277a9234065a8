// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::ops::ControlFlow;

use super::*;

/// One page of a listing, in the shape every vendor list response converts
/// into.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self { items, next_page_token }
    }

    /// A final page with nothing in it
    pub fn last_empty() -> Self {
        Self { items: vec![], next_page_token: None }
    }

    /// The token for the next request. The vendor sometimes sends an empty
    /// string instead of omitting the field, both mean "done".
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|token| !token.is_empty())
    }
}

/// How a listing decides it is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageEnd {
    /// Only when the server stops sending a page token
    #[default]
    NoToken,

    /// Also at the first page without items
    NoTokenOrEmptyPage,
}

/// Request pages with `fetch` until the listing ends, handing each page's
/// items to `on_page`. `on_page` may stop the walk early with
/// `ControlFlow::Break`. Returns the number of items seen.
pub async fn walk_pages<T>(
    end: PageEnd,
    mut fetch: impl AsyncFnMut(Option<String>) -> Result<Page<T>, Error>,
    mut on_page: impl AsyncFnMut(Vec<T>) -> ControlFlow<()>,
) -> Result<usize, Error> {
    let mut seen_tokens = HashSet::new();
    let mut token: Option<String> = None;
    let mut total = 0;

    loop {
        let page = fetch(token.take()).await?;

        if end == PageEnd::NoTokenOrEmptyPage && page.items.is_empty() {
            return Ok(total);
        }

        let next = page.next_token().map(str::to_string);
        total += page.items.len();

        if on_page(page.items).await.is_break() {
            return Ok(total);
        }

        match next {
            None => return Ok(total),

            Some(next) => {
                if !seen_tokens.insert(next.clone()) {
                    return Err(Error::RepeatedPageToken(next));
                }
                token = Some(next);
            }
        }
    }
}

/// Request every page and concatenate the items.
pub async fn collect_pages<T>(
    end: PageEnd,
    fetch: impl AsyncFnMut(Option<String>) -> Result<Page<T>, Error>,
) -> Result<Vec<T>, Error> {
    let mut items = vec![];

    walk_pages(end, fetch, async |page: Vec<T>| {
        items.extend(page);
        ControlFlow::Continue(())
    })
    .await?;

    Ok(items)
}
