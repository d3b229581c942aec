use crate::service::client::ServiceConnection;
use crate::service::model::{Entity, QueryRequest};
use anyhow::{bail, Result};
use std::num::NonZeroUsize;

/// How many pages [`retrieve_all`] may fetch for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageLimit {
    /// Follow paging cookies until the service reports no more records.
    #[default]
    Unbounded,
    /// Stop after this many pages even if more records exist.
    MaxPages(NonZeroUsize),
}

impl PageLimit {
    fn allows(&self, fetched_pages: usize) -> bool {
        match self {
            PageLimit::Unbounded => true,
            PageLimit::MaxPages(max) => fetched_pages < max.get(),
        }
    }
}

/// Runs `query` to completion on one connection, following paging cookies.
pub async fn retrieve_all(
    connection: &mut ServiceConnection,
    query: &QueryRequest,
    limit: PageLimit,
) -> Result<Vec<Entity>> {
    let mut entities = Vec::new();
    let mut cookie: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = connection.retrieve_page(query, cookie.as_deref()).await?;
        pages += 1;
        entities.extend(page.entities);

        if !page.more_records {
            break;
        }
        if !limit.allows(pages) {
            tracing::debug!(
                entity = %query.logical_name,
                pages,
                records = entities.len(),
                "page limit reached before the query was exhausted"
            );
            break;
        }
        match page.paging_cookie {
            Some(next) => cookie = Some(next),
            None => bail!(
                "service reported more {} records without a paging cookie",
                query.logical_name
            ),
        }
    }

    tracing::debug!(
        entity = %query.logical_name,
        pages,
        records = entities.len(),
        "query retrieved"
    );
    Ok(entities)
}
