use anyhow::{Result, bail};

use crate::core::{AggregatorDetail, FindingFilter, Page, StandardSubscription};

pub mod sdk;

/// Security Hub maximum for `GetFindings` page size.
pub const MAX_PAGE_SIZE: i32 = 100;

/// The read-only Security Hub operations a report needs.
#[allow(async_fn_in_trait)]
pub trait SecurityHubApi {
    async fn get_findings(
        &self,
        filter: &FindingFilter,
        page_size: i32,
        next_token: Option<&str>,
    ) -> Result<Page>;

    async fn enabled_standards(&self) -> Result<Vec<StandardSubscription>>;

    async fn finding_aggregator_arns(&self) -> Result<Vec<String>>;

    async fn finding_aggregator(&self, arn: &str) -> Result<AggregatorDetail>;
}

/// Lazy, forward-only walk over the pages of a findings query.
///
/// Nothing is requested until the first `next_page`. The walk ends after the
/// first page that carries no continuation token.
pub struct FindingPages<'a, A> {
    api: &'a A,
    filter: FindingFilter,
    page_size: i32,
    next_token: Option<String>,
    fetched: usize,
    done: bool,
}

impl<'a, A: SecurityHubApi> FindingPages<'a, A> {
    pub fn new(api: &'a A, filter: FindingFilter, page_size: i32) -> Self {
        Self {
            api,
            filter,
            page_size,
            next_token: None,
            fetched: 0,
            done: false,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }

    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.done {
            return Ok(None);
        }

        let sent = self.next_token.take();
        tracing::debug!(page = self.fetched + 1, page_size = self.page_size, "fetching findings page");
        let page = match self
            .api
            .get_findings(&self.filter, self.page_size, sent.as_deref())
            .await
        {
            Ok(page) => page,
            Err(err) => {
                self.done = true;
                return Err(err);
            }
        };
        self.fetched += 1;

        match page.next_token.as_deref() {
            None | Some("") => self.done = true,
            Some(token) => {
                if sent.as_deref() == Some(token) {
                    self.done = true;
                    bail!(
                        "findings pagination returned the same continuation token twice (page {})",
                        self.fetched
                    );
                }
                self.next_token = Some(token.to_string());
            }
        }
        Ok(Some(page))
    }
}
