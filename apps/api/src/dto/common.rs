use keystone_application::{MutationOutcome, Page, PageRequest};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Query string of paginated listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<PageQuery> for PageRequest {
    fn from(value: PageQuery) -> Self {
        PageRequest::new(value.page, value.per_page)
    }
}

/// One page of a listing.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/page-response.ts"
)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    #[ts(type = "number")]
    pub total: u64,
}

impl<T> PageResponse<T> {
    pub fn from_page<R>(page: Page<R>, mapper: impl FnMut(R) -> T) -> Self {
        let last_page = page.last_page();
        let page = page.map(mapper);

        Self {
            data: page.items,
            current_page: page.current_page,
            last_page,
            per_page: page.per_page,
            total: page.total,
        }
    }
}

/// Confirmation of a committed mutation.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/mutation-response.ts"
)]
pub struct MutationResponse<T> {
    pub status: &'static str,
    pub message: String,
    pub redirect_to: String,
    pub data: T,
}

impl<T> MutationResponse<T> {
    pub fn from_outcome<R>(outcome: MutationOutcome<R>, mapper: impl FnOnce(R) -> T) -> Self {
        Self {
            status: "ok",
            message: outcome.message.to_owned(),
            redirect_to: outcome.redirect_to.to_owned(),
            data: mapper(outcome.value),
        }
    }
}
