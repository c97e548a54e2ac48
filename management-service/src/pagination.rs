use serde::{Deserialize, Serialize};

use experiments_common::validation::ValidationError;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// `page` and `page_size` query parameters. Pages start at 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Paging {
    pub page: u32,
    pub pages: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paging: Paging,
}

impl PageParams {
    pub fn new(page: u32, page_size: u32) -> Self {
        PageParams {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    fn validate(&self) -> Result<(u32, u32), ValidationError> {
        let mut errors = ValidationError::new();
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            errors.push(format!(
                "page_size must be within range (0 < page_size <= {MAX_PAGE_SIZE}) or unset"
            ));
        }
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        if page == 0 {
            errors.push("page must be > 0 or unset");
        }
        errors.into_result()?;
        Ok((page, page_size))
    }

    /// Cuts one page out of `items`, which must already be in a stable
    /// order. Asking for a page past the last one is an error, except for
    /// page 1 of an empty list.
    pub fn paginate<T>(&self, items: Vec<T>) -> Result<Page<T>, ValidationError> {
        let (page, page_size) = self.validate()?;
        let total = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let pages = total.div_ceil(page_size);
        if page > 1 && page > pages {
            return Err(ValidationError::single(format!(
                "requested page number {page} exceeds total pages: {pages}"
            )));
        }

        let skip = (page - 1) as usize * page_size as usize;
        let items = items.into_iter().skip(skip).take(page_size as usize).collect();
        Ok(Page {
            items,
            paging: Paging { page, pages, total },
        })
    }
}
