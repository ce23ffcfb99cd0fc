use serde::{Deserialize, Serialize};

use crate::{
    error::{FieldErrors, HtmlError},
    MAX_PAGE_SIZE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn parse(
        page: Option<&str>,
        limit: Option<&str>,
        default_limit: i64,
    ) -> Result<Self, crate::error::Error> {
        let mut errors = FieldErrors::new();
        let mut number = |key: &str, value: Option<&str>| match value {
            Some(v) => v.trim().parse::<i64>().map(Some).unwrap_or_else(|_| {
                errors
                    .entry(key.to_string())
                    .or_default()
                    .push(String::from("A valid integer is required."));
                None
            }),
            None => None,
        };

        let page = number("page", page);
        let limit = number("limit", limit);

        if !errors.is_empty() {
            return Err(HtmlError::InvalidRequest.fields(errors));
        }
        Ok(Self::new(page, limit, default_limit))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, request: PageRequest) -> Self {
        let next = if request.offset().saturating_add(rows.len() as i64) < total_rows {
            Some(link(request.page.saturating_add(1), request.limit))
        } else {
            None
        };
        let previous = if request.page > 1 {
            Some(link(request.page - 1, request.limit))
        } else {
            None
        };

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }

    pub fn with_results<U>(self, results: Vec<U>) -> PageContext<U> {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results,
        }
    }
}

fn link(page: i64, limit: i64) -> String {
    format!("?page={page}&limit={limit}")
}
