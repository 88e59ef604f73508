//! Filter and pagination stage of the export pipeline: selects the
//! applications to export and fixes their order.
//!
//! Ordering is always submit time descending with application id
//! descending as the tie-break, so repeated exports of the same data
//! are byte-stable.

use super::Application;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel status-filter value meaning "applications with no status
/// set". A UUID so it can never collide with a real status name.
pub const NO_STATUS_FILTER_OPTION: &str = "4ab23e9c-65be-4935-96a4-1b8c23bbe1b0";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// No status filtering.
    #[default]
    Any,
    /// Only applications whose latest status is absent.
    NoStatus,
    /// Exact match against the latest status.
    Only(String),
}

impl StatusFilter {
    /// Interpret the raw query parameter: empty/absent means no
    /// filter, the sentinel selects status-less applications.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Any,
            Some(value) if value == NO_STATUS_FILTER_OPTION => Self::NoStatus,
            Some(value) => Self::Only(value.to_string()),
        }
    }

    fn matches(&self, status: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::NoStatus => status.is_none(),
            Self::Only(wanted) => status == Some(wanted.as_str()),
        }
    }
}

/// Caller-specified selection over submitted applications. Bounds are
/// inclusive on submit date; an absent bound is unbounded.
#[derive(Debug, Clone, Default)]
pub struct SubmittedApplicationFilter {
    pub search: Option<String>,
    pub submitted_from: Option<NaiveDate>,
    pub submitted_until: Option<NaiveDate>,
    pub status: StatusFilter,
}

impl SubmittedApplicationFilter {
    pub fn empty() -> Self {
        Self::default()
    }

    fn matches(&self, application: &Application) -> bool {
        let submit_date = application.submit_time.date_naive();
        if let Some(from) = self.submitted_from {
            if submit_date < from {
                return false;
            }
        }
        if let Some(until) = self.submitted_until {
            if submit_date > until {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty() {
                let mut haystacks = vec![
                    application.applicant_name.to_lowercase(),
                    application.id.to_string(),
                ];
                if let Some(email) = &application.submitter_email {
                    haystacks.push(email.to_lowercase());
                }
                if !haystacks.iter().any(|value| value.contains(&needle)) {
                    return false;
                }
            }
        }
        self.status.matches(application.latest_status.as_deref())
    }
}

/// Bounds on a query result set. Page numbers are 1-based; the
/// identifier cursor selects ids strictly below `after_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationSpec {
    PageNumber {
        current_page: usize,
        page_size: usize,
    },
    IdentifierBased {
        page_size: usize,
        after_id: Option<u64>,
    },
}

impl PaginationSpec {
    /// Unbounded identifier-based selection used for bulk exports.
    pub fn all() -> Self {
        Self::IdentifierBased {
            page_size: usize::MAX,
            after_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginationResult<T> {
    pub page_contents: Vec<T>,
    /// Total page count; only meaningful for page-number pagination.
    pub num_pages: usize,
    pub has_more: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("failed to parse '{value}' as a YYYY-MM-DD date")]
    InvalidDate { value: String },
}

/// Parse a date filter parameter, surfacing bad input to the caller.
pub fn parse_filter_date(raw: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| FilterError::InvalidDate {
        value: raw.to_string(),
    })
}

/// Apply filter + pagination to an unordered application set. With
/// `ignore_filters` the whole dataset is selected while the filter
/// values stay available for echoing back to the caller.
pub fn select_applications(
    mut applications: Vec<Application>,
    filter: &SubmittedApplicationFilter,
    pagination: &PaginationSpec,
    ignore_filters: bool,
) -> PaginationResult<Application> {
    if !ignore_filters {
        applications.retain(|application| filter.matches(application));
    }

    match pagination {
        PaginationSpec::PageNumber {
            current_page,
            page_size,
        } => {
            applications.sort_by(|a, b| {
                b.submit_time
                    .cmp(&a.submit_time)
                    .then_with(|| b.id.cmp(&a.id))
            });
            let page_size = (*page_size).max(1);
            let num_pages = applications.len().div_ceil(page_size);
            let page = (*current_page).max(1);
            let start = (page - 1).saturating_mul(page_size);
            // An out-of-range page is an empty page, not an error.
            let page_contents: Vec<Application> = applications
                .into_iter()
                .skip(start)
                .take(page_size)
                .collect();
            PaginationResult {
                has_more: page < num_pages,
                page_contents,
                num_pages,
            }
        }
        PaginationSpec::IdentifierBased {
            page_size,
            after_id,
        } => {
            applications.sort_by(|a, b| b.id.cmp(&a.id));
            if let Some(cursor) = after_id {
                applications.retain(|application| application.id < *cursor);
            }
            let total = applications.len();
            let page_contents: Vec<Application> =
                applications.into_iter().take(*page_size).collect();
            PaginationResult {
                has_more: page_contents.len() < total,
                num_pages: 1,
                page_contents,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn application(id: u64, day: u32, status: Option<&str>) -> Application {
        Application {
            id,
            applicant_id: id,
            applicant_name: format!("Person {id}"),
            program_id: 1,
            program_name: "food-assistance".to_string(),
            language: "en-US".to_string(),
            create_time: Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap(),
            submit_time: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            submitter_email: Some(format!("person{id}@example.com")),
            latest_status: status.map(str::to_string),
            answers: BTreeMap::new(),
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).expect("valid date")
    }

    #[test]
    fn default_order_is_submit_time_then_id_descending() {
        let mut late_twin = application(5, 10, None);
        late_twin.submit_time = application(9, 10, None).submit_time;
        let result = select_applications(
            vec![application(1, 3, None), late_twin, application(9, 10, None)],
            &SubmittedApplicationFilter::empty(),
            &PaginationSpec::all(),
            false,
        );
        let ids: Vec<u64> = result.page_contents.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![9, 5, 1]);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let filter = SubmittedApplicationFilter {
            submitted_from: Some(date(5)),
            submitted_until: Some(date(10)),
            ..SubmittedApplicationFilter::empty()
        };
        let result = select_applications(
            vec![
                application(1, 4, None),
                application(2, 5, None),
                application(3, 10, None),
                application(4, 11, None),
            ],
            &filter,
            &PaginationSpec::all(),
            false,
        );
        let ids: Vec<u64> = result.page_contents.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn search_matches_name_email_and_id_case_insensitively() {
        let applications = vec![application(11, 3, None), application(22, 4, None)];

        let by_name = SubmittedApplicationFilter {
            search: Some("PERSON 11".to_string()),
            ..SubmittedApplicationFilter::empty()
        };
        let result =
            select_applications(applications.clone(), &by_name, &PaginationSpec::all(), false);
        assert_eq!(result.page_contents.len(), 1);
        assert_eq!(result.page_contents[0].id, 11);

        let by_email = SubmittedApplicationFilter {
            search: Some("person22@EXAMPLE".to_string()),
            ..SubmittedApplicationFilter::empty()
        };
        let result =
            select_applications(applications.clone(), &by_email, &PaginationSpec::all(), false);
        assert_eq!(result.page_contents[0].id, 22);

        let by_id = SubmittedApplicationFilter {
            search: Some("22".to_string()),
            ..SubmittedApplicationFilter::empty()
        };
        let result = select_applications(applications, &by_id, &PaginationSpec::all(), false);
        assert_eq!(result.page_contents[0].id, 22);
    }

    #[test]
    fn status_filter_matches_exactly_and_no_status_sentinel_works() {
        let applications = vec![
            application(1, 3, Some("Approved")),
            application(2, 4, Some("Denied")),
            application(3, 5, None),
        ];

        let only = SubmittedApplicationFilter {
            status: StatusFilter::Only("Approved".to_string()),
            ..SubmittedApplicationFilter::empty()
        };
        let result =
            select_applications(applications.clone(), &only, &PaginationSpec::all(), false);
        assert_eq!(result.page_contents.len(), 1);
        assert_eq!(result.page_contents[0].id, 1);

        let missing = SubmittedApplicationFilter {
            status: StatusFilter::Only("Waitlisted".to_string()),
            ..SubmittedApplicationFilter::empty()
        };
        let result =
            select_applications(applications.clone(), &missing, &PaginationSpec::all(), false);
        assert!(result.page_contents.is_empty());

        let none = SubmittedApplicationFilter {
            status: StatusFilter::from_param(Some(NO_STATUS_FILTER_OPTION)),
            ..SubmittedApplicationFilter::empty()
        };
        let result = select_applications(applications, &none, &PaginationSpec::all(), false);
        assert_eq!(result.page_contents.len(), 1);
        assert_eq!(result.page_contents[0].id, 3);
    }

    #[test]
    fn ignore_filters_exports_everything() {
        let filter = SubmittedApplicationFilter {
            status: StatusFilter::Only("Approved".to_string()),
            ..SubmittedApplicationFilter::empty()
        };
        let result = select_applications(
            vec![application(1, 3, None), application(2, 4, Some("Denied"))],
            &filter,
            &PaginationSpec::all(),
            true,
        );
        assert_eq!(result.page_contents.len(), 2);
    }

    #[test]
    fn page_number_pagination_reports_pages_and_empty_overflow_page() {
        let applications: Vec<Application> =
            (1..=5).map(|id| application(id, id as u32, None)).collect();

        let page_two = select_applications(
            applications.clone(),
            &SubmittedApplicationFilter::empty(),
            &PaginationSpec::PageNumber {
                current_page: 2,
                page_size: 2,
            },
            false,
        );
        assert_eq!(page_two.num_pages, 3);
        assert!(page_two.has_more);
        let ids: Vec<u64> = page_two.page_contents.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 2]);

        let overflow = select_applications(
            applications,
            &SubmittedApplicationFilter::empty(),
            &PaginationSpec::PageNumber {
                current_page: 9,
                page_size: 2,
            },
            false,
        );
        assert!(overflow.page_contents.is_empty());
        assert_eq!(overflow.num_pages, 3);
    }

    #[test]
    fn identifier_pagination_walks_ids_downward() {
        let applications: Vec<Application> =
            (1..=5).map(|id| application(id, 3, None)).collect();

        let first = select_applications(
            applications.clone(),
            &SubmittedApplicationFilter::empty(),
            &PaginationSpec::IdentifierBased {
                page_size: 2,
                after_id: None,
            },
            false,
        );
        let ids: Vec<u64> = first.page_contents.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![5, 4]);
        assert!(first.has_more);

        let next = select_applications(
            applications,
            &SubmittedApplicationFilter::empty(),
            &PaginationSpec::IdentifierBased {
                page_size: 2,
                after_id: Some(4),
            },
            false,
        );
        let ids: Vec<u64> = next.page_contents.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn invalid_date_is_a_parse_error() {
        assert!(parse_filter_date("2024-03-05").is_ok());
        match parse_filter_date("03/05/2024") {
            Err(FilterError::InvalidDate { value }) => assert_eq!(value, "03/05/2024"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
