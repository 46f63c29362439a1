//! Shared funnel analytics types. The report shapes in this module are a
//! compatibility contract with the dashboard: field names and two-decimal
//! percentage rounding must be preserved exactly.

use serde::{Deserialize, Serialize};

/// How a funnel step matches incoming events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    PageView,
    Event,
}

/// One stage of a funnel, 1-indexed and contiguous within a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_number: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub target: String,
}

/// Columns a filter may reference. The enum is the allowlist: anything
/// outside it fails deserialization at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    EventName,
    Path,
    Referrer,
    UserAgent,
    Country,
    City,
    DeviceType,
    BrowserName,
    OsName,
    ScreenResolution,
    Language,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    UtmTerm,
    UtmContent,
}

impl FilterField {
    /// Column name as it appears in the event store schema.
    pub fn column(&self) -> &'static str {
        match self {
            FilterField::EventName => "event_name",
            FilterField::Path => "path",
            FilterField::Referrer => "referrer",
            FilterField::UserAgent => "user_agent",
            FilterField::Country => "country",
            FilterField::City => "city",
            FilterField::DeviceType => "device_type",
            FilterField::BrowserName => "browser_name",
            FilterField::OsName => "os_name",
            FilterField::ScreenResolution => "screen_resolution",
            FilterField::Language => "language",
            FilterField::UtmSource => "utm_source",
            FilterField::UtmMedium => "utm_medium",
            FilterField::UtmCampaign => "utm_campaign",
            FilterField::UtmTerm => "utm_term",
            FilterField::UtmContent => "utm_content",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

/// Filter value: a single string for scalar comparisons, a list for
/// `in` / `not_in`, absent for the null checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: FilterField,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
}

/// Scope of one analytics request, forwarded verbatim as bound parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryContext {
    pub website_id: String,
    pub start_date: String,
    pub end_date: String,
}

/// Per-step slice of a funnel report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step_number: u32,
    pub step_name: String,
    pub users: u64,
    pub total_users: u64,
    pub conversion_rate: f64,
    pub dropoffs: u64,
    pub dropoff_rate: f64,
    pub avg_time_to_complete: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelReport {
    pub overall_conversion_rate: f64,
    pub total_users_entered: u64,
    pub total_users_completed: u64,
    pub avg_completion_time: f64,
    pub avg_completion_time_formatted: String,
    pub biggest_dropoff_step: u32,
    pub biggest_dropoff_rate: f64,
    pub steps_analytics: Vec<StepMetrics>,
}

/// Referrer string decomposed for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReferrer {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferrerSegment {
    pub referrer: String,
    pub referrer_parsed: ParsedReferrer,
    pub total_users: u64,
    pub completed_users: u64,
    pub conversion_rate: f64,
}

/// Segmented variant of the funnel report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferrerReport {
    pub referrer_analytics: Vec<ReferrerSegment>,
}
