/// Prefix of every authenticated HTTP route
pub const API_PREFIX: &str = "/api/v1";

/// Name of the channel every workspace is created with
pub const GENERAL_CHANNEL: &str = "general";

/// Default page size for message and notification listings
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Hard upper bound on page size regardless of configuration
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Default page size for the activity log
pub const DEFAULT_ACTIVITY_LIMIT: i64 = 50;

/// Header carrying the repository host webhook signature
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header naming the repository host event type
pub const WEBHOOK_EVENT_HEADER: &str = "x-github-event";

/// Clamp a requested page size to `1..=max`, using the default when absent.
pub fn clamp_limit(requested: Option<i64>, max: i64) -> i64 {
    let max = max.clamp(1, MAX_PAGE_LIMIT);
    requested.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, max)
}
