//! Default values for configuration

pub fn default_rate_per_minute() -> f64 {
    30.0
}

pub fn default_user_agent() -> String {
    format!("jobdex/{}", env!("CARGO_PKG_VERSION"))
}

pub fn default_timeout_secs() -> u64 {
    20
}

pub fn default_page_limit() -> u32 {
    50
}

pub fn default_max_pages() -> u32 {
    40
}
