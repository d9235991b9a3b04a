//! Upstream API endpoint paths

/// Base URL used when a profile does not set `baseUrl`
pub const DEFAULT_BASE_URL: &str = "https://open.fxiaoke.com";

/// Exchanges app credentials for a corporate access token
pub const AUTH_TOKEN: &str = "/cgi/corpAccessToken/get/V2";

/// Resolves the acting user's open id from a lookup key
pub const USER_LOOKUP: &str = "/cgi/user/getByMobile";

pub const OBJECT_LIST: &str = "/cgi/crm/v2/object/list";

pub const OBJECT_GET: &str = "/cgi/crm/v2/data/get";
