pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const API_KEY_ENV: &str = "API_KEY";

pub const DEFAULT_USER_AGENT: &str = concat!("meal-lens/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const ANALYSIS_PROMPT: &str = "Analyze this image. If it is food, provide the approximate \
nutritional information for the entire meal shown. If it is NOT food, set 'isFood' to false and \
leave other fields as 0 or empty strings. Be realistic with the estimates based on standard \
portion sizes visible.";

/// Advertised upload limit (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub const CAPTURE_JPEG_QUALITY: u8 = 85;

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";
