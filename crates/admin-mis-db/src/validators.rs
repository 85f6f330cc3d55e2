//! Field validators.
//!
//! Validators run against cleaned field values (see `admin-mis-forms`) and
//! can also describe themselves as a JSON object, which is how the field
//! metadata endpoint reports them to clients.

use std::cmp::Ordering;
use std::fmt;

use admin_mis_core::{UploadedFile, ValidationError};
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

/// A trait for validating field values.
///
/// # Examples
///
/// ```
/// use admin_mis_db::validators::{MaxLengthValidator, Validator};
/// use serde_json::json;
///
/// let v = MaxLengthValidator::new(5);
/// assert!(v.validate(&json!("hi")).is_ok());
/// assert!(v.validate(&json!("toolong")).is_err());
/// ```
pub trait Validator: Send + Sync + fmt::Debug {
    /// Validates a cleaned value.
    fn validate(&self, value: &Value) -> Result<(), ValidationError>;

    /// Validates an uploaded file. Most validators ignore files.
    fn validate_file(&self, _file: &UploadedFile) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Returns a human-readable name for this validator.
    fn name(&self) -> &str;

    /// Describes the validator's public attributes (message, code, limits...).
    fn describe(&self) -> Map<String, Value>;
}

// ── Limits ──────────────────────────────────────────────────────────

/// A bound used by [`MinValueValidator`] / [`MaxValueValidator`].
///
/// `Callable` limits are evaluated every time they are used, so a bound like
/// "eighteen years ago" stays current.
#[derive(Clone, Copy)]
pub enum Limit {
    Int(i64),
    Number(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Callable(fn() -> Limit),
}

impl fmt::Debug for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "Int({n})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::Date(d) => write!(f, "Date({d})"),
            Self::DateTime(dt) => write!(f, "DateTime({dt})"),
            Self::Callable(_) => write!(f, "Callable"),
        }
    }
}

impl Limit {
    /// Evaluates a callable limit.
    pub fn resolve(self) -> Self {
        let mut current = self;
        while let Self::Callable(func) = current {
            current = func();
        }
        current
    }

    /// The limit as a JSON value.
    pub fn to_json(self) -> Value {
        match self.resolve() {
            Self::Int(n) => json!(n),
            Self::Number(n) => number_json(n),
            Self::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => json!(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Self::Callable(_) => Value::Null,
        }
    }

    fn display(self) -> String {
        match self.resolve() {
            Self::Int(n) => n.to_string(),
            Self::Number(n) => number_json(n).to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::Callable(_) => String::new(),
        }
    }

    /// Compares `value` against the limit. `None` when they are not comparable.
    #[allow(clippy::cast_precision_loss)]
    fn compare(self, value: &Value) -> Option<Ordering> {
        match self.resolve() {
            Self::Int(limit) => match value_as_i64(value) {
                Some(n) => Some(n.cmp(&limit)),
                None => value_as_f64(value)?.partial_cmp(&(limit as f64)),
            },
            Self::Number(limit) => value_as_f64(value)?.partial_cmp(&limit),
            Self::Date(limit) => {
                let s = value.as_str()?;
                let date = NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()?;
                Some(date.cmp(&limit))
            }
            Self::DateTime(limit) => Some(parse_datetime(value.as_str()?)?.cmp(&limit)),
            Self::Callable(_) => None,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses an ISO-8601 date-time (with or without offset) into naive UTC.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn char_count(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        _ => None,
    }
}

// ── Length ──────────────────────────────────────────────────────────

/// Validates that a string value does not exceed a maximum length.
#[derive(Debug, Clone)]
pub struct MaxLengthValidator {
    pub limit_value: usize,
}

impl MaxLengthValidator {
    pub const MESSAGE: &'static str =
        "Ensure this value has at most %(limit_value)d characters (it has %(show_value)d).";

    pub const fn new(limit_value: usize) -> Self {
        Self { limit_value }
    }
}

impl Validator for MaxLengthValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        match char_count(value) {
            Some(len) if len > self.limit_value => Err(ValidationError::new(
                Self::MESSAGE,
                "max_length",
            )
            .with_param("limit_value", self.limit_value.to_string())
            .with_param("show_value", len.to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "MaxLengthValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".into(), json!(Self::MESSAGE));
        map.insert("code".into(), json!("max_length"));
        map.insert("limit_value".into(), json!(self.limit_value));
        map
    }
}

/// Validates that a string value meets a minimum length requirement.
#[derive(Debug, Clone)]
pub struct MinLengthValidator {
    pub limit_value: usize,
}

impl MinLengthValidator {
    pub const MESSAGE: &'static str =
        "Ensure this value has at least %(limit_value)d characters (it has %(show_value)d).";

    pub const fn new(limit_value: usize) -> Self {
        Self { limit_value }
    }
}

impl Validator for MinLengthValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        match char_count(value) {
            Some(len) if len < self.limit_value => Err(ValidationError::new(
                Self::MESSAGE,
                "min_length",
            )
            .with_param("limit_value", self.limit_value.to_string())
            .with_param("show_value", len.to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "MinLengthValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".into(), json!(Self::MESSAGE));
        map.insert("code".into(), json!("min_length"));
        map.insert("limit_value".into(), json!(self.limit_value));
        map
    }
}

/// Limits the number of items in an array value.
#[derive(Debug, Clone)]
pub struct ArrayMaxLengthValidator {
    pub limit_value: usize,
}

impl ArrayMaxLengthValidator {
    pub const MESSAGE: &'static str =
        "List contains %(show_value)d items, it should contain no more than %(limit_value)d.";

    pub const fn new(limit_value: usize) -> Self {
        Self { limit_value }
    }
}

impl Validator for ArrayMaxLengthValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        match value {
            Value::Array(items) if items.len() > self.limit_value => Err(ValidationError::new(
                Self::MESSAGE,
                "max_length",
            )
            .with_param("limit_value", self.limit_value.to_string())
            .with_param("show_value", items.len().to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "ArrayMaxLengthValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".into(), json!(Self::MESSAGE));
        map.insert("code".into(), json!("max_length"));
        map.insert("limit_value".into(), json!(self.limit_value));
        map
    }
}

// ── Value bounds ────────────────────────────────────────────────────

/// Validates that a value is at most `limit_value`.
#[derive(Debug, Clone)]
pub struct MaxValueValidator {
    pub limit_value: Limit,
}

impl MaxValueValidator {
    pub const MESSAGE: &'static str = "Ensure this value is less than or equal to %(limit_value)s.";

    pub const fn new(limit_value: Limit) -> Self {
        Self { limit_value }
    }
}

impl Validator for MaxValueValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if self.limit_value.compare(value) == Some(Ordering::Greater) {
            return Err(ValidationError::new(Self::MESSAGE, "max_value")
                .with_param("limit_value", self.limit_value.display()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "MaxValueValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".into(), json!(Self::MESSAGE));
        map.insert("code".into(), json!("max_value"));
        map.insert("limit_value".into(), self.limit_value.to_json());
        map
    }
}

/// Validates that a value is at least `limit_value`.
#[derive(Debug, Clone)]
pub struct MinValueValidator {
    pub limit_value: Limit,
}

impl MinValueValidator {
    pub const MESSAGE: &'static str =
        "Ensure this value is greater than or equal to %(limit_value)s.";

    pub const fn new(limit_value: Limit) -> Self {
        Self { limit_value }
    }
}

impl Validator for MinValueValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if self.limit_value.compare(value) == Some(Ordering::Less) {
            return Err(ValidationError::new(Self::MESSAGE, "min_value")
                .with_param("limit_value", self.limit_value.display()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "MinValueValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".into(), json!(Self::MESSAGE));
        map.insert("code".into(), json!("min_value"));
        map.insert("limit_value".into(), self.limit_value.to_json());
        map
    }
}

// ── Patterns ────────────────────────────────────────────────────────

/// Validates a string against a regular expression.
#[derive(Debug, Clone)]
pub struct RegexValidator {
    pub regex: Regex,
    pub message: String,
    pub code: String,
    pub inverse_match: bool,
}

impl RegexValidator {
    pub fn new(regex: Regex) -> Self {
        Self {
            regex,
            message: "Enter a valid value.".to_string(),
            code: "invalid".to_string(),
            inverse_match: false,
        }
    }

    /// Compiles `pattern`; an invalid pattern is a programming error in the
    /// model declaration and is reported as a configuration error.
    pub fn from_pattern(pattern: &str) -> Result<Self, admin_mis_core::MisError> {
        Regex::new(pattern).map(Self::new).map_err(|e| {
            let message = format!("invalid regex {pattern:?}: {e}");
            admin_mis_core::MisError::ImproperlyConfigured(message)
        })
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    #[must_use]
    pub const fn inverse_match(mut self) -> Self {
        self.inverse_match = true;
        self
    }
}

impl Validator for RegexValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let Some(s) = value.as_str() else {
            return Ok(());
        };
        if self.regex.is_match(s) == self.inverse_match {
            return Err(ValidationError::new(self.message.clone(), self.code.clone())
                .with_param("value", s));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "RegexValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".into(), json!(self.message));
        map.insert("code".into(), json!(self.code));
        map.insert("regex".into(), json!(self.regex.as_str()));
        map
    }
}

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid regex"));
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:https?|ftps?)://",
        r"(?:[^\s:@/]+(?::[^\s:@/]*)?@)?",
        r"(?:localhost|\d{1,3}(?:\.\d{1,3}){3}|\[[0-9a-f:.]+\]",
        r"|(?:[\p{L}\p{N}](?:[\p{L}\p{N}-]{0,61}[\p{L}\p{N}])?\.)+[\p{L}-]{2,63}\.?)",
        r"(?::\d{1,5})?(?:[/?#]\S*)?$",
    ))
    .expect("valid regex")
});
static EMAIL_USER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[-!#$%&'*+/=?^_`{}|~0-9a-z]+(?:\.[-!#$%&'*+/=?^_`{}|~0-9a-z]+)*$")
        .expect("valid regex")
});
static EMAIL_DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9-]{1,62}[a-z0-9]$")
        .expect("valid regex")
});

/// Validator attached to slug fields.
pub fn slug_validator() -> RegexValidator {
    RegexValidator::new(SLUG_RE.clone()).message(
        "Enter a valid “slug” consisting of letters, numbers, underscores or hyphens.",
    )
}

/// Validator attached to URL fields.
pub fn url_validator() -> RegexValidator {
    RegexValidator::new(URL_RE.clone()).message("Enter a valid URL.")
}

/// Validates an email address.
#[derive(Debug, Clone, Default)]
pub struct EmailValidator;

impl EmailValidator {
    pub const MESSAGE: &'static str = "Enter a valid email address.";

    fn is_valid(value: &str) -> bool {
        let Some((user, domain)) = value.rsplit_once('@') else {
            return false;
        };
        EMAIL_USER_RE.is_match(user)
            && (domain.eq_ignore_ascii_case("localhost") || EMAIL_DOMAIN_RE.is_match(domain))
    }
}

impl Validator for EmailValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        match value.as_str() {
            Some(s) if !Self::is_valid(s) => {
                Err(ValidationError::new(Self::MESSAGE, "invalid").with_param("value", s))
            }
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "EmailValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".into(), json!(Self::MESSAGE));
        map.insert("code".into(), json!("invalid"));
        map
    }
}

/// Rejects strings containing NUL characters.
#[derive(Debug, Clone, Default)]
pub struct ProhibitNullCharactersValidator;

impl Validator for ProhibitNullCharactersValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        match value.as_str() {
            Some(s) if s.contains('\0') => Err(ValidationError::new(
                "Null characters are not allowed.",
                "null_characters_not_allowed",
            )),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "ProhibitNullCharactersValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".into(), json!("Null characters are not allowed."));
        map.insert("code".into(), json!("null_characters_not_allowed"));
        map
    }
}

/// Accepts IPv4 and IPv6 addresses. Describes itself as an empty object.
#[derive(Debug, Clone, Default)]
pub struct Ipv46Validator;

impl Validator for Ipv46Validator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        match value.as_str() {
            Some(s) if s.parse::<std::net::IpAddr>().is_err() => Err(ValidationError::new(
                "Enter a valid IPv4 or IPv6 address.",
                "invalid",
            )
            .with_param("value", s)),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "validate_ipv46_address"
    }

    fn describe(&self) -> Map<String, Value> {
        Map::new()
    }
}

// ── Decimals ────────────────────────────────────────────────────────

/// Checks digit counts of a decimal string.
#[derive(Debug, Clone)]
pub struct DecimalValidator {
    pub max_digits: Option<u32>,
    pub decimal_places: Option<u32>,
}

impl DecimalValidator {
    pub const fn new(max_digits: Option<u32>, decimal_places: Option<u32>) -> Self {
        Self {
            max_digits,
            decimal_places,
        }
    }

    fn messages() -> Value {
        json!({
            "invalid": "Enter a number.",
            "max_digits": "Ensure that there are no more than %(max)s digits in total.",
            "max_decimal_places": "Ensure that there are no more than %(max)s decimal places.",
            "max_whole_digits":
                "Ensure that there are no more than %(max)s digits before the decimal point.",
        })
    }

    fn message(key: &str) -> String {
        Self::messages()[key].as_str().unwrap_or_default().to_string()
    }
}

impl Validator for DecimalValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return Ok(()),
        };
        let unsigned = text.trim_start_matches(['-', '+']);
        let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if (whole.is_empty() && frac.is_empty())
            || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(ValidationError::new(Self::message("invalid"), "invalid"));
        }
        let whole = whole.trim_start_matches('0');
        let frac = frac.trim_end_matches('0');
        let whole_digits = u32::try_from(whole.len()).unwrap_or(u32::MAX);
        let decimals = u32::try_from(frac.len()).unwrap_or(u32::MAX);
        let digits = whole_digits.saturating_add(decimals).max(1);

        if let Some(max) = self.max_digits {
            if digits > max {
                return Err(ValidationError::new(Self::message("max_digits"), "max_digits")
                    .with_param("max", max.to_string()));
            }
        }
        if let Some(places) = self.decimal_places {
            if decimals > places {
                return Err(ValidationError::new(
                    Self::message("max_decimal_places"),
                    "max_decimal_places",
                )
                .with_param("max", places.to_string()));
            }
        }
        if let (Some(max), Some(places)) = (self.max_digits, self.decimal_places) {
            let allowed = max.saturating_sub(places);
            if whole_digits > allowed {
                return Err(ValidationError::new(
                    Self::message("max_whole_digits"),
                    "max_whole_digits",
                )
                .with_param("max", allowed.to_string()));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "DecimalValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("messages".into(), Self::messages());
        map.insert("max_digits".into(), json!(self.max_digits));
        map.insert("decimal_places".into(), json!(self.decimal_places));
        map
    }
}

// ── Files ───────────────────────────────────────────────────────────

/// Restricts uploaded file extensions.
#[derive(Debug, Clone)]
pub struct FileExtensionValidator {
    pub allowed_extensions: Vec<String>,
}

impl FileExtensionValidator {
    pub const MESSAGE: &'static str = "File extension “%(extension)s” is not allowed. \
                                       Allowed extensions are: %(allowed_extensions)s.";

    pub fn new(allowed: &[&str]) -> Self {
        Self {
            allowed_extensions: allowed.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    fn check(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = std::path::Path::new(filename)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if self.allowed_extensions.contains(&extension) {
            return Ok(());
        }
        Err(ValidationError::new(Self::MESSAGE, "invalid_extension")
            .with_param("extension", extension)
            .with_param("allowed_extensions", self.allowed_extensions.join(", ")))
    }
}

impl Validator for FileExtensionValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        value.as_str().map_or(Ok(()), |name| self.check(name))
    }

    fn validate_file(&self, file: &UploadedFile) -> Result<(), ValidationError> {
        self.check(&file.name)
    }

    fn name(&self) -> &str {
        "FileExtensionValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("message".into(), json!(Self::MESSAGE));
        map.insert("code".into(), json!("invalid_extension"));
        map.insert("allowed_extensions".into(), json!(self.allowed_extensions));
        map
    }
}

/// Reads the pixel dimensions of an encoded image.
pub fn image_dimensions(content: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(std::io::Cursor::new(content))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Bounds the byte size and pixel dimensions of an uploaded image.
#[derive(Debug, Clone, Default)]
pub struct ImageValidator {
    /// Maximum size in bytes.
    pub size: Option<u64>,
    /// Minimum `(width, height)`.
    pub min_size: Option<(u32, u32)>,
    /// Maximum `(width, height)`.
    pub max_size: Option<(u32, u32)>,
}

impl ImageValidator {
    pub const DIMENSIONS: &'static str = "Image dimensions must be greater than or equal to \
        %(width)s width x %(height)s height, but your image size is %(value_width)s width x \
        %(value_height)s height.";
    pub const MAX_DIMENSIONS: &'static str = "Image dimensions must be less than %(width)s width \
        x %(height)s height, but your image size is %(value_width)s width x %(value_height)s \
        height.";
    pub const SIZE: &'static str = "File must be smaller than or equal to than > %(size)skB.";

    pub const fn new(
        size: Option<u64>,
        min_size: Option<(u32, u32)>,
        max_size: Option<(u32, u32)>,
    ) -> Self {
        Self {
            size,
            min_size,
            max_size,
        }
    }

    fn dimension_error(message: &str, bound: (u32, u32), actual: (u32, u32)) -> ValidationError {
        ValidationError::new(message, "invalid")
            .with_param("width", bound.0.to_string())
            .with_param("height", bound.1.to_string())
            .with_param("value_width", actual.0.to_string())
            .with_param("value_height", actual.1.to_string())
    }
}

impl Validator for ImageValidator {
    fn validate(&self, _value: &Value) -> Result<(), ValidationError> {
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn validate_file(&self, file: &UploadedFile) -> Result<(), ValidationError> {
        if let Some(limit) = self.size {
            if file.size() as u64 > limit {
                return Err(ValidationError::new(Self::SIZE, "invalid")
                    .with_param("size", (limit as f64 / 1024.0).to_string()));
            }
        }
        let Some(actual) = image_dimensions(&file.content) else {
            return Ok(());
        };
        if let Some(min) = self.min_size {
            if actual.0 < min.0 || actual.1 < min.1 {
                return Err(Self::dimension_error(Self::DIMENSIONS, min, actual));
            }
        }
        if let Some(max) = self.max_size {
            if actual.0 > max.0 || actual.1 > max.1 {
                return Err(Self::dimension_error(Self::MAX_DIMENSIONS, max, actual));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ImageValidator"
    }

    fn describe(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "messages".into(),
            json!({
                "dimensions": Self::DIMENSIONS,
                "max_dimensions": Self::MAX_DIMENSIONS,
                "size": Self::SIZE,
            }),
        );
        map.insert("size".into(), json!(self.size));
        map.insert("min_size".into(), json!(self.min_size.map(|(w, h)| [w, h])));
        map.insert("max_size".into(), json!(self.max_size.map(|(w, h)| [w, h])));
        map
    }
}
