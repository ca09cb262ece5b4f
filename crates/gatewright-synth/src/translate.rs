//! Per-construct config translation.
//!
//! Each translator reads a source policy's raw settings and produces the
//! target plugin's config map. Missing or malformed settings fall back to
//! safe defaults and surface a note instead of failing the run; the notes
//! end up in the run's warning list so nothing degrades silently.

use gatewright_model::policy::{PolicyDescriptor, PolicyType, RawConfig};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{json, Value};

/// A plugin's configuration block, key order preserved for rendering.
pub type PluginConfig = IndexMap<String, Value>;

/// A translated config plus any caveats raised during translation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    /// The target plugin configuration.
    pub config: PluginConfig,
    /// Human-readable caveats, e.g. an unparseable rate string.
    pub notes: Vec<String>,
}

impl Translation {
    fn plain(config: PluginConfig) -> Self {
        Self {
            config,
            notes: Vec::new(),
        }
    }
}

/// Translate one policy's raw settings into the config for `construct`.
///
/// Unknown constructs (custom plugin vehicles included) translate to an
/// empty config; their behavior lives in the generated handler, not in
/// declarative settings.
#[must_use]
pub fn translate_config(construct: &str, policy: &PolicyDescriptor) -> Translation {
    match construct {
        "key-auth" => key_auth(),
        "rate-limiting" => {
            if policy.policy_type == PolicyType::SpikeArrest {
                spike_arrest(&policy.raw_config)
            } else {
                quota(&policy.raw_config)
            }
        }
        "cors" => cors(&policy.raw_config),
        "request-transformer" | "response-transformer" => transformer(&policy.raw_config),
        "proxy-cache" => proxy_cache(&policy.raw_config),
        "file-log" => file_log(),
        "basic-auth" => basic_auth(),
        "oauth2" => oauth2(&policy.raw_config),
        _ => Translation::default(),
    }
}

/// Merge `overlay` into `base`, key by key.
///
/// Nested objects merge recursively, arrays union in order, and scalar
/// conflicts resolve in favor of the overlay. Bundle synthesis folds member
/// configs in member order, so the representative member's settings win.
pub fn merge_configs(base: &mut PluginConfig, overlay: PluginConfig) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => merge_values(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

fn merge_values(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(overlay)) => {
            for item in overlay {
                if !base.contains(&item) {
                    base.push(item);
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn key_auth() -> Translation {
    let mut config = PluginConfig::new();
    config.insert("key_names".into(), json!(["apikey", "api-key", "api_key"]));
    config.insert("key_in_header".into(), json!(true));
    config.insert("key_in_query".into(), json!(true));
    config.insert("hide_credentials".into(), json!(true));
    Translation::plain(config)
}

const QUOTA_UNITS: [&str; 4] = ["second", "minute", "hour", "day"];

fn quota(raw: &RawConfig) -> Translation {
    let allow = int_field(raw, "Allow").unwrap_or(100);
    let interval = int_field(raw, "Interval").unwrap_or(1);
    let unit_raw = string_field(raw, "TimeUnit").unwrap_or_else(|| "minute".to_owned());

    let mut notes = Vec::new();
    let lowered = unit_raw.to_ascii_lowercase();
    let unit = if QUOTA_UNITS.contains(&lowered.as_str()) {
        lowered
    } else {
        notes.push(format!(
            "quota time unit '{lowered}' has no target window; defaulted to minute"
        ));
        "minute".to_owned()
    };
    if interval > 1 {
        notes.push(format!(
            "quota interval {interval} {unit} collapsed to a single {unit} window; review the limit"
        ));
    }

    let mut config = PluginConfig::new();
    config.insert(unit, json!(allow));
    config.insert("policy".into(), json!("local"));
    config.insert("fault_tolerant".into(), json!(true));
    Translation { config, notes }
}

fn spike_arrest(raw: &RawConfig) -> Translation {
    let rate = string_field(raw, "Rate").unwrap_or_else(|| "100ps".to_owned());
    let mut config = PluginConfig::new();
    let mut notes = Vec::new();
    match parse_rate(&rate) {
        Some((limit, unit)) => {
            config.insert(unit.to_owned(), json!(limit));
        }
        None => {
            notes.push(format!(
                "spike arrest rate '{rate}' is unparseable; defaulted to 100 per second"
            ));
            config.insert("second".into(), json!(100));
        }
    }
    config.insert("policy".into(), json!("local"));
    Translation { config, notes }
}

/// Parse `<n>ps` / `<n>pm` spike rates into a `(limit, window)` pair.
fn parse_rate(rate: &str) -> Option<(i64, &'static str)> {
    let normalized = rate.trim().to_ascii_lowercase();
    let re = Regex::new(r"^(\d+)\s*(ps|pm)$").ok()?;
    let caps = re.captures(&normalized)?;
    let limit: i64 = caps[1].parse().ok()?;
    let unit = if &caps[2] == "ps" { "second" } else { "minute" };
    Some((limit, unit))
}

fn cors(raw: &RawConfig) -> Translation {
    let origins = list_field(raw, "AllowOrigins").unwrap_or_else(|| vec!["*".to_owned()]);
    let methods = list_field(raw, "AllowMethods").unwrap_or_else(|| {
        ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
            .map(String::from)
            .to_vec()
    });
    let headers = list_field(raw, "AllowHeaders").unwrap_or_else(|| {
        ["Accept", "Authorization", "Content-Type"]
            .map(String::from)
            .to_vec()
    });
    let exposed = list_field(raw, "ExposeHeaders").unwrap_or_default();
    let credentials = bool_field(raw, "AllowCredentials").unwrap_or(true);
    let max_age = int_field(raw, "MaxAge").unwrap_or(3600);

    let mut config = PluginConfig::new();
    config.insert("origins".into(), json!(origins));
    config.insert("methods".into(), json!(methods));
    config.insert("headers".into(), json!(headers));
    if !exposed.is_empty() {
        config.insert("exposed_headers".into(), json!(exposed));
    }
    config.insert("credentials".into(), json!(credentials));
    config.insert("max_age".into(), json!(max_age));
    Translation::plain(config)
}

fn transformer(raw: &RawConfig) -> Translation {
    let add = header_pairs(raw, "Add");
    let replace = header_pairs(raw, "Set");
    let remove = header_names(raw, "Remove");

    let mut config = PluginConfig::new();
    if !add.is_empty() {
        config.insert("add".into(), json!({ "headers": add }));
    }
    if !replace.is_empty() {
        config.insert("replace".into(), json!({ "headers": replace }));
    }
    if !remove.is_empty() {
        config.insert("remove".into(), json!({ "headers": remove }));
    }
    Translation::plain(config)
}

fn proxy_cache(raw: &RawConfig) -> Translation {
    let ttl = raw
        .get("ExpirySettings")
        .and_then(|v| v.get("TimeoutInSec"))
        .and_then(value_as_i64)
        .or_else(|| int_field(raw, "TimeoutInSec"))
        .unwrap_or(300);

    let mut config = PluginConfig::new();
    config.insert("strategy".into(), json!("memory"));
    config.insert("cache_ttl".into(), json!(ttl));
    config.insert(
        "content_type".into(),
        json!(["application/json", "text/plain"]),
    );
    config.insert("cache_control".into(), json!(false));
    Translation::plain(config)
}

fn file_log() -> Translation {
    let mut config = PluginConfig::new();
    config.insert("path".into(), json!("/tmp/kong-logs.log"));
    config.insert("reopen".into(), json!(true));
    Translation::plain(config)
}

fn basic_auth() -> Translation {
    let mut config = PluginConfig::new();
    config.insert("hide_credentials".into(), json!(true));
    Translation::plain(config)
}

fn oauth2(raw: &RawConfig) -> Translation {
    let scopes = list_field(raw, "Scopes")
        .or_else(|| list_field(raw, "Scope"))
        .unwrap_or_default();

    let mut config = PluginConfig::new();
    config.insert("enable_authorization_code".into(), json!(true));
    if !scopes.is_empty() {
        config.insert("scopes".into(), json!(scopes));
        config.insert("mandatory_scope".into(), json!(true));
    }
    Translation {
        config,
        notes: vec![
            "token endpoints and grant types need manual review against the source OAuth policy"
                .to_owned(),
        ],
    }
}

/// `Name:Value` pairs read from a section's `Headers` object.
fn header_pairs(raw: &RawConfig, section: &str) -> Vec<String> {
    let Some(Value::Object(body)) = raw.get(section) else {
        return Vec::new();
    };
    let Some(Value::Object(headers)) = body.get("Headers") else {
        return Vec::new();
    };
    headers
        .iter()
        .map(|(name, value)| match value {
            Value::String(s) => format!("{name}:{s}"),
            other => format!("{name}:{other}"),
        })
        .collect()
}

/// Header names read from a section's `Headers` list or object keys.
fn header_names(raw: &RawConfig, section: &str) -> Vec<String> {
    let Some(Value::Object(body)) = raw.get(section) else {
        return Vec::new();
    };
    match body.get("Headers") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        Some(Value::Object(headers)) => headers.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn string_field(raw: &RawConfig, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn int_field(raw: &RawConfig, key: &str) -> Option<i64> {
    raw.get(key).and_then(value_as_i64)
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bool_field(raw: &RawConfig, key: &str) -> Option<bool> {
    match raw.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Whether a list-like field is present as an array or a comma-joined string.
fn list_field(raw: &RawConfig, key: &str) -> Option<Vec<String>> {
    match raw.get(key)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
        ),
        Value::String(s) => Some(
            s.split(',')
                .map(|part| part.trim().to_owned())
                .filter(|part| !part.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewright_model::policy::ExecutionPhase;

    fn policy(policy_type: &str) -> PolicyDescriptor {
        PolicyDescriptor::new("p1", policy_type, ExecutionPhase::PreRequest, "pre", 0)
    }

    #[test]
    fn quota_maps_time_window() {
        let p = policy("Quota")
            .with_config("Allow", json!("1000"))
            .with_config("TimeUnit", json!("hour"))
            .with_config("Interval", json!("1"));
        let t = translate_config("rate-limiting", &p);
        assert_eq!(t.config.get("hour"), Some(&json!(1000)));
        assert_eq!(t.config.get("policy"), Some(&json!("local")));
        assert_eq!(t.config.get("fault_tolerant"), Some(&json!(true)));
        assert!(t.notes.is_empty());
    }

    #[test]
    fn quota_interval_above_one_is_noted() {
        let p = policy("Quota")
            .with_config("Allow", json!(600))
            .with_config("TimeUnit", json!("minute"))
            .with_config("Interval", json!(5));
        let t = translate_config("rate-limiting", &p);
        assert_eq!(t.config.get("minute"), Some(&json!(600)));
        assert!(t.notes[0].contains("interval 5"));
    }

    #[test]
    fn spike_rate_strings_parse_to_windows() {
        let per_second = policy("SpikeArrest").with_config("Rate", json!("100ps"));
        let t = translate_config("rate-limiting", &per_second);
        assert_eq!(t.config.get("second"), Some(&json!(100)));

        let per_minute = policy("SpikeArrest").with_config("Rate", json!("30pm"));
        let t = translate_config("rate-limiting", &per_minute);
        assert_eq!(t.config.get("minute"), Some(&json!(30)));
        assert!(t.notes.is_empty());
    }

    #[test]
    fn unparseable_spike_rate_falls_back_with_note() {
        let p = policy("SpikeArrest").with_config("Rate", json!("fast"));
        let t = translate_config("rate-limiting", &p);
        assert_eq!(t.config.get("second"), Some(&json!(100)));
        assert!(t.notes[0].contains("'fast'"));
    }

    #[test]
    fn key_auth_accepts_common_key_spellings() {
        let t = translate_config("key-auth", &policy("VerifyAPIKey"));
        assert_eq!(
            t.config.get("key_names"),
            Some(&json!(["apikey", "api-key", "api_key"]))
        );
        assert_eq!(t.config.get("hide_credentials"), Some(&json!(true)));
    }

    #[test]
    fn cors_reads_origins_and_defaults_the_rest() {
        let p = policy("CORS").with_config(
            "AllowOrigins",
            json!("https://a.example, https://b.example"),
        );
        let t = translate_config("cors", &p);
        assert_eq!(
            t.config.get("origins"),
            Some(&json!(["https://a.example", "https://b.example"]))
        );
        assert_eq!(
            t.config.get("methods"),
            Some(&json!(["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]))
        );
        assert_eq!(t.config.get("max_age"), Some(&json!(3600)));
    }

    #[test]
    fn assign_message_splits_add_and_remove() {
        let p = policy("AssignMessage")
            .with_config("Add", json!({ "Headers": { "X-Region": "eu" } }))
            .with_config("Remove", json!({ "Headers": ["X-Debug"] }));
        let t = translate_config("request-transformer", &p);
        assert_eq!(t.config.get("add"), Some(&json!({ "headers": ["X-Region:eu"] })));
        assert_eq!(t.config.get("remove"), Some(&json!({ "headers": ["X-Debug"] })));
        assert!(t.config.get("replace").is_none());
    }

    #[test]
    fn proxy_cache_reads_expiry_ttl() {
        let p = policy("ResponseCache")
            .with_config("ExpirySettings", json!({ "TimeoutInSec": "120" }));
        let t = translate_config("proxy-cache", &p);
        assert_eq!(t.config.get("cache_ttl"), Some(&json!(120)));
        assert_eq!(t.config.get("strategy"), Some(&json!("memory")));
    }

    #[test]
    fn unknown_construct_translates_to_empty_config() {
        let t = translate_config("custom-ldap-check", &policy("JavaCallout"));
        assert!(t.config.is_empty());
        assert!(t.notes.is_empty());
    }

    #[test]
    fn merge_unions_arrays_and_overrides_scalars() {
        let mut base = PluginConfig::new();
        base.insert("key_names".into(), json!(["apikey"]));
        base.insert("minute".into(), json!(100));

        let mut overlay = PluginConfig::new();
        overlay.insert("key_names".into(), json!(["apikey", "api-key"]));
        overlay.insert("minute".into(), json!(50));
        overlay.insert("policy".into(), json!("local"));

        merge_configs(&mut base, overlay);
        assert_eq!(base.get("key_names"), Some(&json!(["apikey", "api-key"])));
        assert_eq!(base.get("minute"), Some(&json!(50)));
        assert_eq!(base.get("policy"), Some(&json!("local")));
    }

    #[test]
    fn merge_recurses_into_nested_objects() {
        let mut base = PluginConfig::new();
        base.insert("add".into(), json!({ "headers": ["A:1"] }));

        let mut overlay = PluginConfig::new();
        overlay.insert("add".into(), json!({ "headers": ["B:2"], "querystring": ["q:1"] }));

        merge_configs(&mut base, overlay);
        assert_eq!(
            base.get("add"),
            Some(&json!({ "headers": ["A:1", "B:2"], "querystring": ["q:1"] }))
        );
    }
}
