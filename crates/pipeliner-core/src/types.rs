//! The config value type taxonomy: `int`, `int[min,max]`, `float`, `float[min,max]`,
//! `output_image_list`, `output_detections_file`, and a fallback `string`.

use once_cell::sync::Lazy;
use regex::Regex;

static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^int(?:\[(-?\d+),(-?\d+)?\])?$").unwrap());
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^float(?:\[([+-]?(?:[0-9]*\.)?[0-9]+),([+-]?(?:[0-9]*\.)?[0-9]+)?\])?$").unwrap()
});

/// A parsed config value type, along with whatever bounds it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigType {
    Int {
        min: Option<i64>,
        max: Option<i64>,
    },
    Float {
        min: Option<f64>,
        max: Option<f64>,
    },
    OutputImageList,
    OutputDetectionsFile,
    String,
}

impl ConfigType {
    /// Tag as it appears in a manifest (`int[0,10]`, `output_image_list`, ...).
    pub fn tag(&self) -> String {
        match self {
            ConfigType::Int { min, max } => match (min, max) {
                (Some(a), Some(b)) => format!("int[{a},{b}]"),
                (Some(a), None) => format!("int[{a},]"),
                _ => "int".to_string(),
            },
            ConfigType::Float { min, max } => match (min, max) {
                (Some(a), Some(b)) => format!("float[{a},{b}]"),
                (Some(a), None) => format!("float[{a},]"),
                _ => "float".to_string(),
            },
            ConfigType::OutputImageList => "output_image_list".to_string(),
            ConfigType::OutputDetectionsFile => "output_detections_file".to_string(),
            ConfigType::String => "string".to_string(),
        }
    }

    /// Whether `value` satisfies this type, and if so, its normalised form.
    ///
    /// Output-file types strip a required extension from the stored value; the
    /// extension is re-attached later by the pipeline compiler's filename pass.
    pub fn validate(&self, value: &str) -> Option<String> {
        match self {
            ConfigType::Int { min, max } => {
                let n: i64 = value.parse().ok()?;
                if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                    return None;
                }
                Some(n.to_string())
            }
            ConfigType::Float { min, max } => {
                let f: f64 = value.parse().ok()?;
                if min.is_some_and(|m| f < m) || max.is_some_and(|m| f > m) {
                    return None;
                }
                Some(f.to_string())
            }
            ConfigType::OutputImageList => strip_extension(value, "txt"),
            ConfigType::OutputDetectionsFile => strip_extension(value, "csv"),
            ConfigType::String => Some(value.to_string()),
        }
    }
}

fn strip_extension(value: &str, expected: &str) -> Option<String> {
    let path = camino::Utf8Path::new(value);
    let ext = path.extension()?;
    if ext != expected {
        return None;
    }
    Some(path.with_extension("").to_string())
}

/// Parse a type tag from a manifest into a [`ConfigType`]. Anything that does not
/// match a known shape falls through to [`ConfigType::String`], matching the
/// permissive behaviour of the system this was modeled on.
pub fn parse_type(tag: &str) -> ConfigType {
    let tag = tag.trim();
    if let Some(caps) = INT_RE.captures(tag) {
        let min = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let max = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return ConfigType::Int { min, max };
    }
    if let Some(caps) = FLOAT_RE.captures(tag) {
        let min = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let max = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return ConfigType::Float { min, max };
    }
    if tag.starts_with("output_image_list") {
        return ConfigType::OutputImageList;
    }
    if tag.starts_with("output_detections_file") {
        return ConfigType::OutputDetectionsFile;
    }
    ConfigType::String
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_int() {
        assert_eq!(parse_type("int"), ConfigType::Int { min: None, max: None });
    }

    #[test]
    fn parses_bounded_int() {
        assert_eq!(
            parse_type("int[0,10]"),
            ConfigType::Int {
                min: Some(0),
                max: Some(10)
            }
        );
    }

    #[test]
    fn parses_open_upper_float() {
        assert_eq!(
            parse_type("float[0.5,]"),
            ConfigType::Float {
                min: Some(0.5),
                max: None
            }
        );
    }

    #[test]
    fn unknown_tag_falls_back_to_string() {
        assert_eq!(parse_type("frobnicate"), ConfigType::String);
    }

    #[test]
    fn int_bounds_reject_out_of_range() {
        let t = parse_type("int[0,10]");
        assert_eq!(t.validate("5"), Some("5".to_string()));
        assert_eq!(t.validate("11"), None);
        assert_eq!(t.validate("-1"), None);
        assert_eq!(t.validate("abc"), None);
    }

    #[test]
    fn output_image_list_requires_txt_and_strips_it() {
        let t = ConfigType::OutputImageList;
        assert_eq!(t.validate("foo.txt"), Some("foo".to_string()));
        assert_eq!(t.validate("foo.csv"), None);
    }

    #[test]
    fn output_detections_requires_csv_and_strips_it() {
        let t = ConfigType::OutputDetectionsFile;
        assert_eq!(t.validate("foo.csv"), Some("foo".to_string()));
        assert_eq!(t.validate("foo.txt"), None);
    }
}
