//! Smart-folder categorization
//!
//! Maps an asset to the destination subpath of the first smart folder whose
//! conditions it satisfies. Nested smart folders refine their parent's path.

use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::ExportError;
use crate::models::{AssetInfo, Condition, Folder, LibraryInfo, MatchMode, Rule, SmartFolder};

/// Destination folder for assets that match no smart folder
pub const UNCATEGORIZED_DIR: &str = "uncategorized";

/// Stateless rule evaluator shared read-only by every export task
#[derive(Debug, Clone)]
pub struct CategoryResolver {
    smart_folders: Vec<SmartFolder>,
    folder_ids: HashSet<String>,
}

impl CategoryResolver {
    /// Build a resolver from the library-wide metadata document
    pub fn new(library: &LibraryInfo) -> Self {
        let mut folder_ids = HashSet::new();
        collect_folder_ids(&library.folders, &mut folder_ids);
        Self {
            smart_folders: library.smart_folders.clone(),
            folder_ids,
        }
    }

    /// Number of top-level smart folders
    pub fn len(&self) -> usize {
        self.smart_folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.smart_folders.is_empty()
    }

    /// Compute the category of an asset
    ///
    /// Returns an empty path when no smart folder matches.
    pub fn resolve(&self, asset: &AssetInfo) -> Result<PathBuf, ExportError> {
        let mut category = PathBuf::new();
        self.resolve_in(&self.smart_folders, asset, &mut category)?;
        Ok(category)
    }

    fn resolve_in(
        &self,
        folders: &[SmartFolder],
        asset: &AssetInfo,
        category: &mut PathBuf,
    ) -> Result<bool, ExportError> {
        for folder in folders {
            if self.folder_matches(folder, asset)? {
                category.push(segment_name(folder));
                self.resolve_in(&folder.children, asset, category)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn folder_matches(&self, folder: &SmartFolder, asset: &AssetInfo) -> Result<bool, ExportError> {
        if folder.conditions.is_empty() {
            return Ok(false);
        }
        let mut matched = true;
        for condition in &folder.conditions {
            matched &= self.condition_holds(folder, condition, asset)?;
        }
        Ok(matched)
    }

    fn condition_holds(
        &self,
        folder: &SmartFolder,
        condition: &Condition,
        asset: &AssetInfo,
    ) -> Result<bool, ExportError> {
        // A condition without rules holds for nothing, negated or not
        if condition.rules.is_empty() {
            return Ok(false);
        }
        // Every rule and condition is evaluated so a malformed rule is
        // reported even when an earlier one already decides the folder.
        let mut results = Vec::with_capacity(condition.rules.len());
        for rule in &condition.rules {
            results.push(self.rule_holds(folder, rule, asset)?);
        }
        let combined = match condition.match_mode {
            MatchMode::And => results.iter().all(|r| *r),
            MatchMode::Or => results.iter().any(|r| *r),
        };
        Ok(combined != condition.is_negated())
    }

    fn rule_holds(
        &self,
        folder: &SmartFolder,
        rule: &Rule,
        asset: &AssetInfo,
    ) -> Result<bool, ExportError> {
        let invalid = |message: String| ExportError::invalid_rule(&folder.name, message);

        match rule.property.as_str() {
            "tags" => list_rule(&asset.tags, rule).map_err(invalid),
            "folders" => {
                let wanted = string_list(&rule.value).map_err(|m| invalid(rule_context(rule, m)))?;
                if let Some(unknown) = wanted.iter().find(|id| !self.folder_ids.contains(*id)) {
                    return Err(invalid(format!("rule references undefined folder '{}'", unknown)));
                }
                list_rule(&asset.folders, rule).map_err(invalid)
            }
            "name" => text_rule(&asset.name, rule).map_err(invalid),
            "ext" => text_rule(&asset.ext, rule).map_err(invalid),
            "annotation" => text_rule(&asset.annotation, rule).map_err(invalid),
            "url" => text_rule(&asset.url, rule).map_err(invalid),
            "star" => number_rule(asset.star, rule).map_err(invalid),
            "width" => number_rule(asset.width, rule).map_err(invalid),
            "height" => number_rule(asset.height, rule).map_err(invalid),
            "size" => number_rule(asset.size, rule).map_err(invalid),
            other => Err(invalid(format!("unknown property '{}'", other))),
        }
    }
}

fn collect_folder_ids(folders: &[Folder], ids: &mut HashSet<String>) {
    for folder in folders {
        ids.insert(folder.id.clone());
        collect_folder_ids(&folder.children, ids);
    }
}

/// Folder name usable as a single path segment
fn segment_name(folder: &SmartFolder) -> String {
    let name = if folder.name.trim().is_empty() {
        &folder.id
    } else {
        &folder.name
    };
    let segment = name.replace(['/', '\\'], "_");
    match segment.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => segment,
    }
}

fn rule_context(rule: &Rule, message: String) -> String {
    format!("{} {}: {}", rule.property, rule.method, message)
}

fn unknown_method(rule: &Rule) -> String {
    format!(
        "unknown method '{}' for property '{}'",
        rule.method, rule.property
    )
}

fn string_list(value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("expected string, got {}", item))
            })
            .collect(),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Null => Ok(Vec::new()),
        other => Err(format!("expected list of strings, got {}", other)),
    }
}

fn list_rule(actual: &[String], rule: &Rule) -> Result<bool, String> {
    match rule.method.as_str() {
        "empty" => return Ok(actual.is_empty()),
        "notEmpty" => return Ok(!actual.is_empty()),
        _ => {}
    }
    let wanted = string_list(&rule.value).map_err(|m| rule_context(rule, m))?;
    let actual: HashSet<&str> = actual.iter().map(String::as_str).collect();
    match rule.method.as_str() {
        "union" => Ok(wanted.iter().any(|w| actual.contains(w.as_str()))),
        "intersection" => Ok(wanted.iter().all(|w| actual.contains(w.as_str()))),
        "equal" => {
            let wanted: HashSet<&str> = wanted.iter().map(String::as_str).collect();
            Ok(wanted == actual)
        }
        _ => Err(unknown_method(rule)),
    }
}

fn text_rule(actual: &str, rule: &Rule) -> Result<bool, String> {
    match rule.method.as_str() {
        "empty" => return Ok(actual.is_empty()),
        "notEmpty" => return Ok(!actual.is_empty()),
        _ => {}
    }
    let wanted = match &rule.value {
        Value::String(s) => s.to_lowercase(),
        other => return Err(rule_context(rule, format!("expected string, got {}", other))),
    };
    let actual = actual.to_lowercase();
    match rule.method.as_str() {
        "contain" => Ok(actual.contains(&wanted)),
        "uncontain" => Ok(!actual.contains(&wanted)),
        "is" => Ok(actual == wanted),
        "isNot" => Ok(actual != wanted),
        "startWith" => Ok(actual.starts_with(&wanted)),
        "endWith" => Ok(actual.ends_with(&wanted)),
        _ => Err(unknown_method(rule)),
    }
}

fn number_rule(actual: Option<i64>, rule: &Rule) -> Result<bool, String> {
    let number = |value: &Value| {
        value
            .as_f64()
            .ok_or_else(|| rule_context(rule, format!("expected number, got {}", value)))
    };
    let bounds = match rule.method.as_str() {
        "equal" | "greaterThan" | "lessThan" => {
            let n = number(&rule.value)?;
            (n, n)
        }
        "between" => match &rule.value {
            Value::Array(items) if items.len() == 2 => (number(&items[0])?, number(&items[1])?),
            other => {
                return Err(rule_context(
                    rule,
                    format!("expected [min, max], got {}", other),
                ))
            }
        },
        _ => return Err(unknown_method(rule)),
    };
    // Assets without the attribute never satisfy a numeric comparison
    let Some(actual) = actual else {
        return Ok(false);
    };
    let actual = actual as f64;
    Ok(match rule.method.as_str() {
        "equal" => actual == bounds.0,
        "greaterThan" => actual > bounds.0,
        "lessThan" => actual < bounds.0,
        _ => actual >= bounds.0 && actual <= bounds.1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportErrorKind;
    use proptest::prelude::*;
    use serde_json::json;

    fn library(value: Value) -> LibraryInfo {
        serde_json::from_value(value).expect("invalid library fixture")
    }

    fn asset(tags: &[&str]) -> AssetInfo {
        AssetInfo {
            id: "a1".to_string(),
            name: "Sunset Beach".to_string(),
            ext: "jpg".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn tag_folder(name: &str, method: &str, tags: &[&str]) -> Value {
        json!({
            "id": name.to_lowercase(),
            "name": name,
            "conditions": [{"match": "AND", "boolean": "TRUE",
                "rules": [{"property": "tags", "method": method, "value": tags}]}]
        })
    }

    #[test]
    fn test_no_smart_folders_is_uncategorized() {
        let resolver = CategoryResolver::new(&LibraryInfo::default());
        assert!(resolver.is_empty());
        assert_eq!(resolver.resolve(&asset(&["cat"])).unwrap(), PathBuf::new());
    }

    #[test]
    fn test_first_matching_folder_wins() {
        let resolver = CategoryResolver::new(&library(json!({
            "smartFolders": [
                tag_folder("Dogs", "union", &["dog"]),
                tag_folder("Cats", "union", &["cat", "kitten"]),
                tag_folder("Animals", "notEmpty", &[]),
            ]
        })));

        assert_eq!(resolver.resolve(&asset(&["kitten"])).unwrap(), PathBuf::from("Cats"));
        assert_eq!(resolver.resolve(&asset(&["bird"])).unwrap(), PathBuf::from("Animals"));
        assert_eq!(resolver.resolve(&asset(&[])).unwrap(), PathBuf::new());
    }

    #[test]
    fn test_nested_folders_refine_path() {
        let mut parent = tag_folder("Travel", "union", &["travel"]);
        parent["children"] = json!([
            tag_folder("Italy", "intersection", &["travel", "italy"]),
        ]);
        let resolver = CategoryResolver::new(&library(json!({ "smartFolders": [parent] })));

        assert_eq!(
            resolver.resolve(&asset(&["travel", "italy"])).unwrap(),
            PathBuf::from("Travel").join("Italy")
        );
        assert_eq!(
            resolver.resolve(&asset(&["travel"])).unwrap(),
            PathBuf::from("Travel")
        );
        // Child never matches without its parent
        assert_eq!(resolver.resolve(&asset(&["italy"])).unwrap(), PathBuf::new());
    }

    #[test]
    fn test_negated_or_condition() {
        let resolver = CategoryResolver::new(&library(json!({
            "smartFolders": [{
                "name": "Not Screenshots",
                "conditions": [{"match": "OR", "boolean": "FALSE", "rules": [
                    {"property": "name", "method": "startWith", "value": "screenshot"},
                    {"property": "ext", "method": "is", "value": "PNG"}
                ]}]
            }]
        })));

        assert_eq!(
            resolver.resolve(&asset(&[])).unwrap(),
            PathBuf::from("Not Screenshots")
        );

        let mut png = asset(&[]);
        png.ext = "png".to_string();
        assert_eq!(resolver.resolve(&png).unwrap(), PathBuf::new());
    }

    #[test]
    fn test_numeric_rules() {
        let resolver = CategoryResolver::new(&library(json!({
            "smartFolders": [{
                "name": "Favorites",
                "conditions": [{"rules": [
                    {"property": "star", "method": "greaterThan", "value": 3},
                    {"property": "width", "method": "between", "value": [1000, 4000]}
                ]}]
            }]
        })));

        let mut favorite = asset(&[]);
        favorite.star = Some(5);
        favorite.width = Some(1920);
        assert_eq!(resolver.resolve(&favorite).unwrap(), PathBuf::from("Favorites"));

        favorite.width = None;
        assert_eq!(resolver.resolve(&favorite).unwrap(), PathBuf::new());
    }

    #[test]
    fn test_folder_rule_checks_defined_folders() {
        let resolver = CategoryResolver::new(&library(json!({
            "folders": [{"id": "f1", "name": "Trips", "children": [{"id": "f2", "name": "Rome"}]}],
            "smartFolders": [{
                "name": "Rome",
                "conditions": [{"rules": [
                    {"property": "folders", "method": "union", "value": ["f2"]}
                ]}]
            }]
        })));
        let mut in_rome = asset(&[]);
        in_rome.folders = vec!["f2".to_string()];
        assert_eq!(resolver.resolve(&in_rome).unwrap(), PathBuf::from("Rome"));

        let broken = CategoryResolver::new(&library(json!({
            "folders": [],
            "smartFolders": [{
                "name": "Broken",
                "conditions": [{"rules": [
                    {"property": "folders", "method": "union", "value": ["missing"]}
                ]}]
            }]
        })));
        let err = broken.resolve(&in_rome).unwrap_err();
        assert_eq!(err.kind, ExportErrorKind::InvalidRule);
        assert!(err.message.contains("undefined folder 'missing'"));
    }

    #[test]
    fn test_unknown_property_and_method() {
        let resolver = CategoryResolver::new(&library(json!({
            "smartFolders": [{
                "name": "Colors",
                "conditions": [{"rules": [{"property": "color", "method": "is", "value": "red"}]}]
            }]
        })));
        let err = resolver.resolve(&asset(&[])).unwrap_err();
        assert_eq!(err.kind, ExportErrorKind::InvalidRule);
        assert!(err.message.contains("unknown property 'color'"));

        let resolver = CategoryResolver::new(&library(json!({
            "smartFolders": [tag_folder("Odd", "sortOf", &["x"])]
        })));
        let err = resolver.resolve(&asset(&["x"])).unwrap_err();
        assert!(err.message.contains("unknown method 'sortOf'"));
    }

    #[test]
    fn test_separators_in_names_are_replaced() {
        let resolver = CategoryResolver::new(&library(json!({
            "smartFolders": [tag_folder("A/B\\C", "union", &["x"])]
        })));
        assert_eq!(resolver.resolve(&asset(&["x"])).unwrap(), PathBuf::from("A_B_C"));
    }

    #[test]
    fn test_dot_names_stay_inside_output() {
        for name in ["..", ".", ""] {
            let mut folder = tag_folder(name, "union", &["x"]);
            folder["id"] = json!("");
            let resolver = CategoryResolver::new(&library(json!({ "smartFolders": [folder] })));
            assert_eq!(resolver.resolve(&asset(&["x"])).unwrap(), PathBuf::from("_"));
        }
    }

    #[test]
    fn test_condition_without_rules_never_matches() {
        let resolver = CategoryResolver::new(&library(json!({
            "smartFolders": [
                {"name": "Swallow", "conditions": [{"match": "AND", "rules": []}]},
                tag_folder("Cats", "union", &["cat"]),
            ]
        })));
        assert_eq!(resolver.resolve(&asset(&["cat"])).unwrap(), PathBuf::from("Cats"));
        assert_eq!(resolver.resolve(&asset(&[])).unwrap(), PathBuf::new());

        let negated = CategoryResolver::new(&library(json!({
            "smartFolders": [{"name": "Inverse", "conditions": [{"boolean": "FALSE", "rules": []}]}]
        })));
        assert_eq!(negated.resolve(&asset(&[])).unwrap(), PathBuf::new());
    }

    #[test]
    fn test_invalid_rule_in_later_condition_is_reported() {
        let resolver = CategoryResolver::new(&library(json!({
            "smartFolders": [{
                "name": "Mixed",
                "conditions": [
                    {"rules": [{"property": "tags", "method": "union", "value": ["dog"]}]},
                    {"rules": [{"property": "color", "method": "is", "value": "red"}]}
                ]
            }]
        })));
        let err = resolver.resolve(&asset(&["cat"])).unwrap_err();
        assert_eq!(err.kind, ExportErrorKind::InvalidRule);
        assert!(err.message.contains("unknown property 'color'"));
    }

    #[test]
    fn test_folder_without_conditions_never_matches() {
        let resolver = CategoryResolver::new(&library(json!({
            "smartFolders": [{"name": "Everything"}]
        })));
        assert_eq!(resolver.resolve(&asset(&["x"])).unwrap(), PathBuf::new());
    }

    proptest! {
        #[test]
        fn prop_resolution_is_deterministic(tags in proptest::collection::vec("[a-d]", 0..4)) {
            let resolver = CategoryResolver::new(&library(json!({
                "smartFolders": [
                    tag_folder("A", "union", &["a"]),
                    tag_folder("BC", "intersection", &["b", "c"]),
                ]
            })));
            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            let info = asset(&tags);

            let first = resolver.resolve(&info).unwrap();
            let second = resolver.resolve(&info).unwrap();
            prop_assert_eq!(&first, &second);

            let expected = if tags.contains(&"a") {
                PathBuf::from("A")
            } else if tags.contains(&"b") && tags.contains(&"c") {
                PathBuf::from("BC")
            } else {
                PathBuf::new()
            };
            prop_assert_eq!(first, expected);
        }
    }
}
