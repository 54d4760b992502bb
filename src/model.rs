//! Typed views over the bindings and migrations sections.

use crate::reader::ConfigDocument;
use crate::types::ValidateConfig;
use serde_json::Value;

/// The raw string, unless it is blank. Padding is kept: wrangler
/// compares these values literally.
fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// One entry of the bindings section.
///
/// Fields are optional because shape checking happens in the rules,
/// not at extraction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRecord {
    /// Position in the bindings array.
    pub index: usize,
    pub name: Option<String>,
    pub class_name: Option<String>,
    pub script_name: Option<String>,
    /// False when the entry was not a JSON object.
    pub is_object: bool,
}

impl BindingRecord {
    pub fn from_value(index: usize, value: &Value) -> Self {
        let obj = value.as_object();
        let field = |key: &str| non_blank(obj.and_then(|o| o.get(key)));
        Self {
            index,
            name: field("name"),
            class_name: field("class_name"),
            script_name: field("script_name"),
            is_object: obj.is_some(),
        }
    }

    /// Human label: `binding "NAME"` when named, else `binding #N`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("binding \"{}\"", name),
            None => format!("binding #{}", self.index + 1),
        }
    }

    /// True when the binding points at a class in another worker script.
    pub fn is_external(&self) -> bool {
        self.script_name.is_some()
    }
}

/// A `{from, to}` pair from a rename list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// One entry of the migrations section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub index: usize,
    pub tag: Option<String>,
    /// Classes introduced by this step, across every newly-added list.
    pub new_classes: Vec<String>,
    pub renamed: Vec<Rename>,
    pub deleted: Vec<String>,
}

impl MigrationRecord {
    pub fn from_value(index: usize, value: &Value, config: &ValidateConfig) -> Self {
        let obj = value.as_object();
        let strings = |key: &str| -> Vec<String> {
            obj.and_then(|o| o.get(key))
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let new_classes = config
            .new_class_keys
            .iter()
            .flat_map(|key| strings(*key))
            .collect();

        let renamed = obj
            .and_then(|o| o.get(config.renamed_classes_key))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let from = item.get("from")?.as_str()?;
                        let to = item.get("to")?.as_str()?;
                        Some(Rename {
                            from: from.to_string(),
                            to: to.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            index,
            tag: non_blank(obj.and_then(|o| o.get("tag"))),
            new_classes,
            renamed,
            deleted: strings(config.deleted_classes_key),
        }
    }

    pub fn label(&self) -> String {
        match &self.tag {
            Some(tag) => format!("migration \"{}\"", tag),
            None => format!("migration #{}", self.index + 1),
        }
    }
}

/// Extract every binding record, in document order.
pub fn bindings(doc: &ConfigDocument, config: &ValidateConfig) -> Vec<BindingRecord> {
    doc.section(config.bindings_path)
        .iter()
        .enumerate()
        .map(|(i, v)| BindingRecord::from_value(i, v))
        .collect()
}

/// Extract every migration record, in document order.
pub fn migrations(doc: &ConfigDocument, config: &ValidateConfig) -> Vec<MigrationRecord> {
    doc.section(config.migrations_path)
        .iter()
        .enumerate()
        .map(|(i, v)| MigrationRecord::from_value(i, v, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binding_from_value() {
        let b = BindingRecord::from_value(
            0,
            &json!({ "name": "COUNTER", "class_name": "Counter", "script_name": "other" }),
        );
        assert_eq!(b.name.as_deref(), Some("COUNTER"));
        assert_eq!(b.class_name.as_deref(), Some("Counter"));
        assert!(b.is_external());
        assert_eq!(b.label(), "binding \"COUNTER\"");
    }

    #[test]
    fn binding_blank_fields_count_as_missing() {
        let b = BindingRecord::from_value(2, &json!({ "name": "  ", "class_name": 5 }));
        assert!(b.name.is_none());
        assert!(b.class_name.is_none());
        assert!(b.is_object);
        assert_eq!(b.label(), "binding #3");
    }

    #[test]
    fn binding_keeps_padding() {
        let b = BindingRecord::from_value(
            0,
            &json!({ "name": "COUNTER ", "class_name": " Counter" }),
        );
        assert_eq!(b.name.as_deref(), Some("COUNTER "));
        assert_eq!(b.class_name.as_deref(), Some(" Counter"));
    }

    #[test]
    fn binding_non_object() {
        let b = BindingRecord::from_value(0, &json!("COUNTER"));
        assert!(!b.is_object);
    }

    #[test]
    fn migration_collects_all_new_class_lists() {
        let config = ValidateConfig::durable_objects();
        let m = MigrationRecord::from_value(
            0,
            &json!({
                "tag": "v1",
                "new_classes": ["Legacy"],
                "new_sqlite_classes": ["Counter", "Chat"],
                "renamed_classes": [{ "from": "Old", "to": "New" }, { "from": "x" }],
                "deleted_classes": ["Gone"]
            }),
            &config,
        );
        assert_eq!(m.tag.as_deref(), Some("v1"));
        assert_eq!(m.new_classes, vec!["Legacy", "Counter", "Chat"]);
        assert_eq!(
            m.renamed,
            vec![Rename {
                from: "Old".into(),
                to: "New".into()
            }]
        );
        assert_eq!(m.deleted, vec!["Gone"]);
    }

    #[test]
    fn migration_without_tag() {
        let config = ValidateConfig::durable_objects();
        let m = MigrationRecord::from_value(1, &json!({ "new_sqlite_classes": ["A"] }), &config);
        assert!(m.tag.is_none());
        assert_eq!(m.label(), "migration #2");
    }

    #[test]
    fn migration_tag_keeps_padding() {
        let config = ValidateConfig::durable_objects();
        let m = MigrationRecord::from_value(0, &json!({ "tag": "v1 " }), &config);
        assert_eq!(m.tag.as_deref(), Some("v1 "));
    }
}
