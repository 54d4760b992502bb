//! Lookup index between bindings, migrations and the classes they name.

use crate::model::{BindingRecord, MigrationRecord};
use std::collections::{BTreeMap, HashMap};

/// Index built once per validation pass.
///
/// When several bindings share a class, the first one wins the lookup.
#[derive(Debug, Default)]
pub struct CrossRefIndex {
    bindings: Vec<BindingRecord>,
    migrations: Vec<MigrationRecord>,
    by_class: HashMap<String, usize>,
    by_tag: HashMap<String, usize>,
}

impl CrossRefIndex {
    pub fn build(bindings: Vec<BindingRecord>, migrations: Vec<MigrationRecord>) -> Self {
        let mut by_class = HashMap::new();
        for (i, b) in bindings.iter().enumerate() {
            if let Some(class) = &b.class_name {
                by_class.entry(class.clone()).or_insert(i);
            }
        }
        let mut by_tag = HashMap::new();
        for (i, m) in migrations.iter().enumerate() {
            if let Some(tag) = &m.tag {
                by_tag.entry(tag.clone()).or_insert(i);
            }
        }
        Self {
            bindings,
            migrations,
            by_class,
            by_tag,
        }
    }

    /// Binding whose `class_name` is `class`.
    pub fn resolve(&self, class: &str) -> Option<&BindingRecord> {
        self.by_class.get(class).map(|&i| &self.bindings[i])
    }

    pub fn migration(&self, tag: &str) -> Option<&MigrationRecord> {
        self.by_tag.get(tag).map(|&i| &self.migrations[i])
    }

    pub fn bindings(&self) -> &[BindingRecord] {
        &self.bindings
    }

    pub fn migrations(&self) -> &[MigrationRecord] {
        &self.migrations
    }

    /// Where each class named by a migration stands after replaying the
    /// migrations in document order. Classes never mentioned are absent.
    pub fn class_fates(&self) -> BTreeMap<&str, ClassFate<'_>> {
        let mut fates = BTreeMap::new();
        for m in &self.migrations {
            for class in &m.new_classes {
                fates.insert(class.as_str(), ClassFate::Live);
            }
            for rename in &m.renamed {
                fates.insert(
                    rename.from.as_str(),
                    ClassFate::RenamedTo {
                        to: rename.to.as_str(),
                        migration: m,
                    },
                );
                fates.insert(rename.to.as_str(), ClassFate::Live);
            }
            for class in &m.deleted {
                fates.insert(class.as_str(), ClassFate::Deleted { migration: m });
            }
        }
        fates
    }
}

/// Final state of a class after all migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassFate<'a> {
    Live,
    Deleted {
        migration: &'a MigrationRecord,
    },
    RenamedTo {
        to: &'a str,
        migration: &'a MigrationRecord,
    },
}
