//! Clinical concept library.
//!
//! Named clinical shorthands (diagnoses, lab panels, bundling rules) loaded
//! from YAML and presented to the LLM as prompt context. Concepts never
//! short-circuit validation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleLogic {
    SameVisit,
    SameDay,
    SameOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Concept {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Optional SQL WHERE fragment implementing the concept
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub icd10_codes: Vec<String>,
    #[serde(default)]
    pub icd9_codes: Vec<String>,
    /// Lab test names
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub bundle_logic: Option<BundleLogic>,
    /// Tables relevant to the concept
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConceptLibrary {
    pub concepts: BTreeMap<String, Concept>,
}

impl ConceptLibrary {
    /// Load concepts from a YAML map of `name -> definition`.
    ///
    /// A missing file yields an empty library; concepts are optional
    /// context, not a startup requirement.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!("Concepts file not found: {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let raw: BTreeMap<String, Concept> = serde_yaml::from_str(&content)?;

        let concepts = raw
            .into_iter()
            .map(|(name, mut concept)| {
                concept.name = name.clone();
                (name, concept)
            })
            .collect::<BTreeMap<_, _>>();

        tracing::info!("Loaded {} clinical concepts", concepts.len());
        Ok(Self { concepts })
    }

    pub fn get(&self, name: &str) -> Option<&Concept> {
        self.concepts.get(name)
    }

    /// Search by name or description substring, case-insensitive.
    pub fn search(&self, query: &str) -> Vec<&Concept> {
        let query_lower = query.to_lowercase();
        self.concepts
            .values()
            .filter(|c| {
                c.name.to_lowercase().contains(&query_lower)
                    || c.description.to_lowercase().contains(&query_lower)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}
