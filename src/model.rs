use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::annotation::Annotation;
use crate::error::XrefError;
use crate::gpr::Association;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(default)]
    pub species: IndexMap<String, Species>,
    #[serde(default)]
    pub reactions: IndexMap<String, Reaction>,
    #[serde(default)]
    pub gene_products: IndexMap<String, GeneProduct>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_id: Option<String>,
    #[serde(default, skip_serializing_if = "Annotation::is_empty")]
    pub annotation: Annotation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_id: Option<String>,
    #[serde(default, skip_serializing_if = "Annotation::is_empty")]
    pub annotation: Annotation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene_reaction_rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene_product_association: Option<Association>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneProduct {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_id: Option<String>,
    #[serde(default, skip_serializing_if = "Annotation::is_empty")]
    pub annotation: Annotation,
    #[serde(default)]
    pub label: String,
}

impl Species {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

impl Reaction {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

impl GeneProduct {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            ..Self::default()
        }
    }
}

impl Model {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, XrefError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|_| XrefError::ModelRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| XrefError::ModelParse(err.to_string()))
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), XrefError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .map_err(|err| XrefError::ModelWrite(err.to_string()))?;
        fs::write(path, content)
            .map_err(|err| XrefError::ModelWrite(format!("{}: {err}", path.display())))
    }

    pub fn add_species(&mut self, species: Species) {
        self.species.insert(species.id.clone(), species);
    }

    pub fn add_reaction(&mut self, reaction: Reaction) {
        self.reactions.insert(reaction.id.clone(), reaction);
    }

    pub fn add_gene_product(&mut self, gene_product: GeneProduct) {
        self.gene_products
            .insert(gene_product.id.clone(), gene_product);
    }

    /// Renames a gene product in place, keeping its position and rewriting every
    /// association leaf that referenced the old id. Returns `false` if `old_id` is
    /// unknown or `new_id` is already taken.
    pub fn rename_gene_product(&mut self, old_id: &str, new_id: &str) -> bool {
        if old_id == new_id {
            return self.gene_products.contains_key(old_id);
        }
        if self.gene_products.contains_key(new_id) {
            return false;
        }
        let Some((index, _, mut gene_product)) = self.gene_products.shift_remove_full(old_id) else {
            return false;
        };
        gene_product.id = new_id.to_string();
        self.gene_products
            .shift_insert(index, new_id.to_string(), gene_product);

        for reaction in self.reactions.values_mut() {
            if let Some(association) = reaction.gene_product_association.as_mut() {
                association.rename_leaf(old_id, new_id);
            }
        }
        info!(from = %old_id, to = %new_id, "renamed gene product");
        true
    }
}
