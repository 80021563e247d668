use super::score::LegacyEsgScores;
use serde::{Deserialize, Serialize};

/// Level of an entity in the ownership hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Fund,
    Company,
    Project,
}

impl EntityKind {
    /// Kind a direct child of this entity must have
    pub fn child_kind(self) -> Option<EntityKind> {
        match self {
            Self::Fund => Some(Self::Company),
            Self::Company => Some(Self::Project),
            Self::Project => None,
        }
    }

    /// Kind a direct parent of this entity must have
    pub fn parent_kind(self) -> Option<EntityKind> {
        match self {
            Self::Fund => None,
            Self::Company => Some(Self::Fund),
            Self::Project => Some(Self::Company),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fund => "fund",
            Self::Company => "company",
            Self::Project => "project",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the Fund → Company → Project forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub child_ids: Vec<String>,
    #[serde(default)]
    pub sector: Option<String>,
    /// Pre-computed scores from an upstream provider, if any
    #[serde(default)]
    pub esg_scores: Option<LegacyEsgScores>,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            parent_id: None,
            child_ids: Vec::new(),
            sector: None,
            esg_scores: None,
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.child_ids = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == EntityKind::Project
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ordering_matches_hierarchy() {
        assert_eq!(EntityKind::Fund.child_kind(), Some(EntityKind::Company));
        assert_eq!(EntityKind::Company.child_kind(), Some(EntityKind::Project));
        assert_eq!(EntityKind::Project.child_kind(), None);
        assert_eq!(EntityKind::Project.parent_kind(), Some(EntityKind::Company));
        assert_eq!(EntityKind::Fund.parent_kind(), None);
    }

    #[test]
    fn test_entity_deserializes_with_defaults() {
        let entity: Entity =
            serde_json::from_str(r#"{"id": "fund-1", "kind": "fund"}"#).unwrap();
        assert_eq!(entity.kind, EntityKind::Fund);
        assert!(entity.child_ids.is_empty());
        assert!(entity.parent_id.is_none());
        assert!(entity.esg_scores.is_none());
    }
}
