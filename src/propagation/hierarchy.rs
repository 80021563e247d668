//! Arena over the Fund → Company → Project forest.
//!
//! Entities are stored once and addressed by id. A tree plan walks one root
//! depth-first, validates every edge and yields a bottom-up processing order
//! in which each child precedes its parent. Invalid edges are recorded and
//! the offending subtree is left out of the plan; its siblings stay in.
//! Entities no root reaches, such as members of an ownership cycle, are
//! reported by [`Hierarchy::unreachable`].

use crate::core::Entity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyIssue {
    pub entity_id: String,
    pub message: String,
}

impl HierarchyIssue {
    fn new(entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreePlan {
    pub root: String,
    /// Every valid node, children before parents
    pub order: Vec<String>,
    /// Valid children of each planned node
    pub children: BTreeMap<String, Vec<String>>,
    pub issues: Vec<HierarchyIssue>,
}

impl TreePlan {
    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    entities: Vec<Entity>,
    index: BTreeMap<String, usize>,
    /// Listing parents of each id, in entity order
    listed_by: BTreeMap<String, Vec<String>>,
    /// Children found through their own `parent_id`
    back_refs: BTreeMap<String, Vec<String>>,
}

impl Hierarchy {
    /// Build the arena. Later duplicates of an id are dropped and reported.
    pub fn new(entities: Vec<Entity>) -> (Self, Vec<HierarchyIssue>) {
        let mut hierarchy = Self::default();
        let mut issues = Vec::new();

        for entity in entities {
            if hierarchy.index.contains_key(&entity.id) {
                issues.push(HierarchyIssue::new(
                    entity.id.clone(),
                    "duplicate entity id; later definition ignored",
                ));
                continue;
            }
            hierarchy
                .index
                .insert(entity.id.clone(), hierarchy.entities.len());
            hierarchy.entities.push(entity);
        }

        for entity in &hierarchy.entities {
            for child in &entity.child_ids {
                hierarchy
                    .listed_by
                    .entry(child.clone())
                    .or_default()
                    .push(entity.id.clone());
            }
            if let Some(parent) = &entity.parent_id {
                hierarchy
                    .back_refs
                    .entry(parent.clone())
                    .or_default()
                    .push(entity.id.clone());
            }
        }

        (hierarchy, issues)
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.index.get(id).map(|&i| &self.entities[i])
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Tree roots plus issues for entities whose declared parent is missing.
    ///
    /// A root has no parent and is not listed as anyone's child: top-level
    /// Funds, standalone Companies and orphan Projects.
    pub fn roots(&self) -> (Vec<String>, Vec<HierarchyIssue>) {
        let mut roots = Vec::new();
        let mut issues = Vec::new();

        for entity in &self.entities {
            match &entity.parent_id {
                Some(parent) if self.get(parent).is_none() => issues.push(HierarchyIssue::new(
                    entity.id.clone(),
                    format!("declares missing parent '{}'", parent),
                )),
                Some(_) => {}
                None if self.listed_by.contains_key(&entity.id) => {}
                None => roots.push(entity.id.clone()),
            }
        }

        (roots, issues)
    }

    /// The entity that owns `id`: its declared parent if that exists,
    /// otherwise the first entity listing it as a child.
    fn owner(&self, id: &str) -> Option<&str> {
        let entity = self.get(id)?;
        match entity.parent_id.as_deref() {
            Some(parent) => self.get(parent).map(|p| p.id.as_str()),
            None => self
                .listed_by
                .get(id)
                .and_then(|listers| listers.first())
                .map(String::as_str),
        }
    }

    /// Topmost ancestor reachable from `id` by following owners.
    ///
    /// Stops at the first repeat, so a cycle yields the last entity reached
    /// before it closes.
    pub fn top_ancestor(&self, id: &str) -> String {
        let mut seen = BTreeSet::from([id.to_string()]);
        let mut current = id;
        while let Some(next) = self.owner(current) {
            if !seen.insert(next.to_string()) {
                break;
            }
            current = next;
        }
        current.to_string()
    }

    /// Issues for entities that appear in no plan.
    ///
    /// Entities below something already in `reported` are skipped; they stay
    /// unscored as part of the rejected subtree.
    pub fn unreachable(
        &self,
        plans: &[TreePlan],
        reported: &BTreeSet<String>,
    ) -> Vec<HierarchyIssue> {
        let planned: BTreeSet<&str> = plans
            .iter()
            .flat_map(|p| p.order.iter().map(String::as_str))
            .collect();

        let mut issues = Vec::new();
        for entity in &self.entities {
            let id = entity.id.as_str();
            if planned.contains(id) || reported.contains(id) {
                continue;
            }

            let mut chain = vec![id];
            let mut message = Some("not reachable from any tree root".to_string());
            while let Some(next) = self.owner(chain[chain.len() - 1]) {
                if reported.contains(next) {
                    message = None;
                    break;
                }
                if next == id {
                    message = Some("cycle in ownership hierarchy".to_string());
                    break;
                }
                if chain.contains(&next) {
                    message = Some(format!("owned through a cycle at '{}'", next));
                    break;
                }
                chain.push(next);
            }

            if let Some(message) = message {
                issues.push(HierarchyIssue::new(id, message));
            }
        }
        issues
    }

    /// `child_ids` followed by children that only declare this parent
    pub fn declared_children(&self, id: &str) -> Vec<String> {
        let mut children: Vec<String> = self
            .get(id)
            .map(|e| e.child_ids.clone())
            .unwrap_or_default();
        if let Some(extra) = self.back_refs.get(id) {
            for child in extra {
                if !children.contains(child) {
                    children.push(child.clone());
                }
            }
        }
        children
    }

    /// Validate and order the subtree under `root_id`
    pub fn plan(&self, root_id: &str) -> TreePlan {
        let mut plan = TreePlan {
            root: root_id.to_string(),
            ..TreePlan::default()
        };
        let mut path = Vec::new();
        self.visit(root_id, None, &mut path, &mut plan);
        plan
    }

    fn visit(
        &self,
        id: &str,
        parent: Option<&Entity>,
        path: &mut Vec<String>,
        plan: &mut TreePlan,
    ) -> bool {
        let Some(entity) = self.get(id) else {
            let owner = parent.map_or(id, |p| p.id.as_str());
            plan.issues.push(HierarchyIssue::new(
                owner,
                format!("references missing entity '{}'", id),
            ));
            return false;
        };

        if path.iter().any(|p| p == id) {
            plan.issues
                .push(HierarchyIssue::new(id, "cycle in ownership hierarchy"));
            return false;
        }

        if let Some(parent) = parent {
            if parent.kind.child_kind() != Some(entity.kind) {
                plan.issues.push(HierarchyIssue::new(
                    id,
                    format!(
                        "{} cannot be owned by {} '{}'",
                        entity.kind, parent.kind, parent.id
                    ),
                ));
                return false;
            }
            match entity.parent_id.as_deref() {
                Some(declared) if declared != parent.id => {
                    plan.issues.push(HierarchyIssue::new(
                        id,
                        format!(
                            "listed under '{}' but declares parent '{}'",
                            parent.id, declared
                        ),
                    ));
                    return false;
                }
                Some(_) => {}
                // Without a declared parent the first listing owns the entity
                None => {
                    if let Some(first) = self.owner(id).filter(|&first| first != parent.id) {
                        plan.issues.push(HierarchyIssue::new(
                            id,
                            format!(
                                "listed under '{}' but already owned by '{}'",
                                parent.id, first
                            ),
                        ));
                        return false;
                    }
                }
            }
        }

        path.push(id.to_string());
        let mut valid = Vec::new();
        for child in self.declared_children(id) {
            if self.visit(&child, Some(entity), path, plan) {
                valid.push(child);
            }
        }
        path.pop();

        plan.children.insert(id.to_string(), valid);
        plan.order.push(id.to_string());
        true
    }
}
