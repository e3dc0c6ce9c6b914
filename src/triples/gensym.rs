//! Gensym resolution.
//!
//! Every entry of a template scope carries a symbolic name (its gensym). For
//! each row and scope, the resolver maps those names to concrete identifiers:
//!
//! - **Binding-sourced**: a bound column with the gensym's name supplies the
//!   identifier directly, in every mode.
//! - **Per call** (`DeterministicIds::None`): a random UUID, or, when the
//!   scope sets `HASHED_IDS`, a hash of (sub-iteration, gensym, file, row).
//! - **Deterministic** (`File` / `Global`): a hash of the entry's dependency
//!   vector, i.e. the gensym name followed by the JSON value of every data
//!   column and the resolved identifier of every linked gensym, in
//!   declaration order. `File` additionally salts the hash with the file name.
//!
//! Deterministic resolution walks the gensym dependency graph in topological
//! order, so an entry may link to gensyms declared after it. Cycles are
//! reported, never silently broken.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::ExpandError;
use crate::datum::Datum;
use crate::row::{ColumnOrigin, RowFrame};
use crate::template::{PropertyTarget, SpecOptions, TemplateEntry, TemplateSpec};
use crate::utils::{canonical_json, content_uuid};

/// Gensym name → resolved identifier for one scope (including the
/// identifiers inherited from enclosing scopes).
pub type GensymMap = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeterministicIds {
    #[default]
    None,
    File,
    Global,
}

impl DeterministicIds {
    pub fn is_deterministic(self) -> bool {
        !matches!(self, DeterministicIds::None)
    }
}

impl FromStr for DeterministicIds {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" | "FALSE" => Ok(DeterministicIds::None),
            "FILE" => Ok(DeterministicIds::File),
            "GLOBAL" => Ok(DeterministicIds::Global),
            other => Err(format!(
                "invalid deterministic id mode '{}' (expected NONE, FILE or GLOBAL)",
                other
            )),
        }
    }
}

impl fmt::Display for DeterministicIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeterministicIds::None => "NONE",
            DeterministicIds::File => "FILE",
            DeterministicIds::Global => "GLOBAL",
        };
        f.write_str(name)
    }
}

/// Where the row being resolved comes from.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'c> {
    pub file_name: &'c str,
    pub row_index: usize,
    /// Element index when resolving inside a subtemplate iteration
    pub sub_iteration: Option<usize>,
}

#[derive(Debug, Clone)]
enum VectorItem<'s> {
    Value(Value),
    Link(&'s str),
}

#[derive(Debug, Clone, Copy)]
pub struct GensymResolver {
    mode: DeterministicIds,
}

impl GensymResolver {
    pub fn new(mode: DeterministicIds) -> Self {
        GensymResolver { mode }
    }

    pub fn mode(&self) -> DeterministicIds {
        self.mode
    }

    /// Resolve every gensym declared by `spec` for the current row. The
    /// returned map contains `inherited` plus the newly resolved names;
    /// inherited names are never re-resolved.
    pub fn resolve(
        &self,
        spec: &TemplateSpec,
        frame: &RowFrame<'_>,
        ctx: &ResolutionContext<'_>,
        inherited: &GensymMap,
    ) -> Result<GensymMap, ExpandError> {
        if self.mode.is_deterministic() {
            self.resolve_deterministic(spec, frame, ctx, inherited)
        } else {
            let mut resolved = inherited.clone();
            for gensym in spec.declared_gensyms() {
                if resolved.contains_key(gensym) {
                    continue;
                }
                let id = self.mint(gensym, &spec.options, frame, ctx);
                resolved.insert(gensym.to_string(), id);
            }
            Ok(resolved)
        }
    }

    /// Per-call identifier for a single gensym.
    pub fn mint(
        &self,
        gensym: &str,
        options: &SpecOptions,
        frame: &RowFrame<'_>,
        ctx: &ResolutionContext<'_>,
    ) -> String {
        if let Some(id) = bound_identifier(gensym, frame) {
            return id;
        }
        if options.hashed_ids {
            let sub_iteration = ctx.sub_iteration.map(|i| i.to_string()).unwrap_or_default();
            content_uuid(format!(
                "{}{}{}{}",
                sub_iteration, gensym, ctx.file_name, ctx.row_index
            ))
        } else {
            Uuid::new_v4().to_string()
        }
    }

    fn resolve_deterministic(
        &self,
        spec: &TemplateSpec,
        frame: &RowFrame<'_>,
        ctx: &ResolutionContext<'_>,
        inherited: &GensymMap,
    ) -> Result<GensymMap, ExpandError> {
        let mut resolved = inherited.clone();

        // First declaration of each gensym defines it
        let mut pending: Vec<&TemplateEntry> = Vec::new();
        for entry in &spec.entries {
            let name = entry.gensym.as_str();
            if resolved.contains_key(name) || pending.iter().any(|e| e.gensym == name) {
                continue;
            }
            match bound_identifier(name, frame) {
                Some(id) => {
                    resolved.insert(name.to_string(), id);
                }
                None => pending.push(entry),
            }
        }

        let vectors: Vec<Vec<VectorItem<'_>>> = pending
            .iter()
            .map(|entry| dependency_vector(entry, frame))
            .collect();

        // Kahn's algorithm over the links that point at pending gensyms
        let position: HashMap<&str, usize> = pending
            .iter()
            .enumerate()
            .map(|(i, e)| (e.gensym.as_str(), i))
            .collect();
        let mut indegree = vec![0usize; pending.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); pending.len()];

        for (i, vector) in vectors.iter().enumerate() {
            for item in vector {
                let VectorItem::Link(target) = item else {
                    continue;
                };
                if let Some(&j) = position.get(target) {
                    indegree[i] += 1;
                    dependents[j].push(i);
                } else if !resolved.contains_key(*target) {
                    return Err(ExpandError::UnknownGensym {
                        gensym: target.to_string(),
                        referenced_by: pending[i].gensym.clone(),
                    });
                }
            }
        }

        let mut ready: VecDeque<usize> = (0..pending.len()).filter(|&i| indegree[i] == 0).collect();
        let mut done = 0;
        while let Some(i) = ready.pop_front() {
            let id = self.hash_vector(&vectors[i], &resolved, ctx);
            log::trace!("Resolved gensym {} -> {}", pending[i].gensym, id);
            resolved.insert(pending[i].gensym.clone(), id);
            done += 1;

            for &d in &dependents[i] {
                indegree[d] -= 1;
                if indegree[d] == 0 {
                    ready.push_back(d);
                }
            }
        }

        if done < pending.len() {
            let members = pending
                .iter()
                .enumerate()
                .filter(|(i, _)| indegree[*i] > 0)
                .map(|(_, e)| e.gensym.clone())
                .collect();
            return Err(ExpandError::GensymCycle { members });
        }

        Ok(resolved)
    }

    fn hash_vector(
        &self,
        vector: &[VectorItem<'_>],
        resolved: &GensymMap,
        ctx: &ResolutionContext<'_>,
    ) -> String {
        let items: Vec<Value> = vector
            .iter()
            .map(|item| match item {
                VectorItem::Value(v) => v.clone(),
                VectorItem::Link(target) => resolved
                    .get(*target)
                    .map(|id| Value::String(id.clone()))
                    .unwrap_or(Value::Null),
            })
            .collect();

        let mut content = canonical_json(&Value::Array(items));
        if self.mode == DeterministicIds::File {
            content.push_str(ctx.file_name);
        }
        content_uuid(content)
    }
}

/// Identifier supplied by a bound column named after the gensym.
fn bound_identifier(gensym: &str, frame: &RowFrame<'_>) -> Option<String> {
    if frame.origin(gensym) != Some(ColumnOrigin::Binding) {
        return None;
    }
    frame
        .get(gensym)
        .filter(|value| !value.is_empty())
        .map(Datum::to_plain_string)
}

/// The gensym name, then each data column's JSON value (empty string when
/// missing) and each linked gensym, in declaration order. Subtemplate links
/// and the type declaration do not contribute.
fn dependency_vector<'s>(entry: &'s TemplateEntry, frame: &RowFrame<'_>) -> Vec<VectorItem<'s>> {
    let mut vector = vec![VectorItem::Value(Value::String(entry.gensym.clone()))];
    for rule in &entry.properties {
        match &rule.target {
            PropertyTarget::Column(column) => {
                let value = match frame.get(column) {
                    None | Some(Datum::Null) => Value::String(String::new()),
                    Some(datum) => datum.to_json(),
                };
                vector.push(VectorItem::Value(value));
            }
            PropertyTarget::Gensym(target) => vector.push(VectorItem::Link(target.as_str())),
            PropertyTarget::TypeDeclaration | PropertyTarget::Subtemplate { .. } => {}
        }
    }
    vector
}
