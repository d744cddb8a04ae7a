//! Template Group: the arena that owns every template (named and anonymous)
//! and resolves placeholder names to template ids.
//!
//! Every named template, every conditional branch, and every conditional's
//! synthetic result template lives in the same `Vec<Template>` arena,
//! addressed by a stable `TemplateId`. Branches and result templates are
//! marked `visible: false` so name lookup can never reach them — matching
//! the "owned by the placeholder, not the group" rule in the data model.

use std::collections::HashMap;

use crate::error::MistError;
use crate::template::parser::{self, RawPlaceholder, RawTemplate};

pub type TemplateId = u32;

#[derive(Debug, Clone)]
pub enum Placeholder {
    Plain {
        target: TemplateId,
    },
    Join {
        target: TemplateId,
        sep: String,
    },
    Conditional {
        cond: TemplateId,
        is_concat: bool,
        then_id: TemplateId,
        else_id: TemplateId,
        /// Synthetic template holding the conditional's computed values.
        result_id: TemplateId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A named template parsed from the caller's sources.
    Named,
    /// A synthesized attribute: no chunks, values supplied externally.
    Attribute,
    /// A conditional's then/else branch: not reachable by name.
    Branch,
    /// A conditional's synthetic result holder: not reachable by name.
    Result,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: Option<String>,
    pub chunks: Vec<String>,
    pub placeholders: Vec<Placeholder>,
    pub values: Vec<String>,
    pub evaluated: bool,
    pub kind: Kind,
}

impl Template {
    fn attribute() -> Self {
        Template {
            name: None,
            chunks: Vec::new(),
            placeholders: Vec::new(),
            values: Vec::new(),
            evaluated: false,
            kind: Kind::Attribute,
        }
    }
}

pub struct Group {
    pub templates: Vec<Template>,
    pub name_to_id: HashMap<String, TemplateId>,
    pub main: TemplateId,
    pub begin_marker: String,
    pub end_marker: String,
}

impl Group {
    pub fn get(&self, id: TemplateId) -> &Template {
        &self.templates[id as usize]
    }

    pub fn get_mut(&mut self, id: TemplateId) -> &mut Template {
        &mut self.templates[id as usize]
    }

    /// Reset every template's value sequence and `evaluated` flag, without
    /// reparsing. Idempotent.
    pub fn clear_values(&mut self) {
        for t in &mut self.templates {
            t.values.clear();
            t.evaluated = false;
        }
    }

    /// Append a value to the named attribute template, if it exists.
    /// Silently a no-op for unknown names, per the driver contract.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        if let Some(&id) = self.name_to_id.get(name) {
            self.templates[id as usize].values.push(value.into());
        }
    }
}

/// Build a group from a set of (name, source) pairs.
///
/// Steps follow §4.3: parse every template, collect unresolved references
/// and synthesize attributes for them, then link every placeholder to its
/// target id. Any failure returns an error without handing back a
/// partially built group.
pub fn build_group<'a, I>(
    main_name: &str,
    sources: I,
    begin: &str,
    end: &str,
) -> Result<Group, MistError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut raw: Vec<(String, RawTemplate)> = Vec::new();
    for (name, src) in sources {
        parser::validate_name(name, 0)?;
        let tpl = parser::parse(src, begin, end)?;
        raw.push((name.to_string(), tpl));
    }

    let mut templates = Vec::new();
    let mut name_to_id = HashMap::new();

    for (name, tpl) in &raw {
        let id = templates.len() as TemplateId;
        templates.push(Template {
            name: Some(name.clone()),
            chunks: tpl.chunks.clone(),
            placeholders: Vec::new(),
            values: Vec::new(),
            evaluated: false,
            kind: Kind::Named,
        });
        if name_to_id.insert(name.clone(), id).is_some() {
            return Err(MistError::InvalidName {
                name: format!("duplicate template name '{name}'"),
            });
        }
    }

    // Collect every name referenced by a placeholder or a conditional's
    // condition, across all named templates and nested branches, and
    // synthesize an attribute for any that aren't already a named template.
    let mut referenced = Vec::new();
    for (_, tpl) in &raw {
        collect_references(tpl, &mut referenced);
    }
    for name in referenced {
        if !name_to_id.contains_key(&name) {
            let id = templates.len() as TemplateId;
            templates.push(Template::attribute());
            templates[id as usize].name = Some(name.clone());
            name_to_id.insert(name, id);
        }
    }

    // Link every named template's placeholder tree, allocating arena slots
    // for conditional branches and their result templates as we go.
    for (name, tpl) in &raw {
        let &id = name_to_id.get(name).expect("just inserted");
        let placeholders = link_placeholders(&tpl.placeholders, &name_to_id, &mut templates)?;
        templates[id as usize].placeholders = placeholders;
    }

    let &main = name_to_id
        .get(main_name)
        .ok_or_else(|| MistError::MissingMainTemplate {
            name: main_name.to_string(),
        })?;

    Ok(Group {
        templates,
        name_to_id,
        main,
        begin_marker: begin.to_string(),
        end_marker: end.to_string(),
    })
}

/// Build a group containing a single named template, which is also the main.
pub fn build_single(name: &str, src: &str, begin: &str, end: &str) -> Result<Group, MistError> {
    build_group(name, std::iter::once((name, src)), begin, end)
}

fn collect_references(tpl: &RawTemplate, out: &mut Vec<String>) {
    for ph in &tpl.placeholders {
        match ph {
            RawPlaceholder::Plain { name } | RawPlaceholder::Join { name, .. } => {
                out.push(name.clone());
            }
            RawPlaceholder::Conditional {
                cond_name,
                then_branch,
                else_branch,
                ..
            } => {
                out.push(cond_name.clone());
                collect_references(then_branch, out);
                collect_references(else_branch, out);
            }
        }
    }
}

fn link_placeholders(
    raw: &[RawPlaceholder],
    name_to_id: &HashMap<String, TemplateId>,
    templates: &mut Vec<Template>,
) -> Result<Vec<Placeholder>, MistError> {
    let mut out = Vec::with_capacity(raw.len());
    for ph in raw {
        out.push(link_one(ph, name_to_id, templates)?);
    }
    Ok(out)
}

fn link_one(
    ph: &RawPlaceholder,
    name_to_id: &HashMap<String, TemplateId>,
    templates: &mut Vec<Template>,
) -> Result<Placeholder, MistError> {
    match ph {
        RawPlaceholder::Plain { name } => {
            let target = *name_to_id
                .get(name)
                .ok_or_else(|| MistError::UnresolvedReference { name: name.clone() })?;
            Ok(Placeholder::Plain { target })
        }
        RawPlaceholder::Join { name, sep } => {
            let target = *name_to_id
                .get(name)
                .ok_or_else(|| MistError::UnresolvedReference { name: name.clone() })?;
            Ok(Placeholder::Join {
                target,
                sep: sep.clone(),
            })
        }
        RawPlaceholder::Conditional {
            cond_name,
            is_concat,
            then_branch,
            else_branch,
        } => {
            let cond = *name_to_id.get(cond_name).ok_or_else(|| {
                MistError::UnresolvedReference {
                    name: cond_name.clone(),
                }
            })?;

            let then_id = push_branch(then_branch, name_to_id, templates)?;
            let else_id = push_branch(else_branch, name_to_id, templates)?;

            let result_id = templates.len() as TemplateId;
            templates.push(Template {
                name: None,
                chunks: Vec::new(),
                placeholders: Vec::new(),
                values: Vec::new(),
                evaluated: false,
                kind: Kind::Result,
            });

            Ok(Placeholder::Conditional {
                cond,
                is_concat: *is_concat,
                then_id,
                else_id,
                result_id,
            })
        }
    }
}

/// Allocate an arena slot for a conditional branch, linking its own
/// placeholder tree first (branches can themselves contain placeholders,
/// including nested conditionals).
fn push_branch(
    branch: &RawTemplate,
    name_to_id: &HashMap<String, TemplateId>,
    templates: &mut Vec<Template>,
) -> Result<TemplateId, MistError> {
    let placeholders = link_placeholders(&branch.placeholders, name_to_id, templates)?;
    let id = templates.len() as TemplateId;
    templates.push(Template {
        name: None,
        chunks: branch.chunks.clone(),
        placeholders,
        values: Vec::new(),
        evaluated: false,
        kind: Kind::Branch,
    });
    Ok(id)
}
