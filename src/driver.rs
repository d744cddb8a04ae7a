//! Driver API (§4.5): the stable, small surface external callers use —
//! construct a group, feed it attribute values, evaluate it, reset it, and
//! two convenience operations for the file-generator use case.
//!
//! Mirrors the teacher's separation between a pure in-memory engine and a
//! thin filesystem-facing layer: [`FileWriter`] is the "External Writer"
//! interface the spec calls out, so the engine itself never touches disk.

use std::path::Path;

use crate::error::MistError;
use crate::template::{self, Group};

/// Build a group from named template sources, designating `main_name` as
/// the template whose values `evaluate` returns.
pub fn build_group<'a, I>(
    main_name: &str,
    sources: I,
    begin: &str,
    end: &str,
) -> Result<Group, MistError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    template::build_group(main_name, sources, begin, end)
}

/// Convenience: a group containing a single template, which is also main.
pub fn build_single(name: &str, src: &str, begin: &str, end: &str) -> Result<Group, MistError> {
    template::build_single(name, src, begin, end)
}

/// Append `value` to the named attribute's value sequence. A no-op if
/// `name` doesn't resolve to any template in the group — shared parameter
/// dictionaries can be reused across groups with differing attribute sets.
pub fn set_attribute(group: &mut Group, name: &str, value: impl Into<String>) {
    group.set_attribute(name, value);
}

/// Apply a multimap of name -> value pairs, order-preserving for repeated
/// keys. Accepts anything iterable, not tied to [`crate::dict::ParamDict`].
pub fn set_attributes<'a, I>(group: &mut Group, dict: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (name, value) in dict {
        group.set_attribute(name, value);
    }
}

/// Evaluate the group's main template and return its value sequence.
pub fn evaluate(group: &mut Group) -> Vec<String> {
    group.evaluate_main().to_vec()
}

/// Reset every template's values, without reparsing. Idempotent.
pub fn clear_values(group: &mut Group) {
    group.clear_values();
}

/// Release the group. Rust's ownership already does this on drop; this
/// exists only to round out the driver surface named by the spec.
pub fn destroy(group: Group) {
    drop(group);
}

/// Evaluates a path group and requires exactly one value — a file path
/// group that evaluates to more than one value is a semantic error.
pub fn generate_path<'a, I>(group: &mut Group, dict: I) -> Result<String, MistError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    group.clear_values();
    set_attributes(group, dict);
    let values = evaluate(group);
    match values.len() {
        1 => Ok(values.into_iter().next().unwrap()),
        count => Err(MistError::MainMultiValued { count }),
    }
}

/// Target for the `(path, content)` pair produced by [`generate_file`]. Kept
/// as a trait so the engine stays testable without touching a real
/// filesystem.
pub trait FileWriter {
    fn write(&self, path: &Path, content: &str) -> std::io::Result<()>;
}

/// Default writer: creates parent directories and writes the file.
pub struct FsWriter;

impl FileWriter for FsWriter {
    fn write(&self, path: &Path, content: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }
}

/// Evaluates a content group (must be single-valued) and writes the result
/// to `path` through `writer`.
pub fn generate_file<'a, I>(
    group: &mut Group,
    path: &Path,
    dict: I,
    writer: &dyn FileWriter,
) -> Result<(), MistError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    group.clear_values();
    set_attributes(group, dict);
    let values = evaluate(group);
    let content = match values.len() {
        1 => &values[0],
        count => return Err(MistError::MainMultiValued { count }),
    };
    writer.write(path, content).map_err(|source| MistError::Io {
        source,
        path: path.to_path_buf(),
    })
}
