//! Template directory loader (§6): the collaborator that turns a group
//! directory into the `(name, source)` pairs plus markers that
//! `driver::build_group` needs, following the `*.tpl` / per-directory
//! `.cfg` layout.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{self};
use crate::dict::ParamDict;
use crate::error::MistError;
use crate::template::parser::validate_name;

const DEFAULT_BEGIN: &str = "<$";
const DEFAULT_END: &str = "$>";
const T2C_SUFFIX: &str = "-t2c";
const PATH_TEMPLATE_NAME: &str = "file_path";

/// Everything needed to build the content group and the path group for one
/// template directory.
pub struct DiscoveredGroup {
    /// Name of the content group's main template (the directory's stem).
    pub main_name: String,
    /// `(name, source)` pairs for every `*.tpl` file in the directory.
    pub templates: Vec<(String, String)>,
    pub begin_marker: String,
    pub end_marker: String,
    /// Source of the single template in the path group.
    pub file_path_template: String,
}

fn io_err(source: std::io::Error, path: &Path) -> MistError {
    MistError::Io {
        source,
        path: path.to_path_buf(),
    }
}

fn single_value<'a>(
    dict: &'a ParamDict,
    name: &str,
    config_path: &Path,
) -> Result<Option<&'a str>, MistError> {
    let mut it = dict.values_of(name);
    match (it.next(), it.next()) {
        (None, _) => Ok(None),
        (Some(v), None) => Ok(Some(v)),
        (Some(_), Some(_)) => Err(MistError::DuplicateParam {
            name: format!("{name} ({})", config_path.display()),
            line: 0,
        }),
    }
}

fn config_file_name(dir_stem: &str) -> String {
    let stripped = dir_stem.strip_suffix(T2C_SUFFIX).unwrap_or(dir_stem);
    format!("{stripped}.cfg")
}

/// Load a template-group directory, reading its per-directory `.cfg` file
/// and every `*.tpl` file in it.
pub fn load_group_dir(dir: &Path) -> Result<DiscoveredGroup, MistError> {
    let dir_stem = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    validate_name(&dir_stem, 0)?;

    let config_path = dir.join(config_file_name(&dir_stem));
    let config_src = fs::read_to_string(&config_path).map_err(|e| io_err(e, &config_path))?;
    let dict = config::parse_config(&config_src)?;

    let file_path_template = single_value(&dict, "FILE_PATH_TEMPLATE", &config_path)?
        .ok_or_else(|| MistError::MissingParam {
            name: "FILE_PATH_TEMPLATE".to_string(),
        })?
        .to_string();

    let begin_marker = single_value(&dict, "PH_BEGIN_MARKER", &config_path)?
        .unwrap_or(DEFAULT_BEGIN)
        .to_string();
    let end_marker = single_value(&dict, "PH_END_MARKER", &config_path)?
        .unwrap_or(DEFAULT_END)
        .to_string();

    let mut templates = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| io_err(e, dir))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(e, dir))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("tpl") {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        validate_name(&stem, 0)?;
        let src = fs::read_to_string(&path).map_err(|e| io_err(e, &path))?;
        templates.push((stem, src));
    }
    templates.sort_by(|a, b| a.0.cmp(&b.0));

    if templates.is_empty() {
        return Err(MistError::NoTemplateFiles {
            dir: dir.to_path_buf(),
        });
    }

    Ok(DiscoveredGroup {
        main_name: dir_stem,
        templates,
        begin_marker,
        end_marker,
        file_path_template,
    })
}

/// Name of the synthetic single-template path group, shared with the CLI.
pub fn path_template_name() -> &'static str {
    PATH_TEMPLATE_NAME
}

pub fn config_path_for(dir: &Path) -> PathBuf {
    let dir_stem = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    dir.join(config_file_name(dir_stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn strips_t2c_suffix_for_config_file_name() {
        assert_eq!(config_file_name("csharp-t2c"), "csharp.cfg");
        assert_eq!(config_file_name("csharp"), "csharp.cfg");
    }

    #[test]
    fn loads_a_group_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let group_dir = tmp.path().join("csharp-t2c");
        fs::create_dir(&group_dir).unwrap();
        fs::write(
            group_dir.join("csharp.cfg"),
            "FILE_PATH_TEMPLATE = out/<$NAME$>.cs\n",
        )
        .unwrap();
        fs::write(group_dir.join("main.tpl"), "class <$NAME$> {}").unwrap();

        let discovered = load_group_dir(&group_dir).unwrap();
        assert_eq!(discovered.main_name, "csharp-t2c");
        assert_eq!(discovered.begin_marker, "<$");
        assert_eq!(discovered.end_marker, "$>");
        assert_eq!(discovered.templates.len(), 1);
        assert_eq!(discovered.templates[0].0, "main");
    }

    #[test]
    fn missing_config_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let group_dir = tmp.path().join("csharp");
        fs::create_dir(&group_dir).unwrap();
        let err = load_group_dir(&group_dir).unwrap_err();
        assert!(matches!(err, MistError::Io { .. }));
    }

    #[test]
    fn no_template_files_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let group_dir = tmp.path().join("csharp");
        fs::create_dir(&group_dir).unwrap();
        fs::write(
            group_dir.join("csharp.cfg"),
            "FILE_PATH_TEMPLATE = out.cs\n",
        )
        .unwrap();
        let err = load_group_dir(&group_dir).unwrap_err();
        assert!(matches!(err, MistError::NoTemplateFiles { .. }));
    }
}
