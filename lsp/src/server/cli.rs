use std::path::Path;

use anyhow::Context;

use spxls_core::project::Project;

use crate::analyzer::{compile, default_analyzers};

/// `spxls --analyze <workspace-dir>`: one-shot compile of a directory
/// snapshot with diagnostics printed as JSON. Returns Ok(None) when the
/// process should continue into server mode.
pub(crate) fn try_cli_analyze() -> anyhow::Result<Option<String>> {
    let args: Vec<String> = std::env::args().collect();
    let Some(i) = args.iter().position(|a| a == "--analyze") else {
        return Ok(None);
    };
    let dir = args
        .get(i + 1)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Usage: spxls --analyze <workspace-dir>"))?;

    let mut files: Vec<(String, String)> = Vec::new();
    collect_files(Path::new(&dir), Path::new(&dir), &mut files)?;
    let proj = Project::new(files);

    let analyzers = default_analyzers();
    let result = compile(&proj, "file:///", &analyzers)
        .with_context(|| format!("failed to analyze workspace {dir}"))?;

    let mut diagnostics: Vec<serde_json::Value> = Vec::new();
    let mut uris: Vec<_> = result.diagnostics.keys().cloned().collect();
    uris.sort();
    for uri in uris {
        for diag in &result.diagnostics[&uri] {
            diagnostics.push(serde_json::json!({
                "uri": uri,
                "range": diag.range,
                "severity": diag.severity,
                "message": diag.message,
            }));
        }
    }
    let output = serde_json::json!({
        "mainSpxFile": result.main_spx_file,
        "resourceRootDir": result.resource_root_dir,
        "hasErrors": result.has_error_severity_diagnostic,
        "diagnostics": diagnostics,
    });
    Ok(Some(serde_json::to_string_pretty(&output)?))
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<(String, String)>) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .expect("entry is below the walk root")
            .to_string_lossy()
            .replace('\\', "/");
        let keep = rel.ends_with(".spx") || rel.ends_with(".json");
        if !keep {
            continue;
        }
        let content = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        files.push((rel, content));
    }
    Ok(())
}
