//! Text and structured rendering of a comparison

use std::io::{self, Write};

use rustc_hash::FxHashSet;
use serde_json::{Map, Value, json};

use crate::compare::ComparisonResult;
use crate::diff::FileDelta;
use crate::inventory::PackageId;
use crate::packages::PackageDelta;
use crate::target::Side;

/// Narrowest package column.
pub const MIN_COLUMN: usize = 30;
const INDENT: &str = "     ";

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Also list packages present on both sides.
    pub verbose: bool,
}

/// Build the structured report: one map per side keyed by display name, then `"Both"`.
///
/// Categories that were not compared leave no keys behind.
pub fn to_value(result: &ComparisonResult) -> Value {
    let mut root = Map::new();
    for side in [Side::First, Side::Second] {
        root.insert(
            result.name(side).to_string(),
            Value::Object(side_map(result, side)),
        );
    }

    let mut both = Map::new();
    if let Some(files) = &result.files {
        both.insert("files_differ".to_string(), json!(files.common_differing));
    }
    let unattributed: Vec<String> = result
        .failures
        .iter()
        .filter(|e| e.side().is_none())
        .map(ToString::to_string)
        .collect();
    if !unattributed.is_empty() {
        both.insert("errors".to_string(), json!(unattributed));
    }
    root.insert("Both".to_string(), Value::Object(both));
    Value::Object(root)
}

fn side_map(result: &ComparisonResult, side: Side) -> Map<String, Value> {
    let prefix = side.key_prefix();
    let mut map = Map::new();
    if let Some(packages) = &result.packages {
        let release = match side {
            Side::First => &packages.left_release,
            Side::Second => &packages.right_release,
        };
        map.insert(format!("{prefix}_release"), json!(release));
    }
    if let Some(files) = &result.files {
        map.insert(format!("{prefix}_only"), json!(files.only(side)));
    }
    if let Some(packages) = &result.packages {
        // Listed only when the inventories actually differ.
        let listed = match (packages.has_difference, side) {
            (false, _) => Vec::new(),
            (true, Side::First) => packages.left_packages(),
            (true, Side::Second) => packages.right_packages(),
        };
        map.insert(format!("{prefix}_rpm"), json!(listed));
    }

    let mut errors: Vec<String> = result
        .files
        .iter()
        .flat_map(|files| files.errors_for(side))
        .map(ToString::to_string)
        .collect();
    errors.extend(
        result
            .failures
            .iter()
            .filter(|e| e.side() == Some(side))
            .map(ToString::to_string),
    );
    if !errors.is_empty() {
        map.insert(format!("{prefix}_errors"), json!(errors));
    }
    map
}

/// Write the structured report as pretty-printed JSON.
pub fn write_json<W: Write>(result: &ComparisonResult, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, &to_value(result))?;
    writeln!(out)
}

/// Write the human readable report.
pub fn write_text<W: Write>(
    result: &ComparisonResult,
    options: &RenderOptions,
    out: &mut W,
) -> io::Result<()> {
    if let Some(files) = &result.files {
        write_files(result, files, out)?;
    }
    if let Some(packages) = &result.packages {
        write_packages(result, packages, options, out)?;
    }
    for failure in &result.failures {
        writeln!(out, "\n{failure}")?;
    }
    Ok(())
}

fn write_files<W: Write>(result: &ComparisonResult, files: &FileDelta, out: &mut W) -> io::Result<()> {
    let (first, second) = (result.name(Side::First), result.name(Side::Second));
    if files.is_empty() {
        writeln!(out, "\nThere are no file differences between {first} and {second}")?;
    }
    for side in [Side::First, Side::Second] {
        let only = files.only(side);
        if !only.is_empty() {
            writeln!(out, "\nFiles only in {}:", result.name(side))?;
            write_paths(only, out)?;
        }
    }
    if !files.common_differing.is_empty() {
        writeln!(out, "\nCommon files that are different:")?;
        write_paths(&files.common_differing, out)?;
    }
    for err in &files.errors {
        writeln!(
            out,
            "\nUnable to read {} in {}: {}",
            err.path,
            result.name(err.side),
            err.message
        )?;
    }
    Ok(())
}

fn write_paths<W: Write>(paths: &[String], out: &mut W) -> io::Result<()> {
    for path in paths {
        writeln!(out, "{INDENT}{path}")?;
    }
    Ok(())
}

/// Width of each package column: the longest identifier, but never below [`MIN_COLUMN`].
pub fn column_width(packages: &PackageDelta) -> usize {
    packages
        .left_only
        .iter()
        .chain(&packages.right_only)
        .chain(&packages.common)
        .map(PackageId::len)
        .max()
        .unwrap_or(0)
        .max(MIN_COLUMN)
}

/// Split a release label into chunks of at most `step` characters, line by line.
pub fn wrap_release(label: &str, step: usize) -> Vec<String> {
    let step = step.max(1);
    label
        .trim()
        .lines()
        .flat_map(|line| {
            let chars: Vec<char> = line.trim_end().chars().collect();
            chars
                .chunks(step)
                .map(|chunk| chunk.iter().collect::<String>())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn write_row<W: Write>(out: &mut W, width: usize, left: &str, right: &str) -> io::Result<()> {
    writeln!(out, "{left:width$} | {right:width$}")
}

fn write_packages<W: Write>(
    result: &ComparisonResult,
    packages: &PackageDelta,
    options: &RenderOptions,
    out: &mut W,
) -> io::Result<()> {
    let (first, second) = (result.name(Side::First), result.name(Side::Second));
    if !packages.has_difference {
        if packages.names_only {
            writeln!(
                out,
                "\n{first} and {second} have the same RPMs.  Versions may differ.  \
                 Remove --names-only to see if there are version differences."
            )?;
        } else {
            writeln!(out, "\n{first} and {second} have no different RPMs")?;
        }
        return Ok(());
    }

    let width = column_width(packages);
    let rule = "-".repeat(width);
    writeln!(out)?;
    write_row(out, width, first, second)?;
    write_row(out, width, &rule, &rule)?;
    let left = wrap_release(&packages.left_release, width - 2);
    let right = wrap_release(&packages.right_release, width - 2);
    for n in 0..left.len().max(right.len()) {
        let l = left.get(n).map(String::as_str).unwrap_or("");
        let r = right.get(n).map(String::as_str).unwrap_or("");
        write_row(out, width, l, r)?;
    }
    write_row(out, width, &rule, &rule)?;

    let left_only: FxHashSet<&PackageId> = packages.left_only.iter().collect();
    let right_only: FxHashSet<&PackageId> = packages.right_only.iter().collect();
    for id in packages.all_packages() {
        let in_left = left_only.contains(&id);
        let in_right = right_only.contains(&id);
        match (in_left, in_right) {
            (true, _) => write_row(out, width, id.as_str(), "")?,
            (_, true) => write_row(out, width, "", id.as_str())?,
            _ if options.verbose => write_row(out, width, id.as_str(), id.as_str())?,
            _ => {}
        }
    }
    Ok(())
}
