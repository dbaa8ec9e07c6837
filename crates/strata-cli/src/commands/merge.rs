//! `strata merge`: print the overlay of several files.

use anyhow::Result;
use tracing::debug;

use super::SourceArgs;

/// Merge the files and render the result as YAML, or as an annotated tree
/// when `tree` is set.
pub(crate) fn run(args: &SourceArgs, tree: bool) -> Result<String> {
    if !tree {
        let config = args.load()?;
        return Ok(config.to_yaml()?);
    }

    let merged = args.tree()?;
    debug!(files = args.files.len(), "rendering merged tree");
    let rendered = merged.borrow().to_string();
    Ok(format!("{rendered}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::sources;

    #[test]
    fn test_merge_prints_yaml() {
        let (_dir, args) = sources(&[
            ("base.yaml", "name: app\nports: [80]\n"),
            ("prod.yaml", "ports: [443]\ndebug: false\n"),
        ]);
        assert_eq!(
            run(&args, false).unwrap(),
            "name: app\nports:\n- 80\n- 443\ndebug: false\n"
        );
    }

    #[test]
    fn test_merge_prints_tree() {
        let (_dir, args) = sources(&[("a.yaml", "a: {x: 1}\n"), ("b.yaml", "a: {y: two}\n")]);
        assert_eq!(run(&args, true).unwrap(), "{a: {x: 1, y: two}}\n");
    }

    #[test]
    fn test_merge_tree_keeps_aliases() {
        let (_dir, args) = sources(&[
            ("a.yaml", "a: &ref {a: 3}\nb: *ref\n"),
            ("b.yaml", "a: {a: 4}\n"),
        ]);
        assert_eq!(run(&args, true).unwrap(), "{a: &ref {a: 4}, b: *ref}\n");
        assert_eq!(run(&args, false).unwrap(), "a:\n  a: 4\nb:\n  a: 4\n");
    }

    #[test]
    fn test_merge_reports_conflict() {
        let (_dir, args) = sources(&[("a.yaml", "a: {x: 1}\n"), ("b.yaml", "a: [1]\n")]);
        let err = run(&args, false).unwrap_err();
        assert!(format!("{err:#}").contains("kind mismatch"));
    }

    #[test]
    fn test_tree_rejects_blank_file() {
        let (_dir, args) = sources(&[("a.yaml", "a: 1\n"), ("b.yaml", "# nothing\n")]);
        let err = run(&args, true).unwrap_err();
        assert!(format!("{err:#}").contains("is empty"));
    }
}
