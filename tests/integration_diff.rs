use rootfs_differ::{
    CompareOptions, Comparison, ComparisonTarget, Error, PackageSource, RenderOptions, Side,
    write_json, write_text,
};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tempfile::tempdir;

fn write_file(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = File::create(path).unwrap();
    file.write_all(content).unwrap();
}

/// Package source reading `var/lib/packages` and `etc/release` from the root.
struct ManifestSource;

impl PackageSource for ManifestSource {
    fn is_package_based(&self, root: &Path) -> bool {
        root.join("var/lib/packages").exists()
    }

    fn query(&self, root: &Path) -> io::Result<String> {
        fs::read_to_string(root.join("var/lib/packages"))
    }

    fn release(&self, root: &Path) -> io::Result<String> {
        fs::read_to_string(root.join("etc/release"))
    }
}

fn options(packages: bool, names_only: bool) -> CompareOptions {
    CompareOptions {
        files: true,
        packages,
        names_only,
        shallow: false,
    }
}

#[test]
fn integration_identical_dirs() {
    let dir1 = tempdir().unwrap();
    let dir2 = tempdir().unwrap();
    write_file(&dir1.path().join("a.txt"), b"hello");
    write_file(&dir2.path().join("a.txt"), b"hello");
    let result = Comparison::new(CompareOptions::default())
        .run(
            &ComparisonTarget::new("one", dir1.path()),
            &ComparisonTarget::new("two", dir2.path()),
        )
        .unwrap();
    assert!(result.files.unwrap().is_empty(), "No diffs expected for identical dirs");
}

#[test]
fn integration_full_report() {
    let left = tempdir().unwrap();
    let right = tempdir().unwrap();
    write_file(&left.path().join("etc/release"), b"Fedora release 40 (Forty)\n");
    write_file(&right.path().join("etc/release"), b"Fedora release 41 (Forty One)\n");
    write_file(
        &left.path().join("var/lib/packages"),
        b"bash-0-5.2.26-3.fc40\ncurl-0-8.6.0-1.fc40\ngpg-pubkey-0-a15b79cc-63d04c2c\n",
    );
    write_file(
        &right.path().join("var/lib/packages"),
        b"bash-0-5.2.26-3.fc40\ncurl-0-8.9.1-2.fc41\n",
    );
    write_file(&left.path().join("opt/tool/bin/run"), b"#!/bin/sh\n");
    write_file(&left.path().join("opt/tool/share/doc"), b"docs");
    fs::create_dir_all(left.path().join("srv/empty")).unwrap();
    write_file(&right.path().join("etc/motd"), b"hi");

    let source = ManifestSource;
    let result = Comparison::new(options(true, false))
        .with_source(&source)
        .run(
            &ComparisonTarget::new("f40", left.path()),
            &ComparisonTarget::new("f41", right.path()),
        )
        .unwrap();
    assert!(!result.has_failures());

    let files = result.files.as_ref().unwrap();
    assert_eq!(
        files.left_only,
        vec!["opt/tool/bin/run", "opt/tool/share/doc", "srv/empty"]
    );
    assert_eq!(files.right_only, vec!["etc/motd"]);
    assert_eq!(
        files.common_differing,
        vec!["etc/release", "var/lib/packages"]
    );

    let packages = result.packages.as_ref().unwrap();
    assert_eq!(packages.left_only.len(), 1);
    assert_eq!(packages.left_only[0].as_str(), "curl-0-8.6.0-1.fc40");
    assert_eq!(packages.right_only[0].as_str(), "curl-0-8.9.1-2.fc41");
    assert_eq!(packages.common[0].as_str(), "bash-0-5.2.26-3.fc40");

    let mut text = Vec::new();
    write_text(&result, &RenderOptions::default(), &mut text).unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("\nFiles only in f40:\n     opt/tool/bin/run\n"));
    assert!(text.contains("\nFiles only in f41:\n     etc/motd\n"));
    assert!(text.contains(&format!("{:30} | {:30}\n", "curl-0-8.6.0-1.fc40", "")));
    assert!(!text.contains("gpg-pubkey"));
    assert!(!text.contains("bash-0-5.2.26-3.fc40 "));

    let mut json = Vec::new();
    write_json(&result, &mut json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value["f41"]["second_release"], "Fedora release 41 (Forty One)\n");
    assert_eq!(value["Both"]["files_differ"][0], "etc/release");
    assert_eq!(value["f40"]["first_rpm"].as_array().unwrap().len(), 2);
}

#[test]
fn integration_names_only_hides_version_changes() {
    let left = tempdir().unwrap();
    let right = tempdir().unwrap();
    write_file(&left.path().join("var/lib/packages"), b"bash-0-5.2-1\n");
    write_file(&right.path().join("var/lib/packages"), b"bash-0-5.3-1\n");
    write_file(&left.path().join("etc/release"), b"");
    write_file(&right.path().join("etc/release"), b"");

    let source = ManifestSource;
    let mut opts = options(true, true);
    opts.files = false;
    let result = Comparison::new(opts)
        .with_source(&source)
        .run(
            &ComparisonTarget::new("left", left.path()),
            &ComparisonTarget::new("right", right.path()),
        )
        .unwrap();
    assert!(!result.packages.as_ref().unwrap().has_difference);

    let mut text = Vec::new();
    write_text(&result, &RenderOptions::default(), &mut text).unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("Remove --names-only"));
}

#[test]
fn integration_malformed_inventory_keeps_files() {
    let left = tempdir().unwrap();
    let right = tempdir().unwrap();
    write_file(&left.path().join("var/lib/packages"), b"not a package\n");
    write_file(&right.path().join("var/lib/packages"), b"bash-0-5.2-1\n");
    write_file(&left.path().join("only-left"), b"x");

    let source = ManifestSource;
    let result = Comparison::new(options(true, false))
        .with_source(&source)
        .run(
            &ComparisonTarget::new("left", left.path()),
            &ComparisonTarget::new("right", right.path()),
        )
        .unwrap();
    assert!(result.packages.is_none());
    assert!(matches!(
        result.failures.as_slice(),
        [Error::MalformedInventory { side: Side::First, .. }]
    ));
    assert_eq!(result.files.unwrap().left_only, vec!["only-left"]);
}
