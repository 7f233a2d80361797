#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use assert_cmd::assert::Assert;
use serde_json::Value;
use tempfile::TempDir;

pub struct Project {
    pub temp: TempDir,
    pub root: PathBuf,
    pub staging: PathBuf,
}

pub fn prepare_project(prefix: &str, pyproject: &str) -> Project {
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir");
    let root = temp.path().join("proj");
    let staging = temp.path().join("staging");
    fs::create_dir_all(&root).expect("project dir");
    fs::create_dir_all(&staging).expect("staging dir");
    fs::write(root.join("pyproject.toml"), pyproject).expect("write pyproject");
    Project {
        temp,
        root,
        staging,
    }
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

pub fn read_wheel(path: &Path) -> Vec<(String, String)> {
    let mut archive = zip::ZipArchive::new(File::open(path).expect("open wheel")).expect("zip");
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).expect("zip entry");
        let mut body = String::new();
        file.read_to_string(&mut body).expect("utf-8 entry");
        entries.push((file.name().to_string(), body));
    }
    entries
}

pub fn wheel_entry<'a>(entries: &'a [(String, String)], name: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(entry, _)| entry == name)
        .map(|(_, body)| body.as_str())
}

pub fn dir_is_empty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}
