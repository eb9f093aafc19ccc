//! The seven thin command dispatchers: init, update-cache, write-tree,
//! read-tree, cat-file, show-diff, commit-tree.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use dircache_core::layout::Layout;
use dircache_core::Digest;
use index_store::{Index, verify_path};
use object_store::{codec, ObjectStore};

use crate::error::CliError;
use crate::identity;

fn parse_digest(arg: &str) -> Result<Digest, CliError> {
    Digest::from_hex(arg).map_err(|e| CliError::BadHex(arg.to_string(), e))
}

/// `init`: create the repository directory and the object-store fan-out,
/// failing if the repository already exists.
pub fn init(base: &Path) -> Result<(), CliError> {
    let layout = Layout::discover_in(base);
    layout.init()?;
    tracing::info!(repo = %layout.repo_dir.display(), "initialized repository");
    Ok(())
}

/// `update-cache <paths...>`: stage or unstage each path, then rewrite the
/// index atomically. Invalid paths are warned about and skipped, matching
/// `verify_path`'s "Ignoring path %s" behavior rather than aborting.
pub fn update_cache(base: &Path, paths: &[String]) -> Result<(), CliError> {
    let layout = Layout::discover_in(base);
    let store = ObjectStore::new(layout.clone());
    let mut index = Index::load(&layout)?;

    for path in paths {
        let name = path.as_bytes().to_vec();
        if !verify_path(&name) {
            eprintln!("Ignoring path {path}");
            continue;
        }
        match std::fs::File::open(path) {
            Ok(file) => stage_one(&store, &mut index, path, name, file)?,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                index.remove_entry(&name);
            }
            Err(source) => return Err(CliError::Io { path: path.into(), source }),
        }
    }

    index.save(&layout.repo_dir)?;
    Ok(())
}

fn stage_one(
    store: &ObjectStore,
    index: &mut Index,
    path: &str,
    name: Vec<u8>,
    mut file: std::fs::File,
) -> Result<(), CliError> {
    let metadata = file.metadata().map_err(|source| CliError::Io { path: path.into(), source })?;
    let mut bytes = Vec::with_capacity(metadata.len() as usize);
    file.read_to_end(&mut bytes).map_err(|source| CliError::Io { path: path.into(), source })?;
    let digest = codec::encode_blob(store, &bytes)?;
    index.stage_entry(name, &metadata, digest)?;
    Ok(())
}

/// `write-tree`: emit a flat tree object from the current index's entries,
/// in index order (I3), and print its hex digest. Every staged entry's blob
/// must already exist in the object store (`check_valid_sha1`'s check).
pub fn write_tree(base: &Path) -> Result<String, CliError> {
    let layout = Layout::discover_in(base);
    let store = ObjectStore::new(layout.clone());
    let index = Index::load(&layout)?;

    if index.entries().is_empty() {
        return Err(CliError::Io {
            path: layout.repo_dir.join("index"),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "No file-cache to create a tree of"),
        });
    }

    let entries: Vec<codec::TreeEntry> = index
        .entries()
        .iter()
        .map(|e| codec::TreeEntry { mode: e.mode, name: e.name.clone(), digest: e.sha1 })
        .collect();
    for entry in &entries {
        store.read(&entry.digest)?;
    }
    let digest = codec::encode_tree(&store, &entries)?;
    Ok(digest.to_hex())
}

/// `read-tree <hex>`: print each entry of the named tree object as
/// `<mode> <name> (<hex>)`. Errors if the object is not a `tree`.
pub fn read_tree(base: &Path, hex: &str) -> Result<Vec<String>, CliError> {
    let layout = Layout::discover_in(base);
    let store = ObjectStore::new(layout);
    let digest = parse_digest(hex)?;

    let obj = store.read(&digest)?;
    if obj.kind != "tree" {
        return Err(CliError::NotATree(obj.kind));
    }
    let entries = codec::decode_tree(&obj.payload)?;
    Ok(entries.iter().map(codec::TreeEntry::display_line).collect())
}

/// `cat-file <hex>`: extract the object's payload to a fresh temp file and
/// return `(tempfile path, type)`. A partial write is a hard error here,
/// unlike the original's `strcpy(type, "bad")` hack, which reported success
/// anyway and just renamed the printed type.
pub fn cat_file(base: &Path, hex: &str) -> Result<(std::path::PathBuf, String), CliError> {
    let layout = Layout::discover_in(base);
    let store = ObjectStore::new(layout);
    let digest = parse_digest(hex)?;
    let obj = store.read(&digest)?;

    let mut tmp = tempfile_in_cwd(base)?;
    tmp.write_all(&obj.payload).map_err(CliError::Diff)?;
    let (_file, path) = tmp.keep().map_err(|e| CliError::Diff(e.error))?;
    Ok((path, obj.kind))
}

/// `mkstemp("temp_git_file_XXXXXX")`'s relative template creates the temp
/// file in the current directory, not a system temp directory — matched
/// here via `tempfile_in` rather than the default `tempfile()`.
fn tempfile_in_cwd(base: &Path) -> Result<tempfile::NamedTempFile, CliError> {
    tempfile::Builder::new()
        .prefix("temp_dircache_file_")
        .tempfile_in(base)
        .map_err(CliError::Diff)
}

/// `show-diff`: for each staged entry, stat the working copy, report the
/// change mask, and — when changed — pipe the staged blob to
/// `diff -u - <name>` against the working-tree file.
pub fn show_diff(base: &Path) -> Result<(), CliError> {
    let layout = Layout::discover_in(base);
    let store = ObjectStore::new(layout.clone());
    let index = Index::load(&layout)?;

    for entry in index.entries() {
        let name = String::from_utf8_lossy(&entry.name).into_owned();
        let metadata = match std::fs::metadata(&name) {
            Ok(m) => m,
            Err(e) => {
                println!("{name}: {e}");
                continue;
            }
        };
        let mask = index_store::match_stat(entry, &metadata);
        if mask.is_empty() {
            println!("{name}: ok");
            continue;
        }
        println!("{name}:  {}", entry.sha1);
        let obj = store.read(&entry.sha1)?;
        run_diff(&name, &obj.payload)?;
    }
    Ok(())
}

fn run_diff(name: &str, staged_contents: &[u8]) -> Result<(), CliError> {
    let mut child = Command::new("diff")
        .arg("-u")
        .arg("-")
        .arg(name)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(CliError::Diff)?;
    if let Some(stdin) = child.stdin.take() {
        let mut stdin = stdin;
        let _ = stdin.write_all(staged_contents);
    }
    child.wait().map_err(CliError::Diff)?;
    Ok(())
}

/// `commit-tree <tree-hex> [-p <parent-hex>]*`: read the commit message
/// from stdin, resolve committer identity, emit a commit object, and return
/// its hex digest.
pub fn commit_tree(base: &Path, tree_hex: &str, parent_hexes: &[String]) -> Result<String, CliError> {
    let layout = Layout::discover_in(base);
    let store = ObjectStore::new(layout);
    let tree = parse_digest(tree_hex)?;
    let parents: Vec<Digest> = parent_hexes.iter().map(|h| parse_digest(h)).collect::<Result<_, _>>()?;

    if parents.is_empty() {
        eprintln!("Committing initial tree {tree_hex}");
    }

    let mut message = Vec::new();
    std::io::stdin().read_to_end(&mut message).map_err(|source| CliError::Io { path: "<stdin>".into(), source })?;

    let id = identity::resolve();
    let digest = codec::encode_commit(
        &store,
        &codec::CommitInfo {
            tree,
            parents: &parents,
            author_name: &id.author_name,
            author_email: &id.author_email,
            author_date: &id.author_date,
            committer_name: &id.committer_name,
            committer_email: &id.committer_email,
            committer_date: &id.committer_date,
            message: &message,
        },
    )?;
    Ok(digest.to_hex())
}
