//! Build-time fingerprinter.
//!
//! Reduces a directory of compiled artifacts to a single Merkle root and
//! writes companion metadata. Determinism contract: no timestamps, salts,
//! or random values influence the root; leaf order is the lexicographic
//! byte order of full path strings; file read order is irrelevant.

mod exclude;
mod metadata;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

pub use exclude::ExclusionPolicy;
pub use metadata::{IntegrityMetadata, PLUGIN_NAME, PluginInfo};

use crate::merkle::{HashAlgorithm, MerkleTree, hash, to_hex};

/// File name of the root output.
pub const MERKLE_ROOT_FILE: &str = "merkle-root.txt";
/// File name of the leaf-count output.
pub const LEAF_COUNT_FILE: &str = "leaf-count.txt";
/// File name of the JSON metadata output.
pub const METADATA_JSON_FILE: &str = "integrity.json";
/// File name of the XML metadata output.
pub const METADATA_XML_FILE: &str = "integrity.xml";

/// Errors from the fingerprinter.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The classes root does not exist or is not a directory.
    #[error("classes directory does not exist: {path}")]
    InputDirectoryMissing {
        /// The missing path.
        path: PathBuf,
    },

    /// A file under the classes root could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFailure {
        /// The unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configured digest family is not supported.
    #[error(transparent)]
    UnsupportedAlgorithm(#[from] crate::merkle::HashError),

    /// No eligible files remained after filtering.
    #[error("no bytecode files found under {path}; ensure compilation completed")]
    NoInputs {
        /// The classes root that was scanned.
        path: PathBuf,
    },

    /// An output file could not be written.
    #[error("failed to write {path}: {source}")]
    OutputWriteFailure {
        /// The output path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A user-supplied exclusion pattern failed to compile.
    #[error("invalid exclude pattern {pattern:?}: {reason}")]
    InvalidExcludePattern {
        /// The offending pattern.
        pattern: String,
        /// Regex compile error text.
        reason: String,
    },
}

/// Inputs to one fingerprinting run.
#[derive(Debug, Clone)]
pub struct FingerprintOptions {
    /// Directory containing compiled `.class` files.
    pub classes_root: PathBuf,
    /// Directory the outputs are written into (created if absent).
    pub output_dir: PathBuf,
    /// Application version recorded in metadata.
    pub version: String,
    /// Build variant recorded in metadata.
    pub variant: String,
    /// Digest family for leaves and nodes.
    pub algorithm: HashAlgorithm,
    /// Optional signing-certificate fingerprint recorded in metadata.
    pub signer_fingerprint: Option<String>,
    /// User exclusion patterns, unioned with the defaults.
    pub extra_excludes: Vec<String>,
}

/// Result of a fingerprinting run.
#[derive(Debug)]
pub struct FingerprintOutcome {
    /// The computed tree.
    pub tree: MerkleTree,
    /// Lowercase hex root, as written to [`MERKLE_ROOT_FILE`].
    pub root_hex: String,
    /// The metadata document written alongside the root.
    pub metadata: IntegrityMetadata,
}

/// Enumerates eligible files under `classes_root` in fingerprint order.
///
/// The returned paths are sorted lexicographically by their full path
/// string; this is the total order leaves are hashed in.
///
/// # Errors
///
/// Returns [`FingerprintError::InputDirectoryMissing`] when the root is
/// absent, or [`FingerprintError::ReadFailure`] when traversal fails.
pub fn collect_class_files(
    classes_root: &Path,
    policy: &ExclusionPolicy,
) -> Result<Vec<PathBuf>, FingerprintError> {
    if !classes_root.is_dir() {
        return Err(FingerprintError::InputDirectoryMissing {
            path: classes_root.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(classes_root) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map_or_else(|| classes_root.to_path_buf(), Path::to_path_buf);
            FingerprintError::ReadFailure {
                path,
                source: e.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(classes_root)
            .unwrap_or_else(|_| entry.path());
        if policy.retains(relative) {
            files.push(entry.path().to_path_buf());
        }
    }

    // Stable, locale-independent byte order over the full path string.
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

/// Hashes each file's contents in order, producing the leaf sequence.
///
/// # Errors
///
/// Returns [`FingerprintError::ReadFailure`] when a file cannot be read.
pub fn hash_leaves(
    classes_root: &Path,
    files: &[PathBuf],
    algorithm: HashAlgorithm,
) -> Result<Vec<Vec<u8>>, FingerprintError> {
    let mut leaves = Vec::with_capacity(files.len());
    for path in files {
        let content = fs::read(path).map_err(|source| FingerprintError::ReadFailure {
            path: path.clone(),
            source,
        })?;
        let leaf = hash(&content, algorithm);
        debug!(
            file = %path.strip_prefix(classes_root).unwrap_or(path).display(),
            leaf = &to_hex(&leaf)[..16],
            "hashed"
        );
        leaves.push(leaf);
    }
    Ok(leaves)
}

/// Runs the full fingerprinting pipeline and writes all outputs.
///
/// Outputs written into `options.output_dir`:
/// - [`MERKLE_ROOT_FILE`]: lowercase hex root plus a single newline
/// - [`LEAF_COUNT_FILE`]: decimal leaf count
/// - [`METADATA_JSON_FILE`] / [`METADATA_XML_FILE`]: the metadata record
///
/// # Errors
///
/// Any [`FingerprintError`] variant; the output directory is created on
/// demand.
pub fn generate(options: &FingerprintOptions) -> Result<FingerprintOutcome, FingerprintError> {
    let policy = ExclusionPolicy::new(&options.extra_excludes)?;
    let files = collect_class_files(&options.classes_root, &policy)?;

    if files.is_empty() {
        return Err(FingerprintError::NoInputs {
            path: options.classes_root.clone(),
        });
    }
    info!(
        variant = %options.variant,
        files = files.len(),
        algorithm = %options.algorithm,
        "computing integrity fingerprint"
    );

    let leaves = hash_leaves(&options.classes_root, &files, options.algorithm)?;
    // The empty case was rejected above, so construction cannot see an
    // empty leaf sequence.
    let tree =
        MerkleTree::new(leaves, options.algorithm).map_err(|_| FingerprintError::NoInputs {
            path: options.classes_root.clone(),
        })?;
    let root_hex = tree.root_hex();

    info!(
        root = %root_hex,
        height = tree.height(),
        leaves = tree.leaf_count(),
        "Merkle root computed"
    );

    let metadata = IntegrityMetadata {
        version: options.version.clone(),
        variant: options.variant.clone(),
        hash_algorithm: options.algorithm.name().to_string(),
        merkle_root: root_hex.clone(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        leaf_count: tree.leaf_count(),
        signer_fingerprint: options.signer_fingerprint.clone(),
        plugin: PluginInfo::default(),
    };

    write_outputs(&options.output_dir, &root_hex, &metadata)?;

    Ok(FingerprintOutcome {
        tree,
        root_hex,
        metadata,
    })
}

fn write_outputs(
    output_dir: &Path,
    root_hex: &str,
    metadata: &IntegrityMetadata,
) -> Result<(), FingerprintError> {
    fs::create_dir_all(output_dir).map_err(|source| FingerprintError::OutputWriteFailure {
        path: output_dir.to_path_buf(),
        source,
    })?;

    write_file(
        &output_dir.join(MERKLE_ROOT_FILE),
        format!("{root_hex}\n").as_bytes(),
    )?;
    write_file(
        &output_dir.join(LEAF_COUNT_FILE),
        format!("{}\n", metadata.leaf_count).as_bytes(),
    )?;

    let json = metadata
        .to_json_pretty()
        .unwrap_or_else(|_| String::from("{}"));
    write_file(&output_dir.join(METADATA_JSON_FILE), json.as_bytes())?;
    write_file(&output_dir.join(METADATA_XML_FILE), metadata.to_xml().as_bytes())?;

    info!(dir = %output_dir.display(), "integrity outputs written");
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), FingerprintError> {
    let mut file = fs::File::create(path).map_err(|source| FingerprintError::OutputWriteFailure {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(contents)
        .map_err(|source| FingerprintError::OutputWriteFailure {
            path: path.to_path_buf(),
            source,
        })
}
