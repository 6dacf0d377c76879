use std::path::PathBuf;

use rgit_hash::ObjectId;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a git repository: {0}")]
    NotGitRepository(PathBuf),

    #[error("no index present")]
    NoIndexPresent,

    #[error("unknown ref: {0}")]
    UnknownRef(String),

    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("commit missing from object store: {0}")]
    MissingCommit(ObjectId),

    #[error("object is not a commit: {0}")]
    NotCommit(ObjectId),

    #[error("object is not a tree: {0}")]
    NotTree(ObjectId),

    #[error("object is not a blob: {0}")]
    NotBlob(ObjectId),

    #[error("object is not a tag: {0}")]
    NotTag(ObjectId),

    #[error("tag chain does not terminate at {0}")]
    TagCycle(ObjectId),

    #[error("not a settable ref name: {0}")]
    InvalidRefName(String),

    #[error("committer not set")]
    MissingCommitter,

    #[error("HEAD changed during commit")]
    HeadChanged,

    #[error(transparent)]
    Ref(#[from] rgit_ref::RefError),

    #[error(transparent)]
    Odb(#[from] rgit_odb::OdbError),

    #[error(transparent)]
    Index(#[from] rgit_index::IndexError),

    #[error(transparent)]
    Config(#[from] rgit_config::ConfigError),

    #[error(transparent)]
    Util(#[from] rgit_utils::UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
