use super::params::{UploadParameter, is_versioned};

/// Upload parameters split by cache class, each group in walk order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Partitioned {
    pub versioned: Vec<UploadParameter>,
    pub unversioned: Vec<UploadParameter>,
}

impl Partitioned {
    pub fn len(&self) -> usize {
        self.versioned.len() + self.unversioned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versioned.is_empty() && self.unversioned.is_empty()
    }
}

/// Split `params` into versioned and unversioned groups for `version`
pub fn partition<I>(params: I, version: Option<&str>) -> Partitioned
where
    I: IntoIterator<Item = UploadParameter>,
{
    let (versioned, unversioned) = params
        .into_iter()
        .partition(|p| version.is_some_and(|v| is_versioned(&p.local_path, v)));

    Partitioned {
        versioned,
        unversioned,
    }
}
