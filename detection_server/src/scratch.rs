use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use uuid::Uuid;

/// Root directory under which per-job scratch directories are allocated.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn allocate(&self) -> io::Result<ScratchDir> {
        let job_id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", job_id))
            .tempdir_in(&self.root)?;
        Ok(ScratchDir { job_id, dir })
    }
}

/// A job-local directory, removed with everything in it when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    job_id: Uuid,
    dir: TempDir,
}

impl ScratchDir {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes the source image as `<job-id>.<ext>`, keeping the upload's
    /// extension when it is a plain alphanumeric one.
    pub fn write_input(&self, original_name: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self
            .dir
            .path()
            .join(format!("{}.{}", self.job_id, input_extension(original_name)));
        fs::write(&path, data)?;
        Ok(path)
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join(format!("{}_annotated.jpg", self.job_id))
    }

    /// Removes the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

fn input_extension(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string())
}
