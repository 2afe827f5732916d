use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use regex::Regex;

use crate::config::CsvDirConfig;
use crate::storage::{DataFile, FileBasedStorage, SourceFile, SyncToken, TextFormat};
use crate::{DatabaseError, Result};

impl SyncToken {
    pub fn from_system_time(time: SystemTime) -> Self {
        let millis = time
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        SyncToken(millis)
    }
}

impl FileBasedStorage {
    pub fn new(base_path: PathBuf, mask: Regex) -> Self {
        FileBasedStorage { base_path, mask }
    }

    pub fn from_config(config: &CsvDirConfig) -> Result<Self> {
        Ok(FileBasedStorage::new(
            config.source_path.clone(),
            config.file_mask_regex()?,
        ))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Every source file, sorted by file name.
    pub fn all_files(&self) -> Result<Vec<SourceFile>> {
        let mut files = vec![];
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if self.mask.is_match(name) {
                files.push(SourceFile {
                    path: entry.path(),
                    modified: SyncToken::from_system_time(metadata.modified()?),
                });
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Source files modified strictly after `token`.
    pub fn modified_since(&self, token: SyncToken) -> Result<Vec<SourceFile>> {
        Ok(self
            .all_files()?
            .into_iter()
            .filter(|file| file.modified > token)
            .collect())
    }

    pub fn latest_token(&self) -> Result<SyncToken> {
        Ok(self
            .all_files()?
            .iter()
            .map(|file| file.modified)
            .max()
            .unwrap_or_default())
    }

    pub fn last_modified(&self) -> Result<Option<SourceFile>> {
        Ok(self.all_files()?.into_iter().max_by_key(|file| file.modified))
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.base_path.join(file_name)
    }

    /// Reads and parses a source file. `width` is the expected column count, see
    /// [`DataFile::parse`].
    pub fn read_file(
        &self,
        path: &Path,
        format: &TextFormat,
        has_header: bool,
        width: Option<usize>,
    ) -> Result<DataFile> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => DatabaseError::MalformedSource {
                path: path.to_path_buf(),
                reason: String::from("not valid UTF-8"),
            },
            _ => DatabaseError::IOError(e),
        })?;

        DataFile::parse(&text, format, has_header, width).map_err(|reason| DatabaseError::MalformedSource {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Replaces the file content through a sibling temporary file.
    pub fn write_file(&self, path: &Path, file: &DataFile, format: &TextFormat) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        {
            let mut writer = BufWriter::new(
                OpenOptions::new()
                    .create(true)
                    .truncate(true)
                    .write(true)
                    .open(&tmp)?,
            );
            writer.write_all(&file.to_bytes(format))?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        Ok(())
    }
}
