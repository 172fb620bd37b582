use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecordsIntoIter};

use crate::error::MgsError;

/// Delimited text file read as rows of fields.
///
/// `skip` leading lines are discarded first, then comment lines and rows with
/// fewer than `min_fields` fields (two unless set). Every call to
/// [`TabularFile::rows`] reopens the file.
#[derive(Debug, Clone)]
pub struct TabularFile {
    path: PathBuf,
    skip: usize,
    separator: u8,
    comment: Option<u8>,
    min_fields: usize,
}

impl TabularFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            skip: 0,
            separator: b'\t',
            comment: Some(b'#'),
            min_fields: 2,
        }
    }

    pub fn skip(mut self, lines: usize) -> Self {
        self.skip = lines;
        self
    }

    pub fn separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn comment(mut self, comment: Option<u8>) -> Self {
        self.comment = comment;
        self
    }

    pub fn min_fields(mut self, fields: usize) -> Self {
        self.min_fields = fields;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> Result<Rows, MgsError> {
        let file = File::open(&self.path).map_err(|err| {
            MgsError::Filesystem(format!("open {}: {err}", self.path.display()))
        })?;
        let mut reader = BufReader::new(file);
        let mut discarded = String::new();
        for _ in 0..self.skip {
            discarded.clear();
            let read = reader.read_line(&mut discarded).map_err(|err| {
                MgsError::Filesystem(format!("read {}: {err}", self.path.display()))
            })?;
            if read == 0 {
                break;
            }
        }

        let records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .delimiter(self.separator)
            .comment(self.comment)
            .from_reader(Box::new(reader) as Box<dyn BufRead>)
            .into_records();

        Ok(Rows {
            records,
            min_fields: self.min_fields,
        })
    }
}

pub struct Rows {
    records: StringRecordsIntoIter<Box<dyn BufRead>>,
    min_fields: usize,
}

impl Iterator for Rows {
    type Item = Result<Vec<String>, MgsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.records.next()? {
                Ok(record) if record.len() < self.min_fields => continue,
                Ok(record) => return Some(Ok(record.iter().map(str::to_string).collect())),
                Err(err) => return Some(Err(MgsError::from(err))),
            }
        }
    }
}
