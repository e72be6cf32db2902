use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{error, info};
use zip::write::FileOptions;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, TimetableError};
use crate::helpers::xml;
use crate::models::document::{Block, Body, XmlElement, XmlNode};

/// The main document part of a WordprocessingML package.
pub const MAIN_PART: &str = "word/document.xml";

/// Upper bound on the buffer reserved up front for one part; the declared size in
/// the zip header is not trusted beyond this.
const MAX_PART_PREALLOC: u64 = 1 << 20;

fn read_capacity(declared: u64) -> usize {
    declared.min(MAX_PART_PREALLOC) as usize
}

#[derive(Debug, Clone)]
struct PackagePart {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
}

/// An opened `.docx` container.
///
/// Every part is kept as raw bytes except the main document, which is held as an
/// element tree so its body can be rebuilt.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    path: PathBuf,
    parts: Vec<PackagePart>,
    document: XmlElement,
}

impl DocxPackage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TimetableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let package = Self::from_reader(path, BufReader::new(file))?;

        info!(
            "Loaded document {} with {} part(s)",
            path.display(),
            package.parts.len()
        );
        Ok(package)
    }

    /// Reads a package from any seekable source; `path` is only used in errors.
    pub fn from_reader<R: Read + Seek>(path: &Path, reader: R) -> Result<Self> {
        let zip_error = |source: ZipError| TimetableError::Zip {
            path: path.to_path_buf(),
            source,
        };

        let mut archive = ZipArchive::new(reader).map_err(zip_error)?;
        let mut parts = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(zip_error)?;
            if entry.is_dir() {
                continue;
            }

            let mut data = Vec::with_capacity(read_capacity(entry.size()));
            entry
                .read_to_end(&mut data)
                .map_err(|source| TimetableError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;

            parts.push(PackagePart {
                name: entry.name().to_string(),
                data,
                compression: entry.compression(),
            });
        }

        let main = parts
            .iter()
            .find(|part| part.name == MAIN_PART)
            .ok_or_else(|| TimetableError::MissingPart {
                path: path.to_path_buf(),
                part: MAIN_PART.to_string(),
            })?;
        let document = xml::parse(MAIN_PART, &main.data)?;

        let package = Self {
            path: path.to_path_buf(),
            parts,
            document,
        };
        package.body_element()?;
        Ok(package)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|part| part.name.as_str())
    }

    /// Raw bytes of a part as read; the main part reflects the template, not edits.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|part| part.name == name)
            .map(|part| part.data.as_slice())
    }

    pub fn document(&self) -> &XmlElement {
        &self.document
    }

    fn body_element(&self) -> Result<&XmlElement> {
        self.document
            .find("body")
            .ok_or_else(|| self.missing_body())
    }

    fn missing_body(&self) -> TimetableError {
        TimetableError::MissingPart {
            path: self.path.clone(),
            part: format!("{MAIN_PART} body"),
        }
    }

    pub fn body(&self) -> Result<Body> {
        Ok(Body::from_element(self.body_element()?))
    }

    /// A copy of this package whose body holds exactly `blocks`.
    ///
    /// Styles, numbering, relationships and media are carried over unchanged, so
    /// references inside cloned content stay valid.
    pub fn with_body(&self, blocks: Vec<Block>) -> Result<Self> {
        let mut document = self.document.clone();
        let body = document
            .children
            .iter_mut()
            .find_map(|child| match child {
                XmlNode::Element(el) if el.local_name() == "body" => Some(el),
                _ => None,
            })
            .ok_or_else(|| self.missing_body())?;

        body.children = blocks
            .into_iter()
            .map(|block| XmlNode::Element(block.element))
            .collect();

        Ok(Self {
            path: self.path.clone(),
            parts: self.parts.clone(),
            document,
        })
    }

    /// Writes the package as a `.docx` into `writer`; errors name `destination`.
    pub fn write_to<W: Write + Seek>(&self, writer: W, destination: &Path) -> Result<W> {
        let zip_error = |source: ZipError| TimetableError::Zip {
            path: destination.to_path_buf(),
            source,
        };
        let write_error = |source: std::io::Error| TimetableError::Write {
            path: destination.to_path_buf(),
            source,
        };

        let main = xml::serialize(MAIN_PART, &self.document)?;
        let mut zip = ZipWriter::new(writer);

        for part in &self.parts {
            let compression = match part.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = FileOptions::default().compression_method(compression);
            zip.start_file(part.name.as_str(), options)
                .map_err(zip_error)?;

            let data = if part.name == MAIN_PART {
                &main
            } else {
                &part.data
            };
            zip.write_all(data).map_err(write_error)?;
        }

        zip.finish().map_err(zip_error)
    }

    /// Writes the package to `path` through a temporary file in the same directory,
    /// so a failed save leaves no partial document behind.
    ///
    /// An existing file at `path` is an `OutputExists` error unless `overwrite` is set.
    pub fn save<P: AsRef<Path>>(&self, path: P, overwrite: bool) -> Result<()> {
        let path = path.as_ref();
        let write_error = |source: std::io::Error| TimetableError::Write {
            path: path.to_path_buf(),
            source,
        };

        if !overwrite && path.exists() {
            return Err(TimetableError::OutputExists {
                path: path.to_path_buf(),
            });
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
        self.write_to(tmp.as_file_mut(), path)?;
        tmp.as_file().sync_all().map_err(write_error)?;

        let persisted = if overwrite {
            tmp.persist(path)
        } else {
            tmp.persist_noclobber(path)
        };

        match persisted {
            Ok(_) => {
                info!("Saved document {}", path.display());
                Ok(())
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                error!("Refusing to replace existing document {}", path.display());
                Err(TimetableError::OutputExists {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => {
                error!("Failed to save document {}: {}", path.display(), e.error);
                Err(write_error(e.error))
            }
        }
    }
}
