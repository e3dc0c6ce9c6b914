//! File pipeline: CSV tables in, chunked N-Triples files out.
//!
//! Each configured `{file, spec}` job is read row by row. Every `chunk_size`
//! converted rows go to one chunk file `<stem>_<n>.nt` in the output
//! directory. The chunk's file name is also the file component of hashed and
//! file-scoped identifiers, so re-running a job reproduces the same chunks.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::RunConfig;
use crate::datum::Datum;
use crate::row::Header;
use crate::template::{PropertyTypeIndex, TemplateSpec};
use crate::triples::{render_statements, Geocoder, NominatimGeocoder, RowContext, RowExpansion, TemplateExpander};
use crate::vocabulary::Vocabulary;

const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkReport {
    pub path: PathBuf,
    pub rows: usize,
    pub statements: usize,
    pub diagnostics: usize,
    /// Hex SHA-256 of the chunk's contents
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub chunks: Vec<ChunkReport>,
    /// Records the CSV reader could not decode
    pub unreadable_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub files: Vec<FileReport>,
    /// Jobs whose input or template file was missing
    pub skipped_jobs: Vec<String>,
}

impl PipelineReport {
    pub fn total_rows(&self) -> usize {
        self.chunks().map(|c| c.rows).sum()
    }

    pub fn total_statements(&self) -> usize {
        self.chunks().map(|c| c.statements).sum()
    }

    fn chunks(&self) -> impl Iterator<Item = &ChunkReport> {
        self.files.iter().flat_map(|f| f.chunks.iter())
    }
}

pub struct Pipeline<'a> {
    config: &'a RunConfig,
    vocabulary: Vocabulary,
    types: PropertyTypeIndex,
    geocoder: Option<Box<dyn Geocoder>>,
}

impl<'a> Pipeline<'a> {
    /// Prepare a run: load the schema's declared property types and set up
    /// the geocoding client.
    pub fn new(config: &'a RunConfig) -> Result<Self> {
        let vocabulary = Vocabulary::new(config.namespace.as_str());
        let types = match &config.schema {
            Some(source) => PropertyTypeIndex::load(source, &vocabulary),
            None => PropertyTypeIndex::empty(),
        };
        let geocoder = NominatimGeocoder::new(config.geocoder_url.as_str())
            .with_context(|| format!("Failed to create geocoder client for {}", config.geocoder_url))?;

        Ok(Pipeline {
            config,
            vocabulary,
            types,
            geocoder: Some(Box::new(geocoder)),
        })
    }

    /// Replace the geocoding collaborator (`None` disables lookups).
    pub fn with_geocoder(mut self, geocoder: Option<Box<dyn Geocoder>>) -> Self {
        self.geocoder = geocoder;
        self
    }

    pub fn run(&self) -> Result<PipelineReport> {
        let output_dir = Path::new(&self.config.output_dir);
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

        let mut report = PipelineReport::default();
        for job in &self.config.files {
            if !Path::new(&job.file).is_file() {
                log::warn!("Input file {} not found, skipping", job.file);
                report.skipped_jobs.push(job.file.clone());
                continue;
            }
            if !Path::new(&job.spec).is_file() {
                log::warn!("Template {} for {} not found, skipping", job.spec, job.file);
                report.skipped_jobs.push(job.file.clone());
                continue;
            }

            let spec = TemplateSpec::from_file(&job.spec)
                .with_context(|| format!("Failed to load template {}", job.spec))?;
            log::info!("Converting {} with {}", job.file, job.spec);
            let file_report = self
                .convert_file(Path::new(&job.file), &spec, output_dir)
                .with_context(|| format!("Failed to convert {}", job.file))?;
            report.files.push(file_report);
        }

        log::info!(
            "Wrote {} statements for {} rows",
            report.total_statements(),
            report.total_rows()
        );
        Ok(report)
    }

    fn convert_file(&self, source: &Path, spec: &TemplateSpec, output_dir: &Path) -> Result<FileReport> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
            .to_string();

        let mut expander = TemplateExpander::new(&self.types, &self.vocabulary, self.config.deterministic_ids);
        if let Some(geocoder) = &self.geocoder {
            expander = expander.with_geocoder(geocoder.as_ref());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(source)
            .with_context(|| format!("Failed to open {}", source.display()))?;
        let header = Header::new(
            reader
                .headers()
                .with_context(|| format!("Failed to read header of {}", source.display()))?
                .iter()
                .map(|name| clean_cell(name.trim_start_matches(BYTE_ORDER_MARK))),
        );

        let mut report = FileReport {
            source: source.to_path_buf(),
            chunks: Vec::new(),
            unreadable_rows: 0,
        };
        let mut current: Option<ChunkWriter> = None;

        for (row_index, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("{}: skipping unreadable row {}: {}", source.display(), row_index, e);
                    report.unreadable_rows += 1;
                    continue;
                }
            };
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let mut writer = match current.take() {
                Some(writer) => writer,
                None => {
                    let name = format!("{}_{}.nt", stem, report.chunks.len());
                    ChunkWriter::create(output_dir.join(name))?
                }
            };

            let cells: Vec<Datum> = record.iter().map(|cell| Datum::Text(clean_cell(cell))).collect();
            let ctx = RowContext {
                file_name: &writer.file_name,
                row_index,
            };
            let expansion = expander
                .expand_row(spec, &header, &cells, &ctx)
                .with_context(|| format!("{}: row {}", source.display(), row_index))?;
            for diagnostic in &expansion.diagnostics {
                log::debug!("{}: {}", source.display(), diagnostic);
            }
            writer.write_expansion(&expansion)?;

            if writer.rows >= self.config.chunk_size {
                report.chunks.push(writer.finish()?);
            } else {
                current = Some(writer);
            }
        }

        if let Some(writer) = current {
            report.chunks.push(writer.finish()?);
        }
        Ok(report)
    }
}

/// Embedded line breaks would split an N-Triples line; flatten them.
fn clean_cell(cell: &str) -> String {
    cell.replace(['\r', '\n'], " ")
}

struct ChunkWriter {
    path: PathBuf,
    file_name: String,
    out: BufWriter<File>,
    hasher: Sha256,
    rows: usize,
    statements: usize,
    diagnostics: usize,
}

impl ChunkWriter {
    fn create(path: PathBuf) -> Result<Self> {
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        log::debug!("Opened chunk {}", path.display());
        Ok(ChunkWriter {
            path,
            file_name,
            out: BufWriter::new(file),
            hasher: Sha256::new(),
            rows: 0,
            statements: 0,
            diagnostics: 0,
        })
    }

    fn write_expansion(&mut self, expansion: &RowExpansion) -> Result<()> {
        let text = render_statements(&expansion.statements);
        self.out
            .write_all(text.as_bytes())
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        self.hasher.update(text.as_bytes());
        self.rows += 1;
        if !text.is_empty() {
            self.statements += expansion.statements.len();
        }
        self.diagnostics += expansion.diagnostics.len();
        Ok(())
    }

    fn finish(mut self) -> Result<ChunkReport> {
        self.out
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        log::info!(
            "Wrote {} ({} rows, {} statements)",
            self.path.display(),
            self.rows,
            self.statements
        );
        Ok(ChunkReport {
            path: self.path,
            rows: self.rows,
            statements: self.statements,
            diagnostics: self.diagnostics,
            sha256: hex::encode(self.hasher.finalize()),
        })
    }
}
