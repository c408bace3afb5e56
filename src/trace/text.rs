//! BTF 2.2.1 text format.
//!
//! ```text
//! #version 2.2.1
//! #creator btf-trace
//! #creationDate 2024-01-01T00:00:00+00:00
//! #timescale ns
//! 100,core0,0,T,taskA,1,enforcedmigration
//! 100,core1,0,T,taskA,1,fullmigration
//! # a comment
//! ```
//!
//! Records are `time,source,source_instance,type,target,target_instance,event[,note]`.

use super::entry::{EntityType, EntryEvent};
use super::error::TextError;
use super::file::{BtfFile, BTF_VERSION};
use super::time::TimeScale;
use crate::core::{CoreEvent, LifecycleEvent};
use crate::error::{TraceError, UnknownName};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// A record line the reader could not import.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line: usize,
    pub error: TraceError,
}

/// Outcome of reading a BTF text trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    /// Record lines turned into trace records.
    pub imported: usize,
    pub skipped: Vec<SkippedLine>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl BtfFile {
    /// Write the header, records and comments as BTF text.
    pub fn write_btf<W: Write>(&self, mut out: W) -> Result<(), TextError> {
        let header = self.header();
        writeln!(out, "#version {BTF_VERSION}")?;
        writeln!(out, "#creator {}", header.creator)?;
        writeln!(out, "#creationDate {}", header.created_at.to_rfc3339())?;
        writeln!(out, "#timescale {}", self.time_scale())?;
        for entry in &header.entries {
            writeln!(out, "#{entry}")?;
        }

        let mut comments = self.comments().iter().peekable();
        for (index, entry) in self.entries().iter().enumerate() {
            while let Some(comment) = comments.next_if(|c| c.position <= index) {
                writeln!(out, "# {}", comment.text)?;
            }
            writeln!(out, "{}", self.render_entry(entry)?)?;
        }
        for comment in comments {
            writeln!(out, "# {}", comment.text)?;
        }

        out.flush()?;
        Ok(())
    }

    /// Write the trace to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TextError> {
        let path = path.as_ref();
        self.write_btf(BufWriter::new(File::create(path)?))?;
        info!(path = %path.display(), records = self.len(), "trace written");
        Ok(())
    }

    /// Read a BTF text trace.
    ///
    /// Record lines that cannot be imported are skipped and listed in the
    /// report; an unreadable header fails the whole read.
    pub fn read_btf<R: BufRead>(input: R) -> Result<(BtfFile, ImportReport), TextError> {
        let mut importer = Importer::default();

        for (index, line) in input.lines().enumerate() {
            let line = line?;
            importer.line(index + 1, line.trim_end_matches('\r'))?;
        }

        Ok(importer.finish())
    }

    /// Read a BTF text trace from `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<(BtfFile, ImportReport), TextError> {
        let path = path.as_ref();
        let (file, report) = Self::read_btf(BufReader::new(File::open(path)?))?;
        info!(
            path = %path.display(),
            imported = report.imported,
            skipped = report.skipped.len(),
            "trace read"
        );
        Ok((file, report))
    }
}

struct PendingMigration {
    line: usize,
    time: u64,
    source_core: String,
    task: String,
    instance: u64,
}

struct Importer {
    file: BtfFile,
    report: ImportReport,
    pending: Option<PendingMigration>,
}

impl Default for Importer {
    fn default() -> Self {
        Self {
            file: BtfFile::new(TimeScale::default()),
            report: ImportReport::default(),
            pending: None,
        }
    }
}

impl Importer {
    fn line(&mut self, number: usize, text: &str) -> Result<(), TextError> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(comment) = text.strip_prefix("# ") {
            self.file.comment(comment);
            return Ok(());
        }
        if let Some(header) = text.strip_prefix('#') {
            return self.header(header);
        }

        match self.record(number, text) {
            Ok(true) => self.report.imported += 1,
            Ok(false) => {}
            Err(error) => self.skip(number, error),
        }
        Ok(())
    }

    fn header(&mut self, text: &str) -> Result<(), TextError> {
        let (key, value) = text.split_once(' ').unwrap_or((text, ""));
        match key {
            "version" => {
                if value != BTF_VERSION {
                    warn!(version = value, "unexpected BTF version");
                }
            }
            "creator" => {
                let mut header = self.file.header().clone();
                header.creator = value.to_string();
                self.file.set_header(header);
            }
            "creationDate" => {
                let created_at = DateTime::parse_from_rfc3339(value)
                    .map_err(|e| TextError::InvalidHeader(format!("creationDate: {e}")))?;
                let mut header = self.file.header().clone();
                header.created_at = created_at.with_timezone(&Utc);
                self.file.set_header(header);
            }
            "timescale" => {
                if !self.file.is_empty() {
                    return Err(TextError::InvalidHeader(
                        "timescale after the first record".to_string(),
                    ));
                }
                let scale = value
                    .parse::<TimeScale>()
                    .map_err(|e| TextError::InvalidHeader(e.to_string()))?;
                self.file.set_time_scale(scale);
            }
            "" => self.file.comment(""),
            _ => self.file.header_entry(text),
        }
        Ok(())
    }

    /// Import one record line. `Ok(false)` means the line was buffered.
    fn record(&mut self, number: usize, text: &str) -> Result<bool, TraceError> {
        let parse_error = |reason: String| TraceError::Parse {
            line: number,
            reason,
        };

        let fields: Vec<&str> = text.splitn(8, ',').collect();
        if fields.len() < 7 {
            return Err(parse_error(format!(
                "expected at least 7 fields, found {}",
                fields.len()
            )));
        }
        let number_field = |index: usize, what: &str| {
            fields[index]
                .trim()
                .parse::<u64>()
                .map_err(|e| parse_error(format!("{what}: {e}")))
        };

        let time = number_field(0, "time")?;
        let source = fields[1];
        let source_instance = number_field(2, "source instance")?;
        let entity_type = fields[3]
            .parse::<EntityType>()
            .map_err(|e| parse_error(e.to_string()))?;
        let target = fields[4];
        let target_instance = number_field(5, "target instance")?;
        let event = fields[6];
        let note = fields.get(7).copied().unwrap_or("");

        let is_full_migration = matches!(
            event.parse::<LifecycleEvent>(),
            Ok(LifecycleEvent::FullMigration)
        );
        if !is_full_migration {
            self.drop_pending();
        }

        match entity_type {
            t if t.is_process() => {
                let event = event
                    .parse::<LifecycleEvent>()
                    .map_err(|e| parse_error(e.to_string()))?;
                match event {
                    LifecycleEvent::EnforcedMigration => {
                        self.pending = Some(PendingMigration {
                            line: number,
                            time,
                            source_core: source.to_string(),
                            task: target.to_string(),
                            instance: target_instance,
                        });
                        Ok(false)
                    }
                    LifecycleEvent::FullMigration => {
                        let pending = self
                            .pending
                            .take()
                            .filter(|p| p.task == target && p.instance == target_instance)
                            .ok_or_else(|| {
                                parse_error(
                                    "fullmigration without a matching enforcedmigration"
                                        .to_string(),
                                )
                            })?;
                        self.file.task_migration_event(
                            pending.time,
                            &pending.source_core,
                            source,
                            target,
                            target_instance,
                        )?;
                        Ok(true)
                    }
                    _ => {
                        self.file
                            .process_event(time, t, source, target, target_instance, event)?;
                        Ok(true)
                    }
                }
            }
            EntityType::Runnable => {
                let event = event
                    .parse::<LifecycleEvent>()
                    .map_err(|e| parse_error(e.to_string()))?;
                self.file
                    .runnable_event(time, source, source_instance, target, target_instance, event)?;
                Ok(true)
            }
            EntityType::Stimulus => {
                if event != "trigger" {
                    return Err(parse_error(format!("unknown stimulus event '{event}'")));
                }
                if source != target {
                    return Err(parse_error(
                        "stimulus source and target differ".to_string(),
                    ));
                }
                self.file.stimulus_event(time, target)?;
                Ok(true)
            }
            EntityType::Simulation => {
                if event != "tag" {
                    return Err(parse_error(format!("unknown simulation event '{event}'")));
                }
                self.file.simulation_tag(time, source, note)?;
                Ok(true)
            }
            EntityType::Core => {
                let event = event
                    .parse::<CoreEvent>()
                    .map_err(|e| parse_error(e.to_string()))?;
                if source != target {
                    return Err(parse_error("core source and target differ".to_string()));
                }
                self.file.core_event(time, target, event)?;
                Ok(true)
            }
            t @ (EntityType::Scheduler
            | EntityType::Semaphore
            | EntityType::Signal
            | EntityType::Os) => {
                let parsed: Result<EntryEvent, UnknownName> = match t {
                    EntityType::Scheduler => event.parse().map(EntryEvent::Scheduler),
                    EntityType::Semaphore => event.parse().map(EntryEvent::Semaphore),
                    EntityType::Signal => event.parse().map(EntryEvent::Signal),
                    _ => event.parse().map(EntryEvent::Os),
                };
                let event = parsed.map_err(|e| parse_error(e.to_string()))?;
                self.file.import_resource(
                    time,
                    t,
                    source,
                    source_instance,
                    target,
                    target_instance,
                    event,
                    note,
                )?;
                Ok(true)
            }
            other => Err(parse_error(format!("records of type {other} are not supported"))),
        }
    }

    fn drop_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.skip(
                pending.line,
                TraceError::Parse {
                    line: pending.line,
                    reason: "enforcedmigration without a following fullmigration".to_string(),
                },
            );
        }
    }

    fn skip(&mut self, line: usize, error: TraceError) {
        warn!(line, error = %error, "skipping trace line");
        self.report.skipped.push(SkippedLine { line, error });
    }

    fn finish(mut self) -> (BtfFile, ImportReport) {
        self.drop_pending();
        (self.file, self.report)
    }
}
