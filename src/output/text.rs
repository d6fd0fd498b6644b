//! Human-readable run summary.

use std::io::{self, Write};

use bytesize::ByteSize;

use super::StoreTotals;
use crate::pipeline::RunReport;

/// Maximum number of missing paths listed inline.
const MISSING_PREVIEW: usize = 10;

/// Text formatter for a finished run.
#[derive(Debug, Clone, Copy)]
pub struct TextOutput<'a> {
    report: &'a RunReport,
    totals: &'a StoreTotals,
}

impl<'a> TextOutput<'a> {
    /// Create a text formatter.
    #[must_use]
    pub fn new(report: &'a RunReport, totals: &'a StoreTotals) -> Self {
        Self { report, totals }
    }

    /// Write the summary.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let r = self.report;

        writeln!(w, "Scan complete: {}", r.scan_root.display())?;
        writeln!(w, "  Mode:             {}", r.mode)?;
        writeln!(w, "  Elapsed:          {:.2} seconds", r.elapsed_secs)?;
        writeln!(w, "  Enqueued:         {}", r.enqueued_total)?;
        writeln!(w, "  Processed:        {}", r.files_processed)?;
        writeln!(w, "  Difference:       {}", r.difference)?;
        writeln!(w, "  Duplicates:       {}", r.files_skipped)?;
        writeln!(w, "  Missing:          {}", r.missing_files)?;
        writeln!(w, "  Stored:           {}", r.records_stored)?;
        if r.records_failed > 0 {
            writeln!(w, "  Failed to store:  {}", r.records_failed)?;
        }
        if r.files_failed > 0 {
            writeln!(w, "  Unreadable:       {}", r.files_failed)?;
        }
        writeln!(w, "  Hashed:           {}", ByteSize::b(r.bytes_hashed))?;
        writeln!(
            w,
            "Store {}: {} files, {} with duplicates",
            self.totals.location, self.totals.total_files, self.totals.duplicated_fingerprints
        )?;

        if !r.missing_paths.is_empty() {
            writeln!(w, "Missing files:")?;
            for path in r.missing_paths.iter().take(MISSING_PREVIEW) {
                writeln!(w, "  {}", path.display())?;
            }
            if r.missing_paths.len() > MISSING_PREVIEW {
                writeln!(w, "  ... and {} more", r.missing_paths.len() - MISSING_PREVIEW)?;
            }
        }
        if r.audit_failures > 0 {
            writeln!(w, "Warning: {} audit writes failed", r.audit_failures)?;
        }
        Ok(())
    }
}
