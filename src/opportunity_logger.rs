//! Opportunity Journal
//!
//! Appends every ranked opportunity to a daily CSV file for offline review.
//! One row per opportunity per scan, rotated daily.
//!
//! Output format (CSV):
//!   timestamp, scan, rank, kind, chain, pair1, pair1_address, pair2, pair2_address,
//!   pair3, pair3_address, relation, price1, price2, profit, normalized_profit,
//!   cycle_profit, potential_profit
//!
//! File naming: opportunities_YYYYMMDD.csv (auto-rotated at midnight UTC)
//!
//! Author: AI-Generated
//! Created: 2026-01-30
//! Modified: 2026-10-18 - Journal ranked opportunities instead of pool prices

use crate::types::Opportunity;
use chrono::{DateTime, NaiveDate, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// CSV header for journal files
const CSV_HEADER: &str = "timestamp,scan,rank,kind,chain,pair1,pair1_address,pair2,pair2_address,pair3,pair3_address,relation,price1,price2,profit,normalized_profit,cycle_profit,potential_profit";

/// Names and addresses may contain commas
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub struct OpportunityLogger {
    log_dir: PathBuf,
    current_date: Option<NaiveDate>,
    file: Option<File>,
    /// Scans journaled by this logger
    scans: u64,
}

impl OpportunityLogger {
    /// Create the logger. Creates the log directory if it doesn't exist.
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Self {
        let path = log_dir.as_ref().to_path_buf();
        if let Err(e) = fs::create_dir_all(&path) {
            warn!("Failed to create opportunity log directory {}: {}", path.display(), e);
        }
        info!("OpportunityLogger initialized: {}", path.display());

        Self {
            log_dir: path,
            current_date: None,
            file: None,
            scans: 0,
        }
    }

    /// File the journal writes to on `date`
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.log_dir.join(format!("opportunities_{}.csv", date.format("%Y%m%d")))
    }

    /// Journal one scan's ranked output. Write failures are logged, never fatal.
    pub fn log_opportunities(&mut self, opportunities: &[Opportunity]) {
        self.log_opportunities_at(Utc::now(), opportunities)
    }

    fn log_opportunities_at(&mut self, now: DateTime<Utc>, opportunities: &[Opportunity]) {
        self.scans += 1;
        if opportunities.is_empty() {
            debug!("OpportunityLogger: scan {} found nothing", self.scans);
            return;
        }

        let today = now.date_naive();
        if self.current_date != Some(today) {
            self.rotate_file(today);
        }

        let file = match self.file.as_mut() {
            Some(f) => f,
            None => {
                debug!("OpportunityLogger: no open file, skipping");
                return;
            }
        };

        let timestamp = now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

        for (rank, opp) in opportunities.iter().enumerate() {
            let two_leg = opp.two_leg();
            let (pair3, pair3_address, cycle_profit) = match opp {
                Opportunity::Triangular(tri) => (
                    tri.leg3.symbol(),
                    tri.leg3.pair_address.clone(),
                    format!("{:.8}", tri.cycle_profit),
                ),
                Opportunity::TwoLeg(_) => (String::new(), String::new(), String::new()),
            };

            let line = format!(
                "{},{},{},{},{},{},{},{},{},{},{},{},{:.10},{:.10},{:.8},{},{},{:.8}\n",
                timestamp,
                self.scans,
                rank + 1,
                opp.kind(),
                csv_field(&two_leg.leg1.chain_id),
                csv_field(&two_leg.leg1.symbol()),
                csv_field(&two_leg.leg1.pair_address),
                csv_field(&two_leg.leg2.symbol()),
                csv_field(&two_leg.leg2.pair_address),
                csv_field(&pair3),
                csv_field(&pair3_address),
                two_leg.relation,
                two_leg.price1,
                two_leg.price2,
                two_leg.profit,
                two_leg.normalized_profit,
                cycle_profit,
                two_leg.potential_profit,
            );

            if let Err(e) = file.write_all(line.as_bytes()) {
                warn!("OpportunityLogger write error: {}", e);
                return;
            }
        }

        if let Err(e) = file.flush() {
            debug!("OpportunityLogger flush error: {}", e);
        }
    }

    /// Rotate to a new daily file
    fn rotate_file(&mut self, date: NaiveDate) {
        self.file = None;
        self.current_date = None;

        let filepath = self.file_for(date);
        let file_exists = filepath.exists();

        match OpenOptions::new().create(true).append(true).open(&filepath) {
            Ok(mut f) => {
                if !file_exists {
                    if let Err(e) = writeln!(f, "{}", CSV_HEADER) {
                        warn!("OpportunityLogger: failed to write header to {}: {}", filepath.display(), e);
                        return;
                    }
                    info!("OpportunityLogger: created new file {}", filepath.display());
                } else {
                    info!("OpportunityLogger: appending to existing {}", filepath.display());
                }
                self.file = Some(f);
                self.current_date = Some(date);
            }
            Err(e) => {
                warn!("OpportunityLogger: failed to open {}: {}", filepath.display(), e);
            }
        }
    }
}
