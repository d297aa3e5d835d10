//! Folding-stage command builder.
use anyhow::{bail, Result};
use std::path::Path;

/// Parameters for one folding run.
///
/// `header_files` being non-empty selects the inverse-PFB path: one fold per
/// channelized header file, merged afterwards. Otherwise a single combined
/// fold over the directory's fits files is emitted.
#[derive(Debug, Clone)]
pub struct FoldCommands<'a> {
    pub pulsar: &'a str,
    pub obsid: &'a str,
    pub pointing_dir: &'a Path,
    pub nbins: u32,
    pub subint: f64,
    pub seek: Option<u64>,
    pub total: Option<u64>,
    pub dm: Option<f64>,
    pub period: Option<f64>,
    pub fold_options: Option<&'a str>,
    pub no_ephemeris: bool,
    pub header_files: &'a [String],
}

impl FoldCommands<'_> {
    /// Output archive stem; the fold tool appends `.ar` itself.
    pub fn out_base(&self) -> String {
        if self.header_files.is_empty() {
            format!("{}_{}_archive", self.obsid, self.pulsar)
        } else {
            format!("{}_{}_ipfb_archive", self.obsid, self.pulsar)
        }
    }

    /// True when DM and period overrides fully specify the fold, making the
    /// catalog ephemeris unnecessary.
    fn overrides_specify_fold(&self) -> bool {
        self.dm.is_some() && self.period.is_some()
    }

    fn fold_flags(&self, dir: &std::path::Display<'_>) -> String {
        let mut flags = format!("-cont -U 4000 -A -K -L {} -b {}", self.subint, self.nbins);
        if self.overrides_specify_fold() {
            // period/dm overrides instead of an ephemeris, for candidates
            if let (Some(period), Some(dm)) = (self.period, self.dm) {
                flags.push_str(&format!(" -c {period} -D {dm}"));
            }
        } else {
            flags.push_str(&format!(" -E {dir}/{}.eph", self.pulsar));
        }
        if let Some(seek) = self.seek {
            flags.push_str(&format!(" -S {seek}"));
        }
        if let Some(total) = self.total {
            flags.push_str(&format!(" -T {total}"));
        }
        if let Some(options) = self.fold_options {
            if !options.trim().is_empty() {
                flags.push(' ');
                flags.push_str(options.trim());
            }
        }
        flags
    }

    /// Append the ephemeris-generation and fold commands.
    pub fn append_to(&self, commands: &mut Vec<String>) -> Result<()> {
        if self.no_ephemeris && !self.overrides_specify_fold() {
            bail!(
                "folding {} without an ephemeris requires both a DM and a period override",
                self.pulsar
            );
        }
        let dir = self.pointing_dir.display();
        let base = self.out_base();
        let flags = self.fold_flags(&dir);

        if !self.no_ephemeris && !self.overrides_specify_fold() {
            commands.push(format!("psrcat -e {} > {dir}/{}.eph", self.pulsar, self.pulsar));
        }
        commands.push("echo 'Running dspsr folding'".to_string());
        if self.header_files.is_empty() {
            commands.push(format!("dspsr {flags} -O {dir}/{base} {dir}/*.fits"));
        } else {
            for (index, header) in self.header_files.iter().enumerate() {
                commands.push(format!(
                    "dspsr {flags} -O {dir}/{base}_ch{:03} {dir}/{header}",
                    index + 1
                ));
            }
            commands.push(format!(
                "psradd -R -o {dir}/{base}.ar {dir}/{base}_ch*.ar"
            ));
        }
        Ok(())
    }
}
